//! Request dispatch: wire payloads → validated requests → orchestrators.
//!
//! Validation always happens before the toolchain preflight and before any
//! external command: malformed input becomes [`ToolResponse::Error`]
//! without a single shell invocation.

use std::sync::Arc;

use tracing::{debug, info};

use xcforge_core::command::ProjectRef;
use xcforge_core::config::XcforgeConfig;
use xcforge_core::deps::{check_toolchain, Toolchain};
use xcforge_core::destination::{ArchScope, BuildDestination, DeviceFamily};
use xcforge_core::device::{Platform, SimulatorState};
use xcforge_core::exec::CommandExecutor;
use xcforge_core::ident::DeviceId;
use xcforge_core::ipc::{ToolDescriptor, ToolRequest, ToolResponse};
use xcforge_core::ops::boot::BootOp;
use xcforge_core::ops::build::{BuildOp, BuildRequest};
use xcforge_core::ops::install::{InstallOp, InstallRequest};
use xcforge_core::ops::list::{ListFilter, ListOp};
use xcforge_core::ops::shutdown::ShutdownOp;
use xcforge_core::ops::test::{TestOp, TestRequest};

/// The registered tool surface, in discovery order.
const TOOLS: &[(&str, &str)] = &[
    ("boot_simulator", "Boot a simulator by UDID or name"),
    ("shutdown_simulator", "Shut down a simulator by UDID or name"),
    ("install_app", "Install a .app bundle onto a simulator"),
    ("list_simulators", "List simulators, filtered by platform and/or state"),
    ("build", "Build a scheme with xcodebuild"),
    ("test", "Run tests with xcodebuild and parse the results"),
];

/// Backend state for the tool server.
///
/// Holds only process-wide collaborators: the executor, loaded config,
/// and the lazily-checked toolchain facts. No simulator state is ever
/// cached here; every request re-queries the fleet.
pub struct ServerState {
    executor: Arc<dyn CommandExecutor>,
    config: XcforgeConfig,
    toolchain: Option<Toolchain>,
}

impl ServerState {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: XcforgeConfig) -> Self {
        Self {
            executor,
            config,
            toolchain: None,
        }
    }

    /// Handle a single request and produce its response.
    pub async fn handle_request(&mut self, request: ToolRequest) -> ToolResponse {
        match request {
            ToolRequest::ListTools => ToolResponse::Tools {
                tools: TOOLS
                    .iter()
                    .map(|(name, description)| ToolDescriptor {
                        name: name.to_string(),
                        description: description.to_string(),
                    })
                    .collect(),
            },

            ToolRequest::BootSimulator { device_id } => self.handle_boot(&device_id).await,
            ToolRequest::ShutdownSimulator { device_id } => {
                self.handle_shutdown(&device_id).await
            }
            ToolRequest::InstallApp {
                app_path,
                device_id,
            } => self.handle_install(&app_path, device_id.as_deref()).await,
            ToolRequest::ListSimulators { platform, state } => {
                self.handle_list(platform.as_deref(), state.as_deref()).await
            }

            ToolRequest::Build {
                project_path,
                workspace,
                scheme,
                configuration,
                platform,
                simulator,
                universal,
                device_id,
                derived_data_path,
            } => {
                self.handle_build(
                    &project_path,
                    workspace,
                    scheme,
                    configuration,
                    &platform,
                    simulator,
                    universal,
                    device_id.as_deref(),
                    derived_data_path,
                )
                .await
            }

            ToolRequest::Test {
                project_path,
                workspace,
                scheme,
                configuration,
                platform,
                simulator,
                universal,
                device_id,
                derived_data_path,
                result_bundle_path,
                only_testing,
            } => {
                self.handle_test(
                    &project_path,
                    workspace,
                    scheme,
                    configuration,
                    &platform,
                    simulator,
                    universal,
                    device_id.as_deref(),
                    derived_data_path,
                    result_bundle_path,
                    only_testing,
                )
                .await
            }
        }
    }

    /// Probe for the toolchain once per process; absence is its own
    /// diagnosis, distinct from any command failure.
    async fn ensure_toolchain(&mut self) -> Result<(), String> {
        if self.toolchain.is_some() {
            return Ok(());
        }
        match check_toolchain(&self.executor).await {
            Ok(toolchain) => {
                info!(
                    simctl = %toolchain.simctl_path,
                    xcodebuild = %toolchain.xcodebuild_version,
                    "toolchain detected"
                );
                self.toolchain = Some(toolchain);
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    async fn handle_boot(&mut self, device_id: &str) -> ToolResponse {
        let device = match DeviceId::new(device_id) {
            Ok(device) => device,
            Err(e) => return ToolResponse::Error { message: e.to_string() },
        };
        if let Err(message) = self.ensure_toolchain().await {
            return ToolResponse::Error { message };
        }
        let result = BootOp::new(self.executor.clone()).run(&device).await;
        ToolResponse::Boot {
            outcome: result.outcome,
            message: result.message(),
            device_id: result.device_id.to_string(),
            device_name: result.device_name,
        }
    }

    async fn handle_shutdown(&mut self, device_id: &str) -> ToolResponse {
        let device = match DeviceId::new(device_id) {
            Ok(device) => device,
            Err(e) => return ToolResponse::Error { message: e.to_string() },
        };
        if let Err(message) = self.ensure_toolchain().await {
            return ToolResponse::Error { message };
        }
        let result = ShutdownOp::new(self.executor.clone()).run(&device).await;
        ToolResponse::Shutdown {
            outcome: result.outcome,
            message: result.message(),
            device_id: result.device_id.to_string(),
            device_name: result.device_name,
        }
    }

    async fn handle_install(&mut self, app_path: &str, device_id: Option<&str>) -> ToolResponse {
        let request = match InstallRequest::new(app_path, device_id) {
            Ok(request) => request,
            Err(e) => return ToolResponse::Error { message: e.to_string() },
        };
        if let Err(message) = self.ensure_toolchain().await {
            return ToolResponse::Error { message };
        }
        let result = InstallOp::new(self.executor.clone()).run(&request).await;
        ToolResponse::Install {
            outcome: result.outcome,
            message: result.message(),
            app_name: result.app_name,
            device_name: result.device_name,
        }
    }

    async fn handle_list(&mut self, platform: Option<&str>, state: Option<&str>) -> ToolResponse {
        let mut filter = ListFilter::default();
        if let Some(raw) = platform {
            match Platform::from_name(raw) {
                Ok(platform) => filter.platform = Some(platform),
                Err(e) => return ToolResponse::Error { message: e.to_string() },
            }
        }
        if let Some(raw) = state {
            let parsed = SimulatorState::parse(raw);
            if parsed == SimulatorState::Unknown && raw != "Unknown" {
                return ToolResponse::Error {
                    message: format!("unknown simulator state: {raw}"),
                };
            }
            filter.state = Some(parsed);
        }
        if let Err(message) = self.ensure_toolchain().await {
            return ToolResponse::Error { message };
        }
        let result = ListOp::new(self.executor.clone()).run(&filter).await;
        match result.error {
            Some(error) => ToolResponse::Error {
                message: error.to_string(),
            },
            None => ToolResponse::List {
                devices: result.devices,
            },
        }
    }

    /// Shared by build and test: wire fields → validated domain values.
    fn resolve_target(
        &self,
        project_path: &str,
        workspace: bool,
        platform: &str,
        simulator: bool,
        universal: bool,
        device_id: Option<&str>,
    ) -> Result<(ProjectRef, BuildDestination, Option<DeviceId>), String> {
        if project_path.trim().is_empty() {
            return Err("project path must not be empty".to_string());
        }
        let platform = Platform::from_name(platform).map_err(|e| e.to_string())?;
        let family = if simulator && platform != Platform::Macos {
            DeviceFamily::Simulator
        } else {
            DeviceFamily::Device
        };
        let arch = if universal {
            ArchScope::Universal
        } else {
            ArchScope::CurrentArch
        };
        let destination =
            BuildDestination::new(platform, family, arch).map_err(|e| e.to_string())?;
        let device = device_id
            .map(DeviceId::new)
            .transpose()
            .map_err(|e| e.to_string())?;
        let project = if workspace {
            ProjectRef::Workspace(project_path.to_string())
        } else {
            ProjectRef::Project(project_path.to_string())
        };
        Ok((project, destination, device))
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_build(
        &mut self,
        project_path: &str,
        workspace: bool,
        scheme: Option<String>,
        configuration: String,
        platform: &str,
        simulator: bool,
        universal: bool,
        device_id: Option<&str>,
        derived_data_path: Option<String>,
    ) -> ToolResponse {
        let (project, destination, device) = match self.resolve_target(
            project_path,
            workspace,
            platform,
            simulator,
            universal,
            device_id,
        ) {
            Ok(resolved) => resolved,
            Err(message) => return ToolResponse::Error { message },
        };
        if let Err(message) = self.ensure_toolchain().await {
            return ToolResponse::Error { message };
        }

        let request = BuildRequest {
            project,
            scheme,
            configuration,
            destination,
            device,
            derived_data_path,
        };
        let result = BuildOp::new(self.executor.clone())
            .with_options(self.config.exec_options())
            .run(&request)
            .await;
        debug!(outcome = ?result.outcome, issues = result.issues.len(), "build finished");
        ToolResponse::Build {
            outcome: result.outcome,
            exit_code: result.exit_code,
            issues: result.issues,
            message: result.error.map(|e| e.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_test(
        &mut self,
        project_path: &str,
        workspace: bool,
        scheme: Option<String>,
        configuration: String,
        platform: &str,
        simulator: bool,
        universal: bool,
        device_id: Option<&str>,
        derived_data_path: Option<String>,
        result_bundle_path: Option<String>,
        only_testing: Vec<String>,
    ) -> ToolResponse {
        let (project, destination, device) = match self.resolve_target(
            project_path,
            workspace,
            platform,
            simulator,
            universal,
            device_id,
        ) {
            Ok(resolved) => resolved,
            Err(message) => return ToolResponse::Error { message },
        };
        if let Err(message) = self.ensure_toolchain().await {
            return ToolResponse::Error { message };
        }

        let request = TestRequest {
            project,
            scheme,
            configuration,
            destination,
            device,
            derived_data_path,
            result_bundle_path,
            only_testing,
            beautifier: self.config.beautifier.clone(),
        };
        let result = TestOp::new(self.executor.clone())
            .with_options(self.config.exec_options())
            .run(&request)
            .await;
        debug!(outcome = ?result.outcome, parsed = result.summary.is_some(), "test run finished");
        ToolResponse::Test {
            outcome: result.outcome,
            summary: result.summary,
            issues: result.issues,
            result_bundle_path: result.result_bundle_path,
            message: result.error.map(|e| e.to_string()),
        }
    }
}
