//! # xcforge-core
//!
//! Core library for Apple simulator control and `xcodebuild` orchestration
//! on macOS.
//!
//! This crate drives an external, stateful subsystem (the simulator fleet
//! and the Xcode build toolchain) through shell commands, interprets
//! ambiguous exit codes and free-text output as structured outcomes, and
//! produces deterministic, typed results. The operations are exposed as
//! callable tools over a Unix-socket JSON protocol by `xcforge-server`.
//!
//! ## Modules
//!
//! - [`exec`] - The `CommandExecutor` seam and the `/bin/sh` implementation
//! - [`ident`] - Validated `DeviceId` / `AppPath` value types
//! - [`device`] - Platform/state vocabulary and simulator snapshots
//! - [`locator`] - Inventory queries over `xcrun simctl list`
//! - [`control`] - Boot/shutdown/install commands and exit-code classification
//! - [`destination`] - Abstract build destinations and their toolchain mapping
//! - [`command`] - Pure `xcodebuild` invocation construction
//! - [`diagnostics`] - Compiler error/warning extraction from build output
//! - [`test_results`] - Strategy-dispatched test report parsing
//! - [`ops`] - One orchestrated state-transition workflow per tool
//! - [`deps`] - Toolchain presence preflight
//! - [`config`] - Persistent settings in `~/.xcforge/`
//! - [`ipc`] - Tool protocol types and the socket client
//!
//! ## External Dependencies
//!
//! The production executor shells out to tools that must be installed:
//!
//! - **Xcode** (for `xcrun simctl`, `xcodebuild`, `xcresulttool`)
//! - **xcbeautify** - log beautifier the test pipeline is piped through
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use xcforge_core::exec::ShellExecutor;
//! use xcforge_core::ident::DeviceId;
//! use xcforge_core::ops::boot::BootOp;
//!
//! #[tokio::main]
//! async fn main() {
//!     let executor = Arc::new(ShellExecutor);
//!     let device = DeviceId::new("iPhone 16 Pro").unwrap();
//!     let result = BootOp::new(executor).run(&device).await;
//!     println!("{}", result.message());
//! }
//! ```

pub mod command;
pub mod config;
pub mod control;
pub mod deps;
pub mod destination;
pub mod device;
pub mod diagnostics;
pub mod exec;
pub mod ident;
pub mod ipc;
pub mod locator;
pub mod ops;
pub mod test_results;
