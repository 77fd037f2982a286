//! Declarative network namespace provisioning for Linux.
//!
//! This crate reads a desired-state description of named network namespaces
//! (their loopback, ethernet, dummy and veth devices, addresses, routes and
//! an optional post-script) and converges the running system toward it by
//! driving iproute2. Applying the same description twice changes nothing the
//! second time.
//!
//! # Features
//!
//! - `lab` - In-memory [`lab::FakeNetwork`] for testing without root
//!
//! # Example
//!
//! ```ignore
//! use netnsplan::iproute2::IpCommand;
//! use netnsplan::{ApplyOptions, Reconciler, config};
//!
//! #[tokio::main]
//! async fn main() -> netnsplan::Result<()> {
//!     let state = config::load_dir(config::DEFAULT_CONFIG_DIR)?;
//!     let ip = IpCommand::default();
//!
//!     let options = ApplyOptions {
//!         always_run_post_script: false,
//!     };
//!     let result = Reconciler::with_options(&ip, options).apply(&state).await?;
//!     println!("{}", result.summary_text());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! - [`config`] - YAML loading, merging and validation
//! - [`engine`] - the two-phase [`Reconciler`]
//! - [`command`] - the [`StateInspector`] / [`CommandExecutor`] seam
//! - [`iproute2`] - the production transport, one `ip` process per call

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod iproute2;
pub mod scope;

#[cfg(feature = "lab")]
pub mod lab;

// Re-export common types at crate root for convenience
pub use command::{CommandExecutor, Link, ObservedRoute, StateInspector};
pub use config::DesiredState;
pub use engine::{ApplyOptions, ApplyResult, Change, Reconciler, VethPlacement};
pub use error::{Error, ErrorKind, Result};
pub use scope::NamespaceScope;
