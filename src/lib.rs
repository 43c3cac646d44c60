//! Keeps a hosts-file in sync with the running containers of a Docker
//! host.
//!
//! Every running container with a name and an address gets one line
//! `<ip> <name>.<domain>` inside a delimited block of the hosts-file.  The
//! block is seeded from the running containers at startup, kept current
//! from the Docker event stream, and flushed when the daemon stops.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hosts;
pub mod notifier;
pub mod reconciler;
pub mod runtime;
pub mod types;

pub use dispatcher::{DaemonState, Dispatcher};
pub use error::{Error, Result};
pub use hosts::HostsFile;
pub use notifier::Notifier;
pub use reconciler::Reconciler;
