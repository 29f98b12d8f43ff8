//! Embedding core: bootstrap, worker spawning, cooperative interrupts, and
//! failure reporting around [`sb_script`] contexts.
//!
//! The [`Host`] handle owns the shared state (the logger); everything else
//! is per-context. A root context is built with [`Host::initialize`];
//! running scripts create isolated sibling contexts on their own OS threads
//! with [`Host::spawn`].

mod bootstrap;
pub mod capabilities;
mod error;
mod host;
pub mod interrupt;
mod logger;
mod registry;
mod report;
mod spawner;

pub use capabilities::{CATALOG, register_catalog};
pub use error::{HostError, ThreadStartReason};
pub use host::Host;
pub use interrupt::{ProtectedScope, protected_call, protected_run};
pub use logger::Logger;
pub use registry::merge_registries;
