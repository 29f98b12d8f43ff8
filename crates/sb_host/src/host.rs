//! The host handle: the runtime-state object shared by the root context and
//! every worker.

use std::sync::Arc;

use crate::logger::Logger;

/// Shared embedding state. Cloning is cheap; all clones share one logger.
#[derive(Clone, Default)]
pub struct Host {
    logger: Arc<Logger>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logger(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}
