//! Script-level errors: compile failures and runtime failures.

use std::fmt;

/// Error raised while compiling or running script code.
///
/// Runtime errors gain a traceback at the point they first unwind out of a
/// call frame; compile errors never carry one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    pub traceback: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    pub fn compile(chunk_name: &str, line: u32, message: &str) -> Self {
        Self::new(format!("{chunk_name}:{line}: {message}"))
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(tb) = &self.traceback {
            write!(f, "\n{tb}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ScriptError {}

impl From<String> for ScriptError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
