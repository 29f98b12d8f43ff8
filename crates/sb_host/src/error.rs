//! Host-level error taxonomy.

use std::fmt;

use sb_script::ScriptError;

/// Why the OS refused to create a worker thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadStartReason {
    LimitExceeded,
    InvalidStackSize,
    InsufficientResources,
    Unspecified,
}

impl ThreadStartReason {
    /// Map a raw OS error code from a failed thread creation.
    pub fn from_os_code(code: Option<i32>) -> Self {
        match code {
            Some(libc::EAGAIN) => ThreadStartReason::LimitExceeded,
            Some(libc::EINVAL) => ThreadStartReason::InvalidStackSize,
            Some(libc::EACCES) | Some(libc::EPERM) | Some(libc::ENOMEM) => {
                ThreadStartReason::InsufficientResources
            }
            _ => ThreadStartReason::Unspecified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStartReason::LimitExceeded => "too many threads",
            ThreadStartReason::InvalidStackSize => "stack size is incorrect",
            ThreadStartReason::InsufficientResources => "insufficient resources",
            ThreadStartReason::Unspecified => "unexpected error",
        }
    }
}

#[derive(Clone, Debug)]
pub enum HostError {
    OutOfMemory,
    Compile(ScriptError),
    Runtime(ScriptError),
    ThreadStart(ThreadStartReason),
    Interrupted,
}

impl HostError {
    /// Classify an error that came out of running script code.
    pub fn from_runtime(err: ScriptError) -> Self {
        if err.message == "interrupted!" {
            HostError::Interrupted
        } else {
            HostError::Runtime(err)
        }
    }

    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            HostError::Compile(e) | HostError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::OutOfMemory => f.write_str("not enough memory"),
            HostError::Compile(e) | HostError::Runtime(e) => write!(f, "{e}"),
            HostError::ThreadStart(reason) => {
                write!(f, "unable to start thread (error={})", reason.as_str())
            }
            HostError::Interrupted => f.write_str("interrupted!"),
        }
    }
}

impl std::error::Error for HostError {}
