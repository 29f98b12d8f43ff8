//! Failure logging.
//!
//! The log destination is an explicit shared object rather than process
//! state: the root creates one `Arc<Logger>` at startup and every worker
//! clones it. The path is intended to be set once before workers spawn;
//! `set_log_path` must not race `log_message` from another thread.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
pub struct Logger {
    path: Mutex<Option<PathBuf>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the log destination; `None` clears it.
    pub fn set_log_path(&self, path: Option<PathBuf>) {
        *self.path.lock().unwrap_or_else(|p| p.into_inner()) = path;
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.path.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Append one line to the destination, falling back to stderr silently.
    ///
    /// The file is opened, flushed, and closed per message so a crash never
    /// loses a partially buffered destination.
    pub fn log_message(&self, program_name: Option<&str>, message: &str) {
        let line = match program_name {
            Some(pname) => format!("{pname}: {message}\n"),
            None => format!("{message}\n"),
        };
        if let Some(path) = self.log_path() {
            let opened = OpenOptions::new().append(true).create(true).open(&path);
            if let Ok(mut file) = opened {
                if file
                    .write_all(line.as_bytes())
                    .and_then(|_| file.flush())
                    .is_ok()
                {
                    return;
                }
            }
        }
        eprint!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.log");
        let logger = Logger::new();
        logger.set_log_path(Some(path.clone()));
        logger.log_message(Some("prog"), "first");
        logger.log_message(None, "second");
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "prog: first\nsecond\n");
    }

    #[test]
    fn unopenable_path_falls_back_silently() {
        let logger = Logger::new();
        logger.set_log_path(Some(PathBuf::from("/nonexistent/dir/log.txt")));
        // must not panic or error; the message goes to stderr
        logger.log_message(Some("prog"), "boom");
        assert!(!std::path::Path::new("/nonexistent/dir/log.txt").exists());
    }

    #[test]
    fn clearing_the_path_restores_stderr_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.log");
        let logger = Logger::new();
        logger.set_log_path(Some(path.clone()));
        logger.log_message(None, "kept");
        logger.set_log_path(None);
        logger.log_message(None, "dropped");
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "kept\n");
    }
}
