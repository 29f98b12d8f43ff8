//! Error reporting: stringify a failure, log it, discard it, reclaim.

use sb_script::{Context, ScriptError, Value};

use crate::host::Host;

impl Host {
    /// Pass-through reporter. On failure the error is logged, the context's
    /// error slot is discarded, and one full reclamation pass runs.
    pub fn report(
        &self,
        ctx: &mut Context,
        status: Result<Value, ScriptError>,
    ) -> Result<Value, ScriptError> {
        if let Err(err) = &status {
            self.logger().log_message(None, &err.to_string());
            let _ = ctx.take_error();
            ctx.gc_collect();
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_passes_through_untouched() {
        let host = Host::new();
        let mut ctx = Context::new();
        let out = host.report(&mut ctx, Ok(Value::Int(3)));
        assert!(out.unwrap().eq_value(&Value::Int(3)));
    }

    #[test]
    fn failure_is_logged_and_error_slot_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut ctx = Context::new();
        let err = ScriptError::new("something failed");
        ctx.set_error(err.clone());
        let out = host.report(&mut ctx, Err(err));
        assert!(out.is_err());
        assert!(ctx.error().is_none());

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "something failed\n");
    }
}
