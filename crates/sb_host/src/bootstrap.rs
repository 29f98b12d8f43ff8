//! Context bootstrap.

use std::sync::Arc;

use sb_script::{Context, Value};

use crate::capabilities;
use crate::error::HostError;
use crate::host::Host;
use crate::interrupt;

/// Fixed program run at the end of bootstrap. It wires the scheduler driver
/// and yields the reusable entry-point runner: a function taking an entry
/// function and its argument list.
const BOOTSTRAP_CHUNK: &str = r#"
let cothread = require("cothread");

fn __entry(f, a) {
    return cothread.run(cothread.step(f, a));
}

return __entry;
"#;

impl Host {
    /// Initialize a fresh context: open the base facilities, register the
    /// capability catalog, run the bootstrap chunk, and return the
    /// entry-point runner.
    ///
    /// With `interactive`, additionally requires the console capability and
    /// invokes it with the runner; the console then owns the rest of the
    /// context's life. Returns the first failure; the error value stays
    /// retrievable from the context. Never call twice on one context.
    pub fn initialize(
        &self,
        ctx: &mut Context,
        interactive: bool,
        debug_mode: bool,
    ) -> Result<Value, HostError> {
        // hold reclamation while globals are partially built
        ctx.gc_stop();
        sb_script::open_base(ctx);
        ctx.gc_restart();

        if debug_mode {
            ctx.set_debug(true);
            // most-recently-preferred resolution strategy first, so debug
            // providers can shadow built-ins
            ctx.rotate_searchers();
        }

        let logger = self.logger().clone();
        ctx.set_log_hook(Arc::new(move |pname, msg| logger.log_message(pname, msg)));

        capabilities::register_catalog(self, ctx);

        let chunk = ctx
            .compile("BOOTSTRAP", BOOTSTRAP_CHUNK)
            .map_err(|e| {
                ctx.set_error(e.clone());
                HostError::Compile(e)
            })?;
        let runner = ctx.run(&chunk).map_err(|e| {
            ctx.set_error(e.clone());
            HostError::from_runtime(e)
        })?;

        if interactive {
            let console = ctx.require("console").map_err(|e| {
                ctx.set_error(e.clone());
                HostError::from_runtime(e)
            })?;
            interrupt::protected_call(ctx, &console, &[runner.clone()]).map_err(|e| {
                ctx.set_error(e.clone());
                HostError::from_runtime(e)
            })?;
        }

        Ok(runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_script::Searcher;

    #[test]
    fn initialize_yields_a_callable_runner() {
        let host = Host::new();
        let mut ctx = Context::new();
        let runner = host.initialize(&mut ctx, false, false).unwrap();

        let chunk = ctx.compile("main", "return 40 + 2;").unwrap();
        let v = ctx
            .call(&runner, &[Value::Func(chunk), Value::Nil])
            .unwrap();
        assert!(v.eq_value(&Value::Int(42)));
    }

    #[test]
    fn registration_is_lazy_and_complete() {
        let host = Host::new();
        let mut ctx = Context::new();
        host.initialize(&mut ctx, false, false).unwrap();
        // the bootstrap chunk itself required only the scheduler; everything
        // else must still be unmaterialized providers
        assert_eq!(ctx.preload_len(), capabilities::CATALOG.len());
    }

    #[test]
    fn debug_mode_flips_resolution_order() {
        let host = Host::new();
        let mut ctx = Context::new();
        host.initialize(&mut ctx, false, true).unwrap();
        assert!(ctx.is_debug());
        assert_eq!(ctx.searchers(), &[Searcher::File, Searcher::Preload]);
    }

    #[test]
    fn interactive_without_console_capability_fails_retrievably() {
        let host = Host::new();
        let mut ctx = Context::new();
        let err = host.initialize(&mut ctx, true, false).unwrap_err();
        assert!(matches!(err, HostError::Runtime(_)));
        let slot = ctx.take_error().expect("error stays retrievable");
        assert!(slot.message.contains("console"));
    }

    #[test]
    fn runner_routes_failures_through_the_log_hook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boot.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut ctx = Context::new();
        let runner = host.initialize(&mut ctx, false, false).unwrap();
        let chunk = ctx.compile("bad", r#"error("entry failed");"#).unwrap();
        let err = ctx
            .call(&runner, &[Value::Func(chunk), Value::Nil])
            .unwrap_err();
        assert!(err.message.contains("entry failed"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("entry failed"), "{text}");
    }
}
