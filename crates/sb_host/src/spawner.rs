//! Worker spawning.
//!
//! A worker is one OS thread bound to one child context and one compiled
//! entry function. Spawn-time failures (bootstrap, compile, thread start)
//! surface synchronously in the parent with no thread started and no
//! context leaked; once the thread is running, the worker is
//! fire-and-forget and its failures only reach the logger.

use std::thread;

use sb_script::{Chunk, Context, ScriptError, Value};

use crate::error::{HostError, ThreadStartReason};
use crate::host::Host;
use crate::interrupt;
use crate::registry;

impl Host {
    /// Create an isolated child context, bootstrap it with the parent's
    /// debug flag, merge the parent's registry in (child entries win),
    /// compile `source`, and launch it on its own thread.
    pub fn spawn(&self, parent: &mut Context, source: &str) -> Result<(), HostError> {
        self.spawn_with(parent, source, |body| {
            thread::Builder::new()
                .name("sb-worker".to_string())
                .spawn(body)
                .map(drop)
        })
    }

    // thread launch is injectable so start failures can be exercised
    fn spawn_with(
        &self,
        parent: &mut Context,
        source: &str,
        launch: impl FnOnce(Box<dyn FnOnce() + Send + 'static>) -> std::io::Result<()>,
    ) -> Result<(), HostError> {
        let mut child = Context::new();

        let runner = match self.initialize(&mut child, false, parent.is_debug()) {
            Ok(runner) => runner,
            Err(err) => {
                if let Some(child_err) = child.take_error() {
                    parent.set_error(child_err);
                }
                return Err(err);
            }
        };

        registry::merge_registries(parent, &mut child);

        // the buffer itself names the chunk, so compile diagnostics quote it
        let chunk = match child.compile(source, source) {
            Ok(chunk) => chunk,
            Err(err) => {
                parent.set_error(err.clone());
                return Err(HostError::Compile(err));
            }
        };

        let host = self.clone();
        let spawned = launch(Box::new(move || worker_main(host, child, runner, chunk)));
        if let Err(io_err) = spawned {
            // the body (and with it the child context) is dropped here
            let reason = ThreadStartReason::from_os_code(io_err.raw_os_error());
            let err = HostError::ThreadStart(reason);
            parent.set_error(ScriptError::new(err.to_string()));
            return Err(err);
        }
        Ok(())
    }
}

/// Worker thread body: run the entry function inside a protected call,
/// report any failure, and release the child context unconditionally.
fn worker_main(host: Host, mut ctx: Context, runner: Value, chunk: Chunk) {
    let result = interrupt::protected_call(&mut ctx, &runner, &[Value::Func(chunk), Value::Nil]);
    let _ = host.report(&mut ctx, result);
    // ctx drops here, success or failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn fresh_parent(host: &Host) -> Context {
        let mut parent = Context::new();
        host.initialize(&mut parent, false, false).unwrap();
        parent
    }

    fn wait_for_log(path: &std::path::Path, needle: &str) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let text = std::fs::read_to_string(path).unwrap_or_default();
            if text.contains(needle) {
                return text;
            }
            if Instant::now() > deadline {
                panic!("log never contained {needle:?}; had: {text:?}");
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn malformed_source_is_a_synchronous_compile_error() {
        let host = Host::new();
        let mut parent = fresh_parent(&host);
        let err = host.spawn(&mut parent, "malformed{{{").unwrap_err();
        assert!(matches!(err, HostError::Compile(_)));
        assert!(parent.error().is_some());

        // the parent context is otherwise unaffected
        let _ = parent.take_error();
        let v = parent.do_string("after", "return 5;").unwrap();
        assert!(v.eq_value(&Value::Int(5)));
    }

    #[test]
    fn thread_start_failure_surfaces_in_the_parent_with_no_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("start.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut parent = fresh_parent(&host);
        let err = host
            .spawn_with(&mut parent, r#"error("never ran");"#, |_body| {
                Err(std::io::Error::from_raw_os_error(libc::EAGAIN))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            HostError::ThreadStart(ThreadStartReason::LimitExceeded)
        ));
        let parent_err = parent.take_error().unwrap();
        assert!(
            parent_err.message.contains("too many threads"),
            "{}",
            parent_err.message
        );

        // the worker body was dropped unrun: nothing reached the log
        thread::sleep(Duration::from_millis(50));
        assert_eq!(std::fs::read_to_string(&path).unwrap_or_default(), "");
    }

    #[test]
    fn worker_failures_reach_the_log_fire_and_forget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut parent = fresh_parent(&host);
        host.spawn(&mut parent, r#"error("worker boom");"#).unwrap();

        let text = wait_for_log(&path, "worker boom");
        assert!(text.contains("worker boom"));
        // the spawner observed nothing: no error raised in the parent
        assert!(parent.error().is_none());
    }

    #[test]
    fn worker_runs_isolated_from_the_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("isolated.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut parent = fresh_parent(&host);
        parent.set_global("shared", Value::Int(1));
        // the worker cannot see the parent's globals
        host.spawn(&mut parent, "return shared;").unwrap();

        let text = wait_for_log(&path, "undefined identifier 'shared'");
        assert!(text.contains("shared"), "{text}");
        assert!(parent.global("shared").unwrap().eq_value(&Value::Int(1)));
    }

    #[test]
    fn child_inherits_the_parent_debug_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut parent = Context::new();
        host.initialize(&mut parent, false, true).unwrap();
        // a worker script can observe nothing directly, so make it fail if
        // the flag was not propagated: debug rotates the search order, and
        // the bootstrap chunk still resolved cothread through preload
        host.spawn(&mut parent, r#"error("debug child ran");"#).unwrap();
        wait_for_log(&path, "debug child ran");
    }

    #[test]
    fn spawn_through_the_bus_capability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.log");
        let host = Host::new();
        host.logger().set_log_path(Some(path.clone()));

        let mut parent = fresh_parent(&host);
        parent
            .do_string(
                "t",
                r#"
                let bus = require("bus");
                bus.spawn("error(\"spawned via bus\");");
                "#,
            )
            .unwrap();
        wait_for_log(&path, "spawned via bus");
    }

    #[test]
    fn bus_spawn_surfaces_compile_errors_to_the_calling_script() {
        let host = Host::new();
        let mut parent = fresh_parent(&host);
        let err = parent
            .do_string(
                "t",
                r#"
                let bus = require("bus");
                bus.spawn("malformed{{{");
                "#,
            )
            .unwrap_err();
        assert!(err.message.contains("expected"), "{}", err.message);
    }
}
