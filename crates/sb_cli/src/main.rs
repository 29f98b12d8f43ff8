use std::path::PathBuf;
use std::sync::Arc;

use sb_host::{Host, protected_call};
use sb_script::{Context, Value};

mod args;
mod console;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const PROG_NAME: &str = "sbus";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match args::parse_args() {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("{msg}");
            return 2;
        }
    };

    let host = Host::new();
    let mut ctx = Context::new();
    ctx.set_args(cli.script_args.clone());
    ctx.set_global("PROGNAME", Value::str(PROG_NAME));
    if let Ok(exe) = std::env::current_exe() {
        ctx.set_global("PROGPATH", Value::str(&exe.to_string_lossy()));
    }
    if let Some(script) = &cli.script {
        ctx.set_global("MAINSCRIPT", Value::str(script));
    }
    install_setlogpath(&host, &mut ctx);
    if let Ok(cwd) = std::env::current_dir() {
        ctx.add_module_path(cwd);
    }

    let interactive = cli.script.is_none();
    if interactive {
        console::register(&host, &mut ctx);
    }

    let runner = match host.initialize(&mut ctx, interactive, cli.debug) {
        Ok(runner) => runner,
        Err(e) => {
            let msg = ctx
                .take_error()
                .map(|err| err.to_string())
                .unwrap_or_else(|| e.to_string());
            host.logger().log_message(Some(PROG_NAME), &msg);
            return 1;
        }
    };

    // interactive sessions run to completion inside initialize
    let Some(script) = cli.script else {
        return 0;
    };

    let source = match std::fs::read_to_string(&script) {
        Ok(source) => source,
        Err(e) => {
            host.logger()
                .log_message(Some(PROG_NAME), &format!("cannot open {script}: {e}"));
            return 1;
        }
    };
    let chunk = match ctx.compile(&script, &source) {
        Ok(chunk) => chunk,
        Err(e) => {
            host.logger().log_message(Some(PROG_NAME), &e.to_string());
            return 1;
        }
    };

    let argv: Vec<Value> = cli.script_args.iter().map(|a| Value::str(a)).collect();
    let status = protected_call(&mut ctx, &runner, &[Value::Func(chunk), Value::list(argv)]);
    match host.report(&mut ctx, status) {
        // a return value outside i32 must not alias a clean exit
        Ok(Value::Int(code)) => i32::try_from(code).unwrap_or(1),
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Scripts redirect their own logging; `setlogpath(nil)` restores the
/// stderr fallback.
fn install_setlogpath(host: &Host, ctx: &mut Context) {
    let logger = host.logger().clone();
    ctx.set_global(
        "setlogpath",
        Value::Native(Arc::new(move |_ctx, argv| match argv.first() {
            Some(Value::Str(path)) => {
                logger.set_log_path(Some(PathBuf::from(&**path)));
                Ok(Value::Nil)
            }
            Some(Value::Nil) | None => {
                logger.set_log_path(None);
                Ok(Value::Nil)
            }
            Some(other) => Err(format!(
                "setlogpath expects a path string, got {}",
                other.type_name()
            )),
        })),
    );
}
