//! Line-reading console for interactive sessions.
//!
//! Registered as the `console` capability; the bootstrap sequence requires
//! it and hands it the entry-point runner. Each input line is compiled as
//! its own chunk and dispatched through the runner, so console chunks see
//! the same interrupt and reporting path as scripts.

use std::io::{BufRead, Write};
use std::sync::Arc;

use sb_host::Host;
use sb_script::{Context, Value};

pub(crate) fn register(host: &Host, ctx: &mut Context) {
    let host = host.clone();
    ctx.preload(
        "console",
        Arc::new(move |_ctx| {
            let host = host.clone();
            Ok(Value::Native(Arc::new(move |ctx, args| {
                let runner = args.first().cloned().unwrap_or(Value::Nil);
                run_loop(&host, ctx, &runner)?;
                Ok(Value::Nil)
            })))
        }),
    );
}

fn run_loop(host: &Host, ctx: &mut Context, runner: &Value) -> Result<(), String> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                println!();
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => return Err(format!("console input failed: {e}")),
        }
        let source = line.trim();
        if source.is_empty() {
            continue;
        }
        let chunk = match ctx.compile("stdin", source) {
            Ok(chunk) => chunk,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        let status = ctx.call(runner, &[Value::Func(chunk), Value::Nil]);
        match host.report(ctx, status) {
            Ok(Value::Nil) | Err(_) => {}
            Ok(value) => println!("{}", value.render()),
        }
    }
}
