//! Cross-thread cancellation of a context inside a protected call.

use std::thread;
use std::time::Duration;

use sb_host::{Host, protected_run};
use sb_script::Context;

#[test]
fn trigger_from_another_thread_unwinds_at_a_checkpoint() {
    let host = Host::new();
    let mut ctx = Context::new();
    host.initialize(&mut ctx, false, false).unwrap();

    let token = ctx.cancel_token();
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        token.trigger();
    });

    let chunk = ctx.compile("spin", "let i = 0; while true { i = i + 1; }").unwrap();
    let err = protected_run(&mut ctx, &chunk).unwrap_err();
    assert_eq!(err.message, "interrupted!");
    assert!(err.traceback.is_some());
    trigger.join().unwrap();

    // exactly one checkpoint failed; the context is reusable afterwards
    let v = ctx.do_string("after", "return 9;").unwrap();
    assert!(v.eq_value(&sb_script::Value::Int(9)));
}
