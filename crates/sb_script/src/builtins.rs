//! Base language facilities installed by `open_base`.

use std::sync::Arc;

use crate::context::Context;
use crate::value::{NativeFn, Value};

fn native(f: impl Fn(&mut Context, &[Value]) -> Result<Value, String> + Send + Sync + 'static) -> NativeFn {
    Arc::new(f)
}

fn want_str(args: &[Value], i: usize, who: &str) -> Result<Arc<str>, String> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s.clone()),
        other => Err(format!(
            "{who} expects a string argument, got {}",
            other.map(|v| v.type_name()).unwrap_or("nothing")
        )),
    }
}

fn want_int(args: &[Value], i: usize, who: &str) -> Result<i64, String> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n),
        other => Err(format!(
            "{who} expects an int argument, got {}",
            other.map(|v| v.type_name()).unwrap_or("nothing")
        )),
    }
}

/// Install the base facilities into a context's globals.
pub fn open_base(ctx: &mut Context) {
    ctx.set_global(
        "print",
        Value::Native(native(|_ctx, args| {
            let parts: Vec<String> = args.iter().map(|v| v.render()).collect();
            println!("{}", parts.join("\t"));
            Ok(Value::Nil)
        })),
    );

    ctx.set_global(
        "tostring",
        Value::Native(native(|_ctx, args| {
            let v = args.first().cloned().unwrap_or(Value::Nil);
            Ok(Value::str(&v.render()))
        })),
    );

    ctx.set_global(
        "typeof",
        Value::Native(native(|_ctx, args| {
            let v = args.first().cloned().unwrap_or(Value::Nil);
            Ok(Value::str(v.type_name()))
        })),
    );

    ctx.set_global(
        "error",
        Value::Native(native(|_ctx, args| {
            let msg = match args.first() {
                Some(v) => v
                    .as_text()
                    .unwrap_or_else(|| "(error object is not a string)".to_string()),
                None => "(error object is not a string)".to_string(),
            };
            Err(msg)
        })),
    );

    ctx.set_global(
        "require",
        Value::Native(native(|ctx, args| {
            let name = want_str(args, 0, "require")?;
            ctx.require(&name).map_err(|e| e.message)
        })),
    );

    ctx.set_global(
        "args",
        Value::Native(native(|ctx, _args| {
            let items: Vec<Value> = ctx.args().iter().map(|s| Value::str(s)).collect();
            Ok(Value::list(items))
        })),
    );

    ctx.set_global(
        "list",
        Value::Native(native(|_ctx, args| Ok(Value::list(args.to_vec())))),
    );

    ctx.set_global(
        "len",
        Value::Native(native(|_ctx, args| match args.first() {
            Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
            Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
            other => Err(format!(
                "len expects a string or list, got {}",
                other.map(|v| v.type_name()).unwrap_or("nothing")
            )),
        })),
    );

    // zero-based list indexing
    ctx.set_global(
        "get",
        Value::Native(native(|_ctx, args| {
            let Some(Value::List(items)) = args.first() else {
                return Err("get expects a list argument".to_string());
            };
            let i = want_int(args, 1, "get")?;
            if i < 0 || i as usize >= items.len() {
                return Err("index out of bounds".to_string());
            }
            Ok(items[i as usize].clone())
        })),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Result<Value, crate::ScriptError> {
        let mut ctx = Context::new();
        open_base(&mut ctx);
        ctx.do_string("test", src)
    }

    #[test]
    fn error_builtin_raises() {
        let err = run(r#"error("boom");"#).unwrap_err();
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn error_with_non_text_value_uses_placeholder() {
        let err = run("error(true);").unwrap_err();
        assert_eq!(err.message, "(error object is not a string)");
    }

    #[test]
    fn list_helpers() {
        let v = run("return len(list(1, 2, 3));").unwrap();
        assert!(v.eq_value(&Value::Int(3)));
        let v = run("return get(list(10, 20), 1);").unwrap();
        assert!(v.eq_value(&Value::Int(20)));
        assert!(run("return get(list(1), 5);").is_err());
    }

    #[test]
    fn tostring_and_typeof() {
        let v = run("return tostring(42);").unwrap();
        assert!(v.eq_value(&Value::str("42")));
        let v = run(r#"return typeof("x");"#).unwrap();
        assert!(v.eq_value(&Value::str("string")));
    }

    #[test]
    fn args_reflect_context_arguments() {
        let mut ctx = Context::new();
        open_base(&mut ctx);
        ctx.set_args(vec!["one".into(), "two".into()]);
        let v = ctx.do_string("test", "return get(args(), 1);").unwrap();
        assert!(v.eq_value(&Value::str("two")));
    }
}
