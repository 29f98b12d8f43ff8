//! The fixed capability catalog.
//!
//! Bootstrap registers each name as a lazy provider; nothing here runs
//! until a script's first `require`. The bus-stack entries (`socket.core`,
//! `lsqlite3`, `lce`, `ssl`, `idl`, `orb`, `scs`) are opaque external
//! collaborators: their providers materialize a minimal module table and
//! hand off from there.

use std::sync::Arc;

use sb_script::{Context, ModuleInstance, NativeFn, Provider, Value};
use uuid::Uuid;

use crate::host::Host;

/// Every name bootstrap registers, in registration order.
pub const CATALOG: &[&str] = &[
    "uuid",
    "lfs",
    "vararg",
    "struct",
    "socket.core",
    "lsqlite3",
    "lce",
    "ssl",
    "cothread",
    "tuple",
    "idl",
    "orb",
    "scs",
    "bus",
];

const OPAQUE: &[&str] = &["socket.core", "lsqlite3", "lce", "ssl", "idl", "orb", "scs"];

pub fn register_catalog(host: &Host, ctx: &mut Context) {
    ctx.preload("uuid", uuid_provider());
    ctx.preload("lfs", lfs_provider());
    ctx.preload("vararg", vararg_provider());
    ctx.preload("struct", struct_provider());
    ctx.preload("cothread", cothread_provider());
    ctx.preload("tuple", tuple_provider());
    for name in OPAQUE {
        ctx.preload(name, opaque_provider(name));
    }
    ctx.preload("bus", bus_provider(host));
}

fn native(
    f: impl Fn(&mut Context, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
) -> NativeFn {
    Arc::new(f)
}

fn module(name: &str, members: Vec<(&str, Value)>) -> Value {
    let mut m = ModuleInstance::new(name);
    for (member, value) in members {
        m.members.insert(member.to_string(), value);
    }
    Value::Module(Arc::new(m))
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

fn uuid_provider() -> Provider {
    Arc::new(|_ctx| {
        Ok(module(
            "uuid",
            vec![
                (
                    "generate",
                    Value::Native(native(|_ctx, _args| {
                        Ok(Value::str(&Uuid::new_v4().to_string()))
                    })),
                ),
                (
                    "is_valid",
                    Value::Native(native(|_ctx, args| {
                        let s = want_str(args, 0, "uuid.is_valid")?;
                        Ok(Value::Bool(Uuid::parse_str(&s).is_ok()))
                    })),
                ),
            ],
        ))
    })
}

fn lfs_provider() -> Provider {
    Arc::new(|_ctx| {
        Ok(module(
            "lfs",
            vec![
                (
                    "currentdir",
                    Value::Native(native(|_ctx, _args| {
                        std::env::current_dir()
                            .map(|p| Value::str(&p.to_string_lossy()))
                            .map_err(|e| e.to_string())
                    })),
                ),
                (
                    "exists",
                    Value::Native(native(|_ctx, args| {
                        let path = want_str(args, 0, "lfs.exists")?;
                        Ok(Value::Bool(std::path::Path::new(&*path).exists()))
                    })),
                ),
                (
                    "kind",
                    Value::Native(native(|_ctx, args| {
                        let path = want_str(args, 0, "lfs.kind")?;
                        match std::fs::metadata(&*path) {
                            Ok(meta) if meta.is_dir() => Ok(Value::str("directory")),
                            Ok(_) => Ok(Value::str("file")),
                            Err(_) => Ok(Value::Nil),
                        }
                    })),
                ),
                (
                    "mkdir",
                    Value::Native(native(|_ctx, args| {
                        let path = want_str(args, 0, "lfs.mkdir")?;
                        std::fs::create_dir(&*path)
                            .map(|_| Value::Bool(true))
                            .map_err(|e| e.to_string())
                    })),
                ),
            ],
        ))
    })
}

fn vararg_provider() -> Provider {
    Arc::new(|_ctx| {
        Ok(module(
            "vararg",
            vec![
                (
                    "pack",
                    Value::Native(native(|_ctx, args| Ok(Value::list(args.to_vec())))),
                ),
                (
                    "count",
                    Value::Native(native(|_ctx, args| match args.first() {
                        Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
                        _ => Err("vararg.count expects a list".to_string()),
                    })),
                ),
            ],
        ))
    })
}

fn struct_provider() -> Provider {
    Arc::new(|_ctx| {
        Ok(module(
            "struct",
            vec![
                (
                    // big-endian fixed-width pack, hex text form
                    "pack",
                    Value::Native(native(|_ctx, args| {
                        let value = want_int(args, 0, "struct.pack")?;
                        let width = want_int(args, 1, "struct.pack")?;
                        if !(1..=8).contains(&width) {
                            return Err("struct.pack width must be 1..=8".to_string());
                        }
                        let digits = (width as usize) * 2;
                        let mask = if width == 8 {
                            u64::MAX
                        } else {
                            (1u64 << (width * 8)) - 1
                        };
                        Ok(Value::str(&format!(
                            "{:0digits$x}",
                            (value as u64) & mask
                        )))
                    })),
                ),
                (
                    "unpack",
                    Value::Native(native(|_ctx, args| {
                        let s = want_str(args, 0, "struct.unpack")?;
                        u64::from_str_radix(&s, 16)
                            .map(|n| Value::Int(n as i64))
                            .map_err(|_| "struct.unpack: malformed packed value".to_string())
                    })),
                ),
            ],
        ))
    })
}

fn cothread_provider() -> Provider {
    Arc::new(|_ctx| {
        Ok(module(
            "cothread",
            vec![
                (
                    // wrap a function and its argument as a ready task
                    "step",
                    Value::Native(native(|_ctx, args| {
                        let f = args.first().cloned().unwrap_or(Value::Nil);
                        let a = args.get(1).cloned().unwrap_or(Value::Nil);
                        Ok(Value::list(vec![f, a]))
                    })),
                ),
                (
                    // drive a task to completion; unexpected failures go to
                    // the wired log destination before unwinding
                    "run",
                    Value::Native(native(|ctx, args| {
                        let Some(Value::List(task)) = args.first() else {
                            return Err("cothread.run expects a task".to_string());
                        };
                        let f = task.first().cloned().unwrap_or(Value::Nil);
                        let a = task.get(1).cloned().unwrap_or(Value::Nil);
                        match ctx.call(&f, &[a]) {
                            Ok(v) => Ok(v),
                            Err(e) => {
                                if let Some(hook) = ctx.log_hook() {
                                    hook(None, &e.to_string());
                                }
                                Err(e.to_string())
                            }
                        }
                    })),
                ),
            ],
        ))
    })
}

fn tuple_provider() -> Provider {
    // unit separator keeps encoded fields unambiguous for plain text
    const SEP: char = '\u{1f}';
    Arc::new(move |_ctx| {
        Ok(module(
            "tuple",
            vec![
                (
                    "encode",
                    Value::Native(native(|_ctx, args| {
                        let Some(Value::List(items)) = args.first() else {
                            return Err("tuple.encode expects a list".to_string());
                        };
                        let mut parts = Vec::with_capacity(items.len());
                        for item in items.iter() {
                            match item.as_text() {
                                Some(text) => parts.push(text),
                                None => {
                                    return Err(format!(
                                        "tuple.encode: {} is not encodable",
                                        item.type_name()
                                    ));
                                }
                            }
                        }
                        Ok(Value::str(&parts.join(&SEP.to_string())))
                    })),
                ),
                (
                    "decode",
                    Value::Native(native(|_ctx, args| {
                        let s = want_str(args, 0, "tuple.decode")?;
                        let items: Vec<Value> =
                            s.split(SEP).map(|part| Value::str(part)).collect();
                        Ok(Value::list(items))
                    })),
                ),
            ],
        ))
    })
}

fn opaque_provider(name: &'static str) -> Provider {
    Arc::new(move |_ctx| Ok(module(name, vec![("name", Value::str(name))])))
}

fn bus_provider(host: &Host) -> Provider {
    let host = host.clone();
    Arc::new(move |_ctx| {
        let spawn_host = host.clone();
        Ok(module(
            "bus",
            vec![(
                "spawn",
                Value::Native(native(move |ctx, args| {
                    let code = want_str(args, 0, "bus.spawn")?;
                    spawn_host
                        .spawn(ctx, &code)
                        .map(|_| Value::Nil)
                        .map_err(|e| e.to_string())
                })),
            )],
        ))
    })
}
