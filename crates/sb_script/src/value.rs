//! Runtime value representation.
//!
//! Every variant is `Send + Sync` so a whole [`Context`](crate::Context) can
//! move onto a worker thread. There are no mutable reference values; all
//! mutation goes through globals and locals, which belong to exactly one
//! thread.

use std::fmt;
use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;

use crate::Context;
use crate::ast::FuncDef;

pub type FastHashMap<K, V> = HashMap<K, V, RandomState>;

pub fn fast_map_new<K: Eq + std::hash::Hash, V>() -> FastHashMap<K, V> {
    HashMap::with_hasher(RandomState::new())
}

/// Native function callable from script code.
///
/// An `Arc<dyn Fn>` rather than a plain fn pointer: host-registered natives
/// capture shared state (logger, host handle) at registration time.
pub type NativeFn = Arc<dyn Fn(&mut Context, &[Value]) -> Result<Value, String> + Send + Sync>;

/// Immutable table of named members, materialized by a capability provider.
pub struct ModuleInstance {
    pub name: String,
    pub members: FastHashMap<String, Value>,
}

impl ModuleInstance {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: fast_map_new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    List(Arc<[Value]>),
    Func(Arc<FuncDef>),
    Native(NativeFn),
    Module(Arc<ModuleInstance>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::from(items))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Func(_) => "function",
            Value::Native(_) => "function",
            Value::Module(_) => "module",
        }
    }

    /// Text rendering for `tostring`, logging and the console.
    pub fn render(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Str(s) => s.to_string(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| v.render()).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Func(f) => format!("function '{}'", f.name),
            Value::Native(_) => "builtin function".to_string(),
            Value::Module(m) => format!("module '{}'", m.name),
        }
    }

    /// Whether the value has a direct text form (strings and numbers).
    /// Everything else gets the fixed placeholder when reported.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_string()),
            Value::Int(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn eq_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_value(y))
            }
            (Value::Func(a), Value::Func(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Native(_) => f.write_str("Native(..)"),
            Value::Module(m) => write!(f, "Module({})", m.name),
            Value::Nil => f.write_str("Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => f.debug_tuple("List").field(&items.len()).finish(),
            Value::Func(d) => write!(f, "Func({})", d.name),
        }
    }
}
