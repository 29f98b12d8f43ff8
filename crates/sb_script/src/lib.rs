//! A small embeddable scripting engine.
//!
//! The embedding surface is [`Context`]: compile a source buffer into a
//! [`Chunk`], run it, register lazy capability providers, and cancel
//! execution cooperatively through a [`CancelToken`] checked at call,
//! return, and periodic statement checkpoints.

pub mod ast;
mod builtins;
mod cancel;
mod context;
mod error;
mod exec;
mod heap;
mod lexer;
mod parser;
mod value;

pub use builtins::open_base;
pub use cancel::CancelToken;
pub use context::{Chunk, Context, LogHook, Provider, Searcher};
pub use error::ScriptError;
pub use value::{FastHashMap, ModuleInstance, NativeFn, Value, fast_map_new};
