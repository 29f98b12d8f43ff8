//! Execution contexts.
//!
//! A [`Context`] is one independent instance of the engine: its own globals,
//! preload registry, loaded-module cache, pools, and cancellation token.
//! Exactly one thread touches a context after creation; a context is `Send`
//! so it can be handed to the worker thread that will own it.

use std::path::PathBuf;
use std::sync::Arc;

use crate::ast::FuncDef;
use crate::cancel::CancelToken;
use crate::error::ScriptError;
use crate::heap::Pools;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::{FastHashMap, Value, fast_map_new};

/// Lazy capability provider: a zero-argument factory materializing a module
/// value on first `require`. `Send + Sync` so registries can be merged into
/// a child context bound for another thread.
pub type Provider = Arc<dyn Fn(&mut Context) -> Result<Value, String> + Send + Sync>;

/// Destination for engine-level failure messages (the error→log adapter the
/// host wires in at bootstrap).
pub type LogHook = Arc<dyn Fn(Option<&str>, &str) + Send + Sync>;

/// A compiled chunk: a zero-parameter function named after its source.
pub type Chunk = Arc<FuncDef>;

/// Module-resolution strategy, consulted in order after the loaded cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Searcher {
    /// The preload registry of lazy providers.
    Preload,
    /// On-disk modules under the configured module path.
    File,
}

pub(crate) struct FrameInfo {
    pub name: String,
    pub call_line: u32,
}

pub struct Context {
    pub(crate) globals: FastHashMap<String, Value>,
    preload: FastHashMap<String, Provider>,
    loaded: FastHashMap<String, Value>,
    searchers: Vec<Searcher>,
    module_path: Vec<PathBuf>,
    debug: bool,
    pub(crate) cancel: CancelToken,
    pub(crate) pools: Pools,
    pub(crate) steps: u64,
    pub(crate) frames: Vec<FrameInfo>,
    log_hook: Option<LogHook>,
    error_slot: Option<ScriptError>,
    args: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            globals: fast_map_new(),
            preload: fast_map_new(),
            loaded: fast_map_new(),
            searchers: vec![Searcher::Preload, Searcher::File],
            module_path: Vec::new(),
            debug: false,
            cancel: CancelToken::new(),
            pools: Pools::new(),
            steps: 0,
            frames: Vec::new(),
            log_hook: None,
            error_slot: None,
            args: Vec::new(),
        }
    }

    // ---- globals ----

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    // ---- debug mode ----

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Rotate the searcher order: the first strategy moves to the back, so
    /// the most-recently-preferred strategy runs first. Debug bootstrap uses
    /// this to let on-disk modules shadow preloaded built-ins.
    pub fn rotate_searchers(&mut self) {
        if !self.searchers.is_empty() {
            let first = self.searchers.remove(0);
            self.searchers.push(first);
        }
    }

    pub fn searchers(&self) -> &[Searcher] {
        &self.searchers
    }

    // ---- preload registry ----

    /// Record how to obtain a capability on first `require`. Never runs the
    /// provider.
    pub fn preload(&mut self, name: &str, provider: Provider) {
        self.preload.insert(name.to_string(), provider);
    }

    /// Insert only if `name` is absent; existing entries are never
    /// overwritten. Returns whether an insert happened.
    pub fn preload_insert_absent(&mut self, name: &str, provider: Provider) -> bool {
        if self.preload.contains_key(name) {
            return false;
        }
        self.preload.insert(name.to_string(), provider);
        true
    }

    pub fn preload_entries(&self) -> impl Iterator<Item = (&str, &Provider)> {
        self.preload.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn preload_provider(&self, name: &str) -> Option<Provider> {
        self.preload.get(name).cloned()
    }

    pub fn preload_len(&self) -> usize {
        self.preload.len()
    }

    // ---- module resolution ----

    pub fn add_module_path(&mut self, dir: PathBuf) {
        self.module_path.push(dir);
    }

    pub fn require(&mut self, name: &str) -> Result<Value, ScriptError> {
        if let Some(v) = self.loaded.get(name) {
            return Ok(v.clone());
        }
        let order = self.searchers.clone();
        for searcher in order {
            let found = match searcher {
                Searcher::Preload => self.require_from_preload(name)?,
                Searcher::File => self.require_from_file(name)?,
            };
            if let Some(value) = found {
                self.loaded.insert(name.to_string(), value.clone());
                return Ok(value);
            }
        }
        Err(ScriptError::new(format!("module '{name}' not found")))
    }

    fn require_from_preload(&mut self, name: &str) -> Result<Option<Value>, ScriptError> {
        let Some(provider) = self.preload.get(name).cloned() else {
            return Ok(None);
        };
        let value = provider(self).map_err(ScriptError::new)?;
        Ok(Some(value))
    }

    fn require_from_file(&mut self, name: &str) -> Result<Option<Value>, ScriptError> {
        let relative = PathBuf::from(name.replace('.', "/")).with_extension("sb");
        for dir in self.module_path.clone() {
            let candidate = dir.join(&relative);
            let Ok(source) = std::fs::read_to_string(&candidate) else {
                continue;
            };
            let chunk = self.compile(&candidate.to_string_lossy(), &source)?;
            let value = self.call(&Value::Func(chunk), &[])?;
            return Ok(Some(value));
        }
        Ok(None)
    }

    // ---- compilation ----

    /// Compile a source buffer into a chunk. Never executes anything.
    pub fn compile(&mut self, chunk_name: &str, source: &str) -> Result<Chunk, ScriptError> {
        let tokens = Lexer::new(chunk_name, source).lex()?;
        let body = Parser::new(chunk_name, tokens).parse_chunk()?;
        Ok(Arc::new(FuncDef {
            name: chunk_name.to_string(),
            params: Vec::new(),
            body,
        }))
    }

    /// Compile and immediately run a chunk, yielding its return value.
    pub fn do_string(&mut self, chunk_name: &str, source: &str) -> Result<Value, ScriptError> {
        let chunk = self.compile(chunk_name, source)?;
        self.call(&Value::Func(chunk), &[])
    }

    // ---- cancellation ----

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ---- reclamation ----

    pub fn gc_stop(&mut self) {
        self.pools.stop();
    }

    pub fn gc_restart(&mut self) {
        self.pools.restart();
    }

    /// One full, non-incremental reclamation pass.
    pub fn gc_collect(&mut self) {
        self.pools.collect_full();
    }

    // ---- error slot ----

    pub fn set_error(&mut self, err: ScriptError) {
        self.error_slot = Some(err);
    }

    pub fn take_error(&mut self) -> Option<ScriptError> {
        self.error_slot.take()
    }

    pub fn error(&self) -> Option<&ScriptError> {
        self.error_slot.as_ref()
    }

    // ---- host wiring ----

    pub fn set_log_hook(&mut self, hook: LogHook) {
        self.log_hook = Some(hook);
    }

    pub fn log_hook(&self) -> Option<LogHook> {
        self.log_hook.clone()
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
