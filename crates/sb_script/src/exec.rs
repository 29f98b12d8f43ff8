//! Tree-walking executor.
//!
//! Cancellation checkpoints sit at every call, every return, and on a
//! periodic statement-count boundary, so a triggered token unwinds script
//! execution at the next boundary it crosses.

use smallvec::SmallVec;

use crate::ast::{BinaryOp, Expr, FuncDef, Stmt, UnaryOp};
use crate::context::{Chunk, Context, FrameInfo};
use crate::error::ScriptError;
use crate::value::{FastHashMap, Value};

const MAX_CALL_DEPTH: usize = 200;
const TRACEBACK_FRAMES: usize = 20;
// Token poll interval in statements; calls and returns always poll.
const CHECKPOINT_MASK: u64 = 63;
const TRIM_MASK: u64 = 4095;

pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Locals {
    scopes: Vec<FastHashMap<String, Value>>,
}

impl Locals {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    fn define(&mut self, name: &str, value: Value) {
        if let Some(top) = self.scopes.last_mut() {
            top.insert(name.to_string(), value);
        }
    }
}

impl Context {
    /// Run a compiled chunk, yielding its return value (nil when the chunk
    /// falls off the end).
    pub fn run(&mut self, chunk: &Chunk) -> Result<Value, ScriptError> {
        self.call(&Value::Func(chunk.clone()), &[])
    }

    /// Call a function value with the given arguments. Missing arguments
    /// bind as nil, extras are ignored.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, ScriptError> {
        self.call_with_line(callee, args, 0)
    }

    fn call_with_line(
        &mut self,
        callee: &Value,
        args: &[Value],
        line: u32,
    ) -> Result<Value, ScriptError> {
        self.poll_cancel()?;
        match callee {
            Value::Func(def) => self.call_func(def.clone(), args, line),
            Value::Native(f) => {
                let f = f.clone();
                f(self, args).map_err(|msg| self.raise(msg))
            }
            other => Err(self.raise(format!("attempt to call a {} value", other.type_name()))),
        }
    }

    fn call_func(
        &mut self,
        def: std::sync::Arc<FuncDef>,
        args: &[Value],
        line: u32,
    ) -> Result<Value, ScriptError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(self.raise("call stack overflow".to_string()));
        }
        self.frames.push(FrameInfo {
            name: def.name.clone(),
            call_line: line,
        });

        let mut scope = self.pools.take_scope();
        for (i, param) in def.params.iter().enumerate() {
            scope.insert(
                param.clone(),
                args.get(i).cloned().unwrap_or(Value::Nil),
            );
        }
        let mut locals = Locals {
            scopes: vec![scope],
        };

        let flow = self.exec_block(&def.body, &mut locals);
        for scope in locals.scopes.drain(..) {
            self.pools.recycle_scope(scope);
        }

        let result = match flow {
            Ok(Flow::Return(v)) => Ok(v),
            Ok(Flow::Normal) => Ok(Value::Nil),
            Ok(Flow::Break) | Ok(Flow::Continue) => {
                Err(self.raise("'break' or 'continue' outside a loop".to_string()))
            }
            Err(e) => Err(e),
        };
        self.frames.pop();
        if result.is_ok() {
            self.poll_cancel()?;
        }
        result
    }

    fn exec_block(&mut self, stmts: &[Stmt], locals: &mut Locals) -> Result<Flow, ScriptError> {
        for stmt in stmts {
            self.checkpoint()?;
            match stmt {
                Stmt::Let { name, value } => {
                    let v = self.eval(value, locals)?;
                    locals.define(name, v);
                }
                Stmt::Assign { name, value } => {
                    let v = self.eval(value, locals)?;
                    if !locals.assign(name, v.clone()) {
                        self.globals.insert(name.clone(), v);
                    }
                }
                Stmt::FnDecl(def) => {
                    self.globals
                        .insert(def.name.clone(), Value::Func(def.clone()));
                }
                Stmt::If {
                    cond,
                    then_body,
                    else_body,
                } => {
                    let branch = if self.eval(cond, locals)?.truthy() {
                        then_body
                    } else {
                        else_body
                    };
                    let flow = self.exec_scoped(branch, locals)?;
                    if !matches!(flow, Flow::Normal) {
                        return Ok(flow);
                    }
                }
                Stmt::While { cond, body } => loop {
                    self.checkpoint()?;
                    if !self.eval(cond, locals)?.truthy() {
                        break;
                    }
                    match self.exec_scoped(body, locals)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                },
                Stmt::Return { value, .. } => {
                    let v = match value {
                        Some(expr) => self.eval(expr, locals)?,
                        None => Value::Nil,
                    };
                    return Ok(Flow::Return(v));
                }
                Stmt::Break { .. } => return Ok(Flow::Break),
                Stmt::Continue { .. } => return Ok(Flow::Continue),
                Stmt::Expr(expr) => {
                    self.eval(expr, locals)?;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, stmts: &[Stmt], locals: &mut Locals) -> Result<Flow, ScriptError> {
        let scope = self.pools.take_scope();
        locals.scopes.push(scope);
        let flow = self.exec_block(stmts, locals);
        if let Some(scope) = locals.scopes.pop() {
            self.pools.recycle_scope(scope);
        }
        flow
    }

    fn eval(&mut self, expr: &Expr, locals: &mut Locals) -> Result<Value, ScriptError> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Str(s) => {
                let interned = self.pools.intern(s);
                Ok(Value::Str(interned))
            }
            Expr::Ident(name) => {
                if let Some(v) = locals.lookup(name) {
                    return Ok(v.clone());
                }
                if let Some(v) = self.globals.get(name) {
                    return Ok(v.clone());
                }
                Err(self.raise(format!("undefined identifier '{name}'")))
            }
            Expr::Field { object, name } => {
                let obj = self.eval(object, locals)?;
                match obj {
                    Value::Module(m) => m.member(name).cloned().ok_or_else(|| {
                        self.raise(format!("module '{}' has no member '{name}'", m.name))
                    }),
                    other => Err(self.raise(format!(
                        "attempt to index a {} value",
                        other.type_name()
                    ))),
                }
            }
            Expr::Call { callee, args, line } => {
                let f = self.eval(callee, locals)?;
                let mut argv: SmallVec<[Value; 8]> = SmallVec::with_capacity(args.len());
                for a in args {
                    argv.push(self.eval(a, locals)?);
                }
                self.call_with_line(&f, &argv, *line)
            }
            Expr::Unary { op, operand, .. } => {
                let v = self.eval(operand, locals)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                    UnaryOp::Neg => match v {
                        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
                        other => Err(self.raise(format!(
                            "attempt to negate a {} value",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => self.eval_binary(*op, lhs, rhs, locals),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        locals: &mut Locals,
    ) -> Result<Value, ScriptError> {
        // short-circuit forms first
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let l = self.eval(lhs, locals)?;
            return match op {
                BinaryOp::And if !l.truthy() => Ok(l),
                BinaryOp::Or if l.truthy() => Ok(l),
                _ => self.eval(rhs, locals),
            };
        }

        let l = self.eval(lhs, locals)?;
        let r = self.eval(rhs, locals)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(l.eq_value(&r))),
            BinaryOp::Ne => Ok(Value::Bool(!l.eq_value(&r))),
            BinaryOp::Add => match (&l, &r) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
                (Value::Str(a), Value::Str(b)) => {
                    let joined = format!("{a}{b}");
                    let interned = self.pools.intern(&joined);
                    Ok(Value::Str(interned))
                }
                _ => Err(self.arith_type_error("+", &l, &r)),
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let (Value::Int(a), Value::Int(b)) = (&l, &r) else {
                    return Err(self.arith_type_error(op_symbol(op), &l, &r));
                };
                match op {
                    BinaryOp::Sub => Ok(Value::Int(a.wrapping_sub(*b))),
                    BinaryOp::Mul => Ok(Value::Int(a.wrapping_mul(*b))),
                    BinaryOp::Div | BinaryOp::Rem if *b == 0 => {
                        Err(self.raise("division by zero".to_string()))
                    }
                    BinaryOp::Div => Ok(Value::Int(a.wrapping_div(*b))),
                    _ => Ok(Value::Int(a.wrapping_rem(*b))),
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&l, &r) {
                    (Value::Int(a), Value::Int(b)) => a.cmp(b),
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => return Err(self.arith_type_error(op_symbol(op), &l, &r)),
                };
                let ok = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(ok))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        }
    }

    fn arith_type_error(&mut self, op: &str, l: &Value, r: &Value) -> ScriptError {
        self.raise(format!(
            "invalid operands to '{op}' ({} and {})",
            l.type_name(),
            r.type_name()
        ))
    }

    // ---- checkpoints ----

    fn checkpoint(&mut self) -> Result<(), ScriptError> {
        self.steps = self.steps.wrapping_add(1);
        if self.steps & CHECKPOINT_MASK == 0 {
            self.poll_cancel()?;
        }
        if self.steps & TRIM_MASK == 0 {
            self.pools.maybe_trim();
        }
        Ok(())
    }

    fn poll_cancel(&mut self) -> Result<(), ScriptError> {
        if self.cancel.take_triggered() {
            return Err(self.raise("interrupted!".to_string()));
        }
        Ok(())
    }

    /// Build a runtime error carrying a traceback of the live frames.
    fn raise(&self, message: String) -> ScriptError {
        let mut err = ScriptError::new(message);
        err.traceback = Some(self.render_traceback());
        err
    }

    fn render_traceback(&self) -> String {
        let mut tb = String::from("stack traceback:");
        for frame in self.frames.iter().rev().take(TRACEBACK_FRAMES) {
            if frame.call_line > 0 {
                tb.push_str(&format!(
                    "\n\tin function '{}' (called at line {})",
                    frame.name, frame.call_line
                ));
            } else {
                tb.push_str(&format!("\n\tin function '{}'", frame.name));
            }
        }
        if self.frames.len() > TRACEBACK_FRAMES {
            tb.push_str("\n\t...");
        }
        tb
    }
}

fn op_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

#[cfg(test)]
mod tests {
    use crate::{Context, Value};

    fn eval(src: &str) -> Result<Value, crate::ScriptError> {
        let mut ctx = Context::new();
        ctx.do_string("test", src)
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert!(eval("return 2 + 3 * 4;").unwrap().eq_value(&Value::Int(14)));
        assert!(eval("return (2 + 3) * 4;").unwrap().eq_value(&Value::Int(20)));
        assert!(eval("return 7 % 3;").unwrap().eq_value(&Value::Int(1)));
    }

    #[test]
    fn string_concat_and_compare() {
        assert!(eval(r#"return "a" + "b";"#).unwrap().eq_value(&Value::str("ab")));
        assert!(eval(r#"return "a" < "b";"#).unwrap().eq_value(&Value::Bool(true)));
    }

    #[test]
    fn functions_locals_and_loops() {
        let v = eval(
            r#"
            fn sum_to(n) {
                let total = 0;
                let i = 1;
                while i <= n {
                    total = total + i;
                    i = i + 1;
                }
                return total;
            }
            return sum_to(10);
            "#,
        )
        .unwrap();
        assert!(v.eq_value(&Value::Int(55)));
    }

    #[test]
    fn break_and_continue() {
        let v = eval(
            r#"
            let n = 0;
            let i = 0;
            while true {
                i = i + 1;
                if i > 10 { break; }
                if i % 2 == 0 { continue; }
                n = n + 1;
            }
            return n;
            "#,
        )
        .unwrap();
        assert!(v.eq_value(&Value::Int(5)));
    }

    #[test]
    fn missing_arguments_bind_nil() {
        let v = eval("fn f(a, b) { return b == nil; } return f(1);").unwrap();
        assert!(v.eq_value(&Value::Bool(true)));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = eval("return 1 / 0;").unwrap_err();
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn undefined_identifier_fails() {
        let err = eval("return nope;").unwrap_err();
        assert!(err.message.contains("undefined identifier 'nope'"));
    }

    #[test]
    fn errors_carry_a_traceback() {
        let err = eval(
            r#"
            fn inner() { return 1 / 0; }
            fn outer() { return inner(); }
            return outer();
            "#,
        )
        .unwrap_err();
        let tb = err.traceback.expect("traceback");
        assert!(tb.contains("in function 'inner'"), "{tb}");
        assert!(tb.contains("in function 'outer'"), "{tb}");
    }

    #[test]
    fn call_depth_is_bounded() {
        let err = eval("fn f() { return f(); } return f();").unwrap_err();
        assert!(err.message.contains("call stack overflow"));
    }

    #[test]
    fn triggered_token_interrupts_next_checkpoint() {
        let mut ctx = Context::new();
        let chunk = ctx.compile("loop", "while true { }").unwrap();
        ctx.cancel_token().trigger();
        let err = ctx.run(&chunk).unwrap_err();
        assert_eq!(err.message, "interrupted!");
        // the trigger is consumed one-shot: the context runs normally again
        let v = ctx.do_string("after", "return 1;").unwrap();
        assert!(v.eq_value(&Value::Int(1)));
    }
}
