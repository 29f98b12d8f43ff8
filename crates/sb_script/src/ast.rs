//! Syntax tree for the embedded language.
//!
//! Plain owned data, `Send + Sync`, so compiled chunks can cross thread
//! boundaries inside an `Arc`.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Ident(String),
    Field {
        object: Box<Expr>,
        name: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: u32,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        line: u32,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: u32,
    },
}

#[derive(Clone, Debug)]
pub enum Stmt {
    /// `let name = expr;` declares a local in the current scope.
    Let { name: String, value: Expr },
    /// `name = expr;` assigns an existing local, else a global.
    Assign { name: String, value: Expr },
    /// `fn name(params) { .. }` binds the function as a global.
    FnDecl(std::sync::Arc<FuncDef>),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return { value: Option<Expr>, line: u32 },
    Break { line: u32 },
    Continue { line: u32 },
    Expr(Expr),
}

/// A function definition, also the representation of a compiled chunk
/// (a chunk is a zero-parameter function named after its source).
#[derive(Clone, Debug)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}
