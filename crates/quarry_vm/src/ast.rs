//! Syntax tree produced by the parser.

use quarry_codec::Value;

/// Binary operators evaluated by [`crate::ops::binary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    Ne,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub line: u32,
}

/// Assignable location: a variable followed by zero or more subscripts.
#[derive(Debug, Clone)]
pub(crate) struct Place {
    pub var: String,
    pub path: Vec<Expr>,
    /// Ends in `[]`.
    pub append: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum ExprKind {
    Literal(Value),
    Interpolated(Vec<Expr>),
    Var(String),
    Constant(String),
    Index(Box<Expr>, Box<Expr>),
    /// `$a[]` outside an assignment target.
    EmptyIndex(Box<Expr>),
    /// Entries with an optional explicit key.
    Array(Vec<(Option<Expr>, Expr)>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign {
        target: Place,
        op: Option<BinOp>,
        value: Box<Expr>,
    },
    Step {
        target: Place,
        delta: i64,
        prefix: bool,
    },
    Call(String, Vec<Expr>),
}

impl Expr {
    pub(crate) fn new(kind: ExprKind, line: u32) -> Self {
        Self { kind, line }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum Stmt {
    Expr(Expr),
    Print(Vec<Expr>, u32),
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        otherwise: Option<Vec<Stmt>>,
    },
    While(Expr, Vec<Stmt>),
    DoWhile(Vec<Stmt>, Expr),
    For {
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Foreach {
        subject: Expr,
        key: Option<String>,
        value: String,
        body: Vec<Stmt>,
    },
    Break(u32),
    Continue(u32),
    Return(Option<Expr>, u32),
    Function(FunctionDef),
    Block(Vec<Stmt>),
}
