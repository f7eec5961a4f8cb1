// AST node types for textual IR (.bir) files.
//
// Untyped, unresolved mirror of the `.bir` grammar. Every node carries a
// `SimpleSpan` so the resolver can report diagnostics at the source range.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// An identifier with its source span. Dotted names stay whole.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── Root ──

/// A complete `.bir` file: declarations, then the body statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

// ── Declarations ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `buffer`: runtime buffer parameter.
    Buffer,
    /// `image`: compile-time buffer literal.
    Image,
    /// `param`: scalar runtime parameter.
    Param,
}

/// `buffer NAME: TYPE, RANK` / `image NAME: TYPE, RANK` / `param NAME: TYPE`
///
/// The parser accepts an optional rank on every kind; the resolver checks
/// that buffers and images have one and params do not.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub kind: DeclKind,
    pub name: Ident,
    pub ty: Ident,
    pub rank: Option<(u64, Span)>,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `let NAME = VALUE` scoping over the statements that follow it.
    Let {
        name: Ident,
        value: Expr,
        body: Vec<Stmt>,
    },
    Assert {
        condition: Expr,
        message: Expr,
    },
    For {
        var: Ident,
        min: Expr,
        extent: Expr,
        body: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    Store {
        target: Ident,
        index: Expr,
        value: Expr,
    },
    Evaluate(Expr),
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(u64),
    Float(f64),
    Str(String),
    Neg(Box<Expr>),
    /// `(e)`: grouping without an operator.
    Paren(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Let {
        name: Ident,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    Call {
        name: Ident,
        args: Vec<Expr>,
    },
    Load {
        target: Ident,
        index: Box<Expr>,
    },
    Var(Ident),
}
