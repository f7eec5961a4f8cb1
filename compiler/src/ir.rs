// ir.rs: Statement/expression IR consumed and produced by the unpack pass.
//
// Immutable tree of typed expression and statement nodes. Buffer-backed
// references (variables, loads, stores) carry the runtime parameter or
// compile-time literal they were bound to by the front end.
//
// Preconditions: none (types and constructors only).
// Postconditions: none.
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Types ───────────────────────────────────────────────────────────────────

/// Semantic type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int(u8),
    UInt(u8),
    Float(u8),
    /// Address-sized opaque pointer (buffer handles, host pointers).
    Handle,
    /// String immediates (error payloads).
    Str,
}

impl Type {
    pub const I32: Type = Type::Int(32);
    pub const U64: Type = Type::UInt(64);

    /// Parse a type name as written in `.bir` declarations.
    pub fn from_name(name: &str) -> Option<Type> {
        let ty = match name {
            "bool" => Type::Bool,
            "i8" => Type::Int(8),
            "i16" => Type::Int(16),
            "i32" => Type::Int(32),
            "i64" => Type::Int(64),
            "u8" => Type::UInt(8),
            "u16" => Type::UInt(16),
            "u32" => Type::UInt(32),
            "u64" => Type::UInt(64),
            "f32" => Type::Float(32),
            "f64" => Type::Float(64),
            "handle" => Type::Handle,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::UInt(bits) => write!(f, "u{}", bits),
            Type::Float(bits) => write!(f, "f{}", bits),
            Type::Handle => write!(f, "handle"),
            Type::Str => write!(f, "str"),
        }
    }
}

// ── Buffer-like objects ─────────────────────────────────────────────────────

/// Largest rank the front end accepts for a buffer or image declaration.
pub const MAX_DIMENSIONS: u32 = 16;

/// A runtime pipeline parameter. Buffer parameters carry a rank; scalar
/// parameters carry their value type and never describe a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    /// Element type for buffers, value type for scalars.
    pub ty: Type,
    pub is_buffer: bool,
    pub dimensions: u32,
}

impl Parameter {
    pub fn buffer(name: impl Into<String>, elem_type: Type, dimensions: u32) -> Self {
        Self {
            name: name.into(),
            ty: elem_type,
            is_buffer: true,
            dimensions,
        }
    }

    pub fn scalar(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            is_buffer: false,
            dimensions: 0,
        }
    }
}

/// A compile-time buffer embedded in the program (array semantics).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferLiteral {
    pub name: String,
    pub elem_type: Type,
    pub dimensions: u32,
}

impl BufferLiteral {
    pub fn new(name: impl Into<String>, elem_type: Type, dimensions: u32) -> Self {
        Self {
            name: name.into(),
            elem_type,
            dimensions,
        }
    }
}

/// Either source of a buffer: a runtime parameter or a compile-time literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BufferLikeRef {
    Parameter(Parameter),
    Literal(BufferLiteral),
}

impl BufferLikeRef {
    pub fn name(&self) -> &str {
        match self {
            BufferLikeRef::Parameter(p) => &p.name,
            BufferLikeRef::Literal(l) => &l.name,
        }
    }

    /// `(canonical name, dimensions)` if this object denotes a buffer.
    /// Scalar parameters have no buffer projection.
    pub fn buffer_projection(&self) -> Option<(&str, u32)> {
        match self {
            BufferLikeRef::Parameter(p) if p.is_buffer => Some((&p.name, p.dimensions)),
            BufferLikeRef::Parameter(_) => None,
            BufferLikeRef::Literal(l) => Some((&l.name, l.dimensions)),
        }
    }

    /// Element type of the buffer, or the value type of a scalar parameter.
    pub fn value_type(&self) -> Type {
        match self {
            BufferLikeRef::Parameter(p) => p.ty,
            BufferLikeRef::Literal(l) => l.elem_type,
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    /// True for comparisons and logical connectives (result is `bool`).
    pub fn is_predicate(self) -> bool {
        !matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntImm {
        value: i64,
        ty: Type,
    },
    FloatImm {
        value: f64,
        ty: Type,
    },
    StringImm(String),
    /// Variable reference. `buffer` is set when the name denotes a buffer or
    /// one of its fields (`img`, `img.buffer`, `img.min.0`, ...).
    Var {
        name: String,
        ty: Type,
        buffer: Option<BufferLikeRef>,
    },
    Binary {
        op: BinOp,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    Load {
        ty: Type,
        name: String,
        index: Box<Expr>,
        buffer: Option<BufferLikeRef>,
    },
    /// External call, resolved by the runtime / code generator.
    Call {
        ty: Type,
        name: String,
        args: Vec<Expr>,
    },
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
}

impl Expr {
    /// 32-bit integer immediate.
    pub fn int(value: i64) -> Self {
        Expr::IntImm {
            value,
            ty: Type::I32,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::StringImm(value.into())
    }

    /// Unbound variable reference.
    pub fn var(name: impl Into<String>, ty: Type) -> Self {
        Expr::Var {
            name: name.into(),
            ty,
            buffer: None,
        }
    }

    /// Variable reference bound to a buffer-like object.
    pub fn buffer_var(name: impl Into<String>, ty: Type, buffer: BufferLikeRef) -> Self {
        Expr::Var {
            name: name.into(),
            ty,
            buffer: Some(buffer),
        }
    }

    pub fn call(ty: Type, name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            ty,
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinOp, a: Expr, b: Expr) -> Self {
        Expr::Binary {
            op,
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    /// Load from a buffer; the element type comes from the buffer.
    pub fn load(buffer: &BufferLikeRef, index: Expr) -> Self {
        Expr::Load {
            ty: buffer.value_type(),
            name: buffer.name().to_string(),
            index: Box::new(index),
            buffer: Some(buffer.clone()),
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Expr::IntImm { ty, .. } | Expr::FloatImm { ty, .. } => *ty,
            Expr::StringImm(_) => Type::Str,
            Expr::Var { ty, .. } | Expr::Load { ty, .. } | Expr::Call { ty, .. } => *ty,
            Expr::Binary { op, a, .. } => {
                if op.is_predicate() {
                    Type::Bool
                } else {
                    a.ty()
                }
            }
            Expr::Let { body, .. } => body.ty(),
        }
    }
}

// ── Statements ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Scoped binding: `name` is visible only within `body`.
    LetStmt {
        name: String,
        value: Expr,
        body: Box<Stmt>,
    },
    /// Abort with `message` (an error-signalling call) unless `condition` holds.
    Assert { condition: Expr, message: Expr },
    /// Statements executed in order. An empty block is a no-op.
    Block(Vec<Stmt>),
    For {
        name: String,
        min: Expr,
        extent: Expr,
        body: Box<Stmt>,
    },
    IfThenElse {
        condition: Expr,
        then_case: Box<Stmt>,
        else_case: Option<Box<Stmt>>,
    },
    Store {
        name: String,
        value: Expr,
        index: Expr,
        buffer: Option<BufferLikeRef>,
    },
    Evaluate(Expr),
}

impl Stmt {
    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Self {
        Stmt::LetStmt {
            name: name.into(),
            value,
            body: Box::new(body),
        }
    }

    /// Store into a buffer-like object.
    pub fn store(buffer: &BufferLikeRef, index: Expr, value: Expr) -> Self {
        Stmt::Store {
            name: buffer.name().to_string(),
            value,
            index,
            buffer: Some(buffer.clone()),
        }
    }

    pub fn for_loop(name: impl Into<String>, min: Expr, extent: Expr, body: Stmt) -> Self {
        Stmt::For {
            name: name.into(),
            min,
            extent,
            body: Box::new(body),
        }
    }

    pub fn no_op() -> Self {
        Stmt::Block(Vec::new())
    }
}

// ── Program ─────────────────────────────────────────────────────────────────

/// A pipeline body together with the buffer-like objects it was declared
/// against. Declarations are kept in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub inputs: Vec<BufferLikeRef>,
    pub body: Stmt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip_through_display() {
        for name in ["bool", "i8", "i32", "u64", "f32", "handle"] {
            let ty = Type::from_name(name).expect("known type");
            assert_eq!(ty.to_string(), name);
        }
        assert_eq!(Type::from_name("float"), None);
    }

    #[test]
    fn scalar_parameter_has_no_buffer_projection() {
        let gain = BufferLikeRef::Parameter(Parameter::scalar("gain", Type::Float(32)));
        assert_eq!(gain.buffer_projection(), None);
        assert_eq!(gain.value_type(), Type::Float(32));
    }

    #[test]
    fn parameter_and_literal_project_alike() {
        let p = BufferLikeRef::Parameter(Parameter::buffer("img", Type::UInt(8), 2));
        let l = BufferLikeRef::Literal(BufferLiteral::new("lut", Type::Float(32), 1));
        assert_eq!(p.buffer_projection(), Some(("img", 2)));
        assert_eq!(l.buffer_projection(), Some(("lut", 1)));
    }

    #[test]
    fn predicate_binary_is_bool() {
        let cmp = Expr::binary(BinOp::Lt, Expr::var("x", Type::I32), Expr::int(4));
        assert_eq!(cmp.ty(), Type::Bool);
        let sum = Expr::binary(BinOp::Add, Expr::var("x", Type::U64), Expr::int(4));
        assert_eq!(sum.ty(), Type::U64);
    }

    #[test]
    fn load_takes_element_type() {
        let img = BufferLikeRef::Parameter(Parameter::buffer("img", Type::UInt(8), 2));
        assert_eq!(Expr::load(&img, Expr::int(0)).ty(), Type::UInt(8));
    }
}
