// resolve.rs: Elaboration of `.bir` syntax into the typed IR
//
// Collects declarations into buffer-like objects, then walks the body,
// binding variable/load/store names to their declarations and assigning
// every expression its semantic type.
//
// Preconditions: `file` is a well-formed AST from the parser.
// Postconditions: returns an `ir::Program` (always) plus all accumulated
//                 diagnostics. Buffer-backed nodes carry their BufferLikeRef.
// Failure modes: duplicate or malformed declarations, out-of-range literals
//                and memory access through scalar parameters produce
//                `Diagnostic` entries. Resolution continues past errors.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::{self, DeclKind, ExprKind, Span, StmtKind};
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::ir::{
    BinOp, BufferLikeRef, BufferLiteral, Expr, Parameter, Program, Stmt, Type, MAX_DIMENSIONS,
};
use crate::runtime::{self, Accessor};

// ── Public types ────────────────────────────────────────────────────────────

/// Result of resolution.
#[derive(Debug)]
pub struct ResolveResult {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Resolve a parsed `.bir` file into an IR program.
pub fn resolve(file: &ast::SourceFile) -> ResolveResult {
    let mut ctx = ResolveCtx::new();

    // Pass 1: declarations
    ctx.collect_decls(&file.decls);

    // Pass 2: body
    let body = ctx.resolve_seq(&file.body);

    ResolveResult {
        program: Program {
            inputs: ctx.inputs,
            body,
        },
        diagnostics: ctx.diagnostics,
    }
}

// ── Internal context ────────────────────────────────────────────────────────

struct ResolveCtx {
    /// Declarations in source order.
    inputs: Vec<BufferLikeRef>,
    by_name: HashMap<String, usize>,
    /// `let`/`for` bindings currently in scope, innermost last.
    locals: Vec<(String, Type)>,
    diagnostics: Vec<Diagnostic>,
}

impl ResolveCtx {
    fn new() -> Self {
        ResolveCtx {
            inputs: Vec::new(),
            by_name: HashMap::new(),
            locals: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, span: Span, code: DiagCode, message: String) {
        self.diagnostics
            .push(Diagnostic::error(span, message).with_code(code));
    }

    // ── Pass 1: declarations ────────────────────────────────────────────

    fn collect_decls(&mut self, decls: &[ast::Decl]) {
        for decl in decls {
            let name = &decl.name.name;
            if let Some(&prev) = self.by_name.get(name) {
                let kind = declared_kind(&self.inputs[prev]);
                self.diagnostics.push(
                    Diagnostic::error(decl.name.span, format!("duplicate declaration '{}'", name))
                        .with_code(codes::E0101)
                        .with_hint(format!("'{}' is already declared as a {}", name, kind)),
                );
                continue;
            }

            let ty = match Type::from_name(&decl.ty.name) {
                Some(ty) => ty,
                None => {
                    self.error(
                        decl.ty.span,
                        codes::E0102,
                        format!("unknown type '{}'", decl.ty.name),
                    );
                    Type::I32
                }
            };

            let dimensions = self.check_rank(decl);
            let object = match decl.kind {
                DeclKind::Buffer => BufferLikeRef::Parameter(Parameter::buffer(name, ty, dimensions)),
                DeclKind::Image => BufferLikeRef::Literal(BufferLiteral::new(name, ty, dimensions)),
                DeclKind::Param => BufferLikeRef::Parameter(Parameter::scalar(name, ty)),
            };
            self.by_name.insert(name.clone(), self.inputs.len());
            self.inputs.push(object);
        }
    }

    fn check_rank(&mut self, decl: &ast::Decl) -> u32 {
        match (decl.kind, decl.rank) {
            (DeclKind::Param, None) => 0,
            (DeclKind::Param, Some((_, span))) => {
                self.error(
                    span,
                    codes::E0103,
                    format!("scalar parameter '{}' cannot have a rank", decl.name.name),
                );
                0
            }
            (_, None) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        decl.span,
                        format!("'{}' is missing its rank", decl.name.name),
                    )
                    .with_code(codes::E0103)
                    .with_hint(format!("write `{}: {}, <rank>`", decl.name.name, decl.ty.name)),
                );
                0
            }
            (_, Some((rank, span))) => match u32::try_from(rank) {
                Ok(rank) if rank <= MAX_DIMENSIONS => rank,
                _ => {
                    self.diagnostics.push(
                        Diagnostic::error(span, format!("rank {} is out of range", rank))
                            .with_code(codes::E0104)
                            .with_hint(format!("ranks go from 0 to {}", MAX_DIMENSIONS)),
                    );
                    0
                }
            },
        }
    }

    fn lookup_decl(&self, name: &str) -> Option<&BufferLikeRef> {
        self.by_name.get(name).map(|&i| &self.inputs[i])
    }

    fn local_type(&self, name: &str) -> Option<Type> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| *ty)
    }

    /// Declaration a variable name refers to: the name itself, or the
    /// longest declared prefix followed by `.`.
    fn owning_decl<'a>(&'a self, name: &'a str) -> Option<(&'a BufferLikeRef, Option<&'a str>)> {
        let mut best: Option<(&BufferLikeRef, Option<&str>)> = None;
        let mut best_len = 0;
        for object in &self.inputs {
            let decl = object.name();
            if name == decl {
                return Some((object, None));
            }
            if let Some(rest) = name.strip_prefix(decl).and_then(|r| r.strip_prefix('.')) {
                if decl.len() > best_len {
                    best_len = decl.len();
                    best = Some((object, Some(rest)));
                }
            }
        }
        best
    }

    // ── Pass 2: statements ──────────────────────────────────────────────

    /// A sequence becomes its single statement, or a block.
    fn resolve_seq(&mut self, stmts: &[ast::Stmt]) -> Stmt {
        let mut resolved: Vec<Stmt> = stmts.iter().map(|s| self.resolve_stmt(s)).collect();
        if resolved.len() == 1 {
            resolved.remove(0)
        } else {
            Stmt::Block(resolved)
        }
    }

    fn resolve_stmt(&mut self, stmt: &ast::Stmt) -> Stmt {
        match &stmt.kind {
            StmtKind::Let { name, value, body } => {
                let value = self.resolve_expr(value);
                self.locals.push((name.name.clone(), value.ty()));
                let body = self.resolve_seq(body);
                self.locals.pop();
                Stmt::let_stmt(name.name.clone(), value, body)
            }
            StmtKind::Assert { condition, message } => Stmt::Assert {
                condition: self.resolve_expr(condition),
                message: self.resolve_expr(message),
            },
            StmtKind::For {
                var,
                min,
                extent,
                body,
            } => {
                let min = self.resolve_expr(min);
                let extent = self.resolve_expr(extent);
                self.locals.push((var.name.clone(), Type::I32));
                let body = self.resolve_seq(body);
                self.locals.pop();
                Stmt::for_loop(var.name.clone(), min, extent, body)
            }
            StmtKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.resolve_expr(condition);
                let then_case = Box::new(self.resolve_seq(then_body));
                let else_case = else_body.as_ref().map(|b| Box::new(self.resolve_seq(b)));
                Stmt::IfThenElse {
                    condition,
                    then_case,
                    else_case,
                }
            }
            StmtKind::Store {
                target,
                index,
                value,
            } => {
                let index = self.resolve_expr(index);
                let value = self.resolve_expr(value);
                match self.memory_target(target, "store to") {
                    Some(buffer) => Stmt::store(&buffer, index, value),
                    None => Stmt::Store {
                        name: target.name.clone(),
                        value,
                        index,
                        buffer: None,
                    },
                }
            }
            StmtKind::Evaluate(e) => Stmt::Evaluate(self.resolve_expr(e)),
        }
    }

    /// Buffer-like object backing a load/store target, if any. Locals
    /// shadow declarations; undeclared targets are internal allocations.
    fn memory_target(&mut self, target: &ast::Ident, action: &str) -> Option<BufferLikeRef> {
        if self.local_type(&target.name).is_some() {
            return None;
        }
        let object = self.lookup_decl(&target.name)?.clone();
        if object.buffer_projection().is_none() {
            self.diagnostics.push(
                Diagnostic::error(
                    target.span,
                    format!("cannot {} scalar parameter '{}'", action, target.name),
                )
                .with_code(codes::E0105)
                .with_hint("declare it with `buffer` or `image` to index it"),
            );
            return None;
        }
        Some(object)
    }

    // ── Pass 2: expressions ─────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &ast::Expr) -> Expr {
        match &expr.kind {
            ExprKind::Int(n) => match i32::try_from(*n) {
                Ok(v) => Expr::int(i64::from(v)),
                Err(_) => {
                    self.error(
                        expr.span,
                        codes::E0104,
                        format!("integer literal {} does not fit in i32", n),
                    );
                    Expr::int(0)
                }
            },
            ExprKind::Float(v) => Expr::FloatImm {
                value: *v,
                ty: Type::Float(32),
            },
            ExprKind::Str(s) => Expr::string(s.clone()),
            ExprKind::Neg(inner) => self.resolve_neg(inner, expr.span),
            ExprKind::Paren(inner) => self.resolve_expr(inner),
            ExprKind::Binary { op, lhs, rhs } => {
                let a = self.resolve_expr(lhs);
                let b = self.resolve_expr(rhs);
                Expr::binary(lower_binop(*op), a, b)
            }
            ExprKind::Let { name, value, body } => {
                let value = self.resolve_expr(value);
                self.locals.push((name.name.clone(), value.ty()));
                let body = self.resolve_expr(body);
                self.locals.pop();
                Expr::Let {
                    name: name.name.clone(),
                    value: Box::new(value),
                    body: Box::new(body),
                }
            }
            ExprKind::Call { name, args } => {
                let args = args.iter().map(|a| self.resolve_expr(a)).collect();
                let ty = runtime::return_type_of(&name.name).unwrap_or(Type::I32);
                Expr::call(ty, name.name.clone(), args)
            }
            ExprKind::Load { target, index } => {
                let index = self.resolve_expr(index);
                match self.memory_target(target, "load from") {
                    Some(buffer) => Expr::load(&buffer, index),
                    None => Expr::Load {
                        ty: Type::I32,
                        name: target.name.clone(),
                        index: Box::new(index),
                        buffer: None,
                    },
                }
            }
            ExprKind::Var(id) => self.resolve_var(&id.name),
        }
    }

    fn resolve_neg(&mut self, inner: &ast::Expr, span: Span) -> Expr {
        match &inner.kind {
            ExprKind::Int(n) => {
                let magnitude = i64::try_from(*n).unwrap_or(i64::MAX);
                match i32::try_from(-magnitude) {
                    Ok(v) => Expr::int(i64::from(v)),
                    Err(_) => {
                        self.error(
                            span,
                            codes::E0104,
                            format!("integer literal -{} does not fit in i32", n),
                        );
                        Expr::int(0)
                    }
                }
            }
            ExprKind::Float(v) => Expr::FloatImm {
                value: -v,
                ty: Type::Float(32),
            },
            _ => {
                let operand = self.resolve_expr(inner);
                let zero = match operand.ty() {
                    Type::Float(bits) => Expr::FloatImm {
                        value: 0.0,
                        ty: Type::Float(bits),
                    },
                    ty => Expr::IntImm { value: 0, ty },
                };
                Expr::binary(BinOp::Sub, zero, operand)
            }
        }
    }

    fn resolve_var(&self, name: &str) -> Expr {
        if let Some(ty) = self.local_type(name) {
            return Expr::var(name, ty);
        }
        match self.owning_decl(name) {
            // Bare reference to a scalar parameter.
            Some((object, None)) if object.buffer_projection().is_none() => {
                Expr::buffer_var(name, object.value_type(), object.clone())
            }
            // Bare reference to a buffer: the handle itself.
            Some((object, None)) => Expr::buffer_var(name, Type::Handle, object.clone()),
            Some((object, Some(field))) if object.buffer_projection().is_some() => {
                Expr::buffer_var(name, field_type(field), object.clone())
            }
            _ => Expr::var(name, Type::I32),
        }
    }
}

/// Type of `<buffer>.<field...>`, keyed by the first field segment.
fn field_type(field: &str) -> Type {
    let head = field.split('.').next().unwrap_or(field);
    if head == "buffer" {
        return Type::Handle;
    }
    Accessor::from_field(head)
        .map(Accessor::return_type)
        .unwrap_or(Type::I32)
}

fn declared_kind(object: &BufferLikeRef) -> &'static str {
    match object {
        BufferLikeRef::Parameter(p) if p.is_buffer => "buffer",
        BufferLikeRef::Parameter(_) => "param",
        BufferLikeRef::Literal(_) => "image",
    }
}

fn lower_binop(op: ast::BinOp) -> BinOp {
    match op {
        ast::BinOp::Add => BinOp::Add,
        ast::BinOp::Sub => BinOp::Sub,
        ast::BinOp::Mul => BinOp::Mul,
        ast::BinOp::Div => BinOp::Div,
        ast::BinOp::Mod => BinOp::Mod,
        ast::BinOp::Eq => BinOp::Eq,
        ast::BinOp::Ne => BinOp::Ne,
        ast::BinOp::Lt => BinOp::Lt,
        ast::BinOp::Le => BinOp::Le,
        ast::BinOp::Gt => BinOp::Gt,
        ast::BinOp::Ge => BinOp::Ge,
        ast::BinOp::And => BinOp::And,
        ast::BinOp::Or => BinOp::Or,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
