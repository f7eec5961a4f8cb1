// unpack.rs: Buffer unpacking
//
// Rewrites buffer references into explicit scalar bindings read through the
// runtime accessor interface, and guards every buffer handle with a non-null
// assertion.
//
//   find_buffer_symbols   → entities keyed by canonical name + usage set
//   lower_buffer_metadata → 5 + 3·dims candidate bindings per entity
//   live_metadata         → the live candidates, expanding referenced dims only
//   insert_live_bindings  → let chain of the live candidates
//   inject_null_checks    → one guard per entity, ahead of the let chain
//
// Preconditions: buffer-backed Var/Load/Store nodes carry their BufferLikeRef.
// Postconditions: every live `<buffer>.<field>` symbol of a discovered buffer
//   is bound by exactly one enclosing LetStmt; one null-check guard per
//   buffer precedes the body, in canonical-name order.
// Failure modes: none (total over well-formed trees).
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{BufferLikeRef, Expr, Stmt, Type};
use crate::pass::StageCert;
use crate::runtime::{self, Accessor};

// ── Discovery state ─────────────────────────────────────────────────────────

/// One logical buffer discovered in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferEntity {
    pub name: String,
    /// `<name>.buffer`, the first argument of every accessor call.
    pub handle: Expr,
    pub dimensions: u32,
}

/// Finder output: entities by canonical name and the names already
/// referenced by the program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferSymbols {
    pub buffers: BTreeMap<String, BufferEntity>,
    pub symbols: BTreeSet<String>,
}

impl BufferSymbols {
    pub fn is_live(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    fn note_symbol(&mut self, symbol: String) {
        self.symbols.insert(symbol);
    }

    /// Register the buffer behind `buffer`. First discovery wins.
    fn register(&mut self, buffer: &BufferLikeRef) {
        let Some((name, dimensions)) = buffer.buffer_projection() else {
            return;
        };
        if self.buffers.contains_key(name) {
            return;
        }
        let entity = BufferEntity {
            name: name.to_string(),
            handle: Expr::buffer_var(handle_name(name), Type::Handle, buffer.clone()),
            dimensions,
        };
        self.buffers.insert(name.to_string(), entity);
    }
}

/// Name of the handle symbol for `buffer`.
pub fn handle_name(buffer: &str) -> String {
    format!("{}.buffer", buffer)
}

// ── Finder ──────────────────────────────────────────────────────────────────

/// Discover every buffer reachable from `s` and every symbol name it mentions.
pub fn find_buffer_symbols(s: &Stmt) -> BufferSymbols {
    let mut found = BufferSymbols::default();
    find_in_stmt(s, &mut found);
    found
}

fn find_in_stmt(s: &Stmt, acc: &mut BufferSymbols) {
    match s {
        Stmt::LetStmt { value, body, .. } => {
            find_in_expr(value, acc);
            find_in_stmt(body, acc);
        }
        Stmt::Assert { condition, message } => {
            find_in_expr(condition, acc);
            find_in_expr(message, acc);
        }
        Stmt::Block(stmts) => {
            for stmt in stmts {
                find_in_stmt(stmt, acc);
            }
        }
        Stmt::For {
            min, extent, body, ..
        } => {
            find_in_expr(min, acc);
            find_in_expr(extent, acc);
            find_in_stmt(body, acc);
        }
        Stmt::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            find_in_expr(condition, acc);
            find_in_stmt(then_case, acc);
            if let Some(else_case) = else_case {
                find_in_stmt(else_case, acc);
            }
        }
        Stmt::Store {
            name,
            value,
            index,
            buffer,
        } => {
            visit_memory_access(name, buffer.as_ref(), acc);
            find_in_expr(value, acc);
            find_in_expr(index, acc);
        }
        Stmt::Evaluate(e) => find_in_expr(e, acc),
    }
}

fn find_in_expr(e: &Expr, acc: &mut BufferSymbols) {
    match e {
        Expr::IntImm { .. } | Expr::FloatImm { .. } | Expr::StringImm(_) => {}
        Expr::Var { name, buffer, .. } => {
            acc.note_symbol(name.clone());
            if let Some(buffer) = buffer {
                acc.register(buffer);
            }
        }
        Expr::Binary { a, b, .. } => {
            find_in_expr(a, acc);
            find_in_expr(b, acc);
        }
        Expr::Load {
            name,
            index,
            buffer,
            ..
        } => {
            visit_memory_access(name, buffer.as_ref(), acc);
            find_in_expr(index, acc);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                find_in_expr(arg, acc);
            }
        }
        Expr::Let { value, body, .. } => {
            find_in_expr(value, acc);
            find_in_expr(body, acc);
        }
    }
}

/// Loads and stores go through the host pointer or the device handle, so both
/// suffixed names count as referenced.
fn visit_memory_access(name: &str, buffer: Option<&BufferLikeRef>, acc: &mut BufferSymbols) {
    acc.note_symbol(format!("{}.host", name));
    acc.note_symbol(format!("{}.dev", name));
    if let Some(buffer) = buffer {
        acc.register(buffer);
    }
}

// ── Metadata lowering ───────────────────────────────────────────────────────

/// A candidate scoped-let layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub value: Expr,
}

/// Candidate bindings for every entity: entities in canonical-name order,
/// then scalar fields, then `(min, extent, stride)` per dimension.
pub fn lower_buffer_metadata(buffers: &BTreeMap<String, BufferEntity>) -> Vec<Binding> {
    buffers
        .values()
        .flat_map(|entity| metadata_bindings(entity, 0..entity.dimensions))
        .collect()
}

/// The live subset of `lower_buffer_metadata`, in the same order.
///
/// Only dimensions named by some referenced symbol are expanded, so the
/// work is bounded by the usage set rather than by the declared rank.
pub fn live_metadata(symbols: &BufferSymbols) -> Vec<Binding> {
    symbols
        .buffers
        .values()
        .flat_map(|entity| {
            let dims = referenced_dimensions(entity, &symbols.symbols);
            metadata_bindings(entity, dims)
        })
        .filter(|b| symbols.is_live(&b.name))
        .collect()
}

/// Indices `i < dimensions` for which `<name>.<min|extent|stride>.<i>` is
/// in `symbols`.
fn referenced_dimensions(entity: &BufferEntity, symbols: &BTreeSet<String>) -> BTreeSet<u32> {
    let mut dims = BTreeSet::new();
    for acc in Accessor::DIMENSION_FIELDS {
        let Some(field) = acc.field() else {
            continue;
        };
        let prefix = format!("{}.{}.", entity.name, field);
        let indices = symbols
            .range::<String, _>(prefix.clone()..)
            .take_while(|s| s.starts_with(&prefix))
            .filter_map(|s| s[prefix.len()..].parse::<u32>().ok())
            .filter(|&i| i < entity.dimensions);
        dims.extend(indices);
    }
    dims
}

fn metadata_bindings(entity: &BufferEntity, dims: impl IntoIterator<Item = u32>) -> Vec<Binding> {
    let mut bindings = Vec::new();

    for acc in Accessor::SCALAR_FIELDS {
        if let Some(field) = acc.field() {
            bindings.push(Binding {
                name: format!("{}.{}", entity.name, field),
                value: acc.call(&entity.handle, None),
            });
        }
    }

    for dim in dims {
        for acc in Accessor::DIMENSION_FIELDS {
            if let Some(field) = acc.field() {
                bindings.push(Binding {
                    name: format!("{}.{}.{}", entity.name, field, dim),
                    value: acc.call(&entity.handle, Some(dim)),
                });
            }
        }
    }

    bindings
}

// ── Binding insertion ───────────────────────────────────────────────────────

/// Wrap `body` in a let for each live candidate. The first candidate ends up
/// outermost: the list is folded right to left, innermost first.
pub fn insert_live_bindings(body: Stmt, candidates: Vec<Binding>, live: &BTreeSet<String>) -> Stmt {
    candidates
        .into_iter()
        .rev()
        .filter(|b| live.contains(&b.name))
        .fold(body, |inner, b| Stmt::let_stmt(b.name, b.value, inner))
}

// ── Guard injection ─────────────────────────────────────────────────────────

/// `assert(is_not_null(<handle>), raise_buffer_argument_is_null("<name>"))`
pub fn null_check(entity: &BufferEntity) -> Stmt {
    Stmt::Assert {
        condition: Accessor::IsNotNull.call(&entity.handle, None),
        message: runtime::raise_buffer_argument_is_null(&entity.name),
    }
}

/// Sequence one guard per entity, in canonical-name order, ahead of `body`.
pub fn inject_null_checks(body: Stmt, buffers: &BTreeMap<String, BufferEntity>) -> Stmt {
    if buffers.is_empty() {
        return body;
    }
    let mut stmts: Vec<Stmt> = buffers.values().map(null_check).collect();
    stmts.push(body);
    Stmt::Block(stmts)
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Unpack all buffer references in `s`.
pub fn unpack_buffers(s: Stmt) -> Stmt {
    let symbols = find_buffer_symbols(&s);
    unpack_with_symbols(s, &symbols)
}

/// Unpack `s` using a finder result computed earlier over the same tree.
pub fn unpack_with_symbols(s: Stmt, symbols: &BufferSymbols) -> Stmt {
    let wrapped = insert_live_bindings(s, live_metadata(symbols), &symbols.symbols);
    inject_null_checks(wrapped, &symbols.buffers)
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for the unpack postconditions (U1-U3).
#[derive(Debug, Clone)]
pub struct UnpackCert {
    /// U1: the let chain under the guards binds exactly the live candidates,
    /// in synthesis order.
    pub u1_live_bindings_nested: bool,
    /// U2: one guard per entity, in canonical-name order.
    pub u2_guards_cover_buffers: bool,
    /// U3: no accessor call was emitted beyond the live bindings.
    pub u3_no_dead_metadata: bool,
}

impl StageCert for UnpackCert {
    fn all_pass(&self) -> bool {
        self.u1_live_bindings_nested && self.u2_guards_cover_buffers && self.u3_no_dead_metadata
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("U1_live_bindings_nested", self.u1_live_bindings_nested),
            ("U2_guards_cover_buffers", self.u2_guards_cover_buffers),
            ("U3_no_dead_metadata", self.u3_no_dead_metadata),
        ]
    }
}

/// Check `unpacked` against the finder result for `original`.
pub fn verify_unpacked(original: &Stmt, unpacked: &Stmt, symbols: &BufferSymbols) -> UnpackCert {
    let expected: Vec<String> = live_metadata(symbols).into_iter().map(|b| b.name).collect();

    let (guards, chain) = split_guards(unpacked, symbols.buffers.len());
    let u2 = verify_u2_guards(&guards, symbols);
    let u1 = match chain {
        Some(chain) => verify_u1_let_chain(chain, &expected),
        None => false,
    };
    let u3 = count_metadata_calls_stmt(unpacked)
        == count_metadata_calls_stmt(original) + expected.len();

    UnpackCert {
        u1_live_bindings_nested: u1,
        u2_guards_cover_buffers: u2,
        u3_no_dead_metadata: u3,
    }
}

/// Split off the leading `n` guards. Returns the guards and the statement
/// they protect, if the shape matches.
fn split_guards(s: &Stmt, n: usize) -> (Vec<&Stmt>, Option<&Stmt>) {
    if n == 0 {
        return (Vec::new(), Some(s));
    }
    match s {
        Stmt::Block(stmts) if stmts.len() == n + 1 => {
            (stmts[..n].iter().collect(), stmts.last())
        }
        _ => (Vec::new(), None),
    }
}

/// U2: guard `i` checks the handle of the `i`-th entity in name order.
fn verify_u2_guards(guards: &[&Stmt], symbols: &BufferSymbols) -> bool {
    guards.len() == symbols.buffers.len()
        && guards
            .iter()
            .zip(symbols.buffers.values())
            .all(|(guard, entity)| **guard == null_check(entity))
}

/// U1: peel one LetStmt per expected name, outermost first.
fn verify_u1_let_chain(chain: &Stmt, expected: &[String]) -> bool {
    let mut current = chain;
    for name in expected {
        match current {
            Stmt::LetStmt {
                name: bound, body, ..
            } if bound == name => current = &**body,
            _ => return false,
        }
    }
    true
}

fn is_metadata_call(name: &str) -> bool {
    matches!(Accessor::from_symbol(name), Some(acc) if acc != Accessor::IsNotNull)
}

fn count_metadata_calls_stmt(s: &Stmt) -> usize {
    match s {
        Stmt::LetStmt { value, body, .. } => {
            count_metadata_calls_expr(value) + count_metadata_calls_stmt(body)
        }
        Stmt::Assert { condition, message } => {
            count_metadata_calls_expr(condition) + count_metadata_calls_expr(message)
        }
        Stmt::Block(stmts) => stmts.iter().map(count_metadata_calls_stmt).sum(),
        Stmt::For {
            min, extent, body, ..
        } => {
            count_metadata_calls_expr(min)
                + count_metadata_calls_expr(extent)
                + count_metadata_calls_stmt(body)
        }
        Stmt::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            count_metadata_calls_expr(condition)
                + count_metadata_calls_stmt(then_case)
                + else_case.as_deref().map_or(0, count_metadata_calls_stmt)
        }
        Stmt::Store { value, index, .. } => {
            count_metadata_calls_expr(value) + count_metadata_calls_expr(index)
        }
        Stmt::Evaluate(e) => count_metadata_calls_expr(e),
    }
}

fn count_metadata_calls_expr(e: &Expr) -> usize {
    match e {
        Expr::IntImm { .. } | Expr::FloatImm { .. } | Expr::StringImm(_) | Expr::Var { .. } => 0,
        Expr::Binary { a, b, .. } => count_metadata_calls_expr(a) + count_metadata_calls_expr(b),
        Expr::Load { index, .. } => count_metadata_calls_expr(index),
        Expr::Call { name, args, .. } => {
            let own = usize::from(is_metadata_call(name));
            own + args.iter().map(count_metadata_calls_expr).sum::<usize>()
        }
        Expr::Let { value, body, .. } => {
            count_metadata_calls_expr(value) + count_metadata_calls_expr(body)
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
