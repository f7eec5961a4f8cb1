// Property-based tests for the unpack pass.
//
// Generated programs reference a handful of buffers through bare handles,
// field names (including out-of-range dimensions), loads and stores. The
// expected bindings are recomputed independently from the references and
// compared with the pass output.
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::{BTreeMap, BTreeSet};

use bufunpack::ir::{BufferLikeRef, BufferLiteral, Expr, Parameter, Stmt, Type};
use bufunpack::pass::StageCert;
use bufunpack::unpack::{find_buffer_symbols, unpack_buffers, verify_unpacked};
use proptest::prelude::*;

const NAMES: [&str; 4] = ["a", "b", "c", "d"];
const SCALAR_FIELDS: [&str; 5] = ["host", "dev", "elem_size", "host_dirty", "dev_dirty"];
const DIM_FIELDS: [&str; 3] = ["min", "extent", "stride"];

// ── Generators ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Ref {
    Bare(usize),
    Field(usize, String),
    Load(usize),
    Store(usize),
}

#[derive(Debug, Clone)]
struct Case {
    buffers: Vec<BufferLikeRef>,
    refs: Vec<Ref>,
}

fn arb_field() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(SCALAR_FIELDS.to_vec()).prop_map(str::to_string),
        (prop::sample::select(DIM_FIELDS.to_vec()), 0u32..5)
            .prop_map(|(f, i)| format!("{}.{}", f, i)),
    ]
}

fn arb_ref() -> impl Strategy<Value = Ref> {
    prop_oneof![
        (0usize..4).prop_map(Ref::Bare),
        (0usize..4, arb_field()).prop_map(|(i, f)| Ref::Field(i, f)),
        (0usize..4).prop_map(Ref::Load),
        (0usize..4).prop_map(Ref::Store),
    ]
}

fn arb_case() -> impl Strategy<Value = Case> {
    (
        prop::collection::vec((0u32..4, any::<bool>()), 1..=4),
        prop::collection::vec(arb_ref(), 0..12),
    )
        .prop_map(|(decls, refs)| {
            let buffers: Vec<BufferLikeRef> = decls
                .iter()
                .enumerate()
                .map(|(i, &(dims, literal))| {
                    if literal {
                        BufferLikeRef::Literal(BufferLiteral::new(NAMES[i], Type::Int(16), dims))
                    } else {
                        BufferLikeRef::Parameter(Parameter::buffer(NAMES[i], Type::Int(16), dims))
                    }
                })
                .collect();
            let n = buffers.len();
            let refs = refs
                .into_iter()
                .map(|r| match r {
                    Ref::Bare(i) => Ref::Bare(i % n),
                    Ref::Field(i, f) => Ref::Field(i % n, f),
                    Ref::Load(i) => Ref::Load(i % n),
                    Ref::Store(i) => Ref::Store(i % n),
                })
                .collect();
            Case { buffers, refs }
        })
}

// ── Program construction and expectations ───────────────────────────────────

fn build(case: &Case) -> Stmt {
    let stmts = case
        .refs
        .iter()
        .map(|r| match r {
            Ref::Bare(i) => {
                let b = &case.buffers[*i];
                Stmt::Evaluate(Expr::buffer_var(b.name(), Type::Handle, b.clone()))
            }
            Ref::Field(i, f) => {
                let b = &case.buffers[*i];
                let name = format!("{}.{}", b.name(), f);
                Stmt::Evaluate(Expr::buffer_var(name, Type::I32, b.clone()))
            }
            Ref::Load(i) => Stmt::Evaluate(Expr::load(&case.buffers[*i], Expr::int(0))),
            Ref::Store(i) => Stmt::store(&case.buffers[*i], Expr::int(0), Expr::int(1)),
        })
        .collect();
    Stmt::Block(stmts)
}

/// Referenced symbol names, computed from the references alone.
fn referenced(case: &Case) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for r in &case.refs {
        match r {
            Ref::Bare(i) => {
                names.insert(NAMES[*i].to_string());
            }
            Ref::Field(i, f) => {
                names.insert(format!("{}.{}", NAMES[*i], f));
            }
            Ref::Load(i) | Ref::Store(i) => {
                names.insert(format!("{}.host", NAMES[*i]));
                names.insert(format!("{}.dev", NAMES[*i]));
            }
        }
    }
    names
}

/// Buffers touched by at least one reference, by name, with their ranks.
fn touched(case: &Case) -> BTreeMap<&'static str, u32> {
    let mut out = BTreeMap::new();
    for r in &case.refs {
        let (Ref::Bare(i) | Ref::Field(i, _) | Ref::Load(i) | Ref::Store(i)) = r;
        let dims = case.buffers[*i]
            .buffer_projection()
            .map_or(0, |(_, d)| d);
        out.insert(NAMES[*i], dims);
    }
    out
}

fn expected_lets(case: &Case) -> Vec<String> {
    let live = referenced(case);
    let mut out = Vec::new();
    for (name, dims) in touched(case) {
        let mut candidates: Vec<String> =
            SCALAR_FIELDS.iter().map(|f| format!("{}.{}", name, f)).collect();
        for d in 0..dims {
            for f in DIM_FIELDS {
                candidates.push(format!("{}.{}.{}", name, f, d));
            }
        }
        out.extend(candidates.into_iter().filter(|c| live.contains(c)));
    }
    out
}

/// `(guarded buffer names, let names outermost first)`.
fn shape(s: &Stmt) -> (Vec<String>, Vec<String>) {
    let mut guards = Vec::new();
    let mut rest = s;
    if let Stmt::Block(stmts) = s {
        for stmt in stmts {
            if let Stmt::Assert {
                message: Expr::Call { args, .. },
                ..
            } = stmt
            {
                if let [Expr::StringImm(name)] = args.as_slice() {
                    guards.push(name.clone());
                }
            }
        }
        if let Some(last) = stmts.last() {
            rest = last;
        }
    }
    let mut lets = Vec::new();
    while let Stmt::LetStmt { name, body, .. } = rest {
        lets.push(name.clone());
        rest = &**body;
    }
    (guards, lets)
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn live_fields_bound_once_in_synthesis_order(case in arb_case()) {
        let body = build(&case);
        let out = unpack_buffers(body);
        let (_, lets) = shape(&out);
        prop_assert_eq!(lets, expected_lets(&case));
    }

    #[test]
    fn every_touched_buffer_is_guarded_in_name_order(case in arb_case()) {
        let body = build(&case);
        let out = unpack_buffers(body);
        let (guards, _) = shape(&out);
        let expected: Vec<String> = touched(&case).keys().map(|k| k.to_string()).collect();
        prop_assert_eq!(guards, expected);
    }

    #[test]
    fn dimension_fields_stay_below_rank(case in arb_case()) {
        let ranks = touched(&case);
        let (_, lets) = shape(&unpack_buffers(build(&case)));
        for name in lets {
            let parts: Vec<&str> = name.split('.').collect();
            if parts.len() == 3 {
                let index: u32 = parts[2].parse().unwrap();
                prop_assert!(index < ranks[parts[0]], "{} exceeds rank", name);
            }
        }
    }

    #[test]
    fn certificate_holds(case in arb_case()) {
        let body = build(&case);
        let symbols = find_buffer_symbols(&body);
        let out = unpack_buffers(body.clone());
        let cert = verify_unpacked(&body, &out, &symbols);
        prop_assert!(cert.all_pass(), "failed: {:?}", cert.failed());
    }

    #[test]
    fn unpacking_is_deterministic(case in arb_case()) {
        let first = unpack_buffers(build(&case));
        let second = unpack_buffers(build(&case));
        prop_assert_eq!(first.to_string(), second.to_string());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn discovery_order_does_not_change_output(case in arb_case()) {
        let mut reversed = case.clone();
        reversed.refs.reverse();
        let (g1, l1) = shape(&unpack_buffers(build(&case)));
        let (g2, l2) = shape(&unpack_buffers(build(&reversed)));
        prop_assert_eq!(g1, g2);
        prop_assert_eq!(l1, l2);
    }
}
