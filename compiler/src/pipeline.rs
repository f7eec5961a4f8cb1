// pipeline.rs: Compilation state and pass orchestration
//
// Holds all pass artifacts and runs the minimal set of passes for a given
// terminal PassId.
//
// Preconditions: the parsed source file is set before calling run_pipeline.
// Postconditions: all artifacts for required passes are populated, or has_error is set.
// Failure modes: resolve errors; unpack certificate failure (E0600).
// Side effects: calls on_pass_complete callback after each pass for immediate display.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ast::SourceFile;
use crate::diag::{codes, has_errors, Diagnostic};
use crate::ir::{BufferLikeRef, Expr, Program};
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::unpack::{BufferSymbols, UnpackCert};

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata for `--emit build-info`.
///
/// `source_hash`: SHA-256 of the raw `.bir` source text.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Pretty JSON with keys in sorted order.
    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "source_hash": self.source_hash_hex(),
            "compiler_version": self.compiler_version,
            "passes": crate::pass::ALL_PASSES
                .iter()
                .map(|&p| descriptor(p).name)
                .collect::<Vec<_>>(),
        });
        format!("{:#}\n", value)
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from source text.
pub fn compute_provenance(source: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    let mut source_hash = [0u8; 32];
    source_hash.copy_from_slice(&result);

    Provenance {
        source_hash,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Symbol report ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SymbolReport<'a> {
    buffers: Vec<BufferReport<'a>>,
    symbols: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct BufferReport<'a> {
    name: &'a str,
    handle: String,
    dimensions: u32,
    /// `buffer` for runtime parameters, `image` for compile-time literals.
    kind: &'static str,
}

/// Pretty JSON of the finder output, for `--emit symbols`.
pub fn symbol_report_json(symbols: &BufferSymbols) -> Result<String, serde_json::Error> {
    let report = SymbolReport {
        buffers: symbols
            .buffers
            .values()
            .map(|entity| BufferReport {
                name: &entity.name,
                handle: entity.handle.to_string(),
                dimensions: entity.dimensions,
                kind: handle_kind(&entity.handle),
            })
            .collect(),
        symbols: symbols.symbols.iter().map(String::as_str).collect(),
    };
    let mut json = serde_json::to_string_pretty(&report)?;
    json.push('\n');
    Ok(json)
}

fn handle_kind(handle: &Expr) -> &'static str {
    match handle {
        Expr::Var {
            buffer: Some(BufferLikeRef::Literal(_)),
            ..
        } => "image",
        _ => "buffer",
    }
}

// ── Compilation state ──────────────────────────────────────────────────────

/// Holds all compilation artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub file: SourceFile,
    pub program: Option<Program>,
    pub symbols: Option<BufferSymbols>,
    pub unpacked: Option<Program>,
    pub cert: Option<UnpackCert>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(file: SourceFile) -> Self {
        Self {
            file,
            program: None,
            symbols: None,
            unpacked: None,
            cert: None,
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed in a pass.
/// Any diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    pub failing_pass: PassId,
}

/// Per-pass post-processing: callback, accumulate, verbose, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "bufunpack: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

/// An upstream artifact was not produced. `required_passes` orders passes
/// so this only happens if the pass table is inconsistent.
fn missing(pass_id: PassId) -> PipelineError {
    PipelineError {
        failing_pass: pass_id,
    }
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose → error check.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    verbose: bool,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        match pass_id {
            PassId::Resolve => {
                let t = Instant::now();
                let result = crate::resolve::resolve(&state.file);
                let elapsed = t.elapsed();
                state.program = Some(result.program);
                finish_pass(
                    state,
                    pass_id,
                    result.diagnostics,
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::FindSymbols => {
                let program = state.program.as_ref().ok_or(missing(pass_id))?;
                let t = Instant::now();
                let symbols = crate::unpack::find_buffer_symbols(&program.body);
                let elapsed = t.elapsed();
                if verbose {
                    eprintln!(
                        "bufunpack: {} buffers, {} symbols referenced",
                        symbols.buffers.len(),
                        symbols.symbols.len()
                    );
                }
                state.symbols = Some(symbols);
                finish_pass(state, pass_id, Vec::new(), elapsed, verbose, &mut on_pass_complete)?;
            }
            PassId::Unpack => {
                let program = state.program.as_ref().ok_or(missing(pass_id))?;
                let symbols = state.symbols.as_ref().ok_or(missing(pass_id))?;
                let t = Instant::now();
                let body = crate::unpack::unpack_with_symbols(program.body.clone(), symbols);
                let cert = crate::unpack::verify_unpacked(&program.body, &body, symbols);
                let elapsed = t.elapsed();

                let mut diags = Vec::new();
                if !cert.all_pass() {
                    diags.push(
                        Diagnostic::error(
                            state.file.span,
                            format!("unpack verification failed: {}", cert.failed().join(", ")),
                        )
                        .with_code(codes::E0600),
                    );
                }
                let unpacked = Program {
                    inputs: program.inputs.clone(),
                    body,
                };
                state.unpacked = Some(unpacked);
                state.cert = Some(cert);
                finish_pass(state, pass_id, diags, elapsed, verbose, &mut on_pass_complete)?;
            }
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
