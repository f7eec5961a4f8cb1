use clap::Parser;
use std::path::PathBuf;

use bufunpack::diag::Diagnostic;
use bufunpack::pass::PassId;
use bufunpack::pipeline::{self, CompilationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Resolved input program
    Ir,
    /// Buffers and referenced symbols, as JSON
    Symbols,
    /// Program after buffer unpacking
    Unpacked,
    /// Provenance JSON
    BuildInfo,
}

impl EmitStage {
    fn terminal_pass(self) -> Option<PassId> {
        match self {
            EmitStage::Ir => Some(PassId::Resolve),
            EmitStage::Symbols => Some(PassId::FindSymbols),
            EmitStage::Unpacked => Some(PassId::Unpack),
            EmitStage::BuildInfo => None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "bufunpack",
    version,
    about = "Lowers buffer references in .bir programs to scalar metadata bindings with null-check guards"
)]
struct Cli {
    /// Input .bir source file
    source: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Unpacked)]
    emit: EmitStage,

    /// Print phases and timing
    #[arg(long)]
    verbose: bool,
}

fn report(diags: &[Diagnostic]) {
    for diag in diags {
        eprintln!("bufunpack: {}", diag);
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("bufunpack: source = {}", cli.source.display());
        eprintln!("bufunpack: emit   = {:?}", cli.emit);
    }

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bufunpack: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };

    let parse_result = bufunpack::parser::parse(&source);
    if !parse_result.errors.is_empty() {
        let diags: Vec<_> = parse_result
            .errors
            .iter()
            .map(Diagnostic::from_parse_error)
            .collect();
        report(&diags);
        std::process::exit(1);
    }
    let file = match parse_result.file {
        Some(f) => f,
        None => {
            eprintln!("bufunpack: parse failed with no output");
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!(
            "bufunpack: parsed {} declarations, {} statements",
            file.decls.len(),
            file.body.len()
        );
    }

    let mut state = CompilationState::new(file);
    state.provenance = Some(pipeline::compute_provenance(&source));

    // ── Run passes ──
    if let Some(terminal) = cli.emit.terminal_pass() {
        let result = pipeline::run_pipeline(&mut state, terminal, cli.verbose, |_, diags| {
            report(diags)
        });
        if result.is_err() || state.has_error {
            std::process::exit(1);
        }
    }

    // ── Emit ──
    let text = match cli.emit {
        EmitStage::Ir => state.program.as_ref().map(|p| p.to_string()),
        EmitStage::Unpacked => state.unpacked.as_ref().map(|p| p.to_string()),
        EmitStage::Symbols => match state.symbols.as_ref().map(pipeline::symbol_report_json) {
            Some(Ok(json)) => Some(json),
            Some(Err(e)) => {
                eprintln!("bufunpack: error: {}", e);
                std::process::exit(1);
            }
            None => None,
        },
        EmitStage::BuildInfo => state.provenance.as_ref().map(|p| p.to_json()),
    };
    let Some(text) = text else {
        eprintln!("bufunpack: internal error: {:?} output was not produced", cli.emit);
        std::process::exit(1);
    };

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &text) {
                eprintln!("bufunpack: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
            if cli.verbose {
                eprintln!("bufunpack: wrote {}", path.display());
            }
        }
        None => print!("{}", text),
    }
}
