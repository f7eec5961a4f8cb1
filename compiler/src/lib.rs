// bufunpack: buffer unpacking pass
//
// Library root. The IR and the pass are self-contained; the `.bir` front
// end, printer and pipeline exist to drive and inspect the pass.

pub mod ast;
pub mod diag;
pub mod ir;
pub mod ir_printer;
pub mod lexer;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod resolve;
pub mod runtime;
pub mod unpack;
