// ir_printer.rs: Textual form of the IR
//
// `Display` impls emitting `.bir` syntax: one statement per line, block
// bodies indented by two spaces, binary expressions fully parenthesized.
// The output of a resolved program parses back to the same tree for every
// construct the front end produces.
//
// Preconditions: none.
// Postconditions: output ends with a newline unless the body is empty.
// Failure modes: none.
// Side effects: none.

use std::fmt::{self, Write as _};

use crate::ir::{BufferLikeRef, Expr, Program, Stmt};

const INDENT: &str = "  ";

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntImm { value, .. } => write!(f, "{}", value),
            Expr::FloatImm { value, .. } => write!(f, "{:?}", value),
            Expr::StringImm(s) => write_string_literal(f, s),
            Expr::Var { name, .. } => f.write_str(name),
            Expr::Binary { op, a, b } => write!(f, "({} {} {})", a, op.symbol(), b),
            Expr::Load { name, index, .. } => write!(f, "{}[{}]", name, index),
            Expr::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_char(')')
            }
            Expr::Let { name, value, body } => {
                write!(f, "(let {} = {} in {})", name, value, body)
            }
        }
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

fn pad(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    match stmt {
        // The body of a let continues at the same depth.
        Stmt::LetStmt { name, value, body } => {
            pad(f, depth)?;
            writeln!(f, "let {} = {}", name, value)?;
            write_stmt(f, body, depth)
        }
        Stmt::Assert { condition, message } => {
            pad(f, depth)?;
            writeln!(f, "assert({}, {})", condition, message)
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                write_stmt(f, s, depth)?;
            }
            Ok(())
        }
        Stmt::For {
            name,
            min,
            extent,
            body,
        } => {
            pad(f, depth)?;
            writeln!(f, "for ({}, {}, {}) {{", name, min, extent)?;
            write_stmt(f, body, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "}}")
        }
        Stmt::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            pad(f, depth)?;
            writeln!(f, "if ({}) {{", condition)?;
            write_stmt(f, then_case, depth + 1)?;
            pad(f, depth)?;
            match else_case {
                Some(else_case) => {
                    writeln!(f, "}} else {{")?;
                    write_stmt(f, else_case, depth + 1)?;
                    pad(f, depth)?;
                    writeln!(f, "}}")
                }
                None => writeln!(f, "}}"),
            }
        }
        Stmt::Store {
            name, value, index, ..
        } => {
            pad(f, depth)?;
            writeln!(f, "{}[{}] = {}", name, index, value)
        }
        Stmt::Evaluate(e) => {
            pad(f, depth)?;
            writeln!(f, "{}", e)
        }
    }
}

/// Declaration line for an input: `buffer img: u8, 2`.
impl fmt::Display for BufferLikeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferLikeRef::Parameter(p) if p.is_buffer => {
                write!(f, "buffer {}: {}, {}", p.name, p.ty, p.dimensions)
            }
            BufferLikeRef::Parameter(p) => write!(f, "param {}: {}", p.name, p.ty),
            BufferLikeRef::Literal(l) => {
                write!(f, "image {}: {}, {}", l.name, l.elem_type, l.dimensions)
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            writeln!(f, "{}", input)?;
        }
        if !self.inputs.is_empty() {
            writeln!(f)?;
        }
        write!(f, "{}", self.body)
    }
}
