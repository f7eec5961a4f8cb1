// Lexer for textual IR (.bir) files.
//
// Uses the `logos` crate for DFA-based lexing. Whitespace, newlines and
// `#` line comments are insignificant: every construct in the grammar is
// self-delimiting.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// `.bir` token types.
///
/// Identifiers carry no value; use the span to retrieve the text.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("buffer")]
    Buffer,
    #[token("image")]
    Image,
    #[token("param")]
    Param,
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("assert")]
    Assert,
    #[token("for")]
    For,
    #[token("if")]
    If,
    #[token("else")]
    Else,

    // ── Symbols ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Equals,

    // ── Operators ──
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    // ── Literals ──
    //
    // Signs are not part of literals; `-` is a prefix operator.
    /// Float literal with a fraction or an exponent.
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", parse_float)]
    Float(f64),

    /// Unsigned integer literal. Range against the target type is checked
    /// by the resolver.
    #[regex(r"[0-9]+", parse_int)]
    Int(u64),

    /// String literal with `\"`, `\\` and `\n` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    // ── Identifier ──
    /// Identifier, optionally dotted: `img`, `img.min.0`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z0-9_]+)*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Buffer => write!(f, "buffer"),
            Token::Image => write!(f, "image"),
            Token::Param => write!(f, "param"),
            Token::Let => write!(f, "let"),
            Token::In => write!(f, "in"),
            Token::Assert => write!(f, "assert"),
            Token::For => write!(f, "for"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Equals => write!(f, "="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Float(v) => write!(f, "{v:?}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "{s:?}"),
            Token::Ident => write!(f, "<ident>"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<u64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a `.bir` source string into tokens.
///
/// Errors are collected and the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("invalid token: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords() {
        let tokens = lex_ok("buffer image param let in assert for if else");
        assert_eq!(
            tokens,
            vec![
                Token::Buffer,
                Token::Image,
                Token::Param,
                Token::Let,
                Token::In,
                Token::Assert,
                Token::For,
                Token::If,
                Token::Else,
            ]
        );
    }

    #[test]
    fn keyword_prefix_is_ident() {
        // `letter` is one identifier, `images` too
        let tokens = lex_ok("letter images");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn two_char_operators_win() {
        let tokens = lex_ok("<= < == = != >= > && ||");
        assert_eq!(
            tokens,
            vec![
                Token::Le,
                Token::Lt,
                Token::EqEq,
                Token::Equals,
                Token::NotEq,
                Token::Ge,
                Token::Gt,
                Token::AndAnd,
                Token::OrOr,
            ]
        );
    }

    #[test]
    fn dotted_identifier_is_one_token() {
        let result = lex("img.extent.1");
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens.len(), 1);
        assert_eq!(result.tokens[0].0, Token::Ident);
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 12 });
    }

    #[test]
    fn numbers() {
        assert_eq!(lex_ok("42"), vec![Token::Int(42)]);
        assert_eq!(lex_ok("2.5"), vec![Token::Float(2.5)]);
        assert_eq!(lex_ok("1e-3"), vec![Token::Float(0.001)]);
        // sign is a separate token
        assert_eq!(lex_ok("-7"), vec![Token::Minus, Token::Int(7)]);
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let result = lex("99999999999999999999999");
        assert!(result.tokens.is_empty());
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_ok(r#""say \"hi\"\\n""#),
            vec![Token::StringLit("say \"hi\"\\n".into())]
        );
        assert_eq!(lex_ok(r#""a\nb""#), vec![Token::StringLit("a\nb".into())]);
    }

    #[test]
    fn newlines_and_comments_skipped() {
        let tokens = lex_ok("# header\nfoo # trailing\n\n  bar\r\n");
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
    }

    #[test]
    fn error_recovery() {
        let result = lex("a ~ b");
        let tokens: Vec<_> = result.tokens.into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec![Token::Ident, Token::Ident]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 2, end: 3 });
    }

    #[test]
    fn store_statement() {
        let tokens = lex_ok("out[(x + 1)] = img[x]");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::LBracket,
                Token::LParen,
                Token::Ident,
                Token::Plus,
                Token::Int(1),
                Token::RParen,
                Token::RBracket,
                Token::Equals,
                Token::Ident,
                Token::LBracket,
                Token::Ident,
                Token::RBracket,
            ]
        );
    }
}
