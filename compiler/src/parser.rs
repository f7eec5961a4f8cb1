// Parser for textual IR (.bir) files.
//
// Parses a token stream (from the lexer) into an AST using chumsky
// combinators. Binary expressions are always parenthesized and calls bind
// tighter than variables, so the grammar needs no precedence climbing and
// no statement separators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub file: Option<SourceFile>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a `.bir` source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (file, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        file,
        errors: all_errors,
    }
}

// ── Main parser builder ──
//
// All rules are built inside `program_parser` so the `source` reference is
// captured once for identifier text.

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, SourceFile, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Expressions ──

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Int(n) => ExprKind::Int(n),
            Token::Float(v) => ExprKind::Float(v),
            Token::StringLit(s) => ExprKind::Str(s),
        };

        let binop = select! {
            Token::Plus => BinOp::Add,
            Token::Minus => BinOp::Sub,
            Token::Star => BinOp::Mul,
            Token::Slash => BinOp::Div,
            Token::Percent => BinOp::Mod,
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::AndAnd => BinOp::And,
            Token::OrOr => BinOp::Or,
        };

        let neg = just(Token::Minus)
            .ignore_then(expr.clone())
            .map(|e| ExprKind::Neg(Box::new(e)));

        // '(' 'let' IDENT '=' expr 'in' expr ')'
        let let_expr = just(Token::Let)
            .ignore_then(ident.clone())
            .then_ignore(just(Token::Equals))
            .then(expr.clone())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .map(|((name, value), body)| ExprKind::Let {
                name,
                value: Box::new(value),
                body: Box::new(body),
            });

        // '(' expr (BINOP expr)? ')'
        let grouped = expr
            .clone()
            .then(binop.then(expr.clone()).or_not())
            .map(|(lhs, rest)| match rest {
                Some((op, rhs)) => ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                None => ExprKind::Paren(Box::new(lhs)),
            });

        let parenthesized = let_expr
            .or(grouped)
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let call = ident
            .clone()
            .then(
                expr.clone()
                    .separated_by(just(Token::Comma))
                    .collect::<Vec<_>>()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map(|(name, args)| ExprKind::Call { name, args });

        let load = ident
            .clone()
            .then(
                expr.clone()
                    .delimited_by(just(Token::LBracket), just(Token::RBracket)),
            )
            .map(|(target, index)| ExprKind::Load {
                target,
                index: Box::new(index),
            });

        let var = ident.clone().map(ExprKind::Var);

        choice((literal, neg, parenthesized, call, load, var))
            .map_with(|kind, e| Expr {
                kind,
                span: e.span(),
            })
    });

    // ── Statements ──
    //
    // seq := simple* ('let' IDENT '=' expr seq)?

    let seq = recursive(|seq| {
        let block = seq
            .clone()
            .delimited_by(just(Token::LBrace), just(Token::RBrace));

        let assert_stmt = just(Token::Assert)
            .ignore_then(
                expr.clone()
                    .then_ignore(just(Token::Comma))
                    .then(expr.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .map(|(condition, message)| StmtKind::Assert { condition, message });

        let for_stmt = just(Token::For)
            .ignore_then(
                ident
                    .clone()
                    .then_ignore(just(Token::Comma))
                    .then(expr.clone())
                    .then_ignore(just(Token::Comma))
                    .then(expr.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block.clone())
            .map(|(((var, min), extent), body)| StmtKind::For {
                var,
                min,
                extent,
                body,
            });

        let if_stmt = just(Token::If)
            .ignore_then(
                expr.clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block.clone())
            .then(just(Token::Else).ignore_then(block).or_not())
            .map(|((condition, then_body), else_body)| StmtKind::If {
                condition,
                then_body,
                else_body,
            });

        let store = ident
            .clone()
            .then(
                expr.clone()
                    .delimited_by(just(Token::LBracket), just(Token::RBracket)),
            )
            .then_ignore(just(Token::Equals))
            .then(expr.clone())
            .map(|((target, index), value)| StmtKind::Store {
                target,
                index,
                value,
            });

        let evaluate = expr.clone().map(StmtKind::Evaluate);

        let simple = choice((assert_stmt, for_stmt, if_stmt, store, evaluate)).map_with(
            |kind, e| Stmt {
                kind,
                span: e.span(),
            },
        );

        let let_stmt = just(Token::Let)
            .ignore_then(ident.clone())
            .then_ignore(just(Token::Equals))
            .then(expr.clone())
            .then(seq)
            .map_with(|((name, value), body), e| Stmt {
                kind: StmtKind::Let { name, value, body },
                span: e.span(),
            });

        simple
            .repeated()
            .collect::<Vec<_>>()
            .then(let_stmt.or_not())
            .map(|(mut stmts, tail)| {
                stmts.extend(tail);
                stmts
            })
    });

    // ── Declarations ──

    let decl_kind = select! {
        Token::Buffer => DeclKind::Buffer,
        Token::Image => DeclKind::Image,
        Token::Param => DeclKind::Param,
    };

    let rank = just(Token::Comma).ignore_then(select! {
        Token::Int(n) = e => (n, e.span()),
    });

    let decl = decl_kind
        .then(ident.clone())
        .then_ignore(just(Token::Colon))
        .then(ident)
        .then(rank.or_not())
        .map_with(|(((kind, name), ty), rank), e| Decl {
            kind,
            name,
            ty,
            rank,
            span: e.span(),
        });

    // ── Program ──

    decl.repeated()
        .collect::<Vec<_>>()
        .then(seq)
        .map_with(|(decls, body), e| SourceFile {
            decls,
            body,
            span: e.span(),
        })
}

// ── Tests ──
