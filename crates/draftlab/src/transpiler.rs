//! Speculative transpilation of user-typed source fragments.
//!
//! The editing surface calls [`transpile`] on every keystroke, so the whole
//! pipeline is transformation only: lexing, parsing and lowering never
//! evaluate anything and never panic on malformed input — all failures come
//! back as [`SyntaxError`] values carrying a rendered report.
//!
//! The accepted dialect is a small JS-flavoured fragment language:
//!
//! - literals: numbers, single/double-quoted strings, `true`, `false`, `null`
//! - dotted paths and calls: `window.alert('hi')`
//! - object literals `{ a: 1 }`, array literals `[1, 2]`
//! - arrow functions `(a, b) => a + b` and `() => { stmt; stmt }`
//! - statement sequences separated by `;` (the last statement is the value)
//! - binary arithmetic/comparison and unary `-`/`!`
//! - markup fragments `<tag attr="s" attr={expr}>text {expr} <child/></tag>`
//!
//! Markup is lowered to plain `el(tag, attributes, children)` calls, so the
//! evaluator never sees markup syntax.

use std::fmt;
use std::sync::Arc;

use ariadne::{Config, Label, Report, ReportKind, Source};
use chumsky::{input::ValueInput, pratt::*, prelude::*};

use crate::error::SyntaxError;

mod lexer;
pub use lexer::{Token, lexer};

mod markup;
pub use markup::{AttrValue, MarkupChild, MarkupNode};

pub type Span = SimpleSpan;
pub type ParseError<'code, T> = Rich<'code, T, Span>;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

/// End-of-input span used when mapping a token stream into parser input.
pub fn span_at(offset: usize) -> Span {
    (offset..offset).into()
}

#[derive(Debug, Clone)]
pub enum Expression<'code> {
    Literal(Literal<'code>),
    Path(Vec<&'code str>),
    Call {
        path: Vec<&'code str>,
        arguments: Vec<Spanned<Self>>,
    },
    ObjectLiteral {
        entries: Vec<(&'code str, Spanned<Self>)>,
    },
    ArrayLiteral {
        items: Vec<Spanned<Self>>,
    },
    Arrow {
        parameters: Vec<&'code str>,
        body: Vec<Spanned<Self>>,
    },
    Markup {
        raw: &'code str,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Spanned<Self>>,
    },
    Binary {
        operator: BinaryOperator,
        operand_a: Box<Spanned<Self>>,
        operand_b: Box<Spanned<Self>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'code> {
    Number(f64),
    Text(&'code str),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

pub fn parser<'code, I>()
-> impl Parser<'code, I, Vec<Spanned<Expression<'code>>>, extra::Err<ParseError<'code, Token<'code>>>>
where
    I: ValueInput<'code, Token = Token<'code>, Span = Span>,
{
    let expression = recursive(|expression| {
        let identifier = select! { Token::Identifier(name) => name };

        let literal = select! {
            Token::Number(number) => Expression::Literal(Literal::Number(number)),
            Token::Text(text) => Expression::Literal(Literal::Text(text)),
            Token::True => Expression::Literal(Literal::Bool(true)),
            Token::False => Expression::Literal(Literal::Bool(false)),
            Token::Null => Expression::Literal(Literal::Null),
        };

        let markup_fragment = select! { Token::Markup(raw) => Expression::Markup { raw } };

        let path = identifier
            .separated_by(just(Token::Dot))
            .at_least(1)
            .collect::<Vec<_>>();

        let arguments = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let call_or_path = path.then(arguments.or_not()).map(|(path, arguments)| {
            match arguments {
                Some(arguments) => Expression::Call { path, arguments },
                None => Expression::Path(path),
            }
        });

        let key = identifier.or(select! { Token::Text(text) => text });
        let entry = group((key, just(Token::Colon), expression.clone()))
            .map(|(key, _, value)| (key, value));
        let object = entry
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect()
            .delimited_by(just(Token::BraceOpen), just(Token::BraceClose))
            .map(|entries| Expression::ObjectLiteral { entries });

        let array = expression
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(|items| Expression::ArrayLiteral { items });

        let arrow = {
            let parameters = identifier
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect()
                .delimited_by(just(Token::ParenOpen), just(Token::ParenClose))
                .or(identifier.map(|parameter| vec![parameter]));

            // After `=>` a brace opens a statement block, not an object literal.
            let block_body = expression
                .clone()
                .separated_by(just(Token::Semicolon))
                .allow_trailing()
                .collect()
                .delimited_by(just(Token::BraceOpen), just(Token::BraceClose));

            let expression_body = expression.clone().map(|body| vec![body]);

            parameters
                .then_ignore(just(Token::Arrow))
                .then(block_body.or(expression_body))
                .map(|(parameters, body)| Expression::Arrow { parameters, body })
        };

        let nested = expression
            .clone()
            .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

        let atom = choice((
            literal,
            markup_fragment,
            arrow,
            call_or_path,
            object,
            array,
        ));

        atom.map_with(|expression, extra| Spanned {
            span: extra.span(),
            node: expression,
        })
        .or(nested)
        .pratt((
            prefix(9, just(Token::Minus), |_, operand, extra| Spanned {
                span: extra.span(),
                node: Expression::Unary {
                    operator: UnaryOperator::Negate,
                    operand: Box::new(operand),
                },
            }),
            prefix(9, just(Token::Bang), |_, operand, extra| Spanned {
                span: extra.span(),
                node: Expression::Unary {
                    operator: UnaryOperator::Not,
                    operand: Box::new(operand),
                },
            }),
            infix(left(7), just(Token::Asterisk), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Multiply,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(7), just(Token::Slash), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Divide,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(5), just(Token::Plus), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Add,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(5), just(Token::Minus), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Subtract,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::EqualEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Equal,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::NotEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::NotEqual,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::Less), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Less,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::LessOrEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::LessOrEqual,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::Greater), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::Greater,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
            infix(left(3), just(Token::GreaterOrEqual), |l, _, r, extra| Spanned {
                span: extra.span(),
                node: Expression::Binary {
                    operator: BinaryOperator::GreaterOrEqual,
                    operand_a: Box::new(l),
                    operand_b: Box::new(r),
                },
            }),
        ))
    });

    expression
        .separated_by(just(Token::Semicolon))
        .allow_trailing()
        .collect()
}

/// Evaluator-ready expression: owned, markup lowered to `el(...)` calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
    Path(Vec<String>),
    Call {
        path: Vec<String>,
        arguments: Vec<Expr>,
    },
    Object {
        entries: Vec<(String, Expr)>,
    },
    Array {
        items: Vec<Expr>,
    },
    Function {
        parameters: Vec<String>,
        body: Vec<Expr>,
        source: String,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        operand_a: Box<Expr>,
        operand_b: Box<Expr>,
    },
}

/// The output of [`transpile`]: a validated, evaluable form of the fragment.
#[derive(Debug, Clone)]
pub struct EvaluableArtifact {
    pub source: Arc<str>,
    pub statements: Vec<Expr>,
}

/// Transform a source fragment into an evaluable artifact.
///
/// Transformation only — nothing is executed. Safe to call per keystroke.
pub fn transpile(source: &str) -> Result<EvaluableArtifact, SyntaxError> {
    let statements = parse_fragment(source)?;
    Ok(EvaluableArtifact {
        source: Arc::from(source),
        statements,
    })
}

/// Cheap structural check: does the trimmed text look like a markup tag?
///
/// Used to choose between the String and Transpile hints for markup-kind
/// properties. This is a heuristic, not a parse: text that merely starts
/// with `<` and ends with `>` passes.
pub fn is_markup_fragment(source: &str) -> bool {
    let trimmed = source.trim();
    trimmed.len() >= 3
        && trimmed.starts_with('<')
        && trimmed.ends_with('>')
        && trimmed[1..]
            .chars()
            .next()
            .is_some_and(|character| character.is_ascii_alphabetic())
}

fn parse_fragment(source: &str) -> Result<Vec<Expr>, SyntaxError> {
    let (tokens, errors) = lexer().parse(source).into_output_errors();
    if !errors.is_empty() {
        return Err(syntax_error(errors, source));
    }
    let tokens = tokens.unwrap_or_default();

    let input = tokens.map(span_at(source.len()), |Spanned { node, span }| {
        (node, span)
    });
    let (expressions, errors) = parser().parse(input).into_output_errors();
    if !errors.is_empty() {
        return Err(syntax_error(errors, source));
    }
    let expressions = expressions.unwrap_or_default();

    expressions
        .iter()
        .map(|expression| lower(expression, source))
        .collect()
}

fn lower(spanned: &Spanned<Expression<'_>>, source: &str) -> Result<Expr, SyntaxError> {
    let lowered = match &spanned.node {
        Expression::Literal(Literal::Number(number)) => Expr::Number(*number),
        Expression::Literal(Literal::Text(text)) => Expr::Text(unescape(text)),
        Expression::Literal(Literal::Bool(value)) => Expr::Bool(*value),
        Expression::Literal(Literal::Null) => Expr::Null,
        Expression::Path(parts) => Expr::Path(owned_path(parts)),
        Expression::Call { path, arguments } => Expr::Call {
            path: owned_path(path),
            arguments: arguments
                .iter()
                .map(|argument| lower(argument, source))
                .collect::<Result<_, _>>()?,
        },
        Expression::ObjectLiteral { entries } => Expr::Object {
            entries: entries
                .iter()
                .map(|(key, value)| Ok(((*key).to_owned(), lower(value, source)?)))
                .collect::<Result<_, SyntaxError>>()?,
        },
        Expression::ArrayLiteral { items } => Expr::Array {
            items: items
                .iter()
                .map(|item| lower(item, source))
                .collect::<Result<_, _>>()?,
        },
        Expression::Arrow { parameters, body } => Expr::Function {
            parameters: parameters
                .iter()
                .map(|parameter| (*parameter).to_owned())
                .collect(),
            body: body
                .iter()
                .map(|statement| lower(statement, source))
                .collect::<Result<_, _>>()?,
            // The function's own source is kept so the value can travel
            // across the context boundary and be re-transpiled there.
            source: source[spanned.span.into_range()].trim().to_owned(),
        },
        Expression::Markup { raw } => lower_markup(&parse_markup(raw)?)?,
        Expression::Unary { operator, operand } => Expr::Unary {
            operator: *operator,
            operand: Box::new(lower(operand, source)?),
        },
        Expression::Binary {
            operator,
            operand_a,
            operand_b,
        } => Expr::Binary {
            operator: *operator,
            operand_a: Box::new(lower(operand_a, source)?),
            operand_b: Box::new(lower(operand_b, source)?),
        },
    };
    Ok(lowered)
}

// String tokens carry their raw slice; backslash escapes resolve here.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut characters = text.chars();
    while let Some(character) = characters.next() {
        if character == '\\' {
            if let Some(escaped) = characters.next() {
                out.push(escaped);
            }
        } else {
            out.push(character);
        }
    }
    out
}

fn owned_path(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_owned()).collect()
}

fn parse_markup(raw: &str) -> Result<MarkupNode<'_>, SyntaxError> {
    let (node, errors) = markup::element()
        .padded()
        .parse(raw)
        .into_output_errors();
    if !errors.is_empty() {
        return Err(syntax_error(errors, raw));
    }
    node.ok_or_else(|| plain_syntax_error("empty markup fragment"))
}

/// Lower a markup node to a plain `el(tag, attributes, children)` call.
fn lower_markup(node: &MarkupNode<'_>) -> Result<Expr, SyntaxError> {
    let mut entries = Vec::with_capacity(node.attributes.len());
    for (name, value) in &node.attributes {
        let lowered = match value {
            AttrValue::Text(text) => Expr::Text(unescape(text)),
            AttrValue::Bare => Expr::Bool(true),
            AttrValue::Expression(raw) => lower_embedded(raw)?,
        };
        entries.push(((*name).to_owned(), lowered));
    }

    let mut children = Vec::new();
    for child in &node.children {
        match child {
            MarkupChild::Element(element) => children.push(lower_markup(element)?),
            MarkupChild::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    children.push(Expr::Text(text.to_owned()));
                }
            }
            MarkupChild::Expression(raw) => children.push(lower_embedded(raw)?),
        }
    }

    Ok(Expr::Call {
        path: vec!["el".to_owned()],
        arguments: vec![
            Expr::Text(node.tag.to_owned()),
            Expr::Object { entries },
            Expr::Array { items: children },
        ],
    })
}

fn lower_embedded(raw: &str) -> Result<Expr, SyntaxError> {
    let mut statements = parse_fragment(raw)?;
    match statements.len() {
        1 => Ok(statements.pop().unwrap()),
        0 => Err(plain_syntax_error("empty interpolated expression")),
        _ => Err(plain_syntax_error(
            "expected a single interpolated expression",
        )),
    }
}

fn plain_syntax_error(message: &str) -> SyntaxError {
    SyntaxError {
        message: message.to_owned(),
        report: message.to_owned(),
    }
}

fn syntax_error<'code, T: fmt::Display + 'code>(
    errors: Vec<ParseError<'code, T>>,
    source: &str,
) -> SyntaxError {
    let message = errors
        .first()
        .map(|error| error.to_string())
        .unwrap_or_else(|| "invalid syntax".to_owned());

    let mut buffer = Vec::new();
    for error in &errors {
        Report::build(ReportKind::Error, ("fragment", error.span().into_range()))
            .with_config(Config::default().with_color(false))
            .with_message(error.to_string())
            .with_label(
                Label::new(("fragment", error.span().into_range()))
                    .with_message(error.reason().to_string()),
            )
            .finish()
            .write(("fragment", Source::from(source)), &mut buffer)
            .ok();
    }

    SyntaxError {
        message,
        report: String::from_utf8_lossy(&buffer).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_literal() {
        let artifact = transpile("{ a: 1, b: 'x' }").unwrap();
        assert_eq!(
            artifact.statements,
            vec![Expr::Object {
                entries: vec![
                    ("a".to_owned(), Expr::Number(1.0)),
                    ("b".to_owned(), Expr::Text("x".to_owned())),
                ],
            }]
        );
    }

    #[test]
    fn arrow_function_keeps_source() {
        let artifact = transpile("(a, b) => a + b").unwrap();
        match &artifact.statements[0] {
            Expr::Function {
                parameters, source, ..
            } => {
                assert_eq!(parameters, &["a", "b"]);
                assert_eq!(source, "(a, b) => a + b");
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn statement_sequence() {
        let artifact = transpile("window.alert('x'); 5").unwrap();
        assert_eq!(artifact.statements.len(), 2);
        assert_eq!(artifact.statements[1], Expr::Number(5.0));
    }

    #[test]
    fn markup_is_lowered_to_el_calls() {
        let artifact = transpile("<div id='x'><span/>{1 + 2}</div>").unwrap();
        match &artifact.statements[0] {
            Expr::Call { path, arguments } => {
                assert_eq!(path, &["el"]);
                assert_eq!(arguments[0], Expr::Text("div".to_owned()));
                match &arguments[2] {
                    Expr::Array { items } => assert_eq!(items.len(), 2),
                    other => panic!("expected children array, got {other:?}"),
                }
            }
            other => panic!("expected el call, got {other:?}"),
        }
    }

    #[test]
    fn escaped_quotes_in_strings() {
        let artifact = transpile(r"'it\'s'").unwrap();
        assert_eq!(artifact.statements, vec![Expr::Text("it's".to_owned())]);

        let artifact = transpile(r#""a \"b\" c""#).unwrap();
        assert_eq!(artifact.statements, vec![Expr::Text("a \"b\" c".to_owned())]);
    }

    #[test]
    fn broken_object_is_a_syntax_error() {
        let error = transpile("{ invalid").unwrap_err();
        assert!(!error.report.is_empty());
    }

    #[test]
    fn markup_heuristic() {
        assert!(is_markup_fragment("<div>hi</div>"));
        assert!(is_markup_fragment("  <input />  "));
        assert!(!is_markup_fragment("plain text"));
        assert!(!is_markup_fragment("< 3 >"));
        assert!(!is_markup_fragment("<>"));
    }

    #[test]
    fn precedence() {
        let artifact = transpile("1 + 2 * 3").unwrap();
        match &artifact.statements[0] {
            Expr::Binary {
                operator: BinaryOperator::Add,
                operand_b,
                ..
            } => assert!(matches!(
                **operand_b,
                Expr::Binary {
                    operator: BinaryOperator::Multiply,
                    ..
                }
            )),
            other => panic!("expected additive root, got {other:?}"),
        }
    }
}
