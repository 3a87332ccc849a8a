use super::{ParseError, Spanned, markup};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Arrow,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Bang,
    EqualEqual,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Number(f64),
    Text(&'code str),
    Identifier(&'code str),
    True,
    False,
    Null,
    // A whole markup fragment: <tag ...>...</tag> or <tag ... />.
    // Captured as the raw slice; the fragment is re-parsed during lowering.
    Markup(&'code str),
}

impl<'code> Token<'code> {
    pub fn into_cow_str(self) -> Cow<'code, str> {
        match self {
            Self::ParenOpen => "(".into(),
            Self::ParenClose => ")".into(),
            Self::BraceOpen => "{".into(),
            Self::BraceClose => "}".into(),
            Self::BracketOpen => "[".into(),
            Self::BracketClose => "]".into(),
            Self::Comma => ",".into(),
            Self::Colon => ":".into(),
            Self::Semicolon => ";".into(),
            Self::Dot => ".".into(),
            Self::Arrow => "=>".into(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Asterisk => "*".into(),
            Self::Slash => "/".into(),
            Self::Bang => "!".into(),
            Self::EqualEqual => "==".into(),
            Self::NotEqual => "!=".into(),
            Self::Less => "<".into(),
            Self::LessOrEqual => "<=".into(),
            Self::Greater => ">".into(),
            Self::GreaterOrEqual => ">=".into(),
            Self::Number(number) => number.to_string().into(),
            Self::Text(text) => text.into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
            Self::Null => "null".into(),
            Self::Markup(raw) => raw.into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Spanned<Token<'code>>>, extra::Err<ParseError<'code, char>>> {
    let punctuation = choice((
        just('(').to(Token::ParenOpen),
        just(')').to(Token::ParenClose),
        just('{').to(Token::BraceOpen),
        just('}').to(Token::BraceClose),
        just('[').to(Token::BracketOpen),
        just(']').to(Token::BracketClose),
        just(',').to(Token::Comma),
        just(':').to(Token::Colon),
        just(';').to(Token::Semicolon),
        just('.').to(Token::Dot),
    ));

    let operator = choice((
        just("=>").to(Token::Arrow),
        just("==").to(Token::EqualEqual),
        just("!=").to(Token::NotEqual),
        just("<=").to(Token::LessOrEqual),
        just(">=").to(Token::GreaterOrEqual),
        just('<').to(Token::Less),
        just('>').to(Token::Greater),
        just('!').to(Token::Bang),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Asterisk),
        just('/').to(Token::Slash),
    ));

    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .from_str()
        .unwrapped()
        .map(Token::Number);

    // Backslash escapes the next character. The raw slice (escapes intact)
    // is kept in the token; unescaping happens during lowering.
    let escape = just('\\').then(any()).ignored();
    let string = choice((
        just('\'')
            .ignore_then(
                choice((escape.clone(), none_of("\\'").ignored()))
                    .repeated()
                    .to_slice(),
            )
            .then_ignore(just('\'')),
        just('"')
            .ignore_then(
                choice((escape, none_of("\\\"").ignored()))
                    .repeated()
                    .to_slice(),
            )
            .then_ignore(just('"')),
    ))
    .map(Token::Text);

    let identifier_or_keyword = any()
        .filter(|character: &char| {
            character.is_ascii_alphabetic() || *character == '_' || *character == '$'
        })
        .then(
            any()
                .filter(|character: &char| {
                    character.is_ascii_alphanumeric() || *character == '_' || *character == '$'
                })
                .repeated(),
        )
        .to_slice()
        .map(|identifier| match identifier {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Identifier(identifier),
        });

    // Markup must be tried before `operator` so `<div ...` is captured as a
    // fragment while a bare `<` still lexes as the comparison operator.
    let markup_fragment = markup::element().to_slice().map(Token::Markup);

    let token = choice((
        punctuation,
        number,
        string,
        markup_fragment,
        operator,
        identifier_or_keyword,
    ));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded()
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::prelude::Parser;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        lexer()
            .parse(source)
            .output()
            .unwrap()
            .iter()
            .map(|spanned| spanned.node)
            .collect()
    }

    #[test]
    fn object_source() {
        assert_eq!(
            tokens("{ a: 1 }"),
            vec![
                Token::BraceOpen,
                Token::Identifier("a"),
                Token::Colon,
                Token::Number(1.0),
                Token::BraceClose,
            ]
        );
    }

    #[test]
    fn arrow_and_string() {
        assert_eq!(
            tokens("() => 'hi'"),
            vec![
                Token::ParenOpen,
                Token::ParenClose,
                Token::Arrow,
                Token::Text("hi"),
            ]
        );
    }

    #[test]
    fn markup_is_one_token() {
        assert_eq!(
            tokens("<div class='x'>hello</div>"),
            vec![Token::Markup("<div class='x'>hello</div>")]
        );
    }

    #[test]
    fn comparison_is_not_markup() {
        assert_eq!(
            tokens("1 < 2"),
            vec![Token::Number(1.0), Token::Less, Token::Number(2.0)]
        );
    }

    #[test]
    fn invalid_character_reports_error() {
        let result = lexer().parse("a # b");
        assert!(result.has_errors());
    }
}
