//! Character-level parser for markup fragments.
//!
//! Attribute expressions and interpolated children are captured as raw
//! source slices (balanced-brace capture) and parsed with the expression
//! pipeline during lowering, so markup and plain expressions can nest.

use super::ParseError;
use chumsky::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupNode<'code> {
    pub tag: &'code str,
    pub attributes: Vec<(&'code str, AttrValue<'code>)>,
    pub children: Vec<MarkupChild<'code>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue<'code> {
    /// Quoted literal: attr="text" or attr='text'
    Text(&'code str),
    /// Braced expression source: attr={expr}
    Expression(&'code str),
    /// Bare attribute: attr (shorthand for `true`)
    Bare,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupChild<'code> {
    Element(MarkupNode<'code>),
    Text(&'code str),
    /// Interpolated child: { expr }
    Expression(&'code str),
}

pub fn element<'code>()
-> impl Parser<'code, &'code str, MarkupNode<'code>, extra::Err<ParseError<'code, char>>> {
    recursive(|element| {
        let tag_name = any()
            .filter(char::is_ascii_alphabetic)
            .then(
                any()
                    .filter(|character: &char| {
                        character.is_ascii_alphanumeric()
                            || *character == '-'
                            || *character == '_'
                    })
                    .repeated(),
            )
            .to_slice();

        // Balanced-brace capture: the braces themselves must balance, brace
        // characters inside string literals are not understood.
        let braced_inner = recursive(|braced_inner| {
            choice((
                just('{').then(braced_inner).then(just('}')).to_slice(),
                none_of("{}").to_slice(),
            ))
            .repeated()
            .to_slice()
        });
        let braced = just('{')
            .ignore_then(braced_inner)
            .then_ignore(just('}'));

        // Raw slices with backslash escapes intact, like the fragment lexer.
        let escape = just('\\').then(any()).ignored();
        let quoted = choice((
            just('"')
                .ignore_then(
                    choice((escape.clone(), none_of("\\\"").ignored()))
                        .repeated()
                        .to_slice(),
                )
                .then_ignore(just('"')),
            just('\'')
                .ignore_then(
                    choice((escape, none_of("\\'").ignored()))
                        .repeated()
                        .to_slice(),
                )
                .then_ignore(just('\'')),
        ));

        let attr_value = just('=').padded().ignore_then(choice((
            quoted.map(AttrValue::Text),
            braced.clone().map(AttrValue::Expression),
        )));

        let attribute = tag_name
            .clone()
            .then(attr_value.or_not())
            .map(|(name, value)| (name, value.unwrap_or(AttrValue::Bare)));

        let attributes = attribute.padded().repeated().collect::<Vec<_>>();

        let text_run = none_of("<{}")
            .repeated()
            .at_least(1)
            .to_slice()
            .map(MarkupChild::Text);

        let child = choice((
            element.clone().map(MarkupChild::Element),
            braced.map(MarkupChild::Expression),
            text_run,
        ));

        let children = child.repeated().collect::<Vec<_>>();

        let self_closing = just("/>").map(|_| None);
        let with_children = just('>')
            .ignore_then(children)
            .then_ignore(just("</"))
            .then(tag_name.clone().padded())
            .then_ignore(just('>'))
            .map(Some);

        just('<')
            .ignore_then(tag_name)
            .then(attributes)
            .then_ignore(text::whitespace())
            .then(choice((self_closing, with_children)))
            .try_map(|((tag, attributes), rest), span| match rest {
                None => Ok(MarkupNode {
                    tag,
                    attributes,
                    children: Vec::new(),
                }),
                Some((children, closing)) if closing == tag => Ok(MarkupNode {
                    tag,
                    attributes,
                    children,
                }),
                Some((_, closing)) => Err(ParseError::custom(
                    span,
                    format!("mismatched closing tag: expected </{tag}>, found </{closing}>"),
                )),
            })
    })
}
