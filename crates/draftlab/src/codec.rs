//! The value codec: source text to [`Value`] and back.
//!
//! [`serialize`] turns user-typed text into a value, steered by hints:
//! `String` takes the text verbatim, `Transpile` runs the speculative
//! pipeline and evaluates the result with dialogs suppressed. [`deserialize`]
//! prints a value back to editable text; for canonically formatted text the
//! two compose into a round trip.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::ValueFormatError;
use crate::eval::{Host, SuppressGuard, evaluate};
use crate::protocol::ValueKind;
use crate::transpiler::transpile;
use crate::value::{Element, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// Take the text verbatim as a string value.
    String,
    /// Transpile and evaluate the text.
    Transpile,
}

pub type Hints = SmallVec<[Hint; 2]>;

/// Turn source text into a value of the declared kind.
///
/// With no hints the kind decides: string-kind properties take the text
/// verbatim, everything else transpiles. Evaluation runs under a
/// [`SuppressGuard`], so validating a draft never pops host dialogs.
pub fn serialize(
    text: &str,
    kind: ValueKind,
    hints: &[Hint],
    host: &Host,
) -> Result<Value, ValueFormatError> {
    let transpile_requested = if hints.is_empty() {
        kind != ValueKind::String
    } else {
        hints.contains(&Hint::Transpile)
    };

    if !transpile_requested {
        return Ok(Value::Text(Arc::from(text)));
    }

    let artifact = transpile(text)?;
    let value = {
        let _guard = SuppressGuard::engage(host);
        evaluate(&artifact, host)?
    };
    coerce(value, kind)
}

fn coerce(value: Value, kind: ValueKind) -> Result<Value, ValueFormatError> {
    let accepted = match (kind, &value) {
        (_, Value::Unset | Value::Null) => true,
        (ValueKind::String, Value::Text(_)) => true,
        (ValueKind::Number, Value::Number(_)) => true,
        (ValueKind::Bool, Value::Bool(_)) => true,
        // Shapes are objects with a declared layout; the codec treats both
        // as plain objects.
        (ValueKind::Object | ValueKind::Shape, Value::Object(_)) => true,
        (ValueKind::Array, Value::Array(_)) => true,
        (ValueKind::Function, Value::Function(_) | Value::NativeCallback(_)) => true,
        // Markup-kind properties accept plain text fallbacks.
        (ValueKind::Markup, Value::Markup(_) | Value::Text(_)) => true,
        _ => false,
    };
    if accepted {
        Ok(value)
    } else {
        Err(ValueFormatError::KindMismatch {
            expected: kind.name(),
            actual: value.kind_name(),
        })
    }
}

/// Print a value as editable source text.
///
/// Text values come back raw (no quotes), functions come back as the exact
/// source the user wrote, `Unset` prints as empty text.
pub fn deserialize(value: &Value, pretty: bool) -> String {
    match value {
        Value::Unset => String::new(),
        Value::Text(text) => text.to_string(),
        Value::Function(function) => function.source.to_string(),
        Value::NativeCallback(_) => "() => {}".to_owned(),
        other => {
            let mut out = String::new();
            print_value(other, &mut out, 0, pretty);
            out
        }
    }
}

fn print_value(value: &Value, out: &mut String, indent: usize, pretty: bool) {
    match value {
        Value::Unset => {}
        Value::Null => out.push_str("null"),
        Value::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::Text(text) => print_quoted(text, out),
        Value::Object(entries) => print_object(entries, out, indent, pretty),
        Value::Array(items) => print_array(items, out, indent, pretty),
        Value::Function(function) => out.push_str(&function.source),
        Value::NativeCallback(_) => out.push_str("() => {}"),
        Value::Markup(element) => print_element(element, out, indent, pretty),
    }
}

// Single quotes by default; double quotes when that avoids escaping. Text
// holding both quote styles gets backslash escapes, which the lexer accepts.
fn print_quoted(text: &str, out: &mut String) {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for character in text.chars() {
        if character == quote || character == '\\' {
            out.push('\\');
        }
        out.push(character);
    }
    out.push(quote);
}

fn print_object(entries: &[(String, Value)], out: &mut String, indent: usize, pretty: bool) {
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push('{');
    for (index, (key, value)) in entries.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        separator(out, indent + 1, pretty);
        out.push_str(key);
        out.push_str(": ");
        print_value(value, out, indent + 1, pretty);
    }
    separator(out, indent, pretty);
    out.push('}');
}

fn print_array(items: &[Value], out: &mut String, indent: usize, pretty: bool) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push('[');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        separator(out, indent + 1, pretty);
        print_value(item, out, indent + 1, pretty);
    }
    separator(out, indent, pretty);
    out.push(']');
}

fn separator(out: &mut String, indent: usize, pretty: bool) {
    if pretty {
        out.push('\n');
        for _ in 0..indent {
            out.push_str("  ");
        }
    } else {
        out.push(' ');
    }
}

fn print_element(element: &Element, out: &mut String, indent: usize, pretty: bool) {
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        match value {
            Value::Bool(true) => {}
            Value::Text(text) => {
                out.push('=');
                print_quoted(text, out);
            }
            other => {
                out.push_str("={");
                print_value(other, out, indent, false);
                out.push('}');
            }
        }
    }
    if element.children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            Value::Text(text) => out.push_str(text),
            Value::Markup(nested) => print_element(nested, out, indent, pretty),
            other => {
                out.push('{');
                print_value(other, out, indent, false);
                out.push('}');
            }
        }
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}
