//! Runtime values produced by evaluating transpiled fragments.

use std::fmt;
use std::sync::Arc;

use draftlab_protocol::{PortableElement, PortableValue};

use crate::error::{TransportError, ValueFormatError};
use crate::transpiler::{self, Expr};

/// A runtime value. `Unset` is the sentinel for "no value yet"; it is
/// distinct from `Null`, which a fragment can produce deliberately.
#[derive(Clone)]
pub enum Value {
    Unset,
    Null,
    Text(Arc<str>),
    Number(f64),
    Bool(bool),
    Object(Vec<(String, Value)>),
    Array(Vec<Value>),
    Function(FunctionValue),
    Markup(Element),
    /// A host-provided callable. Never crosses the context boundary.
    NativeCallback(NativeCallback),
}

#[derive(Clone)]
pub struct FunctionValue {
    pub parameters: Vec<String>,
    pub body: Arc<Vec<Expr>>,
    /// Original source text; this is what travels across contexts and what
    /// the editor shows when the property is reopened.
    pub source: Arc<str>,
}

#[derive(Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, Value)>,
    pub children: Vec<Value>,
}

pub type NativeCallback = Arc<dyn Fn(&[Value]) -> Value>;

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unset, Self::Unset) | (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            // Functions compare by what the user wrote, not by body identity.
            (Self::Function(a), Self::Function(b)) => {
                a.parameters == b.parameters && a.source == b.source
            }
            (Self::Markup(a), Self::Markup(b)) => a == b,
            (Self::NativeCallback(a), Self::NativeCallback(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "Unset"),
            Self::Null => write!(f, "Null"),
            Self::Text(text) => write!(f, "Text({text:?})"),
            Self::Number(number) => write!(f, "Number({number})"),
            Self::Bool(value) => write!(f, "Bool({value})"),
            Self::Object(entries) => f.debug_tuple("Object").field(entries).finish(),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Function(function) => {
                write!(f, "Function({})", function.source)
            }
            Self::Markup(element) => write!(f, "Markup(<{}>)", element.tag),
            Self::NativeCallback(_) => write!(f, "NativeCallback"),
        }
    }
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Null => "null",
            Self::Text(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Function(_) => "function",
            Self::Markup(_) => "markup",
            Self::NativeCallback(_) => "function",
        }
    }

    /// Convert to the wire form. `Ok(None)` means the value is a native
    /// callback, which is silently stripped rather than rejected so that an
    /// object holding one still travels (minus that member).
    pub fn to_portable(&self) -> Result<Option<PortableValue>, TransportError> {
        let portable = match self {
            Self::Unset => PortableValue::Unset,
            Self::Null => PortableValue::Null,
            Self::Text(text) => PortableValue::Text(text.to_string()),
            Self::Number(number) => {
                if !number.is_finite() {
                    return Err(TransportError::NotPortable(format!(
                        "non-finite number {number}"
                    )));
                }
                PortableValue::Number(*number)
            }
            Self::Bool(value) => PortableValue::Bool(*value),
            Self::Object(entries) => {
                let mut portable_entries = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    if let Some(portable) = value.to_portable()? {
                        portable_entries.push((key.clone(), portable));
                    }
                }
                PortableValue::Object(portable_entries)
            }
            Self::Array(items) => {
                let mut portable_items = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(portable) = item.to_portable()? {
                        portable_items.push(portable);
                    }
                }
                PortableValue::Array(portable_items)
            }
            Self::Function(function) => PortableValue::Function {
                params: function.parameters.clone(),
                source: function.source.to_string(),
            },
            Self::Markup(element) => PortableValue::Markup(element.to_portable()?),
            Self::NativeCallback(_) => return Ok(None),
        };
        Ok(Some(portable))
    }

    /// Rebuild a runtime value from the wire form. Functions are carried as
    /// source text and re-transpiled here.
    pub fn from_portable(portable: &PortableValue) -> Result<Self, ValueFormatError> {
        let value = match portable {
            PortableValue::Unset => Self::Unset,
            PortableValue::Null => Self::Null,
            PortableValue::Text(text) => Self::Text(Arc::from(text.as_str())),
            PortableValue::Number(number) => Self::Number(*number),
            PortableValue::Bool(value) => Self::Bool(*value),
            PortableValue::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), Self::from_portable(value)?)))
                    .collect::<Result<_, ValueFormatError>>()?,
            ),
            PortableValue::Array(items) => Self::Array(
                items
                    .iter()
                    .map(Self::from_portable)
                    .collect::<Result<_, ValueFormatError>>()?,
            ),
            PortableValue::Function { params, source } => {
                let artifact = transpiler::transpile(source)?;
                match artifact.statements.into_iter().next() {
                    Some(Expr::Function {
                        parameters, body, ..
                    }) => Self::Function(FunctionValue {
                        parameters,
                        body: Arc::new(body),
                        source: Arc::from(source.as_str()),
                    }),
                    // Source that is no longer an arrow still round-trips as
                    // a zero-body function with the declared parameters.
                    _ => Self::Function(FunctionValue {
                        parameters: params.clone(),
                        body: Arc::new(Vec::new()),
                        source: Arc::from(source.as_str()),
                    }),
                }
            }
            PortableValue::Markup(element) => Self::Markup(Element::from_portable(element)?),
        };
        Ok(value)
    }
}

impl Element {
    fn to_portable(&self) -> Result<PortableElement, TransportError> {
        let mut attributes = Vec::with_capacity(self.attributes.len());
        for (name, value) in &self.attributes {
            if let Some(portable) = value.to_portable()? {
                attributes.push((name.clone(), portable));
            }
        }
        let mut children = Vec::with_capacity(self.children.len());
        for child in &self.children {
            if let Some(portable) = child.to_portable()? {
                children.push(portable);
            }
        }
        Ok(PortableElement {
            tag: self.tag.clone(),
            attributes,
            children,
        })
    }

    fn from_portable(element: &PortableElement) -> Result<Self, ValueFormatError> {
        Ok(Self {
            tag: element.tag.clone(),
            attributes: element
                .attributes
                .iter()
                .map(|(name, value)| Ok((name.clone(), Value::from_portable(value)?)))
                .collect::<Result<_, ValueFormatError>>()?,
            children: element
                .children
                .iter()
                .map(Value::from_portable)
                .collect::<Result<_, ValueFormatError>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_callback_is_stripped_from_objects() {
        let value = Value::Object(vec![
            ("n".to_owned(), Value::Number(1.0)),
            (
                "cb".to_owned(),
                Value::NativeCallback(Arc::new(|_| Value::Unset)),
            ),
        ]);
        let portable = value.to_portable().unwrap().unwrap();
        assert_eq!(
            portable,
            PortableValue::Object(vec![("n".to_owned(), PortableValue::Number(1.0))])
        );
    }

    #[test]
    fn non_finite_number_is_not_portable() {
        let error = Value::Number(f64::NAN).to_portable().unwrap_err();
        assert!(matches!(error, TransportError::NotPortable(_)));
    }

    #[test]
    fn function_travels_as_source() {
        let artifact = transpiler::transpile("(a) => a + 1").unwrap();
        let function = match artifact.statements.into_iter().next().unwrap() {
            Expr::Function {
                parameters,
                body,
                source,
            } => Value::Function(FunctionValue {
                parameters,
                body: Arc::new(body),
                source: Arc::from(source),
            }),
            other => panic!("expected function, got {other:?}"),
        };

        let portable = function.to_portable().unwrap().unwrap();
        let rebuilt = Value::from_portable(&portable).unwrap();
        assert_eq!(function, rebuilt);
    }

    #[test]
    fn unset_and_null_are_distinct() {
        assert_ne!(Value::Unset, Value::Null);
        let portable = Value::Unset.to_portable().unwrap().unwrap();
        assert_eq!(Value::from_portable(&portable).unwrap(), Value::Unset);
    }
}
