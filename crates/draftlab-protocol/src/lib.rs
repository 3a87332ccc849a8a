//! Shared types crossing the authoring/rendering boundary.
//!
//! Everything in this crate must be representable in plain JSON: the two
//! contexts are isolated execution environments with no shared memory, so
//! all coordination happens through serialized [`ProtocolMessage`]s. Runtime
//! values that cannot travel (native callbacks) are stripped before they
//! reach these types.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Closed set of property value kinds.
///
/// The kind governs how text and runtime value convert and which editor
/// metadata ([`editor_mode`](Self::editor_mode), [`placeholder`](Self::placeholder))
/// the editing surface uses. Adding a kind is a compile-time-checked change:
/// every match below must be extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Number,
    Bool,
    Object,
    /// A declared object shape. Conversion rules are identical to `Object`;
    /// the distinction only affects editor metadata and catalog display.
    Shape,
    Array,
    Function,
    Markup,
}

impl ValueKind {
    /// Syntax-highlighting mode the code editor widget should use.
    pub fn editor_mode(self) -> &'static str {
        match self {
            Self::Object | Self::Shape | Self::Array | Self::Function => "javascript",
            Self::Markup => "jsx",
            Self::String | Self::Number | Self::Bool => "text",
        }
    }

    /// Placeholder text shown in an empty editor.
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Object | Self::Shape => "{ ... }",
            Self::Array => "[ ... ]",
            Self::Function => "() => { ... }",
            Self::Markup => "<div> ... </div>",
            Self::String => "",
            Self::Number => "0",
            Self::Bool => "true",
        }
    }

    /// Human-readable kind name, used in coercion error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Object => "object",
            Self::Shape => "shape",
            Self::Array => "array",
            Self::Function => "function",
            Self::Markup => "markup",
        }
    }
}

/// One declared property of a component. Immutable once the component
/// is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMeta {
    pub name: String,
    pub kind: ValueKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PortableValue>,
}

impl PropertyMeta {
    pub fn required(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: PortableValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// A component as the catalog describes it: stable identity plus the ordered
/// property schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub id: Ulid,
    pub name: String,
    pub props: Vec<PropertyMeta>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, props: Vec<PropertyMeta>) -> Self {
        Self {
            id: Ulid::new(),
            name: name.into(),
            props,
        }
    }

    pub fn prop(&self, name: &str) -> Option<&PropertyMeta> {
        self.props.iter().find(|meta| meta.name == name)
    }
}

/// Transport-safe encoding of a runtime value.
///
/// Functions travel as their source text and are reconstituted by
/// re-transpiling on the receiving side. Object entries are ordered pairs so
/// no special map-key handling is needed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PortableValue {
    Unset,
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Object(Vec<(String, PortableValue)>),
    Array(Vec<PortableValue>),
    Function { params: Vec<String>, source: String },
    Markup(PortableElement),
}

/// A rendered markup element in transport form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortableElement {
    pub tag: String,
    pub attributes: Vec<(String, PortableValue)>,
    pub children: Vec<PortableValue>,
}

/// The unit of cross-context communication.
///
/// `DEMO_INITIALIZED` flows rendering→authoring (the handshake); the other
/// two flow authoring→rendering. Unknown `type` tags must be ignored by
/// receivers, so decoding lives behind an envelope check rather than plain
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ProtocolMessage {
    #[serde(rename = "DEMO_INITIALIZED")]
    DemoInitialized,
    #[serde(rename = "SELECTED_COMPONENT")]
    SelectedComponent(ComponentSpec),
    #[serde(rename = "PROP_STATES")]
    PropStates(Vec<(String, PortableValue)>),
}

impl ProtocolMessage {
    /// The wire tag of this message, also the coalescing key: receivers keep
    /// only the most recent payload per tag.
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::DemoInitialized => "DEMO_INITIALIZED",
            Self::SelectedComponent(_) => "SELECTED_COMPONENT",
            Self::PropStates(_) => "PROP_STATES",
        }
    }

    /// All tags this protocol version understands.
    pub const KNOWN_TYPES: &'static [&'static str] =
        &["DEMO_INITIALIZED", "SELECTED_COMPONENT", "PROP_STATES"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_envelope_shape() {
        let message = ProtocolMessage::DemoInitialized;
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "DEMO_INITIALIZED");

        let message = ProtocolMessage::PropStates(vec![(
            "label".to_owned(),
            PortableValue::Text("hi".to_owned()),
        )]);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "PROP_STATES");
        assert!(json["payload"].is_array());
    }

    #[test]
    fn portable_value_roundtrip() {
        let value = PortableValue::Object(vec![
            ("a".to_owned(), PortableValue::Number(1.0)),
            (
                "f".to_owned(),
                PortableValue::Function {
                    params: vec!["x".to_owned()],
                    source: "(x) => x".to_owned(),
                },
            ),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        let back: PortableValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn wire_types_are_closed() {
        for message in [
            ProtocolMessage::DemoInitialized,
            ProtocolMessage::SelectedComponent(ComponentSpec::new("Button", Vec::new())),
            ProtocolMessage::PropStates(Vec::new()),
        ] {
            assert!(ProtocolMessage::KNOWN_TYPES.contains(&message.wire_type()));
        }
    }
}
