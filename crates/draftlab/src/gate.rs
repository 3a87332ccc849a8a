//! Renderability: may this component be mounted with these values?

use crate::props::PropertyState;
use crate::protocol::PropertyMeta;
use crate::value::Value;

/// True when every required property has a real value. Optional properties
/// never block, `Unset` on a required one always does (`Null` counts as a
/// value). Pure: callers decide what mounting or unmounting means.
pub fn can_render(schema: &[PropertyMeta], states: &PropertyState) -> bool {
    schema
        .iter()
        .filter(|meta| meta.required)
        .all(|meta| !matches!(states.get(&meta.name), None | Some(Value::Unset)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ValueKind;
    use std::sync::Arc;

    fn schema() -> Vec<PropertyMeta> {
        vec![
            PropertyMeta::required("label", ValueKind::String),
            PropertyMeta::optional("count", ValueKind::Number),
        ]
    }

    #[test]
    fn empty_schema_always_renders() {
        assert!(can_render(&[], &PropertyState::new()));
    }

    #[test]
    fn missing_required_blocks() {
        assert!(!can_render(&schema(), &PropertyState::new()));
    }

    #[test]
    fn unset_required_blocks_but_null_does_not() {
        let mut states = PropertyState::new();
        states.insert("label".to_owned(), Value::Unset);
        assert!(!can_render(&schema(), &states));

        states.insert("label".to_owned(), Value::Null);
        assert!(can_render(&schema(), &states));
    }

    #[test]
    fn optional_props_never_block() {
        let mut states = PropertyState::new();
        states.insert("label".to_owned(), Value::Text(Arc::from("hi")));
        states.insert("count".to_owned(), Value::Unset);
        assert!(can_render(&schema(), &states));
    }
}
