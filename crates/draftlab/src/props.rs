//! Per-component property state.

use indexmap::IndexMap;

use crate::protocol::ComponentSpec;
use crate::value::Value;

/// Property name to current value, in schema declaration order.
pub type PropertyState = IndexMap<String, Value>;

/// Seed the state for a freshly selected component: declared defaults where
/// the schema has them, `Unset` everywhere else. A default that fails to
/// rebuild is logged and left unset rather than aborting the selection.
pub fn default_prop_states(spec: &ComponentSpec) -> PropertyState {
    spec.props
        .iter()
        .map(|prop| {
            let value = match &prop.default {
                None => Value::Unset,
                Some(default) => Value::from_portable(default).unwrap_or_else(|error| {
                    tracing::warn!(prop = %prop.name, %error, "unusable default, leaving unset");
                    Value::Unset
                }),
            };
            (prop.name.clone(), value)
        })
        .collect()
}
