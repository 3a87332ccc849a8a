//! The modal edit session over one property at a time.
//!
//! The session owns the draft text and an error flag. Every change is first
//! validated by transpiling the draft, before any hint is chosen; only text
//! that parses may reach the codec and commit. Success commits the new
//! value, failure keeps the last-known-good value committed while the draft
//! (and the flag) stay as typed. The draft is never discarded on error, so
//! the user can keep typing through a transiently broken state.

use crate::codec::{self, Hint, Hints};
use crate::error::ValueFormatError;
use crate::eval::Host;
use crate::props::PropertyState;
use crate::protocol::ValueKind;
use crate::transpiler::{is_markup_fragment, transpile};
use crate::value::Value;
use smallvec::smallvec;

#[derive(Debug, Clone, PartialEq)]
pub struct EditItem {
    pub prop_name: String,
    pub kind: ValueKind,
    pub draft: String,
    pub has_error: bool,
}

#[derive(Default)]
pub struct EditSession {
    item: Option<EditItem>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self) -> Option<&EditItem> {
        self.item.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.item.is_some()
    }

    /// Begin editing a property. The draft is seeded from the committed
    /// value, so reopening shows what the user last successfully entered.
    pub fn open(&mut self, prop_name: impl Into<String>, kind: ValueKind, current: &Value) {
        self.item = Some(EditItem {
            prop_name: prop_name.into(),
            kind,
            draft: codec::deserialize(current, false),
            has_error: false,
        });
    }

    /// Apply a keystroke's worth of new text. Returns true when the change
    /// committed a new value into `states`.
    pub fn on_text_changed(
        &mut self,
        text: &str,
        states: &mut PropertyState,
        host: &Host,
    ) -> bool {
        let Some(item) = self.item.as_mut() else {
            return false;
        };
        item.draft = text.to_owned();

        // Syntax is validated before any hint is chosen, so text that will
        // be committed verbatim still has to parse. String-kind properties
        // are literal content and skip validation.
        if item.kind != ValueKind::String {
            if let Err(error) = transpile(text) {
                log_rejection(item, &ValueFormatError::Syntax(error));
                item.has_error = true;
                return false;
            }
        }

        let hints = choose_hints(item.kind, text);
        match codec::serialize(text, item.kind, &hints, host) {
            Ok(value) => {
                states.insert(item.prop_name.clone(), value);
                item.has_error = false;
                true
            }
            Err(error) => {
                log_rejection(item, &error);
                item.has_error = true;
                false
            }
        }
    }

    /// Mark the open item as errored without touching the draft. Used when a
    /// committed value later fails at the transport boundary.
    pub fn flag_error(&mut self) {
        if let Some(item) = self.item.as_mut() {
            item.has_error = true;
        }
    }

    pub fn close(&mut self) {
        self.item = None;
    }
}

/// Markup-kind text that does not look like a tag is treated as a plain
/// string. The text has already been validated when this runs, so the
/// degradation only applies to parseable non-markup text. An emptied editor
/// still transpiles: an empty fragment evaluates to `Unset`, which is how a
/// property is cleared.
fn choose_hints(kind: ValueKind, text: &str) -> Hints {
    match kind {
        ValueKind::String => smallvec![Hint::String],
        ValueKind::Markup if !text.trim().is_empty() && !is_markup_fragment(text) => {
            smallvec![Hint::String]
        }
        _ => smallvec![Hint::Transpile],
    }
}

fn log_rejection(item: &EditItem, error: &ValueFormatError) {
    tracing::debug!(
        prop = %item.prop_name,
        %error,
        "draft rejected, keeping last committed value"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn object_state() -> PropertyState {
        let mut states = PropertyState::new();
        states.insert(
            "data".to_owned(),
            Value::Object(vec![("a".to_owned(), Value::Number(1.0))]),
        );
        states
    }

    #[test]
    fn open_seeds_draft_from_committed_value() {
        let mut session = EditSession::new();
        session.open("data", ValueKind::Object, &object_state()["data"]);
        assert_eq!(session.item().unwrap().draft, "{ a: 1 }");
        assert!(!session.item().unwrap().has_error);
    }

    #[test]
    fn bad_draft_keeps_committed_value_and_flags_error() {
        let host = Host::new();
        let mut states = object_state();
        let mut session = EditSession::new();
        session.open("data", ValueKind::Object, &states["data"]);

        assert!(!session.on_text_changed("{ invalid", &mut states, &host));
        let item = session.item().unwrap();
        assert!(item.has_error);
        assert_eq!(item.draft, "{ invalid");
        assert_eq!(
            states["data"],
            Value::Object(vec![("a".to_owned(), Value::Number(1.0))])
        );
    }

    #[test]
    fn good_draft_commits_and_clears_error() {
        let host = Host::new();
        let mut states = object_state();
        let mut session = EditSession::new();
        session.open("data", ValueKind::Object, &states["data"]);

        assert!(!session.on_text_changed("{ bad", &mut states, &host));
        assert!(session.on_text_changed("{ a: 2 }", &mut states, &host));
        assert!(!session.item().unwrap().has_error);
        assert_eq!(
            states["data"],
            Value::Object(vec![("a".to_owned(), Value::Number(2.0))])
        );
    }

    #[test]
    fn parseable_plain_text_in_a_markup_prop_becomes_text() {
        let host = Host::new();
        let mut states = PropertyState::new();
        states.insert("view".to_owned(), Value::Unset);
        let mut session = EditSession::new();
        session.open("view", ValueKind::Markup, &states["view"]);

        assert!(session.on_text_changed("hello", &mut states, &host));
        assert_eq!(states["view"], Value::Text(Arc::from("hello")));

        assert!(session.on_text_changed("<div>hi</div>", &mut states, &host));
        assert!(matches!(states["view"], Value::Markup(_)));
    }

    #[test]
    fn broken_markup_draft_is_never_committed() {
        let host = Host::new();
        let mut states = PropertyState::new();
        states.insert("view".to_owned(), Value::Unset);
        let mut session = EditSession::new();
        session.open("view", ValueKind::Markup, &states["view"]);

        // Half-typed markup does not look like a fragment, but it must still
        // pass validation before the verbatim-string path may commit it.
        assert!(!session.on_text_changed("<di", &mut states, &host));
        let item = session.item().unwrap();
        assert!(item.has_error);
        assert_eq!(item.draft, "<di");
        assert_eq!(states["view"], Value::Unset);

        assert!(session.on_text_changed("<div>hi</div>", &mut states, &host));
        assert!(!session.item().unwrap().has_error);
    }

    #[test]
    fn string_props_take_any_text_without_validation() {
        let host = Host::new();
        let mut states = PropertyState::new();
        states.insert("label".to_owned(), Value::Unset);
        let mut session = EditSession::new();
        session.open("label", ValueKind::String, &states["label"]);

        assert!(session.on_text_changed("it's { not code", &mut states, &host));
        assert_eq!(states["label"], Value::Text(Arc::from("it's { not code")));
        assert!(!session.item().unwrap().has_error);
    }

    #[test]
    fn close_forgets_the_item() {
        let mut session = EditSession::new();
        session.open("x", ValueKind::Number, &Value::Unset);
        session.close();
        assert!(!session.is_open());
    }
}
