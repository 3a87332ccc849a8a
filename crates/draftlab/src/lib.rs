//! Core of a live component playground.
//!
//! Two isolated contexts cooperate: an authoring side where the user picks a
//! component and edits its property values as source text, and a rendering
//! side that mirrors the committed state and mounts the component once every
//! required property has a value. The pieces:
//!
//! - [`transpiler`]: speculative source-to-artifact transformation, run on
//!   every keystroke without evaluating anything
//! - [`eval`]: evaluation with host dialog containment
//! - [`codec`]: text to [`value::Value`] and back, steered by hints
//! - [`session`]: the modal property editor with last-known-good semantics
//! - [`gate`]: the pure renderability check
//! - [`sync`]: the message bus and the two context state machines

pub mod codec;
pub mod error;
pub mod eval;
pub mod gate;
pub mod props;
pub mod session;
pub mod sync;
pub mod transpiler;
pub mod value;

pub use draftlab_protocol as protocol;

pub use codec::{Hint, Hints, deserialize, serialize};
pub use error::{SyntaxError, TransportError, ValueFormatError};
pub use eval::{Host, SuppressGuard, evaluate};
pub use gate::can_render;
pub use props::{PropertyState, default_prop_states};
pub use session::{EditItem, EditSession};
pub use sync::{AuthoringContext, MessageBus, MountDecision, RenderingContext, SyncState};
pub use transpiler::{EvaluableArtifact, is_markup_fragment, transpile};
pub use value::Value;
