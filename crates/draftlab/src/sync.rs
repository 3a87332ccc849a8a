//! Cross-context synchronization.
//!
//! The authoring and rendering contexts share no memory; they exchange
//! JSON-encoded [`ProtocolMessage`]s over a [`MessageBus`]. Delivery is
//! in-order per direction but messages may sit queued, so the rendering side
//! coalesces to the latest message per wire tag before applying anything.
//!
//! The handshake runs in one direction: the rendering side announces
//! `DEMO_INITIALIZED` when it is ready, and the authoring side answers with
//! the current selection and property states. Until that answer, the
//! authoring side holds state locally and nothing is lost — a late handshake
//! just replays the current snapshot.

use futures_channel::mpsc;

use crate::error::TransportError;
use crate::eval::Host;
use crate::gate::can_render;
use crate::props::{PropertyState, default_prop_states};
use crate::protocol::{ComponentSpec, PortableValue, ProtocolMessage};
use crate::session::EditSession;
use crate::value::Value;
use ulid::Ulid;

pub struct MessageBus;

impl MessageBus {
    /// Build a connected pair of endpoints, one per context.
    pub fn pair() -> (BusEnd, BusEnd) {
        let (sender_a, receiver_b) = mpsc::unbounded();
        let (sender_b, receiver_a) = mpsc::unbounded();
        (
            BusEnd {
                sender: sender_a,
                receiver: receiver_a,
            },
            BusEnd {
                sender: sender_b,
                receiver: receiver_b,
            },
        )
    }
}

/// One endpoint of the bus. Sends are fire-and-forget; receives are pulled
/// in batches by [`drain`](Self::drain).
pub struct BusEnd {
    sender: mpsc::UnboundedSender<String>,
    receiver: mpsc::UnboundedReceiver<String>,
}

impl BusEnd {
    pub fn send(&self, message: &ProtocolMessage) -> Result<(), TransportError> {
        let encoded = serde_json::to_string(message)?;
        if self.sender.unbounded_send(encoded).is_err() {
            // The peer context is gone; there is nobody left to sync with.
            tracing::debug!(wire_type = message.wire_type(), "peer disconnected, dropping");
        }
        Ok(())
    }

    /// Pull everything currently queued. Unknown wire tags and malformed
    /// payloads are dropped with a debug log, never an error: a newer peer
    /// may legitimately speak messages this version does not know.
    pub fn drain(&mut self) -> Vec<ProtocolMessage> {
        let mut messages = Vec::new();
        while let Ok(Some(raw)) = self.receiver.try_next() {
            match decode(&raw) {
                Some(message) => messages.push(message),
                None => tracing::debug!(raw, "dropping unrecognized message"),
            }
        }
        messages
    }
}

fn decode(raw: &str) -> Option<ProtocolMessage> {
    let envelope: serde_json::Value = serde_json::from_str(raw).ok()?;
    let wire_type = envelope.get("type")?.as_str()?;
    if !ProtocolMessage::KNOWN_TYPES.contains(&wire_type) {
        return None;
    }
    serde_json::from_value(envelope).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No rendering context is known to exist.
    Uninitialized,
    /// A rendering context was loaded but has not announced itself yet.
    HandshakePending,
    /// Handshake complete; state changes are pushed as they happen.
    Synced,
}

/// The authoring side: owns the catalog, the selection, the committed
/// property states and the edit session, and pushes snapshots to the
/// rendering side.
pub struct AuthoringContext {
    catalog: Vec<ComponentSpec>,
    selected: Option<ComponentSpec>,
    prop_states: PropertyState,
    session: EditSession,
    host: Host,
    bus: BusEnd,
    sync_state: SyncState,
}

impl AuthoringContext {
    pub fn new(catalog: Vec<ComponentSpec>, bus: BusEnd, host: Host) -> Self {
        Self {
            catalog,
            selected: None,
            prop_states: PropertyState::new(),
            session: EditSession::new(),
            host,
            bus,
            sync_state: SyncState::Uninitialized,
        }
    }

    pub fn catalog(&self) -> &[ComponentSpec] {
        &self.catalog
    }

    pub fn selected(&self) -> Option<&ComponentSpec> {
        self.selected.as_ref()
    }

    pub fn prop_states(&self) -> &PropertyState {
        &self.prop_states
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// The rendering context started loading; its announcement will arrive
    /// on the bus.
    pub fn rendering_loaded(&mut self) {
        if self.sync_state == SyncState::Uninitialized {
            self.sync_state = SyncState::HandshakePending;
        }
    }

    /// Select a component from the catalog. Any open edit session is closed
    /// and the property states reset to the schema defaults.
    pub fn select_component(&mut self, id: Ulid) -> bool {
        let Some(spec) = self.catalog.iter().find(|spec| spec.id == id).cloned() else {
            return false;
        };
        self.session.close();
        self.prop_states = default_prop_states(&spec);
        self.selected = Some(spec);
        self.push_snapshot();
        true
    }

    /// Open the modal editor for one of the selected component's properties.
    pub fn open_editor(&mut self, prop_name: &str) -> bool {
        let Some(kind) = self
            .selected
            .as_ref()
            .and_then(|spec| spec.prop(prop_name))
            .map(|meta| meta.kind)
        else {
            return false;
        };
        let current = self
            .prop_states
            .get(prop_name)
            .cloned()
            .unwrap_or(Value::Unset);
        self.session.open(prop_name, kind, &current);
        true
    }

    /// Apply edited text to the open session; a committed change is pushed
    /// to the rendering side immediately.
    pub fn edit_text(&mut self, text: &str) {
        if self
            .session
            .on_text_changed(text, &mut self.prop_states, &self.host)
        {
            self.push_prop_states();
        }
    }

    pub fn close_editor(&mut self) {
        self.session.close();
    }

    /// Process queued messages from the rendering side.
    pub fn pump(&mut self) {
        for message in self.bus.drain() {
            match message {
                ProtocolMessage::DemoInitialized => {
                    self.sync_state = SyncState::Synced;
                    // The handshake may arrive after a selection was already
                    // made; answer with the current snapshot either way.
                    self.push_snapshot();
                }
                other => {
                    tracing::debug!(
                        wire_type = other.wire_type(),
                        "unexpected message on the authoring side"
                    );
                }
            }
        }
    }

    fn push_snapshot(&mut self) {
        if self.sync_state != SyncState::Synced {
            return;
        }
        if let Some(spec) = self.selected.clone() {
            if let Err(error) = self.bus.send(&ProtocolMessage::SelectedComponent(spec)) {
                tracing::warn!(%error, "failed to push selection");
            }
            self.push_prop_states();
        }
    }

    fn push_prop_states(&mut self) {
        if self.sync_state != SyncState::Synced {
            return;
        }
        let mut portable = Vec::with_capacity(self.prop_states.len());
        for (name, value) in &self.prop_states {
            match value.to_portable() {
                Ok(Some(encoded)) => portable.push((name.clone(), encoded)),
                // A bare native callback cannot travel; the entry is omitted.
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(prop = %name, %error, "value is not portable");
                    self.session.flag_error();
                }
            }
        }
        if let Err(error) = self.bus.send(&ProtocolMessage::PropStates(portable)) {
            tracing::warn!(%error, "failed to push property states");
            self.session.flag_error();
        }
    }
}

/// What the rendering surface should do after a [`RenderingContext::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountDecision {
    Mount,
    Unmount,
    Keep,
}

/// The rendering side: holds a replica of the selection and property states
/// and decides when the component may be mounted.
pub struct RenderingContext {
    bus: BusEnd,
    replica: Option<(ComponentSpec, PropertyState)>,
    mounted: bool,
}

impl RenderingContext {
    pub fn new(bus: BusEnd) -> Self {
        Self {
            bus,
            replica: None,
            mounted: false,
        }
    }

    /// Announce readiness; the authoring side answers with a snapshot.
    pub fn announce_ready(&self) -> Result<(), TransportError> {
        self.bus.send(&ProtocolMessage::DemoInitialized)
    }

    pub fn replica(&self) -> Option<(&ComponentSpec, &PropertyState)> {
        self.replica.as_ref().map(|(spec, states)| (spec, states))
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Drain the bus, apply the latest snapshot, and re-run the gate.
    ///
    /// Only the newest message per wire tag is applied: intermediate
    /// selections and property states are superseded, not replayed. A new
    /// selection always applies before property states so the states land
    /// on the right replica.
    pub fn pump(&mut self) -> MountDecision {
        let mut latest_selection = None;
        let mut latest_states = None;
        for message in self.bus.drain() {
            match message {
                ProtocolMessage::SelectedComponent(spec) => latest_selection = Some(spec),
                ProtocolMessage::PropStates(states) => latest_states = Some(states),
                ProtocolMessage::DemoInitialized => {
                    tracing::debug!("unexpected handshake on the rendering side");
                }
            }
        }

        if let Some(spec) = latest_selection {
            let defaults = default_prop_states(&spec);
            self.replica = Some((spec, defaults));
            self.mounted = false;
        }
        if let Some(states) = latest_states {
            if let Some((_, replica_states)) = self.replica.as_mut() {
                *replica_states = rebuild_states(&states);
            } else {
                tracing::debug!("property states before any selection, ignoring");
            }
        }

        let renderable = match &self.replica {
            Some((spec, states)) => can_render(&spec.props, states),
            None => false,
        };
        match (renderable, self.mounted) {
            (true, false) => {
                self.mounted = true;
                MountDecision::Mount
            }
            (false, true) => {
                self.mounted = false;
                MountDecision::Unmount
            }
            _ => MountDecision::Keep,
        }
    }
}

// Wholesale replacement: the snapshot is authoritative, nothing is merged.
fn rebuild_states(states: &[(String, PortableValue)]) -> PropertyState {
    states
        .iter()
        .map(|(name, portable)| {
            let value = Value::from_portable(portable).unwrap_or_else(|error| {
                tracing::warn!(prop = %name, %error, "unusable value in snapshot");
                Value::Unset
            });
            (name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PropertyMeta, ValueKind};
    use std::sync::Arc;

    fn catalog() -> Vec<ComponentSpec> {
        vec![
            ComponentSpec::new(
                "Badge",
                vec![
                    PropertyMeta::required("label", ValueKind::String)
                        .with_default(PortableValue::Text("new".to_owned())),
                    PropertyMeta::optional("count", ValueKind::Number),
                ],
            ),
            ComponentSpec::new(
                "Panel",
                vec![PropertyMeta::required("body", ValueKind::Markup)],
            ),
        ]
    }

    fn connected() -> (AuthoringContext, RenderingContext) {
        let (authoring_end, rendering_end) = MessageBus::pair();
        (
            AuthoringContext::new(catalog(), authoring_end, Host::new()),
            RenderingContext::new(rendering_end),
        )
    }

    #[test]
    fn handshake_then_snapshot() {
        let (mut authoring, mut rendering) = connected();
        let badge = authoring.catalog()[0].id;

        authoring.rendering_loaded();
        assert_eq!(authoring.sync_state(), SyncState::HandshakePending);

        rendering.announce_ready().unwrap();
        authoring.select_component(badge);
        authoring.pump();
        assert_eq!(authoring.sync_state(), SyncState::Synced);

        // Badge's only required prop has a default, so it mounts at once.
        assert_eq!(rendering.pump(), MountDecision::Mount);
        let (spec, states) = rendering.replica().unwrap();
        assert_eq!(spec.name, "Badge");
        assert_eq!(states["label"], Value::Text(Arc::from("new")));
    }

    #[test]
    fn selection_before_handshake_is_replayed() {
        let (mut authoring, mut rendering) = connected();
        let badge = authoring.catalog()[0].id;

        // Selection happens while the rendering side is still loading.
        authoring.select_component(badge);
        assert_eq!(rendering.pump(), MountDecision::Keep);
        assert!(rendering.replica().is_none());

        rendering.announce_ready().unwrap();
        authoring.pump();
        assert_eq!(rendering.pump(), MountDecision::Mount);
    }

    #[test]
    fn coalescing_keeps_only_the_latest_selection() {
        let (mut authoring, mut rendering) = connected();
        let badge = authoring.catalog()[0].id;
        let panel = authoring.catalog()[1].id;

        rendering.announce_ready().unwrap();
        authoring.pump();
        authoring.select_component(badge);
        authoring.select_component(panel);

        // Panel's required markup prop has no default, so nothing mounts.
        assert_eq!(rendering.pump(), MountDecision::Keep);
        assert_eq!(rendering.replica().unwrap().0.name, "Panel");
    }

    #[test]
    fn committed_edit_flows_to_the_replica() {
        let (mut authoring, mut rendering) = connected();
        let panel = authoring.catalog()[1].id;

        rendering.announce_ready().unwrap();
        authoring.pump();
        authoring.select_component(panel);
        assert_eq!(rendering.pump(), MountDecision::Keep);

        assert!(authoring.open_editor("body"));
        authoring.edit_text("<div>hi</div>");
        assert_eq!(rendering.pump(), MountDecision::Mount);
        let (_, states) = rendering.replica().unwrap();
        assert!(matches!(states["body"], Value::Markup(_)));
    }

    #[test]
    fn rejected_edit_pushes_nothing() {
        let (mut authoring, mut rendering) = connected();
        let badge = authoring.catalog()[0].id;

        rendering.announce_ready().unwrap();
        authoring.pump();
        authoring.select_component(badge);
        rendering.pump();

        assert!(authoring.open_editor("count"));
        authoring.edit_text("{ broken");
        assert_eq!(rendering.pump(), MountDecision::Keep);
        let (_, states) = rendering.replica().unwrap();
        assert_eq!(states["count"], Value::Unset);
    }

    #[test]
    fn switching_components_resets_everything() {
        let (mut authoring, _rendering) = connected();
        let badge = authoring.catalog()[0].id;
        let panel = authoring.catalog()[1].id;

        authoring.select_component(badge);
        authoring.open_editor("count");
        assert!(authoring.session().is_open());

        authoring.select_component(panel);
        assert!(!authoring.session().is_open());
        assert_eq!(authoring.prop_states()["body"], Value::Unset);
    }

    #[test]
    fn unknown_wire_tags_are_dropped() {
        let (authoring_end, mut rendering_end) = MessageBus::pair();
        authoring_end
            .sender
            .unbounded_send(r#"{"type":"FUTURE_THING","payload":{}}"#.to_owned())
            .unwrap();
        authoring_end
            .sender
            .unbounded_send("not json at all".to_owned())
            .unwrap();
        assert!(rendering_end.drain().is_empty());
    }

    #[test]
    fn unmount_when_a_required_value_is_lost() {
        let (mut authoring, mut rendering) = connected();
        let panel = authoring.catalog()[1].id;

        rendering.announce_ready().unwrap();
        authoring.pump();
        authoring.select_component(panel);
        authoring.open_editor("body");
        authoring.edit_text("<div>hi</div>");
        assert_eq!(rendering.pump(), MountDecision::Mount);

        authoring.edit_text("");
        assert_eq!(rendering.pump(), MountDecision::Unmount);
    }
}
