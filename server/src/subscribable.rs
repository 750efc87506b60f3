//! Viewer subscription capability shared by objectives and teams

use crate::transport::{Transport, TransportError};
use crate::viewer::ViewerId;
use log::{error, warn};
use shared::ScoreboardPacket;
use std::collections::HashSet;

/// Something viewers can be subscribed to.
///
/// Subscribing must immediately send the entity's full current state to the
/// new viewers; unsubscribing sends a remove packet to exactly those viewers.
pub trait Subscribable {
    fn subscribe_all(&self, viewers: &[ViewerId]) -> Result<(), TransportError>;

    fn unsubscribe_all(&self, viewers: &[ViewerId]) -> Result<(), TransportError>;

    fn subscribe(&self, viewer: ViewerId) -> Result<(), TransportError> {
        self.subscribe_all(std::slice::from_ref(&viewer))
    }

    fn unsubscribe(&self, viewer: ViewerId) -> Result<(), TransportError> {
        self.unsubscribe_all(std::slice::from_ref(&viewer))
    }
}

/// A registry-owned scoreboard entity
pub trait Entity: Subscribable + Send + Sync {
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Unsubscribes every viewer. The owner discards the entity afterwards.
    fn close(&self) -> Result<(), TransportError>;
}

/// Closes `entity`, logging instead of propagating a failure so sibling
/// cleanup can continue.
pub(crate) fn close_logged<E: Entity + ?Sized>(entity: &E) {
    if let Err(e) = entity.close() {
        error!("Failed to close {} {}: {}", E::KIND, entity.id(), e);
    }
}

pub(crate) fn send_to(
    transport: &dyn Transport,
    packet: &ScoreboardPacket,
    viewers: &[ViewerId],
) -> Result<(), TransportError> {
    if viewers.is_empty() {
        return Ok(());
    }
    transport.send_update(packet, viewers)
}

/// Sends a mutation broadcast; failures are logged, not returned.
pub(crate) fn broadcast(
    transport: &dyn Transport,
    packet: &ScoreboardPacket,
    viewers: &HashSet<ViewerId>,
) {
    if let Err(e) = send_to(transport, packet, &viewer_list(viewers)) {
        warn!("Failed to broadcast update for {}: {}", packet.target(), e);
    }
}

pub(crate) fn viewer_list(viewers: &HashSet<ViewerId>) -> Vec<ViewerId> {
    let mut list: Vec<ViewerId> = viewers.iter().copied().collect();
    list.sort_unstable();
    list
}

/// Stores `value` in `slot` and reports whether it differed.
pub(crate) fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
