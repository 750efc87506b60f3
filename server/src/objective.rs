//! Scoreboard objectives
//!
//! An objective is a titled display area holding named integer scores. All
//! state lives behind a single mutex so that comparing against the current
//! value, updating it and broadcasting the diff happen atomically per
//! objective. Packets are dispatched while the lock is held, which keeps the
//! per-viewer packet order identical to the mutation order.

use crate::subscribable::{broadcast, replace_if_changed, send_to, Entity, Subscribable};
use crate::transport::{Transport, TransportError};
use crate::viewer::ViewerId;
use log::{debug, warn};
use parking_lot::Mutex;
use shared::{
    truncate, DisplaySlot, ObjectiveMode, ScoreAction, ScoreboardPacket, Text, MAX_ENTRY_LENGTH,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

struct ObjectiveState {
    title: Text,
    display_slot: DisplaySlot,
    scores: HashMap<String, i32>,
    viewers: HashSet<ViewerId>,
}

pub struct Objective {
    id: String,
    transport: Arc<dyn Transport>,
    state: Mutex<ObjectiveState>,
}

impl Objective {
    /// Creates the objective and subscribes `initial_viewers` to it
    pub(crate) fn new(
        id: impl Into<String>,
        title: Text,
        display_slot: DisplaySlot,
        transport: Arc<dyn Transport>,
        initial_viewers: &[ViewerId],
    ) -> Self {
        let objective = Self {
            id: id.into(),
            transport,
            state: Mutex::new(ObjectiveState {
                title,
                display_slot,
                scores: HashMap::new(),
                viewers: HashSet::new(),
            }),
        };

        if let Err(e) = objective.subscribe_all(initial_viewers) {
            warn!("Failed to send objective {} to viewers: {}", objective.id, e);
        }

        objective
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Text {
        self.state.lock().title.clone()
    }

    pub fn set_title(&self, title: Text) {
        let mut state = self.state.lock();
        if replace_if_changed(&mut state.title, title) {
            let packet =
                ScoreboardPacket::objective(&self.id, ObjectiveMode::UpdateTitle, &state.title);
            broadcast(&*self.transport, &packet, &state.viewers);
        }
    }

    pub fn display_slot(&self) -> DisplaySlot {
        self.state.lock().display_slot
    }

    pub fn set_display_slot(&self, display_slot: DisplaySlot) {
        let mut state = self.state.lock();
        if replace_if_changed(&mut state.display_slot, display_slot) {
            let packet = ScoreboardPacket::display(display_slot, &self.id);
            broadcast(&*self.transport, &packet, &state.viewers);
        }
    }

    /// Snapshot of every score
    pub fn scores(&self) -> HashMap<String, i32> {
        self.state.lock().scores.clone()
    }

    pub fn has_score(&self, name: &str) -> bool {
        self.state
            .lock()
            .scores
            .contains_key(truncate(name, MAX_ENTRY_LENGTH))
    }

    pub fn score(&self, name: &str) -> Option<i32> {
        self.state
            .lock()
            .scores
            .get(truncate(name, MAX_ENTRY_LENGTH))
            .copied()
    }

    /// Sets a score; nothing is sent when the stored value is already `value`.
    pub fn set_score(&self, name: &str, value: i32) {
        let name = truncate(name, MAX_ENTRY_LENGTH);
        let mut state = self.state.lock();

        if state.scores.get(name) == Some(&value) {
            return;
        }
        state.scores.insert(name.to_string(), value);

        let packet = ScoreboardPacket::score(name, &self.id, ScoreAction::Change, value);
        broadcast(&*self.transport, &packet, &state.viewers);
    }

    pub fn remove_score(&self, name: &str) -> bool {
        let name = truncate(name, MAX_ENTRY_LENGTH);
        let mut state = self.state.lock();

        match state.scores.remove(name) {
            Some(value) => {
                let packet = ScoreboardPacket::score(name, &self.id, ScoreAction::Remove, value);
                broadcast(&*self.transport, &packet, &state.viewers);
                true
            }
            None => false,
        }
    }

    /// Removes every score, one remove packet per score.
    pub fn clear_scores(&self) {
        let names: Vec<String> = self.state.lock().scores.keys().cloned().collect();
        for name in names {
            self.remove_score(&name);
        }
    }

    pub fn viewers(&self) -> Vec<ViewerId> {
        crate::subscribable::viewer_list(&self.state.lock().viewers)
    }

    pub fn is_viewer(&self, viewer: ViewerId) -> bool {
        self.state.lock().viewers.contains(&viewer)
    }

    fn send_create(
        &self,
        state: &ObjectiveState,
        viewers: &[ViewerId],
    ) -> Result<(), TransportError> {
        let transport = &*self.transport;
        send_to(
            transport,
            &ScoreboardPacket::objective(&self.id, ObjectiveMode::Create, &state.title),
            viewers,
        )?;
        send_to(
            transport,
            &ScoreboardPacket::display(state.display_slot, &self.id),
            viewers,
        )?;
        for (name, value) in &state.scores {
            send_to(
                transport,
                &ScoreboardPacket::score(name, &self.id, ScoreAction::Change, *value),
                viewers,
            )?;
        }
        Ok(())
    }

    fn unsubscribe_locked(
        &self,
        state: &mut ObjectiveState,
        viewers: &[ViewerId],
    ) -> Result<(), TransportError> {
        let packet = ScoreboardPacket::objective(&self.id, ObjectiveMode::Remove, &state.title);
        let result = send_to(&*self.transport, &packet, viewers);
        for viewer in viewers {
            state.viewers.remove(viewer);
        }
        result
    }
}

impl Subscribable for Objective {
    fn subscribe_all(&self, viewers: &[ViewerId]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.viewers.extend(viewers.iter().copied());
        self.send_create(&state, viewers)
    }

    fn unsubscribe_all(&self, viewers: &[ViewerId]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        self.unsubscribe_locked(&mut state, viewers)
    }
}

impl Entity for Objective {
    const KIND: &'static str = "objective";

    fn id(&self) -> &str {
        &self.id
    }

    fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let viewers = crate::subscribable::viewer_list(&state.viewers);
        debug!("Closing objective {} for {} viewers", self.id, viewers.len());
        self.unsubscribe_locked(&mut state, &viewers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;

    fn objective_with(viewers: &[ViewerId]) -> (Arc<RecordingTransport>, Objective) {
        let transport = Arc::new(RecordingTransport::new());
        let objective = Objective::new(
            "kills",
            Text::new("Kills"),
            DisplaySlot::Sidebar,
            transport.clone(),
            viewers,
        );
        (transport, objective)
    }

    #[test]
    fn test_initial_viewers_receive_create_and_slot() {
        let (transport, _objective) = objective_with(&[ViewerId(1)]);
        let sent = transport.sent_to(ViewerId(1));

        assert_eq!(sent.len(), 2);
        assert!(matches!(
            sent[0],
            ScoreboardPacket::Objective {
                mode: ObjectiveMode::Create,
                ..
            }
        ));
        assert_eq!(
            sent[1],
            ScoreboardPacket::DisplayObjective {
                position: 1,
                name: "kills".to_string()
            }
        );
    }

    #[test]
    fn test_unchanged_values_are_not_broadcast() {
        let (transport, objective) = objective_with(&[ViewerId(1)]);
        transport.clear();

        objective.set_title(Text::new("Kills"));
        objective.set_display_slot(DisplaySlot::Sidebar);
        objective.set_score("alice", 3);
        objective.set_score("alice", 3);

        assert_eq!(transport.len(), 1);
        assert_eq!(objective.score("alice"), Some(3));
    }

    #[test]
    fn test_title_and_slot_changes_are_broadcast() {
        let (transport, objective) = objective_with(&[ViewerId(1), ViewerId(2)]);
        transport.clear();

        objective.set_title(Text::new("Deaths"));
        objective.set_display_slot(DisplaySlot::BelowName);

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].viewers, vec![ViewerId(1), ViewerId(2)]);
        assert!(matches!(
            sent[0].packet,
            ScoreboardPacket::Objective {
                mode: ObjectiveMode::UpdateTitle,
                ..
            }
        ));
        assert!(matches!(
            sent[1].packet,
            ScoreboardPacket::DisplayObjective { position: 2, .. }
        ));
        assert_eq!(objective.title(), Text::new("Deaths"));
        assert_eq!(objective.display_slot(), DisplaySlot::BelowName);
    }

    #[test]
    fn test_score_names_are_truncated() {
        let (_transport, objective) = objective_with(&[]);
        let base = "x".repeat(MAX_ENTRY_LENGTH);

        objective.set_score(&format!("{}a", base), 1);
        assert!(objective.has_score(&base));
        assert_eq!(objective.score(&format!("{}zzz", base)), Some(1));

        objective.set_score(&format!("{}b", base), 2);
        assert_eq!(objective.scores().len(), 1);
        assert_eq!(objective.score(&base), Some(2));
    }

    #[test]
    fn test_remove_and_clear_scores() {
        let (transport, objective) = objective_with(&[ViewerId(1)]);
        objective.set_score("a", 1);
        objective.set_score("b", 2);
        objective.set_score("c", 3);
        transport.clear();

        assert!(objective.remove_score("a"));
        assert!(!objective.remove_score("a"));
        assert_eq!(transport.len(), 1);

        objective.clear_scores();
        let removes = transport
            .sent()
            .iter()
            .filter(|u| {
                matches!(
                    u.packet,
                    ScoreboardPacket::Score {
                        action: ScoreAction::Remove,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(removes, 3);
        assert!(objective.scores().is_empty());
    }

    #[test]
    fn test_late_subscriber_receives_every_score() {
        let (transport, objective) = objective_with(&[ViewerId(1)]);
        for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            objective.set_score(name, i as i32);
        }
        objective.set_score("c", 30);
        transport.clear();

        objective.subscribe(ViewerId(2)).unwrap();

        let sent = transport.sent_to(ViewerId(2));
        assert_eq!(sent.len(), 7);
        let scores: HashMap<String, i32> = sent
            .into_iter()
            .filter_map(|packet| match packet {
                ScoreboardPacket::Score { entry, value, .. } => Some((entry, value)),
                _ => None,
            })
            .collect();
        assert_eq!(scores, objective.scores());
        assert_eq!(scores.get("c"), Some(&30));
        assert!(transport.sent_to(ViewerId(1)).is_empty());
    }

    #[test]
    fn test_close_unsubscribes_everyone() {
        let (transport, objective) = objective_with(&[ViewerId(1), ViewerId(2)]);
        transport.clear();

        objective.close().unwrap();

        assert!(objective.viewers().is_empty());
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].viewers, vec![ViewerId(1), ViewerId(2)]);

        // Closing twice has nobody left to notify
        objective.close().unwrap();
        assert_eq!(transport.len(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_viewer_even_if_send_fails() {
        let (transport, objective) = objective_with(&[ViewerId(1)]);
        transport.set_failing(true);

        assert!(objective.unsubscribe(ViewerId(1)).is_err());
        assert!(!objective.is_viewer(ViewerId(1)));
    }
}
