//! Scoreboard teams
//!
//! Team metadata can only be replaced as a whole on the wire, so every
//! scalar setter broadcasts the full [`TeamInfo`] record. Membership is the
//! only part with real deltas (add/remove entries).

use crate::subscribable::{
    broadcast, replace_if_changed, send_to, viewer_list, Entity, Subscribable,
};
use crate::transport::{Transport, TransportError};
use crate::viewer::{Viewer, ViewerId};
use log::{debug, warn};
use parking_lot::Mutex;
use shared::{pack_team_options, ChatColor, RuleValue, ScoreboardPacket, TeamInfo, TeamMode, Text};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

struct TeamState {
    title: Text,
    prefix: Text,
    suffix: Text,
    friendly_fire: bool,
    see_friendly_invisibles: bool,
    name_tag_visibility: RuleValue,
    collision_rule: RuleValue,
    color: ChatColor,
    entries: BTreeSet<String>,
    player_members: HashSet<ViewerId>,
    viewers: HashSet<ViewerId>,
}

impl TeamState {
    fn new(title: Text) -> Self {
        Self {
            title,
            prefix: Text::empty(),
            suffix: Text::empty(),
            friendly_fire: true,
            see_friendly_invisibles: true,
            name_tag_visibility: RuleValue::Always,
            collision_rule: RuleValue::Never,
            color: ChatColor::Reset,
            entries: BTreeSet::new(),
            player_members: HashSet::new(),
            viewers: HashSet::new(),
        }
    }

    fn info(&self) -> TeamInfo {
        TeamInfo {
            display_name: self.title.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            options: pack_team_options(self.friendly_fire, self.see_friendly_invisibles),
            name_tag_visibility: self.name_tag_visibility.wire_name().to_string(),
            collision_rule: self.collision_rule.wire_name().to_string(),
            color: self.color.wire_index(),
        }
    }
}

pub struct Team {
    id: String,
    transport: Arc<dyn Transport>,
    state: Mutex<TeamState>,
}

impl Team {
    /// Creates the team and subscribes `initial_viewers` to it
    pub(crate) fn new(
        id: impl Into<String>,
        title: Text,
        transport: Arc<dyn Transport>,
        initial_viewers: &[ViewerId],
    ) -> Self {
        let team = Self {
            id: id.into(),
            transport,
            state: Mutex::new(TeamState::new(title)),
        };

        if let Err(e) = team.subscribe_all(initial_viewers) {
            warn!("Failed to send team {} to viewers: {}", team.id, e);
        }

        team
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Applies `update` and broadcasts the full record if it reports a change
    fn update_info<F>(&self, update: F)
    where
        F: FnOnce(&mut TeamState) -> bool,
    {
        let mut state = self.state.lock();
        if update(&mut *state) {
            let packet = ScoreboardPacket::team(
                &self.id,
                TeamMode::UpdateInfo,
                Some(state.info()),
                std::iter::empty(),
            );
            broadcast(&*self.transport, &packet, &state.viewers);
        }
    }

    pub fn title(&self) -> Text {
        self.state.lock().title.clone()
    }

    pub fn set_title(&self, title: Text) {
        self.update_info(|state| replace_if_changed(&mut state.title, title));
    }

    pub fn prefix(&self) -> Text {
        self.state.lock().prefix.clone()
    }

    pub fn set_prefix(&self, prefix: Text) {
        self.update_info(|state| replace_if_changed(&mut state.prefix, prefix));
    }

    pub fn suffix(&self) -> Text {
        self.state.lock().suffix.clone()
    }

    pub fn set_suffix(&self, suffix: Text) {
        self.update_info(|state| replace_if_changed(&mut state.suffix, suffix));
    }

    pub fn is_friendly_fire(&self) -> bool {
        self.state.lock().friendly_fire
    }

    pub fn set_friendly_fire(&self, friendly_fire: bool) {
        self.update_info(|state| replace_if_changed(&mut state.friendly_fire, friendly_fire));
    }

    pub fn is_friendly_invisibles(&self) -> bool {
        self.state.lock().see_friendly_invisibles
    }

    pub fn set_friendly_invisibles(&self, see_friendly_invisibles: bool) {
        self.update_info(|state| {
            replace_if_changed(&mut state.see_friendly_invisibles, see_friendly_invisibles)
        });
    }

    pub fn name_tag_visibility(&self) -> RuleValue {
        self.state.lock().name_tag_visibility
    }

    pub fn set_name_tag_visibility(&self, rule: RuleValue) {
        self.update_info(|state| replace_if_changed(&mut state.name_tag_visibility, rule));
    }

    pub fn collision(&self) -> RuleValue {
        self.state.lock().collision_rule
    }

    pub fn set_collision(&self, rule: RuleValue) {
        self.update_info(|state| replace_if_changed(&mut state.collision_rule, rule));
    }

    pub fn color(&self) -> ChatColor {
        self.state.lock().color
    }

    pub fn set_color(&self, color: ChatColor) {
        self.update_info(|state| replace_if_changed(&mut state.color, color));
    }

    /// Current wire record, as sent in create and update packets
    pub fn info(&self) -> TeamInfo {
        self.state.lock().info()
    }

    fn add_entry_locked(&self, state: &mut TeamState, entry: &str) -> bool {
        if !state.entries.insert(entry.to_string()) {
            return false;
        }
        let packet = ScoreboardPacket::team(&self.id, TeamMode::AddEntries, None, [entry]);
        broadcast(&*self.transport, &packet, &state.viewers);
        true
    }

    fn remove_entry_locked(&self, state: &mut TeamState, entry: &str) -> bool {
        if !state.entries.remove(entry) {
            return false;
        }
        let packet = ScoreboardPacket::team(&self.id, TeamMode::RemoveEntries, None, [entry]);
        broadcast(&*self.transport, &packet, &state.viewers);
        true
    }

    pub fn add_entry(&self, entry: &str) -> bool {
        let mut state = self.state.lock();
        self.add_entry_locked(&mut state, entry)
    }

    pub fn remove_entry(&self, entry: &str) -> bool {
        let mut state = self.state.lock();
        self.remove_entry_locked(&mut state, entry)
    }

    pub fn has_entry(&self, entry: &str) -> bool {
        self.state.lock().entries.contains(entry)
    }

    pub fn entries(&self) -> BTreeSet<String> {
        self.state.lock().entries.clone()
    }

    /// Adds the viewer's name as an entry and tracks it as a player member
    pub fn add_player(&self, viewer: &Viewer) {
        let mut state = self.state.lock();
        if self.add_entry_locked(&mut state, viewer.name()) {
            state.player_members.insert(viewer.id());
        }
    }

    /// Removes the viewer as a member whether or not it views this team
    pub fn remove_player(&self, viewer: &Viewer) -> bool {
        let mut state = self.state.lock();
        state.player_members.remove(&viewer.id());
        self.remove_entry_locked(&mut state, viewer.name())
    }

    pub fn has_player(&self, viewer: ViewerId) -> bool {
        self.state.lock().player_members.contains(&viewer)
    }

    pub fn players(&self) -> Vec<ViewerId> {
        viewer_list(&self.state.lock().player_members)
    }

    pub fn viewers(&self) -> Vec<ViewerId> {
        viewer_list(&self.state.lock().viewers)
    }

    pub fn is_viewer(&self, viewer: ViewerId) -> bool {
        self.state.lock().viewers.contains(&viewer)
    }

    fn unsubscribe_locked(
        &self,
        state: &mut TeamState,
        viewers: &[ViewerId],
    ) -> Result<(), TransportError> {
        let packet = ScoreboardPacket::team(&self.id, TeamMode::Remove, None, std::iter::empty());
        let result = send_to(&*self.transport, &packet, viewers);
        for viewer in viewers {
            state.viewers.remove(viewer);
        }
        result
    }
}

impl Subscribable for Team {
    fn subscribe_all(&self, viewers: &[ViewerId]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.viewers.extend(viewers.iter().copied());

        let packet = ScoreboardPacket::team(
            &self.id,
            TeamMode::Create,
            Some(state.info()),
            state.entries.iter().map(String::as_str),
        );
        send_to(&*self.transport, &packet, viewers)
    }

    fn unsubscribe_all(&self, viewers: &[ViewerId]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        self.unsubscribe_locked(&mut state, viewers)
    }
}

impl Entity for Team {
    const KIND: &'static str = "team";

    fn id(&self) -> &str {
        &self.id
    }

    fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        let viewers = viewer_list(&state.viewers);
        debug!("Closing team {} for {} viewers", self.id, viewers.len());

        let result = self.unsubscribe_locked(&mut state, &viewers);
        state.entries.clear();
        state.player_members.clear();
        result
    }
}
