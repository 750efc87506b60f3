//! Client-side mirror of the server's scoreboard
//!
//! The mirror replays every [`ScoreboardPacket`] it receives and can then
//! answer what a viewer would see: the sidebar lines and the player list.

use log::debug;
use shared::{
    ChatColor, DisplaySlot, ObjectiveMode, RenderType, ScoreAction, ScoreboardPacket, TeamInfo,
    TeamMode, Text,
};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct MirroredObjective {
    pub title: Text,
    pub render: RenderType,
    pub scores: HashMap<String, i32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MirroredTeam {
    pub info: Option<TeamInfo>,
    pub entries: BTreeSet<String>,
}

/// One rendered sidebar row
#[derive(Debug, Clone, PartialEq)]
pub struct SidebarLine {
    pub text: String,
    pub color: Option<ChatColor>,
    pub score: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarView {
    pub title: Text,
    pub lines: Vec<SidebarLine>,
}

#[derive(Debug, Default)]
pub struct BoardMirror {
    objectives: HashMap<String, MirroredObjective>,
    slots: HashMap<DisplaySlot, String>,
    teams: HashMap<String, MirroredTeam>,
    // entry -> team id; an entry belongs to at most one team
    entry_teams: HashMap<String, String>,
}

impl BoardMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, packet: &ScoreboardPacket) {
        match packet {
            ScoreboardPacket::Objective {
                name,
                mode,
                title,
                render,
            } => match mode {
                ObjectiveMode::Create => {
                    self.objectives.insert(
                        name.clone(),
                        MirroredObjective {
                            title: title.clone(),
                            render: *render,
                            scores: HashMap::new(),
                        },
                    );
                }
                ObjectiveMode::Remove => {
                    self.objectives.remove(name);
                    self.slots.retain(|_, shown| shown != name);
                }
                ObjectiveMode::UpdateTitle => {
                    if let Some(objective) = self.objectives.get_mut(name) {
                        objective.title = title.clone();
                        objective.render = *render;
                    }
                }
            },

            ScoreboardPacket::DisplayObjective { position, name } => {
                match DisplaySlot::from_position(*position) {
                    Some(slot) => {
                        self.slots.insert(slot, name.clone());
                    }
                    None => debug!("Ignoring unknown display slot {}", position),
                }
            }

            ScoreboardPacket::Score {
                entry,
                objective,
                action,
                value,
            } => {
                let Some(objective) = self.objectives.get_mut(objective) else {
                    debug!("Score for unknown objective {}", objective);
                    return;
                };
                match action {
                    ScoreAction::Change => {
                        objective.scores.insert(entry.clone(), *value);
                    }
                    ScoreAction::Remove => {
                        objective.scores.remove(entry);
                    }
                }
            }

            ScoreboardPacket::Team {
                name,
                mode,
                info,
                entries,
            } => match mode {
                TeamMode::Create => {
                    self.remove_team(name);
                    self.teams.insert(
                        name.clone(),
                        MirroredTeam {
                            info: info.clone(),
                            entries: BTreeSet::new(),
                        },
                    );
                    self.add_entries(name, entries);
                }
                TeamMode::Remove => self.remove_team(name),
                TeamMode::UpdateInfo => {
                    if let Some(team) = self.teams.get_mut(name) {
                        team.info = info.clone();
                    }
                }
                TeamMode::AddEntries => self.add_entries(name, entries),
                TeamMode::RemoveEntries => {
                    if let Some(team) = self.teams.get_mut(name) {
                        for entry in entries {
                            team.entries.remove(entry);
                            if self.entry_teams.get(entry) == Some(name) {
                                self.entry_teams.remove(entry);
                            }
                        }
                    }
                }
            },
        }
    }

    fn add_entries(&mut self, team_id: &str, entries: &[String]) {
        if !self.teams.contains_key(team_id) {
            debug!("Entries for unknown team {}", team_id);
            return;
        }
        for entry in entries {
            if let Some(previous) = self.entry_teams.insert(entry.clone(), team_id.to_string()) {
                if let Some(team) = self.teams.get_mut(&previous) {
                    team.entries.remove(entry);
                }
            }
            if let Some(team) = self.teams.get_mut(team_id) {
                team.entries.insert(entry.clone());
            }
        }
    }

    fn remove_team(&mut self, team_id: &str) {
        if let Some(team) = self.teams.remove(team_id) {
            for entry in &team.entries {
                self.entry_teams.remove(entry);
            }
        }
    }

    pub fn objective(&self, id: &str) -> Option<&MirroredObjective> {
        self.objectives.get(id)
    }

    pub fn team(&self, id: &str) -> Option<&MirroredTeam> {
        self.teams.get(id)
    }

    pub fn team_of(&self, entry: &str) -> Option<&MirroredTeam> {
        self.entry_teams.get(entry).and_then(|id| self.teams.get(id))
    }

    pub fn displayed(&self, slot: DisplaySlot) -> Option<&MirroredObjective> {
        self.slots.get(&slot).and_then(|id| self.objectives.get(id))
    }

    /// The sidebar as a viewer sees it, highest score first
    pub fn sidebar(&self) -> Option<SidebarView> {
        let objective = self.displayed(DisplaySlot::Sidebar)?;

        let lines = sorted_scores(&objective.scores)
            .into_iter()
            .map(|(entry, score)| match self.team_of(entry).and_then(|t| t.info.as_ref()) {
                Some(info) => SidebarLine {
                    text: format!("{}{}", info.prefix.content, info.suffix.content),
                    color: info.prefix.color.or(info.suffix.color),
                    score,
                },
                None => SidebarLine {
                    text: entry.to_string(),
                    color: None,
                    score,
                },
            })
            .collect();

        Some(SidebarView {
            title: objective.title.clone(),
            lines,
        })
    }

    /// Player-list scores, highest first
    pub fn player_list(&self) -> Vec<(String, i32)> {
        self.displayed(DisplaySlot::PlayerList)
            .map(|objective| {
                sorted_scores(&objective.scores)
                    .into_iter()
                    .map(|(entry, score)| (entry.to_string(), score))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn sorted_scores(scores: &HashMap<String, i32>) -> Vec<(&str, i32)> {
    let mut sorted: Vec<(&str, i32)> = scores
        .iter()
        .map(|(entry, score)| (entry.as_str(), *score))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted
}
