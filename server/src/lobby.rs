//! The lobby board: who is online, how long they have been here, and the
//! sidebar each viewer sees. Advanced once per server tick.

use crate::objective::Objective;
use crate::registry::Registry;
use crate::sidebar::Sidebar;
use crate::team::Team;
use crate::viewer::{Viewer, ViewerId};
use log::info;
use shared::{ChatColor, DisplaySlot, Text};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub const ONLINE_TEAM_ID: &str = "online";
pub const PLAYTIME_OBJECTIVE_ID: &str = "playtime";

#[derive(Debug, Clone)]
struct Member {
    viewer: Viewer,
    joined_at: Instant,
}

/// Drives the boards shown to everyone in the lobby: a global `online` team,
/// a player-list `playtime` objective and each viewer's sidebar.
pub struct Lobby {
    title: Text,
    online: Arc<Team>,
    playtime: Arc<Objective>,
    members: HashMap<ViewerId, Member>,
    ticks: u64,
}

impl Lobby {
    pub fn new(registry: &Registry, title: impl Into<String>) -> Self {
        let online = registry.new_team_with_id(ONLINE_TEAM_ID, Text::new("Online"));
        online.set_color(ChatColor::Green);
        online.set_prefix(Text::colored("* ", ChatColor::Green));

        let playtime = registry.new_objective_with_id(
            PLAYTIME_OBJECTIVE_ID,
            Text::new("Playtime"),
            DisplaySlot::PlayerList,
        );

        Self {
            title: Text::colored(title, ChatColor::Gold),
            online,
            playtime,
            members: HashMap::new(),
            ticks: 0,
        }
    }

    pub fn join(&mut self, viewer: &Viewer) {
        self.join_at(viewer, Instant::now());
    }

    pub fn join_at(&mut self, viewer: &Viewer, joined_at: Instant) {
        self.online.add_player(viewer);
        self.playtime.set_score(viewer.name(), 0);
        self.members.insert(
            viewer.id(),
            Member {
                viewer: viewer.clone(),
                joined_at,
            },
        );
        info!("{} joined the lobby ({} online)", viewer.name(), self.members.len());
    }

    pub fn leave(&mut self, viewer: &Viewer) -> bool {
        if self.members.remove(&viewer.id()).is_none() {
            return false;
        }
        self.online.remove_player(viewer);
        self.playtime.remove_score(viewer.name());
        info!("{} left the lobby ({} online)", viewer.name(), self.members.len());
        true
    }

    pub fn tick(&mut self, sidebar: &Sidebar) {
        self.tick_at(sidebar, Instant::now());
    }

    /// Refreshes playtime scores and every member's sidebar as of `now`.
    /// Unchanged rows produce no traffic.
    pub fn tick_at(&mut self, sidebar: &Sidebar, now: Instant) {
        self.ticks += 1;

        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|member| (member.joined_at, member.viewer.id()));

        for member in &members {
            self.playtime
                .set_score(member.viewer.name(), playtime_secs(member, now));
        }

        let longest = members.first().map(|member| {
            format!(
                "Top: {} {}",
                member.viewer.name(),
                format_playtime(playtime_secs(member, now))
            )
        });

        for member in &members {
            let mut lines = vec![
                Text::colored(format!("Online: {}", members.len()), ChatColor::Green),
                Text::empty(),
                Text::new(format!("Name: {}", member.viewer.name())),
                Text::new(format!(
                    "Playtime: {}",
                    format_playtime(playtime_secs(member, now))
                )),
            ];
            if let Some(longest) = &longest {
                lines.push(Text::empty());
                lines.push(Text::colored(longest.clone(), ChatColor::Yellow));
            }

            sidebar.set_title(member.viewer.id(), self.title.clone());
            sidebar.set_lines(member.viewer.id(), &lines);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn online_team(&self) -> &Arc<Team> {
        &self.online
    }

    pub fn playtime(&self) -> &Arc<Objective> {
        &self.playtime
    }
}

fn playtime_secs(member: &Member, now: Instant) -> i32 {
    let secs = now.saturating_duration_since(member.joined_at).as_secs();
    i32::try_from(secs).unwrap_or(i32::MAX)
}

fn format_playtime(secs: i32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
