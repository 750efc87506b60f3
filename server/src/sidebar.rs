//! Flicker-free per-viewer sidebar
//!
//! Rewriting sidebar scores directly makes clients redraw the whole panel.
//! Instead every row is an invisible color-code entry (e.g. `§3`) that sits
//! in a private team; the row's text is that team's prefix. Changing a line
//! only updates the team's prefix, so nothing is ever removed and re-added.
//!
//! ```text
//!   row 0: score "§0" ─► team BoardLine:0 { entries: ["§0"], prefix: "Kills: 3" }
//!   row 1: score "§1" ─► team BoardLine:1 { entries: ["§1"], prefix: "Round 2"  }
//! ```
//!
//! All rows share score 0; clients order equal scores by entry name and the
//! palette's codes sort in row order.

use crate::objective::Objective;
use crate::registry::Registry;
use crate::subscribable::close_logged;
use crate::team::Team;
use crate::viewer::ViewerId;
use log::{debug, info};
use parking_lot::Mutex;
use shared::{ChatColor, DisplaySlot, Text};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const MAX_LINES: usize = 15;

const LINE_SCORE: i32 = 0;

// Each row needs its own palette color
const _: () = assert!(MAX_LINES <= ChatColor::ALL.len());

struct LineBinding {
    tag: ChatColor,
    team: Arc<Team>,
}

struct Board {
    objective: Arc<Objective>,
    lines: Vec<LineBinding>,
    active: usize,
}

pub struct Sidebar {
    registry: Arc<Registry>,
    boards: Mutex<HashMap<ViewerId, Arc<Mutex<Board>>>>,
    closed: AtomicBool,
}

impl Sidebar {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            boards: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn board(&self, viewer: ViewerId) -> Arc<Mutex<Board>> {
        let mut boards = self.boards.lock();
        let board = boards.entry(viewer).or_insert_with(|| {
            let objective =
                self.registry
                    .new_player_objective(viewer, Text::new("-"), DisplaySlot::Sidebar);
            Arc::new(Mutex::new(Board {
                objective,
                lines: Vec::new(),
                active: 0,
            }))
        });
        Arc::clone(board)
    }

    pub fn set_title(&self, viewer: ViewerId, title: Text) {
        let board = self.board(viewer);
        let board = board.lock();
        board.objective.set_title(title);
    }

    /// Shows `lines` top to bottom. Lines past [`MAX_LINES`] are ignored.
    pub fn set_lines(&self, viewer: ViewerId, lines: &[Text]) {
        let board = self.board(viewer);
        let mut board = board.lock();
        let shown = lines.len().min(MAX_LINES);

        for (index, line) in lines.iter().take(shown).enumerate() {
            if index == board.lines.len() {
                let tag = ChatColor::ALL[index];
                let team = self.registry.new_player_team(
                    viewer,
                    &format!("BoardLine:{}", index),
                    Text::empty(),
                );
                team.add_entry(&tag.legacy());
                board.lines.push(LineBinding { tag, team });
            }

            let binding = &board.lines[index];
            board.objective.set_score(&binding.tag.legacy(), LINE_SCORE);
            binding.team.set_prefix(line.clone());
        }

        for binding in board.lines.iter().skip(shown) {
            board.objective.remove_score(&binding.tag.legacy());
        }
        board.active = shown;
    }

    /// Number of rows currently displayed for `viewer`
    pub fn line_count(&self, viewer: ViewerId) -> usize {
        self.existing_board(viewer)
            .map_or(0, |board| board.lock().active)
    }

    /// Number of rows that have a team allocated, displayed or not
    pub fn bound_lines(&self, viewer: ViewerId) -> usize {
        self.existing_board(viewer)
            .map_or(0, |board| board.lock().lines.len())
    }

    pub fn line_team(&self, viewer: ViewerId, index: usize) -> Option<Arc<Team>> {
        let board = self.existing_board(viewer)?;
        let board = board.lock();
        board.lines.get(index).map(|binding| Arc::clone(&binding.team))
    }

    pub fn objective(&self, viewer: ViewerId) -> Option<Arc<Objective>> {
        self.existing_board(viewer)
            .map(|board| Arc::clone(&board.lock().objective))
    }

    fn existing_board(&self, viewer: ViewerId) -> Option<Arc<Mutex<Board>>> {
        self.boards.lock().get(&viewer).cloned()
    }

    /// Forgets the viewer's board; the registry already tore down its entities.
    pub fn on_viewer_disconnected(&self, viewer: ViewerId) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.boards.lock().remove(&viewer).is_some() {
            debug!("Dropped sidebar of viewer {}", viewer);
        }
    }

    /// Closes every board and the underlying registry
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let boards: Vec<Arc<Mutex<Board>>> =
            self.boards.lock().drain().map(|(_, board)| board).collect();
        for board in &boards {
            let board = board.lock();
            for binding in &board.lines {
                close_logged(&*binding.team);
            }
            close_logged(&*board.objective);
        }

        self.registry.close();
        info!("Sidebar closed ({} boards)", boards.len());
    }
}
