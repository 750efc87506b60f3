//! Scoreboard registry
//!
//! The registry owns every objective and team. Global entities are shown to
//! every connected viewer; private entities belong to exactly one viewer and
//! are destroyed when that viewer leaves.
//!
//! # Locking
//!
//! ```text
//!   objectives (RwLock) ──┐
//!   teams      (RwLock) ──┼──► online (RwLock) ──► entity Mutex
//!                         │
//!   scopes     (Mutex)  ──┴──► scope Mutex ──────► entity Mutex
//! ```
//!
//! Locks are always taken left to right. Global creation holds its map's
//! write lock while reading the online set, and viewer connect/disconnect
//! hold both maps' read locks while editing it, so a viewer can never be
//! missed or subscribed twice by a racing create.
//!
//! Each viewer's private maps sit behind their own mutex with a `closed`
//! flag. Disconnect unlinks the scope before closing it; a creator that finds
//! a closed scope retries against a fresh one.

use crate::objective::Objective;
use crate::subscribable::{close_logged, Entity, Subscribable};
use crate::team::Team;
use crate::transport::Transport;
use crate::viewer::{Viewer, ViewerId};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use shared::{DisplaySlot, Text};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default)]
struct ScopeState {
    objectives: HashMap<String, Arc<Objective>>,
    teams: HashMap<String, Arc<Team>>,
    closed: bool,
}

/// Private objectives and teams of one viewer
#[derive(Default)]
struct ViewerScope {
    state: Mutex<ScopeState>,
}

impl ViewerScope {
    fn close(&self, viewer: ViewerId) {
        let mut state = self.state.lock();
        state.closed = true;

        let objectives = std::mem::take(&mut state.objectives);
        let teams = std::mem::take(&mut state.teams);
        debug!(
            "Closing {} private objectives and {} private teams of viewer {}",
            objectives.len(),
            teams.len(),
            viewer
        );

        for objective in objectives.values() {
            close_logged(&**objective);
        }
        for team in teams.values() {
            close_logged(&**team);
        }
    }
}

pub struct Registry {
    transport: Arc<dyn Transport>,
    objectives: RwLock<HashMap<String, Arc<Objective>>>,
    teams: RwLock<HashMap<String, Arc<Team>>>,
    online: RwLock<HashMap<ViewerId, Viewer>>,
    scopes: Mutex<HashMap<ViewerId, Arc<ViewerScope>>>,
    last_generated_id: AtomicU64,
    closed: AtomicBool,
}

impl Registry {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            objectives: RwLock::new(HashMap::new()),
            teams: RwLock::new(HashMap::new()),
            online: RwLock::new(HashMap::new()),
            scopes: Mutex::new(HashMap::new()),
            last_generated_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Time-derived hex id, strictly increasing per registry
    fn generate_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        let previous = self
            .last_generated_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);

        format!("{:x}", now.max(previous + 1))
    }

    fn online_ids(&self) -> Vec<ViewerId> {
        let mut ids: Vec<ViewerId> = self.online.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Viewers currently subscribed to global entities
    pub fn online_viewers(&self) -> Vec<Viewer> {
        let mut viewers: Vec<Viewer> = self.online.read().values().cloned().collect();
        viewers.sort_by_key(Viewer::id);
        viewers
    }

    pub fn is_online(&self, viewer: ViewerId) -> bool {
        self.online.read().contains_key(&viewer)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ---- global teams ----

    pub fn new_team(&self, title: Text) -> Arc<Team> {
        let id = self.generate_id();
        self.new_team_with_id(&id, title)
    }

    /// Gets or creates a global team; a new team is sent to every online viewer.
    pub fn new_team_with_id(&self, id: &str, title: Text) -> Arc<Team> {
        let mut teams = self.teams.write();
        if let Some(existing) = teams.get(id) {
            return Arc::clone(existing);
        }

        let team = Arc::new(Team::new(
            id,
            title,
            Arc::clone(&self.transport),
            &self.online_ids(),
        ));
        teams.insert(id.to_string(), Arc::clone(&team));
        debug!("Created global team {}", id);
        team
    }

    pub fn team(&self, id: &str) -> Option<Arc<Team>> {
        self.teams.read().get(id).cloned()
    }

    pub fn teams(&self) -> Vec<Arc<Team>> {
        self.teams.read().values().cloned().collect()
    }

    pub fn remove_team(&self, id: &str) -> bool {
        remove_global(&self.teams, id)
    }

    // ---- global objectives ----

    pub fn new_objective(&self, title: Text, display_slot: DisplaySlot) -> Arc<Objective> {
        let id = self.generate_id();
        self.new_objective_with_id(&id, title, display_slot)
    }

    /// Gets or creates a global objective; a new objective is sent to every
    /// online viewer.
    pub fn new_objective_with_id(
        &self,
        id: &str,
        title: Text,
        display_slot: DisplaySlot,
    ) -> Arc<Objective> {
        let mut objectives = self.objectives.write();
        if let Some(existing) = objectives.get(id) {
            return Arc::clone(existing);
        }

        let objective = Arc::new(Objective::new(
            id,
            title,
            display_slot,
            Arc::clone(&self.transport),
            &self.online_ids(),
        ));
        objectives.insert(id.to_string(), Arc::clone(&objective));
        debug!("Created global objective {}", id);
        objective
    }

    pub fn objective(&self, id: &str) -> Option<Arc<Objective>> {
        self.objectives.read().get(id).cloned()
    }

    pub fn objectives(&self) -> Vec<Arc<Objective>> {
        self.objectives.read().values().cloned().collect()
    }

    pub fn remove_objective(&self, id: &str) -> bool {
        remove_global(&self.objectives, id)
    }

    // ---- private entities ----

    fn scope(&self, viewer: ViewerId) -> Arc<ViewerScope> {
        Arc::clone(self.scopes.lock().entry(viewer).or_default())
    }

    /// Runs `f` on the viewer's private maps, retrying on a fresh scope if the
    /// one we found was torn down by a concurrent disconnect.
    fn with_scope<R>(&self, viewer: ViewerId, f: impl FnOnce(&mut ScopeState) -> R) -> R {
        loop {
            let scope = self.scope(viewer);
            let mut state = scope.state.lock();
            if !state.closed {
                return f(&mut *state);
            }
            drop(state);

            // Unlink the dead scope only if it is still the registered one
            let mut scopes = self.scopes.lock();
            if scopes
                .get(&viewer)
                .is_some_and(|current| Arc::ptr_eq(current, &scope))
            {
                scopes.remove(&viewer);
            }
        }
    }

    /// Gets or creates a team only `viewer` can see
    pub fn new_player_team(&self, viewer: ViewerId, id: &str, title: Text) -> Arc<Team> {
        let transport = &self.transport;
        self.with_scope(viewer, |scope| {
            let team = scope.teams.entry(id.to_string()).or_insert_with(|| {
                debug!("Created private team {} for viewer {}", id, viewer);
                Arc::new(Team::new(id, title, Arc::clone(transport), &[viewer]))
            });
            Arc::clone(team)
        })
    }

    pub fn player_team(&self, viewer: ViewerId, id: &str) -> Option<Arc<Team>> {
        self.with_scope(viewer, |scope| scope.teams.get(id).cloned())
    }

    pub fn remove_player_team(&self, viewer: ViewerId, id: &str) -> bool {
        self.with_scope(viewer, |scope| match scope.teams.remove(id) {
            Some(team) => {
                close_logged(&*team);
                true
            }
            None => false,
        })
    }

    /// Snapshot of the viewer's private teams, creating its scope if needed
    pub fn player_teams(&self, viewer: ViewerId) -> HashMap<String, Arc<Team>> {
        self.with_scope(viewer, |scope| scope.teams.clone())
    }

    pub fn new_player_objective(
        &self,
        viewer: ViewerId,
        title: Text,
        display_slot: DisplaySlot,
    ) -> Arc<Objective> {
        let id = self.generate_id();
        self.new_player_objective_with_id(viewer, &id, title, display_slot)
    }

    /// Gets or creates an objective only `viewer` can see
    pub fn new_player_objective_with_id(
        &self,
        viewer: ViewerId,
        id: &str,
        title: Text,
        display_slot: DisplaySlot,
    ) -> Arc<Objective> {
        let transport = &self.transport;
        self.with_scope(viewer, |scope| {
            let objective = scope.objectives.entry(id.to_string()).or_insert_with(|| {
                debug!("Created private objective {} for viewer {}", id, viewer);
                Arc::new(Objective::new(
                    id,
                    title,
                    display_slot,
                    Arc::clone(transport),
                    &[viewer],
                ))
            });
            Arc::clone(objective)
        })
    }

    pub fn player_objective(&self, viewer: ViewerId, id: &str) -> Option<Arc<Objective>> {
        self.with_scope(viewer, |scope| scope.objectives.get(id).cloned())
    }

    pub fn remove_player_objective(&self, viewer: ViewerId, id: &str) -> bool {
        self.with_scope(viewer, |scope| match scope.objectives.remove(id) {
            Some(objective) => {
                close_logged(&*objective);
                true
            }
            None => false,
        })
    }

    /// Snapshot of the viewer's private objectives, creating its scope if needed
    pub fn player_objectives(&self, viewer: ViewerId) -> HashMap<String, Arc<Objective>> {
        self.with_scope(viewer, |scope| scope.objectives.clone())
    }

    // ---- viewer lifecycle ----

    /// Subscribes a newly connected viewer to every global entity
    pub fn on_viewer_connected(&self, viewer: &Viewer) {
        if self.is_closed() {
            debug!("Ignoring connect of viewer {}: registry closed", viewer.id());
            return;
        }

        let objectives = self.objectives.read();
        let teams = self.teams.read();
        self.online.write().insert(viewer.id(), viewer.clone());

        for objective in objectives.values() {
            if let Err(e) = objective.subscribe(viewer.id()) {
                warn!(
                    "Failed to subscribe viewer {} to objective {}: {}",
                    viewer.id(),
                    objective.id(),
                    e
                );
            }
        }
        for team in teams.values() {
            if let Err(e) = team.subscribe(viewer.id()) {
                warn!(
                    "Failed to subscribe viewer {} to team {}: {}",
                    viewer.id(),
                    team.id(),
                    e
                );
            }
        }

        info!(
            "Viewer {} ({}) joined: {} objectives, {} teams",
            viewer.id(),
            viewer.name(),
            objectives.len(),
            teams.len()
        );
    }

    /// Removes a departing viewer from every global entity and destroys its
    /// private entities
    pub fn on_viewer_disconnected(&self, viewer: &Viewer) {
        if self.is_closed() {
            debug!("Ignoring disconnect of viewer {}: registry closed", viewer.id());
            return;
        }

        {
            let objectives = self.objectives.read();
            let teams = self.teams.read();
            self.online.write().remove(&viewer.id());

            for objective in objectives.values() {
                if let Err(e) = objective.unsubscribe(viewer.id()) {
                    warn!(
                        "Failed to unsubscribe viewer {} from objective {}: {}",
                        viewer.id(),
                        objective.id(),
                        e
                    );
                }
            }
            for team in teams.values() {
                team.remove_player(viewer);
                if let Err(e) = team.unsubscribe(viewer.id()) {
                    warn!(
                        "Failed to unsubscribe viewer {} from team {}: {}",
                        viewer.id(),
                        team.id(),
                        e
                    );
                }
            }
        }

        let scope = self.scopes.lock().remove(&viewer.id());
        if let Some(scope) = scope {
            scope.close(viewer.id());
        }

        info!("Viewer {} ({}) left", viewer.id(), viewer.name());
    }

    /// Destroys every private and global entity and stops reacting to viewer
    /// lifecycle events.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        let scopes: Vec<(ViewerId, Arc<ViewerScope>)> = self.scopes.lock().drain().collect();
        for (viewer, scope) in &scopes {
            scope.close(*viewer);
        }

        let objectives = std::mem::take(&mut *self.objectives.write());
        for objective in objectives.values() {
            close_logged(&**objective);
        }
        let teams = std::mem::take(&mut *self.teams.write());
        for team in teams.values() {
            close_logged(&**team);
        }
        self.online.write().clear();

        info!(
            "Registry closed: {} viewer scopes, {} objectives, {} teams",
            scopes.len(),
            objectives.len(),
            teams.len()
        );
    }
}

fn remove_global<E: Entity>(map: &RwLock<HashMap<String, Arc<E>>>, id: &str) -> bool {
    let removed = map.write().remove(id);
    match removed {
        Some(entity) => {
            close_logged(&*entity);
            debug!("Removed global {} {}", E::KIND, id);
            true
        }
        None => false,
    }
}
