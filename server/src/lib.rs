//! # Scoreboard Server Library
//!
//! This library keeps remote viewers' scoreboards in sync with server-side
//! state. Game code mutates objectives and teams; every change is diffed
//! against the current state and only the resulting delta packets are sent to
//! the viewers subscribed to that entity.
//!
//! ## Core Responsibilities
//!
//! ### Entity State
//! Objectives (titled score tables shown in a display slot) and teams (named
//! entry groups with prefix, suffix and display rules) own their state and
//! broadcast each effective change. Setting a value to what it already is
//! sends nothing.
//!
//! ### Visibility
//! The registry decides who sees what:
//! - Global entities are visible to every connected viewer
//! - Private entities are visible to exactly one viewer
//! - A viewer's private entities die with its connection
//!
//! ### Flicker-Free Sidebar
//! The sidebar module renders up to fifteen lines per viewer by binding each
//! row to an invisible color-code entry inside a private team. Rewriting a
//! line only changes that team's prefix.
//!
//! ## Architecture Design
//!
//! ### Thread Safety
//! Every mutation may be called from any thread. Each entity keeps its state
//! behind one mutex, so comparing, updating and broadcasting are atomic per
//! entity and packets reach each viewer in mutation order. No scoreboard
//! operation awaits or blocks on I/O.
//!
//! ### Fire-and-Forget Transport
//! Entities hand packets to a [`transport::Transport`]. The UDP host queues
//! them on an unbounded channel drained by a sender task.
//!
//! ## Module Organization
//!
//! ### Scoreboard Core
//! - `viewer`: viewer identity
//! - `transport`: outbound seam plus a recording implementation
//! - `subscribable`: subscription capability shared by entities
//! - `objective`, `team`: the synchronized entities
//! - `registry`: global and per-viewer entity ownership
//! - `sidebar`: per-viewer line overlay
//!
//! ### Host
//! - `client_manager`: address and liveness tracking
//! - `lobby`: the boards the bundled server shows
//! - `network`: UDP server loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     // 4 board refreshes per second, at most 32 viewers
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(250),
//!         32,
//!         "Lobby",
//!     ).await?;
//!
//!     // Runs until Ctrl+C, then removes every board from every viewer
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Using the core without the host:
//!
//! ```rust
//! use server::registry::Registry;
//! use server::transport::RecordingTransport;
//! use server::viewer::{Viewer, ViewerId};
//! use shared::{DisplaySlot, Text};
//! use std::sync::Arc;
//!
//! let transport = Arc::new(RecordingTransport::new());
//! let registry = Registry::new(transport.clone());
//! registry.on_viewer_connected(&Viewer::new(ViewerId(1), "alice"));
//!
//! let kills = registry.new_objective_with_id("kills", Text::new("Kills"), DisplaySlot::Sidebar);
//! kills.set_score("alice", 3);
//! kills.set_score("alice", 3); // no packet
//!
//! assert_eq!(transport.sent_to(ViewerId(1)).len(), 3);
//! ```

pub mod client_manager;
pub mod lobby;
pub mod network;
pub mod objective;
pub mod registry;
pub mod sidebar;
pub mod subscribable;
pub mod team;
pub mod transport;
pub mod viewer;
