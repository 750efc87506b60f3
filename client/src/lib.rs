//! # Scoreboard Viewer Library
//!
//! A reference viewer for the scoreboard server. It connects over UDP,
//! mirrors every scoreboard packet it receives and draws the result.
//!
//! ## Module Organization
//!
//! ### Board Module (`board`)
//! Replays objective, display-slot, score and team packets into a local
//! [`board::BoardMirror`] and derives what a viewer sees:
//! - Sidebar rows ordered by score, then entry name
//! - Team-bound rows shown as the team's prefix and suffix
//! - Player-list scores
//!
//! ### Network Module (`network`)
//! Owns the UDP socket:
//! - Sends `Connect` with the protocol version and display name
//! - Heartbeats once per second so the server keeps the session alive
//! - Forwards server packets to the render loop as [`network::ClientEvent`]s
//! - Says goodbye with `Disconnect` on shutdown
//!
//! ### Rendering Module (`rendering`)
//! Draws the mirrored sidebar, player list and connection status with
//! macroquad, mapping chat colors to screen colors.
//!
//! ## Threading
//!
//! macroquad must own the main thread, so the connection runs on a separate
//! thread with its own tokio runtime and talks to the render loop through an
//! unbounded channel.

pub mod board;
pub mod network;
pub mod rendering;
