//! Integration tests for the scoreboard server and viewer
//!
//! These tests validate cross-component interactions and real network behavior.

use bincode::{deserialize, serialize};
use client::board::BoardMirror;
use client::network::{ClientEvent, Connection};
use server::network::Server;
use server::registry::Registry;
use server::sidebar::{Sidebar, MAX_LINES};
use server::subscribable::Subscribable;
use server::transport::RecordingTransport;
use server::viewer::{Viewer, ViewerId};
use shared::{
    ChatColor, DisplaySlot, ObjectiveMode, Packet, ScoreAction, ScoreboardPacket, TeamMode, Text,
    PROTOCOL_VERSION,
};
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};

fn setup() -> (Arc<RecordingTransport>, Arc<Registry>) {
    let transport = Arc::new(RecordingTransport::new());
    let registry = Arc::new(Registry::new(transport.clone()));
    (transport, registry)
}

fn mirror_of(transport: &RecordingTransport, viewer: ViewerId) -> BoardMirror {
    let mut mirror = BoardMirror::new();
    for packet in transport.sent_to(viewer) {
        mirror.apply(&packet);
    }
    mirror
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests packet serialization round-trip for the host protocol
    #[tokio::test]
    async fn packet_serialization_roundtrip() {
        let test_packets = vec![
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
                name: "alice".to_string(),
            },
            Packet::Heartbeat,
            Packet::Connected { viewer_id: 42 },
            Packet::Scoreboard(ScoreboardPacket::score(
                "alice",
                "kills",
                ScoreAction::Change,
                -3,
            )),
            Packet::Disconnected {
                reason: "Test".to_string(),
            },
        ];

        for packet in test_packets {
            let serialized = serialize(&packet).unwrap();
            let deserialized: Packet = deserialize(&serialized).unwrap();
            assert_eq!(deserialized, packet);
        }
    }

    /// Tests real UDP socket communication
    #[tokio::test]
    async fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        sleep(Duration::from_millis(10)).await;

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let test_packet = Packet::Scoreboard(ScoreboardPacket::display(
            DisplaySlot::Sidebar,
            "board",
        ));
        client_socket
            .send_to(&serialize(&test_packet).unwrap(), server_addr)
            .unwrap();

        let mut buf = [0; 1024];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();
        assert_eq!(received_packet, test_packet);
    }

    /// Tests that garbage datagrams are rejected rather than misread
    #[test]
    fn malformed_packet_handling() {
        let malformed_data = vec![
            vec![],
            vec![0xFF; 3],
            vec![0x05, 0x00, 0x00, 0x00, 0xFF, 0xFF],
        ];

        for data in malformed_data {
            let result: Result<Packet, _> = deserialize(&data);
            assert!(result.is_err(), "Malformed data should fail: {:?}", data);
        }
    }
}

/// REGISTRY TESTS
mod registry_tests {
    use super::*;

    /// A viewer joining after many mutations sees the same final state
    #[test]
    fn late_subscriber_receives_full_state() {
        let (transport, registry) = setup();
        registry.on_viewer_connected(&Viewer::new(ViewerId(1), "alice"));

        let kills =
            registry.new_objective_with_id("kills", Text::new("Kills"), DisplaySlot::Sidebar);
        for (i, entry) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            kills.set_score(entry, i as i32);
        }
        kills.set_score("a", 10);
        kills.set_title(Text::new("Top kills"));

        let red = registry.new_team_with_id("red", Text::new("Red"));
        red.set_prefix(Text::colored("[R] ", ChatColor::Red));
        red.add_entry("a");

        registry.on_viewer_connected(&Viewer::new(ViewerId(2), "bob"));

        let early = mirror_of(&transport, ViewerId(1));
        let late = mirror_of(&transport, ViewerId(2));

        assert_eq!(late.objective("kills"), early.objective("kills"));
        assert_eq!(late.objective("kills").unwrap().scores.len(), 5);
        assert_eq!(late.objective("kills").unwrap().scores["a"], 10);
        assert_eq!(late.team("red"), early.team("red"));
        assert_eq!(late.sidebar(), early.sidebar());
    }

    /// Disconnect removes the viewer everywhere and destroys its private entities
    #[test]
    fn disconnect_teardown() {
        let (transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        let bob = Viewer::new(ViewerId(2), "bob");
        registry.on_viewer_connected(&alice);
        registry.on_viewer_connected(&bob);

        let team = registry.new_team_with_id("red", Text::new("Red"));
        team.add_player(&alice);
        team.add_player(&bob);
        let private = registry.new_player_team(alice.id(), "mine", Text::empty());
        transport.clear();

        registry.on_viewer_disconnected(&alice);

        assert_eq!(team.viewers(), vec![bob.id()]);
        assert!(!team.has_entry("alice"));
        assert!(team.has_entry("bob"));
        assert!(private.viewers().is_empty());
        assert!(registry.player_teams(alice.id()).is_empty());

        // Bob only hears that alice left the team
        let to_bob = transport.sent_to(bob.id());
        assert_eq!(
            to_bob,
            vec![ScoreboardPacket::team(
                "red",
                TeamMode::RemoveEntries,
                None,
                ["alice"]
            )]
        );
        let to_alice = transport.sent_to(alice.id());
        for team_id in ["red", "mine"] {
            assert!(to_alice.iter().any(|packet| matches!(
                packet,
                ScoreboardPacket::Team {
                    name,
                    mode: TeamMode::Remove,
                    ..
                } if name == team_id
            )));
        }
    }

    /// After close nothing is reachable and lifecycle events are ignored
    #[test]
    fn registry_close() {
        let (_transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        registry.on_viewer_connected(&alice);
        let objective = registry.new_objective(Text::new("Kills"), DisplaySlot::Sidebar);
        let id = objective.id().to_string();
        registry.new_player_objective(alice.id(), Text::new("-"), DisplaySlot::Sidebar);

        registry.close();

        assert!(registry.objective(&id).is_none());
        assert!(registry.objectives().is_empty());
        assert!(registry.player_objectives(alice.id()).is_empty());
        assert!(objective.viewers().is_empty());

        registry.on_viewer_disconnected(&alice);
        assert!(registry.is_closed());
    }

    /// Explicit subscription of a non-online viewer is allowed
    #[test]
    fn manual_subscription() {
        let (transport, registry) = setup();
        let objective =
            registry.new_objective_with_id("o", Text::new("O"), DisplaySlot::BelowName);
        objective.set_score("x", 1);

        objective.subscribe(ViewerId(9)).unwrap();
        let mirror = mirror_of(&transport, ViewerId(9));
        assert_eq!(mirror.displayed(DisplaySlot::BelowName).unwrap().scores["x"], 1);

        objective.unsubscribe(ViewerId(9)).unwrap();
        let last = transport.sent_to(ViewerId(9)).pop().unwrap();
        assert!(matches!(
            last,
            ScoreboardPacket::Objective {
                mode: ObjectiveMode::Remove,
                ..
            }
        ));
    }
}

/// SIDEBAR TESTS
mod sidebar_tests {
    use super::*;

    fn texts(lines: &[&str]) -> Vec<Text> {
        lines.iter().map(|line| Text::new(*line)).collect()
    }

    fn shown(mirror: &BoardMirror) -> Vec<String> {
        mirror
            .sidebar()
            .map(|view| view.lines.into_iter().map(|line| line.text).collect())
            .unwrap_or_default()
    }

    /// The mirror rebuilds exactly the lines the server wrote
    #[test]
    fn mirror_rebuilds_sidebar() {
        let (transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        registry.on_viewer_connected(&alice);
        let sidebar = Sidebar::new(registry);

        sidebar.set_title(alice.id(), Text::colored("Arena", ChatColor::Gold));
        sidebar.set_lines(alice.id(), &texts(&["Kills: 0", "", "Round 1"]));
        let mirror = mirror_of(&transport, alice.id());
        assert_eq!(shown(&mirror), vec!["Kills: 0", "", "Round 1"]);
        assert_eq!(
            mirror.sidebar().unwrap().title,
            Text::colored("Arena", ChatColor::Gold)
        );

        sidebar.set_lines(alice.id(), &texts(&["Kills: 1", "", "Round 1", "Overtime"]));
        assert_eq!(
            shown(&mirror_of(&transport, alice.id())),
            vec!["Kills: 1", "", "Round 1", "Overtime"]
        );

        sidebar.set_lines(alice.id(), &texts(&["Game over"]));
        assert_eq!(shown(&mirror_of(&transport, alice.id())), vec!["Game over"]);
    }

    /// Rewriting one line sends one team update and nothing else
    #[test]
    fn sidebar_stability() {
        let (transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        registry.on_viewer_connected(&alice);
        let sidebar = Sidebar::new(registry);

        sidebar.set_lines(alice.id(), &texts(&["A", "B"]));
        transport.clear();
        sidebar.set_lines(alice.id(), &texts(&["C", "B"]));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].packet.target(), "BoardLine:0");
        assert_eq!(sent[0].viewers, vec![alice.id()]);
    }

    /// Shrinking keeps the rows reserved and only removes scores
    #[test]
    fn sidebar_shrink() {
        let (transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        registry.on_viewer_connected(&alice);
        let sidebar = Sidebar::new(registry);

        sidebar.set_lines(alice.id(), &texts(&["1", "2", "3", "4", "5"]));
        transport.clear();
        sidebar.set_lines(alice.id(), &texts(&["1", "2"]));

        let removals = transport
            .sent()
            .iter()
            .filter(|update| {
                matches!(
                    update.packet,
                    ScoreboardPacket::Score {
                        action: ScoreAction::Remove,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(removals, 3);
        assert_eq!(transport.len(), 3);
        assert_eq!(sidebar.bound_lines(alice.id()), 5);
    }

    /// Each viewer only sees its own sidebar
    #[test]
    fn sidebars_are_private() {
        let (transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        let bob = Viewer::new(ViewerId(2), "bob");
        registry.on_viewer_connected(&alice);
        registry.on_viewer_connected(&bob);
        let sidebar = Sidebar::new(registry);

        sidebar.set_lines(alice.id(), &texts(&["for alice"]));
        sidebar.set_lines(bob.id(), &texts(&["for bob"]));

        assert_eq!(shown(&mirror_of(&transport, alice.id())), vec!["for alice"]);
        assert_eq!(shown(&mirror_of(&transport, bob.id())), vec!["for bob"]);
    }

    /// Lines beyond the limit are dropped silently
    #[test]
    fn sidebar_clamps_lines() {
        let (transport, registry) = setup();
        let alice = Viewer::new(ViewerId(1), "alice");
        registry.on_viewer_connected(&alice);
        let sidebar = Sidebar::new(registry);

        let lines: Vec<Text> = (0..MAX_LINES + 5)
            .map(|i| Text::new(format!("line {}", i)))
            .collect();
        sidebar.set_lines(alice.id(), &lines);

        let rows = shown(&mirror_of(&transport, alice.id()));
        assert_eq!(rows.len(), MAX_LINES);
        assert_eq!(rows[MAX_LINES - 1], format!("line {}", MAX_LINES - 1));
    }
}

/// CLIENT-SERVER TESTS
mod client_server_tests {
    use super::*;

    /// A real viewer connects to a real server and sees its lobby sidebar
    #[tokio::test]
    async fn viewer_mirrors_lobby_sidebar() {
        let mut server = Server::new("127.0.0.1:0", Duration::from_millis(20), 8, "Lobby")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let server_handle = tokio::spawn(async move { server.run().await });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let mut connection = Connection::new(&addr.to_string(), "alice", events_tx)
            .await
            .unwrap();
        let client_handle = tokio::spawn(async move { connection.run(stop_rx).await });

        let mut mirror = BoardMirror::new();
        let mut viewer_id = None;
        let found = timeout(Duration::from_secs(3), async {
            while let Some(event) = events_rx.recv().await {
                match event {
                    ClientEvent::Connected { viewer_id: id } => viewer_id = Some(id),
                    ClientEvent::Scoreboard(packet) => mirror.apply(&packet),
                    ClientEvent::Disconnected { reason } => panic!("Disconnected: {}", reason),
                }
                let has_name = mirror
                    .sidebar()
                    .is_some_and(|view| view.lines.iter().any(|l| l.text == "Name: alice"));
                if has_name {
                    return true;
                }
            }
            false
        })
        .await;

        let found = tokio_test::assert_ok!(found);
        assert!(found);
        assert_eq!(viewer_id, Some(1));
        assert_eq!(
            mirror.sidebar().unwrap().title,
            Text::colored("Lobby", ChatColor::Gold)
        );
        assert!(mirror.player_list().iter().any(|(name, _)| name == "alice"));

        stop_tx.send(()).unwrap();
        tokio_test::assert_ok!(client_handle.await.unwrap());
        shutdown.shutdown();
        tokio_test::assert_ok!(server_handle.await.unwrap());
    }
}
