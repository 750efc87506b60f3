use clap::Parser;
use client::board::BoardMirror;
use client::network::{ClientEvent, Connection};
use client::rendering::{Renderer, UiConfig};
use log::{error, info};
use macroquad::prelude::*;
use ::rand::Rng;
use tokio::sync::{mpsc, oneshot};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name; a random one is picked when omitted
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Scoreboard Viewer".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

fn random_name() -> String {
    format!("viewer{:04}", ::rand::thread_rng().gen_range(0..10_000))
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let name = args.name.clone().unwrap_or_else(random_name);

    info!("Starting client...");
    info!("Connecting to {} as {}", args.server, name);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel();

    // macroquad owns the main thread; the socket gets its own runtime
    let server = args.server.clone();
    let connection_name = name.clone();
    let network = std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start network runtime: {}", e);
                return;
            }
        };

        runtime.block_on(async move {
            match Connection::new(&server, &connection_name, events_tx).await {
                Ok(mut connection) => {
                    if let Err(e) = connection.run(stop_rx).await {
                        error!("Connection error: {}", e);
                    }
                }
                Err(e) => error!("Failed to connect: {}", e),
            }
        });
    });

    let mut board = BoardMirror::new();
    let mut renderer = Renderer::new(args.width, args.height);
    let mut ui = UiConfig {
        viewer_id: None,
        name,
        status: None,
    };

    loop {
        while let Ok(event) = events_rx.try_recv() {
            match event {
                ClientEvent::Connected { viewer_id } => {
                    board.clear();
                    ui.viewer_id = Some(viewer_id);
                    ui.status = None;
                }
                ClientEvent::Disconnected { reason } => {
                    board.clear();
                    ui.viewer_id = None;
                    ui.status = Some(format!("Disconnected: {}", reason));
                }
                ClientEvent::Scoreboard(packet) => board.apply(&packet),
            }
        }

        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        renderer.render(&board, &ui);
        next_frame().await;
    }

    let _ = stop_tx.send(());
    if network.join().is_err() {
        error!("Network thread panicked");
    }
}
