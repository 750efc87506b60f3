use clap::Parser;
use log::info;
use server::network::{Server, ServerResult};
use std::time::Duration;

#[tokio::main]
async fn main() -> ServerResult<()> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Address to bind
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Board refreshes per second
        #[clap(short, long, default_value = "4")]
        tick_rate: u32,
        #[clap(short, long, default_value = "32")]
        max_clients: usize,
        /// Sidebar title
        #[clap(long, default_value = "Lobby")]
        title: String,
    }

    env_logger::init();
    let args = Args::parse();

    let tick_duration = Duration::from_secs_f64(1.0 / f64::from(args.tick_rate.max(1)));
    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting scoreboard server on {} at {} Hz",
        address, args.tick_rate
    );

    let mut server = Server::new(&address, tick_duration, args.max_clients, &args.title).await?;
    server.run().await
}
