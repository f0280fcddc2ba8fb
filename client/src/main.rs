use clap::Parser;
use client::gateway::GatewayClient;
use client::session::{AfterDiscovery, Blackboard, ConnectionStateMachine, SessionPhase};
use log::info;
use rand::Rng;
use shared::status::LogSink;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::time::{interval, Duration};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session gateway address to connect through
    #[arg(short = 'g', long, default_value = "127.0.0.1:7777")]
    gateway: SocketAddr,

    /// Development authentication token
    #[arg(short = 't', long)]
    dev_auth_token: String,

    /// Player id (a random one is generated when omitted)
    #[arg(short = 'p', long)]
    player_id: Option<String>,

    /// Display name shown to other players
    #[arg(short = 'n', long, default_value = "")]
    display_name: String,

    /// Deployment to join; without it the first joinable deployment is used
    #[arg(short = 'd', long)]
    deployment: Option<String>,

    /// Tick rate of the polling loop (ticks per second)
    #[arg(long, default_value = "30")]
    tick_rate: u32,

    /// Give up after this many failed connection attempts
    #[arg(long, default_value = "3")]
    max_attempts: u32,
}

fn random_player_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("player_{:06}", suffix)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let player_id = args.player_id.unwrap_or_else(random_player_id);

    info!("Starting client as '{}'", player_id);
    info!("Gateway: {}", args.gateway);

    let blackboard = Blackboard {
        player_id,
        display_name: args.display_name.clone(),
        dev_auth_token: args.dev_auth_token.clone(),
        selected_deployment: args.deployment.clone(),
        ..Blackboard::default()
    };

    let service = GatewayClient::new(args.gateway);
    let mut machine = ConnectionStateMachine::new(service, blackboard, Box::new(LogSink));

    let mut tick_interval = interval(Duration::from_secs_f32(1.0 / args.tick_rate as f32));
    let mut attempts = 0u32;

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                machine.tick(Instant::now());

                if machine.is_established() {
                    let session = machine.blackboard().session.clone();
                    if let Some(session) = session {
                        info!(
                            "Session established on '{}' at {}:{}",
                            session.deployment_name, session.host, session.port
                        );
                    }
                    return Ok(());
                }

                if machine.phase() == SessionPhase::Start {
                    if attempts >= args.max_attempts {
                        return Err(format!(
                            "giving up after {} failed connection attempts",
                            attempts
                        )
                        .into());
                    }
                    attempts += 1;
                    info!("Connection attempt {}/{}", attempts, args.max_attempts);
                    machine.try_connect(AfterDiscovery::AutoConnect);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, aborting connection attempt");
                machine.reset();
                return Ok(());
            },
        }
    }
}
