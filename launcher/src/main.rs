use clap::{Parser, ValueEnum};
use launcher::command::{CommandOutcome, CommandTask};
use launcher::config::LauncherSession;
use launcher::orchestrator::{CloudCli, Orchestrator};
use log::info;
use shared::status::{LogSink, Severity, StatusSink};
use std::path::PathBuf;
use tokio::time::{interval, Duration};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to run against the project
    #[arg(value_enum)]
    action: Action,

    /// Project the configurations belong to
    #[arg(short, long)]
    project: String,

    /// Path to the persisted launcher configuration file
    #[arg(short, long, default_value = "launcher_configs.json")]
    config: PathBuf,

    /// Deployment configuration name (required for launch/stop)
    #[arg(short, long)]
    deployment: Option<String>,

    /// Cloud CLI executable to invoke
    #[arg(long, default_value = "cloudctl")]
    cli: String,

    /// Directory the cloud CLI runs in
    #[arg(long, default_value = ".")]
    project_root: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Action {
    /// Upload the session's assembly
    Upload,
    /// Launch a deployment and its simulated-player deployments
    Launch,
    /// Stop a running deployment
    Stop,
    /// List the project's live deployments
    List,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let session = LauncherSession::load(&args.config, &args.project)?;
    let orchestrator = Orchestrator::new(
        &args.project,
        CloudCli::new(&args.cli, args.project_root.clone()),
    );
    let mut sink = LogSink;

    info!("Project: {}", args.project);

    match args.action {
        Action::Upload => {
            let mut task = orchestrator.upload_assembly(session.assembly())?;
            let label = format!("upload assembly '{}'", task.context().assembly_name);
            drive_to_completion(&mut task, &label, &mut sink).await?;
        }
        Action::Launch => {
            let name = args
                .deployment
                .ok_or("launch requires --deployment <name>")?;
            let config = session
                .find_deployment(&name)
                .ok_or_else(|| format!("no deployment configuration named '{}'", name))?;

            let mut task = orchestrator.launch_deployment(config)?;
            let label = format!("launch deployment '{}'", name);
            drive_to_completion(&mut task, &label, &mut sink).await?;

            for mut sim_task in orchestrator.launch_simulated_players(config)? {
                let label = format!(
                    "launch simulated player deployment '{}'",
                    sim_task.context().base.name
                );
                drive_to_completion(&mut sim_task, &label, &mut sink).await?;
            }
        }
        Action::Stop => {
            let name = args.deployment.ok_or("stop requires --deployment <name>")?;
            let mut task = orchestrator.stop_deployment(&name)?;
            let label = format!("stop deployment '{}'", name);
            drive_to_completion(&mut task, &label, &mut sink).await?;
        }
        Action::List => {
            let mut task = orchestrator.list_deployments();
            let stdout = drive_to_completion(&mut task, "list deployments", &mut sink).await?;
            println!("{}", stdout);
        }
    }

    Ok(())
}

/// Polls the task each tick until it resolves. Ctrl+C requests cooperative
/// cancellation; polling continues until the cancelled outcome is observed.
async fn drive_to_completion<C>(
    task: &mut CommandTask<C>,
    label: &str,
    sink: &mut dyn StatusSink,
) -> Result<String, Box<dyn std::error::Error>> {
    sink.report(&format!("Started: {}", label), Severity::Info);

    let mut poll_interval = interval(Duration::from_millis(200));
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                if let Some(outcome) = task.try_result() {
                    match outcome {
                        CommandOutcome::Finished(result) if result.success() => {
                            sink.report(&format!("Succeeded: {}", label), Severity::Info);
                            return Ok(result.stdout.clone());
                        }
                        CommandOutcome::Finished(result) => {
                            sink.report(
                                &format!(
                                    "Failed: {} (exit code {:?})\n{}",
                                    label, result.exit_code, result.stderr
                                ),
                                Severity::Error,
                            );
                            return Err(format!("{} failed", label).into());
                        }
                        CommandOutcome::Cancelled => {
                            sink.report(&format!("Cancelled: {}", label), Severity::Warning);
                            return Err(format!("{} cancelled", label).into());
                        }
                        CommandOutcome::Error(message) => {
                            sink.report(
                                &format!("Internal failure running {}: {}", label, message),
                                Severity::Error,
                            );
                            return Err(message.clone().into());
                        }
                    }
                }
            },
            _ = tokio::signal::ctrl_c(), if !cancel_requested => {
                sink.report(&format!("Cancelling: {}", label), Severity::Warning);
                task.cancel();
                cancel_requested = true;
            },
        }
    }
}
