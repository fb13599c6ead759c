use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, EnvFilter};

use torrentsmith::client::Client;
use torrentsmith::config::ConfigManager;
use torrentsmith::events::{ChannelEvent, ChannelStatus, EventChannel};
use torrentsmith::gateway::HttpGateway;
use torrentsmith::models::format_size;

#[derive(Debug, Parser)]
#[command(name = "torrentsmith", version, about = "Headless client for a torrent-maker service")]
struct Cli {
    /// Base URL of the orchestration service (overrides the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// Directory where log files are written
    #[arg(long, default_value = "logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a snapshot of servers, jobs and system metrics
    Status {
        /// Keep the event channel open and print updates as they arrive
        #[arg(long)]
        follow: bool,
    },
    /// List one directory of a server's filesystem
    Browse {
        /// Server profile id
        server: String,
        /// Directory to list
        #[arg(default_value = "/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to a timestamped file so stdout stays clean for output
    if !std::path::Path::new(&cli.log_dir).exists() {
        std::fs::create_dir_all(&cli.log_dir)?;
    }
    let log_file = format!(
        "{}/torrentsmith_{}.log",
        cli.log_dir,
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let file = File::create(&log_file)?;

    fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(EnvFilter::from_default_env().add_directive("torrentsmith=debug".parse()?))
        .with_ansi(false)
        .with_writer(file)
        .init();

    debug!("Starting up");

    let config_manager = ConfigManager::new().context("Failed to initialize config manager")?;
    let mut config = config_manager
        .load_config()
        .context("Failed to load config")?;
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
    }

    let gateway = HttpGateway::new(&config.api_base_url);
    let mut client = Client::new(gateway);

    match cli.command.unwrap_or(Command::Status { follow: false }) {
        Command::Status { follow } => run_status(&mut client, &config, follow).await,
        Command::Browse { server, path } => run_browse(&mut client, &server, &path).await,
    }
}

async fn run_status(
    client: &mut Client<HttpGateway>,
    config: &torrentsmith::config::AppConfig,
    follow: bool,
) -> Result<()> {
    // A failed pull keeps whatever snapshot we had; report and move on
    if let Err(err) = client.refresh_servers().await {
        eprintln!("Could not load servers: {err}");
    }
    if let Err(err) = client.refresh_metrics().await {
        eprintln!("Could not load system metrics: {err}");
    }
    print_snapshot(client);

    if !follow {
        return Ok(());
    }

    let channel = EventChannel::new(
        config.events_url(),
        Duration::from_secs(config.reconnect_delay_secs),
    );
    let mut subscription = channel.subscribe();

    while let Some(event) = subscription.recv().await {
        match &event {
            ChannelEvent::Status(ChannelStatus::Connecting) => {}
            ChannelEvent::Status(status) => println!("-- event channel {status:?}"),
            ChannelEvent::Job(delta) => {
                let status = delta
                    .status
                    .map(|s| format!("{s:?}").to_lowercase())
                    .unwrap_or_else(|| "?".to_string());
                let progress = delta
                    .progress
                    .map(|p| format!("{p}%"))
                    .unwrap_or_else(|| "-".to_string());
                println!("job {} {} {}", delta.task_id, status, progress);
            }
            ChannelEvent::Metrics(_) => {}
        }
        if let Err(err) = client.handle_event(event).await {
            tracing::warn!("Failed to apply event: {err}");
        }
    }

    Ok(())
}

fn print_snapshot(client: &Client<HttpGateway>) {
    let metrics = client.metrics();
    println!(
        "cpu {}  mem {}  disk {}  active jobs {}",
        percent(metrics.cpu_percent),
        percent(metrics.memory_percent),
        percent(metrics.disk_percent),
        client.active_job_count()
    );

    if client.servers().is_empty() {
        println!("no servers configured");
    } else {
        let mut ids: Vec<_> = client.servers().keys().collect();
        ids.sort();
        for id in ids {
            let server = &client.servers()[id];
            println!(
                "server {id}: {}@{}:{} ({})",
                server.username, server.host, server.port, server.name
            );
        }
    }

    let mut job_ids: Vec<_> = client.jobs().keys().collect();
    job_ids.sort();
    for id in job_ids {
        let job = &client.jobs()[id];
        let status = job
            .status
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_else(|| "?".to_string());
        let progress = job
            .progress
            .map(|p| format!("{p}%"))
            .unwrap_or_else(|| "-".to_string());
        println!("job {id}: {status} {progress}");
    }
}

fn percent(value: Option<f32>) -> String {
    value
        .map(|v| format!("{v:.1}%"))
        .unwrap_or_else(|| "-".to_string())
}

async fn run_browse(
    client: &mut Client<HttpGateway>,
    server: &str,
    path: &str,
) -> Result<()> {
    client
        .select_server(server)
        .await
        .with_context(|| format!("Failed to list / on {server}"))?;
    if path != "/" {
        client
            .navigate(path)
            .await
            .with_context(|| format!("Failed to list {path} on {server}"))?;
    }

    let trail: Vec<_> = client
        .navigator()
        .breadcrumb()
        .into_iter()
        .map(|crumb| crumb.label)
        .collect();
    println!("{}", trail.join(" > "));

    for entry in client.navigator().entries() {
        let size = if entry.is_directory {
            "<dir>".to_string()
        } else {
            format_size(entry.size)
        };
        let episode = entry
            .episode_info
            .as_ref()
            .map(|info| format!("  [{}]", info.format))
            .unwrap_or_default();
        println!("{size:>10}  {}{episode}", entry.name);
    }

    if let Some(stats) = client.navigator().stats() {
        println!(
            "{} files, {} dirs, {} videos, total {}",
            stats.file_count, stats.dir_count, stats.video_count, stats.total_size
        );
    }

    Ok(())
}
