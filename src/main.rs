//! pushvisor binary: runs the notification server with an operator console,
//! or sends a single query to a running server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use pushvisor::console::{self, ConsoleExit};
use pushvisor::dispatch::{NotificationRequest, tcp_request};
use pushvisor::{NotificationServer, ServerConfig, ShutdownSignal, logging, wait_for_shutdown_signal};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "pushvisor", version)]
#[command(about = "Version-gated push notification server")]
struct Cli {
    /// Endpoint to bind, including port.
    #[arg(short = 'u', long, value_name = "HOST:PORT")]
    bind: Option<String>,

    /// Number of dispatcher worker threads.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Do not write logs to disk.
    #[arg(short = 'w', long)]
    no_disk_log: bool,

    /// TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Notification catalog directory.
    #[arg(long, value_name = "DIR")]
    notifications: Option<PathBuf>,

    /// Default log filter (`RUST_LOG` wins).
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one query to a running server and print the reply.
    Query {
        /// Server endpoint.
        #[arg(short = 'u', long, default_value = "127.0.0.1:8080")]
        bind: String,

        /// Client version (`major.minor.patch`).
        #[arg(long)]
        version: String,

        /// Client product.
        #[arg(long)]
        product: Option<String>,
    },
}

impl Cli {
    /// Defaults, then the config file, then flags.
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let mut cfg = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = &self.bind {
            cfg.bind = bind.clone();
        }
        if let Some(threads) = self.threads {
            cfg.threads = threads;
        }
        if self.no_disk_log {
            cfg.write_logs = false;
        }
        if let Some(dir) = &self.notifications {
            cfg.notification_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            cfg.log_level = level.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let result = rt.block_on(async {
        match cli.command {
            Some(Commands::Query {
                ref bind,
                ref version,
                ref product,
            }) => query(bind, version, product.clone()).await,
            None => serve(&cli).await,
        }
    });

    // A console read may still be parked on stdin.
    rt.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn query(bind: &str, version: &str, product: Option<String>) -> anyhow::Result<()> {
    let body = serde_json::to_vec(&NotificationRequest {
        version: version.to_string(),
        product,
    })?;
    let reply = tcp_request(bind, &body)
        .await
        .with_context(|| format!("querying {bind}"))?;
    println!("{}", String::from_utf8_lossy(&reply));
    Ok(())
}

async fn serve(cli: &Cli) -> anyhow::Result<()> {
    let cfg = cli.server_config()?;
    let queue = logging::init(&cfg.log_level)?;

    let server = NotificationServer::builder(cfg).with_log_queue(queue).build()?;
    server.start().await?;

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        res = console::run(&server, stdin, tokio::io::stdout()) => match res {
            Ok(ConsoleExit::Command) => tracing::info!("exit requested from console"),
            Ok(ConsoleExit::EndOfInput) => tracing::info!("console input closed"),
            Err(e) => tracing::warn!(error = %e, "console failed"),
        },
        sig = shutdown_signal() => {
            tracing::info!(signal = %sig, "shutdown signal received");
            server.request_shutdown(sig.to_string());
        }
    }

    server.shutdown().await;
    Ok(())
}

/// Waits for a termination signal; never completes if handlers cannot be installed.
async fn shutdown_signal() -> ShutdownSignal {
    match wait_for_shutdown_signal().await {
        Ok(sig) => sig,
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for shutdown signals");
            std::future::pending().await
        }
    }
}
