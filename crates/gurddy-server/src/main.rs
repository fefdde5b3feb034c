use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use gurddy_server::app_state::AppState;
use gurddy_server::{build_dispatcher, router, stdio, verify};

#[derive(Parser)]
#[command(name = "gurddy-server", about = "MCP server for the gurddy solvers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve MCP over HTTP (buffered JSON or SSE)
    Http {
        #[arg(long, env = "GURDDY_HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "GURDDY_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Serve one MCP session over stdin/stdout
    Stdio,
    /// Check tool schemas against handlers and front-ends, then exit
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dispatcher = build_dispatcher().context("building the tool registry")?;

    match cli.command {
        Command::Http { host, port } => {
            let app = router::create_router(AppState::new(dispatcher));
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!("gurddy MCP server listening on {addr}");
            axum::serve(listener, app).await.context("server error")?;
        }
        Command::Stdio => {
            stdio::serve(
                dispatcher,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
        }
        Command::Verify => {
            let report = verify::run(dispatcher).await?;
            print!("{report}");
            if !report.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
