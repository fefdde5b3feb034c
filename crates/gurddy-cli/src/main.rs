use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use gurddy_cli::McpClient;

#[derive(Parser)]
#[command(name = "gurddy", about = "Command-line client for the gurddy MCP server")]
struct Cli {
    /// gurddy server URL
    #[arg(long, env = "GURDDY_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the handshake and print what the server announced
    Init,

    /// List the tools the server exposes
    Tools,

    /// Call a tool and print its result
    Call {
        /// Tool name
        name: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// Receive the result as a server-sent event stream
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut client = McpClient::new(&cli.url);
    let server = client.initialize().await?;

    let outcome = run(&client, server, cli.command).await;
    client.close().await?;
    outcome
}

async fn run(client: &McpClient, server: Value, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            println!("{}", serde_json::to_string_pretty(&server)?);
            if let Some(session) = client.session() {
                println!("session: {session}");
            }
        }
        Commands::Tools => {
            for tool in client.list_tools().await? {
                println!(
                    "{:<24} {}",
                    tool["name"].as_str().unwrap_or_default(),
                    tool["description"].as_str().unwrap_or_default()
                );
            }
        }
        Commands::Call { name, args, stream } => {
            let arguments: Value = serde_json::from_str(&args)
                .map_err(|e| anyhow::anyhow!("--args is not valid JSON: {e}"))?;
            let result = client.call_tool(&name, arguments, stream).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
