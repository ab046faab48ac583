mod cmd_clone;
mod cmd_serve;
mod cmd_status;
mod engine_args;

use clap::{Parser, Subcommand};

use engine_args::EngineArgs;

#[derive(Parser)]
#[command(
    name = "reposnap",
    version,
    about = "Durable shallow git snapshots behind an async HTTP API"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API and run clone workflows
    Serve {
        /// Bind address
        #[arg(long, env = "REPOSNAP_BIND", default_value = "127.0.0.1")]
        bind: String,
        /// Port
        #[arg(long, env = "REPOSNAP_PORT", default_value = "3000")]
        port: u16,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run one clone workflow in-process and wait for it
    Clone {
        /// Remote repository URL
        repo_url: String,
        /// Branch, tag, or full commit id
        git_ref: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Show the public status of a workflow from its journal
    Status {
        /// Workflow id (clone-...)
        workflow_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.cmd {
        Command::Serve { bind, port, engine } => cmd_serve::execute(&engine, &bind, port),
        Command::Clone {
            repo_url,
            git_ref,
            json,
            engine,
        } => cmd_clone::execute(&engine, &repo_url, &git_ref, json),
        Command::Status {
            workflow_id,
            json,
            engine,
        } => cmd_status::execute(&engine, &workflow_id, json),
    }
}
