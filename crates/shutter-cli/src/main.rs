use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod library;

use commands::App;

#[derive(Parser, Debug)]
#[command(name = "shutter", version, about = "Natural-language commands for a photo library")]
struct Cli {
    /// Configuration file (YAML). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "SHUTTER_CONFIG")]
    config: Option<PathBuf>,

    /// Role whose permissions the caller holds
    #[arg(long, global = true, default_value = "editor")]
    role: String,

    /// Extra permission on top of the role, e.g. --grant write:albums
    #[arg(long = "grant", global = true)]
    grants: Vec<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the actions the caller may run
    Actions {
        /// Print summaries as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show one action descriptor, including its JSON input schema
    Describe { action_id: String },

    /// Interpret one utterance
    Interpret {
        /// The utterance; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Dispatch the command when it is ready
        #[arg(long, default_value_t = false)]
        execute: bool,
    },

    /// Run an action with explicit parameters
    Exec {
        action_id: String,

        /// Parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// Interactive session with clarification turns
    Repl {
        /// Session id used for clarification context
        #[arg(long, default_value = "repl")]
        session: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = App::new(config, &cli.role, &cli.grants)?;

    match cli.cmd {
        Command::Actions { json } => commands::actions::run(&app, json)?,
        Command::Describe { action_id } => commands::describe::run(&app, &action_id)?,
        Command::Interpret { text, execute } => {
            commands::interpret::run(&app, &text.join(" "), execute).await?
        }
        Command::Exec { action_id, params } => commands::exec::run(&app, &action_id, &params).await?,
        Command::Repl { session } => commands::repl::run(app, &session).await?,
    }

    Ok(())
}
