use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ptrack::client::CLIENT_DEFAULT_WEIGHT;
use ptrack::commands::report::{self, Report};
use ptrack::commands::{run, serve};
use ptrack::config::{parse_task_id, TrackerConfig, SOCKET_PATH_ENV, TASK_ID_ENV};
use ptrack::progress::{QuerySubject, TaskId, DEFAULT_ROOT_TITLE, ROOT_TASK_ID};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ptrack")]
#[command(about = "Hierarchical progress tracking over a local socket", long_about = None)]
#[command(version)]
struct Cli {
    /// Path of the tracker socket
    #[arg(short, long, global = true, env = SOCKET_PATH_ENV)]
    socket: Option<PathBuf>,

    /// Task used when a command does not name one
    #[arg(long, global = true, env = TASK_ID_ENV, value_parser = parse_task_id)]
    default_task: Option<TaskId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tracker in the foreground
    Serve {
        /// Remove the socket file on shutdown
        #[arg(long)]
        cleanup: bool,

        /// Reject updates to unknown tasks instead of ignoring them
        #[arg(long)]
        strict: bool,

        /// Title of the root task
        #[arg(long, default_value = DEFAULT_ROOT_TITLE)]
        title: String,
    },

    /// Run a command under a private tracker and print its task tree
    Run {
        /// Reject updates to unknown tasks instead of ignoring them
        #[arg(long)]
        strict: bool,

        /// Title of the root task
        #[arg(long, default_value = DEFAULT_ROOT_TITLE)]
        title: String,

        /// Command to run, with its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Declare a new task and print its id
    Declare {
        /// Task title
        title: String,

        /// Parent task (defaults to the default task)
        #[arg(short, long)]
        parent: Option<TaskId>,

        /// Weight relative to sibling tasks
        #[arg(short, long, default_value_t = CLIENT_DEFAULT_WEIGHT)]
        weight: f64,
    },

    /// Report the completion fraction of a task
    Progress {
        /// Completion between 0.0 and 1.0
        progress: f64,

        /// Task to update (defaults to the default task)
        #[arg(short, long)]
        task: Option<TaskId>,

        /// Status message
        #[arg(short, long)]
        message: Option<String>,

        /// Result code (JSON or plain text)
        #[arg(short, long)]
        code: Option<String>,
    },

    /// Mark a task as done
    Done {
        /// Task to complete (defaults to the default task)
        #[arg(short, long)]
        task: Option<TaskId>,

        /// Status message
        #[arg(short, long)]
        message: Option<String>,

        /// Result code (JSON or plain text)
        #[arg(short, long)]
        code: Option<String>,
    },

    /// Print the tracker state as JSON
    Query {
        /// `progress` for root and last update, `tasks` for the whole tree
        #[arg(default_value = "progress")]
        subject: QuerySubject,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ptrack=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let default_task = cli.default_task.unwrap_or(ROOT_TASK_ID);

    let client_config = |socket: Option<PathBuf>| {
        TrackerConfig::new(socket.unwrap_or_default()).with_default_task_id(default_task)
    };

    let delivered = match cli.command {
        Commands::Serve {
            cleanup,
            strict,
            title,
        } => {
            let socket = cli
                .socket
                .context("No socket path given (use --socket or PTRACK_SOCKETPATH)")?;
            let config = TrackerConfig::new(socket)
                .with_cleanup(cleanup)
                .with_strict_updates(strict)
                .with_root_title(title);
            serve::execute(config)?;
            true
        }
        Commands::Run {
            strict,
            title,
            command,
        } => {
            let socket = cli.socket.unwrap_or_else(run::default_socket_path);
            let config = TrackerConfig::new(socket)
                .with_strict_updates(strict)
                .with_root_title(title);
            let code = run::execute(config, command)?;
            std::process::exit(code);
        }
        Commands::Declare {
            title,
            parent,
            weight,
        } => report::execute(
            &client_config(cli.socket),
            Report::Declare {
                title,
                parent,
                weight,
            },
        )?,
        Commands::Progress {
            progress,
            task,
            message,
            code,
        } => report::execute(
            &client_config(cli.socket),
            Report::Progress {
                task,
                progress,
                message,
                code,
            },
        )?,
        Commands::Done {
            task,
            message,
            code,
        } => report::execute(
            &client_config(cli.socket),
            Report::Done {
                task,
                message,
                code,
            },
        )?,
        Commands::Query { subject } => {
            report::execute(&client_config(cli.socket), Report::Query { subject })?
        }
    };

    if !delivered {
        std::process::exit(1);
    }
    Ok(())
}
