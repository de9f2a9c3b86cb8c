use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// guesthost - run record transforms and source polls in python scripts
#[derive(Parser, Debug)]
#[command(name = "guesthost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an isolated environment and print it as JSON
    Provision {
        /// Dependency specifiers to install (repeatable)
        #[arg(long = "dep", value_name = "SPEC")]
        deps: Vec<String>,

        /// Directory the environment is created under
        #[arg(long, value_name = "DIR")]
        working_dir: PathBuf,

        /// Base interpreter (default: python3 on PATH)
        #[arg(long, value_name = "PATH")]
        python: Option<PathBuf>,

        /// Environment directory name (default: venv-<uuid>)
        #[arg(long)]
        name: Option<String>,

        /// Local package directory for offline installs
        #[arg(long, value_name = "DIR")]
        offline_dir: Option<PathBuf>,

        /// Extra library search path
        #[arg(long, value_name = "DIR")]
        extra_path: Option<PathBuf>,
    },

    /// Validate an entry point against a scripts directory
    Resolve {
        /// Dotted reference, e.g. transforms.upper.apply
        #[arg(value_name = "ENTRY_POINT")]
        entry_point: String,

        #[arg(long, value_name = "DIR")]
        scripts_dir: PathBuf,
    },

    /// Build a script host and call its entry point once
    Call {
        /// Scripts directory (default: GUESTHOST_SCRIPTS_DIR)
        #[arg(long, value_name = "DIR")]
        scripts_dir: Option<PathBuf>,

        /// Entry point (default: GUESTHOST_ENTRY_POINT)
        #[arg(long)]
        entry_point: Option<String>,

        #[arg(long, value_name = "DIR")]
        working_dir: Option<PathBuf>,

        #[arg(long, value_name = "PATH")]
        python: Option<PathBuf>,

        #[arg(long, value_name = "DIR")]
        offline_dir: Option<PathBuf>,

        /// Remove the environment after the call
        #[arg(long, default_value = "false")]
        cleanup: bool,

        /// Positional arguments, each a JSON value
        #[arg(value_name = "ARGS_JSON")]
        args: Vec<String>,
    },

    /// Run a source task for a number of polls and print records as JSON lines
    Poll {
        #[arg(long, value_name = "DIR")]
        scripts_dir: Option<PathBuf>,

        #[arg(long)]
        entry_point: Option<String>,

        #[arg(long, value_name = "DIR")]
        working_dir: Option<PathBuf>,

        #[arg(long, value_name = "PATH")]
        python: Option<PathBuf>,

        /// Init callable, called once with (settings, cursor)
        #[arg(long)]
        init_method: Option<String>,

        /// Opaque JSON settings string for the init callable
        #[arg(long)]
        settings: Option<String>,

        /// Topic stamped on produced records (default: GUESTHOST_TOPIC)
        #[arg(long)]
        topic: Option<String>,

        #[arg(long)]
        task_id: Option<u32>,

        /// Starting cursor as a JSON object
        #[arg(long, value_name = "JSON")]
        cursor: Option<String>,

        /// Number of polls
        #[arg(long, default_value = "1")]
        polls: u32,
    },
}
