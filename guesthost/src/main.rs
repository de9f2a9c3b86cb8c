mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use guesthost_core::config::load_dotenv;
use guesthost_core::observability::init_tracing;

fn main() -> Result<()> {
    load_dotenv();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Provision {
            deps,
            working_dir,
            python,
            name,
            offline_dir,
            extra_path,
        } => commands::env::cmd_provision(&deps, &working_dir, python, name, offline_dir, extra_path),
        Commands::Resolve {
            entry_point,
            scripts_dir,
        } => commands::env::cmd_resolve(&entry_point, &scripts_dir),
        Commands::Call {
            scripts_dir,
            entry_point,
            working_dir,
            python,
            offline_dir,
            cleanup,
            args,
        } => {
            let props = commands::prop_map([
                (commands::props::SCRIPTS_DIR, scripts_dir.map(commands::path_str)),
                (commands::props::ENTRY_POINT, entry_point),
                (commands::props::WORKING_DIR, working_dir.map(commands::path_str)),
                (commands::props::PYTHON_PATH, python.map(commands::path_str)),
                (commands::props::OFFLINE_INSTALL_DIR, offline_dir.map(commands::path_str)),
            ]);
            commands::script::cmd_call(&props, &args, cleanup)
        }
        Commands::Poll {
            scripts_dir,
            entry_point,
            working_dir,
            python,
            init_method,
            settings,
            topic,
            task_id,
            cursor,
            polls,
        } => {
            let props = commands::prop_map([
                (commands::props::SCRIPTS_DIR, scripts_dir.map(commands::path_str)),
                (commands::props::ENTRY_POINT, entry_point),
                (commands::props::WORKING_DIR, working_dir.map(commands::path_str)),
                (commands::props::PYTHON_PATH, python.map(commands::path_str)),
                (commands::props::INIT_METHOD, init_method),
                (commands::props::PRIVATE_SETTINGS, settings),
                (commands::props::TOPIC, topic),
                (commands::props::TASK_ID, task_id.map(|t| t.to_string())),
            ]);
            commands::script::cmd_poll(&props, cursor.as_deref(), polls)
        }
    }
}
