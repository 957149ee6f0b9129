use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug, Clone)]
#[command(name = "slotwise-server")]
#[command(version, about = "Appointment booking API with a tool-calling chat assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to bind, overrides SLOTWISE_BIND.
    #[arg(long, global = true)]
    pub bind: Option<String>,

    /// Database URL, overrides SLOTWISE_DATABASE_URL. Use `memory://` for
    /// a throwaway in-process store.
    #[arg(long, global = true)]
    pub database_url: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Apply database migrations and exit.
    Migrate,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }

    /// Apply command-line overrides on top of the environment config.
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(bind) = &self.bind {
            cfg.bind_address = bind.clone();
        }
        if let Some(url) = &self.database_url {
            cfg.database_url = url.clone();
        }
    }
}
