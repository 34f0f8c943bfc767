use clap::{Parser, Subcommand};

/// Command-line surface for the service binary.
#[derive(Parser, Debug)]
#[clap(name = "exchange-wallet-service")]
#[clap(about = "Back-office wallet custody backend", long_about = None)]
pub struct Args {
    /// Path to the config file (without extension; resolved by the `config` crate)
    #[clap(long, default_value = "config")]
    pub config: String,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the build version and exits.
    Version,
    /// Runs pending SQL migrations against the configured database and exits.
    Migrate {
        #[clap(long)]
        migrations_dir: Option<String>,
    },
    /// Runs the gRPC server and the worker pipeline (default when no subcommand given).
    Rpc,
}
