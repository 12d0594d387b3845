use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use charge_ledger::{AccountLedger, ChaincodeError, FileStore};

#[derive(Parser)]
#[command(name = "charge-ledger")]
#[command(about = "Run EMP → CPO payment chaincode against a local state file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// State file standing in for the ledger's key-value store
    #[arg(
        short,
        long,
        global = true,
        env = "CHARGE_LEDGER_STATE",
        default_value = "ledger-state.json"
    )]
    state: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Write payer and payee accounts with initial balances (euro cents)
    Init {
        payer: String,
        #[arg(allow_hyphen_values = true)]
        payer_balance: String,
        payee: String,
        #[arg(allow_hyphen_values = true)]
        payee_balance: String,
    },

    /// Call a chaincode function: transfer | invoke | delete | query | init
    Invoke {
        function: String,
        /// Function arguments, e.g. `<payer> <payee> <amount>` or one JSON transaction
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the raw account record stored under a key
    Query { key: String },
}

fn exit_code(err: &ChaincodeError) -> u8 {
    match err {
        ChaincodeError::Argument(_) => 2,
        ChaincodeError::NotFound(_) => 3,
        ChaincodeError::Store(_) => 4,
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let store = FileStore::open(&cli.state)
        .with_context(|| format!("opening state file {}", cli.state.display()))?;
    let mut ledger = AccountLedger::new(store);

    let outcome = match cli.command {
        Command::Init {
            payer,
            payer_balance,
            payee,
            payee_balance,
        } => ledger.init(&[payer, payer_balance, payee, payee_balance]),
        Command::Invoke { function, args } => ledger.invoke(&function, &args),
        Command::Query { key } => ledger.query(&key),
    };

    match outcome {
        Ok(payload) => {
            if !payload.is_empty() {
                let mut out = io::stdout().lock();
                out.write_all(&payload)?;
                out.write_all(b"\n")?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(%err, "invocation failed");
            let mut out = io::stderr().lock();
            out.write_all(&err.payload())?;
            out.write_all(b"\n")?;
            Ok(ExitCode::from(exit_code(&err)))
        }
    }
}
