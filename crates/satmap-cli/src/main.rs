//! satmap command-line interface
//!
//! Maps OpenQASM 2 circuits onto restricted-connectivity devices with the
//! MaxSAT mapper from `satmap-compile`.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::EnvFilter;

use satmap_compile::{Layering, RoutingMode};

mod commands;

use commands::{encode, map};

/// satmap - optimal qubit mapping and routing with MaxSAT
#[derive(Parser)]
#[command(name = "satmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a circuit onto a device
    Map {
        /// Input circuit (OpenQASM 2)
        input: String,

        #[command(flatten)]
        target: TargetArgs,

        /// External MaxSAT solver, or `builtin`
        #[arg(long, default_value = "builtin")]
        oracle: String,

        /// External router, or `builtin`
        #[arg(long, default_value = "builtin")]
        router: String,

        /// Output file (defaults to `<input>_mapped.qasm`)
        #[arg(short, long)]
        output: Option<String>,

        /// Write a JSON report of layouts and chunk statistics
        #[arg(long)]
        report: Option<String>,
    },

    /// Write the single-chunk MaxSAT instance of a circuit as WCNF
    Encode {
        /// Input circuit (OpenQASM 2)
        input: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Device and mapper settings shared by all commands.
#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Device: linear:N, ring:N, grid:N, grid:RxC, star:N, full:N, or a JSON file
    #[arg(short, long)]
    topology: String,

    /// JSON file of per-edge two-qubit error rates
    #[arg(long)]
    calibration: Option<String>,

    /// YAML or JSON mapper configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Target number of interactions per chunk
    #[arg(long)]
    slice_size: Option<usize>,

    /// Swap steps per layer
    #[arg(long)]
    swaps: Option<u32>,

    /// Total time budget in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// How swaps are obtained
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// How interactions are grouped into layers
    #[arg(long, value_enum)]
    layering: Option<LayeringArg>,

    /// Require the final layout to equal the initial one
    #[arg(long)]
    cyclic: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    Routed,
    Weighted,
    Bounded,
    Deferred,
}

impl From<ModeArg> for RoutingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Routed => RoutingMode::Routed,
            ModeArg::Weighted => RoutingMode::Weighted,
            ModeArg::Bounded => RoutingMode::BoundedDisplacement,
            ModeArg::Deferred => RoutingMode::Deferred,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LayeringArg {
    Trivial,
    Conflict,
    Dependency,
}

impl From<LayeringArg> for Layering {
    fn from(layering: LayeringArg) -> Self {
        match layering {
            LayeringArg::Trivial => Layering::Trivial,
            LayeringArg::Conflict => Layering::Conflict,
            LayeringArg::Dependency => Layering::Dependency,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Map {
            input,
            target,
            oracle,
            router,
            output,
            report,
        } => {
            // Dropping the run future kills any running oracle process.
            tokio::select! {
                res = map::execute(
                    &input,
                    &target,
                    &oracle,
                    &router,
                    output.as_deref(),
                    report.as_deref(),
                ) => res,
                _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("Interrupted")),
            }
        }

        Commands::Encode {
            input,
            target,
            output,
        } => encode::execute(&input, &target, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
