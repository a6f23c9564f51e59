use anyhow::Context;
use bringup_config::{PlatformDescriptor, VariantKind};
use bringup_core::metrics::PerformanceMetrics;
use bringup_core::{Machine, StepOutcome};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod scenario;

pub const EXIT_PASS: u8 = 0;
pub const EXIT_ASSERT_FAIL: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_RUNTIME_ERROR: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bringup FPGA platform simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a program on a simulated board
    Run(RunArgs),
    /// Run a scenario script and evaluate its assertions
    Test(scenario::TestArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Built-in board to run (hello, echo-int, cpu-irq, timer-irq, double-buffer, fill-rect)
    #[arg(short, long, conflicts_with = "platform")]
    variant: Option<VariantKind>,

    /// Path to a platform descriptor (YAML)
    #[arg(short, long)]
    platform: Option<PathBuf>,

    /// Bytes to present on the character port
    #[arg(short, long)]
    input: Option<String>,

    /// Enable per-access tracing
    #[arg(short, long)]
    trace: bool,

    /// Maximum number of main-loop iterations (default: 20000)
    #[arg(long, default_value = "20000")]
    max_steps: u64,

    /// Raise the software interrupt line every N iterations
    #[arg(long)]
    software_irq_every: Option<u64>,

    /// Write a JSON snapshot of the machine on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Do not echo character port output to stdout
    #[arg(long)]
    no_uart_stdout: bool,
}

fn init_tracing(trace: bool) {
    let level = if trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Test(args) => {
            init_tracing(args.trace);
            ExitCode::from(scenario::run(args))
        }
        Command::Run(args) => {
            init_tracing(args.trace);
            ExitCode::from(run_interactive(args))
        }
    }
}

pub(crate) fn load_descriptor(
    variant: Option<VariantKind>,
    platform: Option<&Path>,
) -> anyhow::Result<PlatformDescriptor> {
    match (platform, variant) {
        (Some(path), _) => {
            info!("Loading platform descriptor: {:?}", path);
            PlatformDescriptor::from_file(path)
        }
        (None, Some(variant)) => {
            info!("Using built-in board for '{}'", variant);
            Ok(PlatformDescriptor::builtin(variant))
        }
        (None, None) => anyhow::bail!("Either --variant or --platform is required"),
    }
}

fn run_interactive(args: RunArgs) -> u8 {
    info!("Starting Bringup Simulator");

    let mut desc = match load_descriptor(args.variant, args.platform.as_deref()) {
        Ok(desc) => desc,
        Err(e) => {
            error!("{:#}", e);
            return EXIT_CONFIG_ERROR;
        }
    };
    if let Some(input) = args.input {
        desc.input = input;
    }

    let mut machine = match bringup_core::build_machine(&desc, !args.no_uart_stdout) {
        Ok(machine) => machine,
        Err(e) => {
            error!("Failed to assemble the simulated board: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let metrics = Arc::new(PerformanceMetrics::new());
    machine.observers.push(metrics.clone());

    info!("Running for up to {} steps...", args.max_steps);
    machine.boot();
    for step in 0..args.max_steps {
        if let Some(every) = args.software_irq_every {
            if every > 0 && step % every == 0 {
                machine.raise_software_irq();
            }
        }
        if let StepOutcome::Exited(code) = machine.step() {
            info!("Program exited with code {} after {} steps", code, step + 1);
            break;
        }
    }

    info!(
        "Simulation finished: {} steps, {} interrupts ({} rejected), {} bus faults",
        metrics.get_steps(),
        metrics.get_interrupts(),
        metrics.get_rejected(),
        machine.bus.fault_count()
    );
    info!(
        "{} bus accesses, {:.0} steps/s",
        metrics.get_accesses(),
        metrics.get_sps()
    );

    if let Some(path) = args.snapshot {
        if let Err(e) = write_snapshot(&machine, &path) {
            error!("{:#}", e);
            return EXIT_RUNTIME_ERROR;
        }
        info!("Snapshot written to {:?}", path);
    }

    EXIT_PASS
}

fn write_snapshot(machine: &Machine, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&machine.snapshot())?;
    std::fs::write(path, json).with_context(|| format!("Failed to write snapshot to {:?}", path))
}
