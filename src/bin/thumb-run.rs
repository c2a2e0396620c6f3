use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use thumb_rs::{assemble, Board, CpuConfig, Executable, Stop};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a Thumb program on the thumb-rs interpreter"
)]
struct Opts {
    /// Board configuration (JSON, see `CpuConfig`)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Override the configured cycle limit
    #[arg(long)]
    steps: Option<u64>,
    /// Assembly source, or a JSON image produced by `thumb-asm assemble`
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn load(path: &Path) -> Result<Executable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
        return serde_json::from_str(&text).context("parsing image");
    }
    assemble(&text).with_context(|| format!("assembling {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let cfg: CpuConfig = match &opts.config {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        )
        .context("parsing config")?,
        None => CpuConfig::default(),
    };

    let mut board = Board::new(cfg);
    board.load(load(&opts.input)?)?;

    let stop = board.run(opts.steps.unwrap_or(cfg.step_limit))?;
    if let Stop::StepLimit = stop {
        eprintln!("step limit reached; use --steps to raise it");
    }

    println!("stopped: {stop:?} after {} cycles", board.cpu.cycles);
    for (reg, value) in board.cpu.regs.snapshot() {
        println!("{:<4} {value:#010x}", reg.name());
    }
    println!("APSR {:#010x}", board.cpu.regs.apsr().value());
    Ok(())
}
