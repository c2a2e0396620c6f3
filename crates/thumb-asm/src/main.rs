use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use thumb_rs::instructions::InstructionSet;
use thumb_rs::Halfword;

mod model;
use model::{load_executable, read_u16, write_executable};

#[derive(Parser, Debug)]
#[command(author, version, about = "Thumb assembler and image inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble and link a source file into a JSON image
    Assemble {
        /// Input assembly file
        #[arg(value_name = "SOURCE")]
        input: PathBuf,
        /// Output image (default: input with a .json extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// List the load segments of a source file or image
    Sections {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
    /// Print the address to source line map, with opcodes
    Map {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        /// Source text to quote next to each address
        #[arg(long, value_name = "SOURCE")]
        source: Option<PathBuf>,
    },
    /// List resolved symbols
    Symbols {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Assemble { input, output } => {
            let exe = load_executable(&input)?;
            let output = output.unwrap_or_else(|| input.with_extension("json"));
            write_executable(&output, &exe)?;
            println!("{} bytes -> {}", exe.content.len(), output.display());
        }
        Command::Sections { input } => {
            let exe = load_executable(&input)?;
            println!("{:<6} {:<10} {:<10} {:<8} {:<8}", "kind", "start", "end", "offset", "size");
            for s in &exe.segments {
                let start = s.physical_address;
                let end = start + s.size as u32;
                println!(
                    "{:<6} {start:#010x} {end:#010x} {:<8} {:<8}",
                    format!("{:?}", s.kind),
                    s.file_offset,
                    s.size
                );
            }
        }
        Command::Map { input, source } => {
            let exe = load_executable(&input)?;
            let source_path = source.or_else(|| (!model::is_image(&input)).then(|| input.clone()));
            let lines: Vec<String> = match source_path {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?
                    .lines()
                    .map(str::to_string)
                    .collect(),
                None => Vec::new(),
            };
            let set = InstructionSet::thumb();
            for (&addr, &line) in &exe.source_map {
                let opcode = read_u16(&exe, addr);
                let name = opcode
                    .and_then(|op| set.lookup(&[Halfword::new(op)]))
                    .map_or("", |i| i.name());
                let text = lines.get(line).map_or("", |l| l.trim());
                match opcode {
                    Some(op) => println!("{addr:#010x}  {op:04x}  {name:<6} {:>5}: {text}", line + 1),
                    None => println!("{addr:#010x}  ----  {name:<6} {:>5}: {text}", line + 1),
                }
            }
        }
        Command::Symbols { input } => {
            let exe = load_executable(&input)?;
            for (name, value) in &exe.symbols {
                println!("{value:#010x}  {name}");
            }
        }
    }
    Ok(())
}
