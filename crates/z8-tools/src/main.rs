use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::path::{Path, PathBuf};

use z8_codec::{classify_access, Reassembler, RegisterSnapshot};
use z8_tools::model::{load_raw_bin, Image};

#[derive(Parser, Debug)]
#[command(author, version, about = "Z8 / U88x reassembler CLI", long_about=None)]
struct Cli {
    /// Load address of the binary (hex with % or 0x, or decimal)
    #[arg(long, default_value = "0")]
    base: String,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Input binary path
    #[arg(value_name = "BINFILE")]
    input: PathBuf,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Subcommand
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listing with addresses and bytes
    List {
        /// First address (default: start of image)
        start: Option<String>,
        /// Last address, inclusive (default: end of image)
        end: Option<String>,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Assembler source with generated labels
    Source {
        start: Option<String>,
        end: Option<String>,
        /// Prefix of the generated labels
        #[arg(long, default_value = "M")]
        prefix: String,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Registers read and written by the instruction at PC
    Access {
        /// Address of the instruction
        pc: String,
        /// Raw 256-byte register file dump
        #[arg(long, value_name = "FILE")]
        regs: Option<PathBuf>,
        /// Set a register before classifying, e.g. `--set %FD=%10`
        #[arg(long = "set", value_name = "REG=VAL")]
        set: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// `%8000`, `0x8000`, `8000H` or decimal.
fn parse_u16(s: &str) -> Result<u16> {
    let s = s.trim();
    let hex = s
        .strip_prefix('%')
        .or_else(|| s.strip_prefix("0x"))
        .or_else(|| s.strip_prefix("0X"))
        .or_else(|| s.strip_suffix(['h', 'H']));
    let v = match hex {
        Some(h) => u16::from_str_radix(h, 16),
        None => s.parse::<u16>(),
    };
    v.with_context(|| format!("invalid number '{s}'"))
}

fn range(img: &Image, start: Option<&str>, end: Option<&str>) -> Result<(u16, u16)> {
    let (lo, hi) = img.span().context("image is empty")?;
    let start = start.map(parse_u16).transpose()?.unwrap_or(lo);
    let end = end.map(parse_u16).transpose()?.unwrap_or(hi);
    anyhow::ensure!(end >= start, "end must be >= start");
    Ok((start, end))
}

fn load_regs(path: Option<&Path>, set: &[String]) -> Result<RegisterSnapshot> {
    let mut regs = RegisterSnapshot::new();
    if let Some(path) = path {
        let dump = std::fs::read(path)?;
        anyhow::ensure!(dump.len() == 256, "register dump must be 256 bytes, got {}", dump.len());
        regs.regs.copy_from_slice(&dump);
    }
    for kv in set {
        let (reg, val) = kv.split_once('=').with_context(|| format!("expected REG=VAL, got '{kv}'"))?;
        let reg = u8::try_from(parse_u16(reg)?).context("register number out of range")?;
        let val = u8::try_from(parse_u16(val)?).context("register value out of range")?;
        regs = regs.with(reg, val);
    }
    Ok(regs)
}

fn emit(text: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn fmt_regs(set: &std::collections::BTreeSet<u8>) -> String {
    set.iter().map(|r| format!("%{r:02X}")).collect::<Vec<_>>().join(" ")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base = parse_u16(&cli.base)?;
    let img = load_raw_bin(&cli.input, base, cli.skip, cli.len)?;
    let reass = Reassembler::new(&img);

    match cli.cmd {
        Command::List { start, end, out } => {
            let (start, end) = range(&img, start.as_deref(), end.as_deref())?;
            emit(&reass.reassemble(start, end), out.as_deref())?;
        }
        Command::Source { start, end, prefix, out } => {
            let (start, end) = range(&img, start.as_deref(), end.as_deref())?;
            emit(&reass.reassemble_to_source(start, end, &prefix)?, out.as_deref())?;
        }
        Command::Access { pc, regs, set, format } => {
            let pc = parse_u16(&pc)?;
            let regs = load_regs(regs.as_deref(), &set)?;
            let access = classify_access(&img, &regs, pc);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&access)?),
                OutputFormat::Text => {
                    let (line, _) = reass.reassemble_one(pc);
                    println!("{line}");
                    println!("  reads : {}", fmt_regs(&access.reads));
                    println!("  writes: {}", fmt_regs(&access.writes));
                }
            }
        }
    }

    Ok(())
}
