use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use z8_codec::{assemble, AsmOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Two-pass assembler for Z8 / U88x")]
struct Opts {
    /// Assembler source file
    #[arg(short, long)]
    input: PathBuf,
    /// Output binary (written only if there are no errors)
    #[arg(short, long)]
    output: PathBuf,
    /// Target CPU (U883, Z8601, Z86E04, ...); overrides the options file
    #[arg(long)]
    cpu: Option<String>,
    /// Assembler options as JSON
    #[arg(long, value_name = "FILE")]
    options: Option<PathBuf>,
    /// Print the label table after assembly
    #[arg(long)]
    list_labels: bool,
    /// Print the full result as JSON instead of plain diagnostics
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let options = match &opts.options {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            AsmOptions::from_json(&text)?
        }
        None => AsmOptions::default(),
    };
    let source = std::fs::read_to_string(&opts.input).with_context(|| format!("reading {}", opts.input.display()))?;

    let result = assemble(&source, opts.cpu.as_deref(), &options)?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for d in &result.diagnostics {
            eprintln!("{d}");
        }
        if opts.list_labels {
            if result.symbols.is_empty() {
                println!("label table is empty");
            }
            for (name, value) in &result.symbols {
                println!("    {value:04X}  {name}");
            }
        }
    }

    let Some(bytes) = &result.bytes else {
        bail!("{} error(s), no output written", result.error_count());
    };
    std::fs::write(&opts.output, bytes).with_context(|| format!("writing {}", opts.output.display()))?;
    Ok(())
}
