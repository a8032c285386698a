//! Thin command-line wrapper around the unkeyed library.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use unkeyed::{
    default_output_path, inspect, xml, ArchiveFile, ConvertOptions, KeyedArchive, Unkeyed,
};

#[derive(Parser)]
#[command(
    name = "unkeyed",
    about = "Convert NSKeyedArchiver property lists into plain property lists",
    version
)]
struct Cli {
    /// Input plist, binary or XML
    input: PathBuf,

    /// Output path; defaults to `<input>_deserialized.plist`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the resolved document as XML instead of binary
    #[arg(long)]
    xml: bool,

    /// Print the resolved document as JSON to stdout instead of writing a file
    #[arg(long, conflicts_with = "output")]
    json: bool,

    /// Print a structural report of the archive and exit
    #[arg(long)]
    inspect: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let file = ArchiveFile::open(&cli.input)
        .with_context(|| format!("cannot open {}", cli.input.display()))?;

    if cli.inspect {
        let top = Unkeyed::load_value(file.bytes())?;
        let archive = KeyedArchive::from_value(&top)?;
        let report = inspect(&archive);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let options = ConvertOptions::default();
    let conversion = Unkeyed::deserialize_slice(file.bytes(), &options)?;
    for root in &conversion.roots {
        for diagnostic in &root.diagnostics {
            eprintln!("root {}: {diagnostic}", root.name);
        }
        if let Some(error) = &root.error {
            eprintln!("root {} failed: {error}", root.name);
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&conversion.document)?);
        return Ok(());
    }

    let output = cli
        .output
        .unwrap_or_else(|| default_output_path(&cli.input));
    let bytes = if cli.xml {
        xml::write(&conversion.document).into_bytes()
    } else {
        unkeyed::encode_document(&conversion.document)?
    };
    std::fs::write(&output, bytes)
        .with_context(|| format!("cannot write {}", output.display()))?;
    println!("Wrote {}", output.display());
    if !conversion.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "off"
    } else {
        match verbose {
            0 => "unkeyed=info",
            1 => "unkeyed=debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
