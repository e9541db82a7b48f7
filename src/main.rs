//! bbx - canonical document converter

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use bbx::bbx::DocumentStats;
use bbx::parse::SourceFormat;
use bbx::{ConversionConfig, ConversionContext, Validator};

#[derive(Parser)]
#[command(name = "bbx")]
#[command(version, about = "Normalize NIMAS and EPUB documents into BBX", long_about = None)]
#[command(after_help = "EXAMPLES:
    bbx convert book.xml              Convert to book.bbx
    bbx convert book.epub -o out.bbx  Convert an EPUB
    bbx upgrade old.bbx               Upgrade in place to the current format
    bbx batch *.xml --out-dir out     Convert many documents in parallel
    bbx info book.bbx --json          Show document statistics")]
struct Cli {
    /// JSON conversion config
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fail on unmapped elements and unhandled fixer input
    #[arg(long, global = true)]
    strict: bool,

    /// Validate every produced document
    #[arg(long, global = true)]
    validate: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a NIMAS or EPUB source document
    Convert {
        input: PathBuf,

        /// Output file (defaults to INPUT with a .bbx extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upgrade a canonical document to the current format version
    Upgrade {
        file: PathBuf,

        /// Output file (defaults to rewriting FILE)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert several documents in parallel
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,

        /// Worker threads (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Show statistics for a document
    Info {
        file: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a canonical document against the format rules
    Validate { file: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: {e}");
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> bbx::Result<ExitCode> {
    let ctx = load_context(cli.config.as_deref(), cli.strict, cli.validate)?;
    match cli.command {
        Commands::Convert { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("bbx"));
            let conversion = bbx::convert_file(&input, &ctx)?;
            bbx::convert::write_file(&conversion.dom, &output)?;
            println!(
                "{} -> {} ({} rewrites)",
                input.display(),
                output.display(),
                conversion.report.fix.total_applied()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Upgrade { file, output } => {
            let (dom, report) = bbx::upgrade_file(&file, &ctx)?;
            let output = output.unwrap_or(file);
            bbx::convert::write_file(&dom, &output)?;
            println!(
                "{}: version {} -> {}",
                output.display(),
                report.from,
                report.to
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Batch {
            inputs,
            out_dir,
            jobs,
        } => {
            let jobs = jobs.unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, |n| n.get())
            });
            let items = bbx::convert_batch(&inputs, &out_dir, jobs, &ctx)?;
            let mut failed = 0;
            for item in &items {
                match &item.result {
                    Ok(_) => println!("ok    {}", item.output.display()),
                    Err(e) => {
                        failed += 1;
                        println!("FAIL  {}: {e}", item.input.display());
                    }
                }
            }
            println!("{}/{} converted", items.len() - failed, items.len());
            Ok(if failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Info { file, json } => show_info(&file, json).map(|()| ExitCode::SUCCESS),
        Commands::Validate { file } => validate(&file, &ctx),
    }
}

fn load_context(config: Option<&Path>, strict: bool, validate: bool) -> bbx::Result<ConversionContext> {
    let mut config = match config {
        Some(path) => ConversionConfig::load(path)?,
        None => ConversionConfig::default(),
    };
    config.strict |= strict;
    config.validate |= validate;
    ConversionContext::new(config)
}

fn show_info(path: &Path, json: bool) -> bbx::Result<()> {
    let dom = bbx::import::load(path)?;

    if bbx::bbx::document_element(&dom).is_none() {
        let format = SourceFormat::detect(&dom);
        if json {
            println!("{}", serde_json::json!({ "source_format": format }));
        } else {
            println!("File: {}", path.display());
            match format {
                Some(format) => println!("Source format: {format}"),
                None => println!("Source format: unknown"),
            }
            println!("Nodes: {}", dom.node_count());
        }
        return Ok(());
    }

    let stats = DocumentStats::collect(&dom);
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    match stats.declared_version {
        Some(v) => println!("Format version: {v} (structure: {})", stats.structural_version),
        None => println!("Format version: invalid (structure: {})", stats.structural_version),
    }
    println!("Elements: {}", stats.elements);
    for (ty, count) in &stats.by_type {
        println!("  {ty:<20} {count}");
    }
    if stats.untyped > 0 {
        println!("Untyped: {}", stats.untyped);
    }
    println!("Foreign elements: {}", stats.foreign);
    println!("Text characters: {}", stats.text_chars);
    println!("Max depth: {}", stats.max_depth);
    Ok(())
}

fn validate(path: &Path, ctx: &ConversionContext) -> bbx::Result<ExitCode> {
    let dom = bbx::dom::parse_bytes(&std::fs::read(path)?)?;
    match Validator::new(&ctx.styles).validate(&dom) {
        Ok(()) => {
            println!("{}: valid", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}: {e}", path.display());
            Ok(ExitCode::FAILURE)
        }
    }
}
