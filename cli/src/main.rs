mod batch;
mod cache;
mod ffmpeg;
mod options;
mod process_error;
mod processor;
mod watch;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use options::ProcessOptions;
use processor::Processor;

/// Unlock your encrypted music files.
#[derive(Parser)]
#[command(name = "um", about, arg_required_else_help = false)]
struct Args {
    /// Path to input file or directory
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path to output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to the exported QMC key vault
    #[arg(long = "qmc-mmkv", alias = "db")]
    qmc_mmkv: Option<PathBuf>,

    /// Vault password (accepted for compatibility; exported vaults are
    /// already decrypted)
    #[arg(long = "qmc-mmkv-key", alias = "key")]
    qmc_mmkv_key: Option<String>,

    /// Path to the kgg key database (Kugou v11)
    #[arg(long = "kgg-db")]
    kgg_db: Option<PathBuf>,

    /// Remove the source file after successful conversion
    #[arg(long = "remove-source", alias = "rs")]
    remove_source: bool,

    /// Skip no-op decoders for already-standard audio
    #[arg(
        long = "skip-noop",
        short = 'n',
        default_value_t = true,
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    skip_noop: bool,

    /// Verbose logging
    #[arg(long, short = 'V')]
    verbose: bool,

    /// Update metadata and album art in the output
    #[arg(long = "update-metadata")]
    update_metadata: bool,

    /// Overwrite existing output files without asking
    #[arg(long)]
    overwrite: bool,

    /// Watch the input directory and process new files
    #[arg(long)]
    watch: bool,

    /// Batch processing mode: read a JSON request from stdin
    #[arg(long)]
    batch: bool,

    /// Output filename format: auto, title-artist, artist-title, original
    #[arg(long = "naming-format", default_value = "auto")]
    naming_format: String,

    /// Fully zero every pooled buffer on release, trading throughput for
    /// not keeping key material around
    #[arg(long = "secure-buffers")]
    secure_buffers: bool,

    /// Show supported file extensions and exit
    #[arg(long = "supported-ext")]
    supported_ext: bool,

    /// Input path as a bare argument
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);

    if let Err(e) = run(args) {
        tracing::error!(error = %e, "run failed");
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn install_stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        tracing::warn!(error = %e, "failed to install interrupt handler");
    }
    stop
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.supported_ext {
        print_supported_extensions();
        return Ok(());
    }

    if args.secure_buffers {
        decoder::internal::pool::BufferPool::global().set_secure_mode(true);
    }

    let naming_format = args
        .naming_format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let options = ProcessOptions {
        remove_source: args.remove_source,
        update_metadata: args.update_metadata,
        overwrite_output: args.overwrite,
        skip_noop: args.skip_noop,
        kgg_db_path: args.kgg_db.clone(),
        naming_format,
    };

    if let Some(vault_path) = &args.qmc_mmkv {
        let count = decoder::algo::qmc::vault::load(vault_path)
            .with_context(|| format!("load qmc vault {}", vault_path.display()))?;
        tracing::info!(entries = count, "qmc key vault loaded");
        if args.qmc_mmkv_key.is_some() {
            tracing::debug!("vault password ignored: exported vaults are not encrypted");
        }
    }

    let stop = install_stop_flag();

    if args.batch {
        return batch::run_batch_mode(stop);
    }

    let cwd = std::env::current_dir()?;
    let input = args
        .input
        .or(args.path)
        .unwrap_or(cwd)
        .canonicalize()
        .context("resolve input path")?;
    let input_stat = std::fs::metadata(&input)
        .with_context(|| format!("stat input {}", input.display()))?;

    let input_dir = if input_stat.is_dir() {
        input.clone()
    } else {
        input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    let output_dir = match args.output {
        Some(out) => out,
        None => input_dir.clone(),
    };
    match std::fs::metadata(&output_dir) {
        Ok(stat) if !stat.is_dir() => bail!("output should be a writable directory"),
        Ok(_) => {}
        Err(_) => {
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("create output dir {}", output_dir.display()))?;
        }
    }

    let processor = Processor {
        input_dir: input_dir.clone(),
        output_dir,
        options,
    };

    if input_stat.is_dir() {
        if args.watch {
            watch::watch_dir(&processor, &input, stop)
        } else {
            processor.process_dir(&input)
        }
    } else {
        processor.process_file(&input)?;
        Ok(())
    }
}

fn print_supported_extensions() {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for factory in decoder::algo::registry() {
        *counts.entry(factory.suffix).or_default() += 1;
    }
    for (ext, count) in counts {
        println!("{}: {}", ext, count);
    }
}
