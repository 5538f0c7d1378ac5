use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vmsbackup::block::DEFAULT_BLOCK_SIZE;
use vmsbackup::saveset::{process, ExtractOptions, MediumFormat};
use vmsbackup::select::{NameOptions, Selection};
use vmsbackup::session::SessionOptions;

#[derive(Parser)]
#[command(name = "vmsbackup", version, about = "Read VMS BACKUP savesets from tape images and disk files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the contents of a saveset
    List {
        #[command(flatten)]
        common: Common,
        /// Emit JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Extract files from a saveset
    Extract {
        #[command(flatten)]
        common: Common,
        /// Directory to extract into
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Also print the listing while extracting
        #[arg(short = 't', long)]
        list: bool,
    },
}

#[derive(Args)]
struct Common {
    /// Saveset: a disk image, or a SIMH .tap tape image
    #[arg(short = 'f', long = "file")]
    file: PathBuf,
    /// Block size for disk savesets
    #[arg(short = 'b', long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Only process the saveset with this number (tape only)
    #[arg(short = 's', long)]
    saveset: Option<u32>,
    /// Keep directory structure
    #[arg(short = 'd', long = "directories")]
    directories: bool,
    /// Keep the ;version suffix, as :version
    #[arg(short = 'c', long = "keep-version")]
    keep_version: bool,
    /// Copy record framing through untranslated
    #[arg(short = 'B', long)]
    binary: bool,
    /// Full listing
    #[arg(short = 'F', long)]
    full: bool,
    #[arg(short = 'v', long)]
    verbose: bool,
    #[arg(long, value_enum, default_value_t = MediumFormat::Auto)]
    format: MediumFormat,
    /// Debug diagnostics on stderr
    #[arg(long)]
    debug: bool,
    /// Only files matching one of these wildcard patterns
    patterns: Vec<String>,
}

impl Common {
    fn options(&self) -> Result<ExtractOptions, regex::Error> {
        Ok(ExtractOptions {
            session: SessionOptions {
                block_size: self.block_size,
                saveset:    self.saveset,
                binary:     self.binary,
                selection:  Selection::new(&self.patterns)?,
                names:      NameOptions {
                    keep_directories: self.directories,
                    keep_version:     self.keep_version,
                },
            },
            full:    self.full,
            verbose: self.verbose,
            format:  self.format,
            ..ExtractOptions::default()
        })
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("vmsbackup=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (common, opts) = match &cli.command {
        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { common, json } => {
            let opts = ExtractOptions { list: true, json: *json, ..common.options()? };
            (common, opts)
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { common, output_dir, list } => {
            let opts = ExtractOptions {
                extract:    true,
                list:       *list,
                output_dir: output_dir.clone(),
                ..common.options()?
            };
            (common, opts)
        }
    };
    init_logging(common.debug);

    let report = process(&common.file, &opts, std::io::stdout().lock())?;
    if report.bad_blocks > 0 || report.aborted > 0 {
        tracing::warn!(
            bad_blocks = report.bad_blocks,
            resyncs = report.resyncs.len(),
            aborted = report.aborted,
            "saveset read with errors",
        );
    }
    Ok(())
}
