//! apk2img CLI - converts pre-extracted APK artifacts into classifier inputs.
//!
//! Usage:
//!   apk2img encode -i extracted/ -o images/
//!   apk2img vectorize --store output.csv -o images/ --vocab-out vocabulary.json
//!   apk2img align -i images/ --format json
//!
//! `encode` expects one subdirectory per sample under the input directory,
//! holding the extracted blobs by their conventional names
//! (AndroidManifest.xml, resources.arsc, classes.dex, classes.jar).

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apk2img_core::batch::{run_encode, run_vectorize, BatchProgress, EncodeConfig};
use apk2img_core::channels::{align_all, AlignConfig, CHANNEL_CATEGORIES};
use apk2img_core::raster::{RasterConfig, ResampleFilter};
use apk2img_core::report::{print_report, OutputFormat};
use apk2img_core::vector::KeywordLabeler;

#[derive(Parser)]
#[command(name = "apk2img")]
#[command(about = "APK artifact to classifier-input conversion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct RasterArgs {
    /// Output raster width in pixels
    #[arg(long, default_value = "64")]
    width: u32,

    /// Output raster height in pixels
    #[arg(long, default_value = "64")]
    height: u32,

    /// Resampling filter
    #[arg(long, default_value = "bilinear")]
    filter: ResampleFilter,
}

impl RasterArgs {
    fn to_config(&self) -> RasterConfig {
        RasterConfig {
            width: self.width,
            height: self.height,
            filter: self.filter,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Encode extracted artifact blobs into per-category grayscale rasters
    Encode {
        /// Directory of per-sample artifact subdirectories
        #[arg(short, long)]
        input: PathBuf,

        /// Directory that receives the <category>_images/ trees
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        raster: RasterArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Vectorize stored feature rows and rasterize the static-feature channel
    Vectorize {
        /// Path to the sample store CSV
        #[arg(long)]
        store: PathBuf,

        /// Directory that receives static_images/
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        raster: RasterArgs,

        /// File-name keyword marking a sample as benign (label 0)
        #[arg(long, default_value = "benign")]
        benign_keyword: String,

        /// Write the vocabulary snapshot to this path
        #[arg(long)]
        vocab_out: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Assemble five-channel samples from a raster directory tree
    Align {
        /// Root directory holding the <category>_images/ trees
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        raster: RasterArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Encode {
            input,
            output,
            raster,
            format,
        } => {
            let config = EncodeConfig {
                input_dir: input,
                output_dir: output,
                raster: raster.to_config(),
            };
            let progress = Arc::new(BatchProgress::new());
            let report = run_encode(&config, &progress)?;
            eprintln!(
                "[*] Encoded {} of {} samples",
                report.encoded_count(),
                progress.total.load(Ordering::Relaxed)
            );
            print_report(&report, format);
        }

        Command::Vectorize {
            store,
            output,
            raster,
            benign_keyword,
            vocab_out,
            format,
        } => {
            let label_rule = KeywordLabeler::new(benign_keyword);
            let progress = Arc::new(BatchProgress::new());
            let report = run_vectorize(
                &store,
                &output,
                &raster.to_config(),
                &label_rule,
                vocab_out.as_deref(),
                &progress,
            )?;
            eprintln!(
                "[*] Vectorized {} of {} rows",
                report.encoded_count(),
                progress.total.load(Ordering::Relaxed)
            );
            print_report(&report, format);
        }

        Command::Align {
            input,
            raster,
            format,
        } => {
            let config = AlignConfig {
                width: raster.width,
                height: raster.height,
                filter: raster.filter,
            };
            let batch = align_all(&input, &config)?;
            print_align(&batch, &config, format);
        }
    }

    Ok(())
}

fn print_align(
    batch: &apk2img_core::channels::AlignBatch,
    config: &AlignConfig,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Text => {
            println!("\n{}", "=".repeat(70));
            println!("ALIGNED SAMPLES ({}):", batch.samples.len());
            for sample in &batch.samples {
                println!(
                    "  [OK  ] {}  {}x{}x{}",
                    sample.identity,
                    config.height,
                    config.width,
                    CHANNEL_CATEGORIES.len()
                );
            }
            if !batch.incomplete.is_empty() {
                println!("\nINCOMPLETE ({}):", batch.incomplete.len());
                for (identity, missing) in &batch.incomplete {
                    println!("  [SKIP] {}  missing: {}", identity, missing.join(", "));
                }
            }
            if !batch.failed.is_empty() {
                println!("\nFAILED ({}):", batch.failed.len());
                for (identity, error) in &batch.failed {
                    println!("  [FAIL] {identity}  {error}");
                }
            }
            println!("{}", "=".repeat(70));
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "aligned": batch.samples.iter().map(|s| &s.identity).collect::<Vec<_>>(),
                "incomplete": batch.incomplete.iter().map(|(identity, missing)| {
                    serde_json::json!({ "identity": identity, "missing": missing })
                }).collect::<Vec<_>>(),
                "failed": batch.failed.iter().map(|(identity, error)| {
                    serde_json::json!({ "identity": identity, "error": error })
                }).collect::<Vec<_>>(),
                "shape": [config.height, config.width, CHANNEL_CATEGORIES.len()],
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
    }
}
