use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};

use gradepea::AppConfig;
use gradepea::canvas::{BinaryFile, CanvasWidget, RasterCanvas, SceneBuilder, SceneUpdate};
use gradepea::domain::{GradingRecord, OverlayPrimitive, parse_grading_records};
use gradepea::ingest::{ImageIngestPipeline, LoadedImage, LocalFileFetcher};
use gradepea::layout::{OverlayBuilder, OverlayStyle, TextFlow};
use gradepea::session::export_file_name;

#[derive(Parser, Debug)]
#[command(
    name = "gradepea",
    version,
    about = "Render grading overlays and text layout from local files"
)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Config file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Draw the grading overlay over its image and write a PNG
    Overlay {
        /// Grading JSON; relative image paths resolve against its directory
        #[arg(long)]
        grading: PathBuf,
        #[arg(long, default_value_t = 0)]
        record: usize,
        /// Output PNG (default: <grade prefix>-<millis>.png)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the overlay primitives of one record as JSON
    Layout {
        #[arg(long)]
        grading: PathBuf,
        #[arg(long, default_value_t = 0)]
        record: usize,
    },
    /// Wrap text the way analysis boxes do
    Wrap {
        text: String,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        font: Option<f64>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path),
        None => Ok(AppConfig::load()),
    }
}

fn read_record(path: &Path, index: usize) -> Result<GradingRecord> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grading file: {}", path.display()))?;
    let mut records = parse_grading_records(&text)
        .with_context(|| format!("Failed to parse grading file: {}", path.display()))?;
    if index >= records.len() {
        bail!(
            "Record {} out of range, {} has {} records",
            index,
            path.display(),
            records.len()
        );
    }
    Ok(records.swap_remove(index))
}

/// Load the record's image and build its overlay
async fn build_overlay(
    config: &AppConfig,
    grading: &Path,
    record: &GradingRecord,
) -> Result<(LoadedImage, Vec<OverlayPrimitive>)> {
    let root = grading.parent().map(Path::to_path_buf);
    let images = ImageIngestPipeline::new(
        LocalFileFetcher::new(root),
        config.image.clone(),
        config.fetch.retry_policy(),
    );
    let loaded = images
        .load_for_display(&record.image_url)
        .await
        .with_context(|| format!("Failed to load image {}", record.image_url))?;
    let primitives = OverlayBuilder::new(OverlayStyle::from(&config.text))
        .build(&record.questions, &loaded.transform);
    log::info!(
        "Built {} primitives over a {}x{} display",
        primitives.len(),
        loaded.transform.display_width,
        loaded.transform.display_height
    );
    Ok((loaded, primitives))
}

async fn run_overlay(
    config: &AppConfig,
    grading: &Path,
    index: usize,
    out: Option<PathBuf>,
) -> Result<()> {
    let record = read_record(grading, index)?;
    let (loaded, primitives) = build_overlay(config, grading, &record).await?;

    let canvas = RasterCanvas::new();
    let file_id = format!("grade_{index}");
    let created = chrono::Utc::now().timestamp_millis();
    canvas.add_files(vec![BinaryFile {
        id: file_id.clone(),
        mime_type: loaded.image.mime_type,
        bytes: loaded.image.bytes,
        created,
    }]);
    let elements =
        SceneBuilder::new().overlay_scene(Some((&file_id, &loaded.transform)), &primitives);
    canvas.update_scene(SceneUpdate::elements(elements));

    let png = canvas.render_png().context("Failed to render overlay")?;
    let out = out.unwrap_or_else(|| {
        PathBuf::from(export_file_name(&config.export.grade_prefix, created))
    });
    std::fs::write(&out, &png).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

async fn run_layout(config: &AppConfig, grading: &Path, index: usize) -> Result<()> {
    let record = read_record(grading, index)?;
    let (_, primitives) = build_overlay(config, grading, &record).await?;
    println!("{}", serde_json::to_string_pretty(&primitives)?);
    Ok(())
}

fn run_wrap(config: &AppConfig, text: &str, width: Option<f64>, font: Option<f64>) {
    let flow = TextFlow::new(
        width.unwrap_or(config.text.analysis_max_width),
        font.unwrap_or(config.text.analysis_font_size),
    )
    .with_line_height(config.text.line_height_ratio);
    let lines = flow.wrap(text);
    for line in &lines {
        println!("{line}");
    }
    println!("height: {}", flow.height_of(text, &lines));
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    match cli.command {
        Commands::Overlay { grading, record, out } => {
            runtime.block_on(run_overlay(&config, &grading, record, out))
        }
        Commands::Layout { grading, record } => {
            runtime.block_on(run_layout(&config, &grading, record))
        }
        Commands::Wrap { text, width, font } => {
            run_wrap(&config, &text, width, font);
            Ok(())
        }
    }
}
