use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trimline_core::types::{PositionInput, TimeUs, TrimEdge, TrimRange};
use trimline_core::{EditorSettings, TimelineSelection};
use trimline_preview::mpv::MpvPlayer;
use trimline_preview::EditorSession;
use trimline_render::export::{self, ExportRequest, RenderProgress};
use trimline_render::probe::probe_media;
use trimline_render::stickers::StickerCatalog;
use trimline_render::ExportSettings;

#[derive(Parser, Debug)]
#[command(name = "trimline")]
#[command(author, version, about = "Trim a video and stamp an animated sticker on it", long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Editor settings JSON file
    #[arg(long)]
    editor_settings: Option<PathBuf>,

    /// Export settings JSON file
    #[arg(long)]
    export_settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show duration and size of a video
    Probe { input: PathBuf },

    /// List the stickers in a directory
    Stickers {
        #[arg(long, default_value = "stickers")]
        dir: PathBuf,
    },

    /// Export the trimmed video, optionally with a sticker
    Export {
        input: PathBuf,
        /// Trim start in seconds
        #[arg(long)]
        start: Option<f64>,
        /// Trim end in seconds
        #[arg(long)]
        end: Option<f64>,
        /// Sticker name from the sticker directory
        #[arg(long)]
        sticker: Option<String>,
        #[arg(long, default_value = "stickers")]
        stickers_dir: PathBuf,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Loop the trimmed range in an mpv window
    Preview {
        input: PathBuf,
        #[arg(long)]
        start: Option<f64>,
        #[arg(long)]
        end: Option<f64>,
        /// Stop after this many seconds (runs until mpv is closed otherwise)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .init();

    let editor_settings = match &cli.editor_settings {
        Some(path) => EditorSettings::load_from_file(path)
            .with_context(|| format!("loading editor settings from {}", path.display()))?,
        None => EditorSettings::default(),
    };
    let export_settings = match &cli.export_settings {
        Some(path) => ExportSettings::load_from_file(path)
            .with_context(|| format!("loading export settings from {}", path.display()))?,
        None => ExportSettings::default(),
    };

    match cli.command {
        Commands::Probe { input } => probe(&input, &editor_settings),
        Commands::Stickers { dir } => {
            for name in StickerCatalog::new(dir).list()? {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Export {
            input,
            start,
            end,
            sticker,
            stickers_dir,
            output,
        } => {
            let sticker = sticker
                .map(|name| StickerCatalog::new(stickers_dir).resolve(&name))
                .transpose()?;
            run_export(
                &input,
                TrimRequest { start, end },
                sticker,
                output,
                editor_settings,
                &export_settings,
            )
            .await
        }
        Commands::Preview {
            input,
            start,
            end,
            seconds,
        } => run_preview(&input, TrimRequest { start, end }, seconds, editor_settings).await,
    }
}

/// Trim bounds given on the command line, in seconds.
#[derive(Debug, Clone, Copy, Default)]
struct TrimRequest {
    start: Option<f64>,
    end: Option<f64>,
}

impl TrimRequest {
    /// The requested edges as drags, end first so a start past the old end
    /// is clamped against the requested end rather than the media end.
    fn drags(&self) -> Vec<(TrimEdge, TimeUs)> {
        let mut drags = Vec::new();
        if let Some(end) = self.end {
            drags.push((TrimEdge::Trailing, TimeUs::from_seconds(end)));
        }
        if let Some(start) = self.start {
            drags.push((TrimEdge::Leading, TimeUs::from_seconds(start)));
        }
        drags
    }

    fn apply(&self, selection: &mut TimelineSelection) -> Result<TrimRange> {
        for (edge, at) in self.drags() {
            selection.begin_trim_drag(edge)?;
            selection.update_trim_drag(PositionInput::Absolute(at))?;
            selection.end_trim_drag()?;
        }
        Ok(selection.selected_range()?)
    }
}

fn probe(input: &Path, settings: &EditorSettings) -> Result<()> {
    let media = probe_media(input)?;
    let mut selection = TimelineSelection::new(settings.clone());
    selection
        .initialize(media.duration)
        .with_context(|| format!("{} has no usable duration", input.display()))?;

    let size = media.display_size();
    println!("{}", input.display());
    println!("  {}", selection.maximum_duration_label()?);
    println!("  length   {}", media.duration);
    println!("  size     {}x{}", size.width, size.height);
    println!("  rotation {}", media.rotation);
    println!("  audio    {}", if media.has_audio { "yes" } else { "no" });
    Ok(())
}

async fn run_export(
    input: &Path,
    trim: TrimRequest,
    sticker: Option<PathBuf>,
    output: Option<PathBuf>,
    editor_settings: EditorSettings,
    export_settings: &ExportSettings,
) -> Result<()> {
    let media = probe_media(input)?;
    let mut selection = TimelineSelection::new(editor_settings);
    selection.initialize(media.duration)?;
    let range = trim.apply(&mut selection)?;

    let labels = selection.display_strings()?;
    tracing::info!(
        "Exporting {} ~ {} ({})",
        labels.trim_start,
        labels.trim_end,
        labels.duration
    );

    let request = ExportRequest {
        source: input.to_path_buf(),
        media,
        range,
        sticker,
        output_path: output,
    };
    let plan = export::compile(&request, export_settings)?;

    let (progress_tx, mut progress_rx) = tokio::sync::watch::channel(RenderProgress::default());
    let reporter = tokio::spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let progress = progress_rx.borrow().clone();
            eprint!("\rexporting {:5.1}%", progress.percent);
            if progress.percent >= 100.0 {
                break;
            }
        }
        eprintln!();
    });

    let result = export::execute(&plan, progress_tx).await;
    let _ = reporter.await;
    result?;

    println!("{}", plan.output_path.display());
    Ok(())
}

async fn run_preview(
    input: &Path,
    trim: TrimRequest,
    seconds: Option<u64>,
    settings: EditorSettings,
) -> Result<()> {
    let media = probe_media(input)?;
    let poll_interval = Duration::from_millis(settings.position_poll_interval_ms.max(10));

    let mut player = MpvPlayer::new();
    player.start(None).context("starting mpv")?;

    let mut session = EditorSession::new(player, settings);
    session.subscribe(|event: &trimline_core::types::TimelineEvent| {
        tracing::debug!("event {}", serde_json::to_string(event).unwrap_or_default());
    });
    session.open(input, media.duration)?;

    for (edge, at) in trim.drags() {
        session.begin_trim(edge)?;
        session.update_trim(PositionInput::Absolute(at))?;
        session.end_trim()?;
    }
    println!("{}", session.selection().range_label()?);

    let deadline = seconds.map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    loop {
        if !session.player_mut().is_running() {
            break;
        }
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }
        if let Err(e) = session.poll() {
            tracing::warn!("Position poll failed: {}", e);
        }
        tokio::time::sleep(poll_interval).await;
    }

    session.player_mut().stop();
    Ok(())
}
