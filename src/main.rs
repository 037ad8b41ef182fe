use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use elmotron::api::{DashScopeNarrator, OpenAiNarrator};
use elmotron::driver::{ChromeDriverFactory, ChromeOptions};
use elmotron::narration::NarrationProvider;
use elmotron::script::{self, ProductionScript};
use elmotron::video::VideoGenerator;
use elmotron::{Elmo, Pacing, SessionConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tts {
    Dashscope,
    Openai,
}

impl Tts {
    fn key_var(self) -> &'static str {
        match self {
            Tts::Dashscope => "DASHSCOPE_API_KEY",
            Tts::Openai => "OPENAI_API_KEY",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "elmotron")]
#[command(about = "Record narrated browser walkthroughs from a scene script", long_about = None)]
struct Args {
    /// Scene script (JSON)
    #[arg(short, long)]
    script: PathBuf,

    /// Output video file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Burn narration text into the video
    #[arg(long)]
    subtitles: bool,

    /// Show the browser windows while recording
    #[arg(long)]
    headed: bool,

    /// Working directory for recordings and intermediates
    #[arg(short = 'w', long)]
    work_dir: Option<PathBuf>,

    /// Attempts left for a scene whose narration could not keep up
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Pause after each pointer or keyboard action
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Speech synthesis backend
    #[arg(long, value_enum, default_value_t = Tts::Dashscope)]
    tts: Tts,

    /// Voice name understood by the chosen backend
    #[arg(long)]
    voice: Option<String>,

    /// API key for the speech backend
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();

    let api_key = if let Some(key) = args.api_key.clone() {
        key
    } else if let Ok(key) = std::env::var(args.tts.key_var()) {
        key
    } else {
        eprintln!(
            "Error: {} not found. Please set it via --api-key or the {} environment variable",
            args.tts.key_var(),
            args.tts.key_var()
        );
        std::process::exit(1);
    };

    let production = ProductionScript::load(&args.script)
        .await
        .context(format!("Failed to read script: {}", args.script.display()))?;

    let output = args
        .output
        .clone()
        .or_else(|| production.output.clone())
        .unwrap_or_else(|| PathBuf::from("output.mp4"));
    let mut config = SessionConfig::new(output);
    config.subtitles = args.subtitles || production.subtitles.unwrap_or(false);
    config.headless = !args.headed && production.headless.unwrap_or(true);
    if let Some(work_dir) = args.work_dir.clone() {
        config.work_dir = work_dir;
    }

    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .context("Failed to create work directory")?;

    let narrator: Arc<dyn NarrationProvider> = match args.tts {
        Tts::Dashscope => Arc::new(DashScopeNarrator::new(
            api_key,
            args.voice.clone(),
            config.work_dir.clone(),
        )?),
        Tts::Openai => Arc::new(OpenAiNarrator::new(
            api_key,
            args.voice.clone(),
            config.work_dir.clone(),
        )?),
    };

    let mut pacing = Pacing::default();
    if let Some(ms) = args.settle_ms {
        pacing.settle = Duration::from_millis(ms);
    }

    let elmo = Elmo::new(
        config,
        Arc::new(ChromeDriverFactory::new(ChromeOptions::default())),
        narrator,
        Arc::new(VideoGenerator::new()),
    )
    .with_pacing(pacing);

    info!(
        scenes = production.scenes.len(),
        output = %elmo.config().output.display(),
        "Starting recording..."
    );

    match run(elmo, &production, args.retries).await {
        Ok(output) => {
            info!("Video generation completed: {}", output.display());
            Ok(())
        }
        Err(e) => {
            error!("Recording failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(elmo: Elmo, production: &ProductionScript, retries: u32) -> elmotron::Result<PathBuf> {
    script::run_all(&elmo, &production.scenes, retries).await?;
    elmo.build().await
}
