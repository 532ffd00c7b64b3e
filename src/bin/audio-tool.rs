//! audio-tool CLI: preset exports, file info and remote video conversion

use anyhow::{bail, Context, Result};
use audio_tool::conversion::{
    is_supported_video, AnimeStyle, ConversionClient, ConvertRequest, JobPoller, Resolution,
};
use audio_tool::{
    load_config, preset_labels, AudioSession, EffectPreset, EngineConfig, SessionStatus,
    BUILTIN_PRESETS,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Voice effects for audio files and anime-style conversion for videos
#[derive(Parser, Debug)]
#[command(name = "audio-tool", version, about)]
struct Cli {
    /// Engine config JSON (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "audio_tool=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in effect presets
    Presets,

    /// Decode an audio file and print its format
    Info {
        file: PathBuf,
    },

    /// Render an audio file through a preset and write a 16-bit mono WAV
    Export {
        file: PathBuf,

        /// Preset label (normal, kid, cat, slow)
        #[arg(short, long, default_value = "normal")]
        preset: String,

        /// Directory the WAV is written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Play an audio file through a preset on the default output device
    Preview {
        file: PathBuf,

        #[arg(short, long, default_value = "normal")]
        preset: String,
    },

    /// Upload a video to the conversion service and follow the job
    Convert {
        video: PathBuf,

        /// Service base URL (falls back to the config's server_url)
        #[arg(long)]
        server: Option<String>,

        /// face_paint_512_v2, hayao, paprika or shinkai
        #[arg(long, default_value = "face_paint_512_v2")]
        style: AnimeStyle,

        /// 720 or 1080
        #[arg(long, default_value = "720")]
        resolution: Resolution,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    init_logging(cli.log.as_deref(), &config.log_filter);

    match cli.command {
        Command::Presets => cmd_presets(),
        Command::Info { file } => cmd_info(config, &file),
        Command::Export {
            file,
            preset,
            out_dir,
        } => cmd_export(config, &file, &preset, &out_dir),
        Command::Preview { file, preset } => cmd_preview(config, &file, &preset),
        Command::Convert {
            video,
            server,
            style,
            resolution,
        } => cmd_convert(&config, &video, server, ConvertRequest { style, resolution }),
    }
}

/// `--log` wins, then `RUST_LOG`, then the config's filter
fn init_logging(cli_filter: Option<&str>, config_filter: &str) {
    let filter = match cli_filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_filter)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn find_preset(label: &str) -> Result<EffectPreset> {
    match EffectPreset::by_label(label) {
        Some(preset) => Ok(preset),
        None => bail!(
            "unknown preset '{}' (available: {})",
            label,
            preset_labels().join(", ")
        ),
    }
}

fn cmd_presets() -> Result<()> {
    for def in BUILTIN_PRESETS {
        println!("{}", EffectPreset::from(def).describe());
    }
    Ok(())
}

fn cmd_info(config: EngineConfig, file: &Path) -> Result<()> {
    let mut session = AudioSession::with_defaults(config);
    let audio = session
        .load_file(file)
        .with_context(|| format!("decode '{}'", file.display()))?;

    println!("file:        {}", file.display());
    println!("sample rate: {} Hz", audio.sample_rate());
    println!("channels:    {}", audio.number_of_channels());
    println!("frames:      {}", audio.length());
    println!("duration:    {:.3} s", audio.duration());
    Ok(())
}

fn cmd_export(config: EngineConfig, file: &Path, label: &str, out_dir: &Path) -> Result<()> {
    let preset = find_preset(label)?;
    let mut session = AudioSession::with_defaults(config);
    session
        .load_file(file)
        .with_context(|| format!("decode '{}'", file.display()))?;

    let task = session.spawn_export(&preset, &preset.label)?;
    while !task.is_finished() {
        eprint!("\rrendering {:>3}%", task.progress().percent());
        std::thread::sleep(Duration::from_millis(100));
    }
    eprintln!("\rrendering 100%");

    let asset = session.commit_export(task)?;
    let path = asset
        .write_to(out_dir)
        .with_context(|| format!("write '{}'", asset.file_name))?;
    println!(
        "{} ({:.2} s, {} bytes)",
        path.display(),
        asset.duration(),
        asset.bytes.len()
    );
    Ok(())
}

fn cmd_preview(config: EngineConfig, file: &Path, label: &str) -> Result<()> {
    let preset = find_preset(label)?;
    let mut session = AudioSession::with_defaults(config);
    session
        .load_file(file)
        .with_context(|| format!("decode '{}'", file.display()))?;

    session.play_preview(&preset)?;
    println!("playing '{}' through {}", file.display(), preset.describe());
    while session.poll_preview() == SessionStatus::Playing {
        std::thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}

fn cmd_convert(
    config: &EngineConfig,
    video: &Path,
    server: Option<String>,
    request: ConvertRequest,
) -> Result<()> {
    if !is_supported_video(video) {
        bail!("'{}' is not a supported video file", video.display());
    }
    let Some(server) = server.or_else(|| config.server_url.clone()) else {
        bail!("no server URL: pass --server or set server_url in the config");
    };

    let client = ConversionClient::new(&server)?;
    let accepted = client
        .submit(video, &request)
        .with_context(|| format!("upload '{}'", video.display()))?;
    println!("job {} queued", accepted.job_id);

    let poller = JobPoller::new(client, Duration::from_millis(config.poll_interval_ms));
    let view = poller.run(&accepted.job_id, |view| {
        let state = view.status.map(|s| s.as_str()).unwrap_or("unknown");
        println!("[{:>7}] {:>3.0}% {}", state, view.progress, view.message);
    });

    match view.download_url {
        Some(url) => {
            println!("result: {}", poller.source().absolute_url(&url));
            Ok(())
        }
        None => bail!("conversion failed: {}", view.message),
    }
}
