//! conversor-tts - Convert TXT, PDF and EPUB files to pt-BR speech

mod audio;
mod config;
mod coordinator;
mod session;
mod source;
mod text;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::AppConfig;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use session::ProgressMarker;
use source::InputKind;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tts_client::{Config as Credentials, ProviderKind};

#[derive(Parser, Debug)]
#[command(name = "conversor-tts")]
#[command(about = "Convert TXT, PDF and EPUB files to speech with Edge TTS or Gemini", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug output
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Mp3,
    Mp4,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a text source to audio
    Convert {
        /// Path to a .txt, .pdf or .epub file
        file: PathBuf,

        /// Engine to use (edge or gemini; default from the credential file)
        #[arg(short, long)]
        engine: Option<String>,

        /// Voice to use (default from config, then the engine default)
        #[arg(short, long)]
        voice: Option<String>,

        /// Chunk limit in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Chunks converted concurrently
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Output directory (default: <source dir>/<name>_audio)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Start fresh, ignore chunks from a previous run
        #[arg(long)]
        no_resume: bool,

        /// Speed up (or slow down) the result by this factor
        #[arg(long)]
        speed: Option<f64>,

        /// Final output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Mp3)]
        format: OutputFormat,

        /// Keep chunk files after assembly
        #[arg(long)]
        keep_chunks: bool,
    },
    /// Change speed and/or render video from an existing audio file
    Enhance {
        /// Path to a .mp3, .wav, .m4a or .mp4 file
        media: PathBuf,

        /// Speed factor (e.g. 1.25)
        #[arg(long, default_value_t = 1.0)]
        speed: f64,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Mp3)]
        format: OutputFormat,
    },
    /// List available voices
    Voices {
        /// Only list voices for this engine
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Write the normalized text of a source without converting it
    Normalize {
        /// Path to a .txt, .pdf or .epub file
        file: PathBuf,

        /// Output path (default: <source dir>/<name>_formatado.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Set the default engine
    SetEngine {
        /// edge or gemini
        engine: String,
    },
    /// Set the default voice for an engine
    SetVoice {
        /// Voice identifier
        voice: String,
        /// Engine the voice belongs to (default: the default engine)
        #[arg(short, long)]
        engine: Option<String>,
    },
    /// Store an API key in the credential file
    SetApiKey {
        /// The key
        key: String,
        /// Engine the key belongs to
        #[arg(short, long, default_value = "gemini")]
        engine: String,
    },
}

/// Options for one conversion, resolved from flags and config.
struct ConvertOptions {
    kind: ProviderKind,
    voice: Option<String>,
    chunk_size: usize,
    concurrency: usize,
    min_audio_bytes: u64,
    output_dir: PathBuf,
    resume: bool,
    speed: Option<f64>,
    format: OutputFormat,
    keep_chunks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match args.command {
        Commands::Convert {
            file,
            engine,
            voice,
            chunk_size,
            concurrency,
            output,
            no_resume,
            speed,
            format,
            keep_chunks,
        } => {
            let app = AppConfig::load().context("Failed to load configuration")?;
            let credentials = Credentials::load().context("Failed to load credentials")?;
            let kind = match engine {
                Some(name) => ProviderKind::from_str(&name)?,
                None => credentials.default_kind()?,
            };
            let options = ConvertOptions {
                kind,
                voice: voice.or_else(|| app.voice_for(kind).map(str::to_string)),
                chunk_size: chunk_size.unwrap_or(app.chunk_size),
                concurrency: concurrency.unwrap_or(app.concurrency),
                min_audio_bytes: app.min_audio_bytes,
                output_dir: output.unwrap_or_else(|| source::output_dir(&file)),
                resume: !no_resume,
                speed,
                format,
                keep_chunks,
            };
            convert(&file, &credentials, options).await
        }
        Commands::Enhance {
            media,
            speed,
            format,
        } => {
            if source::classify(&media)? != InputKind::Media {
                anyhow::bail!("{} is not an audio/video file", media.display());
            }
            require_ffmpeg().await?;
            let cancel = interrupt_token();
            let outputs = enhance(&media, Some(speed), format, &cancel).await?;
            for path in outputs {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Voices { engine } => {
            let kinds = match engine {
                Some(name) => vec![ProviderKind::from_str(&name)?],
                None => vec![ProviderKind::Edge, ProviderKind::Gemini],
            };
            for kind in kinds {
                println!("{}:", kind);
                for voice in kind.voices() {
                    let marker = if voice.id == kind.default_voice() { " (default)" } else { "" };
                    println!("  {:<34} {}{}", voice.id, voice.description, marker);
                }
            }
            Ok(())
        }
        Commands::Normalize { file, output } => {
            let document = source::extract(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let normalized = text::normalize(&document.text);
            let output = output.unwrap_or_else(|| {
                file.with_file_name(format!("{}_formatado.txt", source::output_stem(&file)))
            });
            std::fs::write(&output, &normalized)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            eprintln!("Normalized text written to {}", output.display());
            Ok(())
        }
        Commands::Config { action } => handle_config_command(&action),
    }
}

async fn require_ffmpeg() -> Result<()> {
    if !audio::is_ffmpeg_available().await {
        anyhow::bail!("ffmpeg not found. Install it (e.g. `apt install ffmpeg` or `brew install ffmpeg`)");
    }
    Ok(())
}

/// Token cancelled when the user presses Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping");
            on_signal.cancel();
        }
    });
    cancel
}

/// Convert a text source end to end.
async fn convert(file: &Path, credentials: &Credentials, options: ConvertOptions) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }
    if source::classify(file)? == InputKind::Media {
        anyhow::bail!(
            "{} is already audio/video; use `conversor-tts enhance` instead",
            file.display()
        );
    }

    let provider = tts_client::get_provider(
        options.kind,
        options.voice.clone(),
        credentials.get_provider_config(options.kind),
    )?;
    provider.is_available()?;
    require_ffmpeg().await?;

    eprintln!("Reading {}", file.display());
    let document = source::extract(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if document.text.trim().is_empty() {
        anyhow::bail!("{} is empty or unreadable", file.display());
    }
    log::debug!("Extracted {:?} document, ~{} words", document.format, document.total_words());

    let normalized = text::normalize(&document.text);
    let chunks = text::chunk_text(&normalized, options.chunk_size);
    if chunks.is_empty() {
        anyhow::bail!("No text left to convert after normalization");
    }
    eprintln!("Text split into {} chunk(s)", chunks.len());

    let stem = source::output_stem(file);
    let chunk_dir = options.output_dir.join("chunks");
    let fresh = ProgressMarker::new(
        session::compute_source_hash(file)?,
        chunks.len(),
        options.chunk_size,
    );
    let mut marker = match session::prepare_chunk_dir(&chunk_dir, &stem, &fresh, options.resume)? {
        Some(previous) => {
            eprintln!(
                "Resuming: {}/{} chunks ({:.1}% complete)",
                previous.completed_prefix(),
                previous.total_chunks,
                previous.percent()
            );
            previous
        }
        None => fresh,
    };

    let tasks = coordinator::create_tasks(&chunks, provider.default_voice(), &chunk_dir, &stem);

    let cancel = interrupt_token();

    eprintln!(
        "Converting with {} (voice {}, {} at a time)...",
        provider.name(),
        provider.default_voice(),
        options.concurrency
    );

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let scheduler = coordinator::ConversionScheduler::new(provider.as_ref(), cancel.clone())
        .with_concurrency(options.concurrency)
        .with_min_bytes(options.min_audio_bytes);
    let result = scheduler
        .run(tasks, |progress| {
            pb.set_length(progress.total as u64);
            pb.set_position(progress.completed as u64);
            if progress.failed > 0 {
                pb.set_message(format!("{} failed", progress.failed));
            }
            if progress.last_contiguous != marker.last_completed {
                marker.last_completed = progress.last_contiguous;
                if let Err(e) = session::save_marker(&chunk_dir, &marker) {
                    log::warn!("Could not save progress: {}", e);
                }
            }
        })
        .await;
    pb.finish_and_clear();

    let failed = result.failed_indices();
    marker.update(result.last_contiguous(), failed.clone());
    session::save_marker(&chunk_dir, &marker)?;

    eprintln!("Completed: {}, Failed: {}", result.succeeded(), failed.len());

    if cancel.is_cancelled() {
        anyhow::bail!(
            "Conversion interrupted with {} chunk(s) pending. {} chunk(s) kept in {}; run again to resume",
            result.cancelled(),
            result.succeeded(),
            chunk_dir.display()
        );
    }

    let paths = result.succeeded_paths();
    if paths.is_empty() {
        anyhow::bail!("No chunk was converted; nothing to assemble");
    }
    if !failed.is_empty() {
        log::warn!("Chunks {:?} failed and are missing from the audio", failed);
    }

    let final_path = options.output_dir.join(format!("{}.mp3", stem));
    eprintln!("Assembling {} chunk(s)...", paths.len());
    if options.keep_chunks || !failed.is_empty() {
        audio::assembler::concatenate(&paths, &final_path, &cancel).await?;
    } else {
        audio::assemble(&paths, &final_path, &cancel).await?;
        session::close_session(&chunk_dir)?;
    }

    let size_mb = std::fs::metadata(&final_path)?.len() as f64 / (1024.0 * 1024.0);
    eprintln!("Output: {} ({:.1} MB)", final_path.display(), size_mb);

    if options.speed.is_some_and(|s| s != 1.0) || options.format == OutputFormat::Mp4 {
        for path in enhance(&final_path, options.speed, options.format, &cancel).await? {
            eprintln!("Output: {}", path.display());
        }
    }

    Ok(())
}

/// Speed change, video rendering and splitting of a finished file.
///
/// Returns the files produced.
async fn enhance(
    input: &Path,
    speed: Option<f64>,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    let duration = audio::probe_duration(input, cancel).await?;
    let dir = input.parent().unwrap_or(Path::new("."));
    let stem = source::output_stem(input);

    let (audio_path, name, duration) = match speed.filter(|s| *s != 1.0) {
        Some(speed) => {
            let name = audio::enhanced_name(&stem, speed);
            let out = dir.join(format!("{}.mp3", name));
            eprintln!("Changing speed to {}x...", speed);
            audio::change_speed(input, &out, speed, cancel).await?;
            (out, name, duration / speed)
        }
        None => (input.to_path_buf(), stem, duration),
    };

    let result = match format {
        OutputFormat::Mp4 => {
            let video = dir.join(format!("{}.mp4", name));
            eprintln!("Rendering video...");
            audio::render_video(&audio_path, &video, duration, cancel).await?;
            video
        }
        OutputFormat::Mp3 => audio_path,
    };

    if duration > audio::MAX_PART_SECS {
        let ext = result
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        eprintln!("Result is longer than 12 hours, splitting...");
        let base = dir.join(&name);
        return audio::split_parts(&result, duration, audio::MAX_PART_SECS, &base, &ext, cancel).await;
    }

    Ok(vec![result])
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{}…", visible)
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let app = AppConfig::load()?;
            let credentials = Credentials::load()?;
            println!("Configuration file: {:?}", AppConfig::config_path()?);
            println!("Credential file: {:?}", Credentials::config_path()?);
            println!();
            println!("engine = \"{}\"", credentials.default_engine);
            println!("chunk_size = {}", app.chunk_size);
            println!("concurrency = {}", app.concurrency);
            println!("min_audio_bytes = {}", app.min_audio_bytes);
            for kind in [ProviderKind::Edge, ProviderKind::Gemini] {
                let voice = app.voice_for(kind).unwrap_or(kind.default_voice());
                println!("voice.{} = \"{}\"", kind, voice);
            }
            if let Some(key) = credentials
                .get_provider_config(ProviderKind::Gemini)
                .and_then(|c| c.api_key.as_deref())
            {
                println!("gemini.api_key = {}", mask_key(key));
            } else {
                println!("gemini.api_key = (none, uses $GEMINI_API_KEY)");
            }
        }
        ConfigAction::SetEngine { engine } => {
            let kind = ProviderKind::from_str(engine)?;
            let mut credentials = Credentials::load()?;
            credentials.default_engine = kind.as_str().to_string();
            credentials.save()?;
            println!("Default engine set to: {}", kind);
        }
        ConfigAction::SetVoice { voice, engine } => {
            let kind = match engine {
                Some(name) => ProviderKind::from_str(name)?,
                None => Credentials::load()?.default_kind()?,
            };
            if !kind.voices().iter().any(|v| v.id == voice.as_str()) {
                log::warn!("{} is not in the {} voice list; using it anyway", voice, kind);
            }
            let mut app = AppConfig::load()?;
            app.set_voice(kind, voice);
            app.save()?;
            println!("Default {} voice set to: {}", kind, voice);
        }
        ConfigAction::SetApiKey { key, engine } => {
            let kind = ProviderKind::from_str(engine)?;
            if kind.env_var().is_none() {
                anyhow::bail!("The {} engine does not use an API key", kind);
            }
            if key.trim().is_empty() {
                anyhow::bail!("API key is empty");
            }
            let mut credentials = Credentials::load()?;
            credentials.set_api_key(kind, key);
            credentials.save()?;
            println!("API key for {} saved to {:?}", kind, Credentials::config_path()?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert_args() {
        let args = Args::try_parse_from([
            "conversor-tts",
            "convert",
            "livro.pdf",
            "--engine",
            "gemini",
            "--speed",
            "1.5",
            "--format",
            "mp4",
            "-d",
        ])
        .unwrap();
        assert!(args.debug);
        match args.command {
            Commands::Convert {
                file,
                engine,
                speed,
                format,
                no_resume,
                ..
            } => {
                assert_eq!(file, PathBuf::from("livro.pdf"));
                assert_eq!(engine.as_deref(), Some("gemini"));
                assert_eq!(speed, Some(1.5));
                assert_eq!(format, OutputFormat::Mp4);
                assert!(!no_resume);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_config_args() {
        let args =
            Args::try_parse_from(["conversor-tts", "config", "set-voice", "Puck", "-e", "gemini"])
                .unwrap();
        assert!(matches!(
            args.command,
            Commands::Config {
                action: ConfigAction::SetVoice { ref voice, engine: Some(ref e) }
            } if voice == "Puck" && e == "gemini"
        ));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSyExample"), "AIza…");
    }
}
