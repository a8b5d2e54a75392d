use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use songforge::generator::GenerationParams;
use songforge::learning::Engine;
use songforge::lifecycle::{CancellationToken, ProcessGuard};
use songforge::store::models::NewTrack;
use songforge::store::Store;
use songforge::{config, SUPPORTED_EXTENSIONS};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "songforge", version, about = "Local audio-corpus curator and generative-music engine")]
struct Cli {
    /// Path to the media store database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Headless HVSC conversion: catalogue a directory of already-converted
    /// SID-derived audio (the downloader/SID-to-WAV step is an external
    /// collaborator). Defaults to the store's `hvsc/` directory.
    ConvertHvsc {
        path: Option<PathBuf>,
    },

    /// Catalogue audio files under the given directories (no analysis yet)
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Run the Feature Extractor over uncatalogued tracks
    Analyze {
        #[arg(short = 'j', long, default_value = "4")]
        jobs: usize,

        /// Re-analyze tracks that already have features
        #[arg(long)]
        force: bool,
    },

    /// Render a new track from a prompt (spec §4.10)
    Generate {
        #[arg(long, default_value = "Pop")]
        genre: String,

        #[arg(long, default_value = "120")]
        bpm: f32,

        #[arg(long, default_value = "180")]
        duration: f32,

        #[arg(long)]
        vocals: bool,

        /// Output path (.wav or .mp3)
        output: PathBuf,
    },

    /// Train the VAE-style model over training-eligible tracks
    Train {
        #[arg(long, default_value = "50")]
        epochs: u32,

        #[arg(long, default_value = "16")]
        batch_size: usize,

        #[arg(long, default_value = "0.01")]
        learning_rate: f32,
    },

    /// Record a genre correction for a track and incrementally retrain
    Correct {
        track_id: i64,

        #[arg(long)]
        genre: String,

        /// Apply the resulting learned pattern to other tracks immediately
        #[arg(long)]
        propagate: bool,
    },

    /// Library statistics and data-quality report
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let cancel = CancellationToken::new();
    cancel.install_signal_handlers().context("Failed to install signal handlers")?;
    let _pid_guard = ProcessGuard::acquire(&config::pid_path()).context("Failed to write PID file")?;

    let db_path = cli.db_path.unwrap_or_else(config::default_db_path);
    log::info!("Media store: {}", db_path.display());
    let store = Store::open(&db_path).context("Failed to open media store")?;

    let Some(command) = cli.command else {
        println!("songforge {} — launches the GUI when run with no arguments.", env!("CARGO_PKG_VERSION"));
        println!("This build is headless; use --help to see available subcommands.");
        return Ok(());
    };

    let mut exit_code: Option<i32> = None;

    match command {
        Commands::ConvertHvsc { path } => {
            let dir = path.unwrap_or_else(config::hvsc_dir);
            exit_code = Some(run_convert_hvsc(&store, &dir, &cancel)?);
        }

        Commands::Scan { paths } => {
            let result = run_scan(&store, &paths)?;
            println!(
                "Scan complete: {} found, {} catalogued, {} skipped, {} errors",
                result.found, result.catalogued, result.skipped, result.errors
            );
        }

        Commands::Analyze { jobs, force } => {
            let result = run_analyze(&store, jobs, force, &cancel)?;
            println!("Analysis complete: {} analyzed, {} failed", result.analyzed, result.failed);
        }

        Commands::Generate { genre, bpm, duration, vocals, output } => {
            let params = GenerationParams { genre, bpm, duration_secs: duration, use_vocals: vocals, ..GenerationParams::default() };
            if !params.is_valid() {
                anyhow::bail!("generation parameters out of range");
            }
            let model_path = config::model_path();
            let trained_model = if model_path.exists() {
                songforge::learning::VaeModel::load_model(&model_path).ok()
            } else {
                None
            };
            let model_ref = trained_model.as_ref();

            let pb = ProgressBar::new(100);
            pb.set_style(ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {percent}%").unwrap().progress_chars("#>-"));
            let ok = songforge::generator::generate(&store, model_ref, &params, &output, |p| pb.set_position((p * 100.0) as u64));
            pb.finish_and_clear();
            if ok {
                println!("Generated {}", output.display());
            } else {
                anyhow::bail!("generation failed");
            }
        }

        Commands::Train { epochs, batch_size, learning_rate } => {
            let mut engine = Engine::new(&store).context("Failed to build learning engine")?;
            let model_path = config::model_path();
            if model_path.exists() {
                engine.load_model(&model_path).ok();
            }
            let extracted = engine.extract_training_features(&config::instruments_dir())?;
            log::info!("Extracted training features for {extracted} tracks");
            let checkpoint = config::checkpoint_path();
            let pb = ProgressBar::new(epochs as u64);
            let cancel_for_loop = cancel.clone();
            let finished = engine
                .train(
                    epochs,
                    batch_size,
                    learning_rate,
                    &checkpoint,
                    |e, loss| {
                        pb.set_position(e as u64);
                        pb.set_message(format!("loss {loss:.4}"));
                    },
                    move || cancel_for_loop.should_continue(),
                )
                .context("Training failed")?;
            pb.finish_and_clear();
            engine.save_model(&model_path).context("Failed to save model")?;
            println!("Training {}", if finished { "complete" } else { "cancelled" });
        }

        Commands::Correct { track_id, genre, propagate } => {
            let mut engine = Engine::new(&store).context("Failed to build learning engine")?;
            let model_path = config::model_path();
            if model_path.exists() {
                engine.load_model(&model_path).ok();
            }
            let track = store.get_by_id(track_id)?.context("no track with that id")?;
            let old_genre = track.genre.clone();
            let mut corrected = track;
            corrected.genre = genre;
            store.update(&corrected).context("Failed to persist correction")?;
            engine.retrain_with_corrected(&corrected, &old_genre).context("Failed to retrain on correction")?;
            let propagated = if propagate { engine.suggest_database_corrections(true)? } else { 0 };
            engine.save_model(&model_path).context("Failed to save model")?;
            println!("Corrected track {track_id}: {old_genre} -> {}", corrected.genre);
            if propagate {
                println!("Propagated to {propagated} other tracks");
            }
        }

        Commands::Stats => {
            let report = store.data_quality_report().context("Failed to build data quality report")?;
            println!("Library Statistics");
            println!("===================");
            println!("Total tracks:      {}", report.total_tracks);
            println!("Unanalyzed:        {}", report.unanalyzed);
            println!("Missing genre:     {}", report.missing_genre);
            println!("Missing BPM:       {}", report.missing_bpm);
            println!("Zero duration:     {}", report.zero_duration);
            println!("Duplicate paths:   {}", report.duplicate_paths);
            println!("Duplicate hashes:  {}", report.duplicate_hashes);
        }
    }

    if let Some(code) = exit_code {
        drop(_pid_guard);
        std::process::exit(code);
    }

    Ok(())
}

struct ScanReport {
    found: u64,
    catalogued: u64,
    skipped: u64,
    errors: u64,
}

fn audio_files_under(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in paths {
        for entry in WalkDir::new(root).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry.path().extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
            if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                files.push(entry.into_path());
            }
        }
    }
    files
}

fn content_hash(path: &Path) -> std::io::Result<String> {
    use sha2::{Digest, Sha256};
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Catalogues a single file if it isn't already known. Returns `true` when a
/// new row was inserted.
fn catalogue_file(store: &Store, path: &Path) -> Result<bool> {
    let path_str = path.to_string_lossy().to_string();
    if store.exists_by_path(&path_str)? {
        return Ok(false);
    }
    let hash = content_hash(path)?;
    let tags = songforge::io::read_tags(path);
    let title = tags.title.unwrap_or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default());
    let new_track = NewTrack {
        path: path_str,
        content_hash: hash,
        title,
        artist: tags.artist.unwrap_or_default(),
        duration_secs: tags.duration_secs.unwrap_or(0.0),
        bpm: 0.0,
        genre: String::new(),
        sub_genre: String::new(),
        intensity: String::new(),
        bass_level: String::new(),
        mood_tags: String::new(),
        instruments: String::new(),
        spectral_centroid: 0.0,
        spectral_rolloff: 0.0,
        zcr: 0.0,
        mfcc_json: "[]".to_string(),
        mfcc_signature: 0.0,
        analyzed: false,
    };
    store.insert(&new_track)?;
    Ok(true)
}

fn run_scan(store: &Store, paths: &[PathBuf]) -> Result<ScanReport> {
    let files = audio_files_under(paths);
    let mut report = ScanReport { found: files.len() as u64, catalogued: 0, skipped: 0, errors: 0 };
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}").unwrap().progress_chars("#>-"));
    for path in &files {
        match catalogue_file(store, path) {
            Ok(true) => report.catalogued += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                log::warn!("Failed to catalogue {}: {e}", path.display());
                report.errors += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(report)
}

struct AnalyzeReport {
    analyzed: u64,
    failed: u64,
}

/// Applies freshly-computed features onto the stored row and persists it.
fn apply_analysis(store: &Store, track: &songforge::store::models::Track, features: &songforge::analyzer::TrackFeatures) -> Result<()> {
    let mut updated = track.clone();
    updated.bpm = features.bpm;
    updated.genre = features.genre.clone();
    updated.intensity = features.intensity.clone();
    updated.bass_level = features.bass_level.clone();
    updated.spectral_centroid = features.spectral_centroid;
    updated.spectral_rolloff = features.spectral_rolloff;
    updated.zcr = features.zcr;
    updated.mfcc_json = serde_json::to_string(&features.mfcc).unwrap_or_else(|_| "[]".to_string());
    updated.duration_secs = features.duration_secs;
    updated.analyzed = true;
    store.update(&updated)?;
    Ok(())
}

fn run_analyze(store: &Store, jobs: usize, force: bool, cancel: &CancellationToken) -> Result<AnalyzeReport> {
    let tracks = if force { store.get_all()? } else { store.get_unanalyzed()? };
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs.max(1)).build().context("Failed to build thread pool")?;
    let mut report = AnalyzeReport { analyzed: 0, failed: 0 };
    let pb = ProgressBar::new(tracks.len() as u64);
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len}").unwrap().progress_chars("#>-"));

    for track in &tracks {
        if cancel.is_cancelled() {
            log::warn!("Analyze cancelled with {} tracks remaining", tracks.len() as u64 - pb.position());
            break;
        }
        let path = PathBuf::from(&track.path);
        let features = pool.install(|| songforge::analyzer::analyze(&path));
        match features {
            Ok(f) => {
                apply_analysis(store, track, &f)?;
                report.analyzed += 1;
            }
            Err(e) => {
                log::warn!("Failed to analyze {}: {e}", track.path);
                report.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(report)
}

/// Catalogues and analyzes one file in a single step, for the `convert-hvsc`
/// progress loop.
fn convert_one(store: &Store, path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy().to_string();
    if !store.exists_by_path(&path_str)? {
        catalogue_file(store, path)?;
    }
    let track = store.get_by_path(&path_str)?.context("track vanished immediately after catalogue")?;
    if !track.analyzed {
        let features = songforge::analyzer::analyze(path)?;
        apply_analysis(store, &track, &features)?;
    }
    Ok(())
}

fn run_convert_hvsc(store: &Store, dir: &Path, cancel: &CancellationToken) -> Result<i32> {
    let files = audio_files_under(&[dir.to_path_buf()]);
    let total = files.len();
    let mut succeeded = 0usize;
    for (i, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        match convert_one(store, path) {
            Ok(()) => succeeded += 1,
            Err(e) => log::warn!("HVSC conversion failed for {}: {e}", path.display()),
        }
        let pct = if total > 0 { (i + 1) * 100 / total } else { 100 };
        println!("[{}/{}] {}%", i + 1, total.max(1), pct);
    }
    Ok(if total == 0 || succeeded > 0 { 0 } else { 1 })
}
