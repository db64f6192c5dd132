mod cli;
mod error;
mod model;
mod sys;
mod ui;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use inquire::InquireError;
use tokio::sync::mpsc;

use cli::Cli;
use error::Error;
use model::{Quality, Settings};
use sys::config::Config;
use sys::download::DriverContext;
use sys::process::AbortSignal;
use sys::session::Session;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<InquireError>().is_some_and(ui::is_interrupt) {
                return ExitCode::SUCCESS;
            }
            log::error!("Fatal: {:#}", e);
            ui::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (mut config, created) = if cli.use_config {
        Config::load_or_create()?
    } else {
        (Config::default(), false)
    };

    // Logging preferences are honoured even without --config.
    let log_config = if cli.use_config {
        config.clone()
    } else {
        Config::load()
    };
    if let Err(e) = sys::logging::init_logger(
        log_config.log_path(),
        log_config.logging.enabled,
        cli.verbose,
    ) {
        ui::warn(&format!("Logging disabled: {:#}", e));
    }
    log::info!("soopdl {} starting", env!("CARGO_PKG_VERSION"));

    if created {
        ui::info(&format!(
            "Created config file at {}",
            Config::get_config_path().display()
        ));
    }

    let settings = resolve_settings(&cli, &mut config)?;
    let session = Session::new().context("Failed to create HTTP session")?;

    login_flow(&session, &mut config, cli.use_config).await?;

    let abort = AbortSignal::new();
    let listener = abort.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received, stopping the running download");
            listener.trigger();
        }
    });

    let outcome = download_loop(&cli, &session, &settings, &abort).await;

    if cli.logout {
        match session.logout().await {
            Ok(()) => ui::info("Logged out."),
            Err(e) => {
                log::warn!("{}", e);
                ui::warn(&e.to_string());
            }
        }
    }

    outcome
}

fn resolve_settings(cli: &Cli, config: &mut Config) -> Result<Settings> {
    let ffmpeg_path = cli
        .ffmpeg
        .clone()
        .unwrap_or_else(|| config.executables.ffmpeg.clone());

    let quality = match cli.quality.as_deref() {
        Some(label) => Quality::from_label(label).unwrap_or_else(|| {
            ui::warn(&format!("Unknown quality '{}', using auto", label));
            Quality::parse(label)
        }),
        None => config.download.quality,
    };

    let status = check_ffmpeg_or_explain(&ffmpeg_path)?;
    ui::info(&format!("ffmpeg {}", status.version));
    if !status.is_release {
        log::warn!("Non-release ffmpeg build: {}", status.version);
        ui::warn("This looks like a git build of ffmpeg; progress reporting may be unreliable.");
    }
    match &status.ffprobe {
        Some(path) => log::info!("Using ffprobe at {}", path.display()),
        None => log::info!("ffprobe not found, durations come from progress output"),
    }

    if cli.use_config
        && cli.ffmpeg.is_some()
        && ffmpeg_path != config.executables.ffmpeg
        && ui::confirm("Save this ffmpeg path to the config file?", true)?
    {
        config.executables.ffmpeg = ffmpeg_path.clone();
        save_config(config);
    }

    let work_dir = std::env::current_dir().context("Failed to read the current directory")?;

    Ok(Settings {
        ffmpeg_path,
        ffprobe_path: status.ffprobe,
        turbo: cli.turbo,
        quality,
        tolerance_ms: config.download.tolerance_ms,
        work_dir,
    })
}

fn check_ffmpeg_or_explain(ffmpeg_path: &str) -> Result<sys::deps::FfmpegStatus> {
    sys::deps::check_ffmpeg(ffmpeg_path).inspect_err(|e| {
        log::error!("ffmpeg check failed: {:#}", e);
        ui::error("ffmpeg is required. Install it or pass its location with -f <PATH>.");
    })
}

fn save_config(config: &Config) {
    match config.save() {
        Ok(()) => ui::success("Config saved."),
        Err(e) => {
            log::warn!("Config save failed: {:#}", e);
            ui::warn(&format!("Could not save config: {:#}", e));
        }
    }
}

async fn login_flow(session: &Session, config: &mut Config, use_config: bool) -> Result<()> {
    if !ui::confirm("Log in to SOOP?", false)? {
        if session.check_auth().await {
            ui::info("Already logged in.");
        }
        return Ok(());
    }

    let saved = config.account.credentials();
    let mut credentials = if use_config && !saved.is_empty() {
        saved.clone()
    } else {
        ui::prompt_credentials()?
    };

    loop {
        match session.login(&credentials).await {
            Ok(true) => {
                ui::success("Logged in.");
                break;
            }
            Ok(false) => {
                log::warn!("Login accepted but the session is not authenticated");
                ui::error("Login failed: the session is still logged out.");
            }
            Err(e) => {
                log::warn!("Login failed: {}", e);
                ui::error(&format!("Login failed: {}", e));
            }
        }
        if !ui::confirm("Try again with different credentials?", true)? {
            ui::warn("Continuing without login. Some VODs may be unavailable.");
            return Ok(());
        }
        credentials = ui::prompt_credentials()?;
    }

    if use_config
        && credentials != saved
        && ui::confirm("Save these credentials to the config file?", false)?
    {
        config.account.set_credentials(&credentials);
        save_config(config);
    }
    Ok(())
}

async fn download_loop(
    cli: &Cli,
    session: &Session,
    settings: &Settings,
    abort: &AbortSignal,
) -> Result<()> {
    if let Some(batch) = &cli.batch {
        run_batch(batch, session, settings, abort).await?;
    }

    loop {
        let (url, quality) = match ui::prompt_url(settings.quality) {
            Ok(Some(input)) => input,
            Ok(None) => return Ok(()),
            Err(e) if ui::is_interrupt(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        settle(process_url(session, settings, abort, &url, quality).await)?;
    }
}

async fn run_batch(
    path: &Path,
    session: &Session,
    settings: &Settings,
    abort: &AbortSignal,
) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    log::info!("Batch file {} lists {} URLs", path.display(), lines.len());

    for (i, line) in lines.iter().enumerate() {
        let Some((url, quality)) = ui::parse_url_input(line, settings.quality) else {
            continue;
        };
        ui::info(&format!("[{}/{}] {}", i + 1, lines.len(), url));
        settle(process_url(session, settings, abort, &url, quality).await)?;
    }
    Ok(())
}

/// Reports recoverable failures and keeps going; anything else ends the run.
fn settle(result: std::result::Result<(), Error>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            log::warn!("{}", e);
            ui::report_error(&e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn process_url(
    session: &Session,
    settings: &Settings,
    abort: &AbortSignal,
    url: &str,
    quality: Quality,
) -> std::result::Result<(), Error> {
    abort.reset();
    ui::info(&format!("Fetching VOD information ({})...", quality));

    let manifest = tokio::select! {
        manifest = sys::manifest::resolve_manifest(session, url, quality) => manifest?,
        _ = abort.triggered() => {
            abort.reset();
            ui::warn("Cancelled.");
            return Ok(());
        }
    };
    ui::info(&format!(
        "{} ({} part(s), {})",
        manifest.title(),
        manifest.len(),
        ui::format_ms(manifest.total_duration_ms())
    ));

    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = ui::spawn_progress(rx);
    let ctx = DriverContext {
        session,
        settings,
        abort: abort.clone(),
        events: tx,
    };
    let result = sys::pipeline::run(&ctx, &manifest).await;
    drop(ctx);
    let _ = renderer.await;

    let report = result?;
    if report.truncated {
        ui::warn("A part ended early; the parts after it were skipped.");
    }
    ui::info(&format!(
        "Joined {} part(s), {} in total",
        report.segments,
        ui::format_ms(report.total_ms)
    ));
    ui::report_concat(report.concat, &report.output);
    ui::report_cleanup(&report.cleanup, &settings.tmp_dir());
    Ok(())
}
