use std::path::Path;

use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use inquire::{Confirm, InquireError, Password, PasswordDisplayMode, Text};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::model::{ConcatStatus, Credentials, PipelineEvent, Quality, SegmentStatus};
use crate::sys::local::CleanupReport;

pub fn info(message: &str) {
    println!("{}", message.cyan());
}

pub fn success(message: &str) {
    println!("{}", message.green());
}

pub fn warn(message: &str) {
    println!("{}", message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{}", message.red());
}

/// Ctrl+C or Esc at a prompt.
pub fn is_interrupt(err: &InquireError) -> bool {
    matches!(
        err,
        InquireError::OperationInterrupted | InquireError::OperationCanceled
    )
}

pub fn confirm(message: &str, default: bool) -> Result<bool, InquireError> {
    Confirm::new(message).with_default(default).prompt()
}

pub fn prompt_credentials() -> Result<Credentials, InquireError> {
    let username = Text::new("Username:").prompt()?;
    let password = Password::new("Password:")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()?;
    let secondary = Password::new("Second password (Enter if none):")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()?;
    Ok(Credentials::new(username, password, Some(secondary)))
}

/// `None` when the user submitted an empty line.
pub fn prompt_url(default_quality: Quality) -> Result<Option<(String, Quality)>, InquireError> {
    let input = Text::new("VOD URL [quality]:")
        .with_help_message("Enter on an empty line to quit")
        .prompt()?;
    Ok(parse_url_input(&input, default_quality))
}

/// Splits `<url> [quality]`. An unrecognised second token is ignored.
pub fn parse_url_input(input: &str, default_quality: Quality) -> Option<(String, Quality)> {
    let mut tokens = input.split_whitespace();
    let url = tokens.next()?.to_string();
    let quality = tokens
        .next()
        .and_then(Quality::from_label)
        .unwrap_or(default_quality);
    Some((url, quality))
}

/// Prints what the operator can do about a failed URL.
pub fn report_error(err: &Error) {
    match err {
        Error::InvalidUrl { .. } => {
            warn(&err.to_string());
            warn("Check that this is a SOOP VOD player URL (https://vod.sooplive.co.kr/player/<number>).");
        }
        Error::EmptyManifest { .. } => {
            error(&err.to_string());
            error("The VOD may not exist or you may lack access to it.");
            error("Check your login state and age verification.");
        }
        Error::Http { .. } => {
            error(&err.to_string());
            error("Check your network connection.");
        }
        Error::SegmentDownload { .. } | Error::Concat { .. } => {
            error(&err.to_string());
            error("Check that the ffmpeg path is correct.");
        }
        Error::Cancelled => warn("Download cancelled."),
        _ => error(&err.to_string()),
    }
}

pub fn report_cleanup(report: &CleanupReport, tmp_dir: &Path) {
    if report.is_clean() {
        return;
    }
    warn("Some temporary files could not be removed:");
    for path in &report.remaining {
        warn(&format!("  {}", path.display()));
    }
    warn(&format!("Please delete them from {} manually.", tmp_dir.display()));
}

pub fn report_concat(status: ConcatStatus, output: &Path) {
    match status {
        ConcatStatus::Complete => success(&format!("Download complete: {}", output.display())),
        ConcatStatus::Aborted {
            reached_ms,
            target_ms,
        } => warn(&format!(
            "Concatenation stopped at {} of {}: {}",
            format_ms(reached_ms),
            format_ms(target_ms),
            output.display()
        )),
    }
}

pub fn format_ms(ms: u64) -> String {
    let seconds = ms / 1000;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:24} [{bar:40.cyan/blue}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders pipeline events as progress bars until the sender side closes.
pub fn spawn_progress(mut rx: UnboundedReceiver<PipelineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bars = MultiProgress::new();
        let mut segment: Option<(ProgressBar, usize, usize)> = None;
        let mut concat: Option<ProgressBar> = None;

        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::SegmentStarted {
                    index,
                    total,
                    expected_ms,
                } => {
                    let bar = bars.add(ProgressBar::new(expected_ms.max(1)));
                    bar.set_style(bar_style());
                    bar.set_message(format!("Part {}/{}", index, total));
                    segment = Some((bar, index, total));
                }
                PipelineEvent::SegmentProgress { completed_ms, .. } => {
                    if let Some((bar, _, _)) = &segment {
                        bar.set_position(completed_ms.min(bar.length().unwrap_or(u64::MAX)));
                    }
                }
                PipelineEvent::SegmentFinished { status, .. } => {
                    if let Some((bar, index, total)) = segment.take() {
                        match status {
                            SegmentStatus::Complete => {
                                bar.set_position(bar.length().unwrap_or(0));
                                bar.finish_with_message(format!("Part {}/{} done", index, total));
                            }
                            SegmentStatus::Truncated => {
                                bar.abandon_with_message(format!("Part {}/{} stopped", index, total));
                            }
                        }
                    }
                }
                PipelineEvent::SegmentFailed { index } => {
                    if let Some((bar, _, total)) = segment.take() {
                        bar.abandon_with_message(format!("Part {}/{} failed", index, total));
                    }
                }
                PipelineEvent::ConcatStarted { target_ms } => {
                    let bar = bars.add(ProgressBar::new(target_ms.max(1)));
                    bar.set_style(bar_style());
                    bar.set_message("Joining parts");
                    concat = Some(bar);
                }
                PipelineEvent::ConcatProgress { completed_ms } => {
                    if let Some(bar) = &concat {
                        bar.set_position(completed_ms.min(bar.length().unwrap_or(u64::MAX)));
                    }
                }
                PipelineEvent::ConcatFinished { status } => {
                    if let Some(bar) = concat.take() {
                        if status.is_complete() {
                            bar.set_position(bar.length().unwrap_or(0));
                            bar.finish_with_message("Joined");
                        } else {
                            bar.abandon_with_message("Join stopped");
                        }
                    }
                }
                PipelineEvent::CleanupFinished { removed, remaining } => {
                    let _ = bars.println(format!(
                        "Removed {} temporary file(s){}",
                        removed,
                        if remaining > 0 {
                            format!(", {} left", remaining)
                        } else {
                            String::new()
                        }
                    ));
                }
            }
        }

        if let Some((bar, _, _)) = segment {
            bar.abandon();
        }
        if let Some(bar) = concat {
            bar.abandon();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_input_with_optional_quality() {
        assert_eq!(
            parse_url_input("https://vod.sooplive.co.kr/player/1 720p", Quality::Auto),
            Some(("https://vod.sooplive.co.kr/player/1".to_string(), Quality::P720))
        );
        assert_eq!(
            parse_url_input("  https://vod.sooplive.co.kr/player/1  ", Quality::P1080),
            Some(("https://vod.sooplive.co.kr/player/1".to_string(), Quality::P1080))
        );
        assert_eq!(
            parse_url_input("https://vod.sooplive.co.kr/player/1 8k", Quality::P540),
            Some(("https://vod.sooplive.co.kr/player/1".to_string(), Quality::P540))
        );
        assert_eq!(parse_url_input("   ", Quality::Auto), None);
    }

    #[test]
    fn durations_read_like_a_clock() {
        assert_eq!(format_ms(0), "00:00");
        assert_eq!(format_ms(90_500), "01:30");
        assert_eq!(format_ms(3_723_000), "1:02:03");
    }
}
