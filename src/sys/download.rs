use std::path::PathBuf;

use tokio::sync::mpsc::UnboundedSender;

use crate::error::{Error, Result};
use crate::model::{DownloadOutcome, Manifest, PipelineEvent, SegmentStatus, Settings};
use crate::sys::local::{self, reserve_unique_path};
use crate::sys::process::{build_download_command, probe_duration_ms, run_with_progress, AbortSignal};
use crate::sys::session::Session;

/// Everything a driver needs for one pipeline run.
pub struct DriverContext<'a> {
    pub session: &'a Session,
    pub settings: &'a Settings,
    pub abort: AbortSignal,
    pub events: UnboundedSender<PipelineEvent>,
}

impl DriverContext<'_> {
    pub(crate) fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }
}

/// Segments fetched for one manifest, in manifest order.
#[derive(Debug, Default)]
pub struct SegmentBatch {
    pub outcomes: Vec<DownloadOutcome>,
    /// Sum of expected durations of complete segments plus the reached
    /// duration of a truncated one. Progress target for concatenation.
    pub total_ms: u64,
    pub truncated: bool,
}

impl SegmentBatch {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.outcomes.iter().map(|o| o.path.clone()).collect()
    }
}

/// Downloads manifest entries one after another. A truncated segment stops
/// the loop but keeps what was fetched; a failing ffmpeg aborts the run and
/// removes the temporary files.
pub async fn download_segments(ctx: &DriverContext<'_>, manifest: &Manifest) -> Result<SegmentBatch> {
    let mut batch = SegmentBatch::default();
    match fetch_all(ctx, manifest, &mut batch).await {
        Ok(()) => Ok(batch),
        Err(e) => {
            let report = local::remove_temp_files(&batch.paths());
            if !report.is_clean() {
                log::warn!("{} temporary files left behind", report.remaining.len());
            }
            Err(e)
        }
    }
}

async fn fetch_all(ctx: &DriverContext<'_>, manifest: &Manifest, batch: &mut SegmentBatch) -> Result<()> {
    let settings = ctx.settings;
    let headers = ctx.session.forwarded_headers();
    let cookies = ctx.session.cookies();
    let total = manifest.len();

    for (position, entry) in manifest.entries().iter().enumerate() {
        let index = position + 1;
        if ctx.abort.is_triggered() {
            ctx.abort.reset();
            log::info!("Abort requested before segment {}/{}", index, total);
            return stop_early(batch);
        }
        let path = reserve_unique_path(&settings.tmp_dir(), manifest.title(), "mp4")?;
        // Tracked before spawning so a failure still cleans it up.
        batch.outcomes.push(DownloadOutcome {
            path: path.clone(),
            completed_ms: 0,
            expected_ms: entry.duration_ms,
        });

        ctx.emit(PipelineEvent::SegmentStarted {
            index,
            total,
            expected_ms: entry.duration_ms,
        });
        log::info!("Downloading segment {}/{} to {}", index, total, path.display());

        let cmd = build_download_command(
            &settings.ffmpeg_path,
            &entry.url,
            &path,
            &headers,
            &cookies,
            settings.turbo,
        );
        let run = run_with_progress(cmd, &ctx.abort, |completed_ms| {
            ctx.emit(PipelineEvent::SegmentProgress { index, completed_ms });
        })
        .await?;

        if !run.status.success() && !run.aborted {
            log::error!("Segment {} failed: ffmpeg exited with {}", index, run.status);
            ctx.emit(PipelineEvent::SegmentFailed { index });
            return Err(Error::SegmentDownload {
                index,
                status: run.status,
            });
        }

        let measured = match &settings.ffprobe_path {
            Some(ffprobe) => probe_duration_ms(ffprobe, &path).await,
            None => None,
        };
        let completed_ms = measured.unwrap_or(run.completed_ms);

        // Stopped before any output: nothing worth joining.
        if run.aborted && completed_ms == 0 {
            log::info!("Segment {} stopped before producing output, dropping it", index);
            batch.outcomes.pop();
            let report = local::remove_temp_files(&[path]);
            if !report.is_clean() {
                log::warn!("Could not remove empty segment {}", index);
            }
            ctx.emit(PipelineEvent::SegmentFinished {
                index,
                status: SegmentStatus::Truncated,
            });
            return stop_early(batch);
        }

        let outcome = DownloadOutcome {
            path,
            completed_ms,
            expected_ms: entry.duration_ms,
        };
        let status = if run.aborted {
            SegmentStatus::Truncated
        } else {
            outcome.status(settings.tolerance_ms)
        };
        if let Some(last) = batch.outcomes.last_mut() {
            *last = outcome;
        }
        ctx.emit(PipelineEvent::SegmentFinished { index, status });

        match status {
            SegmentStatus::Complete => {
                batch.total_ms += entry.duration_ms;
            }
            SegmentStatus::Truncated => {
                log::info!(
                    "Segment {} stopped at {} of {} ms, skipping the rest",
                    index,
                    completed_ms,
                    entry.duration_ms
                );
                batch.total_ms += completed_ms;
                batch.truncated = true;
                break;
            }
        }
    }
    Ok(())
}

/// Ends the loop after a cancel, keeping whatever parts are complete.
fn stop_early(batch: &mut SegmentBatch) -> Result<()> {
    if batch.outcomes.is_empty() {
        return Err(Error::Cancelled);
    }
    batch.truncated = true;
    Ok(())
}
