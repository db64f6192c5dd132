use std::path::PathBuf;

use crate::error::Result;
use crate::model::{ConcatStatus, Manifest, PipelineEvent};
use crate::sys::concat::concat_segments;
use crate::sys::download::{download_segments, DriverContext};
use crate::sys::local::{remove_temp_files, CleanupReport};

/// Summary of one manifest run.
#[derive(Debug)]
pub struct PipelineReport {
    pub output: PathBuf,
    pub concat: ConcatStatus,
    pub segments: usize,
    /// A segment came up short and later ones were skipped.
    pub truncated: bool,
    pub total_ms: u64,
    pub cleanup: CleanupReport,
}

/// Download every segment, join them, then remove the parts.
pub async fn run(ctx: &DriverContext<'_>, manifest: &Manifest) -> Result<PipelineReport> {
    log::info!("Starting download of '{}' ({} segments)", manifest.title(), manifest.len());

    let batch = download_segments(ctx, manifest).await?;
    let parts = batch.paths();

    let concat = match concat_segments(ctx, manifest.title(), &parts, batch.total_ms).await {
        Ok(output) => output,
        Err(e) => {
            let report = remove_temp_files(&parts);
            if !report.is_clean() {
                log::warn!("{} temporary files left behind", report.remaining.len());
            }
            return Err(e);
        }
    };

    let cleanup = remove_temp_files(&parts);
    ctx.emit(PipelineEvent::CleanupFinished {
        removed: cleanup.removed.len(),
        remaining: cleanup.remaining.len(),
    });

    Ok(PipelineReport {
        output: concat.path,
        concat: concat.status,
        segments: parts.len(),
        truncated: batch.truncated,
        total_ms: batch.total_ms,
        cleanup,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::Error;
    use crate::sys::download::tests::{abort_during, settings};
    use crate::sys::process::AbortSignal;
    use crate::sys::session::Session;

    #[tokio::test]
    async fn two_full_segments_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let session = Session::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = DriverContext {
            session: &session,
            settings: &settings,
            abort: AbortSignal::new(),
            events: tx,
        };
        let mut manifest = Manifest::new("Late night <live>");
        manifest.add("https://cdn/urlA", 120_000);
        manifest.add("https://cdn/urlB", 90_000);

        let report = run(&ctx, &manifest).await.unwrap();
        assert_eq!(report.total_ms, 210_000);
        assert_eq!(report.segments, 2);
        assert_eq!(report.concat, ConcatStatus::Complete);
        assert_eq!(report.cleanup.removed.len(), 2);
        assert!(report.cleanup.is_clean());
        assert_eq!(report.output, dir.path().join("Late night live.mp4"));
        assert!(!dir.path().join("tmp").exists());

        let again = run(&ctx, &manifest).await.unwrap();
        assert_eq!(again.output, dir.path().join("Late night live(1).mp4"));
    }

    #[tokio::test]
    async fn failing_segment_leaves_no_output_or_parts() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let session = Session::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = DriverContext {
            session: &session,
            settings: &settings,
            abort: AbortSignal::new(),
            events: tx,
        };
        let mut manifest = Manifest::new("broken");
        manifest.add("https://cdn/fail", 120_000);

        let err = run(&ctx, &manifest).await.unwrap_err();
        assert!(matches!(err, Error::SegmentDownload { index: 1, .. }));
        assert!(err.is_recoverable());
        assert!(!dir.path().join("broken.mp4").exists());
        assert!(!dir.path().join("tmp").exists());
    }

    #[tokio::test]
    async fn aborted_segment_is_still_joined() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let session = Session::new().unwrap();
        let abort = AbortSignal::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = abort_during(rx, abort.clone(), 2, true);
        let ctx = DriverContext {
            session: &session,
            settings: &settings,
            abort,
            events: tx,
        };
        let mut manifest = Manifest::new("stopped early");
        manifest.add("https://cdn/urlA", 120_000);
        manifest.add("https://cdn/slow", 120_000);
        manifest.add("https://cdn/urlB", 90_000);

        let report = run(&ctx, &manifest).await.unwrap();
        drop(ctx);
        let events = watcher.await.unwrap();

        assert!(report.truncated);
        assert_eq!(report.segments, 2);
        assert_eq!(report.total_ms, 150_000);
        assert_eq!(report.concat, ConcatStatus::Complete);
        assert_eq!(report.output, dir.path().join("stopped early.mp4"));
        assert!(report.output.exists());
        assert_eq!(report.cleanup.removed.len(), 2);
        assert!(events.contains(&PipelineEvent::ConcatStarted { target_ms: 150_000 }));
    }
}
