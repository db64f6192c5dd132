use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::model::{ConcatStatus, PipelineEvent};
use crate::sys::download::DriverContext;
use crate::sys::local::{self, reserve_unique_path};
use crate::sys::process::{build_concat_command, run_with_progress};

#[derive(Debug)]
pub struct ConcatOutput {
    pub path: PathBuf,
    pub status: ConcatStatus,
}

/// Writes an ffmpeg concat directive listing `parts` by absolute path, in order.
pub fn write_concat_list(dir: &Path, parts: &[PathBuf]) -> io::Result<NamedTempFile> {
    let mut list = tempfile::Builder::new()
        .prefix("concat-")
        .suffix(".txt")
        .tempfile_in(dir)?;
    for part in parts {
        let absolute = std::path::absolute(part)?;
        let quoted = absolute.to_string_lossy().replace('\'', r"'\''");
        writeln!(list, "file '{}'", quoted)?;
    }
    list.flush()?;
    Ok(list)
}

/// Joins the downloaded parts into `<work_dir>/<title>.mp4` without re-encoding.
pub async fn concat_segments(
    ctx: &DriverContext<'_>,
    title: &str,
    parts: &[PathBuf],
    target_ms: u64,
) -> Result<ConcatOutput> {
    let settings = ctx.settings;
    let list_dir = parts
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.tmp_dir());
    let list = write_concat_list(&list_dir, parts)?;
    let output = reserve_unique_path(&settings.work_dir, title, "mp4")?;

    ctx.emit(PipelineEvent::ConcatStarted { target_ms });
    log::info!("Concatenating {} parts into {}", parts.len(), output.display());

    let cmd = build_concat_command(&settings.ffmpeg_path, list.path(), &output, settings.turbo);
    let run = run_with_progress(cmd, &ctx.abort, |completed_ms| {
        ctx.emit(PipelineEvent::ConcatProgress { completed_ms });
    })
    .await;
    drop(list);

    let run = match run {
        Ok(run) => run,
        Err(e) => {
            local::discard_if_empty(&output);
            return Err(e);
        }
    };
    if !run.status.success() && !run.aborted {
        log::error!("Concatenation failed: ffmpeg exited with {}", run.status);
        local::discard_if_empty(&output);
        return Err(Error::Concat { status: run.status });
    }

    let status = if run.aborted || run.completed_ms + settings.tolerance_ms < target_ms {
        ConcatStatus::Aborted {
            reached_ms: run.completed_ms,
            target_ms,
        }
    } else {
        ConcatStatus::Complete
    };
    log::info!("Concatenation finished: {:?}", status);
    ctx.emit(PipelineEvent::ConcatFinished { status });

    Ok(ConcatOutput {
        path: output,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_preserves_order_and_uses_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![
            dir.path().join("b.mp4"),
            dir.path().join("a.mp4"),
            dir.path().join("it's.mp4"),
        ];
        let list = write_concat_list(dir.path(), &parts).unwrap();
        let content = std::fs::read_to_string(list.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("file '{}'", parts[0].display()));
        assert_eq!(lines[1], format!("file '{}'", parts[1].display()));
        assert!(lines[2].ends_with(r"it'\''s.mp4'"));
        assert!(lines.iter().all(|l| l.starts_with("file '/") || cfg!(windows)));
    }

    #[test]
    fn list_is_removed_when_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let list = write_concat_list(dir.path(), &[dir.path().join("a.mp4")]).unwrap();
        let path = list.path().to_path_buf();
        assert!(path.exists());
        drop(list);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn short_output_reports_abort() {
        use crate::sys::download::tests::settings;
        use crate::sys::process::AbortSignal;
        use crate::sys::session::Session;

        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let session = Session::new().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = DriverContext {
            session: &session,
            settings: &settings,
            abort: AbortSignal::new(),
            events: tx,
        };
        let tmp = settings.tmp_dir();
        let part = reserve_unique_path(&tmp, "part", "mp4").unwrap();

        // The stand-in reports 210 s for any concat list.
        let output = concat_segments(&ctx, "title", &[part.clone()], 300_000).await.unwrap();
        assert_eq!(
            output.status,
            ConcatStatus::Aborted {
                reached_ms: 210_000,
                target_ms: 300_000
            }
        );

        let output = concat_segments(&ctx, "title", &[part], 210_000).await.unwrap();
        assert_eq!(output.status, ConcatStatus::Complete);
        assert_eq!(output.path, dir.path().join("title(1).mp4"));
    }
}
