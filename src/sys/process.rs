use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::sys::progress::{ProgressReader, ProgressTick};

/// How long ffmpeg gets to finish after being asked to quit.
const QUIT_GRACE: Duration = Duration::from_secs(10);

/// Shared stop request for the subprocess that is currently running.
#[derive(Clone, Debug)]
pub struct AbortSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clears a request once a driver has acted on it.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves once a stop has been requested.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once set.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// `-headers` value: every forwarded header, then one `Cookie` line per cookie.
pub fn header_block(headers: &[(String, String)], cookies: &[String]) -> String {
    let mut block = String::new();
    for (name, value) in headers {
        block.push_str(&format!("{}: {}\r\n", name, value));
    }
    for cookie in cookies {
        block.push_str(&format!("Cookie: {}\r\n", cookie));
    }
    block
}

pub fn build_download_command(
    ffmpeg: &str,
    url: &str,
    output: &Path,
    headers: &[(String, String)],
    cookies: &[String],
    turbo: bool,
) -> Command {
    let mut cmd = Command::new(ffmpeg);
    let block = header_block(headers, cookies);
    if !block.is_empty() {
        cmd.arg("-headers").arg(block);
    }
    cmd.arg("-i").arg(url);
    cmd.args(["-c", "copy"]);
    cmd.args(["-movflags", "faststart+frag_keyframe"]);
    cmd.args(["-f", "mp4"]);
    cmd.args(["-v", "error"]);
    cmd.args(["-progress", "pipe:1"]);
    if turbo {
        cmd.args(["-threads", "0"]);
    }
    // The output path is reserved up front, so overwrite it.
    cmd.arg("-y");
    cmd.arg(output);
    cmd
}

pub fn build_concat_command(ffmpeg: &str, list_file: &Path, output: &Path, turbo: bool) -> Command {
    let mut cmd = Command::new(ffmpeg);
    cmd.args(["-f", "concat", "-safe", "0"]);
    cmd.arg("-i").arg(list_file);
    cmd.args(["-c", "copy"]);
    cmd.args(["-v", "error"]);
    cmd.args(["-progress", "pipe:1"]);
    if turbo {
        cmd.args(["-threads", "0"]);
    }
    cmd.arg("-y");
    cmd.arg(output);
    cmd
}

/// Duration of a media file according to ffprobe, in milliseconds.
pub async fn probe_duration_ms(ffprobe: &Path, file: &Path) -> Option<u64> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(file)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| log::warn!("Failed to run ffprobe: {}", e))
        .ok()?;

    if !output.status.success() {
        log::warn!("ffprobe exited with {} for {}", output.status, file.display());
        return None;
    }
    let seconds: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    Some((seconds * 1000.0) as u64)
}

/// What happened to one ffmpeg run.
#[derive(Debug)]
pub struct RunOutcome {
    pub status: ExitStatus,
    /// Highest output time observed on the progress stream.
    pub completed_ms: u64,
    pub aborted: bool,
}

/// Spawns `cmd`, drains its progress stream until done, and waits for exit.
/// The child is reaped on every path, including errors.
pub async fn run_with_progress(
    cmd: Command,
    abort: &AbortSignal,
    on_progress: impl FnMut(u64),
) -> Result<RunOutcome> {
    run_with_grace(cmd, abort, QUIT_GRACE, on_progress).await
}

/// After an abort, `grace` bounds how long the child may take to act on
/// `q`. A second abort request kills it immediately.
pub(crate) async fn run_with_grace(
    mut cmd: Command,
    abort: &AbortSignal,
    grace: Duration,
    mut on_progress: impl FnMut(u64),
) -> Result<RunOutcome> {
    let program = cmd.as_std().get_program().to_string_lossy().to_string();
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    log::debug!("Spawning: {:?}", cmd.as_std());
    let mut child = cmd.spawn().map_err(|source| Error::Spawn {
        program: program.clone(),
        source,
    })?;

    let mut stdin = child.stdin.take();
    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill().await;
        return Err(Error::Io(std::io::Error::other("ffmpeg stdout was not captured")));
    };
    let mut reader = ProgressReader::new(BufReader::new(stdout));

    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);

    let mut completed_ms = 0;
    let mut aborted = false;
    let mut kill = false;
    loop {
        tokio::select! {
            tick = reader.next_tick() => match tick {
                Ok(Some(ProgressTick::Elapsed(ms))) => {
                    if ms > completed_ms {
                        completed_ms = ms;
                        on_progress(ms);
                    }
                }
                Ok(Some(ProgressTick::Done)) | Ok(None) => break,
                Err(e) => {
                    log::warn!("Progress stream of {} broke off: {}", program, e);
                    break;
                }
            },
            _ = abort.triggered() => {
                abort.reset();
                if aborted {
                    log::warn!("Second abort request, killing {}", program);
                    kill = true;
                    break;
                }
                log::info!("Abort requested, asking {} to stop", program);
                aborted = true;
                deadline.as_mut().reset(tokio::time::Instant::now() + grace);
                request_quit(&mut stdin).await;
            }
            _ = &mut deadline, if aborted => {
                log::warn!("{} did not stop in time, killing", program);
                kill = true;
                break;
            }
        }
    }
    drop(stdin);
    drop(reader);

    let status = if kill {
        let _ = child.kill().await;
        child.wait().await?
    } else if aborted {
        match tokio::time::timeout_at(deadline.deadline(), child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                log::warn!("{} did not exit in time, killing", program);
                let _ = child.kill().await;
                child.wait().await?
            }
        }
    } else {
        match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e.into());
            }
        }
    };
    log::debug!("{} exited with {} after {} ms of output", program, status, completed_ms);

    Ok(RunOutcome {
        status,
        completed_ms,
        aborted,
    })
}

/// `q` on stdin is ffmpeg's graceful stop command.
async fn request_quit(stdin: &mut Option<ChildStdin>) {
    if let Some(mut pipe) = stdin.take() {
        let _ = pipe.write_all(b"q\n").await;
        let _ = pipe.flush().await;
        let _ = pipe.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn download_command_injects_headers_and_cookies() {
        let headers = vec![
            ("user-agent".to_string(), "UA".to_string()),
            ("referer".to_string(), "https://play.sooplive.co.kr/".to_string()),
        ];
        let cookies = vec!["AuthTicket=abc".to_string(), "UserTicket=def".to_string()];
        let cmd = build_download_command(
            "ffmpeg",
            "https://cdn/a.m3u8",
            Path::new("/tmp/out.mp4"),
            &headers,
            &cookies,
            false,
        );
        let args = args(&cmd);

        assert_eq!(args[0], "-headers");
        assert_eq!(
            args[1],
            "user-agent: UA\r\nreferer: https://play.sooplive.co.kr/\r\n\
             Cookie: AuthTicket=abc\r\nCookie: UserTicket=def\r\n"
        );
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "https://cdn/a.m3u8");
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-f", "mp4"]));
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:1"]));
        assert!(!args.contains(&"-threads".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[test]
    fn turbo_requests_all_threads() {
        let cmd = build_concat_command("ffmpeg", Path::new("list.txt"), Path::new("out.mp4"), true);
        let args = args(&cmd);
        assert!(args.windows(2).any(|w| w == ["-threads", "0"]));
        assert!(args.windows(4).any(|w| w == ["-f", "concat", "-safe", "0"]));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[tokio::test]
    async fn abort_signal_resolves_after_trigger() {
        let signal = AbortSignal::new();
        assert!(!signal.is_triggered());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };
        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        signal.reset();
        assert!(!signal.is_triggered());
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> Command {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("ffmpeg-stand-in");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Command::new(path)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn abort_sends_quit_and_keeps_reached_time() {
        let dir = tempfile::tempdir().unwrap();
        // Exit code 255 only when `q` arrives on stdin.
        let cmd = script(
            dir.path(),
            "echo out_time_ms=2000000\nread -r cmd\n[ \"$cmd\" = q ] && exit 255\nexit 0",
        );
        let signal = AbortSignal::new();
        let trigger = signal.clone();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_with_progress(cmd, &signal, move |_| trigger.trigger()),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(outcome.aborted);
        assert_eq!(outcome.completed_ms, 2000);
        assert_eq!(outcome.status.code(), Some(255));
        assert!(!signal.is_triggered());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unresponsive_child_is_killed_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        // Ignores stdin and keeps stdout open.
        let cmd = script(dir.path(), "echo out_time_ms=1000000\nexec sleep 60");
        let signal = AbortSignal::new();
        let trigger = signal.clone();

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_with_grace(cmd, &signal, Duration::from_millis(200), move |_| trigger.trigger()),
        )
        .await
        .expect("stalled child was not killed")
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.aborted);
        assert_eq!(outcome.completed_ms, 1000);
        assert!(!outcome.status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_abort_kills_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = script(dir.path(), "echo out_time_ms=1000000\nexec sleep 60");
        let signal = AbortSignal::new();
        let trigger = signal.clone();

        let run = tokio::spawn(async move {
            run_with_grace(cmd, &signal, Duration::from_secs(60), |_| {}).await
        });
        trigger.trigger();
        // The runner clears the flag once it has sent `q`.
        while trigger.is_triggered() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.trigger();

        let outcome = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(outcome.aborted);
        assert!(!outcome.status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let cmd = Command::new("/nonexistent/ffmpeg-for-tests");
        let result = run_with_progress(cmd, &AbortSignal::new(), |_| {}).await;
        assert!(matches!(result, Err(Error::Spawn { .. })));
    }
}
