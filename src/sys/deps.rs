use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct FfmpegStatus {
    pub version: String,
    /// Git snapshot builds sometimes misbehave with `-progress`.
    pub is_release: bool,
    pub ffprobe: Option<PathBuf>,
}

pub fn check_ffmpeg(ffmpeg_path: &str) -> Result<FfmpegStatus> {
    let output = Command::new(ffmpeg_path)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute ffmpeg at '{}'", ffmpeg_path))?;

    if !output.status.success() {
        bail!("ffmpeg command failed with status: {}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or_default();
    let Some(version) = parse_version(first_line) else {
        bail!("'{}' does not look like ffmpeg", ffmpeg_path);
    };

    Ok(FfmpegStatus {
        is_release: !version.contains("git"),
        version,
        ffprobe: locate_ffprobe(ffmpeg_path),
    })
}

/// `ffmpeg version 7.1.1-essentials_build-www.gyan.dev Copyright ...` -> `7.1.1`
fn parse_version(first_line: &str) -> Option<String> {
    let mut words = first_line.split_whitespace();
    if words.next()? != "ffmpeg" || words.next()? != "version" {
        return None;
    }
    let raw = words.next()?;
    if raw.contains("git") {
        Some(raw.to_string())
    } else {
        raw.split('-').next().map(str::to_string)
    }
}

/// ffprobe on PATH for a bare `ffmpeg`, otherwise next to the given binary.
pub fn locate_ffprobe(ffmpeg_path: &str) -> Option<PathBuf> {
    if ffmpeg_path == "ffmpeg" {
        let works = Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        return works.then(|| PathBuf::from("ffprobe"));
    }

    let dir = Path::new(ffmpeg_path).parent()?;
    ["ffprobe", "ffprobe.exe"]
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_and_git_versions() {
        assert_eq!(
            parse_version("ffmpeg version 7.1.1-essentials_build-www.gyan.dev Copyright (c) 2000-2025"),
            Some("7.1.1".to_string())
        );
        assert_eq!(
            parse_version("ffmpeg version 6.0 Copyright (c) 2000-2023"),
            Some("6.0".to_string())
        );
        assert_eq!(
            parse_version("ffmpeg version N-118000-g1234abcd-git-2025 Copyright"),
            Some("N-118000-g1234abcd-git-2025".to_string())
        );
        assert_eq!(parse_version("ffprobe version 7.1"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn ffprobe_is_looked_up_next_to_custom_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        assert_eq!(locate_ffprobe(&ffmpeg.to_string_lossy()), None);

        std::fs::write(dir.path().join("ffprobe"), b"").unwrap();
        assert_eq!(
            locate_ffprobe(&ffmpeg.to_string_lossy()),
            Some(dir.path().join("ffprobe"))
        );
    }
}
