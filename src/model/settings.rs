use std::path::PathBuf;

use crate::model::manifest::Quality;

/// Allowed shortfall between expected and produced duration before a
/// download counts as truncated.
pub const DEFAULT_TOLERANCE_MS: u64 = 160;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Only set for accounts with two-factor protection.
    pub secondary_password: Option<String>,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        secondary_password: Option<String>,
    ) -> Self {
        Self {
            username: username.into().trim().to_string(),
            password: password.into().trim().to_string(),
            secondary_password: secondary_password
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// Resolved run configuration shared by the drivers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub ffmpeg_path: String,
    pub ffprobe_path: Option<PathBuf>,
    pub turbo: bool,
    pub quality: Quality,
    pub tolerance_ms: u64,
    /// Output lands here, temporary segments under `<work_dir>/tmp`.
    pub work_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: None,
            turbo: false,
            quality: Quality::Auto,
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            work_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    pub fn tmp_dir(&self) -> PathBuf {
        self.work_dir.join("tmp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_secondary_password_is_absent() {
        let creds = Credentials::new(" user ", "pw", Some("  ".to_string()));
        assert_eq!(creds.username, "user");
        assert_eq!(creds.secondary_password, None);

        let creds = Credentials::new("user", "pw", Some("2fa".to_string()));
        assert_eq!(creds.secondary_password.as_deref(), Some("2fa"));
    }
}
