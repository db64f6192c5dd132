use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::Error;

/// Host serving the VOD player pages.
pub const VOD_HOST: &str = "vod.sooplive.co.kr";

/// Numeric identifier of a VOD, taken from `https://vod.sooplive.co.kr/player/<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoId(u64);

impl VideoId {
    /// Parses a player page URL. No network access.
    pub fn resolve(raw_url: &str) -> Result<Self, Error> {
        let input = raw_url.trim();
        let invalid = |reason| Error::InvalidUrl {
            input: input.to_string(),
            reason,
        };

        let url = Url::parse(input).map_err(|_| invalid("not a URL"))?;
        if url.host_str() != Some(VOD_HOST) {
            return Err(invalid("not a SOOP VOD player URL"));
        }

        let mut segments = url
            .path_segments()
            .ok_or_else(|| invalid("not a SOOP VOD player URL"))?;
        if !segments.any(|s| s == "player") {
            return Err(invalid("not a SOOP VOD player URL"));
        }

        segments
            .next()
            .and_then(|s| s.parse::<u64>().ok())
            .map(VideoId)
            .ok_or_else(|| invalid("VOD number not found"))
    }

}

impl From<u64> for VideoId {
    fn from(value: u64) -> Self {
        VideoId(value)
    }
}

impl FromStr for VideoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::resolve(s)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
