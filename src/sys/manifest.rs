use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::model::manifest::resolution_height;
use crate::model::{Manifest, Quality, VideoId};
use crate::sys::session::Session;

const API_LEVEL: &str = "10";
const PLAYLIST_INDEX: &str = "0";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VodResponse {
    #[serde(default)]
    pub data: Option<VodData>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VodData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub file_resolution: Option<String>,
    #[serde(default)]
    pub files: Vec<VodFile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VodFile {
    #[serde(default, deserialize_with = "lenient_millis")]
    pub duration: u64,
    #[serde(default)]
    pub quality_info: Vec<QualityInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QualityInfo {
    #[serde(default)]
    pub resolution: String,
    #[serde(default)]
    pub file: String,
}

/// The API reports durations either as numbers or numeric strings.
fn lenient_millis<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map(|f| f.max(0.0) as u64).unwrap_or(0),
        _ => 0,
    })
}

impl VodData {
    fn offers_height(&self, height: u32) -> bool {
        self.files
            .iter()
            .flat_map(|f| &f.quality_info)
            .any(|q| resolution_height(&q.resolution) == Some(height))
    }

    /// Requested height when offered, otherwise the reported native one.
    pub fn target_height(&self, quality: Quality) -> Option<u32> {
        match quality.height() {
            Some(height) if self.offers_height(height) => Some(height),
            requested => {
                if let Some(height) = requested {
                    log::info!("{}p not offered, falling back to native resolution", height);
                }
                self.file_resolution.as_deref().and_then(resolution_height)
            }
        }
    }
}

/// Keeps every variant at the target height, in API order, paired with its
/// group's duration.
pub(crate) fn select_segments(
    video_id: VideoId,
    data: &VodData,
    quality: Quality,
) -> Result<Manifest> {
    let mut manifest = Manifest::new(data.title.clone().unwrap_or_default());
    if let Some(target) = data.target_height(quality) {
        for file in &data.files {
            for variant in &file.quality_info {
                if resolution_height(&variant.resolution) == Some(target) {
                    manifest.add(variant.file.clone(), file.duration);
                }
            }
        }
    }

    if manifest.is_empty() {
        return Err(Error::EmptyManifest { video_id });
    }
    Ok(manifest)
}

pub async fn get_manifest(session: &Session, video_id: VideoId, quality: Quality) -> Result<Manifest> {
    log::info!("Fetching manifest for VOD {} ({})", video_id, quality);
    let title_no = video_id.to_string();
    let form = [
        ("nTitleNo", title_no.as_str()),
        ("nApiLevel", API_LEVEL),
        ("nPlaylistidx", PLAYLIST_INDEX),
    ];
    let body: VodResponse = session
        .client()
        .post(&session.endpoints().vod)
        .form(&form)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(Error::http("manifest"))?
        .json()
        .await
        .map_err(Error::http("manifest"))?;

    let data = body.data.unwrap_or_default();
    let manifest = select_segments(video_id, &data, quality)?;
    log::info!(
        "Manifest for '{}': {} segments, {} ms",
        manifest.title(),
        manifest.len(),
        manifest.total_duration_ms()
    );
    Ok(manifest)
}

/// Resolves a player page URL and fetches its manifest.
pub async fn resolve_manifest(session: &Session, raw_url: &str, quality: Quality) -> Result<Manifest> {
    let video_id = VideoId::resolve(raw_url)?;
    get_manifest(session, video_id, quality).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "result": 1,
        "data": {
            "title": "Evening stream",
            "file_resolution": "1920x1080",
            "files": [
                {
                    "duration": 120000,
                    "quality_info": [
                        {"resolution": "1920x1080", "file": "https://cdn/a_1080.m3u8"},
                        {"resolution": "1280x720", "file": "https://cdn/a_720.m3u8"}
                    ]
                },
                {
                    "duration": "90000",
                    "quality_info": [
                        {"resolution": "1280x720", "file": "https://cdn/b_720.m3u8"},
                        {"resolution": "1920x1080", "file": "https://cdn/b_1080.m3u8"}
                    ]
                }
            ]
        }
    }"#;

    fn data() -> VodData {
        serde_json::from_str::<VodResponse>(PAYLOAD).unwrap().data.unwrap()
    }

    fn urls(manifest: &Manifest) -> Vec<&str> {
        manifest.entries().iter().map(|e| e.url.as_str()).collect()
    }

    #[test]
    fn auto_uses_native_resolution() {
        let manifest = select_segments(VideoId::from(1), &data(), Quality::Auto).unwrap();
        assert_eq!(manifest.title(), "Evening stream");
        assert_eq!(urls(&manifest), ["https://cdn/a_1080.m3u8", "https://cdn/b_1080.m3u8"]);
        let durations: Vec<u64> = manifest.entries().iter().map(|e| e.duration_ms).collect();
        assert_eq!(durations, [120_000, 90_000]);
    }

    #[test]
    fn offered_quality_is_selected_in_order() {
        let manifest = select_segments(VideoId::from(1), &data(), Quality::P720).unwrap();
        assert_eq!(urls(&manifest), ["https://cdn/a_720.m3u8", "https://cdn/b_720.m3u8"]);
    }

    #[test]
    fn unoffered_quality_falls_back_to_native() {
        let manifest = select_segments(VideoId::from(1), &data(), Quality::P1440).unwrap();
        assert_eq!(urls(&manifest), ["https://cdn/a_1080.m3u8", "https://cdn/b_1080.m3u8"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let data = data();
        let first = select_segments(VideoId::from(1), &data, Quality::P720).unwrap();
        let second = select_segments(VideoId::from(1), &data, Quality::P720).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn no_matching_variant_is_an_empty_manifest() {
        let mut data = data();
        data.file_resolution = Some("3840x2160".to_string());
        assert!(matches!(
            select_segments(VideoId::from(9), &data, Quality::Auto),
            Err(Error::EmptyManifest { video_id }) if video_id == VideoId::from(9)
        ));
    }

    #[test]
    fn null_title_still_parses() {
        let body: VodResponse = serde_json::from_str(
            r#"{"data": {"title": null, "file_resolution": "1280x720",
                "files": [{"duration": 1000, "quality_info": [{"resolution": "1280x720", "file": "https://cdn/x.m3u8"}]}]}}"#,
        )
        .unwrap();
        let manifest = select_segments(VideoId::from(5), &body.data.unwrap(), Quality::Auto).unwrap();
        assert_eq!(manifest.title(), "");
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn missing_data_is_an_empty_manifest() {
        let body: VodResponse = serde_json::from_str(r#"{"result": -1}"#).unwrap();
        let data = body.data.unwrap_or_default();
        assert!(matches!(
            select_segments(VideoId::from(3), &data, Quality::Auto),
            Err(Error::EmptyManifest { .. })
        ));
    }
}
