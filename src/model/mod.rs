pub mod download;
pub mod manifest;
pub mod settings;
pub mod vod;

pub use download::{ConcatStatus, DownloadOutcome, PipelineEvent, SegmentStatus};
pub use manifest::{Manifest, Quality};
pub use settings::{Credentials, Settings};
pub use vod::VideoId;
