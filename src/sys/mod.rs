pub mod concat;
pub mod config;
pub mod deps;
pub mod download;
pub mod local;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod session;
