use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "soopdl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(help_template = "NAME:
   {name} - SOOP VOD downloader

USAGE:
   soopdl [options]

VERSION:
   {version}

DESCRIPTION:
   Downloads SOOP VODs by player URL. Every part of the VOD is fetched with
   ffmpeg, joined into one MP4 in the current directory, and the temporary
   parts under ./tmp are removed afterwards.

   Controls:
     • Paste a VOD URL, optionally followed by a quality (e.g. `<url> 720p`)
     • Press Enter on an empty prompt to quit
     • Press Ctrl+C during a download to stop it and keep what was fetched

GLOBAL OPTIONS:
{options}
")]
pub struct Cli {
    /// Target quality: 1440p, 1080p, 720p, 540p, 360p or auto.
    /// Falls back to the native resolution when not offered.
    #[arg(short = 'q', long = "quality")]
    pub quality: Option<String>,

    /// Use the config file (created when missing)
    #[arg(short = 'c', long = "config")]
    pub use_config: bool,

    /// Path to the ffmpeg executable
    #[arg(short = 'f', long = "ffmpeg")]
    pub ffmpeg: Option<String>,

    /// Let ffmpeg use every CPU thread (-threads 0)
    #[arg(short = 't', long = "turbo")]
    pub turbo: bool,

    /// Download every URL listed in this file before prompting
    #[arg(short = 'b', long = "batch")]
    pub batch: Option<PathBuf>,

    /// Log out of SOOP before exiting
    #[arg(long = "logout")]
    pub logout: bool,

    /// Write debug output to the log file
    #[arg(long = "verbose")]
    pub verbose: bool,
}
