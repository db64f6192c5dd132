use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// One value read from ffmpeg's `-progress` stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTick {
    /// Output time so far, in milliseconds.
    Elapsed(u64),
    /// `progress=end` or end of stream. Always the last tick.
    Done,
}

/// Lazy, finite reader over `key=value` progress lines. Only `out_time_ms`
/// and the terminal `progress=end` are interpreted.
pub struct ProgressReader<R> {
    lines: Lines<R>,
    finished: bool,
}

impl<R: AsyncBufRead + Unpin> ProgressReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    /// Next tick, or `None` once [`ProgressTick::Done`] has been returned.
    /// Cancel-safe: dropping the future never loses a value.
    pub async fn next_tick(&mut self) -> io::Result<Option<ProgressTick>> {
        if self.finished {
            return Ok(None);
        }
        while let Some(line) = self.lines.next_line().await? {
            if let Some(tick) = parse_line(&line) {
                if tick == ProgressTick::Done {
                    self.finished = true;
                }
                return Ok(Some(tick));
            }
        }
        self.finished = true;
        Ok(Some(ProgressTick::Done))
    }
}

fn parse_line(line: &str) -> Option<ProgressTick> {
    let (key, value) = line.trim().split_once('=')?;
    match key.trim() {
        // ffmpeg reports microseconds under this key despite the name.
        "out_time_ms" => value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|us| *us >= 0)
            .map(|us| ProgressTick::Elapsed(us as u64 / 1000)),
        "progress" if value.trim() == "end" => Some(ProgressTick::Done),
        _ => None,
    }
}
