use chrono::{Days, NaiveDate};

/// Maximum span in days the history endpoint serves per request.
/// Intraday resolutions are capped at 100 days, daily at 365; anything
/// unrecognised falls back to the intraday cap.
fn max_days(resolution: &str) -> u64 {
    match resolution {
        "D" => 365,
        "1" | "5" | "15" | "30" | "45" | "60" => 100,
        _ => 100,
    }
}

/// Inclusive date span of one historical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateChunk {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateChunk {
    pub fn span_days(&self) -> i64 {
        (self.to - self.from).num_days()
    }
}

/// Split `[start, end]` into contiguous chunks bounded by the per-resolution
/// limit: each chunk's end plus one day is the next chunk's start, and the
/// final chunk ends exactly on `end`. `start >= end` yields no chunks.
pub fn date_chunks(start: NaiveDate, end: NaiveDate, resolution: &str) -> Vec<DateChunk> {
    let span = Days::new(max_days(resolution));
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let to = cursor
            .checked_add_days(span)
            .map(|limit| limit.min(end))
            .unwrap_or(end);
        chunks.push(DateChunk { from: cursor, to });
        cursor = match to.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    chunks
}
