use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, NaiveDateTime, Utc};

const TMX_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Current time in TMX basic format (`20240131T235959Z`).
pub fn tmx_date() -> String {
    format_tmx_date(Utc::now())
}

pub fn format_tmx_date(date: DateTime<Utc>) -> String {
    date.format(TMX_DATE_FORMAT).to_string()
}

/// Milliseconds since the epoch, `None` for dates that don't parse.
pub fn parse_tmx_date(date: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(date.trim(), TMX_DATE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Unit id source: seeded from the clock, strictly increasing within the process.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator { last: AtomicU64::new(0) }
    }

    pub fn next_id(&self) -> String {
        let now = now_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self.last.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return candidate.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}
