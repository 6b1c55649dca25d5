#![forbid(unsafe_code)]

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// The instant one command runs at, shared by every request it builds and
/// by the envelope it prints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CommandClock {
    pub(crate) now_ms: i64,
}

impl CommandClock {
    /// Uses `override_ms` when given, the wall clock otherwise.
    pub(crate) fn new(override_ms: Option<i64>) -> Self {
        Self {
            now_ms: override_ms.unwrap_or_else(wall_clock_ms),
        }
    }

    /// RFC 3339 in UTC; instants `time` cannot represent print as raw millis.
    pub(crate) fn rfc3339(&self) -> String {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.now_ms) * 1_000_000)
            .ok()
            .and_then(|at| at.format(&Rfc3339).ok())
            .unwrap_or_else(|| format!("{}ms", self.now_ms))
    }
}

fn wall_clock_ms() -> i64 {
    let ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(ms.max(0)).unwrap_or(i64::MAX)
}
