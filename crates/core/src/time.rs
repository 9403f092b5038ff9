//! Wall-clock helpers.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC 3339 (e.g. `2025-01-01T12:00:00.123+00:00`).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_utc() {
        let ts = now_iso();
        assert!(ts.ends_with("+00:00"), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
