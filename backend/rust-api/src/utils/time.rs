use chrono::{DateTime, SecondsFormat, Utc};

/// ISO-8601 UTC truncated to seconds with `:` replaced by `-`, safe for file
/// names on every platform (`2026-10-16T09-30-05`).
pub fn file_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// RFC 3339 with millisecond precision, as used in export envelopes.
pub fn iso_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
