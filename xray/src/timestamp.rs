use crate::error::{Error, Result};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Format a timestamp as an ISO 8601 UTC string with second precision.
///
/// Sub-second components are dropped, never rounded, so `12:00:00.999Z`
/// becomes `12:00:00Z`.
pub fn truncate_iso_time(time: OffsetDateTime) -> Result<String> {
    let utc = time.to_offset(UtcOffset::UTC);
    let truncated = utc
        .replace_nanosecond(0)
        .map_err(|e| Error::SchemaMismatch(e.to_string()))?;
    truncated
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .map_err(|e| Error::SchemaMismatch(e.to_string()))
}

pub fn unix_millis(time: OffsetDateTime) -> i128 {
    time.unix_timestamp_nanos() / 1_000_000
}

pub fn parse(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|e| Error::SchemaMismatch(format!("invalid timestamp {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_fractional_seconds() {
        let time = parse("2022-11-28T17:41:12.999Z").unwrap();
        assert_eq!(truncate_iso_time(time).unwrap(), "2022-11-28T17:41:12Z");
    }

    #[test]
    fn converts_offsets_to_utc() {
        let time = parse("2022-11-28T19:41:12.234+02:00").unwrap();
        assert_eq!(truncate_iso_time(time).unwrap(), "2022-11-28T17:41:12Z");
    }

    #[test]
    fn millis_since_epoch() {
        let time = parse("2022-11-28T17:41:12.234Z").unwrap();
        assert_eq!(unix_millis(time), 1669657272234);
    }
}
