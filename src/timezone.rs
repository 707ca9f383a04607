//! IANA time zone lookups.

use crate::error::FingerprintGenerationError;
use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an IANA zone name.
pub fn parse_zone(name: &str) -> Result<Tz, FingerprintGenerationError> {
    name.parse::<Tz>()
        .map_err(|_| FingerprintGenerationError::InvalidTimezone(name.to_string()))
}

pub fn is_valid_zone(name: &str) -> bool {
    name.parse::<Tz>().is_ok()
}

/// `Date.prototype.getTimezoneOffset` for `zone` at `epoch_ms`: minutes to
/// add to local time to reach UTC, so zones east of Greenwich are negative.
pub fn offset_minutes_at(zone: Tz, epoch_ms: i64) -> i32 {
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_ms).unwrap_or_default();
    let local_minus_utc = zone
        .offset_from_utc_datetime(&utc.naive_utc())
        .fix()
        .local_minus_utc();
    -local_minus_utc / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zone() {
        assert!(parse_zone("Asia/Ho_Chi_Minh").is_ok());
        assert!(parse_zone("Europe/London").is_ok());
        assert!(matches!(
            parse_zone("Mars/Olympus_Mons"),
            Err(FingerprintGenerationError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_offsets() {
        let hcm = parse_zone("Asia/Ho_Chi_Minh").unwrap();
        assert_eq!(offset_minutes_at(hcm, 1_700_000_000_000), -420);

        // 2024-01-15 and 2024-07-15, either side of US daylight saving.
        let ny = parse_zone("America/New_York").unwrap();
        assert_eq!(offset_minutes_at(ny, 1_705_320_000_000), 300);
        assert_eq!(offset_minutes_at(ny, 1_721_044_800_000), 240);

        assert_eq!(offset_minutes_at(Tz::UTC, 0), 0);
    }
}
