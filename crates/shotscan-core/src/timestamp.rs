//! `HH:MM:SS.mmm` timestamps, the format every output file uses.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("expected HH:MM:SS.mmm, got {0:?}")]
    Format(String),
    #[error("minutes out of range in {0:?}")]
    Minutes(String),
    #[error("seconds out of range in {0:?}")]
    Seconds(String),
}

/// Format seconds as zero-padded `HH:MM:SS.mmm`, rounded to the nearest millisecond.
/// Negative input is clamped to zero.
pub fn format_hms(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let m = (total_s / 60) % 60;
    let h = total_s / 3600;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

/// Parse `HH:MM:SS`, `HH:MM:SS.m`, `HH:MM:SS.mm` or `HH:MM:SS.mmm` into seconds.
/// Fractions shorter than three digits are right-padded (`.5` is 500 ms); longer ones truncated.
pub fn parse_hms(text: &str) -> Result<f64, TimestampError> {
    let text = text.trim();
    let format_err = || TimestampError::Format(text.to_string());

    let mut parts = text.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(format_err());
    };

    let hours: u64 = h.parse().map_err(|_| format_err())?;
    let minutes: u64 = m.parse().map_err(|_| format_err())?;
    if minutes > 59 {
        return Err(TimestampError::Minutes(text.to_string()));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (s, ""),
    };
    let secs: u64 = whole.parse().map_err(|_| format_err())?;
    if secs > 59 {
        return Err(TimestampError::Seconds(text.to_string()));
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format_err());
    }
    let millis: u64 = if frac.is_empty() {
        0
    } else {
        let padded: String = frac.chars().chain("000".chars()).take(3).collect();
        padded.parse().map_err(|_| format_err())?
    };

    Ok((hours * 3600 + minutes * 60 + secs) as f64 + millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_pads_every_field() {
        assert_eq!(format_hms(0.0), "00:00:00.000");
        assert_eq!(format_hms(723.45), "00:12:03.450");
        assert_eq!(format_hms(3600.0 + 61.005), "01:01:01.005");
    }

    #[test]
    fn format_rounds_to_millisecond_without_overflowing_fields() {
        assert_eq!(format_hms(59.9996), "00:01:00.000");
        assert_eq!(format_hms(1.4000000000000001), "00:00:01.400");
    }

    #[test]
    fn format_clamps_negative() {
        assert_eq!(format_hms(-3.0), "00:00:00.000");
    }

    #[test]
    fn format_allows_more_than_99_hours() {
        assert_eq!(format_hms(100.0 * 3600.0), "100:00:00.000");
    }

    #[test]
    fn parse_accepts_short_fractions() {
        assert_eq!(parse_hms("00:00:01.5").unwrap(), 1.5);
        assert_eq!(parse_hms("00:00:01.25").unwrap(), 1.25);
        assert_eq!(parse_hms("00:00:01").unwrap(), 1.0);
        assert_eq!(parse_hms(" 01:02:03.004 ").unwrap(), 3723.004);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(parse_hms("1:02"), Err(TimestampError::Format(_))));
        assert!(matches!(parse_hms("00:60:00.000"), Err(TimestampError::Minutes(_))));
        assert!(matches!(parse_hms("00:00:60.000"), Err(TimestampError::Seconds(_))));
        assert!(matches!(parse_hms("00:00:0x.000"), Err(TimestampError::Format(_))));
        assert!(matches!(parse_hms("00:00:01.-5"), Err(TimestampError::Format(_))));
    }

    #[test]
    fn format_then_parse_is_stable() {
        for t in [0.0, 1.4, 12.345, 4000.999] {
            let text = format_hms(t);
            assert_eq!(format_hms(parse_hms(&text).unwrap()), text);
        }
    }
}
