//! Range and pattern rules shared by the stage validators.

use std::sync::LazyLock;

use regex::Regex;

use super::error::{ValidationError, ValidationResult};

/// Pattern every predicted resolution time must match.
pub const RESOLUTION_TIME_PATTERN: &str = r"^\d+h \d+m$";

static RESOLUTION_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RESOLUTION_TIME_PATTERN).expect("static pattern compiles"));

/// Bounds of the routing stage's workload estimate.
pub const MIN_ESTIMATED_WORKLOAD: i64 = 1;
pub const MAX_ESTIMATED_WORKLOAD: i64 = 10;

/// A finite value in `[0, 1]`.
pub fn check_unit_interval(field: &'static str, value: f64) -> ValidationResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::range(field, value, "a number in [0, 1]"))
    }
}

/// An integral number (`3` or `3.0`, not `3.5`) returned as `i64`.
fn integral(field: &'static str, value: f64, expected: &'static str) -> ValidationResult<i64> {
    if value.is_finite() && value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(ValidationError::range(field, value, expected))
    }
}

/// Integer in `[1, 10]`.
pub fn check_estimated_workload(field: &'static str, value: f64) -> ValidationResult<u8> {
    const EXPECTED: &str = "an integer in [1, 10]";
    let n = integral(field, value, EXPECTED)?;
    if (MIN_ESTIMATED_WORKLOAD..=MAX_ESTIMATED_WORKLOAD).contains(&n) {
        Ok(n as u8)
    } else {
        Err(ValidationError::range(field, value, EXPECTED))
    }
}

/// Integer `>= 0`.
pub fn check_non_negative_count(field: &'static str, value: f64) -> ValidationResult<u32> {
    const EXPECTED: &str = "an integer >= 0";
    let n = integral(field, value, EXPECTED)?;
    u32::try_from(n).map_err(|_| ValidationError::range(field, value, EXPECTED))
}

/// `"<h>h <m>m"`, e.g. `"2h 30m"`.
pub fn check_resolution_time(field: &'static str, value: &str) -> ValidationResult<()> {
    if RESOLUTION_TIME_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::FormatViolation {
            field,
            value: value.to_string(),
            pattern: RESOLUTION_TIME_PATTERN,
        })
    }
}

/// Render minutes in the resolution-time format.
pub fn format_minutes(minutes: u64) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Inverse of [`format_minutes`]. `None` when the pattern does not match.
pub fn parse_resolution_time(value: &str) -> Option<u64> {
    if !RESOLUTION_TIME_RE.is_match(value) {
        return None;
    }
    let (hours, rest) = value.split_once("h ")?;
    let minutes = rest.strip_suffix('m')?;
    Some(hours.parse::<u64>().ok()? * 60 + minutes.parse::<u64>().ok()?)
}
