//! Progress extraction from the separation tool's stderr.
//!
//! The tool renders a textual progress bar like:
//!
//! ```text
//!   12%|#####     | 12/100 [00:05<00:40,  2.2seconds/s]
//! ```
//!
//! Any stderr line containing a `%` is a candidate; the token immediately
//! before the first `%` is taken as the percentage. Lines without a
//! numeric token there are silently ignored. Values are applied as
//! parsed, so a multi-pass run that restarts its bar reports the lower
//! value again.

/// Parsed progress in the range 0..=100, or `None` if the line carries
/// no usable percentage.
pub fn parse_line(line: &str) -> Option<i16> {
    let before_percent = line.split('%').next()?;
    let token = before_percent.split_whitespace().next_back()?;
    let value: f64 = token.parse().ok()?;
    Some((value.trunc() as i64).clamp(0, 100) as i16)
}

/// Human-readable status message for a parsed percentage.
pub fn message_for(progress: i16) -> String {
    format!("Separating stems: {progress}%")
}
