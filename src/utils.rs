//! Small shared helpers: timestamps, id generation, name sanitisation.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Current UTC time, RFC3339 with seconds precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

const TASK_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const TASK_ID_LEN: usize = 8;

/// Generate an 8-character URL-safe opaque task id.
pub fn generate_task_id() -> String {
    let mut rng = rand::rng();
    (0..TASK_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TASK_ID_ALPHABET.len());
            TASK_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Sanitise a human-provided name into a branch-safe slug.
///
/// Lower-cases, replaces spaces with `-`, collapses runs of anything
/// outside `[a-z0-9-]` into a single `-`, trims leading/trailing `-`, and
/// substitutes `"task"` if the result is empty.
pub fn sanitize_branch_name(name: &str) -> String {
    let lower = name.to_lowercase().replace(' ', "-");

    let mut collapsed = String::with_capacity(lower.len());
    let mut last_was_dash = false;
    for ch in lower.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            collapsed.push(ch);
            last_was_dash = ch == '-';
        } else if !last_was_dash {
            collapsed.push('-');
            last_was_dash = true;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "task".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a step sequence number per the spec's `NextStepID` contract:
/// the successor of `prev` (0 if `prev` is `None`), left-padded to at
/// least 4 digits via the `(10000 + n)` stringify-and-slice trick.
pub fn format_step_id(n: u64) -> String {
    if n < 10_000 {
        format!("{:05}", 10_000 + n)[1..].to_string()
    } else {
        n.to_string()
    }
}

/// Parse a step id string (e.g. `"0007"`) back into its numeric value.
pub fn parse_step_id(s: &str) -> Option<u64> {
    s.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_spaces_and_case() {
        assert_eq!(sanitize_branch_name("Fix Login Bug"), "fix-login-bug");
    }

    #[test]
    fn collapses_punctuation_runs() {
        assert_eq!(sanitize_branch_name("a!!!b   c"), "a-b-c");
    }

    #[test]
    fn trims_leading_trailing_dashes() {
        assert_eq!(sanitize_branch_name("  ---weird---  "), "weird");
    }

    #[test]
    fn empty_name_becomes_task() {
        assert_eq!(sanitize_branch_name("!!!"), "task");
        assert_eq!(sanitize_branch_name(""), "task");
    }

    #[test]
    fn step_id_starts_at_0001() {
        assert_eq!(format_step_id(1), "0001");
    }

    #[test]
    fn step_id_zero_pads_to_four() {
        assert_eq!(format_step_id(42), "0042");
        assert_eq!(format_step_id(9999), "9999");
    }

    #[test]
    fn step_id_grows_past_four_digits() {
        assert_eq!(format_step_id(10_000), "10000");
        assert_eq!(format_step_id(123_456), "123456");
    }

    #[test]
    fn task_id_has_expected_shape() {
        let id = generate_task_id();
        assert_eq!(id.len(), TASK_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}
