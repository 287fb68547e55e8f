//! Canonical normalized ranking model.
//!
//! Ranking data reaches the bot in several shapes: replicated database rows
//! with numeric columns, legacy flat API fields, and nested per-category
//! payloads whose numbers may arrive pre-formatted with thousands
//! separators. Everything is normalized into [`RankingCard`] at the boundary
//! and only that type travels through the coordinator and the renderer.

use serde::{Deserialize, Serialize};

/// Sentinel shown for any value the sources could not provide.
pub const UNKNOWN: &str = "알 수 없음";

/// Direction of a rank change.
///
/// The source of truth is the explicit `change_type` tag from the upstream
/// data, never the sign of the numeric delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Up,
    Down,
    None,
}

impl ChangeType {
    /// Parse the upstream tag, defaulting to `None` when absent or unknown.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("up") => ChangeType::Up,
            Some("down") => ChangeType::Down,
            _ => ChangeType::None,
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Up => write!(f, "up"),
            ChangeType::Down => write!(f, "down"),
            ChangeType::None => write!(f, "none"),
        }
    }
}

/// Format an integer with comma thousands separators.
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    let first_group = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - first_group) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Extract an integer from a raw count that may carry thousands separators
/// or a trailing unit (e.g. `"1,234위"`). Returns `None` when the input has
/// no digits at all.
pub fn parse_count(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    cleaned.parse().ok()
}

/// One ranking category (combat, charm or life), fully normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankScore {
    /// Formatted rank, e.g. `"1,234위"`, or [`UNKNOWN`] when unranked.
    pub rank: String,
    /// Formatted power score, e.g. `"123,456"`, or [`UNKNOWN`].
    pub power: String,
    /// Rank delta since the previous snapshot; missing deltas become 0.
    pub change: i64,
    pub change_type: ChangeType,
}

impl RankScore {
    /// Normalize raw source fields into a canonical score.
    ///
    /// Idempotent: feeding a normalized score's own fields back in yields an
    /// identical score.
    pub fn normalize(
        rank: Option<&str>,
        power: Option<&str>,
        change: Option<&str>,
        change_type: Option<&str>,
    ) -> Self {
        let rank = rank
            .and_then(parse_count)
            .map(|n| format!("{}위", format_thousands(n)))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let power = power
            .and_then(parse_count)
            .map(format_thousands)
            .unwrap_or_else(|| UNKNOWN.to_string());
        let change = change.and_then(parse_count).unwrap_or(0);

        Self {
            rank,
            power,
            change,
            change_type: ChangeType::from_tag(change_type),
        }
    }

    /// Marker rendered next to the delta: `-` for no movement, arrows for
    /// tagged movement.
    pub fn change_marker(&self) -> &'static str {
        if self.change == 0 {
            return "-";
        }
        match self.change_type {
            ChangeType::Up => "🔺",
            ChangeType::Down => "🔻",
            ChangeType::None => "-",
        }
    }
}

/// A character's full ranking snapshot across the three categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingCard {
    pub character: String,
    pub server: String,
    pub class: String,
    pub combat: RankScore,
    pub charm: RankScore,
    pub life: RankScore,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_thousands_groups_digits() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
        assert_eq!(format_thousands(-4321), "-4,321");
    }

    #[test]
    fn parse_count_strips_separators_and_units() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("1,234위"), Some(1234));
        assert_eq!(parse_count("123456"), Some(123456));
        assert_eq!(parse_count("-12"), Some(-12));
        assert_eq!(parse_count(UNKNOWN), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn normalize_defaults_missing_fields() {
        let score = RankScore::normalize(None, None, None, None);
        assert_eq!(score.rank, UNKNOWN);
        assert_eq!(score.power, UNKNOWN);
        assert_eq!(score.change, 0);
        assert_eq!(score.change_type, ChangeType::None);
        assert_eq!(score.change_marker(), "-");
    }

    #[test]
    fn normalize_formats_raw_numbers() {
        let score = RankScore::normalize(Some("1234"), Some("987654"), Some("12"), Some("up"));
        assert_eq!(score.rank, "1,234위");
        assert_eq!(score.power, "987,654");
        assert_eq!(score.change, 12);
        assert_eq!(score.change_type, ChangeType::Up);
        assert_eq!(score.change_marker(), "🔺");
    }

    #[test]
    fn change_direction_follows_tag_not_sign() {
        // A negative delta with an "up" tag still renders as movement up
        let score = RankScore::normalize(Some("10"), Some("100"), Some("-3"), Some("up"));
        assert_eq!(score.change, -3);
        assert_eq!(score.change_type, ChangeType::Up);
        assert_eq!(score.change_marker(), "🔺");

        // An untagged nonzero delta renders no direction
        let score = RankScore::normalize(Some("10"), Some("100"), Some("5"), None);
        assert_eq!(score.change_type, ChangeType::None);
        assert_eq!(score.change_marker(), "-");
    }

    #[test]
    fn zero_change_renders_dash_regardless_of_tag() {
        let score = RankScore::normalize(Some("10"), Some("100"), Some("0"), Some("down"));
        assert_eq!(score.change_marker(), "-");
    }

    #[test]
    fn normalize_is_idempotent() {
        let first = RankScore::normalize(Some("1,234위"), Some("123,456"), Some("7"), Some("down"));
        let second = RankScore::normalize(
            Some(&first.rank),
            Some(&first.power),
            Some(&first.change.to_string()),
            Some(&first.change_type.to_string()),
        );
        assert_eq!(first, second);

        // The unranked sentinel also round-trips unchanged
        let unranked = RankScore::normalize(None, None, None, None);
        let again = RankScore::normalize(
            Some(&unranked.rank),
            Some(&unranked.power),
            Some(&unranked.change.to_string()),
            Some(&unranked.change_type.to_string()),
        );
        assert_eq!(unranked, again);
    }
}
