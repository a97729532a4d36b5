//! Month key normalization for the collection board.
//!
//! Storage keys are canonical "MM-YYYY" strings. Display names and several
//! historical spellings of the same period ("JUNHO/25", "junho/2025",
//! "06/2025") all resolve onto the canonical key so a period is never
//! duplicated by a spelling difference.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Fixed display table, indexed by month number - 1.
const MONTH_NAMES: [&str; 12] = [
    "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
    "Outubro", "Novembro", "Dezembro",
];

/// Lowercased name -> month number, for parsing legacy spellings.
static MONTH_NUMBERS: Lazy<HashMap<String, u32>> = Lazy::new(|| {
    MONTH_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i as u32 + 1))
        .collect()
});

/// Convert a canonical "MM-YYYY" key into its display name, e.g.
/// "06-2025" -> "Junho/25". Malformed keys are returned unchanged so the
/// display layer never crashes on bad stored data.
pub fn to_display_name(key: &str) -> String {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() != 2 {
        return key.to_string();
    }
    let month = match parts[0].parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => m,
        _ => return key.to_string(),
    };
    let year = match parts[1].parse::<i32>() {
        Ok(y) => y,
        Err(_) => return key.to_string(),
    };
    format!("{}/{:02}", MONTH_NAMES[(month - 1) as usize], year.rem_euclid(100))
}

/// Resolve any known spelling of a period onto its canonical "MM-YYYY" key.
///
/// Accepted shapes, case-insensitive, with either '/' or '-' separators:
/// numeric month ("06-2025", "06/2025"), month name with 4-digit year
/// ("junho/2025"), month name with 2-digit year ("JUNHO/25"). Anything
/// else resolves to `None`; two genuinely different periods must never be
/// merged by a lax parse.
pub fn resolve_legacy_key(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    let parts: Vec<&str> = trimmed.split(['-', '/']).collect();
    if parts.len() != 2 {
        return None;
    }

    let month = if parts[0].chars().all(|c| c.is_ascii_digit()) {
        match parts[0].parse::<u32>() {
            Ok(m) if (1..=12).contains(&m) => m,
            _ => return None,
        }
    } else {
        *MONTH_NUMBERS.get(&parts[0].to_lowercase())?
    };

    let year_part = parts[1];
    if !year_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year = match year_part.len() {
        4 => year_part.parse::<i32>().ok()?,
        2 => 2000 + year_part.parse::<i32>().ok()?,
        _ => return None,
    };

    Some(format!("{:02}-{}", month, year))
}

/// Every spelling the store may contain for one semantic period. Used by
/// fallback scans and by the period sweep on deletion. The canonical key
/// comes first.
pub fn legacy_spellings(canonical_key: &str) -> Vec<String> {
    let mut spellings = vec![canonical_key.to_string()];

    let parts: Vec<&str> = canonical_key.split('-').collect();
    if parts.len() != 2 {
        return spellings;
    }
    let month = match parts[0].parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => m,
        _ => return spellings,
    };
    let year = match parts[1].parse::<i32>() {
        Ok(y) => y,
        Err(_) => return spellings,
    };

    let name = MONTH_NAMES[(month - 1) as usize];
    let short_year = year.rem_euclid(100);
    for styled in [name.to_string(), name.to_uppercase(), name.to_lowercase()] {
        spellings.push(format!("{}/{:02}", styled, short_year));
        spellings.push(format!("{}/{}", styled, year));
    }
    spellings.push(format!("{:02}/{}", month, year));

    spellings.dedup();
    spellings
}

/// The key of the period immediately before `key` (month - 1, with the
/// year decrement when the month wraps past January).
pub fn previous_period_key(key: &str) -> Option<String> {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let month = match parts[0].parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => m,
        _ => return None,
    };
    let year = parts[1].parse::<i32>().ok()?;

    let (prev_month, prev_year) = if month == 1 { (12, year - 1) } else { (month - 1, year) };
    Some(format!("{:02}-{}", prev_month, prev_year))
}

/// First day of the month a canonical key names. Used for period ordering.
pub fn first_of_month(key: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let month = parts[0].parse::<u32>().ok()?;
    let year = parts[1].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Canonical key for a calendar date's month.
pub fn key_for_date(date: NaiveDate) -> String {
    format!("{:02}-{}", date.month(), date.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_display_name() {
        assert_eq!(to_display_name("06-2025"), "Junho/25");
        assert_eq!(to_display_name("01-2024"), "Janeiro/24");
        assert_eq!(to_display_name("12-2099"), "Dezembro/99");
        assert_eq!(to_display_name("03-2025"), "Março/25");
    }

    #[test]
    fn test_to_display_name_malformed_passthrough() {
        // Deliberately non-throwing: bad keys come back unchanged
        assert_eq!(to_display_name("garbage"), "garbage");
        assert_eq!(to_display_name("13-2025"), "13-2025");
        assert_eq!(to_display_name("00-2025"), "00-2025");
        assert_eq!(to_display_name("06-20xx"), "06-20xx");
        assert_eq!(to_display_name("06-2025-01"), "06-2025-01");
        assert_eq!(to_display_name(""), "");
    }

    #[test]
    fn test_resolve_legacy_key_unifies_spellings() {
        // All spellings of June 2025 land on one canonical key
        assert_eq!(resolve_legacy_key("JUNHO/25"), Some("06-2025".to_string()));
        assert_eq!(resolve_legacy_key("junho/2025"), Some("06-2025".to_string()));
        assert_eq!(resolve_legacy_key("Junho/25"), Some("06-2025".to_string()));
        assert_eq!(resolve_legacy_key("06-2025"), Some("06-2025".to_string()));
        assert_eq!(resolve_legacy_key("06/2025"), Some("06-2025".to_string()));
        assert_eq!(resolve_legacy_key(" 6-2025 "), Some("06-2025".to_string()));
    }

    #[test]
    fn test_resolve_legacy_key_never_merges_distinct_periods() {
        assert_eq!(resolve_legacy_key("07-2025"), Some("07-2025".to_string()));
        assert_ne!(resolve_legacy_key("07-2025"), resolve_legacy_key("06-2025"));
        assert_ne!(resolve_legacy_key("junho/2024"), resolve_legacy_key("junho/2025"));
    }

    #[test]
    fn test_resolve_legacy_key_rejects_garbage() {
        assert_eq!(resolve_legacy_key("naomes/25"), None);
        assert_eq!(resolve_legacy_key("13-2025"), None);
        assert_eq!(resolve_legacy_key("junho"), None);
        assert_eq!(resolve_legacy_key("junho/225"), None);
        assert_eq!(resolve_legacy_key(""), None);
    }

    #[test]
    fn test_legacy_spellings_cover_known_variants() {
        let spellings = legacy_spellings("06-2025");
        assert_eq!(spellings[0], "06-2025");
        assert!(spellings.contains(&"JUNHO/25".to_string()));
        assert!(spellings.contains(&"junho/2025".to_string()));
        assert!(spellings.contains(&"Junho/25".to_string()));
        assert!(spellings.contains(&"06/2025".to_string()));
        // Every variant resolves back to the canonical key
        for s in &spellings {
            assert_eq!(resolve_legacy_key(s), Some("06-2025".to_string()), "spelling {}", s);
        }
    }

    #[test]
    fn test_previous_period_key() {
        assert_eq!(previous_period_key("07-2025"), Some("06-2025".to_string()));
        assert_eq!(previous_period_key("01-2025"), Some("12-2024".to_string()));
        assert_eq!(previous_period_key("bogus"), None);
    }

    #[test]
    fn test_first_of_month_ordering() {
        let may = first_of_month("05-2025").unwrap();
        let june = first_of_month("06-2025").unwrap();
        assert!(may < june);
    }
}
