// 📅 Date Stamp - "Actualizado: DD/MM/YY" marker in the published page
//
// Best effort: every outcome here is reported, none of them fails a run.

use chrono::NaiveDate;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_INDEX_FILE: &str = "index.html";

static STAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Actualizado:\s*)\d{2}/\d{2}/\d{2}").expect("date stamp pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateStampOutcome {
    Updated(String),
    AlreadyCurrent(String),
    PatternMissing,
    FileMissing,
    WriteFailed(String),
}

impl DateStampOutcome {
    pub fn describe(&self, path: &Path) -> String {
        match self {
            DateStampOutcome::Updated(date) => format!("Updated date stamp to: {}", date),
            DateStampOutcome::AlreadyCurrent(date) => format!("Date stamp already current: {}", date),
            DateStampOutcome::PatternMissing => {
                format!("Could not find date pattern in {}", path.display())
            }
            DateStampOutcome::FileMissing => format!("{} not found, skipping date update", path.display()),
            DateStampOutcome::WriteFailed(reason) => {
                format!("Failed to update date in {}: {}", path.display(), reason)
            }
        }
    }
}

/// "16/01/26" for 2026-01-16
pub fn format_stamp(date: NaiveDate) -> String {
    date.format("%d/%m/%y").to_string()
}

/// Content with every stamp set to `date`; None when no stamp exists
pub fn rewrite_date_stamp(content: &str, date: NaiveDate) -> Option<String> {
    if !STAMP_RE.is_match(content) {
        return None;
    }
    let stamp = format_stamp(date);
    Some(
        STAMP_RE
            .replace_all(content, |caps: &regex::Captures<'_>| format!("{}{}", &caps[1], stamp))
            .into_owned(),
    )
}

/// Rewrite the stamp in `path`, writing only when it changes
pub fn refresh_date_stamp(path: &Path, date: NaiveDate) -> DateStampOutcome {
    let Ok(content) = std::fs::read_to_string(path) else {
        return DateStampOutcome::FileMissing;
    };

    let Some(updated) = rewrite_date_stamp(&content, date) else {
        return DateStampOutcome::PatternMissing;
    };

    let stamp = format_stamp(date);
    if updated == content {
        return DateStampOutcome::AlreadyCurrent(stamp);
    }

    match std::fs::write(path, updated) {
        Ok(()) => DateStampOutcome::Updated(stamp),
        Err(e) => DateStampOutcome::WriteFailed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 16).unwrap()
    }

    #[test]
    fn test_rewrite() {
        let html = "<footer>Actualizado: 02/12/25</footer>";
        assert_eq!(
            rewrite_date_stamp(html, day()).as_deref(),
            Some("<footer>Actualizado: 16/01/26</footer>")
        );
    }

    #[test]
    fn test_rewrite_keeps_spacing() {
        let html = "Actualizado:   02/12/25";
        assert_eq!(rewrite_date_stamp(html, day()).as_deref(), Some("Actualizado:   16/01/26"));
    }

    #[test]
    fn test_rewrite_without_stamp() {
        assert_eq!(rewrite_date_stamp("<p>Sin fecha</p>", day()), None);
    }

    #[test]
    fn test_refresh_outcomes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");

        assert_eq!(refresh_date_stamp(&path, day()), DateStampOutcome::FileMissing);

        std::fs::write(&path, "<p>Actualizado: 01/01/25</p>").unwrap();
        assert_eq!(
            refresh_date_stamp(&path, day()),
            DateStampOutcome::Updated("16/01/26".to_string())
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>Actualizado: 16/01/26</p>");

        assert_eq!(
            refresh_date_stamp(&path, day()),
            DateStampOutcome::AlreadyCurrent("16/01/26".to_string())
        );

        std::fs::write(&path, "<p>sin marca</p>").unwrap();
        assert_eq!(refresh_date_stamp(&path, day()), DateStampOutcome::PatternMissing);
    }
}
