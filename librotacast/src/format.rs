//! Post formatting under a hard length budget
//!
//! A post is the item body, an optional `[YYYY-MM-DD HH:MM:SS]` stamp and the
//! configured tags, joined by newlines. Two characters of the budget are
//! always reserved for those newlines, so the output never exceeds
//! `max_length` whichever parts are present. All lengths are counted in
//! `char`s.

use chrono::{DateTime, FixedOffset};

use crate::config::FormatConfig;
use crate::error::{ConfigError, FormatError, Result};

pub const ELLIPSIS: &str = "...";

const SEPARATOR_RESERVE: i64 = 2;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// `[` + `YYYY-MM-DD HH:MM:SS` + `]`
const STAMP_LEN: i64 = 21;

/// A post ready for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPost {
    pub text: String,
    pub truncated: bool,
}

impl FormattedPost {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    config: FormatConfig,
    suffix: String,
}

impl Formatter {
    /// Build a formatter, rejecting budgets that cannot fit any content
    pub fn new(config: FormatConfig) -> Result<Self> {
        let suffix = config.tags.join(" ");
        let stamp_len = if config.add_timestamp { STAMP_LEN } else { 0 };
        check_budget(config.max_length, char_len(&suffix), stamp_len).map_err(|e| {
            ConfigError::Invalid {
                field: "format.max_length".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self { config, suffix })
    }

    /// Skip the budget check so format-time failures can be exercised
    #[cfg(test)]
    pub(crate) fn unchecked(config: FormatConfig) -> Self {
        let suffix = config.tags.join(" ");
        Self { config, suffix }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Format `body` using the current time in the configured timezone
    pub fn format(&self, body: &str) -> std::result::Result<FormattedPost, FormatError> {
        self.format_at(body, self.config.timezone.now())
    }

    /// Format `body` with an explicit clock reading
    ///
    /// `now` is ignored unless timestamps are enabled.
    pub fn format_at(
        &self,
        body: &str,
        now: DateTime<FixedOffset>,
    ) -> std::result::Result<FormattedPost, FormatError> {
        let stamp = if self.config.add_timestamp {
            format!("[{}]", now.format(TIMESTAMP_FORMAT))
        } else {
            String::new()
        };

        let available = check_budget(
            self.config.max_length,
            char_len(&self.suffix),
            char_len(&stamp),
        )?;

        let (body, truncated) = truncate(body, available as usize);

        let text = [body.as_str(), stamp.as_str(), self.suffix.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(FormattedPost { text, truncated })
    }
}

/// Characters left for the body, or an error if the ellipsis would not fit
fn check_budget(
    max_length: usize,
    suffix_len: i64,
    stamp_len: i64,
) -> std::result::Result<i64, FormatError> {
    let available = max_length as i64 - suffix_len - stamp_len - SEPARATOR_RESERVE;
    if available < char_len(ELLIPSIS) {
        return Err(FormatError::BudgetTooSmall {
            max_length,
            available,
        });
    }
    Ok(available)
}

fn truncate(body: &str, available: usize) -> (String, bool) {
    if body.chars().count() <= available {
        return (body.to_string(), false);
    }

    let keep = available - ELLIPSIS.len();
    let mut truncated: String = body.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    (truncated, true)
}

fn char_len(s: &str) -> i64 {
    s.chars().count() as i64
}
