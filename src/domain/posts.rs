//! Post addressing and display helpers.
//!
//! Posts are addressed by their publish date in the site timezone plus their
//! slug, so the same conversion must be used when building links and when
//! resolving them.

use chrono::{DateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use time::{
    Date, Month, OffsetDateTime, UtcOffset, format_description::FormatItem,
    macros::format_description,
};

use super::error::DomainError;

pub const HUMAN_DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year] [hour]:[minute]");

/// Number of words kept in listing excerpts.
pub const EXCERPT_WORDS: usize = 30;

/// Offset of `tz` from UTC at the given instant.
pub fn local_offset(instant: OffsetDateTime, tz: Tz) -> UtcOffset {
    let utc = instant.to_offset(UtcOffset::UTC);
    DateTime::<Utc>::from_timestamp(utc.unix_timestamp(), 0)
        .map(|datetime| {
            tz.offset_from_utc_datetime(&datetime.naive_utc())
                .fix()
                .local_minus_utc()
        })
        .and_then(|seconds| UtcOffset::from_whole_seconds(seconds).ok())
        .unwrap_or(UtcOffset::UTC)
}

pub fn local_datetime(instant: OffsetDateTime, tz: Tz) -> OffsetDateTime {
    instant.to_offset(local_offset(instant, tz))
}

/// Calendar date of `publish` as observed in the site timezone.
pub fn local_publish_date(publish: OffsetDateTime, tz: Tz) -> Date {
    local_datetime(publish, tz).date()
}

/// Parse the `year/month/day` segments of a post URL.
///
/// Segments must be plain ASCII digits and form a real calendar date.
pub fn parse_publish_date(year: &str, month: &str, day: &str) -> Result<Date, DomainError> {
    let year: i32 = parse_digits(year, "year")?;
    let month: u8 = parse_digits(month, "month")?;
    let day: u8 = parse_digits(day, "day")?;

    let month = Month::try_from(month)
        .map_err(|_| DomainError::validation(format!("month `{month}` is out of range")))?;
    Date::from_calendar_date(year, month, day)
        .map_err(|err| DomainError::validation(format!("invalid publish date: {err}")))
}

fn parse_digits<T: std::str::FromStr>(value: &str, field: &str) -> Result<T, DomainError> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(DomainError::validation(format!(
            "`{field}` must be a non-negative integer"
        )));
    }
    value
        .parse::<T>()
        .map_err(|_| DomainError::validation(format!("`{field}` is out of range")))
}

/// Slugs in URLs are restricted to ASCII letters, digits, `-` and `_`.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
}

pub fn post_path(date: Date, slug: &str) -> String {
    format!(
        "/{}/{}/{}/{}/",
        date.year(),
        u8::from(date.month()),
        date.day(),
        slug
    )
}

pub fn share_path(post_id: i64) -> String {
    format!("/{post_id}/share/")
}

pub fn tag_path(slug: &str) -> String {
    format!("/tag/{slug}/")
}

pub fn format_human_datetime(instant: OffsetDateTime, tz: Tz) -> String {
    let local = local_datetime(instant, tz);
    local
        .format(HUMAN_DATETIME_FORMAT)
        .unwrap_or_else(|_| local.to_string())
}

/// Keep the first `limit` whitespace-separated words, marking the cut with an ellipsis.
pub fn truncate_words(text: &str, limit: usize) -> String {
    let mut words = text.split_whitespace();
    let kept: Vec<&str> = words.by_ref().take(limit).collect();
    let mut excerpt = kept.join(" ");
    if words.next().is_some() {
        excerpt.push_str(" …");
    }
    excerpt
}

/// Split free text into paragraphs on blank lines.
pub fn paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parses_unpadded_and_padded_segments() {
        assert_eq!(
            parse_publish_date("2024", "3", "07").expect("valid date"),
            date!(2024 - 03 - 07)
        );
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(parse_publish_date("2024", "13", "1").is_err());
        assert!(parse_publish_date("2023", "2", "29").is_err());
        assert!(parse_publish_date("2024", "x", "1").is_err());
        assert!(parse_publish_date("2024", "-1", "1").is_err());
    }

    #[test]
    fn publish_date_follows_site_timezone() {
        let publish = datetime!(2024-01-31 23:30 UTC);
        assert_eq!(
            local_publish_date(publish, chrono_tz::UTC),
            date!(2024 - 01 - 31)
        );
        assert_eq!(
            local_publish_date(publish, chrono_tz::Europe::Berlin),
            date!(2024 - 02 - 01)
        );
        assert_eq!(
            local_publish_date(publish, chrono_tz::America::New_York),
            date!(2024 - 01 - 31)
        );
    }

    #[test]
    fn post_path_drops_zero_padding() {
        assert_eq!(
            post_path(date!(2024 - 03 - 07), "hello-world"),
            "/2024/3/7/hello-world/"
        );
    }

    #[test]
    fn slug_charset_is_enforced() {
        assert!(is_valid_slug("rust_2024-notes"));
        assert!(!is_valid_slug("spaces here"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn truncation_marks_cut() {
        assert_eq!(truncate_words("one two three", 5), "one two three");
        assert_eq!(truncate_words("one two three", 2), "one two …");
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let parts = paragraphs("first line\r\nstill first\r\n\r\n\r\nsecond\n\n  ");
        assert_eq!(parts, vec!["first line\nstill first", "second"]);
    }
}
