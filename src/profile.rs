//! Profile: journal metadata scraped from the public profile page.
//!
//! The profile page is the only place that reports how many entries a
//! journal has and when it was created, which the posts driver needs to
//! auto-discover a download range. Extraction is multi-strategy: the post
//! count comes from an embedded `Site.remote` JSON assignment, falling back
//! to the statistics block; dates come from localized text fragments, mapped
//! through a month-name table covering five languages.

use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;

use crate::config::{profile_url, validate_username};
use crate::error::{ExporterError, Result};
use crate::http::Session;

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SITE_REMOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Site\.remote\s*=\s*(\{.*?\});").expect("valid regex"));

#[allow(clippy::expect_used)]
static STAT_ENTRYCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)class="b-profile-stat-item\s+b-profile-stat-entrycount"[^>]*>.*?class="b-profile-stat-value">(\d+)</div>"#,
    )
    .expect("valid regex")
});

#[allow(clippy::expect_used)]
static CREATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"on\s+(\d+)\s+(\p{L}+)\s+(\d{4})").expect("valid regex"));

#[allow(clippy::expect_used)]
static UPDATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="tooltip"[^>]*>(\d+)\s+(\p{L}+)\s+(\d{4})</span>"#)
        .expect("valid regex")
});

/// Journal metadata extracted from the profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileData {
    /// Total number of journal entries the profile reports.
    pub post_count: u64,

    /// Year the journal was created.
    pub created_year: i32,

    /// Month the journal was created (1-12).
    pub created_month: u32,

    /// Year of the last update, when the profile exposes one.
    pub updated_year: Option<i32>,

    /// Month of the last update, when the profile exposes one.
    pub updated_month: Option<u32>,
}

impl ProfileData {
    /// Upper bound for month-range discovery: the last-update date when
    /// known, otherwise the current month.
    #[must_use]
    pub fn update_bound(&self) -> (i32, u32) {
        match (self.updated_year, self.updated_month) {
            (Some(year), Some(month)) => (year, month),
            _ => {
                let now = chrono::Local::now();
                (now.year(), now.month())
            }
        }
    }
}

/// Download and parse a journal's profile page.
pub fn download_profile(session: &Session, username: &str) -> Result<ProfileData> {
    validate_username(username)?;
    tracing::info!(username, "Downloading profile");

    let response = session.get(&profile_url(username), &[])?;
    let body = response.text()?;
    parse_profile(&body)
}

/// Extract profile metadata from HTML.
///
/// The post count and the creation date are required (the posts driver needs
/// a start bound); the update date is best-effort.
pub fn parse_profile(html: &str) -> Result<ProfileData> {
    let post_count = extract_post_count_json(html)
        .or_else(|| extract_post_count_html(html))
        .ok_or(ExporterError::ProfilePostCount)?;

    let (created_year, created_month) = extract_creation_date(html)?;
    let (updated_year, updated_month) = match extract_update_date(html) {
        Some((year, month)) => (Some(year), Some(month)),
        None => (None, None),
    };

    tracing::debug!(
        post_count,
        created_year,
        created_month,
        "Parsed profile data"
    );

    Ok(ProfileData {
        post_count,
        created_year,
        created_month,
        updated_year,
        updated_month,
    })
}

/// Primary strategy: the `Site.remote = {...};` JSON assignment carries a
/// `number_of_posts` field (as a string, historically).
fn extract_post_count_json(html: &str) -> Option<u64> {
    let blob = SITE_REMOTE_RE.captures(html)?.get(1)?.as_str();
    let value: serde_json::Value = match serde_json::from_str(blob) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Site.remote JSON did not parse");
            return None;
        }
    };

    match value.get("number_of_posts")? {
        serde_json::Value::String(count) => count.parse().ok(),
        serde_json::Value::Number(count) => count.as_u64(),
        _ => None,
    }
}

/// Fallback strategy: the labeled statistics block on the profile page.
fn extract_post_count_html(html: &str) -> Option<u64> {
    STAT_ENTRYCOUNT_RE
        .captures(html)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Extract the "Journal created: on DD <month> YYYY" fragment.
fn extract_creation_date(html: &str) -> Result<(i32, u32)> {
    let decoded = decode_entities(html);
    let caps = CREATED_RE
        .captures(&decoded)
        .ok_or(ExporterError::ProfileCreationDate)?;

    let (Some(month_name), Some(year)) = (caps.get(2), caps.get(3)) else {
        return Err(ExporterError::ProfileCreationDate);
    };

    let month = month_from_name(month_name.as_str())
        .ok_or_else(|| ExporterError::UnknownMonth(month_name.as_str().to_string()))?;
    let year: i32 = year
        .as_str()
        .parse()
        .map_err(|_| ExporterError::ProfileCreationDate)?;

    Ok((year, month))
}

/// Extract the last-update date from the tooltip span, when present and in a
/// known language.
fn extract_update_date(html: &str) -> Option<(i32, u32)> {
    let decoded = decode_entities(html);
    let caps = UPDATED_RE.captures(&decoded)?;

    let month_name = caps.get(2)?.as_str();
    let Some(month) = month_from_name(month_name) else {
        tracing::warn!(month = month_name, "Unknown month name in update date");
        return None;
    };
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;

    Some((year, month))
}

/// Map a localized month name to its number, case-insensitively.
///
/// Covers English (full and abbreviated), Russian (full and abbreviated),
/// German, French and Spanish.
#[must_use]
pub fn month_from_name(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "january" | "jan" | "января" | "янв" | "januar" | "janvier" | "enero" => Some(1),
        "february" | "feb" | "февраля" | "фев" | "februar" | "février" | "febrero" => {
            Some(2)
        }
        "march" | "mar" | "марта" | "мар" | "märz" | "mars" | "marzo" => Some(3),
        "april" | "apr" | "апреля" | "апр" | "avril" | "abril" => Some(4),
        "may" | "мая" | "mai" | "mayo" => Some(5),
        "june" | "jun" | "июня" | "июн" | "juni" | "juin" | "junio" => Some(6),
        "july" | "jul" | "июля" | "июл" | "juli" | "juillet" | "julio" => Some(7),
        "august" | "aug" | "августа" | "авг" | "août" | "agosto" => Some(8),
        "september" | "sep" | "сентября" | "сен" | "septembre" | "septiembre" => Some(9),
        "october" | "oct" | "октября" | "окт" | "oktober" | "octobre" | "octubre" => {
            Some(10)
        }
        "november" | "nov" | "ноября" | "ноя" | "novembre" | "noviembre" => Some(11),
        "december" | "dec" | "декабря" | "дек" | "dezember" | "décembre" | "diciembre" => {
            Some(12)
        }
        _ => None,
    }
}

/// Decode the handful of HTML entities profile pages put around the date
/// fragments. `&amp;` goes last so it cannot manufacture new entities.
fn decode_entities(html: &str) -> String {
    html.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
