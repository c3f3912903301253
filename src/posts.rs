//! Posts: export XML parsing and the month-range download driver.
//!
//! The posts endpoint serves one calendar month per request. The driver
//! walks an inclusive month range (explicit, or discovered from the public
//! profile) and concatenates the parsed entries.

use roxmltree::{Document, Node};

use crate::config::{posts_export_url, Config};
use crate::error::{ExporterError, Result};
use crate::http::Session;
use crate::profile;
use crate::types::{Post, Security};
use crate::xml::child_text;

/// Inclusive month range for post downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRange {
    pub start_year: i32,
    pub start_month: u32,
    pub end_year: i32,
    pub end_month: u32,
}

/// Generate every (year, month) pair in a range, in calendar order.
///
/// # Examples
/// ```
/// use lj_exporter::posts::{generate_month_range, MonthRange};
///
/// let months = generate_month_range(MonthRange {
///     start_year: 2022,
///     start_month: 11,
///     end_year: 2023,
///     end_month: 2,
/// });
/// assert_eq!(months, vec![(2022, 11), (2022, 12), (2023, 1), (2023, 2)]);
/// ```
#[must_use]
pub fn generate_month_range(range: MonthRange) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (range.start_year, range.start_month);

    while (year, month) <= (range.end_year, range.end_month) {
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }

    months
}

/// Parse posts from an export XML response.
///
/// Every `<entry>` must carry itemid, eventtime, logtime, event and security;
/// a missing required field fails the whole batch. Optional fields default
/// to None/zero, and a wire-supplied jitemid is trusted verbatim.
pub fn parse_posts(xml: &str) -> Result<Vec<Post>> {
    let doc = Document::parse(xml)?;
    doc.descendants()
        .filter(|n| n.has_tag_name("entry"))
        .map(parse_entry)
        .collect()
}

fn parse_entry(entry: Node<'_, '_>) -> Result<Post> {
    let itemid_text = child_text(entry, "itemid").ok_or(ExporterError::MissingField {
        field: "itemid",
        context: None,
    })?;
    let itemid: i64 = itemid_text
        .trim()
        .parse()
        .map_err(|_| ExporterError::InvalidValue {
            field: "itemid",
            value: itemid_text.trim().to_string(),
        })?;

    let eventtime = required_text(entry, "eventtime", itemid)?;
    let logtime = required_text(entry, "logtime", itemid)?;
    let event = child_text(entry, "event").ok_or_else(|| ExporterError::MissingField {
        field: "event",
        context: Some(format!("itemid {itemid}")),
    })?;
    let security = Security::parse(required_text(entry, "security", itemid)?.trim())?;

    let subject = child_text(entry, "subject");
    let jitemid = optional_int(entry, "jitemid")?;
    let allowmask = match child_text(entry, "allowmask") {
        None => 0,
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| ExporterError::InvalidValue {
                field: "allowmask",
                value: text.trim().to_string(),
            })?,
    };
    let current_mood = child_text(entry, "current_mood");
    let current_music = child_text(entry, "current_music");

    Ok(Post::new(
        itemid,
        jitemid,
        eventtime.trim().to_string(),
        logtime.trim().to_string(),
        subject,
        event,
        security,
        allowmask,
        current_mood,
        current_music,
    ))
}

fn required_text(entry: Node<'_, '_>, field: &'static str, itemid: i64) -> Result<String> {
    child_text(entry, field).ok_or_else(|| ExporterError::MissingField {
        field,
        context: Some(format!("itemid {itemid}")),
    })
}

fn optional_int(entry: Node<'_, '_>, field: &'static str) -> Result<Option<i64>> {
    match child_text(entry, field) {
        None => Ok(None),
        Some(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ExporterError::InvalidValue {
                field,
                value: text.trim().to_string(),
            }),
    }
}

/// Download all posts for one calendar month.
pub fn download_month(
    session: &Session,
    config: &Config,
    year: i32,
    month: u32,
) -> Result<Vec<Post>> {
    let wrap = |source: ExporterError| ExporterError::PostsMonth {
        year,
        month,
        source: Box::new(source),
    };

    let year_value = year.to_string();
    let month_value = format!("{month:02}");
    let form = [
        ("what", "journal"),
        ("year", year_value.as_str()),
        ("month", month_value.as_str()),
        ("format", "xml"),
        ("encid", "2"),
        ("field_itemid", "on"),
        ("field_eventtime", "on"),
        ("field_logtime", "on"),
        ("field_subject", "on"),
        ("field_event", "on"),
        ("field_security", "on"),
        ("field_allowmask", "on"),
        ("field_currents", "on"),
    ];

    let response = session
        .post_form(&posts_export_url(&config.base_url), &form)
        .map_err(wrap)?;
    let body = response.text().map_err(|e| wrap(e.into()))?;

    parse_posts(&body).map_err(wrap)
}

/// Download all posts in a range, auto-discovering the range from the
/// profile when none is given.
///
/// After auto-discovery the accumulated count is compared against the
/// profile's reported total; a mismatch is only a warning, since deleted and
/// private posts legitimately lower the count.
pub fn download_posts(
    session: &Session,
    config: &Config,
    username: &str,
    range: Option<MonthRange>,
) -> Result<Vec<Post>> {
    let (range, expected_count) = match range {
        Some(range) => (range, None),
        None => {
            tracing::info!("No date range given, discovering one from the profile");
            let profile = profile::download_profile(session, username)?;
            let (end_year, end_month) = profile.update_bound();
            let range = MonthRange {
                start_year: profile.created_year,
                start_month: profile.created_month,
                end_year,
                end_month,
            };
            (range, Some(profile.post_count))
        }
    };

    let months = generate_month_range(range);
    tracing::info!(months = months.len(), "Downloading posts");

    let mut posts = Vec::new();
    for (year, month) in months {
        let batch = download_month(session, config, year, month)?;
        tracing::debug!(year, month, count = batch.len(), "Downloaded month");
        posts.extend(batch);
    }

    if let Some(expected) = expected_count {
        if posts.len() as u64 != expected {
            tracing::warn!(
                downloaded = posts.len(),
                reported = expected,
                "Post count differs from the profile's reported total; \
                 deleted or private posts are a common cause"
            );
        }
    }

    Ok(posts)
}
