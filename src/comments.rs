//! Comments: metadata and body XML parsing, the cursor-driven download loop,
//! and poster-username resolution.
//!
//! The comments endpoint is paginated by id: the metadata call returns the
//! highest comment id that exists (`maxid`) plus the usermap, and each body
//! call returns comments with ids above the `startid` cursor. The driver
//! advances the cursor to the highest id seen in the latest batch until it
//! reaches maxid or a batch comes back empty.

use std::collections::HashMap;

use roxmltree::{Document, Node};

use crate::config::{comments_export_url, Config};
use crate::error::{ExporterError, Result};
use crate::http::Session;
use crate::types::{Comment, User};
use crate::xml::child_text;

/// Parse the comment metadata response: maxid plus the usermap.
///
/// A missing or non-integer maxid fails the parse. Usermap entries missing
/// either attribute, or with a non-integer id, are skipped with a warning:
/// they are independent records and one bad entry should not lose the rest.
pub fn parse_comment_metadata(xml: &str) -> Result<(i64, Vec<User>)> {
    let doc = Document::parse(xml)?;

    let maxid_text = doc
        .descendants()
        .find(|n| n.has_tag_name("maxid"))
        .and_then(|n| n.text())
        .ok_or(ExporterError::MissingField {
            field: "maxid",
            context: None,
        })?;
    let maxid: i64 = maxid_text
        .trim()
        .parse()
        .map_err(|_| ExporterError::InvalidValue {
            field: "maxid",
            value: maxid_text.trim().to_string(),
        })?;

    let mut usermap = Vec::new();
    for node in doc.descendants().filter(|n| n.has_tag_name("usermap")) {
        let id = node.attribute("id");
        let user = node.attribute("user");
        match (id.and_then(|v| v.parse::<i64>().ok()), user) {
            (Some(userid), Some(username)) => usermap.push(User {
                userid,
                username: username.to_string(),
            }),
            _ => tracing::warn!(?id, ?user, "Skipping malformed usermap entry"),
        }
    }

    Ok((maxid, usermap))
}

/// Parse a comment body response into comments.
///
/// Unlike usermap entries, comments carry required linking fields (id,
/// jitemid, date) without which the record is meaningless, so any malformed
/// comment fails the whole batch.
pub fn parse_comments(xml: &str) -> Result<Vec<Comment>> {
    let doc = Document::parse(xml)?;
    doc.descendants()
        .filter(|n| n.has_tag_name("comment"))
        .map(parse_comment)
        .collect()
}

fn parse_comment(node: Node<'_, '_>) -> Result<Comment> {
    let id_text = node.attribute("id").ok_or(ExporterError::MissingField {
        field: "id",
        context: Some("comment".to_string()),
    })?;
    let id: i64 = id_text.parse().map_err(|_| ExporterError::InvalidValue {
        field: "id",
        value: id_text.to_string(),
    })?;

    let jitemid_text = node
        .attribute("jitemid")
        .ok_or_else(|| ExporterError::MissingField {
            field: "jitemid",
            context: Some(format!("comment {id}")),
        })?;
    let jitemid: i64 = jitemid_text
        .parse()
        .map_err(|_| ExporterError::InvalidValue {
            field: "jitemid",
            value: jitemid_text.to_string(),
        })?;

    let posterid = optional_int_attr(node, "posterid")?;
    let parentid = optional_int_attr(node, "parentid")?;

    let date = child_text(node, "date").ok_or_else(|| ExporterError::MissingField {
        field: "date",
        context: Some(format!("comment {id}")),
    })?;
    let subject = child_text(node, "subject");
    let body = child_text(node, "body");

    Ok(Comment::new(
        id,
        jitemid,
        posterid,
        parentid,
        date.trim().to_string(),
        subject,
        body,
        node.attribute("state"),
    ))
}

fn optional_int_attr(node: Node<'_, '_>, field: &'static str) -> Result<Option<i64>> {
    match node.attribute(field) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ExporterError::InvalidValue {
                field,
                value: value.to_string(),
            }),
    }
}

/// Download comment metadata (maxid and usermap).
pub fn download_metadata(session: &Session, config: &Config) -> Result<(i64, Vec<User>)> {
    let response = session.get(
        &comments_export_url(&config.base_url),
        &[("get", "comment_meta"), ("startid", "0")],
    )?;
    let body = response.text()?;
    parse_comment_metadata(&body)
}

/// Download one batch of comment bodies after the given cursor.
pub fn download_batch(session: &Session, config: &Config, startid: i64) -> Result<Vec<Comment>> {
    let wrap = |source: ExporterError| ExporterError::CommentsBatch {
        cursor: startid,
        source: Box::new(source),
    };

    let startid_value = startid.to_string();
    let response = session
        .get(
            &comments_export_url(&config.base_url),
            &[("get", "comment_body"), ("startid", startid_value.as_str())],
        )
        .map_err(wrap)?;
    let body = response.text().map_err(|e| wrap(e.into()))?;

    parse_comments(&body).map_err(wrap)
}

/// Download all comments plus the usermap, resolving poster usernames.
///
/// The cursor only ever advances: it jumps to the highest id of the latest
/// batch, and the loop stops on an empty batch, on reaching maxid, or (as a
/// termination guard against a misbehaving server) on a batch that fails to
/// advance it.
pub fn download_comments(session: &Session, config: &Config) -> Result<(Vec<Comment>, Vec<User>)> {
    let (maxid, usermap) = download_metadata(session, config)?;
    tracing::info!(maxid, users = usermap.len(), "Downloaded comment metadata");

    let mut comments = Vec::new();
    let mut cursor: i64 = 0;

    while cursor < maxid {
        let batch = download_batch(session, config, cursor)?;
        if batch.is_empty() {
            break;
        }

        let highest = batch.iter().map(|c| c.id).max().unwrap_or(cursor);
        tracing::debug!(cursor, count = batch.len(), highest, "Downloaded comment batch");
        comments.extend(batch);

        if highest <= cursor {
            tracing::warn!(cursor, highest, "Comment batch did not advance the cursor; stopping");
            break;
        }
        cursor = highest;
    }

    resolve_poster_usernames(&mut comments, &usermap);
    Ok((comments, usermap))
}

/// Fill in `poster_username` for every comment with a numeric poster id.
///
/// The lookup is built in usermap declaration order, so a duplicated userid
/// resolves to its last entry. Ids absent from the usermap get a
/// `[unknown-{posterid}]` placeholder; anonymous comments stay unresolved.
pub fn resolve_poster_usernames(comments: &mut [Comment], usermap: &[User]) {
    let lookup: HashMap<i64, &str> = usermap
        .iter()
        .map(|user| (user.userid, user.username.as_str()))
        .collect();

    for comment in comments.iter_mut() {
        if let Some(posterid) = comment.posterid {
            comment.poster_username = Some(
                lookup
                    .get(&posterid)
                    .map_or_else(|| format!("[unknown-{posterid}]"), |name| (*name).to_string()),
            );
        }
    }
}
