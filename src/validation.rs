//! Post-hoc data-quality checks over an assembled export.
//!
//! Findings are advisory. They describe referential oddities in what the
//! server returned (comments pointing at posts that were deleted, posters
//! missing from the usermap) and never fail an export or change an exit
//! code.

use std::collections::HashSet;

use crate::types::{Comment, LjExport, Post, User};

/// Validate an export for internal consistency.
///
/// # Returns
/// A list of human-readable findings; empty means nothing looked off.
#[must_use]
pub fn validate_export(export: &LjExport) -> Vec<String> {
    let mut findings = Vec::new();
    findings.extend(validate_posts(&export.posts));
    findings.extend(validate_comments(
        &export.comments,
        &export.posts,
        &export.usermap,
    ));
    findings
}

fn validate_posts(posts: &[Post]) -> Vec<String> {
    let mut findings = Vec::new();

    let mut itemids = HashSet::new();
    if !posts.iter().all(|p| itemids.insert(p.itemid)) {
        findings.push("Duplicate itemids found in posts".to_string());
    }

    let mut jitemids = HashSet::new();
    if !posts
        .iter()
        .filter_map(|p| p.jitemid)
        .all(|j| jitemids.insert(j))
    {
        findings.push("Duplicate jitemids found in posts".to_string());
    }

    findings
}

fn validate_comments(comments: &[Comment], posts: &[Post], usermap: &[User]) -> Vec<String> {
    let post_jitemids: HashSet<i64> = posts.iter().filter_map(|p| p.jitemid).collect();
    let comment_ids: HashSet<i64> = comments.iter().map(|c| c.id).collect();
    let user_ids: HashSet<i64> = usermap.iter().map(|u| u.userid).collect();

    let mut findings = Vec::new();
    for comment in comments {
        if !post_jitemids.contains(&comment.jitemid) {
            findings.push(format!(
                "Comment {}: jitemid {} does not match any post",
                comment.id, comment.jitemid
            ));
        }

        if let Some(parentid) = comment.parentid {
            if !comment_ids.contains(&parentid) {
                findings.push(format!(
                    "Comment {}: parentid {parentid} does not exist",
                    comment.id
                ));
            }
        }

        if let Some(posterid) = comment.posterid {
            if !user_ids.contains(&posterid) {
                findings.push(format!(
                    "Comment {}: posterid {posterid} not in usermap",
                    comment.id
                ));
            }
        }
    }

    findings
}
