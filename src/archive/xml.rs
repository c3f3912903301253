//! XML archive writer and loader.
//!
//! serde has no XML backend in this stack, so the XML encoding is written by
//! hand: a flat element per field, an empty element for null, nested
//! `<sender>` blocks for inbox messages. The loader walks the same shape
//! with roxmltree and treats an empty element as null, which makes the
//! encoding lossless for exactly the fields the other formats carry.

use roxmltree::{Document, Node};

use crate::error::{ExporterError, Result};
use crate::types::{
    Comment, ExportMetadata, InboxMessage, InboxSender, LjExport, MessageType, Post, Security,
    User,
};
use crate::xml::{child_text, find_child, find_children};

/// Serialize an export to the XML archive encoding.
#[must_use]
pub fn to_xml(export: &LjExport) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<lj_export>\n");

    out.push_str("  <metadata>\n");
    text_element(&mut out, 4, "export_date", Some(&export.metadata.export_date));
    text_element(&mut out, 4, "lj_user", Some(&export.metadata.lj_user));
    text_element(
        &mut out,
        4,
        "exporter_version",
        Some(&export.metadata.exporter_version),
    );
    text_element(
        &mut out,
        4,
        "post_count",
        Some(&export.metadata.post_count.to_string()),
    );
    text_element(
        &mut out,
        4,
        "comment_count",
        Some(&export.metadata.comment_count.to_string()),
    );
    text_element(
        &mut out,
        4,
        "inbox_count",
        Some(&export.metadata.inbox_count.to_string()),
    );
    out.push_str("  </metadata>\n");

    out.push_str("  <usermap>\n");
    for user in &export.usermap {
        out.push_str(&format!(
            "    <user userid=\"{}\" username=\"{}\"/>\n",
            user.userid,
            escape_attr(&user.username)
        ));
    }
    out.push_str("  </usermap>\n");

    out.push_str("  <posts>\n");
    for post in &export.posts {
        out.push_str("    <post>\n");
        text_element(&mut out, 6, "itemid", Some(&post.itemid.to_string()));
        let jitemid = post.jitemid.map(|v| v.to_string());
        text_element(&mut out, 6, "jitemid", jitemid.as_deref());
        text_element(&mut out, 6, "eventtime", Some(&post.eventtime));
        text_element(&mut out, 6, "logtime", Some(&post.logtime));
        text_element(&mut out, 6, "subject", post.subject.as_deref());
        text_element(&mut out, 6, "event", Some(&post.event));
        text_element(&mut out, 6, "security", Some(post.security.as_str()));
        text_element(&mut out, 6, "allowmask", Some(&post.allowmask.to_string()));
        text_element(&mut out, 6, "current_mood", post.current_mood.as_deref());
        text_element(&mut out, 6, "current_music", post.current_music.as_deref());
        out.push_str("    </post>\n");
    }
    out.push_str("  </posts>\n");

    out.push_str("  <comments>\n");
    for comment in &export.comments {
        out.push_str("    <comment>\n");
        text_element(&mut out, 6, "id", Some(&comment.id.to_string()));
        text_element(&mut out, 6, "jitemid", Some(&comment.jitemid.to_string()));
        let posterid = comment.posterid.map(|v| v.to_string());
        text_element(&mut out, 6, "posterid", posterid.as_deref());
        text_element(
            &mut out,
            6,
            "poster_username",
            comment.poster_username.as_deref(),
        );
        let parentid = comment.parentid.map(|v| v.to_string());
        text_element(&mut out, 6, "parentid", parentid.as_deref());
        text_element(&mut out, 6, "date", Some(&comment.date));
        text_element(&mut out, 6, "subject", comment.subject.as_deref());
        text_element(&mut out, 6, "body", comment.body.as_deref());
        text_element(&mut out, 6, "state", comment.state.as_deref());
        out.push_str("    </comment>\n");
    }
    out.push_str("  </comments>\n");

    out.push_str("  <inbox>\n");
    for message in &export.inbox {
        out.push_str("    <message>\n");
        text_element(&mut out, 6, "qid", Some(&message.qid.to_string()));
        let msgid = message.msgid.map(|v| v.to_string());
        text_element(&mut out, 6, "msgid", msgid.as_deref());
        text_element(&mut out, 6, "type", Some(message.message_type.as_str()));
        if let Some(sender) = &message.sender {
            out.push_str("      <sender>\n");
            text_element(&mut out, 8, "username", Some(&sender.username));
            text_element(&mut out, 8, "display_name", Some(&sender.display_name));
            text_element(&mut out, 8, "profile_url", Some(&sender.profile_url));
            text_element(&mut out, 8, "userpic_url", sender.userpic_url.as_deref());
            text_element(&mut out, 8, "verified", Some(bool_str(sender.verified)));
            out.push_str("      </sender>\n");
        }
        text_element(&mut out, 6, "title", Some(&message.title));
        text_element(&mut out, 6, "body", Some(&message.body));
        text_element(
            &mut out,
            6,
            "timestamp_relative",
            Some(&message.timestamp_relative),
        );
        text_element(
            &mut out,
            6,
            "timestamp_absolute",
            message.timestamp_absolute.as_deref(),
        );
        text_element(&mut out, 6, "read", Some(bool_str(message.read)));
        text_element(&mut out, 6, "bookmarked", Some(bool_str(message.bookmarked)));
        out.push_str("    </message>\n");
    }
    out.push_str("  </inbox>\n");

    out.push_str("</lj_export>\n");
    out
}

/// Deserialize an export from the XML archive encoding.
pub fn from_xml(content: &str) -> Result<LjExport> {
    let doc = Document::parse(content)?;
    let root = doc.root_element();
    if !root.has_tag_name("lj_export") {
        return Err(ExporterError::MissingField {
            field: "lj_export",
            context: Some("archive root".to_string()),
        });
    }

    let metadata_elem = find_child(root, "metadata").ok_or(ExporterError::MissingField {
        field: "metadata",
        context: Some("archive".to_string()),
    })?;
    let metadata = ExportMetadata {
        export_date: text_or_none(metadata_elem, "export_date").unwrap_or_default(),
        lj_user: text_or_none(metadata_elem, "lj_user").unwrap_or_default(),
        exporter_version: text_or_none(metadata_elem, "exporter_version").unwrap_or_default(),
        post_count: int_or_zero(metadata_elem, "post_count") as usize,
        comment_count: int_or_zero(metadata_elem, "comment_count") as usize,
        inbox_count: int_or_zero(metadata_elem, "inbox_count") as usize,
    };

    let mut export = LjExport::new(metadata);

    if let Some(usermap_elem) = find_child(root, "usermap") {
        for user_elem in find_children(usermap_elem, "user") {
            export.usermap.push(User {
                userid: user_elem
                    .attribute("userid")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0),
                username: user_elem.attribute("username").unwrap_or_default().to_string(),
            });
        }
    }

    if let Some(posts_elem) = find_child(root, "posts") {
        for post_elem in find_children(posts_elem, "post") {
            export.posts.push(parse_post(post_elem)?);
        }
    }

    if let Some(comments_elem) = find_child(root, "comments") {
        for comment_elem in find_children(comments_elem, "comment") {
            export.comments.push(parse_comment(comment_elem));
        }
    }

    if let Some(inbox_elem) = find_child(root, "inbox") {
        for message_elem in find_children(inbox_elem, "message") {
            export.inbox.push(parse_message(message_elem)?);
        }
    }

    Ok(export)
}

fn parse_post(post_elem: Node<'_, '_>) -> Result<Post> {
    let security = match text_or_none(post_elem, "security") {
        Some(value) => Security::parse(value.trim())?,
        None => Security::Public,
    };

    // Constructed directly rather than through Post::new: a stored null
    // jitemid must stay null on load, not get re-derived.
    Ok(Post {
        itemid: int_or_zero(post_elem, "itemid"),
        jitemid: opt_int(post_elem, "jitemid"),
        eventtime: text_or_none(post_elem, "eventtime").unwrap_or_default(),
        logtime: text_or_none(post_elem, "logtime").unwrap_or_default(),
        subject: text_or_none(post_elem, "subject"),
        event: text_or_none(post_elem, "event").unwrap_or_default(),
        security,
        allowmask: text_or_none(post_elem, "allowmask")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
        current_mood: text_or_none(post_elem, "current_mood"),
        current_music: text_or_none(post_elem, "current_music"),
    })
}

fn parse_comment(comment_elem: Node<'_, '_>) -> Comment {
    Comment {
        id: int_or_zero(comment_elem, "id"),
        jitemid: int_or_zero(comment_elem, "jitemid"),
        posterid: opt_int(comment_elem, "posterid"),
        poster_username: text_or_none(comment_elem, "poster_username"),
        parentid: opt_int(comment_elem, "parentid"),
        date: text_or_none(comment_elem, "date").unwrap_or_default(),
        subject: text_or_none(comment_elem, "subject"),
        body: text_or_none(comment_elem, "body"),
        state: text_or_none(comment_elem, "state"),
    }
}

fn parse_message(message_elem: Node<'_, '_>) -> Result<InboxMessage> {
    let qid = int_or_zero(message_elem, "qid");

    let message_type = text_or_none(message_elem, "type")
        .ok_or_else(|| ExporterError::MissingField {
            field: "type",
            context: Some(format!("message {qid}")),
        })
        .and_then(|value| MessageType::parse(value.trim()))?;

    let sender = find_child(message_elem, "sender").map(|sender_elem| InboxSender {
        username: text_or_none(sender_elem, "username").unwrap_or_default(),
        display_name: text_or_none(sender_elem, "display_name").unwrap_or_default(),
        profile_url: text_or_none(sender_elem, "profile_url").unwrap_or_default(),
        userpic_url: text_or_none(sender_elem, "userpic_url"),
        verified: bool_text(sender_elem, "verified"),
    });

    Ok(InboxMessage {
        qid,
        msgid: opt_int(message_elem, "msgid"),
        message_type,
        sender,
        title: text_or_none(message_elem, "title").unwrap_or_default(),
        body: text_or_none(message_elem, "body").unwrap_or_default(),
        timestamp_relative: text_or_none(message_elem, "timestamp_relative").unwrap_or_default(),
        timestamp_absolute: text_or_none(message_elem, "timestamp_absolute"),
        read: bool_text(message_elem, "read"),
        bookmarked: bool_text(message_elem, "bookmarked"),
    })
}

/// Child text where an empty element reads as null.
fn text_or_none(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_text(node, tag).filter(|s| !s.is_empty())
}

fn int_or_zero(node: Node<'_, '_>, tag: &str) -> i64 {
    text_or_none(node, tag)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn opt_int(node: Node<'_, '_>, tag: &str) -> Option<i64> {
    text_or_none(node, tag).and_then(|v| v.trim().parse().ok())
}

fn bool_text(node: Node<'_, '_>, tag: &str) -> bool {
    text_or_none(node, tag).as_deref() == Some("true")
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn text_element(out: &mut String, indent: usize, tag: &str, text: Option<&str>) {
    let pad = " ".repeat(indent);
    match text {
        Some(text) => out.push_str(&format!("{pad}<{tag}>{}</{tag}>\n", escape_text(text))),
        None => out.push_str(&format!("{pad}<{tag}/>\n")),
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
