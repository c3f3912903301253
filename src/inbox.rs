//! Inbox: HTML scraping of the message inbox and the page-number driver.
//!
//! The inbox has no export endpoint, so messages are scraped from the
//! regular inbox pages. Individual rows are independent records: a malformed
//! row is logged and skipped, never failing the page. Pagination text of the
//! form "Page X of Y" decides whether another page follows; its absence
//! means a single page, but garbled pagination text is a hard error.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::{inbox_url, Config};
use crate::error::{ExporterError, Result};
use crate::http::Session;
use crate::types::{InboxMessage, InboxSender, MessageType};

#[allow(clippy::expect_used)] // Static selector that is guaranteed to be valid
static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr.InboxItem_Row").expect("valid selector"));

#[allow(clippy::expect_used)]
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.InboxItem_Title").expect("valid selector"));

#[allow(clippy::expect_used)]
static BOOKMARK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.InboxItem_Bookmark").expect("valid selector"));

#[allow(clippy::expect_used)]
static CONTENT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.InboxItem_Content").expect("valid selector"));

#[allow(clippy::expect_used)]
static ACTIONS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.actions").expect("valid selector"));

#[allow(clippy::expect_used)]
static TIME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.time").expect("valid selector"));

#[allow(clippy::expect_used)]
static PAGE_NUMBER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.page-number").expect("valid selector"));

#[allow(clippy::expect_used)]
static LJUSER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.ljuser").expect("valid selector"));

#[allow(clippy::expect_used)]
static PROFILE_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.i-ljuser-profile").expect("valid selector"));

#[allow(clippy::expect_used)]
static USERHEAD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.i-ljuser-userhead").expect("valid selector"));

#[allow(clippy::expect_used)]
static VERIFIED_BADGE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.i-ljuser-badge--verified").expect("valid selector")
});

#[allow(clippy::expect_used)]
static DISPLAY_NAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("b").expect("valid selector"));

#[allow(clippy::expect_used)]
static MSGID_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="msgid="]"#).expect("valid selector"));

#[allow(clippy::expect_used)]
static PAGINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Page\s+(\d+)\s+of\s+(\d+)").expect("valid regex"));

#[allow(clippy::expect_used)]
static MSGID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"msgid=(\d+)").expect("valid regex"));

#[allow(clippy::expect_used)]
static TRAILING_FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*from\s*$").expect("valid regex"));

/// Parse one inbox page into messages plus a has-next-page flag.
pub fn parse_inbox_page(html: &str) -> Result<(Vec<InboxMessage>, bool)> {
    let document = Html::parse_document(html);

    let messages: Vec<InboxMessage> = document
        .select(&ROW_SELECTOR)
        .filter_map(extract_message)
        .collect();

    let has_next_page = match extract_pagination(&document)? {
        Some((current_page, total_pages)) => current_page < total_pages,
        None => false,
    };

    tracing::debug!(
        messages = messages.len(),
        has_next_page,
        "Parsed inbox page"
    );
    Ok((messages, has_next_page))
}

/// Extract "Page X of Y" numbers, or `None` when no pagination markup exists.
fn extract_pagination(document: &Html) -> Result<Option<(u32, u32)>> {
    let Some(span) = document.select(&PAGE_NUMBER_SELECTOR).next() else {
        return Ok(None);
    };

    let text = span.text().collect::<String>();
    let text = text.trim();
    let invalid = || ExporterError::InvalidPagination(text.to_string());

    let caps = PAGINATION_RE.captures(text).ok_or_else(invalid)?;
    let (Some(current), Some(total)) = (caps.get(1), caps.get(2)) else {
        return Err(invalid());
    };
    let current: u32 = current.as_str().parse().map_err(|_| invalid())?;
    let total: u32 = total.as_str().parse().map_err(|_| invalid())?;

    Ok(Some((current, total)))
}

/// Extract one message from a row, or `None` (with a warning) when the row
/// is malformed.
fn extract_message(row: ElementRef<'_>) -> Option<InboxMessage> {
    let Some(qid_text) = row.value().attr("lj_qid") else {
        tracing::warn!("Inbox row missing lj_qid attribute, skipping");
        return None;
    };
    let Ok(qid) = qid_text.parse::<i64>() else {
        tracing::warn!(lj_qid = qid_text, "Inbox row has non-numeric lj_qid, skipping");
        return None;
    };

    let msgid = extract_msgid(row);

    let Some(title_span) = row.select(&TITLE_SELECTOR).next() else {
        tracing::warn!(qid, "Inbox row missing title span, skipping");
        return None;
    };

    let read = has_class(title_span, "InboxItem_Read");
    let bookmarked = row
        .select(&BOOKMARK_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .is_some_and(|src| src.contains("flag_on.gif"));

    let sender = extract_sender(title_span);

    // Title text minus the embedded sender markup; a trailing "from" is part
    // of the "<title> from <user>" phrasing, not the title.
    let raw_title = text_excluding(title_span, &["ljuser"]);
    let collapsed = raw_title.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = {
        let stripped = TRAILING_FROM_RE.replace(&collapsed, "").trim().to_string();
        if stripped.is_empty() {
            "No subject".to_string()
        } else {
            stripped
        }
    };

    let body = match row.select(&CONTENT_SELECTOR).next() {
        Some(content) => {
            let text = text_excluding(content, &["actions"]).trim().to_string();
            if text.is_empty() {
                "No content".to_string()
            } else {
                text
            }
        }
        None => String::new(),
    };

    let timestamp_relative = row.select(&TIME_SELECTOR).next().map_or_else(
        || "Unknown".to_string(),
        |cell| cell.text().collect::<String>().trim().to_string(),
    );

    Some(InboxMessage {
        qid,
        msgid,
        message_type: MessageType::classify(sender.as_ref()),
        sender,
        title,
        body,
        timestamp_relative,
        timestamp_absolute: None, // the inbox HTML only shows relative times
        read,
        bookmarked,
    })
}

/// Extract sender information from the title span's embedded user markup.
///
/// Returns `None` when there is no sender markup at all (system messages)
/// or when the markup is missing its username attribute.
fn extract_sender(title_span: ElementRef<'_>) -> Option<InboxSender> {
    let ljuser = title_span.select(&LJUSER_SELECTOR).next()?;
    let username = ljuser.value().attr("data-ljuser")?.to_string();

    let display_name = ljuser
        .select(&DISPLAY_NAME_SELECTOR)
        .next()
        .map_or_else(
            || username.clone(),
            |b| b.text().collect::<String>().trim().to_string(),
        );

    let profile_url = ljuser
        .select(&PROFILE_LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map_or_else(
            || format!("https://{username}.livejournal.com/profile/"),
            str::to_string,
        );

    let userpic_url = ljuser
        .select(&USERHEAD_SELECTOR)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(str::to_string);

    let verified = ljuser.select(&VERIFIED_BADGE_SELECTOR).next().is_some();

    Some(InboxSender {
        username,
        display_name,
        profile_url,
        userpic_url,
        verified,
    })
}

/// Extract the message id from the reply action link.
fn extract_msgid(row: ElementRef<'_>) -> Option<i64> {
    let actions = row.select(&ACTIONS_SELECTOR).next()?;
    let link = actions.select(&MSGID_LINK_SELECTOR).next()?;
    let href = link.value().attr("href")?;
    MSGID_RE
        .captures(href)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// Collect the text of an element, skipping any descendant element carrying
/// one of the given classes.
fn text_excluding(root: ElementRef<'_>, skip_classes: &[&str]) -> String {
    let mut out = String::new();
    collect_text(root, skip_classes, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, skip_classes: &[&str], out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if skip_classes
                .iter()
                .any(|class| has_class(child_element, class))
            {
                continue;
            }
            collect_text(child_element, skip_classes, out);
        }
    }
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// Download one inbox page.
pub fn download_page(
    session: &Session,
    config: &Config,
    folder: &str,
    page: u32,
) -> Result<(Vec<InboxMessage>, bool)> {
    let wrap = |source: ExporterError| ExporterError::InboxPage {
        folder: folder.to_string(),
        page,
        source: Box::new(source),
    };

    let page_value = page.to_string();
    let response = session
        .get(
            &inbox_url(&config.base_url),
            &[("view", folder), ("page", page_value.as_str())],
        )
        .map_err(wrap)?;
    let body = response.text().map_err(|e| wrap(e.into()))?;

    parse_inbox_page(&body).map_err(wrap)
}

/// Download every page of one folder.
pub fn download_folder(
    session: &Session,
    config: &Config,
    folder: &str,
) -> Result<Vec<InboxMessage>> {
    let mut messages = Vec::new();
    let mut page = 1;

    loop {
        let (batch, has_next) = download_page(session, config, folder, page)?;
        messages.extend(batch);
        if !has_next {
            break;
        }
        page += 1;
    }

    tracing::info!(folder, count = messages.len(), "Downloaded inbox folder");
    Ok(messages)
}

/// Download every requested folder, concatenated. The same message appearing
/// in several folder views is kept each time; the archive mirrors what the
/// server returned per view.
pub fn download_inbox(
    session: &Session,
    config: &Config,
    folders: &[String],
) -> Result<Vec<InboxMessage>> {
    let mut all_messages = Vec::new();
    for folder in folders {
        all_messages.extend(download_folder(session, config, folder)?);
    }
    Ok(all_messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_row(qid: &str, title_inner: &str, extra: &str) -> String {
        format!(
            r#"<html><body><table>
            <tr class="InboxItem_Row" lj_qid="{qid}">
                <td class="checkbox"><input type="checkbox" /></td>
                <td class="item">
                    <span class="InboxItem_Title InboxItem_Read">{title_inner}</span>
                    <div class="InboxItem_Content">
                        <p>Message body text.</p>
                        <div class="actions">
                            <a href="/inbox/compose.bml?mode=reply&amp;msgid=95201687">Reply</a>
                            <a href="/spam.bml">Mark as Spam</a>
                        </div>
                    </div>
                </td>
                <td class="time">4 months ago</td>
                {extra}
            </tr>
            </table></body></html>"#
        )
    }

    const OFFICIAL_SENDER: &str = r#"LiveJournal User Agreement updated from
        <span class="ljuser" data-ljuser="livejournal">
            <a href="https://livejournal.livejournal.com/profile/" class="i-ljuser-profile">
                <img class="i-ljuser-userhead" src="https://example.com/userhead.gif" />
            </a>
            <a href="https://livejournal.livejournal.com/"><b>livejournal</b></a>
            <a class="i-ljuser-badge i-ljuser-badge--verified" data-badge-type="verified"></a>
        </span>"#;

    #[test]
    fn test_parse_official_message() {
        let html = message_row("8", OFFICIAL_SENDER, "");
        let (messages, has_next) = parse_inbox_page(&html).unwrap();

        assert!(!has_next);
        assert_eq!(messages.len(), 1);

        let message = &messages[0];
        assert_eq!(message.qid, 8);
        assert_eq!(message.msgid, Some(95201687));
        assert_eq!(message.message_type, MessageType::OfficialMessage);
        assert_eq!(message.title, "LiveJournal User Agreement updated");
        assert_eq!(message.body, "Message body text.");
        assert_eq!(message.timestamp_relative, "4 months ago");
        assert!(message.read);
        assert!(!message.bookmarked);

        let sender = message.sender.as_ref().unwrap();
        assert_eq!(sender.username, "livejournal");
        assert_eq!(sender.display_name, "livejournal");
        assert!(sender.verified);
        assert!(sender.profile_url.contains("livejournal.com/profile"));
        assert_eq!(
            sender.userpic_url,
            Some("https://example.com/userhead.gif".to_string())
        );
    }

    #[test]
    fn test_body_excludes_action_links() {
        let html = message_row("8", OFFICIAL_SENDER, "");
        let (messages, _) = parse_inbox_page(&html).unwrap();

        let body = &messages[0].body;
        assert!(!body.contains("Reply"));
        assert!(!body.contains("Mark as Spam"));
    }

    #[test]
    fn test_parse_user_message() {
        let sender = r#"Private message from
            <span class="ljuser" data-ljuser="friend1">
                <a href="https://friend1.livejournal.com/"><b>friend1</b></a>
            </span>"#;
        let html = message_row("42", sender, "");
        let (messages, _) = parse_inbox_page(&html).unwrap();

        assert_eq!(messages[0].message_type, MessageType::UserMessage);
        assert_eq!(messages[0].title, "Private message");
        let sender = messages[0].sender.as_ref().unwrap();
        assert_eq!(sender.username, "friend1");
        assert!(!sender.verified);
        // No explicit profile link: falls back to the canonical URL.
        assert_eq!(
            sender.profile_url,
            "https://friend1.livejournal.com/profile/"
        );
    }

    #[test]
    fn test_parse_system_notification() {
        let html = message_row("9", "Your entry was promoted", "");
        let (messages, _) = parse_inbox_page(&html).unwrap();

        let message = &messages[0];
        assert_eq!(message.message_type, MessageType::SystemNotification);
        assert!(message.sender.is_none());
        assert_eq!(message.title, "Your entry was promoted");
    }

    #[test]
    fn test_bookmarked_flag() {
        let extra =
            r#"<td><img class="InboxItem_Bookmark" src="/img/flag_on.gif" /></td>"#;
        let html = message_row("10", "Bookmarked message", extra);
        let (messages, _) = parse_inbox_page(&html).unwrap();
        assert!(messages[0].bookmarked);

        let extra =
            r#"<td><img class="InboxItem_Bookmark" src="/img/flag_off.gif" /></td>"#;
        let html = message_row("11", "Plain message", extra);
        let (messages, _) = parse_inbox_page(&html).unwrap();
        assert!(!messages[0].bookmarked);
    }

    #[test]
    fn test_row_without_qid_skipped() {
        let html = r#"<html><body><table>
            <tr class="InboxItem_Row">
                <td><span class="InboxItem_Title">No qid here</span></td>
            </tr>
            <tr class="InboxItem_Row" lj_qid="seven">
                <td><span class="InboxItem_Title">Bad qid</span></td>
            </tr>
        </table></body></html>"#;

        let (messages, has_next) = parse_inbox_page(html).unwrap();
        assert!(messages.is_empty());
        assert!(!has_next);
    }

    #[test]
    fn test_empty_page() {
        let (messages, has_next) =
            parse_inbox_page("<html><body><p>Your inbox is empty.</p></body></html>").unwrap();
        assert!(messages.is_empty());
        assert!(!has_next);
    }

    #[test]
    fn test_truncated_html_is_tolerated() {
        let (messages, has_next) = parse_inbox_page("<html><body><div>Invalid").unwrap();
        assert!(messages.is_empty());
        assert!(!has_next);
    }

    #[test]
    fn test_pagination_multipage() {
        let html = r#"<html><body>
            <span class="page-number">Page 2 of 5</span>
        </body></html>"#;
        let (_, has_next) = parse_inbox_page(html).unwrap();
        assert!(has_next);
    }

    #[test]
    fn test_pagination_last_page() {
        let html = r#"<html><body><span class="page-number">Page 5 of 5</span></body></html>"#;
        let (_, has_next) = parse_inbox_page(html).unwrap();
        assert!(!has_next);
    }

    #[test]
    fn test_pagination_single_page() {
        let html = r#"<html><body><span class="page-number">Page 1 of 1</span></body></html>"#;
        let (_, has_next) = parse_inbox_page(html).unwrap();
        assert!(!has_next);
    }

    #[test]
    fn test_pagination_garbled_is_hard_error() {
        let html =
            r#"<html><body><span class="page-number">Seite 1 von 3</span></body></html>"#;
        let err = parse_inbox_page(html).unwrap_err();
        assert!(err.to_string().contains("Could not parse pagination"));
    }

    #[test]
    fn test_extract_msgid_without_reply_link() {
        let html = r#"<html><body><table>
            <tr class="InboxItem_Row" lj_qid="12">
                <td>
                    <span class="InboxItem_Title">System note</span>
                    <div class="InboxItem_Content">
                        Notification text
                        <div class="actions"><a href="/other.bml">Other</a></div>
                    </div>
                </td>
            </tr>
        </table></body></html>"#;

        let (messages, _) = parse_inbox_page(html).unwrap();
        assert_eq!(messages[0].msgid, None);
        assert_eq!(messages[0].body, "Notification text");
        // No time cell in this row.
        assert_eq!(messages[0].timestamp_relative, "Unknown");
    }

    #[test]
    fn test_sender_markup_without_username_attr() {
        let title = r#"Odd markup from
            <span class="ljuser"><a href="https://x.livejournal.com/"><b>x</b></a></span>"#;
        let html = message_row("13", title, "");
        let (messages, _) = parse_inbox_page(&html).unwrap();

        // Without data-ljuser the sender is unidentifiable: treated as a
        // system message.
        assert!(messages[0].sender.is_none());
        assert_eq!(messages[0].message_type, MessageType::SystemNotification);
    }
}
