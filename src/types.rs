//! Core data types for the exporter.
//!
//! Every record is produced by exactly one parser and is immutable once
//! constructed, with a single exception: `Comment::poster_username` is filled
//! in afterwards by the cross-reference resolver. All optional fields
//! serialize as explicit nulls so an archive round-trips losslessly through
//! every supported encoding.

use serde::{Deserialize, Serialize};

use crate::config::OFFICIAL_ACCOUNT;
use crate::error::{ExporterError, Result};

/// Access level of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    Public,
    Private,
    Friends,
    Usemask,
    Custom,
}

impl Security {
    /// Get the wire/archive string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Friends => "friends",
            Self::Usemask => "usemask",
            Self::Custom => "custom",
        }
    }

    /// Parse a wire value; anything outside the fixed set is rejected.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "friends" => Ok(Self::Friends),
            "usemask" => Ok(Self::Usemask),
            "custom" => Ok(Self::Custom),
            _ => Err(ExporterError::InvalidValue {
                field: "security",
                value: value.to_string(),
            }),
        }
    }
}

/// A journal post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Unique post identifier.
    pub itemid: i64,

    /// Post identifier used by comments to reference their post.
    /// Derived as `itemid >> 8` unless the wire supplied an explicit value.
    pub jitemid: Option<i64>,

    /// Publication datetime (YYYY-MM-DD HH:MM:SS).
    pub eventtime: String,

    /// Log/save datetime (YYYY-MM-DD HH:MM:SS).
    pub logtime: String,

    /// Post title; an empty wire subject normalizes to None.
    pub subject: Option<String>,

    /// Post body, HTML preserved.
    pub event: String,

    /// Access level.
    pub security: Security,

    /// Bitmask of custom friend groups allowed to view the post.
    pub allowmask: u32,

    /// Mood metadata.
    pub current_mood: Option<String>,

    /// Music metadata.
    pub current_music: Option<String>,
}

impl Post {
    /// Construct a post, deriving `jitemid` when the wire omitted it.
    ///
    /// An explicit wire `jitemid` is trusted verbatim; if it diverges from
    /// the derivation it is kept, and the divergence is logged so it can be
    /// audited later.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        itemid: i64,
        jitemid: Option<i64>,
        eventtime: String,
        logtime: String,
        subject: Option<String>,
        event: String,
        security: Security,
        allowmask: u32,
        current_mood: Option<String>,
        current_music: Option<String>,
    ) -> Self {
        let derived = itemid >> 8;
        let jitemid = match jitemid {
            Some(explicit) => {
                if explicit != derived {
                    tracing::warn!(
                        itemid,
                        explicit_jitemid = explicit,
                        derived_jitemid = derived,
                        "jitemid from the wire diverges from itemid >> 8; keeping the wire value"
                    );
                }
                Some(explicit)
            }
            None => Some(derived),
        };

        Self {
            itemid,
            jitemid,
            eventtime,
            logtime,
            subject: subject.filter(|s| !s.is_empty()),
            event,
            security,
            allowmask,
            current_mood: current_mood.filter(|s| !s.is_empty()),
            current_music: current_music.filter(|s| !s.is_empty()),
        }
    }
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique comment identifier.
    pub id: i64,

    /// Owning post, referenced by its `jitemid`.
    pub jitemid: i64,

    /// Poster's numeric user id; None means anonymous.
    pub posterid: Option<i64>,

    /// Username resolved from the usermap after download.
    pub poster_username: Option<String>,

    /// Parent comment for threading; None means top-level.
    pub parentid: Option<i64>,

    /// Comment timestamp (YYYY-MM-DD HH:MM:SS).
    pub date: String,

    /// Comment subject.
    pub subject: Option<String>,

    /// Comment body, HTML preserved.
    pub body: Option<String>,

    /// "deleted" for deleted comments, None otherwise.
    pub state: Option<String>,
}

impl Comment {
    /// Construct a comment from wire values.
    ///
    /// The wire state marker "D" normalizes to "deleted"; any other value is
    /// dropped. Empty subject/body normalize to None.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        jitemid: i64,
        posterid: Option<i64>,
        parentid: Option<i64>,
        date: String,
        subject: Option<String>,
        body: Option<String>,
        state: Option<&str>,
    ) -> Self {
        Self {
            id,
            jitemid,
            posterid,
            poster_username: None,
            parentid,
            date,
            subject: subject.filter(|s| !s.is_empty()),
            body: body.filter(|s| !s.is_empty()),
            state: match state {
                Some("D") => Some("deleted".to_string()),
                _ => None,
            },
        }
    }
}

/// A usermap entry: numeric user id to username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub userid: i64,
    pub username: String,
}

/// Classification of an inbox message, derived from its sender markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserMessage,
    OfficialMessage,
    SystemNotification,
}

impl MessageType {
    /// Get the archive string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserMessage => "user_message",
            Self::OfficialMessage => "official_message",
            Self::SystemNotification => "system_notification",
        }
    }

    /// Parse an archive value.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "user_message" => Ok(Self::UserMessage),
            "official_message" => Ok(Self::OfficialMessage),
            "system_notification" => Ok(Self::SystemNotification),
            _ => Err(ExporterError::InvalidValue {
                field: "type",
                value: value.to_string(),
            }),
        }
    }

    /// Classify a message by its sender.
    ///
    /// No sender means the platform generated the message itself; a verified
    /// sender named as the platform's official account is an announcement;
    /// everything else is a regular user message.
    #[must_use]
    pub fn classify(sender: Option<&InboxSender>) -> Self {
        match sender {
            None => Self::SystemNotification,
            Some(sender) if sender.verified && sender.username == OFFICIAL_ACCOUNT => {
                Self::OfficialMessage
            }
            Some(_) => Self::UserMessage,
        }
    }
}

/// Sender information embedded in an inbox message row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxSender {
    pub username: String,
    pub display_name: String,
    pub profile_url: String,
    pub userpic_url: Option<String>,
    pub verified: bool,
}

/// An inbox message scraped from the inbox HTML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxMessage {
    /// Queue id from the row's `lj_qid` attribute.
    pub qid: i64,

    /// Global message id; absent for system notifications.
    pub msgid: Option<i64>,

    /// Derived message classification.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Sender; None for system notifications.
    pub sender: Option<InboxSender>,

    /// Message title.
    pub title: String,

    /// Message body, HTML text content.
    pub body: String,

    /// Relative timestamp as shown in the inbox (e.g. "4 months ago").
    pub timestamp_relative: String,

    /// Absolute timestamp when available.
    pub timestamp_absolute: Option<String>,

    /// Read flag.
    pub read: bool,

    /// Bookmark flag.
    pub bookmarked: bool,
}

/// Metadata about the export operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// When the export was performed (ISO 8601, UTC).
    pub export_date: String,

    /// Account the export belongs to.
    pub lj_user: String,

    /// Version of this tool.
    pub exporter_version: String,

    /// Record counts, recomputed before every serialization.
    pub post_count: usize,
    pub comment_count: usize,
    pub inbox_count: usize,
}

impl ExportMetadata {
    /// Create metadata for a fresh export, stamped with the current time and
    /// this crate's version.
    #[must_use]
    pub fn new(lj_user: impl Into<String>) -> Self {
        Self {
            export_date: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            lj_user: lj_user.into(),
            exporter_version: env!("CARGO_PKG_VERSION").to_string(),
            post_count: 0,
            comment_count: 0,
            inbox_count: 0,
        }
    }
}

/// The complete export: metadata plus every downloaded collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LjExport {
    pub metadata: ExportMetadata,
    pub usermap: Vec<User>,
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub inbox: Vec<InboxMessage>,
}

impl LjExport {
    /// Create an empty export with the given metadata.
    #[must_use]
    pub fn new(metadata: ExportMetadata) -> Self {
        Self {
            metadata,
            usermap: Vec::new(),
            posts: Vec::new(),
            comments: Vec::new(),
            inbox: Vec::new(),
        }
    }

    /// Recompute the metadata counts from the current collections. This is
    /// the only write path to the count fields.
    pub fn update_counts(&mut self) {
        self.metadata.post_count = self.posts.len();
        self.metadata.comment_count = self.comments.len();
        self.metadata.inbox_count = self.inbox.len();
    }
}
