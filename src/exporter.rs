//! Top-level download orchestration.
//!
//! Ties the authenticated session, the per-content-type drivers and the
//! cross-reference resolver together into one [`LjExport`] aggregate. A
//! failure in any non-skipped content type aborts the whole run; there is no
//! partial archive.

use crate::comments;
use crate::config::Config;
use crate::error::Result;
use crate::http::Session;
use crate::inbox;
use crate::posts::{self, MonthRange};
use crate::types::{ExportMetadata, LjExport};

/// What to download, and over which post range.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub posts: bool,
    pub comments: bool,
    pub inbox: bool,

    /// Explicit post range; None auto-discovers one from the profile.
    pub range: Option<MonthRange>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            posts: true,
            comments: true,
            inbox: true,
            range: None,
        }
    }
}

/// Download every requested content type and assemble the export aggregate.
pub fn download_journal(
    session: &Session,
    config: &Config,
    username: &str,
    options: &DownloadOptions,
) -> Result<LjExport> {
    let mut export = LjExport::new(ExportMetadata::new(username));

    if options.posts {
        export.posts = posts::download_posts(session, config, username, options.range)?;
        tracing::info!(count = export.posts.len(), "Downloaded posts");
    } else {
        tracing::info!("Skipping posts download");
    }

    if options.comments {
        let (comments, usermap) = comments::download_comments(session, config)?;
        tracing::info!(
            count = comments.len(),
            users = usermap.len(),
            "Downloaded comments"
        );
        export.comments = comments;
        export.usermap = usermap;
    } else {
        tracing::info!("Skipping comments download");
    }

    if options.inbox {
        let folders = if config.inbox_folders.is_empty() {
            vec!["all".to_string()]
        } else {
            config.inbox_folders.clone()
        };
        export.inbox = inbox::download_inbox(session, config, &folders)?;
        tracing::info!(count = export.inbox.len(), "Downloaded inbox messages");
    } else {
        tracing::info!("Skipping inbox download");
    }

    export.update_counts();
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_download_everything() {
        let options = DownloadOptions::default();
        assert!(options.posts);
        assert!(options.comments);
        assert!(options.inbox);
        assert!(options.range.is_none());
    }
}
