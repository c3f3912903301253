//! End-to-end integration tests for the ingestion pipeline.
//!
//! Parses the wire-format fixtures through the real parsers, resolves
//! cross-references, assembles the export aggregate and round-trips it
//! through every supported archive encoding.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use lj_exporter::archive::{self, Format};
use lj_exporter::comments::{parse_comment_metadata, parse_comments, resolve_poster_usernames};
use lj_exporter::inbox::parse_inbox_page;
use lj_exporter::posts::parse_posts;
use lj_exporter::profile::parse_profile;
use lj_exporter::types::{ExportMetadata, LjExport, MessageType, Security};
use lj_exporter::validation::validate_export;

/// Load fixture file content.
fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

/// Run the full parsing pipeline over the fixtures.
fn run_pipeline() -> LjExport {
    let posts = parse_posts(&load_fixture("sample_posts.xml")).expect("parse posts");

    let (maxid, usermap) =
        parse_comment_metadata(&load_fixture("sample_comment_meta.xml")).expect("parse meta");
    assert_eq!(maxid, 5);

    let mut comments =
        parse_comments(&load_fixture("sample_comment_bodies.xml")).expect("parse comments");
    resolve_poster_usernames(&mut comments, &usermap);

    let (inbox, has_next) =
        parse_inbox_page(&load_fixture("sample_inbox.html")).expect("parse inbox");
    assert!(!has_next);

    let mut export = LjExport::new(ExportMetadata::new("testuser"));
    export.usermap = usermap;
    export.posts = posts;
    export.comments = comments;
    export.inbox = inbox;
    export.update_counts();
    export
}

#[test]
fn test_pipeline_posts() {
    let export = run_pipeline();
    assert_eq!(export.posts.len(), 4);

    let first = &export.posts[0];
    assert_eq!(first.itemid, 116992);
    assert_eq!(first.jitemid, Some(457));
    assert_eq!(first.subject, Some("First Post Title".to_string()));
    assert_eq!(
        first.event,
        "<p>This is the <b>first post</b> with HTML content.</p>"
    );
    assert_eq!(first.current_mood, Some("happy".to_string()));

    // Explicitly empty subject normalizes to None.
    assert!(export.posts[1].subject.is_none());
    assert_eq!(export.posts[1].security, Security::Private);

    assert_eq!(export.posts[2].security, Security::Friends);
    assert!(export.posts[2].event.contains("<p>Multiple paragraphs!</p>"));

    assert_eq!(export.posts[3].security, Security::Custom);
    assert_eq!(export.posts[3].allowmask, 42);
}

#[test]
fn test_pipeline_comments_linked_to_posts() {
    let export = run_pipeline();
    assert_eq!(export.comments.len(), 5);

    // Every comment's jitemid points at a post parsed from the posts fixture.
    for comment in &export.comments {
        assert!(
            export.posts.iter().any(|p| p.jitemid == Some(comment.jitemid)),
            "comment {} has dangling jitemid {}",
            comment.id,
            comment.jitemid
        );
    }

    // Username resolution: known posters resolve, anonymous stays null,
    // posters missing from the usermap get a placeholder.
    assert_eq!(
        export.comments[0].poster_username,
        Some("friend1".to_string())
    );
    assert!(export.comments[3].poster_username.is_none());
    assert_eq!(
        export.comments[4].poster_username,
        Some("[unknown-2042]".to_string())
    );
    assert_eq!(export.comments[4].state, Some("deleted".to_string()));

    // The assembled export passes the advisory validation cleanly except for
    // the poster missing from the usermap.
    let findings = validate_export(&export);
    assert_eq!(
        findings,
        vec!["Comment 5: posterid 2042 not in usermap".to_string()]
    );
}

#[test]
fn test_pipeline_inbox_classification() {
    let export = run_pipeline();
    assert_eq!(export.inbox.len(), 3);

    let official = &export.inbox[0];
    assert_eq!(official.qid, 8);
    assert_eq!(official.msgid, Some(95201687));
    assert_eq!(official.message_type, MessageType::OfficialMessage);
    assert_eq!(official.title, "LiveJournal User Agreement updated");
    assert!(official.read);
    assert!(!official.bookmarked);

    let user_message = &export.inbox[1];
    assert_eq!(user_message.message_type, MessageType::UserMessage);
    assert_eq!(user_message.title, "Long time no see");
    assert!(!user_message.read);
    assert!(user_message.bookmarked);
    assert_eq!(
        user_message.sender.as_ref().map(|s| s.username.as_str()),
        Some("friend1")
    );

    let notification = &export.inbox[2];
    assert_eq!(notification.message_type, MessageType::SystemNotification);
    assert!(notification.sender.is_none());
    assert!(notification.msgid.is_none());
}

#[test]
fn test_pipeline_counts() {
    let export = run_pipeline();
    assert_eq!(export.metadata.post_count, 4);
    assert_eq!(export.metadata.comment_count, 5);
    assert_eq!(export.metadata.inbox_count, 3);
    assert_eq!(export.metadata.lj_user, "testuser");
}

#[test]
fn test_profile_fixture_matches_posts() {
    let profile = parse_profile(&load_fixture("sample_profile.html")).expect("parse profile");
    assert_eq!(profile.post_count, 4);
    assert_eq!((profile.created_year, profile.created_month), (2023, 1));
    assert_eq!(profile.update_bound(), (2023, 4));
}

#[test]
fn test_roundtrip_all_formats() {
    let export = run_pipeline();

    for format in [Format::Yaml, Format::Json, Format::Xml] {
        let serialized = archive::to_string(&export, format).expect("serialize");
        let loaded = archive::from_string(&serialized, format).expect("deserialize");

        assert_eq!(loaded.metadata.lj_user, export.metadata.lj_user);
        assert_eq!(loaded.posts.len(), export.posts.len());
        assert_eq!(loaded.comments.len(), export.comments.len());
        assert_eq!(loaded.inbox.len(), export.inbox.len());
        assert_eq!(loaded.usermap.len(), export.usermap.len());

        // HTML bodies survive with their embedded tags.
        assert_eq!(
            loaded.posts[0].event,
            "<p>This is the <b>first post</b> with HTML content.</p>"
        );
        // Nulls stay null, not empty strings.
        assert!(loaded.posts[1].subject.is_none());
        assert!(loaded.comments[3].posterid.is_none());
        assert!(loaded.inbox[2].sender.is_none());

        assert_eq!(loaded, export);
    }
}

#[test]
fn test_convert_between_formats_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let yaml_path = dir.path().join("backup.yaml");
    let xml_path = dir.path().join("backup.xml");

    let mut export = run_pipeline();
    archive::save(&mut export, &yaml_path).expect("save yaml");

    let mut reloaded = archive::load(&yaml_path).expect("load yaml");
    archive::save(&mut reloaded, &xml_path).expect("save xml");

    let from_xml = archive::load(&xml_path).expect("load xml");
    assert_eq!(from_xml, export);
}
