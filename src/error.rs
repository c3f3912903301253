//! Error types for the exporter.
//!
//! One flat error enum for the whole crate, with contextual wrapper variants
//! for the download drivers so a failure names the month, cursor or page that
//! produced it.

use thiserror::Error;

/// Main error type for the exporter library.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Cookie exchange failed during login.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Session cookies were absent from the login response.
    #[error("Failed to acquire session cookies. Check your username and password.")]
    InvalidCredentials,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request kept failing until the retry budget ran out.
    #[error("{method} {url} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        method: &'static str,
        url: String,
        attempts: u32,
        message: String,
    },

    /// XML response was not well-formed.
    #[error("Failed to parse XML: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// A required field was absent from a wire payload.
    #[error("Missing required field: {field}{}", .context.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    MissingField {
        field: &'static str,
        context: Option<String>,
    },

    /// A field carried a value outside its domain.
    #[error("Invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// Pagination markup was present but did not match "Page X of Y".
    #[error("Could not parse pagination text: {0}")]
    InvalidPagination(String),

    /// Neither post-count extraction strategy matched the profile page.
    #[error("Could not extract post count from profile page")]
    ProfilePostCount,

    /// The journal creation date was absent from the profile page.
    #[error("Could not find journal creation date in profile")]
    ProfileCreationDate,

    /// A localized month name was not in the translation table.
    #[error("Unknown month name '{0}' in profile page")]
    UnknownMonth(String),

    /// Posts download failed for a specific month.
    #[error("Posts download failed for {year}-{month:02}: {source}")]
    PostsMonth {
        year: i32,
        month: u32,
        #[source]
        source: Box<ExporterError>,
    },

    /// Comments download failed at a specific cursor position.
    #[error("Comments download failed at cursor {cursor}: {source}")]
    CommentsBatch {
        cursor: i64,
        #[source]
        source: Box<ExporterError>,
    },

    /// Inbox download failed on a specific page.
    #[error("Inbox download failed on page {page} of folder '{folder}': {source}")]
    InboxPage {
        folder: String,
        page: u32,
        #[source]
        source: Box<ExporterError>,
    },

    /// YAML serialization or deserialization failed.
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive path had no recognized extension.
    #[error("Unsupported archive format: '{0}'. Expected .yaml, .yml, .json or .xml")]
    UnknownFormat(String),

    /// Month outside 1-12.
    #[error("Invalid month: {0}. Expected a value from 1 to 12")]
    InvalidMonth(u32),

    /// Username did not match the platform's username shape.
    #[error("Invalid username: '{0}'. Expected lowercase letters, digits and underscores")]
    InvalidUsername(String),

    /// Only some of the four date-range bounds were given.
    #[error("Incomplete date range: start and end year/month must be given together")]
    IncompleteRange,

    /// No credentials from flags or config file.
    #[error("Username and password are required. Pass --username/--password or set them in the config file")]
    MissingCredentials,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_without_context() {
        let err = ExporterError::MissingField {
            field: "maxid",
            context: None,
        };
        assert_eq!(err.to_string(), "Missing required field: maxid");
    }

    #[test]
    fn test_missing_field_with_context() {
        let err = ExporterError::MissingField {
            field: "eventtime",
            context: Some("itemid 116992".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Missing required field: eventtime (itemid 116992)"
        );
    }

    #[test]
    fn test_invalid_value_display() {
        let err = ExporterError::InvalidValue {
            field: "maxid",
            value: "not_a_number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid maxid value: not_a_number");
    }

    #[test]
    fn test_posts_month_wraps_source() {
        let source = ExporterError::MissingField {
            field: "itemid",
            context: None,
        };
        let err = ExporterError::PostsMonth {
            year: 2023,
            month: 1,
            source: Box::new(source),
        };
        assert_eq!(
            err.to_string(),
            "Posts download failed for 2023-01: Missing required field: itemid"
        );
    }
}
