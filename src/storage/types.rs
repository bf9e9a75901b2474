//! Storage types

/// Metadata about a stored object
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: i64,
    /// MIME type, if the backend recorded one
    pub content_type: Option<String>,
}
