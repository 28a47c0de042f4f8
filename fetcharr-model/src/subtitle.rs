use serde::{Deserialize, Serialize};

/// A subtitle file owned by a `MediaItem`. Cascades with the owning item on
/// delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub language: String,
    pub file_path: String,
}

impl Subtitle {
    pub fn new(language: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            file_path: file_path.into(),
        }
    }
}
