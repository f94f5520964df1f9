//! Image descriptors supplied by the page composition layer.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// An immutable image descriptor.
///
/// Owned by the caller; the engine only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    /// Alternative text, also used as the item identifier.
    pub alt: String,
    /// Source URL of the full-resolution image.
    pub source: String,
    /// Intrinsic width in pixels.
    pub width: u32,
    /// Intrinsic height in pixels.
    pub height: u32,
    /// Whether the item should be loaded ahead of everything else.
    #[serde(default)]
    pub priority: bool,
}

impl ImageItem {
    /// Create a non-priority item.
    pub fn new(alt: impl Into<String>, source: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            alt: alt.into(),
            source: source.into(),
            width,
            height,
            priority: false,
        }
    }

    /// Mark the item as priority.
    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    /// Height divided by width, or 1.0 for degenerate dimensions.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width == 0 {
            return 1.0;
        }
        self.height as f64 / self.width as f64
    }
}

/// Errors reading an image manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The manifest is not a JSON array of image items.
    #[error("Invalid manifest {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Load an ordered list of image items from a JSON manifest.
pub fn load_manifest(path: &Path) -> Result<Vec<ImageItem>, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.display().to_string(),
        source,
    })?;

    serde_json::from_str(&contents).map_err(|source| ManifestError::Parse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_priority_defaults_to_false_in_manifest() {
        let json = r#"[{"alt":"image01","source":"/a.webp","width":640,"height":960}]"#;
        let items: Vec<ImageItem> = serde_json::from_str(json).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].priority);
    }

    #[test]
    fn test_aspect_ratio() {
        let item = ImageItem::new("a", "/a.webp", 640, 960);
        assert!((item.aspect_ratio() - 1.5).abs() < f64::EPSILON);

        let degenerate = ImageItem::new("b", "/b.webp", 0, 960);
        assert_eq!(degenerate.aspect_ratio(), 1.0);
    }

    #[test]
    fn test_load_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"alt":"a","source":"/a.webp","width":640,"height":960,"priority":true}},
                {{"alt":"b","source":"/b.webp","width":640,"height":960}}]"#
        )
        .unwrap();

        let items = load_manifest(file.path()).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].priority);
        assert_eq!(items[1].source, "/b.webp");
    }

    #[test]
    fn test_load_manifest_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = load_manifest(file.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }
}
