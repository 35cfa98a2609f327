//! Extension denylist deciding which discovered files are retrieved.

/// Extensions (lowercase, without the dot) that are never retrieved: archives
/// and common raster/vector image formats.
pub const DENIED_EXTENSIONS: &[&str] = &["zip", "svg", "jpg", "jpeg", "png", "gif"];

/// Decides whether a discovered file path should be retrieved.
///
/// The decision depends only on the extension of the final path segment,
/// compared case-insensitively. Paths without an extension are included.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathFilter;

impl PathFilter {
    /// Creates the default filter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `false` iff the path's extension is in [`DENIED_EXTENSIONS`].
    ///
    /// # Examples
    ///
    /// ```
    /// use repofetch_core::PathFilter;
    ///
    /// let filter = PathFilter::new();
    /// assert!(filter.should_include("src/main.go"));
    /// assert!(!filter.should_include("assets/Logo.PNG"));
    /// assert!(filter.should_include("Makefile"));
    /// ```
    #[must_use]
    pub fn should_include(&self, path: &str) -> bool {
        match extension(path) {
            Some(ext) => !DENIED_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
            None => true,
        }
    }
}

/// Substring after the final `.` of the final `/`-separated segment.
///
/// A leading dot alone (`.gitignore`) is a hidden file, not an extension.
fn extension(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let dot = file_name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(&file_name[dot + 1..])
}
