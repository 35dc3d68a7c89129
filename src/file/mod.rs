//! File library module for teledrive.
//!
//! This module provides the metadata side of the drive:
//! - Hierarchical folder structure
//! - File records for single blobs and chunk fragments
//! - Library operations over folders and listed files

mod folder;
mod metadata;
mod service;

pub use folder::{Folder, FolderRepository, FolderUpdate, NewFolder};
pub use metadata::{
    ChunkRef, FileFilter, FileRecord, FileRepository, FileSort, FileUpdate, NewFile, StorageRef,
};
pub use service::LibraryService;

use crate::{DriveError, Result};

/// Maximum length for filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length for folder name (in characters).
pub const MAX_FOLDER_NAME_LENGTH: usize = 100;

/// Maximum folder depth (levels).
pub const MAX_FOLDER_DEPTH: usize = 10;

/// Check a user-supplied filename.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(DriveError::Validation("filename is empty".to_string()));
    }
    if filename.chars().count() > MAX_FILENAME_LENGTH {
        return Err(DriveError::Validation(format!(
            "filename exceeds {MAX_FILENAME_LENGTH} characters"
        )));
    }
    if filename.chars().any(char::is_control) {
        return Err(DriveError::Validation(
            "filename contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Check a folder name.
pub fn validate_folder_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DriveError::Validation("folder name is empty".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(DriveError::Validation(format!(
            "folder name exceeds {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Parse a parent folder reference as sent by clients.
///
/// `root`, `null` and the empty string all name the root folder.
pub fn parse_parent_ref(raw: Option<&str>) -> Result<Option<i64>> {
    match raw.map(str::trim) {
        None | Some("") | Some("root") | Some("null") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| DriveError::Validation(format!("invalid folder id: {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("写真.jpg").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("   ").is_err());
        assert!(validate_filename("a\nb").is_err());
        assert!(validate_filename(&"a".repeat(MAX_FILENAME_LENGTH)).is_ok());
        assert!(validate_filename(&"a".repeat(MAX_FILENAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_folder_name() {
        assert!(validate_folder_name("Photos").is_ok());
        assert!(validate_folder_name(" ").is_err());
        assert!(validate_folder_name(&"x".repeat(MAX_FOLDER_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_parse_parent_ref() {
        assert_eq!(parse_parent_ref(None).unwrap(), None);
        assert_eq!(parse_parent_ref(Some("root")).unwrap(), None);
        assert_eq!(parse_parent_ref(Some("")).unwrap(), None);
        assert_eq!(parse_parent_ref(Some("null")).unwrap(), None);
        assert_eq!(parse_parent_ref(Some("42")).unwrap(), Some(42));
        assert!(matches!(
            parse_parent_ref(Some("abc")),
            Err(DriveError::Validation(_))
        ));
    }
}
