//! Request DTOs for Web API.

use serde::Deserialize;

use crate::file::parse_parent_ref;
use crate::Result;

/// A folder reference as sent by clients: a numeric id, or a string that is
/// either an id or `root`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FolderRef {
    /// Numeric folder id.
    Id(i64),
    /// Textual id or `root`.
    Text(String),
}

impl FolderRef {
    /// Resolve to a folder id (None = root).
    pub fn resolve(&self) -> Result<Option<i64>> {
        match self {
            FolderRef::Id(id) => Ok(Some(*id)),
            FolderRef::Text(text) => parse_parent_ref(Some(text)),
        }
    }
}

/// Query string of `GET /api/files` and `GET /api/folders`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderQuery {
    /// Folder to list (absent or `root` = root).
    #[serde(default, alias = "parentId")]
    pub folder_id: Option<String>,
}

/// Folder creation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    /// Folder name.
    pub name: String,
    /// Parent folder (absent, null or `root` = root).
    #[serde(default)]
    pub parent_id: Option<FolderRef>,
}

/// Folder update request. Absent fields are left unchanged; move to the root
/// with `"parentId": "root"`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderRequest {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New parent folder.
    #[serde(default)]
    pub parent_id: Option<FolderRef>,
}

/// File update request. Absent fields are left unchanged; move to the root
/// with `"parentFolderId": "root"`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    /// New filename.
    #[serde(default)]
    pub name: Option<String>,
    /// New parent folder.
    #[serde(default, alias = "parentId")]
    pub parent_folder_id: Option<FolderRef>,
}
