//! Folder types and repository.

use sqlx::{QueryBuilder, SqlitePool};

use crate::{DriveError, Result};

/// A folder in the library.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Folder {
    /// Unique folder ID.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for root-level folders).
    pub parent_id: Option<i64>,
    /// When the folder was created.
    pub created_at: String,
}

/// Data for creating a new folder.
#[derive(Debug, Clone)]
pub struct NewFolder {
    /// Folder name.
    pub name: String,
    /// Parent folder ID (None for root-level folders).
    pub parent_id: Option<i64>,
}

impl NewFolder {
    /// Create a new root-level folder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
        }
    }

    /// Set the parent folder.
    pub fn with_parent(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = parent_id;
        self
    }
}

/// Builder for updating a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderUpdate {
    /// New folder name.
    pub name: Option<String>,
    /// New parent folder ID.
    pub parent_id: Option<Option<i64>>,
}

impl FolderUpdate {
    /// Create a new FolderUpdate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the parent folder ID.
    pub fn parent_id(mut self, parent_id: Option<i64>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

/// Repository for folder operations.
pub struct FolderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FolderRepository<'a> {
    /// Create a new FolderRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new folder.
    pub async fn create(&self, folder: &NewFolder) -> Result<Folder> {
        let result = sqlx::query("INSERT INTO folders (name, parent_id) VALUES (?, ?)")
            .bind(&folder.name)
            .bind(folder.parent_id)
            .execute(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DriveError::NotFound("folder".to_string()))
    }

    /// Get a folder by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| DriveError::Database(e.to_string()))?;

        Ok(folder)
    }

    /// List all root-level folders (parent_id is NULL).
    pub async fn list_root(&self) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at
             FROM folders WHERE parent_id IS NULL ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| DriveError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// List child folders of a parent folder.
    pub async fn list_by_parent(&self, parent_id: i64) -> Result<Vec<Folder>> {
        let folders = sqlx::query_as::<_, Folder>(
            "SELECT id, name, parent_id, created_at
             FROM folders WHERE parent_id = ? ORDER BY name, id",
        )
        .bind(parent_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| DriveError::Database(e.to_string()))?;

        Ok(folders)
    }

    /// Update a folder.
    pub async fn update(&self, id: i64, update: &FolderUpdate) -> Result<Option<Folder>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE folders SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(parent_id) = update.parent_id {
            separated.push("parent_id = ");
            separated.push_bind_unseparated(parent_id);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Check whether a folder exists.
    pub async fn exists(&self, id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| DriveError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    /// Get the depth of a folder (0 for a root-level folder).
    pub async fn get_depth(&self, id: i64) -> Result<usize> {
        Ok(self.get_path(id).await?.len().saturating_sub(1))
    }

    /// Number of levels below a folder (0 for a folder without children).
    pub async fn subtree_height(&self, id: i64) -> Result<usize> {
        let height: i64 = sqlx::query_scalar(
            "WITH RECURSIVE subtree(id, level) AS (
                 SELECT id, 0 FROM folders WHERE id = ?
                 UNION ALL
                 SELECT f.id, s.level + 1 FROM folders f JOIN subtree s ON f.parent_id = s.id
             )
             SELECT COALESCE(MAX(level), 0) FROM subtree",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| DriveError::Database(e.to_string()))?;

        Ok(usize::try_from(height).unwrap_or(0))
    }

    /// Get the path from the root to a folder (inclusive).
    pub async fn get_path(&self, id: i64) -> Result<Vec<Folder>> {
        let mut path: Vec<Folder> = Vec::new();
        let mut current_id = Some(id);

        while let Some(folder_id) = current_id {
            if path.iter().any(|f| f.id == folder_id) {
                return Err(DriveError::Database(format!(
                    "folder {folder_id} is its own ancestor"
                )));
            }
            match self.get_by_id(folder_id).await? {
                Some(folder) => {
                    current_id = folder.parent_id;
                    path.push(folder);
                }
                None => break,
            }
        }

        path.reverse();
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new("Photos")).await.unwrap();

        assert_eq!(folder.name, "Photos");
        assert!(folder.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_get_folder_not_found() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_root_and_children() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let parent = repo.create(&NewFolder::new("B")).await.unwrap();
        repo.create(&NewFolder::new("A")).await.unwrap();
        repo.create(&NewFolder::new("Child 2").with_parent(Some(parent.id)))
            .await
            .unwrap();
        repo.create(&NewFolder::new("Child 1").with_parent(Some(parent.id)))
            .await
            .unwrap();

        let roots = repo.list_root().await.unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "A");
        assert_eq!(roots[1].name, "B");

        let children = repo.list_by_parent(parent.id).await.unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "Child 1");
        assert_eq!(children[1].name, "Child 2");
    }

    #[tokio::test]
    async fn test_update_folder() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let a = repo.create(&NewFolder::new("Original")).await.unwrap();
        let b = repo.create(&NewFolder::new("Other")).await.unwrap();

        let updated = repo
            .update(a.id, &FolderUpdate::new().name("Renamed").parent_id(Some(b.id)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.parent_id, Some(b.id));

        assert!(repo
            .update(9999, &FolderUpdate::new().name("x"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_exists() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let folder = repo.create(&NewFolder::new("Here")).await.unwrap();
        assert!(repo.exists(folder.id).await.unwrap());
        assert!(!repo.exists(folder.id + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_path_and_depth() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        let a = repo.create(&NewFolder::new("a")).await.unwrap();
        let b = repo
            .create(&NewFolder::new("b").with_parent(Some(a.id)))
            .await
            .unwrap();
        let c = repo
            .create(&NewFolder::new("c").with_parent(Some(b.id)))
            .await
            .unwrap();

        let path = repo.get_path(c.id).await.unwrap();
        let names: Vec<&str> = path.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        assert_eq!(repo.get_depth(a.id).await.unwrap(), 0);
        assert_eq!(repo.get_depth(c.id).await.unwrap(), 2);

        assert_eq!(repo.subtree_height(a.id).await.unwrap(), 2);
        assert_eq!(repo.subtree_height(b.id).await.unwrap(), 1);
        assert_eq!(repo.subtree_height(c.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_name_rejected_by_schema() {
        let db = setup_db().await;
        let repo = FolderRepository::new(db.pool());

        assert!(repo.create(&NewFolder::new("")).await.is_err());
    }
}
