//! Database schema and migrations for teledrive.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Folder tree
    r#"
CREATE TABLE folders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL CHECK (length(name) > 0),
    parent_id   INTEGER REFERENCES folders(id) ON DELETE CASCADE,  -- NULL = root
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX idx_folders_parent_id ON folders(parent_id);
"#,
    // v2: File records (single blobs and chunk fragments)
    r#"
CREATE TABLE files (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    original_filename   TEXT NOT NULL CHECK (length(original_filename) > 0),
    original_file_size  INTEGER NOT NULL CHECK (original_file_size >= 0),
    is_chunked          INTEGER NOT NULL DEFAULT 0,
    message_id          INTEGER NOT NULL,           -- message holding the blob or chunk
    blob_id             TEXT NOT NULL,              -- store-specific blob identifier
    upload_session_id   TEXT,
    chunk_index         INTEGER,
    total_chunks        INTEGER,
    chunk_size          INTEGER,                    -- byte length of this fragment
    parent_folder_id    INTEGER REFERENCES folders(id) ON DELETE SET NULL,
    is_public           INTEGER NOT NULL DEFAULT 0,
    public_share_token  TEXT UNIQUE,
    upload_date         TEXT NOT NULL DEFAULT (datetime('now')),
    CHECK (
        (is_chunked = 0 AND upload_session_id IS NULL AND chunk_index IS NULL
            AND total_chunks IS NULL AND chunk_size IS NULL)
        OR
        (is_chunked = 1 AND upload_session_id IS NOT NULL AND chunk_index IS NOT NULL
            AND total_chunks IS NOT NULL AND chunk_size IS NOT NULL
            AND chunk_index >= 0 AND chunk_index < total_chunks)
    ),
    CHECK ((is_public = 1) = (public_share_token IS NOT NULL))
);

CREATE UNIQUE INDEX idx_files_session_chunk ON files(upload_session_id, chunk_index);
CREATE INDEX idx_files_parent_folder_id ON files(parent_folder_id);
CREATE INDEX idx_files_upload_date ON files(upload_date);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_folders_migration() {
        let folders = MIGRATIONS[0];
        assert!(folders.contains("CREATE TABLE folders"));
        assert!(folders.contains("parent_id"));
    }

    #[test]
    fn test_files_migration_constraints() {
        let files = MIGRATIONS[1];
        assert!(files.contains("CREATE TABLE files"));
        assert!(files.contains("public_share_token  TEXT UNIQUE"));
        assert!(files.contains("idx_files_session_chunk"));
        assert!(files.contains("is_chunked"));
    }
}
