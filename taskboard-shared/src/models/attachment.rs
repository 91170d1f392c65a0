/// Attachment model and database operations
///
/// An attachment is a file uploaded against a task. The bytes live in the blob
/// store under [`NewAttachment::blob_name`]; the row keeps the metadata and the
/// blob name so the file can be removed together with its task.
///
/// ```text
/// attachments/{task_id}/{uuid}-{sanitized filename}
/// ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Content type recorded when the client sends none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest sanitized filename kept in a blob name
const MAX_BLOB_FILENAME: usize = 100;

/// Attachment metadata row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: i32,
    pub task_id: i32,

    /// Name as uploaded
    pub filename: String,

    pub description: Option<String>,
    pub content_type: String,
    pub size_bytes: i64,

    /// Blob holding the content
    pub blob_name: String,

    pub created_at: Option<DateTime<Utc>>,
}

/// File received from a client, before anything is stored
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub body: Bytes,
}

/// Row to insert for an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewAttachment {
    pub task_id: i32,

    #[validate(length(min = 1, max = 255, message = "filename is required (at most 255 characters)"))]
    pub filename: String,

    #[validate(length(max = 10000, message = "description is too long"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 255, message = "content type is too long"))]
    pub content_type: String,

    #[validate(range(min = 1, message = "file is empty"))]
    pub size_bytes: i64,

    pub blob_name: String,
}

impl NewAttachment {
    /// Describes `upload` for `task_id`, choosing a fresh blob name
    pub fn from_upload(task_id: i32, upload: &Upload) -> Self {
        let filename = upload.filename.trim().to_string();
        let content_type = upload
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        Self {
            task_id,
            blob_name: blob_name(task_id, &filename),
            filename,
            description: upload
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            content_type,
            size_bytes: upload.body.len() as i64,
        }
    }
}

/// Blob name for a file attached to `task_id`; unique per call
pub fn blob_name(task_id: i32, filename: &str) -> String {
    format!(
        "attachments/{}/{}-{}",
        task_id,
        Uuid::new_v4().simple(),
        sanitize_filename(filename)
    )
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; anything else becomes `_`
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_BLOB_FILENAME)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

impl Attachment {
    /// Inserts attachment metadata
    ///
    /// # Errors
    ///
    /// Fails with a foreign key violation if the task does not exist.
    pub async fn create(pool: &PgPool, data: &NewAttachment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments (task_id, filename, description, content_type, size_bytes, blob_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, task_id, filename, description, content_type, size_bytes, blob_name, created_at
            "#,
        )
        .bind(data.task_id)
        .bind(&data.filename)
        .bind(&data.description)
        .bind(&data.content_type)
        .bind(data.size_bytes)
        .bind(&data.blob_name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Attachment>(
            r#"
            SELECT id, task_id, filename, description, content_type, size_bytes, blob_name, created_at
            FROM attachments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, body: &'static [u8]) -> Upload {
        Upload {
            filename: filename.to_string(),
            content_type: None,
            description: None,
            body: Bytes::from_static(body),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("Q3 report (final).pdf"), "Q3_report__final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), MAX_BLOB_FILENAME);
    }

    #[test]
    fn test_blob_names_are_scoped_and_unique() {
        let a = blob_name(7, "plan.txt");
        let b = blob_name(7, "plan.txt");

        assert!(a.starts_with("attachments/7/"));
        assert!(a.ends_with("-plan.txt"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_upload_defaults() {
        let data = NewAttachment::from_upload(3, &upload("  notes.txt ", b"hello"));

        assert_eq!(data.task_id, 3);
        assert_eq!(data.filename, "notes.txt");
        assert_eq!(data.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(data.size_bytes, 5);
        assert_eq!(data.description, None);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_from_upload_keeps_metadata() {
        let data = NewAttachment::from_upload(
            3,
            &Upload {
                content_type: Some("text/plain".to_string()),
                description: Some(" meeting notes ".to_string()),
                ..upload("notes.txt", b"hello")
            },
        );

        assert_eq!(data.content_type, "text/plain");
        assert_eq!(data.description.as_deref(), Some("meeting notes"));
    }

    #[test]
    fn test_empty_or_unnamed_upload_rejected() {
        let empty = NewAttachment::from_upload(1, &upload("empty.txt", b""));
        assert!(empty.validate().is_err());

        let unnamed = NewAttachment::from_upload(1, &upload("   ", b"data"));
        assert!(unnamed.validate().is_err());
        assert!(unnamed.blob_name.ends_with("-file"));
    }
}
