/// Category model and database operations
///
/// Categories are named, colored groupings for tasks. Names are unique;
/// inserting a name that already exists leaves the table untouched and yields
/// the existing row. There is no update operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;
use validator::{Validate, ValidationError};

/// Color used when a category is created without one
pub const DEFAULT_COLOR: &str = "#6c757d";

/// Insert attempts in [`Category::create_if_absent`] before giving up on a
/// name that keeps being deleted and recreated underneath it
pub const CREATE_ATTEMPTS: u32 = 3;

/// Category model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i32,

    /// Unique display name
    pub name: String,

    /// Hex color, `#rrggbb`
    pub color: String,

    pub created_at: Option<DateTime<Utc>>,
}

/// Input for creating a category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100, message = "name is required (at most 100 characters)"))]
    pub name: String,

    #[validate(custom(function = "validate_hex_color"))]
    pub color: Option<String>,
}

impl NewCategory {
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.color = self
            .color
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty());
        self
    }

    /// Color to store, falling back to [`DEFAULT_COLOR`]
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }
}

/// Accepts `#rgb` and `#rrggbb`
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let digits = color.strip_prefix('#').unwrap_or("");
    let valid = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());

    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("hex_color");
        err.message = Some("color must be a hex value like #3498db".into());
        Err(err)
    }
}

impl Category {
    /// Inserts a category unless one with the same name exists
    ///
    /// Returns the stored row and whether it was newly inserted. The insert and
    /// the lookup of the existing row are separate statements, so a conflicting
    /// row deleted in between is handled by inserting again. After
    /// [`CREATE_ATTEMPTS`] lost races the result is `RowNotFound`.
    pub async fn create_if_absent(
        pool: &PgPool,
        data: &NewCategory,
    ) -> Result<(Self, bool), sqlx::Error> {
        for attempt in 1..=CREATE_ATTEMPTS {
            let inserted = sqlx::query_as::<_, Category>(
                r#"
                INSERT INTO categories (name, color)
                VALUES ($1, $2)
                ON CONFLICT (name) DO NOTHING
                RETURNING id, name, color, created_at
                "#,
            )
            .bind(&data.name)
            .bind(data.color_or_default())
            .fetch_optional(pool)
            .await?;

            if let Some(category) = inserted {
                return Ok((category, true));
            }

            if let Some(existing) = Self::find_by_name(pool, &data.name).await? {
                return Ok((existing, false));
            }

            debug!(name = %data.name, attempt, "Conflicting category vanished, inserting again");
        }

        Err(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, color, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, color, created_at FROM categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await
    }

    /// Lists categories alphabetically
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, color, created_at FROM categories ORDER BY name",
        )
        .fetch_all(pool)
        .await
    }

    /// Deletes a category
    ///
    /// Fails with a foreign key violation while tasks still reference it.
    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
