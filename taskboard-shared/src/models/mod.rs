/// Database models for Taskboard
///
/// # Models
///
/// - `attachment`: file metadata for uploads stored in the blob store
/// - `category`: named, colored groupings (unique name, no update)
/// - `task`: tasks with priority, forward-only status and optional category
///
/// Each model owns its SQL as associated functions taking a `&PgPool`; the
/// `store` module wraps them behind the `TaskStore` trait.

pub mod attachment;
pub mod category;
pub mod task;

pub use attachment::{Attachment, NewAttachment, Upload};
pub use category::{Category, NewCategory};
pub use task::{NewTask, Priority, Task, TaskStats, TaskStatus};
