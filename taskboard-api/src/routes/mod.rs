/// API route handlers
///
/// Handlers organized by resource:
///
/// - `dashboard`: HTML board at `/`
/// - `health`: Health check endpoint
/// - `tasks`: task create and state changes (forms and JSON)
/// - `api`: JSON listings and category management
/// - `backup`: snapshot export to blob storage

pub mod api;
pub mod backup;
pub mod dashboard;
pub mod health;
pub mod tasks;
