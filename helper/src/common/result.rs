//! Common Result Type

use super::error::AppError;

/// Application result type for setup and the settings surface.
///
/// Request handling never returns this: every failure there becomes a `Response`.
pub type AppResult<T> = Result<T, AppError>;
