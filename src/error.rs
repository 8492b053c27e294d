//! Shared error conventions.
//!
//! Every component owns its error enum (`NetworkError`, `InputError`,
//! `GeolocationError`, `ConfigError`). Errors that reach the user implement
//! [`ErrorCode`] so hosts get a stable code for telemetry and a short message
//! for the banner, independent of the `Display` text used in logs.

/// Stable code and user-facing text for an error.
pub trait ErrorCode {
    /// Stable machine-readable code, e.g. `"E_PERMISSION_DENIED"`.
    fn error_code(&self) -> &'static str;

    /// Short message suitable for a banner or status line.
    fn user_message(&self) -> String;
}
