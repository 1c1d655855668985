//! Database models split into domain-specific modules.

pub mod auth;
pub mod recurrence;
pub mod reminder;
pub mod sync;

pub use auth::*;
pub use recurrence::*;
pub use reminder::*;
pub use sync::*;
