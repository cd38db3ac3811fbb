pub mod adoption;
pub mod analytics;
pub mod auth;
pub mod awareness;
pub mod cases;
pub mod community;
pub mod contacts;
pub mod feeding;
pub mod geo;
pub mod hotspots;
pub mod messaging;
pub mod notifications;
pub mod platform;
pub mod profile;
pub mod search;
pub mod sos;
pub mod store;
pub mod tasks;
pub mod triage;
pub mod vaccination;

pub use crate::domain::ports::Storage;
pub use crate::utils::error::Result;
pub use platform::Platform;
