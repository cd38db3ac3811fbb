// Adapters layer: concrete implementations of the domain ports.

pub mod http;
pub mod notify;
pub mod storage;

pub use http::{NominatimGeocoder, OsrmRouter};
pub use notify::{CompositeNotifier, SendGridMailer, TwilioSms};
pub use storage::{LocalStorage, MemoryStorage};
