pub mod error;
pub mod ids;
pub mod logger;
pub mod tabular;
pub mod validation;
