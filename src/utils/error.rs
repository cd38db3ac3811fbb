use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Corrupt collection '{collection}': {message}")]
    CorruptCollection { collection: String, message: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Permission denied: {role} cannot {action}")]
    PermissionDenied { action: String, role: String },

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("External service error ({service}): {message}")]
    ServiceError { service: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Access,
    State,
    Network,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PlatformError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn denied(action: impl Into<String>, role: impl std::fmt::Display) -> Self {
        Self::PermissionDenied {
            action: action.into(),
            role: role.to_string(),
        }
    }

    pub fn transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::TomlError(_) => ErrorCategory::Configuration,
            Self::ValidationError { .. } | Self::NotFound { .. } => ErrorCategory::Input,
            Self::PermissionDenied { .. } | Self::AuthError { .. } => ErrorCategory::Access,
            Self::InvalidTransition { .. } | Self::Conflict { .. } => ErrorCategory::State,
            Self::HttpError(_) | Self::ServiceError { .. } => ErrorCategory::Network,
            Self::ZipError(_)
            | Self::CsvError(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::CorruptCollection { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::State => ErrorSeverity::Medium,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Access | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::CorruptCollection { .. } => {
                "Restore the collection file from a backup or fix the JSON by hand"
            }
            Self::AuthError { .. } => "Check the email and password, or ask an admin to reactivate the account",
            Self::PermissionDenied { .. } => "Ask an admin to grant the required role",
            Self::InvalidTransition { .. } => "Check the current status before retrying",
            Self::NotFound { .. } => "List the records to find the correct id",
            Self::Conflict { .. } => "The record already exists or is in use",
            _ => match self.category() {
                ErrorCategory::Configuration => "Check the TOML config file and CLI flags",
                ErrorCategory::Input => "Correct the input values and retry",
                ErrorCategory::Network => "Check network connectivity and service endpoints, then retry",
                ErrorCategory::Storage => "Check that the data directory exists and is writable",
                _ => "Retry the operation",
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::HttpError(_) | Self::ServiceError { .. } => {
                format!("Could not reach an external service: {}", self)
            }
            Self::IoError(_) => format!("Could not read or write data files: {}", self),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;
