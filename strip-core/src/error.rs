//! Error types for the comic strip continuity core.
//!
//! Uses thiserror for ergonomic error definition.

use crate::id::ComicId;

/// Main error type for the continuity core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Admission gate error
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// Registration error
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Episode cycle error
    #[error("Advance error: {0}")]
    Advance(#[from] AdvanceError),

    /// Capability token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Persistence error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Generation provider error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Email delivery error
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors from the admission gate
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The content-policy check itself could not run; the gate fails closed
    #[error("Content policy check unavailable: {reason}")]
    PolicyCheckUnavailable { reason: String },

    /// Persistence failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from registration
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Recomputed fingerprint does not match the claimed one
    #[error("Fingerprint mismatch for submitted prompt")]
    HashMismatch,

    /// No comic exists for the supplied id
    #[error("Verification record not found")]
    RecordNotFound,

    /// Stored fingerprint does not match the recomputed one
    #[error("Stored fingerprint mismatch; prompt was modified")]
    StoredHashMismatch,

    /// Per-origin creation quota exceeded
    #[error("Rate limit reached ({limit} per day). Try again tomorrow.")]
    RateLimited { limit: u32 },

    /// Email failed format validation
    #[error("Invalid email: {reason}")]
    InvalidEmail { reason: String },

    /// Persistence failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from a continuity cycle
#[derive(Debug, thiserror::Error)]
pub enum AdvanceError {
    /// No comic exists for the supplied id
    #[error("Comic not found: {0}")]
    NotFound(ComicId),

    /// The comic has no owner email and cannot receive episodes
    #[error("Comic {0} has no subscriber")]
    NotEligible(ComicId),

    /// A generation provider failed or returned an unusable result
    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    /// The previous episode's artifact could not be fetched for reference
    #[error("Failed to fetch reference artifact {url}: {reason}")]
    ArtifactFetch { url: String, reason: String },

    /// Persistence or artifact upload failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from capability token verification
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The presented signature does not authorize the action
    #[error("Unauthorized")]
    Unauthorized,
}

/// Errors from persistence and object storage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A comic with this fingerprint already exists
    #[error("Duplicate fingerprint: {fingerprint}")]
    DuplicateFingerprint { fingerprint: String },

    /// The backing store could not complete the operation
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Errors from generation providers
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// API error from provider
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),

    /// Response parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider answered but the result is missing required content
    #[error("Unusable result: {0}")]
    Unusable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<gemini::Error> for ProviderError {
    fn from(error: gemini::Error) -> Self {
        match error {
            gemini::Error::NoApiKey => ProviderError::Config("API key not configured".to_string()),
            gemini::Error::Network(message) => ProviderError::Network(message),
            gemini::Error::Api { status, message } => ProviderError::Api { status, message },
            gemini::Error::Parse(message) => ProviderError::Parse(message),
            gemini::Error::Config(message) => ProviderError::Config(message),
        }
    }
}

/// Errors from email delivery
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// API error from the delivery service
    #[error("Delivery API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network/connection error
    #[error("Network error: {0}")]
    Network(String),

    /// The delivery service rejected the message
    #[error("Delivery rejected: {reason}")]
    Rejected { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for provider operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
