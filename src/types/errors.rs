use std::fmt;

// === ValidationError ===

/// Malformed user input, detected before any store interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The title is empty or whitespace only.
    EmptyTitle,
    /// The URL is not a well-formed absolute URL with a host.
    InvalidUrl(String),
    /// The bookmark identifier is empty.
    InvalidId(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "Title must not be empty"),
            ValidationError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            ValidationError::InvalidId(id) => write!(f, "Invalid bookmark id: {:?}", id),
        }
    }
}

impl std::error::Error for ValidationError {}

// === StoreError ===

/// Failures reported by the persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A statement failed (constraint violation, I/O, corrupt row).
    Database(String),
    /// The store could not be reached or its connection is unusable.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Store database error: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

// === BookmarkError ===

/// Errors surfaced by the bookmark synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkError {
    /// Input was rejected before reaching the store.
    Validation(ValidationError),
    /// The operation mutates data and there is no signed-in user.
    AuthenticationRequired,
    /// The store rejected or failed the request.
    Store(StoreError),
}

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkError::Validation(err) => write!(f, "Validation failed: {}", err),
            BookmarkError::AuthenticationRequired => write!(f, "User not authenticated"),
            BookmarkError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BookmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookmarkError::Validation(err) => Some(err),
            BookmarkError::AuthenticationRequired => None,
            BookmarkError::Store(err) => Some(err),
        }
    }
}

impl From<ValidationError> for BookmarkError {
    fn from(err: ValidationError) -> Self {
        BookmarkError::Validation(err)
    }
}

impl From<StoreError> for BookmarkError {
    fn from(err: StoreError) -> Self {
        BookmarkError::Store(err)
    }
}

// === AuthError ===

/// Errors related to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No backend URL has been configured.
    NotConfigured,
    /// A sign-in callback arrived without a sign-in having been started.
    NoPendingSignIn,
    /// The auth service could not be reached.
    Network(String),
    /// The auth service answered with an error.
    Rejected(String),
    /// Reading or writing the local session failed.
    Storage(String),
    /// Sealing or opening the stored session failed.
    Crypto(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotConfigured => write!(f, "Auth backend not configured"),
            AuthError::NoPendingSignIn => write!(f, "No sign-in in progress"),
            AuthError::Network(msg) => write!(f, "Auth network error: {}", msg),
            AuthError::Rejected(msg) => write!(f, "Auth request rejected: {}", msg),
            AuthError::Storage(msg) => write!(f, "Auth session storage error: {}", msg),
            AuthError::Crypto(msg) => write!(f, "Auth session crypto error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<CryptoError> for AuthError {
    fn from(err: CryptoError) -> Self {
        AuthError::Crypto(err.to_string())
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

// === CryptoError ===

/// Errors related to cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption operation failed.
    Encryption(String),
    /// Decryption operation failed.
    Decryption(String),
    /// Failed to generate random bytes.
    RandomGeneration(String),
    /// The provided key is invalid.
    InvalidKey(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::Encryption(msg) => write!(f, "Encryption failed: {}", msg),
            CryptoError::Decryption(msg) => write!(f, "Decryption failed: {}", msg),
            CryptoError::RandomGeneration(msg) => {
                write!(f, "Random generation failed: {}", msg)
            }
            CryptoError::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
