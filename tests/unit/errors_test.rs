use bookmark_sync::types::errors::*;

// === ValidationError Tests ===

#[test]
fn validation_error_empty_title_display() {
    assert_eq!(ValidationError::EmptyTitle.to_string(), "Title must not be empty");
}

#[test]
fn validation_error_invalid_url_display() {
    let err = ValidationError::InvalidUrl("nope".to_string());
    assert_eq!(err.to_string(), "Invalid URL: nope");
}

#[test]
fn validation_error_invalid_id_display() {
    let err = ValidationError::InvalidId("".to_string());
    assert_eq!(err.to_string(), "Invalid bookmark id: \"\"");
}

// === BookmarkError Tests ===

#[test]
fn authentication_required_message_is_user_facing() {
    assert_eq!(
        BookmarkError::AuthenticationRequired.to_string(),
        "User not authenticated"
    );
}

#[test]
fn bookmark_error_wraps_validation_with_source() {
    let err: BookmarkError = ValidationError::EmptyTitle.into();
    assert_eq!(err, BookmarkError::Validation(ValidationError::EmptyTitle));
    assert_eq!(err.to_string(), "Validation failed: Title must not be empty");

    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_some());
}

#[test]
fn bookmark_error_passes_store_message_through() {
    let err: BookmarkError = StoreError::Unavailable("timeout".to_string()).into();
    assert_eq!(err.to_string(), "Store unavailable: timeout");
}

#[test]
fn authentication_required_has_no_source() {
    let err: Box<dyn std::error::Error> = Box::new(BookmarkError::AuthenticationRequired);
    assert!(err.source().is_none());
}

// === StoreError Tests ===

#[test]
fn store_error_from_rusqlite() {
    let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, StoreError::Database(_)));
    assert!(err.to_string().starts_with("Store database error: "));
}

// === AuthError Tests ===

#[test]
fn auth_error_displays() {
    assert_eq!(AuthError::NotConfigured.to_string(), "Auth backend not configured");
    assert_eq!(AuthError::NoPendingSignIn.to_string(), "No sign-in in progress");
    assert_eq!(
        AuthError::Rejected("400 Bad Request".to_string()).to_string(),
        "Auth request rejected: 400 Bad Request"
    );
}

#[test]
fn auth_error_from_crypto_error() {
    let err: AuthError = CryptoError::Decryption("tag mismatch".to_string()).into();
    assert_eq!(
        err,
        AuthError::Crypto("Decryption failed: tag mismatch".to_string())
    );
}

// === SettingsError Tests ===

#[test]
fn settings_error_displays() {
    assert_eq!(
        SettingsError::IoError("denied".to_string()).to_string(),
        "Settings I/O error: denied"
    );
    assert_eq!(
        SettingsError::SerializationError("eof".to_string()).to_string(),
        "Settings serialization error: eof"
    );
}
