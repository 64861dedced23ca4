// bookmark-sync services
// Services provide the backends: bookmark store, identity provider, crypto, observers, settings.

pub mod bookmark_store;
pub mod crypto_service;
pub mod hosted_auth;
pub mod identity;
pub mod observer;
pub mod settings_engine;
