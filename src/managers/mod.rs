// bookmark-sync managers
// Managers hold the user-facing operations: resolving the signed-in principal and syncing bookmarks.

pub mod bookmark_sync;
pub mod session_accessor;
