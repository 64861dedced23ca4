//! RPC method handler for the JSON-RPC presentation surface.
//!
//! Extracted from `rpc_server.rs` so it can be tested independently. The
//! lock on [`App`] is only held to read components or bookkeeping; store and
//! auth round-trips run without it, so requests are not serialized.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::app::App;
use crate::managers::bookmark_sync::{BookmarkSyncTrait, ChangeCallback};
use crate::types::bookmark::Bookmark;

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

/// Pulls the authorization code out of a redirect URL, surfacing provider errors.
pub fn code_from_callback(callback: &str) -> Result<String, String> {
    let url = Url::parse(callback).map_err(|e| format!("invalid callback url: {}", e))?;
    let mut code = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error_description" => error = Some(value.into_owned()),
            "error" if error.is_none() => error = Some(value.into_owned()),
            _ => {}
        }
    }
    match (code, error) {
        (_, Some(error)) => Err(format!("sign-in failed: {}", error)),
        (Some(code), None) => Ok(code),
        (None, None) => Err("callback url carries no code".to_string()),
    }
}

fn items(bookmarks: &[Bookmark]) -> Result<Value, String> {
    serde_json::to_value(bookmarks).map_err(|e| e.to_string())
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Auth ───
        "auth.session" => {
            let sessions = app.lock().await.sessions.clone();
            match sessions.current_session().await {
                Some(session) => Ok(json!({
                    "signed_in": true,
                    "user": session.user,
                    "expires_at": session.expires_at,
                })),
                None => Ok(json!({"signed_in": false})),
            }
        }
        "auth.signIn" => {
            let identity = app.lock().await.identity();
            let redirect = identity
                .sign_in_with_google()
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"url": redirect.url}))
        }
        "auth.callback" => {
            let code = match (params.get("code").and_then(|v| v.as_str()), params.get("url").and_then(|v| v.as_str())) {
                (Some(code), _) => code.to_string(),
                (None, Some(url)) => code_from_callback(url)?,
                (None, None) => return Err("missing code".to_string()),
            };
            let identity = app.lock().await.identity();
            let session = identity
                .complete_sign_in(&code)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({"signed_in": true, "user": session.user}))
        }
        "auth.signOut" => {
            let identity = app.lock().await.identity();
            let signed_out = identity.sign_out().await;
            // After the session is gone, so a racing subscribe either sees the
            // sign-out or is tracked in time to be cancelled here.
            app.lock().await.cancel_all_subscriptions();
            signed_out.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Bookmarks ───
        "bookmark.add" => {
            let title = str_param(params, "title")?;
            let url = str_param(params, "url")?;
            let bookmarks = app.lock().await.bookmarks.clone();
            let created = bookmarks.add(title, url).await.map_err(|e| e.to_string())?;
            serde_json::to_value(created).map_err(|e| e.to_string())
        }
        "bookmark.list" => {
            let bookmarks = app.lock().await.bookmarks.clone();
            let list = bookmarks.list().await.map_err(|e| e.to_string())?;
            Ok(json!({"items": items(&list)?}))
        }
        "bookmark.delete" => {
            let id = str_param(params, "id")?;
            let bookmarks = app.lock().await.bookmarks.clone();
            bookmarks.delete(id).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmark.subscribe" => {
            let (bookmarks, notifier) = {
                let a = app.lock().await;
                (a.bookmarks.clone(), a.notifier())
            };
            let id = App::new_subscription_id();

            let event_id = id.clone();
            let on_change: ChangeCallback = Arc::new(move |list: Vec<Bookmark>| {
                let Some(notifier) = &notifier else { return };
                let event = match serde_json::to_value(&list) {
                    Ok(items) => json!({
                        "event": "bookmarks.changed",
                        "subscription": event_id,
                        "items": items,
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "could not encode bookmarks.changed");
                        return;
                    }
                };
                // The receiver is gone only when the server is shutting down.
                let _ = notifier.send(event);
            });

            let subscription = bookmarks.subscribe(on_change).await;
            if !subscription.is_active() {
                return Ok(json!({"subscription": null, "active": false}));
            }
            let channel = subscription.channel().map(str::to_string);

            let mut a = app.lock().await;
            // A sign-out may have finished while the subscription was opening.
            let still_owner = a
                .sessions
                .current_principal()
                .await
                .map(|principal| Some(format!("bookmarks-{}", principal.id)) == channel)
                .unwrap_or(false);
            if !still_owner {
                subscription.cancel();
                return Ok(json!({"subscription": null, "active": false}));
            }
            a.track_subscription(&id, subscription);
            Ok(json!({"subscription": id, "channel": channel, "active": true}))
        }
        "bookmark.unsubscribe" => {
            let id = str_param(params, "subscription")?;
            let removed = app.lock().await.cancel_subscription(id);
            Ok(json!({"ok": removed}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
