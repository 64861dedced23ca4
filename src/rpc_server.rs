//! bookmark-sync RPC server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"title":"...","url":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Event:    {"event":"bookmarks.changed", "subscription":"...", "items":[...]}

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use bookmark_sync::app::App;
use bookmark_sync::rpc_handler::handle_method;
use bookmark_sync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use bookmark_sync::telemetry;

/// Simple rate limiter: max requests per one-second window.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = SettingsEngine::new(std::env::var("BOOKMARKS_CONFIG").ok());
    engine.load()?;
    if !Path::new(engine.get_config_path()).exists() {
        // Leave a file behind for the user to fill in.
        if let Err(e) = engine.save() {
            eprintln!("could not write default settings: {}", e);
        }
    }
    let settings = engine.effective();
    telemetry::init(&settings.logging);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();

    let mut app = App::new(settings)?;
    app.set_notifier(out_tx.clone());
    let app = Arc::new(Mutex::new(app));

    // Single writer: responses and pushed events share stdout.
    let writer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(message) = out_rx.recv().await {
            let mut line = message.to_string();
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let app = Arc::clone(&app);
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
            let params = req.get("params").cloned().unwrap_or(json!({}));

            let response = match handle_method(&app, method, &params).await {
                Ok(val) => json!({"id": id, "result": val}),
                Err(err) => json!({"id": id, "error": err}),
            };
            let _ = out_tx.send(response);
        });
    }

    app.lock().await.shutdown();
    drop(app);
    drop(out_tx);
    // Aborted subscription workers release their notifier clones asynchronously.
    let _ = tokio::time::timeout(Duration::from_secs(2), writer).await;
    Ok(())
}
