//! Live reload: a broadcast hub, the Server-Sent-Events endpoint, and the
//! browser client that listens to it.
//!
//! Every notification is one SSE event named `reload` whose data is
//! `{"paths": [...], "css_only": bool}`. When only stylesheets changed the
//! client swaps `<link rel="stylesheet">` URLs in place; anything else
//! reloads the page.

use super::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

pub const EVENTS_PATH: &str = "/__sitepipe/events";
pub const CLIENT_PATH: &str = "/__sitepipe/reload.js";

/// Notifications buffered per client before a slow one starts skipping.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    pub paths: Vec<String>,
    pub css_only: bool,
}

impl ReloadEvent {
    pub fn new(paths: Vec<String>) -> Self {
        let css_only = !paths.is_empty() && paths.iter().all(|p| p.ends_with(".css"));
        Self { paths, css_only }
    }
}

/// Fan-out point between whoever regenerates files and connected browsers.
///
/// Sending never blocks: a client that falls more than [`CHANNEL_CAPACITY`]
/// events behind skips the backlog.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadEvent>,
    announce: bool,
}

impl ReloadHub {
    /// With `announce`, each notification is logged at info level instead of debug.
    pub fn new(announce: bool) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx, announce }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, paths: Vec<String>) {
        let event = ReloadEvent::new(paths);
        if self.announce {
            info!(paths = ?event.paths, css_only = event.css_only, "reloading browsers");
        } else {
            debug!(paths = ?event.paths, css_only = event.css_only, "reloading browsers");
        }
        // No subscribers is the normal state outside `serve`.
        let _ = self.tx.send(event);
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new(false)
    }
}

/// GET /__sitepipe/events
pub(crate) async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.hub.subscribe();
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default().event("reload").json_data(&event);
                    return Some((sse, rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "reload client lagging");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /__sitepipe/reload.js
pub(crate) async fn client() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        CLIENT_JS,
    )
}

const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource("/__sitepipe/events");
  source.addEventListener("reload", function (message) {
    var data = JSON.parse(message.data);
    if (!data.css_only) {
      window.location.reload();
      return;
    }
    var stamp = String(Date.now());
    document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
      var url = new URL(link.href, window.location.href);
      url.searchParams.set("sitepipe", stamp);
      link.href = url.toString();
    });
  });
})();
"#;
