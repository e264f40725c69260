//! WebSocket notification waiting.
//!
//! Asynchronous server-side work (study creation, computations, exports) is
//! signalled on per-concern notification channels. The pattern is always the
//! same: subscribe first, then fire the initiating HTTP request, then block
//! until the expected number of matching messages has arrived or the timeout
//! elapses. Messages are JSON with a `headers` object carrying the matching
//! keys (`updateType`, `elementName`, `directoryUuid`, `studyUuid`, `node`).

use std::future::Future;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use url::Url;

use crate::env::{EnvProperties, MicroService};
use crate::error::{BddError, Result};

/// Directory channel, carrying element creation/update events.
pub fn directory_notification_url(env: &EnvProperties) -> Result<Url> {
    let mut url = Url::parse(&env.notification_url(MicroService::DirectoryNotification))?;
    url.query_pairs_mut()
        .append_pair("updateType", "directories")
        .append_pair("userId", env.user_name())
        .append_pair("access_token", env.bearer().unwrap_or(""))
        .finish();
    Ok(url)
}

/// Study channel, scoped to one study.
pub fn study_notification_url(env: &EnvProperties, study_uuid: &str) -> Result<Url> {
    let mut url = Url::parse(&env.notification_url(MicroService::StudyNotification))?;
    url.query_pairs_mut()
        .append_pair("studyUuid", study_uuid)
        .append_pair("userId", env.user_name())
        .append_pair("access_token", env.bearer().unwrap_or(""))
        .finish();
    Ok(url)
}

fn header<'a>(message: &'a Value, key: &str) -> &'a str {
    message
        .get("headers")
        .and_then(|headers| headers.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub fn matches_study_creation(message: &Value, study_name: &str, directory_uuid: &str) -> bool {
    message.get("headers").is_some()
        && header(message, "elementName") == study_name
        && header(message, "directoryUuid") == directory_uuid
}

pub fn matches_loadflow_result(message: &Value, study_uuid: &str, node_uuid: &str) -> bool {
    header(message, "updateType") == "loadflowResult"
        && header(message, "studyUuid") == study_uuid
        && header(message, "node") == node_uuid
}

pub fn matches_export_finished(message: &Value) -> bool {
    header(message, "updateType") == "networkExportFinished"
}

/// Subscribes to `channel`, runs `request`, then waits until
/// `expected_count` messages matching `matcher` have arrived. Returns the
/// request's response, or [`BddError::Timeout`] when the wait elapses.
pub async fn execute_and_wait<T, F, Fut, M>(
    env: &EnvProperties,
    channel: Url,
    matcher: M,
    expected_count: usize,
    timeout: Duration,
    request: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    M: Fn(&Value) -> bool + Send + 'static,
{
    info!("subscribing to '{channel}' (max: {} sec)", timeout.as_secs());
    let mut ws_request = channel.as_str().into_client_request()?;
    let user_header = HeaderValue::from_str(env.user_name())
        .map_err(|e| BddError::Config(format!("invalid userId header: {e}")))?;
    ws_request
        .headers_mut()
        .insert(HeaderName::from_static("userid"), user_header);

    let (socket, _) = connect_async(ws_request).await?;
    let (done_tx, done_rx) = oneshot::channel();

    let listener = tokio::spawn(async move {
        let (_, mut incoming) = socket.split();
        let mut received = 0usize;
        while let Some(message) = incoming.next().await {
            let Ok(Message::Text(text)) = message else {
                continue;
            };
            let Ok(json) = serde_json::from_str::<Value>(&text) else {
                debug!("ignoring non-json notification: {text}");
                continue;
            };
            if matcher(&json) {
                received += 1;
                if received >= expected_count {
                    let _ = done_tx.send(());
                    break;
                }
            }
        }
    });

    // the subscription is live; fire the initiating request
    let response = match request().await {
        Ok(response) => response,
        Err(error) => {
            listener.abort();
            return Err(error);
        }
    };

    match tokio::time::timeout(timeout, done_rx).await {
        Ok(Ok(())) => Ok(response),
        _ => {
            listener.abort();
            Err(BddError::Timeout {
                what: "notification".into(),
                seconds: timeout.as_secs(),
            })
        }
    }
}
