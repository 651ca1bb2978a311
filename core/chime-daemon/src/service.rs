//! Socket service: accepts newline-delimited JSON requests and feeds
//! lifecycle events through the arbiter.
//!
//! Connections are handled in spawned tasks, so handler invocations are
//! deliberately NOT serialized: a new event can arrive while a previous
//! one is suspended mid grace delay or awaiting a title lookup. The
//! arbiter depends on that overlap for its cancellation pairing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs_err as fs;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

use chime_core::{Arbiter, Dispatcher, NotifyConfig, SessionLookup, TitleResolver};
use chime_protocol::{
    parse_event, ErrorInfo, EventEnvelope, Method, Request, Response, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};

use crate::lookup::HttpSessionLookup;
use crate::notify::OsNotifier;
use crate::sound::RodioPlayer;

const SOCKET_NAME: &str = "daemon.sock";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to prepare socket directory: {source}")]
    SocketDir {
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove existing socket {path}: {source}")]
    SocketCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind daemon socket {path}: {source}")]
    SocketBind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] chime_core::ChimeError),
}

/// Arbiter plus dispatcher, shared by all in-flight connections.
pub struct App {
    arbiter: Arbiter,
    dispatcher: Dispatcher,
}

impl App {
    pub fn new(arbiter: Arbiter, dispatcher: Dispatcher) -> Self {
        Self {
            arbiter,
            dispatcher,
        }
    }

    /// Arbitrate one event and, when a decision comes back, fan it out.
    /// Returns whether a notification was emitted.
    pub async fn handle_event(&self, envelope: EventEnvelope) -> bool {
        match self.arbiter.handle(&envelope).await {
            Some(decision) => {
                info!(
                    classification = decision.classification.as_str(),
                    session_title = %decision.session_title,
                    "Emitting notification"
                );
                self.dispatcher.dispatch(&decision).await;
                true
            }
            None => false,
        }
    }
}

pub async fn run(
    socket_override: Option<PathBuf>,
    config_override: Option<PathBuf>,
) -> Result<(), ServiceError> {
    let config = NotifyConfig::load(config_override.as_deref())?;

    let socket_path = match socket_override {
        Some(path) => path,
        None => default_socket_path()?,
    };
    prepare_socket_dir(&socket_path)?;
    remove_existing_socket(&socket_path)?;

    let listener =
        UnixListener::bind(&socket_path).map_err(|source| ServiceError::SocketBind {
            path: socket_path.clone(),
            source,
        })?;
    info!(path = %socket_path.display(), "chime daemon started");

    let lookup = config
        .global
        .host_url
        .clone()
        .map(|url| Arc::new(HttpSessionLookup::new(url)) as Arc<dyn SessionLookup>);
    if lookup.is_none() {
        info!("No host_url configured; session titles fall back to the default");
    }

    let app = Arc::new(App::new(
        Arbiter::new(TitleResolver::new(lookup)),
        Dispatcher::new(config, Arc::new(OsNotifier), Arc::new(RodioPlayer)),
    ));

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let app = Arc::clone(&app);
                tokio::spawn(async move {
                    handle_connection(stream, app).await;
                });
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, app: Arc<App>) {
    let request = match read_request(&mut stream).await {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let _ = write_response(&mut stream, Response::error_with_info(None, err)).await;
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &app).await;
    let _ = write_response(&mut stream, response).await;
}

pub async fn handle_request(request: Request, app: &App) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => Response::ok(
            request.id,
            serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
            }),
        ),
        Method::Event => {
            let params = match request.params {
                Some(params) => params,
                None => {
                    return Response::error(request.id, "invalid_params", "event payload is required")
                }
            };
            let envelope = match parse_event(params) {
                Ok(envelope) => envelope,
                Err(err) => return Response::error_with_info(request.id, err),
            };

            info!(
                event_type = ?envelope.event_type,
                session_id = ?envelope.properties.session_id,
                "Received event"
            );

            let notified = app.handle_event(envelope).await;
            Response::ok(
                request.id,
                serde_json::json!({ "accepted": true, "notified": notified }),
            )
        }
    }
}

async fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let mut reader = BufReader::new(&mut *stream).take((MAX_REQUEST_BYTES + 1) as u64);
    let mut buffer = Vec::new();

    match reader.read_until(b'\n', &mut buffer).await {
        Ok(0) => return Err(ErrorInfo::new("empty_request", "request body was empty")),
        Ok(_) => {}
        Err(err) => {
            return Err(ErrorInfo::new(
                "read_error",
                format!("failed to read request: {}", err),
            ));
        }
    }

    if buffer.len() > MAX_REQUEST_BYTES {
        return Err(ErrorInfo::new(
            "request_too_large",
            "request exceeded maximum size",
        ));
    }
    if buffer.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(&buffer).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

async fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    let mut payload = serde_json::to_vec(&response)?;
    payload.push(b'\n');
    stream.write_all(&payload).await?;
    stream.flush().await
}

fn default_socket_path() -> Result<PathBuf, ServiceError> {
    let home = dirs::home_dir().ok_or(ServiceError::HomeDirNotFound)?;
    Ok(home.join(".chime").join(SOCKET_NAME))
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), ServiceError> {
    let Some(parent) = socket_path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|source| ServiceError::SocketDir { source })
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), ServiceError> {
    if socket_path.exists() {
        fs::remove_file(socket_path).map_err(|source| ServiceError::SocketCleanup {
            path: socket_path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chime_core::{Classification, DispatchError, Notifier, SoundPlayer};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            message: &str,
            _timeout_secs: u32,
            _image: Option<&Path>,
            _session_title: Option<&str>,
        ) -> Result<(), DispatchError> {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(message.to_string());
            }
            Ok(())
        }
    }

    struct SilentSound;

    #[async_trait]
    impl SoundPlayer for SilentSound {
        async fn play(
            &self,
            _classification: Classification,
            _sound_file: Option<&Path>,
            _volume: u8,
        ) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    fn test_app() -> (App, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let app = App::new(
            Arbiter::new(TitleResolver::new(None)),
            Dispatcher::new(
                NotifyConfig::default(),
                notifier.clone(),
                Arc::new(SilentSound),
            ),
        );
        (app, notifier)
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> Request {
        serde_json::from_value(json!({
            "protocol_version": PROTOCOL_VERSION,
            "method": method,
            "id": "req-1",
            "params": params,
        }))
        .expect("valid request")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _notifier) = test_app();
        let response = handle_request(request("get_health", None), &app).await;
        assert!(response.ok);
        let data = response.data.expect("health data");
        assert_eq!(data["status"], "ok");
        assert_eq!(data["protocol_version"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn protocol_mismatch_is_rejected() {
        let (app, _notifier) = test_app();
        let request: Request = serde_json::from_value(json!({
            "protocol_version": 99,
            "method": "get_health",
        }))
        .expect("valid request");

        let response = handle_request(request, &app).await;
        assert!(!response.ok);
        assert_eq!(
            response.error.map(|error| error.code),
            Some("protocol_mismatch".to_string())
        );
    }

    #[tokio::test]
    async fn permission_event_notifies() {
        let (app, notifier) = test_app();
        let response = handle_request(
            request(
                "event",
                Some(json!({
                    "type": "permission_asked",
                    "properties": { "sessionId": "session-1" }
                })),
            ),
            &app,
        )
        .await;

        assert!(response.ok);
        let data = response.data.expect("event data");
        assert_eq!(data["accepted"], true);
        assert_eq!(data["notified"], true);

        let messages = notifier.messages.lock().expect("messages");
        assert_eq!(
            messages.as_slice(),
            ["Agent session is asking for permission"]
        );
    }

    #[tokio::test]
    async fn busy_event_is_accepted_without_notification() {
        let (app, notifier) = test_app();
        let response = handle_request(
            request(
                "event",
                Some(json!({
                    "type": "session_status",
                    "properties": { "status": { "type": "busy" } }
                })),
            ),
            &app,
        )
        .await;

        assert!(response.ok);
        let data = response.data.expect("event data");
        assert_eq!(data["notified"], false);
        assert!(notifier.messages.lock().expect("messages").is_empty());
    }

    #[tokio::test]
    async fn event_without_params_is_an_error() {
        let (app, _notifier) = test_app();
        let response = handle_request(request("event", None), &app).await;
        assert!(!response.ok);
        assert_eq!(
            response.error.map(|error| error.code),
            Some("invalid_params".to_string())
        );
    }
}
