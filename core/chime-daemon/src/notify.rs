//! Desktop notification delivery.
//!
//! Abstracts over:
//! - **macOS**: `osascript` AppleScript `display notification` command
//! - **Windows / Linux**: the `notify_rust` crate
//!
//! Platform differences live only here; the dispatcher talks to the
//! [`Notifier`] trait and never sees a `#[cfg(target_os = ...)]`.

use std::path::Path;

use async_trait::async_trait;
use chime_core::{DispatchError, Notifier};

pub struct OsNotifier;

/// Escape a string for safe embedding inside an AppleScript double-quoted
/// string. Backslashes must be escaped first so the subsequent
/// replacements do not double-escape them.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_for_applescript(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[async_trait]
impl Notifier for OsNotifier {
    #[cfg(target_os = "macos")]
    async fn send(
        &self,
        message: &str,
        _timeout_secs: u32,
        image: Option<&Path>,
        session_title: Option<&str>,
    ) -> Result<(), DispatchError> {
        // macOS controls notification duration and imagery itself.
        let _ = image;
        let title = session_title.filter(|title| !title.is_empty()).unwrap_or("chime");
        let script = format!(
            r#"display notification "{}" with title "{}""#,
            escape_for_applescript(message),
            escape_for_applescript(title),
        );

        let output = tokio::process::Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .await
            .map_err(|err| DispatchError(format!("osascript failed to run: {}", err)))?;

        if !output.status.success() {
            return Err(DispatchError(format!(
                "osascript exited with {}",
                output.status
            )));
        }
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    async fn send(
        &self,
        message: &str,
        timeout_secs: u32,
        image: Option<&Path>,
        session_title: Option<&str>,
    ) -> Result<(), DispatchError> {
        let summary = session_title
            .filter(|title| !title.is_empty())
            .unwrap_or("chime")
            .to_string();
        let body = message.to_string();
        let icon = image.map(|path| path.to_string_lossy().to_string());
        let timeout_ms = timeout_secs.saturating_mul(1000);

        // notify_rust blocks on the session bus; keep it off the runtime.
        tokio::task::spawn_blocking(move || {
            let mut notification = notify_rust::Notification::new();
            notification
                .summary(&summary)
                .body(&body)
                .timeout(notify_rust::Timeout::Milliseconds(timeout_ms));
            if let Some(icon) = icon.as_deref() {
                notification.icon(icon);
            }
            notification
                .show()
                .map(|_| ())
                .map_err(|err| DispatchError(format!("desktop notification failed: {}", err)))
        })
        .await
        .map_err(|err| DispatchError(format!("notification task failed: {}", err)))?
    }
}
