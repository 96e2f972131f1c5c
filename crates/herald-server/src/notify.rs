//! Best-effort desktop notifications.
//!
//! The shell-out runs concurrently with queued voice work and never blocks
//! the request path; failures are logged and swallowed.

use std::process::Stdio;
use tokio::process::Command;

/// Fires the platform notification tool and forgets about it.
pub fn send_desktop(title: String, message: String) {
    tokio::spawn(async move {
        if let Err(e) = dispatch(&title, &message).await {
            tracing::debug!(error = %e, "desktop notification failed");
        }
    });
}

#[cfg(target_os = "macos")]
async fn dispatch(title: &str, message: &str) -> std::io::Result<()> {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(message),
        escape_applescript(title)
    );
    Command::new("osascript")
        .arg("-e")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|_| ())
}

#[cfg(not(target_os = "macos"))]
async fn dispatch(title: &str, message: &str) -> std::io::Result<()> {
    Command::new("notify-send")
        .arg(title)
        .arg(message)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|_| ())
}

#[cfg(target_os = "macos")]
fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
