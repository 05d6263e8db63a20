//! Finished-text delivery
//!
//! Puts the transcript where the user can use it: onto the Wayland
//! clipboard via wl-copy, optionally followed by a simulated Ctrl+V
//! via ydotool. Paste avoids typing the text key by key, which breaks
//! on non-US layouts.
//!
//! Delivery is best effort. The transcript is already persisted by the
//! time this runs, so a failure here loses nothing.

use crate::config::InsertDestination;
use crate::error::DeliverError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Deliver text to the configured destination
pub async fn deliver(text: &str, destination: InsertDestination) -> Result<(), DeliverError> {
    if text.is_empty() {
        return Ok(());
    }

    copy_to_clipboard(text).await?;

    if destination == InsertDestination::Paste {
        simulate_ctrl_v().await?;
    }

    Ok(())
}

/// Copy text to the clipboard using wl-copy
async fn copy_to_clipboard(text: &str) -> Result<(), DeliverError> {
    let mut child = Command::new("wl-copy")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeliverError::WlCopyNotFound
            } else {
                DeliverError::Failed(e.to_string())
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| DeliverError::Failed(e.to_string()))?;
        // Close stdin to signal EOF
        drop(stdin);
    }

    let status = child
        .wait()
        .await
        .map_err(|e| DeliverError::Failed(e.to_string()))?;

    if !status.success() {
        return Err(DeliverError::Failed("wl-copy exited with error".to_string()));
    }

    Ok(())
}

/// Simulate Ctrl+V using ydotool
///
/// 29 = KEY_LEFTCTRL, 47 = KEY_V; each code:1 presses, code:0 releases.
async fn simulate_ctrl_v() -> Result<(), DeliverError> {
    let output = Command::new("ydotool")
        .args(["key", "29:1", "47:1", "47:0", "29:0"])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeliverError::YdotoolNotFound
            } else {
                DeliverError::Failed(e.to_string())
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("socket") || stderr.contains("connect") || stderr.contains("daemon") {
            return Err(DeliverError::YdotoolNotRunning);
        }
        return Err(DeliverError::Failed(format!(
            "ydotool exited with error: {}",
            stderr.trim()
        )));
    }

    Ok(())
}
