//! Clipboard writes through the platform utility

use std::io::Write;
use std::process::{Command, Stdio};

use beatvox_core::export::{Clipboard, ExportError};

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), ExportError> {
        let (program, args) = clipboard_command();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ExportError::ClipboardWrite(format!("{program} unavailable: {e}")))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| ExportError::ClipboardWrite(e.to_string()))?;
        }
        drop(child.stdin.take());

        let status = child
            .wait()
            .map_err(|e| ExportError::ClipboardWrite(e.to_string()))?;
        if !status.success() {
            return Err(ExportError::ClipboardWrite(format!(
                "{program} exited with {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn clipboard_command() -> (&'static str, Vec<&'static str>) {
    ("pbcopy", Vec::new())
}

#[cfg(target_os = "windows")]
fn clipboard_command() -> (&'static str, Vec<&'static str>) {
    ("clip", Vec::new())
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn clipboard_command() -> (&'static str, Vec<&'static str>) {
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        ("wl-copy", Vec::new())
    } else {
        ("xclip", vec!["-selection", "clipboard"])
    }
}
