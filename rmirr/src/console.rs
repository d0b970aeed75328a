//! Operator-facing console lines
//!
//! Warnings and errors are shown to the operator and also go to the log.
//! Console write failures are ignored: a closed stdout must not stop a mirror.

use std::io::Write;

pub fn line(out: &mut dyn Write, message: &str) {
    let _ = writeln!(out, "{message}");
}

pub fn warn(out: &mut dyn Write, message: &str) {
    log::warn!("{message}");
    let _ = writeln!(out, "warning: {message}");
}

pub fn error(out: &mut dyn Write, message: &str) {
    log::error!("{message}");
    let _ = writeln!(out, "error: {message}");
}
