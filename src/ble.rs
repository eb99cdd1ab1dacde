//! Command/Status Surface dispatch and GATT characteristic value
//! formatters for both wireless services the badge exposes.

use std::path::Path;
use std::sync::Arc;

use capsule_audio::{find_latest, resolve_name, select_by_index};
use capsule_core::state::StatusCode;
use capsule_egress::{
    parse_command, Command as EgressCommand, ParsedCommand, StatusSink, Transport,
};
use tracing::warn;

use crate::session::SessionController;

/// Bridges the egress worker's typed [`StatusSink`] to a [`Transport`]'s
/// async STATUS notification, since the worker's sink is synchronous but
/// the transport isn't.
pub struct TransportStatusSink(pub Arc<dyn Transport>);

impl StatusSink for TransportStatusSink {
    fn emit(&self, code: StatusCode) {
        let transport = self.0.clone();
        tokio::spawn(async move {
            let _ = transport.notify_status(code.to_byte()).await;
        });
    }
}

/// Decodes and acts on one write to the File Egress Control characteristic.
pub async fn dispatch(bytes: &[u8], session: &mut SessionController, status: &dyn StatusSink) {
    let command = match parse_command(bytes) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "rejected malformed command");
            status.emit(StatusCode::BadCommand);
            return;
        }
    };

    match command {
        ParsedCommand::Start => {
            if let Some(code) = session.handle_peer_start().await {
                status.emit(code);
            }
        }
        ParsedCommand::Stop => {
            if let Some(code) = session.handle_peer_stop().await {
                status.emit(code);
            }
        }
        ParsedCommand::Pause => session.forward_egress_command(EgressCommand::Pause).await,
        ParsedCommand::Resume => session.forward_egress_command(EgressCommand::Resume).await,
        ParsedCommand::ListFiles => status.emit(StatusCode::ListReady),
        ParsedCommand::SelectFile(index) => {
            match select_by_index(session.recordings_dir(), index as usize) {
                Ok(path) => {
                    session.set_selected_file(path);
                    status.emit(StatusCode::FileSelected);
                    if let Some(code) = session.handle_peer_start().await {
                        status.emit(code);
                    }
                }
                Err(_) => status.emit(StatusCode::InvalidIndex),
            }
        }
        ParsedCommand::StartNamed(name) => {
            match resolve_name(session.recordings_dir(), &name) {
                Ok(path) => {
                    session.set_selected_file(path);
                    if let Some(code) = session.handle_peer_start().await {
                        status.emit(code);
                    }
                }
                Err(_) => status.emit(StatusCode::BadCommand),
            }
        }
    }
}

/// Audio Control Service Status characteristic: a 7-byte packed record.
pub fn audio_status_record(
    audio_enabled: bool,
    sd_available: bool,
    recording: bool,
    total_recordings: u32,
) -> [u8; 7] {
    let mut out = [0u8; 7];
    out[0] = u8::from(audio_enabled);
    out[1] = u8::from(sd_available);
    out[2] = u8::from(recording);
    out[3..7].copy_from_slice(&total_recordings.to_le_bytes());
    out
}

/// File Count characteristic: 4-byte little-endian count of `.raw` files.
pub fn file_count_value(count: u32) -> [u8; 4] {
    count.to_le_bytes()
}

/// Record Control characteristic read value: a single recording flag byte.
/// Writes to this characteristic are rejected at the policy layer — it is
/// read-only by design, to prevent accidental remote capture.
pub fn record_control_value(recording: bool) -> [u8; 1] {
    [u8::from(recording)]
}

/// File List characteristic: a legacy/stub read kept for compatibility with
/// older peer firmware. Superseded by the Auto-Select List characteristic;
/// always returns an empty value.
pub fn file_list_stub() -> [u8; 0] {
    []
}

/// Auto-Select List characteristic: a one-line ASCII summary of the newest
/// recording, or a fixed "no files" line.
pub fn auto_select_list(recordings_dir: &Path) -> String {
    let count = capsule_audio::file_count(recordings_dir);
    match find_latest(recordings_dir) {
        Ok(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            format!("LATEST:{name}:{size}:{count}\n")
        }
        Err(_) => "No .raw files found\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_status_record_packs_fields_little_endian() {
        let record = audio_status_record(true, true, false, 300);
        assert_eq!(record[0], 1);
        assert_eq!(record[1], 1);
        assert_eq!(record[2], 0);
        assert_eq!(u32::from_le_bytes(record[3..7].try_into().unwrap()), 300);
    }

    #[test]
    fn auto_select_list_reports_no_files_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(auto_select_list(dir.path()), "No .raw files found\n");
    }

    #[test]
    fn auto_select_list_formats_latest_file_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("r001.raw"), vec![0u8; 42]).unwrap();
        let line = auto_select_list(dir.path());
        assert_eq!(line, "LATEST:r001.raw:42:1\n");
    }
}
