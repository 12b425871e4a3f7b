//! Save state (quick save / quick load) for the SSM-64 emulator.
//!
//! Captures the full emulator state to a file using bincode serialization
//! with deflate compression (F5 save, F9 load in the frontend). This is
//! host-side tooling for resuming an emulation session; the device model
//! itself still powers up with a zeroed stack.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "SSMS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Magic bytes identifying an ssm64-emu save state file.
const MAGIC: &[u8; 4] = b"SSMS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;

// ─── Per-component state structs ────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkState {
    pub bit_count: u8,
    pub shift_in: u8,
    pub command: u8,
    pub argument: u8,
    pub response: u8,
    pub shift_out: u8,
    pub selected: bool,
    pub resync_on_select: bool,
    pub dbg_messages: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StackState {
    pub cells: Vec<u8>,
    pub sp: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DisplayState {
    pub slot: usize,
    pub dwell: u32,
    pub dbg_sweeps: u64,
}

// ─── Top-level save state ───────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveState {
    pub link: LinkState,
    pub stack: StackState,
    pub display: DisplayState,
    pub dbg_edges: u64,
}

// ─── File I/O ───────────────────────────────────────────────────────────────

/// Save state to file with header and deflate compression.
pub fn save_to_file(state: &SaveState, path: &Path) -> Result<(), String> {
    let payload = bincode::serialize(state).map_err(|e| format!("Serialize error: {}", e))?;

    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(8 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);

    std::fs::write(path, &out).map_err(|e| format!("Write error: {}", e))
}

/// Load state from file, verifying magic and version.
pub fn load_from_file(path: &Path) -> Result<SaveState, String> {
    let data = std::fs::read(path).map_err(|e| format!("Read error: {}", e))?;

    if data.len() < 8 {
        return Err("File too small".into());
    }
    if &data[0..4] != MAGIC {
        return Err("Invalid save state file (bad magic)".into());
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(format!(
            "Unsupported save state version {} (expected {})",
            version, FORMAT_VERSION
        ));
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[8..])
        .map_err(|e| format!("Decompress error: {:?}", e))?;

    bincode::deserialize(&decompressed).map_err(|e| format!("Deserialize error: {}", e))
}

/// Derive save state file path from a script path.
/// `demo.ssm` → `demo.state`; no script → `ssm64.state`.
pub fn state_path(script_path: Option<&str>) -> String {
    match script_path {
        Some(p) => {
            let p = Path::new(p);
            let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or("ssm64");
            let dir = p.parent().unwrap_or(Path::new("."));
            dir.join(format!("{}.state", stem)).to_string_lossy().into_owned()
        }
        None => "ssm64.state".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ssm64;

    #[test]
    fn test_file_round_trip() {
        let mut ssm = Ssm64::new();
        ssm.transfer(crate::command::OP_PUSH, 0x42);
        ssm.transfer(crate::command::OP_PEEK, 0x00);

        let path = std::env::temp_dir().join("ssm64_savestate_test.state");
        save_to_file(&ssm.save_state(), &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let mut restored = Ssm64::new();
        restored.load_state(loaded);
        assert_eq!(restored.response(), 0x42);
        assert_eq!(restored.stack.sp, ssm.stack.sp);
        assert_eq!(restored.stack.cells, ssm.stack.cells);
        assert_eq!(restored.link.bit_count, ssm.link.bit_count);
        // The restored session keeps working.
        assert_eq!(restored.transfer(crate::command::OP_POP, 0x00), 0x42);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let path = std::env::temp_dir().join("ssm64_savestate_bad_magic.state");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00junk").unwrap();
        let err = load_from_file(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(err.contains("bad magic"), "{}", err);
    }

    #[test]
    fn test_bad_version_rejected() {
        let path = std::env::temp_dir().join("ssm64_savestate_bad_version.state");
        let mut data = Vec::new();
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&9u32.to_le_bytes());
        std::fs::write(&path, &data).unwrap();
        let err = load_from_file(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(err.contains("version"), "{}", err);
    }

    #[test]
    fn test_state_path() {
        assert_eq!(state_path(Some("demos/demo.ssm")), "demos/demo.state");
        assert_eq!(state_path(None), "ssm64.state");
    }
}
