use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use thumb_rs::Executable;

/// Whether `path` holds a linked image rather than assembly text.
pub fn is_image(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Reads a JSON image, or assembles a source file on the fly.
pub fn load_executable(path: &Path) -> Result<Executable> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if is_image(path) {
        debug!(path = %path.display(), "reading image");
        return serde_json::from_str(&text)
            .with_context(|| format!("parsing image {}", path.display()));
    }
    thumb_rs::assemble(&text).with_context(|| format!("assembling {}", path.display()))
}

pub fn write_executable(path: &Path, exe: &Executable) -> Result<()> {
    let json = serde_json::to_string_pretty(exe)?;
    debug!(path = %path.display(), bytes = exe.content.len(), "writing image");
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

pub fn read_u16(exe: &Executable, addr: u32) -> Option<u16> {
    let bytes = exe.bytes_at(addr, 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn image_round_trips_through_json() {
        let exe = thumb_rs::assemble("  MOVS R1, #1\n").unwrap();
        let path = std::env::temp_dir().join("_thumb_asm_model_test.json");
        write_executable(&path, &exe).unwrap();
        let back = load_executable(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(back, exe);
        assert_eq!(read_u16(&back, 0x0800_0008), Some(0x2101));
    }
}
