use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Options controlling how edits are written back into the image.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PatchOptions {
    /// Byte value marking unused space, used both to find free space and to
    /// pad recompressed level data that shrank.
    pub filler_byte: u8,
    /// Filler bytes left untouched after the last used byte of the relocation bank.
    pub free_space_guard: usize,
    /// Bytes at the very end of the relocation bank that are never allocated.
    pub reserved_tail: usize,
}

impl Default for PatchOptions {
    fn default() -> Self {
        PatchOptions {
            filler_byte: 0xFF,
            free_space_guard: 1,
            reserved_tail: 0,
        }
    }
}

pub fn parse_patch_options(options_json: &str) -> Result<PatchOptions> {
    let mut des = serde_json::Deserializer::from_str(options_json);
    let options: PatchOptions = serde_path_to_error::deserialize(&mut des)?;
    ensure!(
        options.reserved_tail < 0x8000,
        "reserved_tail must be smaller than a bank"
    );
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_options_use_defaults() {
        let options = parse_patch_options(r#"{"reserved_tail": 16}"#).unwrap();
        assert_eq!(options.filler_byte, 0xFF);
        assert_eq!(options.free_space_guard, 1);
        assert_eq!(options.reserved_tail, 16);
        assert_eq!(parse_patch_options("{}").unwrap(), PatchOptions::default());
    }

    #[test]
    fn invalid_options() {
        let err = parse_patch_options(r#"{"filler_byte": 300}"#).unwrap_err();
        assert!(err.to_string().contains("filler_byte"));
        assert!(parse_patch_options(r#"{"reserved_tail": 40000}"#).is_err());
    }
}
