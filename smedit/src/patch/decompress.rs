use super::Rom;
use anyhow::{bail, Result};

// Upper bound on decompressed output; no legitimate stream in the game comes close.
pub const MAX_OUTPUT_SIZE: usize = 0x20000;

pub struct Decompressed {
    pub data: Vec<u8>,
    // Number of source bytes consumed, including the terminator when present.
    pub compressed_size: usize,
    // False if decoding stopped on a malformed block, the end of the source, or the output cap.
    pub complete: bool,
}

enum BlockResult {
    Continue,
    End,
    Malformed,
}

// Decodes a stream starting at `start`, keeping whatever output was produced
// before any error.
pub fn decompress_stream(src: &[u8], start: usize) -> Decompressed {
    let mut out: Vec<u8> = Vec::new();
    let mut addr = start;
    let complete = loop {
        match decode_block(src, &mut addr, &mut out) {
            BlockResult::Continue => {
                if out.len() > MAX_OUTPUT_SIZE {
                    out.truncate(MAX_OUTPUT_SIZE);
                    break false;
                }
            }
            BlockResult::End => break true,
            BlockResult::Malformed => break false,
        }
    };
    Decompressed {
        data: out,
        compressed_size: addr.saturating_sub(start),
        complete,
    }
}

pub fn decompress(rom: &Rom, addr: usize) -> Result<Vec<u8>> {
    let result = decompress_stream(&rom.data, addr);
    if !result.complete {
        bail!(
            "Malformed compressed data at {addr:#X} (stopped after {} source bytes)",
            result.compressed_size
        );
    }
    Ok(result.data)
}

fn decode_block(src: &[u8], addr: &mut usize, out: &mut Vec<u8>) -> BlockResult {
    let byte = match src.get(*addr) {
        Some(&b) => b,
        None => return BlockResult::Malformed,
    };
    *addr += 1;
    if byte == 0xFF {
        return BlockResult::End;
    }
    match decode_block_body(byte, src, addr, out) {
        Some(()) => BlockResult::Continue,
        None => BlockResult::Malformed,
    }
}

fn decode_block_body(byte: u8, src: &[u8], addr: &mut usize, out: &mut Vec<u8>) -> Option<()> {
    let mut block_type = byte >> 5;
    let size: usize;
    if block_type != 7 {
        size = (byte & 0x1F) as usize + 1;
    } else {
        size = (((byte & 3) as usize) << 8 | *src.get(*addr)? as usize) + 1;
        *addr += 1;
        block_type = (byte >> 2) & 7;
    }

    match block_type {
        0 => {
            // Raw block
            let start = *addr;
            out.extend(src.get(start..start + size)?);
            *addr += size;
        }
        1 => {
            // Byte-level RLE block
            let value = next(src, addr)?;
            out.extend(std::iter::repeat(value).take(size));
        }
        2 => {
            // Word-level RLE block
            let b0 = next(src, addr)?;
            let b1 = next(src, addr)?;
            out.extend([b0, b1].repeat(size >> 1));
            if size & 1 == 1 {
                out.push(b0);
            }
        }
        3 => {
            // Incrementing sequence
            let mut b = next(src, addr)?;
            for _ in 0..size {
                out.push(b);
                b = b.wrapping_add(1);
            }
        }
        4 | 5 => {
            // Copy earlier output (or its complement), with absolute offset:
            let offset = u16::from_le_bytes([next(src, addr)?, next(src, addr)?]) as usize;
            let mask = if block_type == 5 { 0xFF } else { 0x00 };
            copy_earlier(out, offset, size, mask)?;
        }
        _ => {
            // Copy earlier output (or its complement), with offset relative to the end:
            let rel = next(src, addr)? as usize;
            if rel == 0 || rel > out.len() {
                return None;
            }
            let mask = if block_type == 7 { 0xFF } else { 0x00 };
            copy_earlier(out, out.len() - rel, size, mask)?;
        }
    }
    Some(())
}

fn next(src: &[u8], addr: &mut usize) -> Option<u8> {
    let b = *src.get(*addr)?;
    *addr += 1;
    Some(b)
}

// The source range may overlap the bytes being produced.
fn copy_earlier(out: &mut Vec<u8>, offset: usize, size: usize, mask: u8) -> Option<()> {
    if offset >= out.len() {
        return None;
    }
    for i in offset..(offset + size) {
        out.push(out[i] ^ mask);
    }
    Some(())
}
