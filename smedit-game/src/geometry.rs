use crate::{BlockType, BLOCKS_PER_SCREEN};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// A decoded layer-1 tile word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub block_type: BlockType,
    pub h_flip: bool,
    pub v_flip: bool,
    pub metatile: u16, // 0..1024
}

impl Block {
    pub fn from_word(w: u16) -> Block {
        Block {
            block_type: BlockType::from_nibble((w >> 12) as u8),
            v_flip: w & 0x0800 != 0,
            h_flip: w & 0x0400 != 0,
            metatile: w & 0x03FF,
        }
    }

    pub fn to_word(self) -> u16 {
        (self.block_type as u16) << 12
            | (self.v_flip as u16) << 11
            | (self.h_flip as u16) << 10
            | (self.metatile & 0x03FF)
    }
}

/// Decompressed level data of a room state: layer 1 tile words, then one BTS byte per block,
/// then an optional layer 2 which is carried through untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelGeometry {
    pub width: usize,  // in blocks
    pub height: usize, // in blocks
    pub layer1: Vec<u16>,
    pub bts: Vec<u8>,
    pub layer2: Vec<u8>,
}

impl LevelGeometry {
    /// An all-air grid, used when a room's level data can't be located.
    pub fn empty(width_screens: usize, height_screens: usize) -> LevelGeometry {
        let width = width_screens * BLOCKS_PER_SCREEN;
        let height = height_screens * BLOCKS_PER_SCREEN;
        LevelGeometry {
            width,
            height,
            layer1: vec![0; width * height],
            bts: vec![0; width * height],
            layer2: vec![],
        }
    }

    pub fn decode(data: &[u8], width_screens: usize, height_screens: usize) -> Result<LevelGeometry> {
        ensure!(data.len() >= 2, "level data is missing its size word");
        let layer1_size = u16::from_le_bytes([data[0], data[1]]) as usize;
        let width = width_screens * BLOCKS_PER_SCREEN;
        let height = height_screens * BLOCKS_PER_SCREEN;
        let num_blocks = layer1_size / 2;
        ensure!(
            num_blocks == width * height,
            "level data holds {num_blocks} blocks, expected {width}x{height}"
        );
        let bts_start = 2 + layer1_size;
        let bts_end = bts_start + num_blocks;
        ensure!(
            data.len() >= bts_end,
            "level data truncated: {} < {bts_end} bytes",
            data.len()
        );
        let layer1 = data[2..bts_start]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Ok(LevelGeometry {
            width,
            height,
            layer1,
            bts: data[bts_start..bts_end].to_vec(),
            layer2: data[bts_end..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::with_capacity(2 + self.layer1.len() * 3 + self.layer2.len());
        out.extend(((self.layer1.len() * 2) as u16).to_le_bytes());
        for &w in &self.layer1 {
            out.extend(w.to_le_bytes());
        }
        out.extend(&self.bts);
        out.extend(&self.layer2);
        out
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn block(&self, x: usize, y: usize) -> Option<Block> {
        self.index(x, y).map(|i| Block::from_word(self.layer1[i]))
    }

    pub fn set_block(&mut self, x: usize, y: usize, block: Block) -> Result<()> {
        let i = self
            .index(x, y)
            .with_context(|| format!("block ({x}, {y}) is outside the room"))?;
        self.layer1[i] = block.to_word();
        Ok(())
    }

    pub fn bts(&self, x: usize, y: usize) -> Option<u8> {
        self.index(x, y).map(|i| self.bts[i])
    }

    pub fn set_bts(&mut self, x: usize, y: usize, value: u8) -> Result<()> {
        let i = self
            .index(x, y)
            .with_context(|| format!("block ({x}, {y}) is outside the room"))?;
        self.bts[i] = value;
        Ok(())
    }

    pub fn is_door(&self, x: usize, y: usize) -> bool {
        self.block(x, y)
            .is_some_and(|b| b.block_type == BlockType::Door)
    }

    /// Number of door list entries referenced by door blocks (highest door BTS + 1).
    pub fn door_count(&self) -> usize {
        self.layer1
            .iter()
            .zip(&self.bts)
            .filter(|&(&w, _)| Block::from_word(w).block_type == BlockType::Door)
            .map(|(_, &b)| b as usize + 1)
            .max()
            .unwrap_or(0)
    }
}
