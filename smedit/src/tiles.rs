use anyhow::{ensure, Context, Result};
use image::{imageops, Rgba, RgbaImage};
use smedit_game::{Block, LevelGeometry, SnesAddr, TilesetIdx};

use crate::patch::decompress::decompress;
use crate::patch::Rom;

pub const TILESET_TABLE_ADDR: SnesAddr = 0x8FE6A2;
pub const TILESET_ENTRY_SIZE: usize = 9;
pub const NUM_TILESETS: usize = 29;
pub const CRE_GFX_ADDR: SnesAddr = 0xB98000;
pub const CRE_TILE_TABLE_ADDR: SnesAddr = 0xB9A09D;

pub const NUM_METATILES: usize = 1024;
// The shared (CRE) metatiles come first; the tileset's own start at this entry.
pub const VARIABLE_METATILE_START: usize = 0x100;
pub const GFX_SIZE: usize = 0x8000; // 1024 tiles of 32 bytes
// Unlike the metatiles, the tileset's own graphics come first and the shared ones start here.
pub const SHARED_GFX_START: usize = 0x5000;
pub const NUM_COLORS: usize = 128;

pub type Tile = [[u8; 8]; 8];
pub type Metatile = [u16; 4]; // top-left, top-right, bottom-left, bottom-right

pub fn decode_tile_4bpp(tile: &[u8]) -> Tile {
    let mut out: Tile = [[0; 8]; 8];
    if tile.len() < 32 {
        return out;
    }
    for y in 0..8 {
        let i = y * 2;
        for x in 0..8 {
            let b0 = (tile[i] >> (7 - x)) & 1;
            let b1 = (tile[i + 1] >> (7 - x)) & 1;
            let b2 = (tile[i + 16] >> (7 - x)) & 1;
            let b3 = (tile[i + 17] >> (7 - x)) & 1;
            out[y][x] = b0 | b1 << 1 | b2 << 2 | b3 << 3;
        }
    }
    out
}

pub fn hflip_tile(tile: Tile) -> Tile {
    let mut out = [[0u8; 8]; 8];
    for y in 0..8 {
        for x in 0..8 {
            out[y][x] = tile[y][7 - x];
        }
    }
    out
}

pub fn vflip_tile(tile: Tile) -> Tile {
    let mut out = [[0u8; 8]; 8];
    for y in 0..8 {
        for x in 0..8 {
            out[y][x] = tile[7 - y][x];
        }
    }
    out
}

/// Decodes BGR555 colors. Missing entries are black; color 0 of each sub-palette is transparent.
pub fn decode_palette(pal_bytes: &[u8]) -> Vec<Rgba<u8>> {
    let mut out = vec![Rgba([0, 0, 0, 255]); NUM_COLORS];
    for i in 0..NUM_COLORS.min(pal_bytes.len() / 2) {
        let c = pal_bytes[i * 2] as u16 | ((pal_bytes[i * 2 + 1] as u16) << 8);
        let r = (c & 31) * 8;
        let g = ((c >> 5) & 31) * 8;
        let b = ((c >> 10) & 31) * 8;
        out[i] = Rgba([r as u8, g as u8, b as u8, 255]);
    }
    for i in (0..NUM_COLORS).step_by(16) {
        out[i] = Rgba([0, 0, 0, 0]);
    }
    out
}

fn read_metatiles(data: &[u8]) -> Vec<Metatile> {
    data.chunks_exact(8)
        .map(|c| {
            [
                u16::from_le_bytes([c[0], c[1]]),
                u16::from_le_bytes([c[2], c[3]]),
                u16::from_le_bytes([c[4], c[5]]),
                u16::from_le_bytes([c[6], c[7]]),
            ]
        })
        .collect()
}

/// Builds the 1024-entry metatile table: shared entries first (padded to the
/// variable start), then the tileset's own.
pub fn combine_metatiles(shared: &[u8], variable: &[u8]) -> Vec<Metatile> {
    let mut out = read_metatiles(shared);
    out.resize(VARIABLE_METATILE_START, [0; 4]);
    out.extend(read_metatiles(variable));
    out.resize(NUM_METATILES, [0; 4]);
    out
}

/// Builds the 1024-tile graphics buffer: the tileset's own tiles at byte 0, shared tiles at
/// `SHARED_GFX_START`.
pub fn combine_gfx(variable: &[u8], shared: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; GFX_SIZE];
    let n = variable.len().min(SHARED_GFX_START);
    out[..n].copy_from_slice(&variable[..n]);
    let n = shared.len().min(GFX_SIZE - SHARED_GFX_START);
    out[SHARED_GFX_START..SHARED_GFX_START + n].copy_from_slice(&shared[..n]);
    out
}

#[derive(Clone)]
pub struct Tileset {
    pub idx: TilesetIdx,
    pub metatiles: Vec<Metatile>,
    pub gfx: Vec<u8>,
    pub palette: Vec<Rgba<u8>>,
}

impl Tileset {
    pub fn load(rom: &Rom, idx: TilesetIdx) -> Result<Tileset> {
        ensure!(idx < NUM_TILESETS, "Invalid tileset {idx}");
        let entry_addr = rom.snes2pc(TILESET_TABLE_ADDR + idx * TILESET_ENTRY_SIZE);
        let tile_table_ptr = rom.read_u24(entry_addr)? as usize;
        let gfx_ptr = rom.read_u24(entry_addr + 3)? as usize;
        let palette_ptr = rom.read_u24(entry_addr + 6)? as usize;

        let variable_table = decompress(rom, rom.snes2pc(tile_table_ptr))
            .with_context(|| format!("tile table of tileset {idx}"))?;
        let variable_gfx = decompress(rom, rom.snes2pc(gfx_ptr))
            .with_context(|| format!("graphics of tileset {idx}"))?;
        let palette = decompress(rom, rom.snes2pc(palette_ptr))
            .with_context(|| format!("palette of tileset {idx}"))?;
        let shared_table = decompress(rom, rom.snes2pc(CRE_TILE_TABLE_ADDR))
            .context("shared tile table")?;
        let shared_gfx = decompress(rom, rom.snes2pc(CRE_GFX_ADDR)).context("shared graphics")?;

        Ok(Tileset {
            idx,
            metatiles: combine_metatiles(&shared_table, &variable_table),
            gfx: combine_gfx(&variable_gfx, &shared_gfx),
            palette: decode_palette(&palette),
        })
    }

    fn tile(&self, num: usize) -> Tile {
        let start = num * 32;
        match self.gfx.get(start..start + 32) {
            Some(data) => decode_tile_4bpp(data),
            None => [[0; 8]; 8],
        }
    }

    pub fn render_metatile(&self, idx: usize) -> Option<RgbaImage> {
        let metatile = self.metatiles.get(idx)?;
        let mut img = RgbaImage::new(16, 16);
        for (quadrant, &word) in metatile.iter().enumerate() {
            let mut tile = self.tile((word & 0x3FF) as usize);
            if word & 0x4000 != 0 {
                tile = hflip_tile(tile);
            }
            if word & 0x8000 != 0 {
                tile = vflip_tile(tile);
            }
            let pal = ((word >> 10) & 7) as usize;
            let x0 = (quadrant % 2) as u32 * 8;
            let y0 = (quadrant / 2) as u32 * 8;
            for y in 0..8 {
                for x in 0..8 {
                    let c = tile[y][x] as usize;
                    let color = if c == 0 {
                        Rgba([0, 0, 0, 0])
                    } else {
                        self.palette[pal * 16 + c]
                    };
                    img.put_pixel(x0 + x as u32, y0 + y as u32, color);
                }
            }
        }
        Some(img)
    }

    /// Renders a level data block, applying the block's own flips on top of the metatile's.
    pub fn render_block(&self, block: Block) -> Option<RgbaImage> {
        let mut img = self.render_metatile(block.metatile as usize)?;
        if block.h_flip {
            imageops::flip_horizontal_in_place(&mut img);
        }
        if block.v_flip {
            imageops::flip_vertical_in_place(&mut img);
        }
        Some(img)
    }
}

/// Holds the currently loaded tileset.
#[derive(Default)]
pub struct TileGraphicsDecoder {
    tileset: Option<Tileset>,
}

impl TileGraphicsDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_tileset(&mut self, rom: &Rom, idx: TilesetIdx) -> Result<()> {
        if self.tileset.as_ref().is_some_and(|t| t.idx == idx) {
            return Ok(());
        }
        self.tileset = Some(Tileset::load(rom, idx)?);
        Ok(())
    }

    pub fn tileset(&self) -> Option<&Tileset> {
        self.tileset.as_ref()
    }

    pub fn render_metatile(&self, idx: usize) -> Option<RgbaImage> {
        self.tileset.as_ref()?.render_metatile(idx)
    }

    pub fn render_block(&self, word: u16) -> Option<RgbaImage> {
        self.tileset.as_ref()?.render_block(Block::from_word(word))
    }
}

/// Renders layer 1 of a room.
pub fn render_room(tileset: &Tileset, geometry: &LevelGeometry) -> RgbaImage {
    let mut img = RgbaImage::new(geometry.width as u32 * 16, geometry.height as u32 * 16);
    for y in 0..geometry.height {
        for x in 0..geometry.width {
            let Some(block) = geometry.block(x, y) else {
                continue;
            };
            if let Some(block_img) = tileset.render_block(block) {
                imageops::replace(&mut img, &block_img, x as i64 * 16, y as i64 * 16);
            }
        }
    }
    img
}
