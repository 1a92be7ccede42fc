use anyhow::{bail, ensure, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use smedit_game::{
    Block, LevelGeometry, PcAddr, PlacementCategory, PlacementEntry, Room, RoomHandle, RoomState,
    STATE_PLM_PTR_OFFSET,
};

use super::allocator::Allocator;
use super::compress::compress;
use super::decompress::decompress_stream;
use super::Rom;
use crate::placement::{encode_placement_list, parse_placement_list, placement_list_size};
use crate::room::{
    read_active_state, read_room, read_state, read_state_entries, room_bank_pc, ROOM_BANK,
};
use crate::settings::PatchOptions;

/// Change to one block of a room's level data. Omitted fields are left as they are.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlockEdit {
    pub x: usize,
    pub y: usize,
    pub word: Option<u16>,
    pub bts: Option<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PlacementEdit {
    /// Adds an entry, replacing any existing entry of the same category at the same position.
    Add(PlacementEntry),
    Remove {
        x: u8,
        y: u8,
        category: PlacementCategory,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RoomEdit {
    pub room: RoomHandle,
    #[serde(default)]
    pub blocks: Vec<BlockEdit>,
    #[serde(default)]
    pub placements: Vec<PlacementEdit>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SkippedRoom {
    pub room: RoomHandle,
    pub reason: String,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct PatchReport {
    pub applied: Vec<RoomHandle>,
    pub skipped: Vec<SkippedRoom>,
    pub relocated: Vec<(RoomHandle, u16)>,
    pub modified_ranges: Vec<(usize, usize)>,
}

struct PendingWrite {
    addr: PcAddr,
    data: Vec<u8>,
}

struct StagedRoom {
    writes: Vec<PendingWrite>,
    relocated_to: Option<u16>,
}

/// Applies edits to a copy of `rom`. Each room's edits are applied completely or not at all;
/// rooms that can't be patched are listed in the report and leave the image unchanged.
pub fn apply_edits(
    rom: &Rom,
    edits: &[RoomEdit],
    options: &PatchOptions,
) -> Result<(Rom, PatchReport)> {
    let mut out = rom.clone();
    out.enable_tracking();
    let mut report = PatchReport::default();
    if edits.is_empty() {
        return Ok((out, report));
    }
    let mut allocator = Allocator::from_bank_free_space(rom, ROOM_BANK as u8, options)?;

    for edit in edits {
        match stage_room_edit(&out, edit, &mut allocator, options) {
            Ok(staged) => {
                for w in &staged.writes {
                    out.write_n(w.addr, &w.data)?;
                }
                if let Some(ptr) = staged.relocated_to {
                    report.relocated.push((edit.room, ptr));
                }
                report.applied.push(edit.room);
            }
            Err(e) => {
                warn!("Skipping edits to room {:04X}: {e:#}", edit.room);
                report.skipped.push(SkippedRoom {
                    room: edit.room,
                    reason: format!("{e:#}"),
                });
            }
        }
    }
    info!(
        "Applied edits to {} rooms, skipped {}; relocation used {} of {} free bytes",
        report.applied.len(),
        report.skipped.len(),
        allocator.used(),
        allocator.capacity()
    );
    report.modified_ranges = out.get_modified_ranges();
    Ok((out, report))
}

fn stage_room_edit(
    rom: &Rom,
    edit: &RoomEdit,
    allocator: &mut Allocator,
    options: &PatchOptions,
) -> Result<StagedRoom> {
    let room = read_room(rom, edit.room).context("invalid room header")?;
    let state = read_active_state(rom, &room).context("room state chain not found")?;
    let mut writes: Vec<PendingWrite> = vec![];
    if !edit.blocks.is_empty() {
        writes.push(stage_geometry(rom, &room, &state, &edit.blocks, options)?);
    }
    let mut relocated_to = None;
    if !edit.placements.is_empty() {
        // Allocation comes last so nothing is allocated for a room that fails otherwise.
        let (placement_writes, relocated) =
            stage_placements(rom, &room, &state, &edit.placements, allocator)?;
        writes.extend(placement_writes);
        relocated_to = relocated;
    }
    Ok(StagedRoom {
        writes,
        relocated_to,
    })
}

fn stage_geometry(
    rom: &Rom,
    room: &Room,
    state: &RoomState,
    blocks: &[BlockEdit],
    options: &PatchOptions,
) -> Result<PendingWrite> {
    let ptr = state.level_data_ptr as usize;
    ensure!(
        ptr >> 16 >= 0x80 && ptr & 0xFFFF >= 0x8000,
        "level data pointer {ptr:06X} is not a ROM address"
    );
    let addr = rom.snes2pc(ptr);
    let original = decompress_stream(&rom.data, addr);
    ensure!(original.complete, "level data at {ptr:06X} is malformed");
    let mut geometry =
        LevelGeometry::decode(&original.data, room.width as usize, room.height as usize)?;
    for b in blocks {
        if let Some(word) = b.word {
            geometry.set_block(b.x, b.y, Block::from_word(word))?;
        }
        if let Some(bts) = b.bts {
            geometry.set_bts(b.x, b.y, bts)?;
        }
    }
    let mut data = compress(&geometry.encode());
    if data.len() > original.compressed_size {
        bail!(
            "recompressed level data needs {} bytes but only {} are available",
            data.len(),
            original.compressed_size
        );
    }
    data.resize(original.compressed_size, options.filler_byte);
    Ok(PendingWrite { addr, data })
}

/// Applies add/remove edits in order. Adding an entry replaces any entry with the same
/// position and category, so later edits win.
pub fn apply_placement_edits(
    entries: &[PlacementEntry],
    edits: &[PlacementEdit],
) -> Vec<PlacementEntry> {
    let mut out = entries.to_vec();
    for edit in edits {
        match *edit {
            PlacementEdit::Add(entry) => {
                let category = entry.category();
                out.retain(|e| !(e.x == entry.x && e.y == entry.y && e.category() == category));
                out.push(entry);
            }
            PlacementEdit::Remove { x, y, category } => {
                out.retain(|e| !(e.x == x && e.y == y && e.category() == category));
            }
        }
    }
    out
}

fn stage_placements(
    rom: &Rom,
    room: &Room,
    state: &RoomState,
    edits: &[PlacementEdit],
    allocator: &mut Allocator,
) -> Result<(Vec<PendingWrite>, Option<u16>)> {
    let old_ptr = state.plm_ptr;
    let original = parse_placement_list(rom, old_ptr);
    let entries = apply_placement_edits(&original, edits);
    let data = encode_placement_list(&entries);

    let old_size = if old_ptr >= 0x8000 {
        placement_list_size(original.len())
    } else {
        0
    };
    if data.len() <= old_size {
        let addr = room_bank_pc(rom, old_ptr);
        return Ok((vec![PendingWrite { addr, data }], None));
    }

    // Find every state sharing the old list before claiming space.
    let mut pointer_addrs: Vec<PcAddr> = vec![];
    let states = read_state_entries(rom, room).context("room state chain not found")?;
    for entry in states {
        let s = read_state(rom, entry.state_ptr)
            .with_context(|| format!("state at {:04X} is unreadable", entry.state_ptr))?;
        if s.plm_ptr == old_ptr {
            pointer_addrs.push(room_bank_pc(rom, entry.state_ptr) + STATE_PLM_PTR_OFFSET);
        }
    }

    let new_addr = allocator.allocate(data.len())?;
    let new_ptr = rom
        .pc2snes(new_addr)
        .context("allocated space is outside the ROM")?
        & 0xFFFF;
    let mut writes = vec![PendingWrite {
        addr: new_addr,
        data,
    }];
    for addr in pointer_addrs {
        writes.push(PendingWrite {
            addr,
            data: (new_ptr as u16).to_le_bytes().to_vec(),
        });
    }
    info!(
        "Relocated placement list of room {:04X} from {old_ptr:04X} to {new_ptr:04X}",
        room.handle
    );
    Ok((writes, Some(new_ptr as u16)))
}
