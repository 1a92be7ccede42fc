use smedit_game::plm::PLM_ENTRY_SIZE;
use smedit_game::{DoorConnection, PlacementEntry, PlmPtr, Room, DOOR_ENTRY_SIZE};

use crate::patch::Rom;
use crate::room::room_bank_pc;

pub const DOOR_BANK: usize = 0x83;
pub const MAX_PLACEMENTS: usize = 256;
// Door lists carry no terminator; without a count from the level data, stop here.
pub const MAX_UNCOUNTED_DOORS: usize = 32;

/// Reads a placement list up to its zero terminator. Lists that run off the end of the
/// bank or past the entry cap are cut short.
pub fn parse_placement_list(rom: &Rom, ptr: PlmPtr) -> Vec<PlacementEntry> {
    let mut entries: Vec<PlacementEntry> = vec![];
    if ptr < 0x8000 {
        return entries;
    }
    for i in 0..MAX_PLACEMENTS {
        let offset = ptr as usize + i * PLM_ENTRY_SIZE;
        if offset + 2 > 0x10000 {
            break;
        }
        let addr = room_bank_pc(rom, offset as u16);
        match rom.read_u16(addr) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if offset + PLM_ENTRY_SIZE > 0x10000 {
            break;
        }
        let Some(entry) = rom
            .read_n(addr, PLM_ENTRY_SIZE)
            .ok()
            .and_then(PlacementEntry::from_bytes)
        else {
            break;
        };
        entries.push(entry);
    }
    entries
}

/// Size of a placement list in the image, including its terminator.
pub fn placement_list_size(num_entries: usize) -> usize {
    num_entries * PLM_ENTRY_SIZE + 2
}

pub fn encode_placement_list(entries: &[PlacementEntry]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(placement_list_size(entries.len()));
    for e in entries {
        out.extend(e.to_bytes());
    }
    out.extend([0x00, 0x00]);
    out
}

fn read_door(rom: &Rom, door_ptr: u16) -> Option<DoorConnection> {
    if door_ptr < 0x8000 || door_ptr as usize + DOOR_ENTRY_SIZE > 0x10000 {
        return None;
    }
    let addr = rom.snes2pc(DOOR_BANK << 16 | door_ptr as usize);
    let data = rom.read_n(addr, DOOR_ENTRY_SIZE).ok()?;
    DoorConnection::from_bytes(door_ptr, data).ok()
}

/// Reads the room's door list. With a known `count` (from the door blocks in the level
/// data) exactly that many entries are read; otherwise entries are read while they look
/// like door data, up to a fixed limit.
pub fn parse_door_list(rom: &Rom, room: &Room, count: Option<usize>) -> Vec<DoorConnection> {
    let mut doors: Vec<DoorConnection> = vec![];
    if room.door_list_ptr < 0x8000 {
        return doors;
    }
    let limit = count.unwrap_or(MAX_UNCOUNTED_DOORS);
    for i in 0..limit {
        let offset = room.door_list_ptr as usize + 2 * i;
        if offset + 2 > 0x10000 {
            break;
        }
        let Ok(door_ptr) = rom.read_u16(room_bank_pc(rom, offset as u16)) else {
            break;
        };
        let Some(door) = read_door(rom, door_ptr as u16) else {
            break;
        };
        if count.is_none() && door.dest_room < 0x8000 {
            break;
        }
        doors.push(door);
    }
    doors
}
