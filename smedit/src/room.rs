use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use log::{info, warn};
use smedit_game::{
    DoorConnection, LevelGeometry, PlacementEntry, Room, RoomHandle, RoomState, StateCondition,
    StateEntry, ROOM_HEADER_SIZE, ROOM_STATE_SIZE,
};

use crate::patch::decompress::decompress_stream;
use crate::patch::Rom;
use crate::placement::{parse_door_list, parse_placement_list};

pub const ROOM_BANK: usize = 0x8F;
pub const LANDING_SITE: RoomHandle = 0x91F8;

// Limit on how far the condition chain may extend past the header before we give up on it.
const STATE_CHAIN_SCAN_LIMIT: usize = 100;

pub fn room_bank_pc(rom: &Rom, ptr: u16) -> usize {
    rom.snes2pc(ROOM_BANK << 16 | ptr as usize)
}

pub fn read_room(rom: &Rom, handle: RoomHandle) -> Option<Room> {
    if handle < 0x8000 {
        return None;
    }
    let header = rom.read_n(room_bank_pc(rom, handle), ROOM_HEADER_SIZE).ok()?;
    Room::from_header(handle, header)
}

/// Walks the conditional state chain following the header. The last entry is always the
/// default state, whose block immediately follows its condition code. Returns `None` if
/// the chain doesn't reach a default entry within the scan limit.
pub fn read_state_entries(rom: &Rom, room: &Room) -> Option<Vec<StateEntry>> {
    let chain_start = room.handle as usize + ROOM_HEADER_SIZE;
    let mut entries: Vec<StateEntry> = vec![];
    let mut pos = 0;
    while pos < STATE_CHAIN_SCAN_LIMIT {
        let ptr = chain_start + pos;
        if ptr + 2 > 0x10000 {
            return None;
        }
        let addr = room_bank_pc(rom, ptr as u16);
        let code = rom.read_u16(addr).ok()? as u16;
        let len = StateCondition::entry_length(code);
        if code == StateCondition::DEFAULT_CODE {
            let state_ptr = ptr + len;
            if state_ptr + ROOM_STATE_SIZE > 0x10000 {
                return None;
            }
            entries.push(StateEntry {
                condition: StateCondition::Default,
                state_ptr: state_ptr as u16,
            });
            return Some(entries);
        }
        let entry = rom.read_n(addr, len).ok()?;
        entries.push(StateEntry {
            condition: StateCondition::decode(code, &entry[2..len - 2]),
            state_ptr: u16::from_le_bytes([entry[len - 2], entry[len - 1]]),
        });
        pos += len;
    }
    None
}

pub fn read_state(rom: &Rom, state_ptr: u16) -> Option<RoomState> {
    let data = rom.read_n(room_bank_pc(rom, state_ptr), ROOM_STATE_SIZE).ok()?;
    RoomState::from_bytes(state_ptr, data).ok()
}

/// The default state, which the game uses when no condition in the chain holds.
pub fn read_active_state(rom: &Rom, room: &Room) -> Option<RoomState> {
    let entries = read_state_entries(rom, room)?;
    let default = entries.last()?;
    read_state(rom, default.state_ptr)
}

pub fn load_level_geometry(rom: &Rom, room: &Room, state: &RoomState) -> Option<LevelGeometry> {
    let ptr = state.level_data_ptr as usize;
    if ptr >> 16 < 0x80 || ptr & 0xFFFF < 0x8000 {
        return None;
    }
    let addr = rom.snes2pc(ptr);
    if addr >= rom.data.len() {
        return None;
    }
    let result = decompress_stream(&rom.data, addr);
    if !result.complete {
        warn!(
            "Level data of room {:04X} at {ptr:06X} is malformed",
            room.handle
        );
        return None;
    }
    match LevelGeometry::decode(&result.data, room.width as usize, room.height as usize) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            warn!("Level data of room {:04X}: {e}", room.handle);
            None
        }
    }
}

/// Everything known about one room in its default state.
#[derive(Clone, Debug)]
pub struct RoomData {
    pub room: Room,
    // None if the state chain has no default entry within the scan limit.
    pub state: Option<RoomState>,
    pub geometry: LevelGeometry,
    // False if the geometry is the all-air placeholder.
    pub geometry_loaded: bool,
    pub placements: Vec<PlacementEntry>,
    pub doors: Vec<DoorConnection>,
}

/// Loads a room given a valid header. A missing state or unreadable level data leaves the
/// room with an empty grid and no placements rather than rejecting it.
pub fn load_room_data(rom: &Rom, handle: RoomHandle) -> Option<RoomData> {
    let room = read_room(rom, handle)?;
    let state = read_active_state(rom, &room);
    if state.is_none() {
        warn!("Room {handle:04X} has no default state; using an empty grid");
    }
    let geometry = state
        .as_ref()
        .and_then(|s| load_level_geometry(rom, &room, s));
    let geometry_loaded = geometry.is_some();
    let geometry = geometry
        .unwrap_or_else(|| LevelGeometry::empty(room.width as usize, room.height as usize));
    let placements = match &state {
        Some(s) => parse_placement_list(rom, s.plm_ptr),
        None => vec![],
    };
    let doors = read_room_doors(rom, &room, &geometry, geometry_loaded);
    Some(RoomData {
        room,
        state,
        geometry,
        geometry_loaded,
        placements,
        doors,
    })
}

// Elevators have no door blocks, so the door-block count can fall short of the real list.
// Read as far as the entries look like doors, and at least as many as the door blocks name;
// the cap matcher drops the extras that have no aperture.
fn read_room_doors(
    rom: &Rom,
    room: &Room,
    geometry: &LevelGeometry,
    geometry_loaded: bool,
) -> Vec<DoorConnection> {
    let doors = parse_door_list(rom, room, None);
    if geometry_loaded && geometry.door_count() > doors.len() {
        return parse_door_list(rom, room, Some(geometry.door_count()));
    }
    doors
}

#[derive(Default)]
pub struct RoomTable {
    pub rooms: HashMap<RoomHandle, RoomData>,
    pub misses: usize,
}

impl RoomTable {
    pub fn get(&self, handle: RoomHandle) -> Option<&RoomData> {
        self.rooms.get(&handle)
    }

    pub fn sorted_handles(&self) -> Vec<RoomHandle> {
        let mut handles: Vec<RoomHandle> = self.rooms.keys().copied().collect();
        handles.sort();
        handles
    }
}

/// Discovers rooms by following door connections outward from the seed rooms.
/// Destinations that don't decode as rooms are counted and skipped.
pub fn scan_rooms(rom: &Rom, seeds: &[RoomHandle]) -> RoomTable {
    let mut table = RoomTable::default();
    let mut visited: HashSet<RoomHandle> = HashSet::new();
    let mut queue: VecDeque<RoomHandle> = seeds.iter().copied().collect();
    while let Some(handle) = queue.pop_front() {
        if !visited.insert(handle) {
            continue;
        }
        let Some(data) = load_room_data(rom, handle) else {
            table.misses += 1;
            continue;
        };
        for door in &data.doors {
            if !visited.contains(&door.dest_room) {
                queue.push_back(door.dest_room);
            }
        }
        table.rooms.insert(handle, data);
    }
    info!(
        "Found {} rooms ({} candidate handles rejected)",
        table.rooms.len(),
        table.misses
    );
    table
}
