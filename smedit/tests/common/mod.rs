#![allow(dead_code)]

use smedit::patch::{Rom, ROM_SIZE};
use smedit_game::{LevelGeometry, PlacementEntry, RoomHandle, SnesAddr};

pub const ROOM_BANK: SnesAddr = 0x8F0000;
pub const DOOR_BANK: SnesAddr = 0x830000;

/// Builds a synthetic cartridge image: everything is filler except what the test writes.
pub struct TestRom {
    pub rom: Rom,
}

pub struct TestRoom<'a> {
    pub handle: RoomHandle,
    pub area: u8,
    pub width: u8,
    pub height: u8,
    pub door_list_ptr: u16,
    // (condition code, argument bytes, state pointer), before the default entry
    pub conditions: &'a [(u16, &'a [u8], u16)],
    pub default_state: [u8; 26],
}

pub fn state_bytes(level_data_ptr: u32, tileset: u8, plm_ptr: u16) -> [u8; 26] {
    let mut s = [0u8; 26];
    s[0..3].copy_from_slice(&level_data_ptr.to_le_bytes()[..3]);
    s[3] = tileset;
    s[20..22].copy_from_slice(&plm_ptr.to_le_bytes());
    s
}

// Level data stored as raw blocks only, so any re-encoding of it is smaller.
pub fn compress_raw(data: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    for chunk in data.chunks(1024) {
        let n = chunk.len() - 1;
        out.push(0xE0 | (n >> 8) as u8);
        out.push((n & 0xFF) as u8);
        out.extend(chunk);
    }
    out.push(0xFF);
    out
}

impl TestRom {
    pub fn new() -> Self {
        TestRom {
            rom: Rom::from_image(vec![0xFF; ROM_SIZE]).unwrap(),
        }
    }

    pub fn write(&mut self, addr: SnesAddr, data: &[u8]) {
        let pc = self.rom.snes2pc(addr);
        self.rom.data[pc..pc + data.len()].copy_from_slice(data);
    }

    pub fn read(&self, addr: SnesAddr, n: usize) -> Vec<u8> {
        let pc = self.rom.snes2pc(addr);
        self.rom.data[pc..pc + n].to_vec()
    }

    pub fn add_room(&mut self, room: &TestRoom) {
        let dl = room.door_list_ptr.to_le_bytes();
        let mut data = vec![
            0x00,
            room.area,
            0x10,
            0x04,
            room.width,
            room.height,
            0x70,
            0xA0,
            0x00,
            dl[0],
            dl[1],
        ];
        for &(code, arg, state_ptr) in room.conditions {
            data.extend(code.to_le_bytes());
            data.extend(arg);
            data.extend(state_ptr.to_le_bytes());
        }
        data.extend([0xE6, 0xE5]);
        data.extend(room.default_state);
        self.write(ROOM_BANK | room.handle as usize, &data);
    }

    pub fn add_state(&mut self, state_ptr: u16, state: [u8; 26]) {
        self.write(ROOM_BANK | state_ptr as usize, &state);
    }

    pub fn add_placements(&mut self, ptr: u16, entries: &[PlacementEntry]) {
        let data = smedit::placement::encode_placement_list(entries);
        self.write(ROOM_BANK | ptr as usize, &data);
    }

    pub fn add_level_data(&mut self, addr: SnesAddr, geometry: &LevelGeometry, raw: bool) -> usize {
        let encoded = geometry.encode();
        let data = if raw {
            compress_raw(&encoded)
        } else {
            smedit::patch::compress::compress(&encoded)
        };
        self.write(addr, &data);
        data.len()
    }

    /// Writes a door list at `list_ptr` with one 12-byte door entry per (pointer, entry).
    pub fn add_doors(&mut self, list_ptr: u16, doors: &[(u16, [u8; 12])]) {
        let mut list = vec![];
        for (door_ptr, entry) in doors {
            list.extend(door_ptr.to_le_bytes());
            self.write(DOOR_BANK | *door_ptr as usize, entry);
        }
        self.write(ROOM_BANK | list_ptr as usize, &list);
    }
}

pub fn door_entry(dest_room: RoomHandle, orientation: u8, screen_x: u8, screen_y: u8) -> [u8; 12] {
    let d = dest_room.to_le_bytes();
    [d[0], d[1], 0x00, orientation, 0x00, 0x00, screen_x, screen_y, 0x00, 0x80, 0x00, 0x00]
}
