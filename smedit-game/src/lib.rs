// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod geometry;
pub mod plm;

pub use geometry::{Block, LevelGeometry};
pub use plm::{PlacementCategory, PlacementEntry, PlacementKind};

use anyhow::{ensure, Result};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};

pub type RoomHandle = u16; // Offset of the room header within bank $8F
pub type PcAddr = usize; // Flat offset into the image buffer
pub type SnesAddr = usize; // 24-bit bank:offset address
pub type DoorPtr = u16; // Offset of a 12-byte door entry within bank $83
pub type PlmPtr = u16; // Offset of a PLM list within bank $8F
pub type TilesetIdx = usize;

pub const NUM_AREAS: usize = 7;
pub const MAX_ROOM_SCREENS: u8 = 16;
pub const BLOCKS_PER_SCREEN: usize = 16;
pub const ROOM_HEADER_SIZE: usize = 11;
pub const ROOM_STATE_SIZE: usize = 26;
pub const DOOR_ENTRY_SIZE: usize = 12;

// Offsets of fields within the 26-byte room state block:
pub const STATE_LEVEL_DATA_OFFSET: usize = 0;
pub const STATE_TILESET_OFFSET: usize = 3;
pub const STATE_PLM_PTR_OFFSET: usize = 20;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    VariantNames,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum Area {
    Crateria = 0,
    Brinstar = 1,
    Norfair = 2,
    #[strum(serialize = "Wrecked Ship")]
    #[serde(rename = "Wrecked Ship")]
    WreckedShip = 3,
    Maridia = 4,
    Tourian = 5,
    Ceres = 6,
}

/// Direction of travel through a door. A door leading right sits on the right edge of its room.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    VariantNames,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Right = 0,
    Left = 1,
    Down = 2,
    Up = 3,
}

impl Direction {
    pub fn from_orientation(orientation: u8) -> Direction {
        match orientation & 3 {
            0 => Direction::Right,
            1 => Direction::Left,
            2 => Direction::Down,
            _ => Direction::Up,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Right | Direction::Left)
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    VariantNames,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum BlockType {
    Air = 0x0,
    Slope = 0x1,
    SpikeAir = 0x2,
    SpecialAir = 0x3,
    ShootableAir = 0x4,
    HorizontalExtension = 0x5,
    UnusedAir = 0x6,
    BombableAir = 0x7,
    Solid = 0x8,
    Door = 0x9,
    Spike = 0xA,
    Crumble = 0xB,
    Shot = 0xC,
    VerticalExtension = 0xD,
    Grapple = 0xE,
    Bomb = 0xF,
}

impl BlockType {
    pub fn from_nibble(x: u8) -> BlockType {
        // All 16 values are covered, so this cannot fail after masking.
        BlockType::try_from(x & 0xF).unwrap_or(BlockType::Air)
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DoorCapColor {
    Blue,
    Red,
    Green,
    Yellow,
    Grey,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum Ability {
    #[strum(serialize = "beam")]
    #[serde(rename = "beam")]
    Beam,
    #[strum(serialize = "missile")]
    #[serde(rename = "missile")]
    Missile,
    #[strum(serialize = "super")]
    #[serde(rename = "super")]
    SuperMissile,
    #[strum(serialize = "powerbomb")]
    #[serde(rename = "powerbomb")]
    PowerBomb,
    #[strum(serialize = "boss")]
    #[serde(rename = "boss")]
    BossOrEvent,
}

impl DoorCapColor {
    pub fn required_ability(self) -> Ability {
        match self {
            DoorCapColor::Blue => Ability::Beam,
            DoorCapColor::Red => Ability::Missile,
            DoorCapColor::Green => Ability::SuperMissile,
            DoorCapColor::Yellow => Ability::PowerBomb,
            DoorCapColor::Grey => Ability::BossOrEvent,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Room {
    pub handle: RoomHandle,
    pub index: u8,
    pub area: Area,
    pub map_x: u8,
    pub map_y: u8,
    pub width: u8,  // in screens
    pub height: u8, // in screens
    pub up_scroller: u8,
    pub down_scroller: u8,
    pub special_gfx: u8,
    pub door_list_ptr: u16, // bank $8F
}

impl Room {
    /// Decodes the fixed 11-byte room header, rejecting out-of-range dimensions or areas.
    pub fn from_header(handle: RoomHandle, header: &[u8]) -> Option<Room> {
        if header.len() < ROOM_HEADER_SIZE {
            return None;
        }
        let width = header[4];
        let height = header[5];
        if !(1..=MAX_ROOM_SCREENS).contains(&width) || !(1..=MAX_ROOM_SCREENS).contains(&height) {
            return None;
        }
        let area = Area::try_from(header[1]).ok()?;
        Some(Room {
            handle,
            index: header[0],
            area,
            map_x: header[2],
            map_y: header[3],
            width,
            height,
            up_scroller: header[6],
            down_scroller: header[7],
            special_gfx: header[8],
            door_list_ptr: u16::from_le_bytes([header[9], header[10]]),
        })
    }

    pub fn width_blocks(&self) -> usize {
        self.width as usize * BLOCKS_PER_SCREEN
    }

    pub fn height_blocks(&self) -> usize {
        self.height as usize * BLOCKS_PER_SCREEN
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StateCondition {
    Default,
    DoorPointerIs(u16),
    MainAreaBossDead,
    EventSet(u8),
    BossDead(u8),
    HasMorphBall,
    HasMorphBallAndMissiles,
    HasPowerBombs,
    HasSpeedBooster,
    Unknown(u16),
}

impl StateCondition {
    pub const DEFAULT_CODE: u16 = 0xE5E6;

    /// Total length of a chain entry starting with `code`: condition code, argument and state pointer.
    /// Codes we don't recognize are assumed to carry no argument.
    pub fn entry_length(code: u16) -> usize {
        match code {
            0xE5E6 => 2,
            0xE5EB => 6,
            0xE612 | 0xE629 => 5,
            _ => 4,
        }
    }

    /// Decodes the condition from its code and the bytes following it.
    pub fn decode(code: u16, arg: &[u8]) -> StateCondition {
        let arg8 = arg.first().copied().unwrap_or(0);
        let arg16 = if arg.len() >= 2 {
            u16::from_le_bytes([arg[0], arg[1]])
        } else {
            0
        };
        match code {
            0xE5E6 => StateCondition::Default,
            0xE5EB => StateCondition::DoorPointerIs(arg16),
            0xE5FF => StateCondition::MainAreaBossDead,
            0xE612 => StateCondition::EventSet(arg8),
            0xE629 => StateCondition::BossDead(arg8),
            0xE640 => StateCondition::HasMorphBall,
            0xE652 => StateCondition::HasMorphBallAndMissiles,
            0xE669 => StateCondition::HasPowerBombs,
            0xE678 => StateCondition::HasSpeedBooster,
            _ => StateCondition::Unknown(code),
        }
    }
}

/// One link of a room's conditional state chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StateEntry {
    pub condition: StateCondition,
    pub state_ptr: u16, // bank $8F
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomState {
    pub state_ptr: u16, // bank $8F
    pub level_data_ptr: u32,
    pub tileset: u8,
    pub music_data: u8,
    pub music_track: u8,
    pub fx_ptr: u16,
    pub enemy_population_ptr: u16,
    pub enemy_set_ptr: u16,
    pub layer2_scroll_x: u8,
    pub layer2_scroll_y: u8,
    pub scroll_ptr: u16,
    pub special_xray_ptr: u16,
    pub main_asm_ptr: u16,
    pub plm_ptr: PlmPtr,
    pub bg_ptr: u16,
    pub setup_asm_ptr: u16,
}

impl RoomState {
    pub fn from_bytes(state_ptr: u16, data: &[u8]) -> Result<RoomState> {
        ensure!(
            data.len() >= ROOM_STATE_SIZE,
            "room state at {state_ptr:04X} is truncated"
        );
        let w = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        Ok(RoomState {
            state_ptr,
            level_data_ptr: data[0] as u32 | (data[1] as u32) << 8 | (data[2] as u32) << 16,
            tileset: data[3],
            music_data: data[4],
            music_track: data[5],
            fx_ptr: w(6),
            enemy_population_ptr: w(8),
            enemy_set_ptr: w(10),
            layer2_scroll_x: data[12],
            layer2_scroll_y: data[13],
            scroll_ptr: w(14),
            special_xray_ptr: w(16),
            main_asm_ptr: w(18),
            plm_ptr: w(20),
            bg_ptr: w(22),
            setup_asm_ptr: w(24),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DoorConnection {
    pub door_ptr: DoorPtr,
    pub dest_room: RoomHandle,
    pub elevator_props: u8,
    pub orientation: u8,
    pub cap_x: u8,
    pub cap_y: u8,
    pub screen_x: u8,
    pub screen_y: u8,
    pub spawn_distance: u16,
    pub asm_ptr: u16,
}

impl DoorConnection {
    pub fn from_bytes(door_ptr: DoorPtr, data: &[u8]) -> Result<DoorConnection> {
        ensure!(
            data.len() >= DOOR_ENTRY_SIZE,
            "door entry at {door_ptr:04X} is truncated"
        );
        Ok(DoorConnection {
            door_ptr,
            dest_room: u16::from_le_bytes([data[0], data[1]]),
            elevator_props: data[2],
            orientation: data[3],
            cap_x: data[4],
            cap_y: data[5],
            screen_x: data[6],
            screen_y: data[7],
            spawn_distance: u16::from_le_bytes([data[8], data[9]]),
            asm_ptr: u16::from_le_bytes([data[10], data[11]]),
        })
    }

    pub fn direction(&self) -> Direction {
        Direction::from_orientation(self.orientation)
    }

    pub fn is_elevator(&self) -> bool {
        self.elevator_props & 0x80 != 0
    }

    pub fn closes_cap(&self) -> bool {
        self.orientation & 4 != 0
    }
}
