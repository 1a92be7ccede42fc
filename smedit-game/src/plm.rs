use crate::{DoorCapColor, Direction};
use serde::{Deserialize, Serialize};

pub const PLM_ENTRY_SIZE: usize = 6;

// Door cap PLM families. Each family has four consecutive types, 6 bytes apart,
// in the order right, left, down, up.
const DOOR_CAP_FAMILIES: [(u16, DoorCapColor); 6] = [
    (0xC842, DoorCapColor::Grey),
    (0xC85A, DoorCapColor::Yellow),
    (0xC872, DoorCapColor::Green),
    (0xC88A, DoorCapColor::Red),
    (0xC8A2, DoorCapColor::Blue),
    (0xC8BA, DoorCapColor::Blue), // blue caps that close behind Samus, 4 bytes apart
];

// Item PLMs: visible, chozo orb, and shot block containers; 21 items each, 4 bytes apart.
const ITEM_PLM_FIRST: u16 = 0xEED7;
const ITEM_PLM_LAST: u16 = 0xEFCF;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementEntry {
    pub id: u16,
    pub x: u8,
    pub y: u8,
    pub param: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PlacementKind {
    Item,
    DoorCap {
        color: DoorCapColor,
        orientation: Direction,
    },
    Other,
}

/// Coarse classification used to deduplicate edits at the same position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementCategory {
    Item,
    DoorCap,
    Other,
}

pub fn door_cap_info(id: u16) -> Option<(DoorCapColor, Direction)> {
    for (i, &(base, color)) in DOOR_CAP_FAMILIES.iter().enumerate() {
        let stride = if i == DOOR_CAP_FAMILIES.len() - 1 { 4 } else { 6 };
        if id < base {
            continue;
        }
        let offset = id - base;
        if offset % stride == 0 && offset / stride < 4 {
            let orientation = Direction::from_orientation((offset / stride) as u8);
            return Some((color, orientation));
        }
    }
    None
}

pub fn door_cap_color(id: u16) -> Option<DoorCapColor> {
    door_cap_info(id).map(|(color, _)| color)
}

pub fn is_item_plm(id: u16) -> bool {
    (ITEM_PLM_FIRST..=ITEM_PLM_LAST).contains(&id) && (id - ITEM_PLM_FIRST) % 4 == 0
}

impl PlacementEntry {
    pub fn from_bytes(data: &[u8]) -> Option<PlacementEntry> {
        if data.len() < PLM_ENTRY_SIZE {
            return None;
        }
        Some(PlacementEntry {
            id: u16::from_le_bytes([data[0], data[1]]),
            x: data[2],
            y: data[3],
            param: u16::from_le_bytes([data[4], data[5]]),
        })
    }

    pub fn to_bytes(&self) -> [u8; PLM_ENTRY_SIZE] {
        let id = self.id.to_le_bytes();
        let param = self.param.to_le_bytes();
        [id[0], id[1], self.x, self.y, param[0], param[1]]
    }

    pub fn kind(&self) -> PlacementKind {
        if is_item_plm(self.id) {
            PlacementKind::Item
        } else if let Some((color, orientation)) = door_cap_info(self.id) {
            PlacementKind::DoorCap { color, orientation }
        } else {
            PlacementKind::Other
        }
    }

    pub fn category(&self) -> PlacementCategory {
        match self.kind() {
            PlacementKind::Item => PlacementCategory::Item,
            PlacementKind::DoorCap { .. } => PlacementCategory::DoorCap,
            PlacementKind::Other => PlacementCategory::Other,
        }
    }

    pub fn door_cap_color(&self) -> Option<DoorCapColor> {
        door_cap_color(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ability;

    fn plm(id: u16, x: u8, y: u8, param: u16) -> PlacementEntry {
        PlacementEntry { id, x, y, param }
    }

    #[test]
    fn door_cap_colors() {
        let entries = [
            plm(0xC8A8, 0x01, 0x06, 0x0000),
            plm(0xC872, 0x8E, 0x26, 0x0051),
            plm(0xC866, 0x46, 0x4E, 0x0052),
        ];
        let colors: Vec<Option<DoorCapColor>> =
            entries.iter().map(|e| e.door_cap_color()).collect();
        assert_eq!(
            colors,
            vec![
                Some(DoorCapColor::Blue),
                Some(DoorCapColor::Green),
                Some(DoorCapColor::Yellow)
            ]
        );
        let abilities: Vec<Ability> = colors
            .iter()
            .flatten()
            .map(|c| c.required_ability())
            .collect();
        assert_eq!(
            abilities,
            vec![Ability::Beam, Ability::SuperMissile, Ability::PowerBomb]
        );
        assert_eq!(
            entries[2].kind(),
            PlacementKind::DoorCap {
                color: DoorCapColor::Yellow,
                orientation: Direction::Down
            }
        );
    }

    #[test]
    fn classify() {
        assert_eq!(
            door_cap_info(0xC8C6),
            Some((DoorCapColor::Blue, Direction::Up))
        );
        assert_eq!(door_cap_color(0xC844), None);
        assert_eq!(door_cap_color(0xC8CA), None);
        assert!(is_item_plm(0xEED7));
        assert!(is_item_plm(0xEFCF));
        assert!(!is_item_plm(0xEED8));
        let e = plm(0xEF2F, 3, 4, 0x1234);
        assert_eq!(e.category(), PlacementCategory::Item);
        assert_eq!(PlacementEntry::from_bytes(&e.to_bytes()), Some(e));
        assert_eq!(plm(0xB63F, 0, 0, 0).category(), PlacementCategory::Other);
    }
}
