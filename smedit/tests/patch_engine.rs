mod common;

use anyhow::Result;
use common::{state_bytes, TestRom, TestRoom, ROOM_BANK};
use smedit::patch::decompress::decompress_stream;
use smedit::patch::room_edits::{apply_edits, BlockEdit, PlacementEdit, RoomEdit};
use smedit::placement::parse_placement_list;
use smedit::room::{load_level_geometry, read_active_state, read_room, read_state};
use smedit::settings::PatchOptions;
use smedit_game::{Block, BlockType, LevelGeometry, PlacementCategory, PlacementEntry};

const ROOM: u16 = 0x91F8;
const OTHER_ROOM: u16 = 0x92FD;

fn item(x: u8, y: u8) -> PlacementEntry {
    PlacementEntry {
        id: 0xEED7,
        x,
        y,
        param: 0,
    }
}

// A room with three states: event-set and default share the list at B000, the
// power-bomb state has its own at B100.
fn relocation_rom() -> TestRom {
    let mut t = TestRom::new();
    t.add_room(&TestRoom {
        handle: ROOM,
        area: 0,
        width: 1,
        height: 1,
        door_list_ptr: 0x0000,
        conditions: &[(0xE612, &[0x0E], 0xA000), (0xE669, &[], 0xA100)],
        default_state: state_bytes(0, 0, 0xB000),
    });
    t.add_state(0xA000, state_bytes(0, 0, 0xB000));
    t.add_state(0xA100, state_bytes(0, 0, 0xB100));
    t.add_placements(0xB000, &[item(1, 1)]);
    t.add_placements(0xB100, &[item(2, 2)]);
    t
}

#[test]
fn zero_edits_is_identity() -> Result<()> {
    let t = relocation_rom();
    let (out, report) = apply_edits(&t.rom, &[], &PatchOptions::default())?;
    assert!(out.data == t.rom.data);
    assert!(report.applied.is_empty());
    assert!(report.modified_ranges.is_empty());
    Ok(())
}

#[test]
fn relocated_list_updates_shared_pointers_only() -> Result<()> {
    let t = relocation_rom();
    let other = PlacementEntry {
        id: 0xB63F,
        x: 3,
        y: 3,
        param: 0,
    };
    let edits = vec![RoomEdit {
        room: ROOM,
        blocks: vec![],
        placements: vec![
            PlacementEdit::Add(other),
            PlacementEdit::Add(item(4, 4)),
        ],
    }];
    let (out, report) = apply_edits(&t.rom, &edits, &PatchOptions::default())?;
    assert_eq!(report.applied, vec![ROOM]);
    assert!(report.skipped.is_empty());

    // The last used byte of the bank is the terminator of the list at B100; one guard byte follows.
    let new_ptr = 0xB109;
    assert_eq!(report.relocated, vec![(ROOM, new_ptr)]);

    let room = read_room(&out, ROOM).unwrap();
    assert_eq!(read_active_state(&out, &room).unwrap().plm_ptr, new_ptr);
    assert_eq!(read_state(&out, 0xA000).unwrap().plm_ptr, new_ptr);
    assert_eq!(read_state(&out, 0xA100).unwrap().plm_ptr, 0xB100);

    assert_eq!(
        parse_placement_list(&out, new_ptr),
        vec![item(1, 1), other, item(4, 4)]
    );
    // The old list is left in place.
    assert_eq!(parse_placement_list(&out, 0xB000), vec![item(1, 1)]);
    assert_eq!(parse_placement_list(&out, 0xB100), vec![item(2, 2)]);
    Ok(())
}

#[test]
fn shrinking_list_is_written_in_place() -> Result<()> {
    let t = relocation_rom();
    let edits = vec![RoomEdit {
        room: ROOM,
        blocks: vec![],
        placements: vec![
            PlacementEdit::Add(item(1, 1)),
            PlacementEdit::Remove {
                x: 1,
                y: 1,
                category: PlacementCategory::Item,
            },
        ],
    }];
    let (out, report) = apply_edits(&t.rom, &edits, &PatchOptions::default())?;
    assert_eq!(report.applied, vec![ROOM]);
    assert!(report.relocated.is_empty());
    assert!(parse_placement_list(&out, 0xB000).is_empty());
    assert_eq!(read_state(&out, 0xA000).unwrap().plm_ptr, 0xB000);
    Ok(())
}

#[test]
fn allocator_exhaustion_skips_room_only() -> Result<()> {
    let mut t = relocation_rom();
    t.add_room(&TestRoom {
        handle: OTHER_ROOM,
        area: 0,
        width: 1,
        height: 1,
        door_list_ptr: 0x0000,
        conditions: &[],
        default_state: state_bytes(0, 0, 0xB200),
    });
    t.add_placements(0xB200, &[item(5, 5), item(6, 6)]);
    // Leave ten free bytes at the end of the bank.
    t.write(ROOM_BANK | 0xC000, &vec![0x00; 0x4000 - 10]);

    let edits = vec![
        RoomEdit {
            room: ROOM,
            blocks: vec![],
            placements: vec![PlacementEdit::Add(item(7, 7)), PlacementEdit::Add(item(8, 8))],
        },
        RoomEdit {
            room: OTHER_ROOM,
            blocks: vec![],
            placements: vec![PlacementEdit::Remove {
                x: 5,
                y: 5,
                category: PlacementCategory::Item,
            }],
        },
    ];
    let (out, report) = apply_edits(&t.rom, &edits, &PatchOptions::default())?;
    assert_eq!(report.applied, vec![OTHER_ROOM]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].room, ROOM);
    assert!(report.skipped[0].reason.contains("allocate"));

    assert_eq!(read_state(&out, 0xA000).unwrap().plm_ptr, 0xB000);
    assert_eq!(parse_placement_list(&out, 0xB000), vec![item(1, 1)]);
    assert_eq!(parse_placement_list(&out, 0xB200), vec![item(6, 6)]);
    Ok(())
}

fn geometry_rom(raw: bool) -> (TestRom, usize) {
    let mut t = TestRom::new();
    let mut geometry = LevelGeometry::empty(2, 1);
    for x in 0..32 {
        geometry.set_block(x, 15, Block::from_word(0x8001)).unwrap();
    }
    let size = t.add_level_data(0xC28000, &geometry, raw);
    t.add_room(&TestRoom {
        handle: ROOM,
        area: 1,
        width: 2,
        height: 1,
        door_list_ptr: 0x0000,
        conditions: &[],
        default_state: state_bytes(0xC28000, 0, 0xB000),
    });
    t.add_placements(0xB000, &[]);
    (t, size)
}

#[test]
fn geometry_edit_in_place() -> Result<()> {
    let (t, size) = geometry_rom(true);
    let edits = vec![RoomEdit {
        room: ROOM,
        blocks: vec![BlockEdit {
            x: 4,
            y: 14,
            word: Some(0xC0FF),
            bts: Some(0x01),
        }],
        placements: vec![],
    }];
    let (out, report) = apply_edits(&t.rom, &edits, &PatchOptions::default())?;
    assert_eq!(report.applied, vec![ROOM]);

    let room = read_room(&out, ROOM).unwrap();
    let state = read_active_state(&out, &room).unwrap();
    let geometry = load_level_geometry(&out, &room, &state).unwrap();
    let block = geometry.block(4, 14).unwrap();
    assert_eq!(block.block_type, BlockType::Shot);
    assert_eq!(block.metatile, 0xFF);
    assert_eq!(geometry.bts(4, 14), Some(0x01));
    assert_eq!(geometry.block(5, 15).unwrap().metatile, 1);

    // The shorter stream is padded with filler up to the original size.
    let pc = out.snes2pc(0xC28000);
    let stream = decompress_stream(&out.data, pc);
    assert!(stream.compressed_size < size);
    assert!(out.data[pc + stream.compressed_size..pc + size]
        .iter()
        .all(|&b| b == 0xFF));
    assert_eq!(report.modified_ranges, vec![(pc, pc + size)]);
    Ok(())
}

#[test]
fn oversized_geometry_skips_room() -> Result<()> {
    let (t, _) = geometry_rom(false);
    // Scatter distinct blocks so the level data no longer compresses well.
    let blocks = (0..200)
        .map(|i| BlockEdit {
            x: (i * 7) % 32,
            y: (i * 3) % 15,
            word: Some((i * 37 % 1024) as u16 | 0x8000),
            bts: Some((i * 11) as u8),
        })
        .collect();
    let edits = vec![RoomEdit {
        room: ROOM,
        blocks,
        placements: vec![PlacementEdit::Add(item(1, 1))],
    }];
    let (out, report) = apply_edits(&t.rom, &edits, &PatchOptions::default())?;
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped[0].room, ROOM);
    assert!(out.data == t.rom.data);
    Ok(())
}

#[test]
fn edits_to_invalid_room_are_skipped() -> Result<()> {
    let t = relocation_rom();
    let edits = vec![RoomEdit {
        room: 0x9000,
        blocks: vec![],
        placements: vec![PlacementEdit::Add(item(1, 1))],
    }];
    let (out, report) = apply_edits(&t.rom, &edits, &PatchOptions::default())?;
    assert_eq!(report.skipped.len(), 1);
    assert!(out.data == t.rom.data);
    Ok(())
}
