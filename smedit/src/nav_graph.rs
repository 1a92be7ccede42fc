use serde::Serialize;
use smedit_game::{Ability, Direction, DoorCapColor, RoomHandle};

use crate::door_caps::match_door_caps;
use crate::room::{RoomData, RoomTable};

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NavNode {
    pub room_id: RoomHandle,
    pub room_id_hex: String,
    pub name: String,
    pub area_name: String,
    pub map_x: u8,
    pub map_y: u8,
    pub width_screens: u8,
    pub height_screens: u8,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NavEdge {
    pub from_room_id: RoomHandle,
    pub to_room_id: RoomHandle,
    pub to_room_id_hex: String,
    pub direction: Direction,
    pub door_cap_color: Option<DoorCapColor>,
    pub required_ability: Option<Ability>,
    pub is_elevator: bool,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct NavGraph {
    pub nodes: Vec<NavNode>,
    pub edges: Vec<NavEdge>,
}

fn room_id_hex(handle: RoomHandle) -> String {
    format!("0x{handle:04X}")
}

fn room_edges(data: &RoomData) -> Vec<NavEdge> {
    match_door_caps(&data.room, &data.doors, &data.placements, &data.geometry)
        .into_iter()
        .map(|m| NavEdge {
            from_room_id: data.room.handle,
            to_room_id: m.door.dest_room,
            to_room_id_hex: room_id_hex(m.door.dest_room),
            direction: m.door.direction(),
            door_cap_color: m.cap,
            required_ability: m.cap.map(|c| c.required_ability()),
            is_elevator: m.door.is_elevator(),
        })
        .collect()
}

/// Rooms become nodes, matched doors become edges. Rooms are visited in handle order.
pub fn build_nav_graph(table: &RoomTable) -> NavGraph {
    let mut graph = NavGraph::default();
    for handle in table.sorted_handles() {
        let Some(data) = table.get(handle) else {
            continue;
        };
        let room = &data.room;
        graph.nodes.push(NavNode {
            room_id: handle,
            room_id_hex: room_id_hex(handle),
            name: format!("{} {handle:04X}", room.area),
            area_name: room.area.to_string(),
            map_x: room.map_x,
            map_y: room.map_y,
            width_screens: room.width,
            height_screens: room.height,
        });
        graph.edges.extend(room_edges(data));
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use smedit_game::{DoorConnection, LevelGeometry, PlacementEntry, Room, RoomState};

    fn room_data() -> RoomData {
        let header = [0x05, 0x03, 0x0C, 0x02, 0x01, 0x01, 0x70, 0xA0, 0x00, 0x00, 0x90];
        let room = Room::from_header(0xCA08, &header).unwrap();
        let state = RoomState::from_bytes(0xCA13, &[0; 26]).unwrap();
        let mut geometry = LevelGeometry::empty(1, 1);
        for y in 6..10 {
            geometry.set_block(0, y, smedit_game::Block::from_word(0x9040)).unwrap();
        }
        let door = DoorConnection {
            door_ptr: 0xA18C,
            dest_room: 0xCA52,
            elevator_props: 0,
            orientation: 1,
            cap_x: 0x2E,
            cap_y: 0x06,
            screen_x: 0,
            screen_y: 0,
            spawn_distance: 0x8000,
            asm_ptr: 0,
        };
        RoomData {
            room,
            state: Some(state),
            geometry,
            geometry_loaded: true,
            placements: vec![PlacementEntry {
                id: 0xC890,
                x: 0x01,
                y: 0x06,
                param: 0x0090,
            }],
            doors: vec![door],
        }
    }

    #[test]
    fn graph_json_fields() {
        let mut table = RoomTable::default();
        table.rooms.insert(0xCA08, room_data());
        let graph = build_nav_graph(&table);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.edges.len(), 1);

        let json = serde_json::to_value(&graph).unwrap();
        let node = &json["nodes"][0];
        assert_eq!(node["roomId"], 0xCA08);
        assert_eq!(node["roomIdHex"], "0xCA08");
        assert_eq!(node["areaName"], "Wrecked Ship");
        assert_eq!(node["mapX"], 0x0C);
        assert_eq!(node["widthScreens"], 1);

        let edge = &json["edges"][0];
        assert_eq!(edge["fromRoomId"], 0xCA08);
        assert_eq!(edge["toRoomIdHex"], "0xCA52");
        assert_eq!(edge["direction"], "left");
        assert_eq!(edge["doorCapColor"], "red");
        assert_eq!(edge["requiredAbility"], "missile");
        assert_eq!(edge["isElevator"], false);
    }
}
