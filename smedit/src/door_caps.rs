use smedit_game::{
    Direction, DoorCapColor, DoorConnection, LevelGeometry, PlacementEntry, PlacementKind, Room,
    BLOCKS_PER_SCREEN,
};

// Door blocks and caps count as being on an edge when within this many blocks of it.
const EDGE_MARGIN: usize = 2;

const EDGES: [Direction; 4] = [
    Direction::Right,
    Direction::Left,
    Direction::Down,
    Direction::Up,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedDoor {
    pub door_index: usize,
    pub door: DoorConnection,
    pub cap: Option<DoorCapColor>,
}

fn edge_distance(geometry: &LevelGeometry, edge: Direction, x: usize, y: usize) -> usize {
    match edge {
        Direction::Right => geometry.width.saturating_sub(x + 1),
        Direction::Left => x,
        Direction::Down => geometry.height.saturating_sub(y + 1),
        Direction::Up => y,
    }
}

// Position along the edge: y for the left and right edges, x for top and bottom.
fn along_edge(edge: Direction, x: usize, y: usize) -> usize {
    if edge.is_horizontal() {
        y
    } else {
        x
    }
}

/// Contiguous runs of door blocks near an edge, as (first, last) positions along the edge.
fn door_clusters(geometry: &LevelGeometry, edge: Direction) -> Vec<(usize, usize)> {
    let length = if edge.is_horizontal() {
        geometry.height
    } else {
        geometry.width
    };
    let depth = if edge.is_horizontal() {
        geometry.width
    } else {
        geometry.height
    };
    let mut clusters: Vec<(usize, usize)> = vec![];
    let mut current: Option<(usize, usize)> = None;
    for a in 0..length {
        let is_door = (0..EDGE_MARGIN.min(depth)).any(|d| {
            let (x, y) = match edge {
                Direction::Right => (geometry.width - 1 - d, a),
                Direction::Left => (d, a),
                Direction::Down => (a, geometry.height - 1 - d),
                Direction::Up => (a, d),
            };
            geometry.is_door(x, y)
        });
        current = match (current, is_door) {
            (Some((start, _)), true) => Some((start, a)),
            (None, true) => Some((a, a)),
            (Some(c), false) => {
                clusters.push(c);
                None
            }
            (None, false) => None,
        };
    }
    clusters.extend(current);
    clusters
}

// Where a door sits along its edge, in blocks: the middle of the screen it leads out of.
fn door_position(door: &DoorConnection, edge: Direction) -> usize {
    let screen = if edge.is_horizontal() {
        door.screen_y
    } else {
        door.screen_x
    };
    screen as usize * BLOCKS_PER_SCREEN + BLOCKS_PER_SCREEN / 2
}

/// Pairs door-cap placements with the room's doors, edge by edge.
///
/// On each edge, doors are ranked by position and any non-elevator door ranked beyond the
/// number of door-block clusters found on that edge is dropped as spurious. Caps facing
/// the edge and within the edge margin are then assigned: a lone cap on an edge with a lone door goes to that
/// door, otherwise caps are taken in order along the edge and each is given to the nearest
/// door that has no cap yet. This is a heuristic and can mispair caps in unusual rooms.
pub fn match_door_caps(
    room: &Room,
    doors: &[DoorConnection],
    placements: &[PlacementEntry],
    geometry: &LevelGeometry,
) -> Vec<MatchedDoor> {
    debug_assert_eq!(geometry.width, room.width_blocks());
    let mut matched: Vec<Option<MatchedDoor>> = vec![None; doors.len()];
    for edge in EDGES {
        let num_clusters = door_clusters(geometry, edge).len();

        let mut on_edge: Vec<usize> = (0..doors.len())
            .filter(|&i| doors[i].direction() == edge)
            .collect();
        on_edge.sort_by_key(|&i| (door_position(&doors[i], edge), i));
        let mut rank = 0;
        let mut kept: Vec<usize> = vec![];
        for i in on_edge {
            if doors[i].is_elevator() {
                kept.push(i);
                continue;
            }
            if rank < num_clusters {
                kept.push(i);
            }
            rank += 1;
        }

        let mut caps: Vec<(usize, DoorCapColor)> = placements
            .iter()
            .filter_map(|p| match p.kind() {
                // A cap faces the direction of travel of its door and sits on that edge.
                PlacementKind::DoorCap { color, orientation } if orientation == edge => {
                    let (x, y) = (p.x as usize, p.y as usize);
                    if edge_distance(geometry, edge, x, y) <= EDGE_MARGIN {
                        Some((along_edge(edge, x, y), color))
                    } else {
                        None
                    }
                }
                _ => None,
            })
            .collect();
        caps.sort_by_key(|&(pos, _)| pos);

        let mut colors: Vec<Option<DoorCapColor>> = vec![None; kept.len()];
        if caps.len() == 1 && kept.len() == 1 {
            colors[0] = Some(caps[0].1);
        } else {
            for &(pos, color) in &caps {
                let nearest = (0..kept.len())
                    .filter(|&k| colors[k].is_none())
                    .min_by_key(|&k| door_position(&doors[kept[k]], edge).abs_diff(pos));
                if let Some(k) = nearest {
                    colors[k] = Some(color);
                }
            }
        }

        for (k, &i) in kept.iter().enumerate() {
            matched[i] = Some(MatchedDoor {
                door_index: i,
                door: doors[i].clone(),
                cap: colors[k],
            });
        }
    }
    matched.into_iter().flatten().collect()
}
