// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod door_caps;
pub mod nav_graph;
pub mod patch;
pub mod placement;
pub mod room;
pub mod settings;
pub mod tiles;
