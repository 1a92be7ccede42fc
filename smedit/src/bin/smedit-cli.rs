use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use image::RgbaImage;
use log::{error, info, warn};
use smedit::door_caps::match_door_caps;
use smedit::nav_graph::build_nav_graph;
use smedit::patch::compress::compress;
use smedit::patch::decompress::decompress_stream;
use smedit::patch::room_edits::{apply_edits, RoomEdit};
use smedit::patch::Rom;
use smedit::room::{load_room_data, read_state_entries, scan_rooms, LANDING_SITE};
use smedit::settings::{parse_patch_options, PatchOptions};
use smedit::tiles::{render_room, TileGraphicsDecoder};
use smedit_game::RoomHandle;
use std::path::{Path, PathBuf};

fn parse_room_handle(s: &str) -> Result<RoomHandle> {
    let digits = s
        .trim_start_matches("0x")
        .trim_start_matches('$')
        .trim_start_matches("8F:");
    let handle = u16::from_str_radix(digits, 16)
        .with_context(|| format!("Invalid room handle {s} (expected hex, e.g. 91F8)"))?;
    Ok(handle)
}

#[derive(Parser)]
struct Args {
    #[arg(long)]
    rom: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a room's header, states, placements and doors
    Info {
        #[arg(long, value_parser = parse_room_handle)]
        room: RoomHandle,
    },
    /// Render layer 1 of a room to a PNG file
    Render {
        #[arg(long, value_parser = parse_room_handle)]
        room: RoomHandle,
        #[arg(long)]
        output: PathBuf,
    },
    /// Export the room connection graph as JSON
    NavGraph {
        #[arg(long)]
        output: PathBuf,
        /// Rooms to start the search from (default: the landing site)
        #[arg(long, value_parser = parse_room_handle)]
        seed: Vec<RoomHandle>,
    },
    /// Recompress a room's level data and check that it decodes to the same bytes
    Roundtrip {
        #[arg(long, value_parser = parse_room_handle)]
        room: RoomHandle,
    },
    /// Apply a JSON list of room edits and write the patched image
    Patch {
        #[arg(long)]
        edits: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn print_info(rom: &Rom, handle: RoomHandle) -> Result<()> {
    let data = load_room_data(rom, handle)
        .with_context(|| format!("No valid room at {handle:04X}"))?;
    let room = &data.room;
    println!(
        "Room {handle:04X}: {} index {}, map ({}, {}), {}x{} screens",
        room.area, room.index, room.map_x, room.map_y, room.width, room.height
    );
    for entry in read_state_entries(rom, room).unwrap_or_default() {
        println!("  state {:04X}: {:?}", entry.state_ptr, entry.condition);
    }
    match &data.state {
        Some(state) => println!(
            "  level data {:06X} ({}), tileset {}, placements {:04X}",
            state.level_data_ptr,
            if data.geometry_loaded {
                "loaded"
            } else {
                "unreadable"
            },
            state.tileset,
            state.plm_ptr
        ),
        None => println!("  no default state found"),
    }
    for p in &data.placements {
        println!(
            "  placement {:04X} at ({}, {}) param {:04X}: {:?}",
            p.id,
            p.x,
            p.y,
            p.param,
            p.kind()
        );
    }
    let matched = match_door_caps(room, &data.doors, &data.placements, &data.geometry);
    for m in &matched {
        let cap = match m.cap {
            Some(c) => format!("{c} ({})", c.required_ability()),
            None => "no cap".to_string(),
        };
        println!(
            "  door {} [{:04X}] {} to {:04X}{}: {cap}",
            m.door_index,
            m.door.door_ptr,
            m.door.direction(),
            m.door.dest_room,
            if m.door.is_elevator() {
                " (elevator)"
            } else {
                ""
            }
        );
    }
    Ok(())
}

fn render(rom: &Rom, handle: RoomHandle, output: &Path) -> Result<()> {
    let data = load_room_data(rom, handle)
        .with_context(|| format!("No valid room at {handle:04X}"))?;
    let img = match &data.state {
        Some(state) => {
            let mut decoder = TileGraphicsDecoder::new();
            decoder.load_tileset(rom, state.tileset as usize)?;
            let tileset = decoder.tileset().context("tileset not loaded")?;
            render_room(tileset, &data.geometry)
        }
        None => {
            warn!("Room {handle:04X} has no default state; rendering an empty grid");
            RgbaImage::new(
                data.geometry.width as u32 * 16,
                data.geometry.height as u32 * 16,
            )
        }
    };
    img.save(output)
        .with_context(|| format!("Unable to write image to {}", output.display()))?;
    info!("Wrote {}", output.display());
    Ok(())
}

fn roundtrip(rom: &Rom, handle: RoomHandle) -> Result<()> {
    let data = load_room_data(rom, handle)
        .with_context(|| format!("No valid room at {handle:04X}"))?;
    ensure!(data.geometry_loaded, "Level data of room {handle:04X} is unreadable");
    let state = data
        .state
        .with_context(|| format!("Room {handle:04X} has no default state"))?;
    let addr = rom.snes2pc(state.level_data_ptr as usize);
    let original = decompress_stream(&rom.data, addr);
    let recompressed = compress(&data.geometry.encode());
    let decoded = decompress_stream(&recompressed, 0);
    if !decoded.complete || decoded.data != original.data {
        bail!("Level data of room {handle:04X} did not survive recompression");
    }
    info!(
        "Room {handle:04X}: {} bytes decompressed, {} compressed originally, {} recompressed",
        original.data.len(),
        original.compressed_size,
        recompressed.len()
    );
    Ok(())
}

fn patch(rom: &Rom, edits_path: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let options = match config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read config at {}", path.display()))?;
            parse_patch_options(&json)
                .with_context(|| format!("Unable to parse config at {}", path.display()))?
        }
        None => PatchOptions::default(),
    };
    let edits_json = std::fs::read_to_string(edits_path)
        .with_context(|| format!("Unable to read edits at {}", edits_path.display()))?;
    let edits: Vec<RoomEdit> = serde_json::from_str(&edits_json)
        .with_context(|| format!("Unable to parse edits at {}", edits_path.display()))?;
    let (patched, report) = apply_edits(rom, &edits, &options)?;
    for s in &report.skipped {
        error!("Room {:04X} not patched: {}", s.room, s.reason);
    }
    patched.save(output)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let rom = Rom::load(&args.rom)?;
    match &args.command {
        Command::Info { room } => print_info(&rom, *room)?,
        Command::Render { room, output } => render(&rom, *room, output)?,
        Command::NavGraph { output, seed } => {
            let seeds = if seed.is_empty() {
                vec![LANDING_SITE]
            } else {
                seed.clone()
            };
            let table = scan_rooms(&rom, &seeds);
            let graph = build_nav_graph(&table);
            std::fs::write(output, serde_json::to_string_pretty(&graph)?)
                .with_context(|| format!("Unable to write graph to {}", output.display()))?;
            info!(
                "Wrote {} nodes and {} edges to {}",
                graph.nodes.len(),
                graph.edges.len(),
                output.display()
            );
        }
        Command::Roundtrip { room } => roundtrip(&rom, *room)?,
        Command::Patch {
            edits,
            output,
            config,
        } => patch(&rom, edits, output, config.as_deref())?,
    }
    Ok(())
}
