use std::cmp::min;

use hashbrown::HashMap;

const BLOCK_TYPE_RAW: u8 = 0;
const BLOCK_TYPE_BYTE_RLE: u8 = 1;
const BLOCK_TYPE_WORD_RLE: u8 = 2;
const BLOCK_TYPE_INCREMENTING: u8 = 3;
const BLOCK_TYPE_ABSOLUTE_COPY: u8 = 4;
const BLOCK_TYPE_RELATIVE_COPY: u8 = 6;

const MAX_BLOCK_SIZE: usize = 1024;
// Number of earlier positions with the same 3-byte prefix tried per match search.
const MAX_CHAIN_CANDIDATES: usize = 64;

fn encode_block_header(size: usize, block_type: u8, out: &mut Vec<u8>) {
    assert!(size >= 1);
    assert!(size <= MAX_BLOCK_SIZE);
    let size1 = size - 1;
    if size1 <= 31 {
        out.push(size1 as u8 | (block_type << 5));
    } else {
        out.push(0xE0 | (block_type << 2) | ((size1 >> 8) as u8));
        out.push((size1 & 0xFF) as u8);
    }
}

fn header_size(size: usize) -> usize {
    if size <= 32 {
        1
    } else {
        2
    }
}

fn encode_raw_block(data: &[u8], out: &mut Vec<u8>) {
    for block in data.chunks(MAX_BLOCK_SIZE) {
        encode_block_header(block.len(), BLOCK_TYPE_RAW, out);
        out.extend(block);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Block {
    ByteFill(u8),
    WordFill(u8, u8),
    Incrementing(u8),
    AbsoluteCopy(u16),
    RelativeCopy(u8),
}

impl Block {
    fn argument_size(self) -> usize {
        match self {
            Block::WordFill(..) | Block::AbsoluteCopy(_) => 2,
            _ => 1,
        }
    }

    fn encode(self, size: usize, out: &mut Vec<u8>) {
        match self {
            Block::ByteFill(b) => {
                encode_block_header(size, BLOCK_TYPE_BYTE_RLE, out);
                out.push(b);
            }
            Block::WordFill(b0, b1) => {
                encode_block_header(size, BLOCK_TYPE_WORD_RLE, out);
                out.extend([b0, b1]);
            }
            Block::Incrementing(b) => {
                encode_block_header(size, BLOCK_TYPE_INCREMENTING, out);
                out.push(b);
            }
            Block::AbsoluteCopy(offset) => {
                encode_block_header(size, BLOCK_TYPE_ABSOLUTE_COPY, out);
                out.extend(offset.to_le_bytes());
            }
            Block::RelativeCopy(distance) => {
                encode_block_header(size, BLOCK_TYPE_RELATIVE_COPY, out);
                out.push(distance);
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    block: Block,
    size: usize,
}

impl Candidate {
    // Bytes saved compared to storing the same data as literals.
    fn saved(&self) -> isize {
        self.size as isize - (header_size(self.size) + self.block.argument_size()) as isize
    }
}

// Positions of earlier 3-byte sequences, most recent last.
struct Dictionary {
    chains: HashMap<[u8; 3], Vec<usize>>,
}

impl Dictionary {
    fn new() -> Self {
        Dictionary {
            chains: HashMap::new(),
        }
    }

    fn insert(&mut self, data: &[u8], pos: usize) {
        if pos + 3 <= data.len() {
            let key = [data[pos], data[pos + 1], data[pos + 2]];
            self.chains.entry(key).or_default().push(pos);
        }
    }

    fn longest_match(&self, data: &[u8], pos: usize) -> Option<Candidate> {
        if pos + 3 > data.len() {
            return None;
        }
        let key = [data[pos], data[pos + 1], data[pos + 2]];
        let chain = self.chains.get(&key)?;
        let max_len = min(MAX_BLOCK_SIZE, data.len() - pos);
        let mut best: Option<Candidate> = None;
        for &start in chain.iter().rev().take(MAX_CHAIN_CANDIDATES) {
            let distance = pos - start;
            let block = if distance <= 0xFF {
                Block::RelativeCopy(distance as u8)
            } else if start <= 0xFFFF {
                Block::AbsoluteCopy(start as u16)
            } else {
                continue;
            };
            // Copies may overlap the bytes they produce, as the decoder copies forward one byte at a time.
            let mut len = 0;
            while len < max_len && data[start + len] == data[pos + len] {
                len += 1;
            }
            let candidate = Candidate { block, size: len };
            if best.map_or(true, |b| candidate.saved() > b.saved()) {
                best = Some(candidate);
            }
            if len == max_len {
                break;
            }
        }
        best
    }
}

fn run_length(data: &[u8], pos: usize, expected: impl Fn(usize) -> u8) -> usize {
    let max_len = min(MAX_BLOCK_SIZE, data.len() - pos);
    (0..max_len)
        .take_while(|&k| data[pos + k] == expected(k))
        .count()
}

fn best_block(data: &[u8], pos: usize, dict: &Dictionary) -> Option<Candidate> {
    let b0 = data[pos];
    let mut candidates: Vec<Candidate> = vec![
        Candidate {
            block: Block::ByteFill(b0),
            size: run_length(data, pos, |_| b0),
        },
        Candidate {
            block: Block::Incrementing(b0),
            size: run_length(data, pos, |k| b0.wrapping_add(k as u8)),
        },
    ];
    if pos + 1 < data.len() {
        let b1 = data[pos + 1];
        candidates.push(Candidate {
            block: Block::WordFill(b0, b1),
            size: run_length(data, pos, |k| if k % 2 == 0 { b0 } else { b1 }),
        });
    }
    if let Some(m) = dict.longest_match(data, pos) {
        candidates.push(m);
    }
    // Ties go to the earliest candidate, which decodes most cheaply.
    candidates
        .into_iter()
        .fold(None, |best: Option<Candidate>, c| match best {
            Some(b) if b.saved() >= c.saved() => Some(b),
            _ => Some(c),
        })
}

// Compress data into the format used by Super Metroid for graphics, tilemaps, level data, etc.
// This is a greedy encoder: at each position it takes whichever block saves the most bytes
// over a literal, falling back to raw blocks.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut literal_start = 0;
    let mut dict = Dictionary::new();
    let mut pos = 0;
    while pos < data.len() {
        // Interrupting a pending literal run costs an extra header byte once it resumes.
        let threshold = if literal_start < pos { 2 } else { 1 };
        match best_block(data, pos, &dict) {
            Some(c) if c.saved() >= threshold => {
                encode_raw_block(&data[literal_start..pos], &mut out);
                c.block.encode(c.size, &mut out);
                for i in pos..(pos + c.size) {
                    dict.insert(data, i);
                }
                pos += c.size;
                literal_start = pos;
            }
            _ => {
                dict.insert(data, pos);
                pos += 1;
            }
        }
    }
    encode_raw_block(&data[literal_start..], &mut out);
    out.push(0xFF);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::decompress::decompress_stream;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn round_trip(data: &[u8]) -> Vec<u8> {
        let compressed = compress(data);
        let result = decompress_stream(&compressed, 0);
        assert!(result.complete);
        assert_eq!(result.compressed_size, compressed.len());
        assert_eq!(result.data, data);
        compressed
    }

    #[test]
    fn round_trip_simple_buffers() {
        assert_eq!(round_trip(&[]), vec![0xFF]);
        round_trip(&[0x42]);
        round_trip(&[0xFF]);
        round_trip(&[0xFF; 3]);
        let zeros = round_trip(&[0; 0x10000]);
        assert!(zeros.len() < 200);
        let ones = round_trip(&[0xFF; 5000]);
        assert!(ones.len() < 20);
    }

    #[test]
    fn round_trip_random() {
        let mut rng = StdRng::seed_from_u64(0);
        for len in [1, 2, 31, 32, 33, 1023, 1024, 1025, 5000, 70000] {
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let compressed = round_trip(&data);
            // Incompressible data costs at most one or two header bytes per 1024-byte chunk.
            assert!(compressed.len() <= len + 2 * (len / 1024 + 1) + 1);
        }
    }

    #[test]
    fn round_trip_structured() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut data: Vec<u8> = Vec::new();
        while data.len() < 50000 {
            match rng.gen_range(0..5) {
                0 => data.extend(vec![rng.gen::<u8>(); rng.gen_range(1..2000)]),
                1 => {
                    let (a, b): (u8, u8) = (rng.gen(), rng.gen());
                    for k in 0..rng.gen_range(1..100) {
                        data.push(if k % 2 == 0 { a } else { b });
                    }
                }
                2 => {
                    let start: u8 = rng.gen();
                    for k in 0..rng.gen_range(1..600) {
                        data.push(start.wrapping_add(k as u8));
                    }
                }
                3 if data.len() > 10 => {
                    let from = rng.gen_range(0..data.len() - 1);
                    let len = rng.gen_range(1..300).min(data.len() - from);
                    let copy = data[from..from + len].to_vec();
                    data.extend(copy);
                }
                _ => {
                    for _ in 0..rng.gen_range(1..50) {
                        data.push(rng.gen());
                    }
                }
            }
        }
        let compressed = round_trip(&data);
        assert!(compressed.len() < data.len());
    }

    #[test]
    fn mixed_runs_compress_well() {
        let mut data: Vec<u8> = vec![7; 40];
        data.extend([1, 2].repeat(10));
        data.extend(0..20u8);
        data.extend(vec![7; 40]);
        let compressed = round_trip(&data);
        assert!(compressed.len() < 16);
    }
}
