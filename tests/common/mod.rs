//! A minimal GSD writer to produce trajectories for the tests.
#![allow(dead_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

const MAGIC: u64 = 0x65DF_65DF_65DF_65DF;

const TYPE_U32: u8 = 3;
const TYPE_U64: u8 = 4;
const TYPE_I32: u8 = 7;
const TYPE_F32: u8 = 9;
const TYPE_F64: u8 = 10;

const fn version(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

/// Deterministic position of particle `atom` in frame `frame`.
pub fn position(frame: usize, atom: usize) -> [f32; 3] {
    let base = frame as f32 + atom as f32 * 0.25;
    [base, base + 0.5, base - 0.5]
}

pub fn velocity(frame: usize, atom: usize) -> [f32; 3] {
    [atom as f32, -(frame as f32), 1.0]
}

pub fn image(frame: usize, atom: usize) -> [i32; 3] {
    [frame as i32, -(atom as i32), 0]
}

/// The contents of a single frame. Any field that is [`None`] is not written.
#[derive(Debug, Default, Clone)]
pub struct TestFrame {
    pub step: Option<u64>,
    pub boxdim: Option<[f32; 6]>,
    pub natoms: Option<u32>,
    pub positions: Option<Vec<[f32; 3]>>,
    pub velocities: Option<Vec<[f32; 3]>>,
    pub images: Option<Vec<[i32; 3]>>,
    /// Store positions as doubles rather than floats.
    pub double_positions: bool,
}

impl TestFrame {
    /// A frame in which every chunk is written.
    pub fn full(frame: usize, natoms: usize) -> Self {
        Self {
            step: Some(frame as u64 * 100),
            boxdim: Some([10.0, 11.0, 12.0, 0.1 * frame as f32, 0.0, 0.0]),
            natoms: Some(natoms as u32),
            positions: Some((0..natoms).map(|atom| position(frame, atom)).collect()),
            velocities: Some((0..natoms).map(|atom| velocity(frame, atom)).collect()),
            images: Some((0..natoms).map(|atom| image(frame, atom)).collect()),
            double_positions: false,
        }
    }

    fn chunks(&self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        if let Some(step) = self.step {
            chunks.push(Chunk::new("configuration/step", TYPE_U64, 1, 1, |d| {
                d.write_u64::<LittleEndian>(step)
            }));
        }
        if let Some(boxdim) = self.boxdim {
            chunks.push(Chunk::new("configuration/box", TYPE_F32, 6, 1, |d| {
                boxdim
                    .iter()
                    .try_for_each(|&v| d.write_f32::<LittleEndian>(v))
            }));
        }
        if let Some(natoms) = self.natoms {
            chunks.push(Chunk::new("particles/N", TYPE_U32, 1, 1, |d| {
                d.write_u32::<LittleEndian>(natoms)
            }));
        }
        if let Some(positions) = &self.positions {
            let n = positions.len() as u64;
            let values = positions.iter().flatten();
            let chunk = if self.double_positions {
                Chunk::new("particles/position", TYPE_F64, n, 3, |d| {
                    values
                        .clone()
                        .try_for_each(|&v| d.write_f64::<LittleEndian>(v as f64))
                })
            } else {
                Chunk::new("particles/position", TYPE_F32, n, 3, |d| {
                    values
                        .clone()
                        .try_for_each(|&v| d.write_f32::<LittleEndian>(v))
                })
            };
            chunks.push(chunk);
        }
        if let Some(velocities) = &self.velocities {
            let n = velocities.len() as u64;
            chunks.push(Chunk::new("particles/velocity", TYPE_F32, n, 3, |d| {
                velocities
                    .iter()
                    .flatten()
                    .try_for_each(|&v| d.write_f32::<LittleEndian>(v))
            }));
        }
        if let Some(images) = &self.images {
            let n = images.len() as u64;
            chunks.push(Chunk::new("particles/image", TYPE_I32, n, 3, |d| {
                images
                    .iter()
                    .flatten()
                    .try_for_each(|&v| d.write_i32::<LittleEndian>(v))
            }));
        }
        chunks
    }
}

struct Chunk {
    name: &'static str,
    ty: u8,
    n: u64,
    m: u32,
    data: Vec<u8>,
}

impl Chunk {
    fn new(
        name: &'static str,
        ty: u8,
        n: u64,
        m: u32,
        fill: impl FnOnce(&mut Vec<u8>) -> io::Result<()>,
    ) -> Self {
        let mut data = Vec::new();
        fill(&mut data).expect("writing into a Vec cannot fail");
        Self {
            name,
            ty,
            n,
            m,
            data,
        }
    }
}

/// Options for the file layout.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Major version of the file layout, 1 or 2.
    pub major: u16,
    pub schema: &'static str,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            major: 2,
            schema: "hoomd",
        }
    }
}

/// Write `frames` as a HOOMD GSD file.
pub fn write_gsd(path: impl AsRef<Path>, frames: &[TestFrame]) -> io::Result<()> {
    write_gsd_with(path, frames, &Layout::default())
}

pub fn write_gsd_with(
    path: impl AsRef<Path>,
    frames: &[TestFrame],
    layout: &Layout,
) -> io::Result<()> {
    let mut names: Vec<&'static str> = Vec::new();
    let mut buf = vec![0u8; 256];
    let mut index = Vec::new();

    for (frame, test_frame) in frames.iter().enumerate() {
        for chunk in test_frame.chunks() {
            let id = match names.iter().position(|&n| n == chunk.name) {
                Some(id) => id,
                None => {
                    names.push(chunk.name);
                    names.len() - 1
                }
            };
            index.push((frame as u64, chunk.n, buf.len() as i64, chunk.m, id as u16, chunk.ty));
            buf.extend_from_slice(&chunk.data);
        }
    }

    // Leave a few unused entries at the end, as GSD does when it preallocates the index.
    let index_location = buf.len() as u64;
    let index_allocated = index.len() as u64 + 2;
    for &(frame, n, location, m, id, ty) in &index {
        buf.write_u64::<LittleEndian>(frame)?;
        buf.write_u64::<LittleEndian>(n)?;
        buf.write_i64::<LittleEndian>(location)?;
        buf.write_u32::<LittleEndian>(m)?;
        buf.write_u16::<LittleEndian>(id)?;
        buf.write_u8(ty)?;
        buf.write_u8(0)?;
    }
    buf.extend_from_slice(&[0u8; 64]);

    let namelist_location = buf.len() as u64;
    let namelist_allocated = match layout.major {
        1 => {
            for name in &names {
                let mut entry = [0u8; 64];
                entry[..name.len()].copy_from_slice(name.as_bytes());
                buf.extend_from_slice(&entry);
            }
            buf.extend_from_slice(&[0u8; 64]);
            names.len() as u64 + 1
        }
        _ => {
            let start = buf.len();
            for name in &names {
                buf.extend_from_slice(name.as_bytes());
                buf.push(0);
            }
            buf.extend_from_slice(&[0u8; 8]);
            (buf.len() - start) as u64
        }
    };

    let mut header = Vec::with_capacity(256);
    header.write_u64::<LittleEndian>(MAGIC)?;
    header.write_u64::<LittleEndian>(index_location)?;
    header.write_u64::<LittleEndian>(index_allocated)?;
    header.write_u64::<LittleEndian>(namelist_location)?;
    header.write_u64::<LittleEndian>(namelist_allocated)?;
    header.write_u32::<LittleEndian>(version(1, 4))?;
    header.write_u32::<LittleEndian>(version(layout.major, 0))?;
    let mut application = [0u8; 64];
    application[..13].copy_from_slice(b"gsdread tests");
    header.extend_from_slice(&application);
    let mut schema = [0u8; 64];
    schema[..layout.schema.len()].copy_from_slice(layout.schema.as_bytes());
    header.extend_from_slice(&schema);
    header.resize(256, 0);
    buf[..256].copy_from_slice(&header);

    let mut file = std::fs::File::create(path)?;
    file.write_all(&buf)?;
    file.flush()
}

/// A temporary directory that holds a trajectory called `trajectory.gsd`.
pub struct Fixture {
    _dir: tempfile::TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn new(frames: &[TestFrame]) -> io::Result<Self> {
        Self::with_layout(frames, &Layout::default())
    }

    pub fn with_layout(frames: &[TestFrame], layout: &Layout) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("trajectory.gsd");
        write_gsd_with(&path, frames, layout)?;
        Ok(Self { _dir: dir, path })
    }

    /// A trajectory of `nframes` full frames with `natoms` particles each.
    pub fn uniform(nframes: usize, natoms: usize) -> io::Result<Self> {
        let frames: Vec<_> = (0..nframes).map(|f| TestFrame::full(f, natoms)).collect();
        Self::new(&frames)
    }
}

/// Read the little-endian `u64` at byte `offset` of the file at `path`.
pub fn read_u64_at(path: impl AsRef<Path>, offset: u64) -> io::Result<u64> {
    let bytes = std::fs::read(path)?;
    let start = offset as usize;
    Ok(LittleEndian::read_u64(&bytes[start..start + 8]))
}

/// Overwrite the little-endian `u64` at byte `offset` of the file at `path` with `value`.
pub fn patch_u64(path: impl AsRef<Path>, offset: u64, value: u64) -> io::Result<()> {
    let mut bytes = std::fs::read(&path)?;
    let start = offset as usize;
    LittleEndian::write_u64(&mut bytes[start..start + 8], value);
    std::fs::write(path, bytes)
}
