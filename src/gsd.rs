//! Low-level access to the GSD container format.
//!
//! A GSD file consists of a fixed-size [`Header`], a number of data chunks, an index that
//! describes where each chunk lives, and a namelist that maps chunk ids to names. Only the reading
//! side of the format is implemented here.
use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

pub const MAGIC: u64 = 0x65DF_65DF_65DF_65DF;

/// Size of a single name in the fixed-width namelist of version 1 files.
const NAME_SIZE_V1: usize = 64;

/// Pack a `major.minor` version the way GSD stores it.
pub const fn make_version(major: u16, minor: u16) -> u32 {
    ((major as u32) << 16) | minor as u32
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Returns the size in bytes of `count` records of `size` bytes at `location`, if they fit within
/// a file of `file_len` bytes.
fn check_region(
    location: u64,
    count: u64,
    size: u64,
    file_len: u64,
    what: &str,
) -> io::Result<usize> {
    count
        .checked_mul(size)
        .filter(|&nbytes| location.checked_add(nbytes).is_some_and(|end| end <= file_len))
        .and_then(|nbytes| usize::try_from(nbytes).ok())
        .ok_or_else(|| {
            invalid_data(format!(
                "{what} of {count} x {size} bytes at offset {location} does not fit in a file of \
                 {file_len} bytes"
            ))
        })
}

/// The data type of the values stored in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    U8 = 1,
    U16 = 2,
    U32 = 3,
    U64 = 4,
    I8 = 5,
    I16 = 6,
    I32 = 7,
    I64 = 8,
    F32 = 9,
    F64 = 10,
    Char = 11,
}

impl ChunkType {
    pub const fn from_u8(code: u8) -> Option<Self> {
        let ty = match code {
            1 => Self::U8,
            2 => Self::U16,
            3 => Self::U32,
            4 => Self::U64,
            5 => Self::I8,
            6 => Self::I16,
            7 => Self::I32,
            8 => Self::I64,
            9 => Self::F32,
            10 => Self::F64,
            11 => Self::Char,
            _ => return None,
        };
        Some(ty)
    }

    /// Size of a single value of this type in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Char => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: u64,
    pub index_location: u64,
    pub index_allocated_entries: u64,
    pub namelist_location: u64,
    pub namelist_allocated_entries: u64,
    pub schema_version: u32,
    pub gsd_version: u32,
    pub application: String,
    pub schema: String,
}

impl Header {
    pub const SIZE: usize = 256;

    /// Read and validate a header from the start of `file`.
    pub fn read<R: Read>(file: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        file.read_exact(&mut buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => invalid_data("file is too short to hold a GSD header"),
            _ => err,
        })?;
        Self::from_bytes(&buf)
    }

    fn from_bytes(buf: &[u8; Self::SIZE]) -> io::Result<Self> {
        let magic = LittleEndian::read_u64(&buf[0..8]);
        if magic != MAGIC {
            return Err(invalid_data(format!(
                "found invalid magic number '{magic:#0x}', this is not a GSD file"
            )));
        }

        let header = Self {
            magic,
            index_location: LittleEndian::read_u64(&buf[8..16]),
            index_allocated_entries: LittleEndian::read_u64(&buf[16..24]),
            namelist_location: LittleEndian::read_u64(&buf[24..32]),
            namelist_allocated_entries: LittleEndian::read_u64(&buf[32..40]),
            schema_version: LittleEndian::read_u32(&buf[40..44]),
            gsd_version: LittleEndian::read_u32(&buf[44..48]),
            application: c_string(&buf[48..112]),
            schema: c_string(&buf[112..176]),
        };

        match header.version() {
            (1 | 2, _) => Ok(header),
            (major, minor) => Err(invalid_data(format!(
                "unsupported GSD file layout version {major}.{minor}"
            ))),
        }
    }

    /// Returns the `(major, minor)` version of the file layout.
    pub const fn version(&self) -> (u16, u16) {
        ((self.gsd_version >> 16) as u16, self.gsd_version as u16)
    }

    /// Returns the `(major, minor)` version of the schema.
    pub const fn schema_version(&self) -> (u16, u16) {
        ((self.schema_version >> 16) as u16, self.schema_version as u16)
    }
}

/// Interpret a NUL-padded byte field as a string.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Describes a single chunk of data in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub frame: u64,
    /// Number of rows.
    pub n: u64,
    /// Byte offset of the chunk data from the start of the file.
    pub location: i64,
    /// Number of columns.
    pub m: u32,
    /// Position of the chunk's name in the namelist.
    pub id: u16,
    pub ty: ChunkType,
    pub flags: u8,
}

impl IndexEntry {
    pub const SIZE: usize = 32;

    fn from_bytes(buf: &[u8; Self::SIZE]) -> io::Result<Option<Self>> {
        let location = LittleEndian::read_i64(&buf[16..24]);
        // Unused entries at the tail of the allocated index are all zeros.
        if location == 0 {
            return Ok(None);
        }
        let code = buf[30];
        let ty = ChunkType::from_u8(code)
            .ok_or_else(|| invalid_data(format!("found invalid chunk type code {code}")))?;

        Ok(Some(Self {
            frame: LittleEndian::read_u64(&buf[0..8]),
            n: LittleEndian::read_u64(&buf[8..16]),
            location,
            m: LittleEndian::read_u32(&buf[24..28]),
            id: LittleEndian::read_u16(&buf[28..30]),
            ty,
            flags: buf[31],
        }))
    }

    /// Number of values stored in this chunk, or [`None`] if that overflows.
    pub fn len(&self) -> Option<u64> {
        self.n.checked_mul(self.m as u64)
    }

    /// Number of bytes the chunk data occupies, or [`None`] if that overflows.
    pub fn nbytes(&self) -> Option<u64> {
        self.len()?.checked_mul(self.ty.size() as u64)
    }

    /// Returns the offset and size of the chunk data, checking that it lies within the file.
    fn region(&self, file_len: u64) -> io::Result<(u64, usize)> {
        let location = u64::try_from(self.location)
            .map_err(|_| invalid_data(format!("chunk has negative location {}", self.location)))?;
        let nbytes = self.nbytes().ok_or_else(|| {
            invalid_data(format!(
                "chunk of {} x {} values of type {:?} is too large",
                self.n, self.m, self.ty
            ))
        })?;
        let nbytes = check_region(location, nbytes, 1, file_len, "chunk")?;
        Ok((location, nbytes))
    }
}

/// An open GSD file.
#[derive(Debug)]
pub struct GSDFile<R> {
    file: R,
    header: Header,
    /// Sorted by `(frame, id)`.
    index: Vec<IndexEntry>,
    names: Vec<String>,
    nframes: usize,
    /// Size of the file in bytes.
    file_len: u64,
    /// Raw chunk bytes are read into this buffer before decoding.
    scratch: Vec<u8>,
}

impl<R: Read + Seek> GSDFile<R> {
    /// Read the header, index, and namelist from `file`.
    pub fn new(mut file: R) -> io::Result<Self> {
        let file_len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut file)?;

        let mut index = read_index(&mut file, &header, file_len)?;
        index.sort_by_key(|entry| (entry.frame, entry.id));
        let names = read_namelist(&mut file, &header, file_len)?;

        if let Some(entry) = index.iter().find(|entry| entry.id as usize >= names.len()) {
            return Err(invalid_data(format!(
                "index entry refers to chunk id {} but the namelist holds {} names",
                entry.id,
                names.len()
            )));
        }

        let nframes = index.last().map_or(0, |entry| entry.frame as usize + 1);

        Ok(Self {
            file,
            header,
            index,
            names,
            nframes,
            file_len,
            scratch: Vec::new(),
        })
    }

    /// Read the data of the chunk described by `entry` and decode it as `f32` values into `out`.
    pub fn read_f32s(&mut self, entry: &IndexEntry, out: &mut Vec<f32>) -> io::Result<()> {
        self.read_raw(entry)?;
        decode_f32s(entry.ty, &self.scratch, out)
    }

    /// Read the data of the chunk described by `entry` and decode it as `i32` values into `out`.
    pub fn read_i32s(&mut self, entry: &IndexEntry, out: &mut Vec<i32>) -> io::Result<()> {
        self.read_raw(entry)?;
        decode_i32s(entry.ty, &self.scratch, out)
    }

    /// Read the data of the chunk described by `entry` and decode it as `u64` values into `out`.
    pub fn read_u64s(&mut self, entry: &IndexEntry, out: &mut Vec<u64>) -> io::Result<()> {
        self.read_raw(entry)?;
        decode_u64s(entry.ty, &self.scratch, out)
    }

    fn read_raw(&mut self, entry: &IndexEntry) -> io::Result<()> {
        let (location, nbytes) = entry.region(self.file_len)?;
        self.file.seek(SeekFrom::Start(location))?;
        self.scratch.resize(nbytes, 0);
        self.file.read_exact(&mut self.scratch)
    }
}

impl<R> GSDFile<R> {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of frames in the file.
    pub fn nframes(&self) -> usize {
        self.nframes
    }

    /// Look up the chunk called `name` in `frame`.
    pub fn find_chunk(&self, frame: usize, name: &str) -> Option<IndexEntry> {
        let id = self.names.iter().position(|n| n == name)? as u16;
        let key = (frame as u64, id);
        self.index
            .binary_search_by_key(&key, |entry| (entry.frame, entry.id))
            .ok()
            .map(|idx| self.index[idx])
    }
}

fn read_index<R: Read + Seek>(
    file: &mut R,
    header: &Header,
    file_len: u64,
) -> io::Result<Vec<IndexEntry>> {
    check_region(
        header.index_location,
        header.index_allocated_entries,
        IndexEntry::SIZE as u64,
        file_len,
        "index",
    )?;
    file.seek(SeekFrom::Start(header.index_location))?;
    let mut index = Vec::new();
    let mut buf = [0u8; IndexEntry::SIZE];
    for _ in 0..header.index_allocated_entries {
        file.read_exact(&mut buf)?;
        match IndexEntry::from_bytes(&buf)? {
            Some(entry) => {
                entry.region(file_len)?;
                index.push(entry);
            }
            None => break,
        }
    }
    Ok(index)
}

fn read_namelist<R: Read + Seek>(
    file: &mut R,
    header: &Header,
    file_len: u64,
) -> io::Result<Vec<String>> {
    let location = header.namelist_location;
    let allocated = header.namelist_allocated_entries;
    let names = match header.version() {
        (1, _) => {
            check_region(location, allocated, NAME_SIZE_V1 as u64, file_len, "namelist")?;
            file.seek(SeekFrom::Start(location))?;
            let mut names = Vec::new();
            let mut buf = [0u8; NAME_SIZE_V1];
            for _ in 0..allocated {
                file.read_exact(&mut buf)?;
                let name = c_string(&buf);
                if name.is_empty() {
                    break;
                }
                names.push(name);
            }
            names
        }
        _ => {
            let nbytes = check_region(location, allocated, 1, file_len, "namelist")?;
            file.seek(SeekFrom::Start(location))?;
            let mut buf = vec![0u8; nbytes];
            file.read_exact(&mut buf)?;
            buf.split(|&b| b == 0)
                .take_while(|name| !name.is_empty())
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .collect()
        }
    };
    Ok(names)
}

fn unconvertible(ty: ChunkType, target: &str) -> io::Error {
    invalid_data(format!("cannot interpret a chunk of type {ty:?} as {target}"))
}

fn decode_f32s(ty: ChunkType, bytes: &[u8], out: &mut Vec<f32>) -> io::Result<()> {
    let n = bytes.len() / ty.size();
    out.clear();
    match ty {
        ChunkType::F32 => {
            out.resize(n, 0.0);
            LittleEndian::read_f32_into(bytes, out);
        }
        ChunkType::F64 => {
            let mut rdr = bytes;
            for _ in 0..n {
                out.push(rdr.read_f64::<LittleEndian>()? as f32);
            }
        }
        ty => return Err(unconvertible(ty, "floating point values")),
    }
    Ok(())
}

fn decode_i32s(ty: ChunkType, bytes: &[u8], out: &mut Vec<i32>) -> io::Result<()> {
    let n = bytes.len() / ty.size();
    out.clear();
    let mut rdr = bytes;
    match ty {
        ChunkType::I32 => {
            out.resize(n, 0);
            LittleEndian::read_i32_into(bytes, out);
        }
        ChunkType::I8 => out.extend(bytes.iter().map(|&b| b as i8 as i32)),
        ChunkType::U8 => out.extend(bytes.iter().map(|&b| b as i32)),
        ChunkType::I16 => {
            for _ in 0..n {
                out.push(rdr.read_i16::<LittleEndian>()? as i32);
            }
        }
        ChunkType::U16 => {
            for _ in 0..n {
                out.push(rdr.read_u16::<LittleEndian>()? as i32);
            }
        }
        ty => return Err(unconvertible(ty, "32-bit integers")),
    }
    Ok(())
}

fn decode_u64s(ty: ChunkType, bytes: &[u8], out: &mut Vec<u64>) -> io::Result<()> {
    let n = bytes.len() / ty.size();
    out.clear();
    let mut rdr = bytes;
    match ty {
        ChunkType::U64 => {
            out.resize(n, 0);
            LittleEndian::read_u64_into(bytes, out);
        }
        ChunkType::U8 => out.extend(bytes.iter().map(|&b| b as u64)),
        ChunkType::U16 => {
            for _ in 0..n {
                out.push(rdr.read_u16::<LittleEndian>()? as u64);
            }
        }
        ChunkType::U32 => {
            for _ in 0..n {
                out.push(rdr.read_u32::<LittleEndian>()? as u64);
            }
        }
        ChunkType::I64 => {
            for _ in 0..n {
                let v = rdr.read_i64::<LittleEndian>()?;
                let v = u64::try_from(v)
                    .map_err(|_| invalid_data(format!("expected an unsigned value, found {v}")))?;
                out.push(v);
            }
        }
        ty => return Err(unconvertible(ty, "unsigned integers")),
    }
    Ok(())
}
