//! On-disk framing shared by the builder and the reader.
//!
//! A table file is a sequence of blocks, each followed by a 5-byte trailer,
//! with a fixed-size footer at the end of the file:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ block body (possibly compressed)             │
//! │ trailer: type (u8) | masked crc32 (u32 LE)   │
//! │ ... more blocks ...                          │
//! ├──────────────────────────────────────────────┤
//! │ FOOTER (always last 48 bytes)                │
//! │   metaindex handle (varint64 offset, size)   │
//! │   index handle (varint64 offset, size)       │
//! │   zero padding to 40 bytes                   │
//! │   magic: u64 LE = 0xdb4775248b80fb57         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The stored CRC is masked (rotate right 15, add a constant) so that files
//! containing embedded CRCs of their own don't collide with ours.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher as Crc32;
use integer_encoding::VarInt;

use crate::error::{Error, Result};
use crate::file::RandomAccessFile;
use crate::options::ReadOptions;

/// Bytes appended after every block body: 1-byte type + 4-byte masked CRC.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Largest varint64 encoding is 10 bytes; a handle holds two of them.
pub const MAX_ENCODED_HANDLE_LENGTH: usize = 10 + 10;

/// Fixed footer size: two maximally-padded handles plus the 8-byte magic.
pub const FOOTER_ENCODED_LENGTH: usize = 2 * MAX_ENCODED_HANDLE_LENGTH + 8;

/// Sentinel identifying a table file.
pub const TABLE_MAGIC_NUMBER: u64 = 0xdb4775248b80fb57;

const MASK_DELTA: u32 = 0xa282ead8;

/// Masks a CRC before it is stored in a block trailer.
pub fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Reverses [`mask_crc`].
pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

/// How a block body is encoded on disk. The trailer's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
}

/// Location of a block inside the file. `size` excludes the trailer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Appends the varint encoding of this handle to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.offset.encode_var_vec());
        dst.extend_from_slice(&self.size.encode_var_vec());
    }

    /// Decodes a handle from the front of `src`, returning it together with
    /// the number of bytes consumed. Trailing bytes are left untouched so
    /// callers may store extra data after a handle.
    pub fn decode_from(src: &[u8]) -> Result<(Self, usize)> {
        let (offset, n1) =
            u64::decode_var(src).ok_or_else(|| Error::corruption("bad block handle"))?;
        let (size, n2) =
            u64::decode_var(&src[n1..]).ok_or_else(|| Error::corruption("bad block handle"))?;
        Ok((Self { offset, size }, n1 + n2))
    }
}

/// The fixed-size footer at the end of every table file.
#[derive(Debug, Clone, Copy)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    /// Appends the fixed 48-byte encoding to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        let base = dst.len();
        self.metaindex_handle.encode_to(dst);
        self.index_handle.encode_to(dst);
        dst.resize(base + 2 * MAX_ENCODED_HANDLE_LENGTH, 0);
        let mut magic = [0u8; 8];
        LittleEndian::write_u64(&mut magic, TABLE_MAGIC_NUMBER);
        dst.extend_from_slice(&magic);
        debug_assert_eq!(dst.len() - base, FOOTER_ENCODED_LENGTH);
    }

    /// Decodes a footer from exactly [`FOOTER_ENCODED_LENGTH`] bytes.
    pub fn decode_from(src: &[u8]) -> Result<Self> {
        if src.len() != FOOTER_ENCODED_LENGTH {
            return Err(Error::corruption("bad footer length"));
        }
        let magic = LittleEndian::read_u64(&src[FOOTER_ENCODED_LENGTH - 8..]);
        if magic != TABLE_MAGIC_NUMBER {
            return Err(Error::corruption("not an sstable (bad magic number)"));
        }
        let (metaindex_handle, n) = BlockHandle::decode_from(src)?;
        let (index_handle, _) = BlockHandle::decode_from(&src[n..])?;
        Ok(Self {
            metaindex_handle,
            index_handle,
        })
    }
}

/// A block body read off disk, ready to be parsed.
#[derive(Debug)]
pub struct BlockContents {
    pub data: Vec<u8>,
    /// Whether the bytes may be inserted into the block cache. Always true
    /// for file-backed reads; kept as a field so alternative file sources
    /// (arena- or mmap-backed) can opt out.
    pub cachable: bool,
}

/// Reads the block identified by `handle`, verifies its trailer and undoes
/// any compression.
pub fn read_block(
    file: &dyn RandomAccessFile,
    options: &ReadOptions,
    handle: &BlockHandle,
) -> Result<BlockContents> {
    let n = handle.size as usize;
    let mut raw = file.read(handle.offset, n + BLOCK_TRAILER_SIZE)?;
    if raw.len() != n + BLOCK_TRAILER_SIZE {
        return Err(Error::corruption("truncated block read"));
    }

    if options.verify_checksums {
        let stored = unmask_crc(LittleEndian::read_u32(&raw[n + 1..]));
        let mut hasher = Crc32::new();
        hasher.update(&raw[..n + 1]); // body plus type byte
        if hasher.finalize() != stored {
            return Err(Error::corruption("block checksum mismatch"));
        }
    }

    match raw[n] {
        t if t == CompressionType::None as u8 => {
            raw.truncate(n);
            Ok(BlockContents {
                data: raw,
                cachable: true,
            })
        }
        t if t == CompressionType::Snappy as u8 => {
            let data = snap::raw::Decoder::new()
                .decompress_vec(&raw[..n])
                .map_err(|_| Error::corruption("corrupted compressed block contents"))?;
            Ok(BlockContents {
                data,
                cachable: true,
            })
        }
        _ => Err(Error::corruption("bad block type")),
    }
}
