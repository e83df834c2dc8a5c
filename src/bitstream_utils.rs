// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::io::Cursor;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;

use anyhow::anyhow;
use anyhow::Context;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use thiserror::Error;

/// Returned by a [`BitReader`] once a read went past the end of its data.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("reader ran out of bits at position {position}")]
pub struct OutOfData {
    /// Absolute bit position at which the reader gave up.
    pub position: u64,
}

pub type ReadResult<T> = std::result::Result<T, OutOfData>;

/// A most-significant-bit-first reader for codec bitstreams.
///
/// Failures are sticky: once a read runs past the end of the data, the reader
/// is poisoned and every later read fails too, so a caller only has to check
/// the outcome of the last read (or `failed()`) to know whether the whole
/// sequence of reads was valid.
pub struct BitReader<'a> {
    inner: bitreader::BitReader<'a>,
    /// Absolute bit position of the first byte handed to `inner`.
    base: u64,
    failed: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_offset(data, 0)
    }

    /// Creates a reader whose first bit is the most significant bit of
    /// `data[offset]`. An offset past the end yields an already failed reader.
    pub fn with_offset(data: &'a [u8], offset: usize) -> Self {
        let start = offset.min(data.len());

        Self {
            inner: bitreader::BitReader::new(&data[start..]),
            base: start as u64 * 8,
            failed: offset > data.len(),
        }
    }

    /// Reads `num_bits` (1 to 32) bits as an unsigned integer.
    pub fn read_bits(&mut self, num_bits: u8) -> ReadResult<u32> {
        debug_assert!((1..=32).contains(&num_bits));

        if !self.failed {
            match self.inner.read_u32(num_bits) {
                Ok(value) => return Ok(value),
                Err(_) => self.failed = true,
            }
        }

        Err(self.out_of_data())
    }

    /// Read a single bit from the stream.
    pub fn read_bool(&mut self) -> ReadResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Skip `num_bits` bits from the stream.
    pub fn skip_bits(&mut self, num_bits: u64) -> ReadResult<()> {
        if !self.failed {
            match self.inner.skip(num_bits) {
                Ok(()) => return Ok(()),
                Err(_) => self.failed = true,
            }
        }

        Err(self.out_of_data())
    }

    /// Moves the position up to the next multiple of 8 bits.
    pub fn byte_align(&mut self) -> ReadResult<()> {
        let padding = (8 - self.position() % 8) % 8;

        if padding > 0 {
            self.skip_bits(padding)
        } else if self.failed {
            Err(self.out_of_data())
        } else {
            Ok(())
        }
    }

    /// Return the absolute position of this bitstream in bits.
    pub fn position(&self) -> u64 {
        self.base + self.inner.position()
    }

    /// Returns the amount of bits left in the stream.
    pub fn num_bits_left(&self) -> u64 {
        if self.failed {
            0
        } else {
            self.inner.remaining()
        }
    }

    /// Whether any read on this reader has failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    fn out_of_data(&self) -> OutOfData {
        OutOfData {
            position: self.position(),
        }
    }
}

/// The 32-byte header found at the start of an IVF file.
///
/// IVF is only handled so test streams and fuzzing inputs can reach the VP9
/// parser, which itself works on bare chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IvfFileHeader {
    pub version: u16,
    pub header_size: u16,
    pub codec: [u8; 4],
    pub width: u16,
    pub height: u16,
    pub framerate: u32,
    pub timescale: u32,
    pub frame_count: u32,
}

impl IvfFileHeader {
    pub const MAGIC: [u8; 4] = *b"DKIF";
    pub const CODEC_VP8: [u8; 4] = *b"VP80";
    pub const CODEC_VP9: [u8; 4] = *b"VP90";
    pub const SIZE: usize = 32;

    pub fn new(codec: [u8; 4], width: u16, height: u16, framerate: u32, frame_count: u32) -> Self {
        Self {
            version: 0,
            header_size: Self::SIZE as u16,
            codec,
            width,
            height,
            framerate,
            timescale: 1,
            frame_count,
        }
    }

    pub fn parse(data: &[u8]) -> anyhow::Result<Self> {
        let mut cursor = Cursor::new(data);

        let mut magic = [0u8; 4];
        cursor
            .read_exact(&mut magic)
            .context("IVF header is too short")?;
        if magic != Self::MAGIC {
            return Err(anyhow!("Not an IVF file: unexpected signature {:?}", magic));
        }

        let version = cursor.read_u16::<LittleEndian>()?;
        let header_size = cursor.read_u16::<LittleEndian>()?;
        let mut codec = [0u8; 4];
        cursor.read_exact(&mut codec)?;
        let width = cursor.read_u16::<LittleEndian>()?;
        let height = cursor.read_u16::<LittleEndian>()?;
        let framerate = cursor.read_u32::<LittleEndian>()?;
        let timescale = cursor.read_u32::<LittleEndian>()?;
        let frame_count = cursor
            .read_u32::<LittleEndian>()
            .context("IVF header is too short")?;

        if usize::from(header_size) < Self::SIZE {
            return Err(anyhow!("Broken IVF header: header size {}", header_size));
        }

        Ok(Self {
            version,
            header_size,
            codec,
            width,
            height,
            framerate,
            timescale,
            frame_count,
        })
    }

    /// Writes header into writer
    pub fn write_into(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_all(&Self::MAGIC)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u16::<LittleEndian>(self.header_size)?;
        writer.write_all(&self.codec)?;
        writer.write_u16::<LittleEndian>(self.width)?;
        writer.write_u16::<LittleEndian>(self.height)?;
        writer.write_u32::<LittleEndian>(self.framerate)?;
        writer.write_u32::<LittleEndian>(self.timescale)?;
        writer.write_u32::<LittleEndian>(self.frame_count)?;
        // unused
        writer.write_u32::<LittleEndian>(0)?;

        Ok(())
    }
}

/// The 12-byte header preceding every packet of an IVF file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IvfFrameHeader {
    pub frame_size: u32,
    pub timestamp: u64,
}

impl IvfFrameHeader {
    /// Writes header into writer
    pub fn write_into(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_u32::<LittleEndian>(self.frame_size)?;
        writer.write_u64::<LittleEndian>(self.timestamp)?;

        Ok(())
    }
}

/// Wraps `packets` into an in-memory IVF file, each timestamped with its
/// index.
pub fn write_ivf(header: &IvfFileHeader, packets: &[&[u8]]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    header.write_into(&mut out)?;

    for (timestamp, packet) in packets.iter().enumerate() {
        let frame_size = u32::try_from(packet.len())
            .map_err(|_| std::io::Error::new(ErrorKind::InvalidInput, "IVF packet too large"))?;

        IvfFrameHeader {
            frame_size,
            timestamp: timestamp as u64,
        }
        .write_into(&mut out)?;
        out.write_all(packet)?;
    }

    Ok(out)
}

/// Iterator over IVF packets.
///
/// Iteration stops at the first packet whose header or payload is truncated.
pub struct IvfIterator<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> IvfIterator<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let header_size = IvfFileHeader::parse(data)
            .map(|hdr| u64::from(hdr.header_size))
            .unwrap_or(IvfFileHeader::SIZE as u64);

        let mut cursor = Cursor::new(data);
        // Skip the IVF header entirely.
        cursor.set_position(header_size);

        Self { cursor }
    }
}

impl<'a> Iterator for IvfIterator<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.cursor.read_u32::<LittleEndian>().ok()? as usize;
        // Skip PTS.
        let _ = self.cursor.read_u64::<LittleEndian>().ok()?;

        let start = self.cursor.position() as usize;
        let end = start.checked_add(len)?;
        let data: &'a [u8] = *self.cursor.get_ref();
        let packet = data.get(start..end)?;
        self.cursor.set_position(end as u64);

        Some(packet)
    }
}
