// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ops::Range;

use byteorder::ByteOrder;
use byteorder::LittleEndian;
use log::debug;
use log::warn;

use crate::codec::vp9::ParseError;
use crate::codec::vp9::Result;

/// Value of the three most significant bits of a superframe marker byte.
pub const SUPERFRAME_MARKER: u8 = 0b110;

/// The VP9 superframe index as per Annex B, B.2.1, B.2.2
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuperframeIndex {
    /// Specifies the size in bytes of frame number i (zero indexed) within this
    /// superframe.
    pub frame_sizes: Vec<usize>,
    /// Size of the whole index in bytes, both marker bytes included.
    pub index_size: usize,
}

impl SuperframeIndex {
    /// Looks for a superframe index at the end of `chunk`. Returns `None` when
    /// the last byte is not a superframe marker, in which case the chunk holds
    /// a single frame.
    pub fn parse(chunk: &[u8]) -> Result<Option<Self>> {
        let marker = match chunk.last() {
            Some(&marker) if marker >> 5 == SUPERFRAME_MARKER => marker,
            _ => return Ok(None),
        };

        let bytes_per_framesize = usize::from((marker >> 3) & 0x3) + 1;
        let frames_in_superframe = usize::from(marker & 0x7) + 1;
        let index_size = 2 + frames_in_superframe * bytes_per_framesize;

        if index_size > chunk.len() {
            return Err(ParseError::SuperframeIndexTruncated {
                index_size,
                chunk_size: chunk.len(),
            });
        }

        let index = &chunk[chunk.len() - index_size..];

        // The marker byte is written at both ends of the index. Since the last
        // byte already looks like a marker, a mismatch means corruption.
        if index[0] != marker {
            return Err(ParseError::SuperframeMarkerMismatch {
                leading: index[0],
                trailing: marker,
            });
        }

        let frame_sizes: Vec<usize> = index[1..index_size - 1]
            .chunks_exact(bytes_per_framesize)
            .map(|size| LittleEndian::read_uint(size, bytes_per_framesize) as usize)
            .collect();

        debug!(
            "Superframe index: {} frames, sizes {:?}",
            frames_in_superframe, frame_sizes
        );

        Ok(Some(Self {
            frame_sizes,
            index_size,
        }))
    }
}

/// Splits `chunk` into the byte ranges of the frames it carries. A chunk
/// without a superframe index yields a single range spanning all of it.
///
/// The sizes in the index are trusted as long as they stay within the bytes
/// preceding the index. Bytes left over after the last frame are not reported.
pub fn split_frames(chunk: &[u8]) -> Result<Vec<Range<usize>>> {
    let index = match SuperframeIndex::parse(chunk)? {
        Some(index) => index,
        None => return Ok(vec![0..chunk.len()]),
    };

    let available = chunk.len() - index.index_size;
    let mut frames = Vec::with_capacity(index.frame_sizes.len());
    let mut offset: usize = 0;

    for (i, &size) in index.frame_sizes.iter().enumerate() {
        let end = match offset.checked_add(size) {
            Some(end) if end <= available => end,
            _ => {
                return Err(ParseError::FrameOutOfBounds {
                    index: i,
                    offset,
                    size,
                    available,
                })
            }
        };

        frames.push(offset..end);
        offset = end;
    }

    if offset != available {
        warn!(
            "Superframe index covers {} of the {} bytes of frame data",
            offset, available
        );
    }

    Ok(frames)
}
