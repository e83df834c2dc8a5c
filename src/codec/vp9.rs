// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

use crate::bitstream_utils::OutOfData;

pub mod parser;
pub mod superframe;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Reasons a VP9 chunk can fail to parse. Any of them fails the whole chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("broken stream: expected frame marker, found {0:#b}")]
    InvalidFrameMarker(u32),
    #[error("broken stream: expected sync code 0x498342, found {0:#08x}")]
    InvalidSyncCode(u32),
    #[error("broken stream: reserved bit set in {0}")]
    ReservedBitViolation(&'static str),
    #[error("broken stream: ran out of header data at bit {position}")]
    InsufficientHeaderBytes { position: u64 },
    #[error("broken stream: superframe index starts with {leading:#04x} but ends with {trailing:#04x}")]
    SuperframeMarkerMismatch { leading: u8, trailing: u8 },
    #[error("broken stream: superframe index of {index_size} bytes in a {chunk_size} byte chunk")]
    SuperframeIndexTruncated { index_size: usize, chunk_size: usize },
    #[error("broken stream: frame {index} ({size} bytes at offset {offset}) overruns {available} bytes of frame data")]
    FrameOutOfBounds {
        index: usize,
        offset: usize,
        size: usize,
        available: usize,
    },
    #[error("broken stream: compressed header of {header_size} bytes, only {available} bytes left in the frame")]
    CompressedHeaderTruncated { header_size: u16, available: usize },
}

impl From<OutOfData> for ParseError {
    fn from(err: OutOfData) -> Self {
        ParseError::InsufficientHeaderBytes {
            position: err.position,
        }
    }
}
