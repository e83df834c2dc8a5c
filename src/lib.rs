// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Frame-level metadata extraction for VP9 elementary streams.
//!
//! [`codec::vp9::parser::Parser`] splits a chunk of VP9 data into its frames,
//! walks the uncompressed header of each of them and keeps the stream's codec
//! configuration up to date, from which the `vp09` codec string is rendered.

pub mod bitstream_utils;
pub mod codec;

pub use codec::vp9::parser::FrameInfo;
pub use codec::vp9::parser::Parser;
pub use codec::vp9::ParseError;
pub use codec::vpcc::VpCodecConfigurationRecord;
pub use codec::vpcc::VpxCodec;
