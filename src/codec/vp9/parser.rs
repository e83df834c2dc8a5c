// Copyright 2022 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use log::debug;
use log::trace;

use crate::bitstream_utils::BitReader;
use crate::codec::vp9::superframe::split_frames;
use crate::codec::vp9::ParseError;
use crate::codec::vp9::Result;
use crate::codec::vpcc::ChromaSubsampling;
use crate::codec::vpcc::VpCodecConfigurationRecord;

pub const REFS_PER_FRAME: usize = 3;

pub const MAX_REF_LF_DELTAS: usize = 4;
pub const MAX_MODE_LF_DELTAS: usize = 2;

pub const MAX_SEGMENTS: usize = 8;
pub const SEG_TREE_PROBS: usize = MAX_SEGMENTS - 1;
pub const PREDICTION_PROBS: usize = 3;
pub const SEG_LVL_MAX: usize = 4;

pub const REF_FRAMES_LOG2: usize = 3;
pub const REF_FRAMES: usize = 1 << REF_FRAMES_LOG2;

pub const FRAME_MARKER: u32 = 0x02;
pub const SYNC_CODE: u32 = 0x498342;

pub const MIN_TILE_WIDTH_B64: u32 = 4;
pub const MAX_TILE_WIDTH_B64: u32 = 64;

/// The `color_space` value signaling RGB.
pub const CS_RGB: u8 = 7;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameType {
    #[default]
    KeyFrame = 0,
    InterFrame = 1,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Profile0 = 0,
    Profile1 = 1,
    Profile2 = 2,
    Profile3 = 3,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BitDepth {
    #[default]
    Depth8 = 8,
    Depth10 = 10,
    Depth12 = 12,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ColorRange {
    #[default]
    StudioSwing = 0,
    FullSwing = 1,
}

/// The color_config() syntax of key frames and non-profile-0 intra-only
/// frames.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorConfig {
    /// The bit depth of the frame.
    pub bit_depth: BitDepth,
    /// The raw `color_space` syntax element.
    pub color_space: u8,
    /// Specifies the black level and range of the luma and chroma signals as
    /// specified in Rec. ITU-R BT.709-6 and Rec. ITU-R BT.2020-2
    pub color_range: ColorRange,
    /// Specifies the chroma subsampling format.
    pub subsampling_x: bool,
    /// Specifies the chroma subsampling format.
    pub subsampling_y: bool,
}

/// The fields of a VP9 uncompressed header that describe a frame. The rest of
/// the header is walked but not kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    /// A subset of syntax, semantics and algorithms defined in a part.
    pub profile: Profile,
    /// Indicates the frame indexed by frame_to_show_map_idx is to be displayed.
    /// If unset, indicates that further processing is required.
    pub show_existing_frame: bool,
    /// Specifies the frame to be displayed. It is only available if
    /// show_existing_frame is set.
    pub frame_to_show_map_idx: u8,
    /// Indicates whether a frame is a key frame.
    pub frame_type: FrameType,
    /// Whether this frame should be displayed.
    pub show_frame: bool,
    /// Whether error resilient mode is enabled.
    pub error_resilient_mode: bool,
    /// If set, indicates that this frame is an intra-only frame. If unset,
    /// indicates that this frame is a inter frame.
    pub intra_only: bool,
    /// Present for key frames and intra-only frames.
    pub color_config: Option<ColorConfig>,
    /// The width of the frame in pixels, or 0 if the frame takes its size from
    /// a reference frame.
    pub width: u32,
    /// The height of the frame in pixels, or 0 if the frame takes its size
    /// from a reference frame.
    pub height: u32,
    /// Indicates the size of the compressed header in bytes.
    pub header_size_in_bytes: u16,
    /// Indicates the size of the uncompressed header in bytes.
    pub uncompressed_header_size_in_bytes: usize,
}

impl Header {
    pub fn is_key_frame(&self) -> bool {
        !self.show_existing_frame && matches!(self.frame_type, FrameType::KeyFrame)
    }
}

/// Structural information about one frame of a chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Size of the frame in bytes, superframe index excluded.
    pub frame_size: usize,
    /// Size of the uncompressed header in bytes, `header_size_in_bytes`
    /// included.
    pub uncompressed_header_size: usize,
    pub is_key_frame: bool,
    /// Only known for key frames and intra-only frames, 0 otherwise.
    pub width: u32,
    /// Only known for key frames and intra-only frames, 0 otherwise.
    pub height: u32,
}

/// A VP9 bitstream parser.
///
/// The parser keeps the codec configuration of the last key frame and the
/// width of the last frame that coded its size, so successive chunks of one
/// stream must go through the same instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parser {
    codec_config: VpCodecConfigurationRecord,
    /// Width of the last frame that coded its size explicitly. Frames that
    /// take their size from a reference lay out their tiles with it.
    last_width: u32,
}

impl Parser {
    /// The codec configuration of the most recently parsed key frame.
    pub fn codec_config(&self) -> &VpCodecConfigurationRecord {
        &self.codec_config
    }

    fn parse_frame_marker(r: &mut BitReader) -> Result<()> {
        let marker = r.read_bits(2)?;

        if marker != FRAME_MARKER {
            return Err(ParseError::InvalidFrameMarker(marker));
        }

        Ok(())
    }

    fn parse_reserved_zero(r: &mut BitReader, syntax: &'static str) -> Result<()> {
        if r.read_bool()? {
            return Err(ParseError::ReservedBitViolation(syntax));
        }

        Ok(())
    }

    fn parse_profile(r: &mut BitReader) -> Result<Profile> {
        let low = r.read_bool()?;
        let high = r.read_bool()?;

        let profile = match (high, low) {
            (false, false) => Profile::Profile0,
            (false, true) => Profile::Profile1,
            (true, false) => Profile::Profile2,
            (true, true) => Profile::Profile3,
        };

        if profile == Profile::Profile3 {
            Self::parse_reserved_zero(r, "profile")?;
        }

        Ok(profile)
    }

    fn parse_frame_sync_code(r: &mut BitReader) -> Result<()> {
        let sync_code = r.read_bits(24)?;

        if sync_code != SYNC_CODE {
            return Err(ParseError::InvalidSyncCode(sync_code));
        }

        Ok(())
    }

    fn parse_color_config(r: &mut BitReader, profile: Profile) -> Result<ColorConfig> {
        let bit_depth = if matches!(profile, Profile::Profile2 | Profile::Profile3) {
            let ten_or_twelve_bit = r.read_bool()?;
            if ten_or_twelve_bit {
                BitDepth::Depth12
            } else {
                BitDepth::Depth10
            }
        } else {
            BitDepth::Depth8
        };

        let mut cfg = ColorConfig {
            bit_depth,
            color_space: r.read_bits(3)? as u8,
            ..Default::default()
        };

        if cfg.color_space != CS_RGB {
            cfg.color_range = if r.read_bool()? {
                ColorRange::FullSwing
            } else {
                ColorRange::StudioSwing
            };

            if matches!(profile, Profile::Profile1 | Profile::Profile3) {
                cfg.subsampling_x = r.read_bool()?;
                cfg.subsampling_y = r.read_bool()?;
                Self::parse_reserved_zero(r, "color_config")?;
            } else {
                cfg.subsampling_x = true;
                cfg.subsampling_y = true;
            }
        } else {
            cfg.color_range = ColorRange::FullSwing;
            if matches!(profile, Profile::Profile1 | Profile::Profile3) {
                Self::parse_reserved_zero(r, "color_config")?;
            }
        }

        Ok(cfg)
    }

    fn parse_frame_size(r: &mut BitReader) -> Result<(u32, u32)> {
        let width = r.read_bits(16)? + 1;
        let height = r.read_bits(16)? + 1;

        Ok((width, height))
    }

    fn skip_render_size(r: &mut BitReader) -> Result<()> {
        let render_and_frame_size_different = r.read_bool()?;
        if render_and_frame_size_different {
            // render_width_minus_1, render_height_minus_1
            r.skip_bits(32)?;
        }

        Ok(())
    }

    /// Returns the explicitly coded frame size, or `None` if the frame copies
    /// the size of one of its references.
    fn parse_frame_size_with_refs(r: &mut BitReader) -> Result<Option<(u32, u32)>> {
        let mut found_ref = false;

        for _ in 0..REFS_PER_FRAME {
            found_ref = r.read_bool()?;
            if found_ref {
                break;
            }
        }

        let size = if found_ref {
            None
        } else {
            Some(Self::parse_frame_size(r)?)
        };

        Self::skip_render_size(r)?;

        Ok(size)
    }

    fn skip_interpolation_filter(r: &mut BitReader) -> Result<()> {
        let is_filter_switchable = r.read_bool()?;
        if !is_filter_switchable {
            // raw_interpolation_filter
            r.skip_bits(2)?;
        }

        Ok(())
    }

    fn skip_loop_filter_params(r: &mut BitReader) -> Result<()> {
        // loop_filter_level, loop_filter_sharpness
        r.skip_bits(6 + 3)?;

        let delta_enabled = r.read_bool()?;
        if delta_enabled {
            let delta_update = r.read_bool()?;
            if delta_update {
                for _ in 0..MAX_REF_LF_DELTAS + MAX_MODE_LF_DELTAS {
                    let update_delta = r.read_bool()?;
                    if update_delta {
                        // su(6)
                        r.skip_bits(6 + 1)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn skip_quantization_params(r: &mut BitReader) -> Result<()> {
        // base_q_idx
        r.skip_bits(8)?;

        // delta_q_y_dc, delta_q_uv_dc, delta_q_uv_ac
        for _ in 0..3 {
            let delta_coded = r.read_bool()?;
            if delta_coded {
                // su(4)
                r.skip_bits(4 + 1)?;
            }
        }

        Ok(())
    }

    fn skip_prob(r: &mut BitReader) -> Result<()> {
        let prob_coded = r.read_bool()?;
        if prob_coded {
            r.skip_bits(8)?;
        }

        Ok(())
    }

    fn skip_segmentation_params(r: &mut BitReader) -> Result<()> {
        const SEGMENTATION_FEATURE_BITS: [u64; SEG_LVL_MAX] = [8, 6, 2, 0];
        const SEGMENTATION_FEATURE_SIGNED: [bool; SEG_LVL_MAX] = [true, true, false, false];

        let enabled = r.read_bool()?;
        if !enabled {
            return Ok(());
        }

        let update_map = r.read_bool()?;
        if update_map {
            for _ in 0..SEG_TREE_PROBS {
                Self::skip_prob(r)?;
            }

            let temporal_update = r.read_bool()?;
            if temporal_update {
                for _ in 0..PREDICTION_PROBS {
                    Self::skip_prob(r)?;
                }
            }
        }

        let update_data = r.read_bool()?;
        if update_data {
            // segmentation_abs_or_delta_update
            r.skip_bits(1)?;

            for _ in 0..MAX_SEGMENTS {
                for j in 0..SEG_LVL_MAX {
                    let feature_enabled = r.read_bool()?;
                    if feature_enabled {
                        let sign_bits = u64::from(SEGMENTATION_FEATURE_SIGNED[j]);
                        r.skip_bits(SEGMENTATION_FEATURE_BITS[j] + sign_bits)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn calc_min_log2_tile_cols(sb64_cols: u32) -> u32 {
        let mut min_log2 = 0;

        while (MAX_TILE_WIDTH_B64 << min_log2) < sb64_cols {
            min_log2 += 1;
        }

        min_log2
    }

    fn calc_max_log2_tile_cols(sb64_cols: u32) -> u32 {
        let mut max_log2 = 1;

        while (sb64_cols >> max_log2) >= MIN_TILE_WIDTH_B64 {
            max_log2 += 1;
        }

        max_log2 - 1
    }

    fn skip_tile_info(r: &mut BitReader, width: u32) -> Result<()> {
        let mi_cols = (width + 7) >> 3;
        let sb64_cols = (mi_cols + 7) >> 3;

        let min_log2_tile_cols = Self::calc_min_log2_tile_cols(sb64_cols);
        let max_log2_tile_cols = Self::calc_max_log2_tile_cols(sb64_cols);

        let mut tile_cols_log2 = min_log2_tile_cols;
        while tile_cols_log2 < max_log2_tile_cols {
            let increment_tile_cols_log2 = r.read_bool()?;
            if increment_tile_cols_log2 {
                tile_cols_log2 += 1;
            } else {
                break;
            }
        }

        let tile_rows_log2 = r.read_bool()?;
        if tile_rows_log2 {
            // increment_tile_rows_log2
            r.skip_bits(1)?;
        }

        Ok(())
    }

    /// Parses the uncompressed header at the start of `data`, which must hold
    /// exactly one frame. The parser state is left untouched.
    pub fn parse_uncompressed_header(&self, data: &[u8]) -> Result<Header> {
        self.parse_header_at(data, 0)
    }

    /// Parses the header of the frame starting at byte `offset` of `data` and
    /// running up to its end.
    fn parse_header_at(&self, data: &[u8], offset: usize) -> Result<Header> {
        let mut r = BitReader::with_offset(data, offset);
        let mut hdr = Header::default();

        Self::parse_frame_marker(&mut r)?;
        hdr.profile = Self::parse_profile(&mut r)?;

        hdr.show_existing_frame = r.read_bool()?;

        if hdr.show_existing_frame {
            hdr.frame_to_show_map_idx = r.read_bits(3)? as u8;
            r.byte_align()?;
            hdr.uncompressed_header_size_in_bytes = (r.position() / 8) as usize - offset;
            return Ok(hdr);
        }

        hdr.frame_type = if r.read_bool()? {
            FrameType::InterFrame
        } else {
            FrameType::KeyFrame
        };

        hdr.show_frame = r.read_bool()?;
        hdr.error_resilient_mode = r.read_bool()?;

        // Frames that copy their size from a reference lay out their tiles
        // with the last coded width.
        let mut tile_width = self.last_width;

        if matches!(hdr.frame_type, FrameType::KeyFrame) {
            Self::parse_frame_sync_code(&mut r)?;
            hdr.color_config = Some(Self::parse_color_config(&mut r, hdr.profile)?);
            (hdr.width, hdr.height) = Self::parse_frame_size(&mut r)?;
            Self::skip_render_size(&mut r)?;
            tile_width = hdr.width;
        } else {
            if !hdr.show_frame {
                hdr.intra_only = r.read_bool()?;
            }

            if !hdr.error_resilient_mode {
                // reset_frame_context
                r.skip_bits(2)?;
            }

            if hdr.intra_only {
                Self::parse_frame_sync_code(&mut r)?;

                let color_config = if !matches!(hdr.profile, Profile::Profile0) {
                    Self::parse_color_config(&mut r, hdr.profile)?
                } else {
                    // Profile 0 intra-only frames are always 8-bit 4:2:0 and
                    // do not signal a color space.
                    ColorConfig {
                        bit_depth: BitDepth::Depth8,
                        color_space: self.codec_config.color_space,
                        color_range: ColorRange::StudioSwing,
                        subsampling_x: true,
                        subsampling_y: true,
                    }
                };
                hdr.color_config = Some(color_config);

                // refresh_frame_flags
                r.skip_bits(REF_FRAMES as u64)?;
                (hdr.width, hdr.height) = Self::parse_frame_size(&mut r)?;
                Self::skip_render_size(&mut r)?;
                tile_width = hdr.width;
            } else {
                // refresh_frame_flags
                r.skip_bits(REF_FRAMES as u64)?;
                // ref_frame_idx[i] and ref_frame_sign_bias for each reference
                r.skip_bits((REFS_PER_FRAME * (REF_FRAMES_LOG2 + 1)) as u64)?;

                if let Some((width, height)) = Self::parse_frame_size_with_refs(&mut r)? {
                    hdr.width = width;
                    hdr.height = height;
                    tile_width = width;
                }

                // allow_high_precision_mv
                r.skip_bits(1)?;
                Self::skip_interpolation_filter(&mut r)?;
            }
        }

        if !hdr.error_resilient_mode {
            // refresh_frame_context, frame_parallel_decoding_mode
            r.skip_bits(2)?;
        }

        // frame_context_idx
        r.skip_bits(2)?;

        Self::skip_loop_filter_params(&mut r)?;
        Self::skip_quantization_params(&mut r)?;
        Self::skip_segmentation_params(&mut r)?;
        Self::skip_tile_info(&mut r, tile_width)?;

        hdr.header_size_in_bytes = r.read_bits(16)? as u16;

        r.byte_align()?;
        let header_end = (r.position() / 8) as usize;
        hdr.uncompressed_header_size_in_bytes = header_end - offset;

        let available = data.len() - header_end;
        if usize::from(hdr.header_size_in_bytes) > available {
            return Err(ParseError::CompressedHeaderTruncated {
                header_size: hdr.header_size_in_bytes,
                available,
            });
        }

        trace!("Parsed VP9 header: {:?}, {} bits left", hdr, r.num_bits_left());

        Ok(hdr)
    }

    /// Parse a single VP9 frame of `size` bytes starting at `offset` in
    /// `bitstream`. The frame must not contain a superframe index.
    pub fn parse_frame(
        &mut self,
        bitstream: &[u8],
        offset: usize,
        size: usize,
    ) -> Result<FrameInfo> {
        let data = offset
            .checked_add(size)
            .and_then(|end| bitstream.get(..end))
            .ok_or(ParseError::FrameOutOfBounds {
                index: 0,
                offset,
                size,
                available: bitstream.len(),
            })?;

        let hdr = self.parse_header_at(data, offset)?;

        if let Some(cfg) = &hdr.color_config {
            self.codec_config = VpCodecConfigurationRecord {
                profile: hdr.profile as u8,
                bit_depth: cfg.bit_depth as u8,
                color_space: cfg.color_space,
                chroma_subsampling: ChromaSubsampling::from_subsampling(
                    cfg.subsampling_x,
                    cfg.subsampling_y,
                ),
                video_full_range_flag: matches!(cfg.color_range, ColorRange::FullSwing),
                ..Default::default()
            };
        }

        if hdr.width != 0 {
            self.last_width = hdr.width;
        }

        let is_key_frame = hdr.is_key_frame();
        let (width, height) = if is_key_frame || hdr.intra_only {
            (hdr.width, hdr.height)
        } else {
            (0, 0)
        };

        let info = FrameInfo {
            frame_size: size,
            uncompressed_header_size: hdr.uncompressed_header_size_in_bytes,
            is_key_frame,
            width,
            height,
        };

        debug!("Parsed VP9 frame: {:?}", info);

        Ok(info)
    }

    /// Parses the VP9 frames in `chunk`. This can result in more than one frame
    /// if the data passed in contains a VP9 superframe. Any broken frame fails
    /// the whole chunk.
    pub fn parse(&mut self, chunk: &[u8]) -> Result<Vec<FrameInfo>> {
        let ranges = split_frames(chunk)?;
        let mut frames = Vec::with_capacity(ranges.len());

        for range in ranges {
            frames.push(self.parse_frame(chunk, range.start, range.len())?);
        }

        Ok(frames)
    }
}
