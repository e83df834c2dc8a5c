// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The VP codec configuration record, i.e. the stream parameters signaled out
//! of band (`vpcC` box, DASH/HLS `codecs` attribute) for VP8 and VP9 streams.

/// The codecs whose configuration is described by a
/// [`VpCodecConfigurationRecord`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VpxCodec {
    Vp8,
    Vp9,
}

impl VpxCodec {
    /// The sample entry code prefixing the codec string.
    pub fn fourcc(&self) -> &'static str {
        match self {
            VpxCodec::Vp8 => "vp08",
            VpxCodec::Vp9 => "vp09",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ChromaSubsampling {
    #[default]
    Yuv420Vertical = 0,
    Yuv420CollocatedWithLuma = 1,
    Yuv422 = 2,
    Yuv444 = 3,
    Yuv440 = 4,
}

impl ChromaSubsampling {
    /// Maps the VP9 `subsampling_x` and `subsampling_y` flags to a chroma
    /// subsampling format. VP9 4:2:0 chroma is collocated with luma.
    pub fn from_subsampling(subsampling_x: bool, subsampling_y: bool) -> Self {
        match (subsampling_x, subsampling_y) {
            (true, true) => ChromaSubsampling::Yuv420CollocatedWithLuma,
            (true, false) => ChromaSubsampling::Yuv422,
            (false, false) => ChromaSubsampling::Yuv444,
            (false, true) => ChromaSubsampling::Yuv440,
        }
    }
}

/// Stream parameters gathered from the most recent key frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VpCodecConfigurationRecord {
    pub profile: u8,
    /// VP9 frame headers carry no level, so this stays 0.
    pub level: u8,
    pub bit_depth: u8,
    /// The raw 3-bit `color_space` syntax element.
    pub color_space: u8,
    pub chroma_subsampling: ChromaSubsampling,
    pub transfer_characteristics: u8,
    pub matrix_coefficients: u8,
    pub video_full_range_flag: bool,
}

impl Default for VpCodecConfigurationRecord {
    fn default() -> Self {
        Self {
            profile: 0,
            level: 0,
            bit_depth: 8,
            color_space: 0,
            chroma_subsampling: Default::default(),
            transfer_characteristics: 0,
            matrix_coefficients: 0,
            video_full_range_flag: false,
        }
    }
}

impl VpCodecConfigurationRecord {
    /// Renders the record as `<fourcc>.PP.LL.DD.CS.CC.TC.MC`: profile, level,
    /// bit depth, color space, chroma subsampling, transfer characteristics
    /// and matrix coefficients, each as two decimal digits.
    pub fn codec_string(&self, codec: VpxCodec) -> String {
        format!(
            "{}.{:02}.{:02}.{:02}.{:02}.{:02}.{:02}.{:02}",
            codec.fourcc(),
            self.profile,
            self.level,
            self.bit_depth,
            self.color_space,
            self.chroma_subsampling as u8,
            self.transfer_characteristics,
            self.matrix_coefficients,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record() {
        let record = VpCodecConfigurationRecord::default();
        assert_eq!(
            record.codec_string(VpxCodec::Vp9),
            "vp09.00.00.08.00.00.00.00"
        );
    }

    #[test]
    fn codec_string() {
        let record = VpCodecConfigurationRecord {
            profile: 2,
            bit_depth: 10,
            color_space: 5,
            chroma_subsampling: ChromaSubsampling::Yuv420CollocatedWithLuma,
            ..Default::default()
        };

        assert_eq!(
            record.codec_string(VpxCodec::Vp9),
            "vp09.02.00.10.05.01.00.00"
        );
        assert_eq!(
            record.codec_string(VpxCodec::Vp8),
            "vp08.02.00.10.05.01.00.00"
        );
    }

    #[test]
    fn full_range_is_not_rendered() {
        let record = VpCodecConfigurationRecord {
            video_full_range_flag: true,
            ..Default::default()
        };

        assert_eq!(
            record.codec_string(VpxCodec::Vp9),
            "vp09.00.00.08.00.00.00.00"
        );
    }

    #[test]
    fn chroma_subsampling_from_flags() {
        assert_eq!(
            ChromaSubsampling::from_subsampling(true, true),
            ChromaSubsampling::Yuv420CollocatedWithLuma
        );
        assert_eq!(
            ChromaSubsampling::from_subsampling(true, false),
            ChromaSubsampling::Yuv422
        );
        assert_eq!(
            ChromaSubsampling::from_subsampling(false, false),
            ChromaSubsampling::Yuv444
        );
        assert_eq!(
            ChromaSubsampling::from_subsampling(false, true),
            ChromaSubsampling::Yuv440
        );
    }
}
