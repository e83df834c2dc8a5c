// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Drives the VP9 parser with packets read back from an IVF container.

#[cfg(test)]
mod tests {
    use vpx_frame_parser::bitstream_utils::write_ivf;
    use vpx_frame_parser::bitstream_utils::IvfFileHeader;
    use vpx_frame_parser::bitstream_utils::IvfIterator;
    use vpx_frame_parser::FrameInfo;
    use vpx_frame_parser::Parser;
    use vpx_frame_parser::VpxCodec;

    const SUPERFRAME: [u8; 138] = [
        0x85, 0x00, 0x81, 0x25, 0x86, 0x0e, 0x09, 0x07, 0x06, 0x47, 0x00, 0x00, 0xb4, 0x69, 0x29,
        0x1f, 0x69, 0x46, 0x6d, 0xaf, 0x4c, 0x1f, 0xac, 0x8c, 0x40, 0x7e, 0xb9, 0x52, 0xe3, 0x6f,
        0xe9, 0x82, 0x23, 0x62, 0x9a, 0x40, 0xda, 0x87, 0x21, 0x7f, 0x1f, 0xc8, 0xfe, 0x3f, 0xd1,
        0xfc, 0x7f, 0xc1, 0xbb, 0x3e, 0x77, 0xa4, 0xfc, 0x94, 0xa2, 0xfa, 0xa2, 0x00, 0x7a, 0xc3,
        0x87, 0x01, 0x02, 0x4b, 0x0a, 0x1c, 0x12, 0x0e, 0x0c, 0x75, 0x00, 0x01, 0xa0, 0x69, 0x23,
        0x0f, 0xd2, 0xf6, 0xfb, 0xb0, 0x6b, 0xf2, 0xab, 0x57, 0xc3, 0x3a, 0xa5, 0x74, 0x4d, 0xb1,
        0x48, 0xf4, 0x59, 0x0f, 0xf1, 0x7e, 0x2f, 0x89, 0xf9, 0x00, 0xab, 0x7b, 0x01, 0x11, 0xd3,
        0x8a, 0xe6, 0x8f, 0xab, 0xeb, 0x5f, 0x57, 0xdd, 0x7f, 0x45, 0x31, 0xbb, 0x66, 0xee, 0xf5,
        0xbc, 0x85, 0xf1, 0xd0, 0x00, 0x7b, 0x80, 0xa7, 0x96, 0xbf, 0x8c, 0x21, 0xc9, 0x3c, 0x00,
        0x48, 0x00, 0xc9,
    ];

    const KEYFRAME_PROFILE_2_CHROMA_420: [u8; 80] = [
        0x92, 0x49, 0x83, 0x42, 0x00, 0x04, 0xf8, 0x02, 0xca, 0x04, 0x1c, 0x12, 0x0e, 0x0c, 0x3d,
        0x00, 0x00, 0xa8, 0x7c, 0x66, 0x85, 0xb9, 0xfb, 0x3c, 0xc9, 0xf0, 0xff, 0xde, 0xf8, 0x78,
        0x10, 0x59, 0x5f, 0xaa, 0x6e, 0xf0, 0x2a, 0x70, 0x00, 0x7e, 0x6f, 0xfe, 0x74, 0x31, 0xc6,
        0x4f, 0x23, 0x9d, 0x6e, 0x5f, 0xfc, 0xa8, 0xef, 0x67, 0xdc, 0xac, 0xf7, 0x3e, 0x31, 0x07,
        0xab, 0xc7, 0x11, 0x67, 0x95, 0x30, 0x37, 0xde, 0x13, 0x16, 0x83, 0x0b, 0xa4, 0xdf, 0x05,
        0xaf, 0x6f, 0xff, 0xd1, 0x74,
    ];

    const INTER_FRAME: [u8; 80] = [
        0x86, 0x00, 0x40, 0x92, 0x88, 0x2c, 0x49, 0xe0, 0x00, 0x03, 0x00, 0x00, 0x00, 0x78, 0xc9,
        0x78, 0x71, 0x24, 0x4a, 0x59, 0x44, 0x61, 0xa6, 0x25, 0xd4, 0x3e, 0xce, 0x00, 0x3a, 0x05,
        0xfb, 0x9c, 0xf2, 0x4e, 0xd6, 0x1a, 0x38, 0x94, 0x86, 0x17, 0x2a, 0x7b, 0x29, 0xbc, 0x22,
        0x7e, 0xf8, 0xce, 0x26, 0x00, 0xb9, 0xb4, 0xfd, 0x74, 0x39, 0x15, 0xaa, 0xe6, 0xe3, 0xb1,
        0xa0, 0xa6, 0x00, 0xf5, 0x6f, 0x57, 0x71, 0x4b, 0x69, 0xd2, 0xcc, 0x21, 0x90, 0xeb, 0x8c,
        0xad, 0x5f, 0x69, 0xb7, 0x9b,
    ];

    fn vp9_ivf(packets: &[&[u8]]) -> Vec<u8> {
        let header =
            IvfFileHeader::new(IvfFileHeader::CODEC_VP9, 160, 90, 30, packets.len() as u32);
        write_ivf(&header, packets).unwrap()
    }

    #[test]
    fn parse_ivf_stream() {
        let _ = env_logger::try_init();

        let packets: [&[u8]; 4] = [
            &KEYFRAME_PROFILE_2_CHROMA_420,
            &INTER_FRAME,
            &[0x88],
            &SUPERFRAME,
        ];
        let file = vp9_ivf(&packets);

        let hdr = IvfFileHeader::parse(&file).unwrap();
        assert_eq!(hdr.codec, IvfFileHeader::CODEC_VP9);
        assert_eq!((hdr.width, hdr.height), (160, 90));
        assert_eq!(hdr.frame_count, 4);

        let mut parser = Parser::default();
        let mut frames = Vec::new();
        for packet in IvfIterator::new(&file) {
            let parsed = parser.parse(packet).unwrap();

            // Frames and superframe index account for the whole packet.
            let payload: usize = parsed.iter().map(|f| f.frame_size).sum();
            assert!(payload <= packet.len());

            frames.extend(parsed);
        }

        let frame = |frame_size, uncompressed_header_size, is_key_frame, width, height| {
            FrameInfo {
                frame_size,
                uncompressed_header_size,
                is_key_frame,
                width,
                height,
            }
        };

        assert_eq!(
            frames,
            vec![
                frame(80, 18, true, 160, 90),
                frame(80, 10, false, 0, 0),
                frame(1, 1, false, 0, 0),
                frame(60, 13, false, 0, 0),
                frame(72, 13, false, 0, 0),
            ]
        );

        // Only the key frame set the stream parameters.
        assert_eq!(
            parser.codec_config().codec_string(VpxCodec::Vp9),
            "vp09.02.00.10.00.01.00.00"
        );
    }

    #[test]
    fn broken_packet_fails_alone() {
        let _ = env_logger::try_init();

        let mut corrupted = KEYFRAME_PROFILE_2_CHROMA_420;
        corrupted[1] = 0x00;

        let packets: [&[u8]; 3] = [&corrupted, &[0xc8], &INTER_FRAME];
        let file = vp9_ivf(&packets);

        let mut parser = Parser::default();
        let results: Vec<bool> = IvfIterator::new(&file)
            .map(|packet| parser.parse(packet).is_ok())
            .collect();

        assert_eq!(results, vec![false, false, true]);
        assert_eq!(
            parser.codec_config().codec_string(VpxCodec::Vp9),
            "vp09.00.00.08.00.00.00.00"
        );
    }
}
