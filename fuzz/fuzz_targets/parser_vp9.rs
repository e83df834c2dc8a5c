#![no_main]

use libfuzzer_sys::fuzz_target;
use vpx_frame_parser::bitstream_utils::IvfIterator;
use vpx_frame_parser::codec::vp9::parser::Parser;

fuzz_target!(|data: &[u8]| {
    let mut parser = Parser::default();

    for packet in IvfIterator::new(data) {
        if let Ok(frames) = parser.parse(packet) {
            for frame in frames {
                assert!(frame.uncompressed_header_size <= frame.frame_size);
            }
        }
    }
});
