#![no_main]

use libfuzzer_sys::fuzz_target;
use vpx_frame_parser::codec::vp9::superframe::split_frames;

fuzz_target!(|data: &[u8]| {
    if let Ok(ranges) = split_frames(data) {
        for range in ranges {
            assert!(range.end <= data.len());
        }
    }
});
