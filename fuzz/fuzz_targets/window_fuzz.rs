#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use vcpatch::vcdiff::{Header, WindowReader};

fuzz_target!(|data: &[u8]| {
    // Window headers only: no instruction execution.
    let header = Header::default();
    let mut reader = WindowReader::new();
    let mut cursor = Cursor::new(data);
    while (cursor.position() as usize) < data.len() {
        match reader.read_next(&mut cursor, &header) {
            Ok(window) => {
                assert!(window.target_window_length <= vcpatch::vcdiff::HARD_MAX_WINSIZE);
            }
            Err(_) => break,
        }
    }
});
