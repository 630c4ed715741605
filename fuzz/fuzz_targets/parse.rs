#![no_main]

use libfuzzer_sys::fuzz_target;
use yamlet::Parser;

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = std::str::from_utf8(data) {
        let mut parser = Parser::new(true);
        let _ = parser.parse(src);
    }
});
