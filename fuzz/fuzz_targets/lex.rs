#![no_main]

use libfuzzer_sys::fuzz_target;
use yamlet::Lexer;

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = std::str::from_utf8(data) {
        // Tokens must cover the input exactly, in order.
        let mut offset = 0;
        for token in Lexer::new(src) {
            assert!(token.offset >= offset || token.source.is_empty());
            offset = token.offset + token.source.len();
        }
        assert!(offset <= src.len());
    }
});
