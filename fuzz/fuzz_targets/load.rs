#![no_main]

use libfuzzer_sys::fuzz_target;
use yamlet::{parse_all_documents, ParseOptions, StringifyOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = std::str::from_utf8(data) {
        let options = ParseOptions::default();
        for doc in parse_all_documents(src, &options) {
            let _ = doc.to_value(options.max_alias_count);
            if doc.errors.is_empty() {
                let _ = doc.to_yaml_string(&StringifyOptions::default());
            }
        }
    }
});
