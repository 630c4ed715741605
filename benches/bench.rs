use std::fmt::Write as _;

use criterion::{criterion_group, criterion_main, Criterion};
use yamlet::{parse_all_documents, ParseOptions, StringifyOptions};

/// A few thousand lines mixing block maps, sequences, quoting styles and
/// anchors, roughly shaped like real configuration files.
fn sample() -> String {
    let mut src = String::with_capacity(256 * 1024);
    for i in 0..2000 {
        let _ = write!(
            src,
            "entry-{i}:\n  \
               id: {i}\n  \
               name: \"item number {i}\"\n  \
               ratio: {}.5\n  \
               enabled: {}\n  \
               tags: [alpha, beta, 'gamma-{i}']\n  \
               notes: |\n    \
                 line one for {i}\n    \
                 line two\n",
            i % 97,
            i % 2 == 0,
        );
    }
    src.push_str("defaults: &defaults\n  retries: 3\nservice:\n  <<: *defaults\n");
    src
}

pub fn bench(c: &mut Criterion) {
    let src = sample();
    let options = ParseOptions::default();

    c.bench_function("parse large", |b| {
        b.iter(|| parse_all_documents(&src, &options))
    });

    let docs = parse_all_documents(&src, &options);
    let doc = &docs[0];
    c.bench_function("resolve large", |b| b.iter(|| doc.to_value(100).unwrap()));

    let out_options = StringifyOptions::default();
    c.bench_function("stringify large", |b| {
        b.iter(|| doc.to_yaml_string(&out_options).unwrap())
    });
}

criterion_group!(benches, bench);
criterion_main!(benches);
