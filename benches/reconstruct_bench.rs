use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vmsbackup::item::RecordAttributes;
use vmsbackup::{FileMetadata, Reconstructor};

const VBN: usize = 512;
const CONTENT: usize = 1024 * 1024;

fn metadata(format: u8, record_size: u16) -> FileMetadata {
    FileMetadata {
        record_format: format,
        attributes:    RecordAttributes(RecordAttributes::CR),
        record_size,
        used:          (CONTENT / VBN) as u32 + 1,
        last_byte:     0,
        ..FileMetadata::default()
    }
}

/// Variable-length records of 72 text bytes each, word aligned.
fn variable_stream() -> Vec<u8> {
    let mut raw = Vec::with_capacity(CONTENT);
    while raw.len() + 74 <= CONTENT {
        raw.extend_from_slice(&72u16.to_le_bytes());
        raw.extend(std::iter::repeat(b'x').take(72));
    }
    raw.resize(CONTENT, 0);
    raw
}

fn feed_all(meta: &FileMetadata, binary: bool, raw: &[u8]) -> usize {
    let mut r = Reconstructor::new(meta, binary);
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 32);
    for chunk in raw.chunks(VBN * 8) {
        r.feed(chunk, &mut out).unwrap();
    }
    out.len()
}

fn bench_formats(c: &mut Criterion) {
    let var = variable_stream();
    let plain = vec![b'a'; CONTENT];

    let meta = metadata(0x02, 72);
    c.bench_function("variable_text_1mb", |b| b.iter(|| feed_all(&meta, false, black_box(&var))));
    c.bench_function("variable_binary_1mb", |b| b.iter(|| feed_all(&meta, true, black_box(&var))));

    let meta = metadata(0x01, 512);
    c.bench_function("fixed_1mb", |b| b.iter(|| feed_all(&meta, false, black_box(&plain))));

    let meta = metadata(0x06, 0);
    c.bench_function("stream_cr_1mb", |b| b.iter(|| feed_all(&meta, false, black_box(&plain))));
}

criterion_group!(benches, bench_formats);
criterion_main!(benches);
