use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    mqtt::bench_encode_publish,
    mqtt::bench_decode_publish,
    mqtt::bench_frame_reassembly,
    mqtt::bench_topic_matching
);
criterion_main!(benches);
