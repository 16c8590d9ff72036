//! Rewrite throughput on transcoder-sized playlists.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use playgate::hls::{ManifestRewriter, TraversalPolicy, classify};
use std::fmt::Write;

const KEY: &str = "orgs/o1/uploads/a1/streaming/720p/index.m3u8";

fn media_playlist(segments: usize) -> String {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n");
    for i in 0..segments {
        let _ = write!(out, "#EXTINF:6.006000,\nseg_{i:05}.ts\n");
    }
    out.push_str("#EXT-X-ENDLIST\n");
    out
}

fn bench_rewrite(c: &mut Criterion) {
    let rewriter = ManifestRewriter::new("https://cdn.example.com");
    let hardened = rewriter.clone().with_policy(TraversalPolicy::Reject);

    let mut group = c.benchmark_group("rewrite_media");
    for segments in [60usize, 600, 6000] {
        let playlist = media_playlist(segments);
        group.bench_with_input(BenchmarkId::new("clamp", segments), &playlist, |b, p| {
            b.iter(|| rewriter.rewrite(black_box(p), KEY))
        });
        group.bench_with_input(BenchmarkId::new("reject", segments), &playlist, |b, p| {
            b.iter(|| hardened.rewrite(black_box(p), KEY))
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let lines = [
        "#EXTINF:6.006000,",
        "seg_00042.ts?token=abcdef",
        "720p/index.m3u8",
        "",
    ];
    c.bench_function("classify_mixed_lines", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(classify(black_box(line)));
            }
        })
    });
}

criterion_group!(benches, bench_rewrite, bench_classify);
criterion_main!(benches);
