//! Benchmarks for the streaming hot path.
//!
//! Every network chunk of a reply goes through the SSE decoder and the
//! payload parser before the transcript is updated, so both must stay well
//! below the inter-chunk latency of the hosted model.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sentinel_chat::gemini::parse_event;
use sentinel_chat::prompt::context_window;
use sentinel_chat::sse::SseDecoder;
use sentinel_core::types::{Role, Turn};

/// A realistic SSE body of `events` Gemini chunks.
fn sse_body(events: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..events {
        body.push_str(&format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":\
             \"Fragment {i} of the reply, challenging the stated blocker. \"}}]}}}}],\
             \"usageMetadata\":{{\"promptTokenCount\":120,\"totalTokenCount\":{}}}}}\r\n\r\n",
            120 + i
        ));
    }
    body.into_bytes()
}

fn bench_decode(c: &mut Criterion) {
    let body = sse_body(64);

    c.bench_function("sse_decode_64_events_512b_chunks", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::new();
            let mut count = 0;
            for chunk in body.chunks(512) {
                count += decoder.feed(black_box(chunk)).len();
            }
            count += decoder.finish().map_or(0, |_| 1);
            count
        })
    });

    c.bench_function("sse_decode_and_parse_64_events", |b| {
        b.iter(|| {
            let mut decoder = SseDecoder::new();
            let mut text = String::new();
            for chunk in body.chunks(512) {
                for payload in decoder.feed(black_box(chunk)) {
                    if let Ok(fragment) = parse_event(&payload) {
                        text.push_str(fragment.as_str());
                    }
                }
            }
            text.len()
        })
    });
}

fn bench_context_window(c: &mut Criterion) {
    let history: Vec<Turn> = (0..200)
        .map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            Turn::new(role, format!("turn {i} with a moderately long body of text"))
        })
        .collect();

    c.bench_function("context_window_last_6_of_200", |b| {
        b.iter(|| context_window(black_box(&history), 6))
    });
}

criterion_group!(benches, bench_decode, bench_context_window);
criterion_main!(benches);
