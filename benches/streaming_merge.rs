//! Benchmarks for streamed response handling
//!
//! This benchmark measures:
//! - SSE decoding of a chunked body
//! - Folding decoded messages into one response

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use futures::StreamExt;
use genai_lib_rust::pipeline::{merge_into, Decoder, SseDecoder};
use genai_lib_rust::types::wire::decode_response;
use genai_lib_rust::types::GenerateContentResponse;
use serde_json::json;

fn sse_body(messages: usize) -> String {
    (0..messages)
        .map(|i| {
            let msg = json!({
                "candidates": [{
                    "index": 0,
                    "content": {"role": "model", "parts": [{"text": format!("token {} ", i)}]},
                    "safetyRatings": [{"category": "HARM_CATEGORY_HARASSMENT", "probability": "NEGLIGIBLE"}]
                }],
                "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": i, "totalTokenCount": 8 + i}
            });
            format!("data: {}\r\n\r\n", msg)
        })
        .collect()
}

/// Split into fixed-size chunks, ignoring frame boundaries.
fn chunked(body: &str, size: usize) -> Vec<Bytes> {
    body.as_bytes()
        .chunks(size)
        .map(Bytes::copy_from_slice)
        .collect()
}

fn bench_sse_decode(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("sse_decode");

    for messages in [16usize, 256] {
        let body = sse_body(messages);
        let chunks = chunked(&body, 512);
        group.throughput(Throughput::Bytes(body.len() as u64));

        group.bench_function(format!("decode_{}_messages", messages), |b| {
            b.to_async(&rt).iter(|| async {
                let input = futures::stream::iter(
                    chunks
                        .clone()
                        .into_iter()
                        .map(Ok::<Bytes, genai_lib_rust::Error>),
                );
                let mut out = SseDecoder.decode_stream(Box::pin(input)).await.unwrap();
                let mut n = 0;
                while let Some(v) = out.next().await {
                    black_box(v.unwrap());
                    n += 1;
                }
                assert_eq!(n, messages);
            })
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    let body = sse_body(256);
    let decoded: Vec<GenerateContentResponse> = body
        .split("\r\n\r\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|data| decode_response(serde_json::from_str(data).unwrap()).unwrap())
        .collect();
    group.throughput(Throughput::Elements(decoded.len() as u64));

    group.bench_function("merge_256_messages", |b| {
        b.iter(|| {
            let mut merged = None;
            for msg in black_box(&decoded) {
                merge_into(&mut merged, msg);
            }
            merged
        })
    });

    group.finish();
}

criterion_group!(benches, bench_sse_decode, bench_merge);
criterion_main!(benches);
