use criterion::{black_box, criterion_group, criterion_main, Criterion};
use debugger_protocol::{decode, encode, HandleTable, Packet, DEFAULT_MAX_REF_DEPTH};
use serde_json::json;

fn scripts_response() -> String {
    let scripts: Vec<_> = (0..200)
        .map(|id| {
            json!({
                "id": id,
                "name": format!("script_{id}.js"),
                "source": "function f(){ return 1; }",
                "lineOffset": 0
            })
        })
        .collect();
    json!({
        "seq": 2,
        "type": "response",
        "request_seq": 1,
        "command": "scripts",
        "success": true,
        "running": true,
        "body": scripts
    })
    .to_string()
}

fn evaluate_response() -> String {
    let refs: Vec<_> = (1..=64)
        .map(|h| json!({ "handle": h, "type": "object", "next": { "ref": h + 1 } }))
        .collect();
    json!({
        "seq": 4,
        "type": "response",
        "request_seq": 3,
        "command": "evaluate",
        "success": true,
        "running": false,
        "body": { "ref": 1 },
        "refs": refs
    })
    .to_string()
}

fn bench_codec(c: &mut Criterion) {
    let args = json!({ "includeSource": true });
    c.bench_function("encode_request", |b| {
        b.iter(|| encode(black_box("scripts"), black_box(7), Some(&args)).unwrap())
    });

    let raw = scripts_response();
    c.bench_function("decode_scripts_response", |b| {
        b.iter(|| decode(black_box(&raw)).unwrap())
    });

    let raw = evaluate_response();
    c.bench_function("decode_and_resolve_refs", |b| {
        b.iter(|| {
            let Packet::Response(response) = decode(black_box(&raw)).unwrap() else {
                unreachable!()
            };
            let table = HandleTable::from_refs(&response.refs);
            let body = response.body.clone().unwrap_or_default();
            table.resolve(&body, DEFAULT_MAX_REF_DEPTH)
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
