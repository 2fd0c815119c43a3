//! Framing cost per fan-out: one serialization plus a placeholder swap per
//! subscriber, against a full serialization per subscriber.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use stream_gateway::framer;
use stream_gateway::items::{UserRef, VoiceStateItem, USER_REF_TYPENAME, VOICE_ACTIVITY_TYPENAME};

fn voice_item() -> VoiceStateItem {
    VoiceStateItem {
        user_id: "w_abcdefghijkl".to_string(),
        voice_user_id: "v_123456".to_string(),
        muted: false,
        talking: true,
        user: UserRef {
            color: "#7b1fa2".to_string(),
            name: "Bench User".to_string(),
            speech_locale: "en-US".to_string(),
            typename: USER_REF_TYPENAME,
        },
        voice_activity_at: "2026-01-01T00:00:00.000Z".to_string(),
        typename: VOICE_ACTIVITY_TYPENAME,
    }
}

fn bench_fanout_framing(c: &mut Criterion) {
    let items = vec![voice_item()];
    let mut group = c.benchmark_group("fanout_framing");

    for recipients in [10usize, 100, 1000] {
        let ids: Vec<String> = (0..recipients).map(|i| format!("sub-{i}")).collect();

        group.bench_with_input(
            BenchmarkId::new("frame_once_personalize", recipients),
            &ids,
            |b, ids| {
                b.iter(|| {
                    let payload = framer::frame("user_voice_activity_stream", &items).unwrap();
                    for id in ids {
                        black_box(payload.personalize(id));
                    }
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("serialize_per_recipient", recipients),
            &ids,
            |b, ids| {
                b.iter(|| {
                    for id in ids {
                        let message = json!({
                            "type": "next",
                            "id": id,
                            "payload": {"data": {"user_voice_activity_stream": &items}}
                        });
                        black_box(serde_json::to_vec(&message).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fanout_framing);
criterion_main!(benches);
