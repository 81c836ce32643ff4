//! # Codec Plan Benchmark
//!
//! ARCHITECT'S REQUIREMENTS:
//! - A 64-entity state frame encodes in well under a millisecond
//! - Decoding allocates only the decoded record
//!
//! Run with: `cargo bench --package bitswarm_networking`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use std::sync::Arc;

use bitswarm_core::{BitReader, BitWriter};
use bitswarm_networking::files::InlineFiles;
use bitswarm_networking::protocol::{CodecContext, Plan, Side};
use bitswarm_networking::{ArrayValue, EnumDef, FieldDef, FieldKind, Record, Schema, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Highest peer index of the benchmarked session.
const MAX_PEER_INDEX: u8 = 63;

fn entity_schema() -> Schema {
    let transform = Schema::new("Transform")
        .field(FieldDef::new("origin", FieldKind::Vector(3)))
        .field(FieldDef::new("yaw", FieldKind::I16).ranged(-180, 180));
    let stance = EnumDef::new("Stance", &[("Idle", 0), ("Run", 1), ("Crouch", 2), ("Dead", 3)]).unwrap();
    Schema::new("Entity")
        .field(FieldDef::new("owner", FieldKind::U16).peer_id())
        .field(FieldDef::new("stance", FieldKind::enumeration(stance)))
        .field(FieldDef::new("health", FieldKind::U8).ranged(0, 100))
        .field(FieldDef::new("transform", FieldKind::record(transform)))
}

fn frame_schema() -> Arc<Schema> {
    Arc::new(
        Schema::new("Frame")
            .field(FieldDef::new("tick", FieldKind::U32))
            .field(FieldDef::new("entities", FieldKind::array(1, FieldKind::record(entity_schema())))),
    )
}

fn frame_record(entities: usize, rng: &mut StdRng) -> Record {
    let items = (0..entities)
        .map(|_| {
            Value::Record(Record::new(vec![
                Value::U16(rng.gen_range(0..=u16::from(MAX_PEER_INDEX))),
                Value::Enum(rng.gen_range(0..4)),
                Value::U8(rng.gen_range(0..=100)),
                Value::Record(Record::new(vec![
                    Value::Vector(vec![rng.gen(), rng.gen(), rng.gen()]),
                    Value::I16(rng.gen_range(-180..=180)),
                ])),
            ]))
        })
        .collect();
    Record::new(vec![Value::U32(rng.gen()), Value::Array(ArrayValue::from_items(items))])
}

/// Benchmark: encode state frames of growing size.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_encode");
    let plan = Plan::build(&frame_schema(), Side::ServerOrigin).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for entities in [1usize, 16, 64] {
        let record = frame_record(entities, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(entities), &record, |b, record| {
            let mut writer = BitWriter::framed();
            b.iter(|| {
                writer.reset();
                plan.encode(
                    black_box(record),
                    &mut writer,
                    &mut CodecContext::new(MAX_PEER_INDEX, &mut InlineFiles),
                )
                .unwrap();
                writer.finish().len()
            });
        });
    }

    group.finish();
}

/// Benchmark: decode the same frames back.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_decode");
    let plan = Plan::build(&frame_schema(), Side::ServerOrigin).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for entities in [1usize, 16, 64] {
        let mut writer = BitWriter::framed();
        plan.encode(
            &frame_record(entities, &mut rng),
            &mut writer,
            &mut CodecContext::new(MAX_PEER_INDEX, &mut InlineFiles),
        )
        .unwrap();
        let frame = writer.to_frame();

        group.bench_with_input(BenchmarkId::from_parameter(entities), &frame, |b, frame| {
            b.iter(|| {
                let mut reader = BitReader::from_frame(black_box(frame)).unwrap();
                plan.decode(&mut reader, &mut CodecContext::new(MAX_PEER_INDEX, &mut InlineFiles))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
