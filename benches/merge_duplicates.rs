//! This bench simulates consolidating a large import in which many segments
//! resolve to the same requirement ID, then removing duplicate examples.

#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use non_empty_string::NonEmptyString;
use spec_enrich::{Example, ReqId, SourceInfo, Spec, pipeline::merge};

/// 2000 records over 200 IDs, each carrying a few examples that repeat
/// across contributors.
fn records() -> Vec<Spec> {
    (0..2000)
        .map(|i| {
            let id = ReqId::from_number(i % 200 + 1).unwrap();
            let title = NonEmptyString::new(format!("Requirement {id}")).unwrap();
            let mut spec = Spec::new(
                id,
                title,
                SourceInfo {
                    segment_id: format!("seg-{i:04}"),
                    ..SourceInfo::default()
                },
            );
            spec.examples = (0..4)
                .map(|n| Example::new(format!("state {}", (i + n) % 7), "an action", "a result"))
                .collect();
            spec.questions = vec![format!("Question {}?", i % 3)];
            spec
        })
        .collect()
}

fn merge_and_dedup(c: &mut Criterion) {
    c.bench_function("merge duplicates and dedup examples", |b| {
        b.iter_batched(
            records,
            |specs| {
                let (merged, _) = merge::consolidate(specs);
                merge::dedup_examples(merged)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, merge_and_dedup);
criterion_main!(benches);
