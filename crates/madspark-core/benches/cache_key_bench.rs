use criterion::{black_box, criterion_group, criterion_main, Criterion};
use madspark_core::cache::cache_key;
use madspark_core::SchemaId;

const SYSTEM: &str = "You are an idea generator. Produce distinct, concrete ideas for the given topic and context.";
const PROMPT: &str = r#"{"topic":"urban farming","context":"low-income neighborhoods, limited space","count":5}"#;

fn cache_key_idea(c: &mut Criterion) {
    c.bench_function("cache_key/idea_schema", |b| {
        b.iter(|| cache_key(black_box(SchemaId::Idea), black_box("gpt-x"), black_box(0.9), black_box(SYSTEM), black_box(PROMPT)));
    });
}

criterion_group!(benches, cache_key_idea);
criterion_main!(benches);
