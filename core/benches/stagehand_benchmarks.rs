use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stagehand::{ContextData, FlowError, Pipeline, PipelineControl, Registry};
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Debug, Default)]
struct BenchCtx {
  counter: u64,
}

fn counting_pipeline(steps: usize, timeout: Option<Duration>) -> Pipeline<BenchCtx, FlowError> {
  let names: Vec<String> = (0..steps).map(|i| format!("step_{}", i)).collect();
  let defs: Vec<(&str, bool, Option<stagehand::SkipCondition<BenchCtx>>)> =
    names.iter().map(|n| (n.as_str(), false, None)).collect();
  let mut p = Pipeline::new(&defs);
  for name in &names {
    p.on_root(name, |ctx: ContextData<BenchCtx>| async move {
      ctx.write().counter += 1;
      Ok::<_, FlowError>(PipelineControl::Continue)
    });
    if let Some(limit) = timeout {
      p.set_timeout(name, limit);
    }
  }
  p
}

fn bench_pipeline_run(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let mut group = c.benchmark_group("pipeline_run");
  for steps in [1usize, 5, 20] {
    let plain = counting_pipeline(steps, None);
    let bounded = counting_pipeline(steps, Some(Duration::from_secs(1)));
    group.bench_with_input(BenchmarkId::new("plain", steps), &steps, |b, _| {
      b.to_async(&rt).iter(|| async {
        plain.run(ContextData::new(BenchCtx::default())).await.unwrap();
      })
    });
    group.bench_with_input(BenchmarkId::new("with_timeout", steps), &steps, |b, _| {
      b.to_async(&rt).iter(|| async {
        bounded.run(ContextData::new(BenchCtx::default())).await.unwrap();
      })
    });
  }
  group.finish();
}

fn bench_registry_dispatch(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let registry: Registry = Registry::new();
  registry.register_pipeline(counting_pipeline(3, None));
  c.bench_function("registry_dispatch_3_steps", |b| {
    b.to_async(&rt).iter(|| async {
      registry.run(ContextData::new(BenchCtx::default())).await.unwrap();
    })
  });
}

criterion_group!(benches, bench_pipeline_run, bench_registry_dispatch);
criterion_main!(benches);
