//! Integration tests for configuration parsing and builders.

use prometheus_concurrency::builders::{build_barrier, build_pipeline, build_queue, build_worker_pool};
use prometheus_concurrency::config::{
    PrimitivesConfig, WorkerPoolConfig, ENV_WORKER_COUNT, ENV_WORKER_STACK_SIZE,
};
use prometheus_concurrency::core::{ConfigError, ErrorPolicy, NullSink, StagePipeline, Transform};
use std::sync::Arc;

const FULL_CONFIG: &str = r#"
{
    "worker_pool": { "worker_count": 3, "thread_name_prefix": "cfg" },
    "queue": { "capacity": 16 },
    "barrier": { "participants": 4 },
    "pipeline": {
        "stages": [
            { "name": "double", "capacity": 8 },
            { "name": "add_ten", "capacity": 8 }
        ],
        "error_policy": "forward"
    }
}
"#;

fn transform(name: &str) -> Option<Transform<i64>> {
    let f: Transform<i64> = match name {
        "double" => Box::new(|x: i64| Ok::<_, anyhow::Error>(Some(x * 2))),
        "add_ten" => Box::new(|x: i64| Ok::<_, anyhow::Error>(Some(x + 10))),
        _ => return None,
    };
    Some(f)
}

#[test]
fn test_full_document_builds_everything() {
    let cfg = PrimitivesConfig::from_json_str(FULL_CONFIG).unwrap();

    let pool_cfg = cfg.worker_pool.as_ref().unwrap();
    assert_eq!(pool_cfg.thread_stack_size, None);
    let pool = build_worker_pool(pool_cfg, Arc::new(NullSink)).unwrap();
    let name = pool
        .submit(|| std::thread::current().name().map(str::to_owned))
        .unwrap()
        .wait()
        .unwrap();
    assert!(name.unwrap().starts_with("cfg-"));
    pool.shutdown(true);

    let queue = build_queue::<u32>(cfg.queue.as_ref().unwrap()).unwrap();
    assert_eq!(queue.capacity(), 16);

    let barrier = build_barrier(cfg.barrier.as_ref().unwrap()).unwrap();
    assert_eq!(barrier.participants(), 4);

    let pipeline_cfg = cfg.pipeline.as_ref().unwrap();
    assert_eq!(pipeline_cfg.error_policy, ErrorPolicy::Forward);
    let pipeline: StagePipeline<i64> =
        build_pipeline(pipeline_cfg, Arc::new(NullSink), |stage| transform(&stage.name)).unwrap();
    for x in [1, 2, 3] {
        pipeline.submit_item(x).unwrap();
    }
    pipeline.shutdown();
    let out: Vec<i64> = pipeline
        .collect_outputs()
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(out, vec![12, 14, 16]);
}

#[test]
fn test_malformed_json_is_parse_error() {
    let err = PrimitivesConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().starts_with("parse error"));
}

#[test]
fn test_invalid_sections_rejected() {
    let cases = [
        (r#"{"worker_pool": {"worker_count": 0}}"#, "worker_pool invalid"),
        (r#"{"barrier": {"participants": 0}}"#, "barrier invalid"),
        (r#"{"pipeline": {"stages": []}}"#, "pipeline invalid"),
    ];
    for (input, prefix) in cases {
        match PrimitivesConfig::from_json_str(input) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.starts_with(prefix), "{msg}"),
            other => panic!("expected invalid config for {input}, got {other:?}"),
        }
    }
}

#[test]
fn test_worker_pool_from_env() {
    // Only this test touches these variables.
    std::env::set_var(ENV_WORKER_COUNT, "5");
    std::env::set_var(ENV_WORKER_STACK_SIZE, "1048576");
    let cfg = WorkerPoolConfig::from_env().unwrap();
    assert_eq!(cfg.worker_count, 5);
    assert_eq!(cfg.thread_stack_size, Some(1_048_576));

    std::env::set_var(ENV_WORKER_COUNT, "many");
    let err = WorkerPoolConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Env { ref name, ref value } if name == ENV_WORKER_COUNT && value == "many"));

    std::env::set_var(ENV_WORKER_COUNT, "0");
    assert!(matches!(WorkerPoolConfig::from_env(), Err(ConfigError::Invalid(_))));

    std::env::remove_var(ENV_WORKER_COUNT);
    std::env::remove_var(ENV_WORKER_STACK_SIZE);
}
