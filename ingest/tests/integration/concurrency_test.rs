use ingest::pipeline::Pipeline;
use ingest::sink::memory::MemorySink;
use ingest::test_utils::test_sink_wrapper::TestSinkWrapper;
use ingest::test_utils::{fixture_dir, write_numbered_csv};
use ingest_config::shared::{BatchConfig, PipelineConfig};
use ingest_telemetry::tracing::init_test_tracing;
use std::time::Duration;

fn config(max_concurrency: u16) -> PipelineConfig {
    PipelineConfig {
        batch: BatchConfig { max_size: 10 },
        max_concurrency,
        ..PipelineConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_runs_more_files_than_the_limit() {
    init_test_tracing();

    let dir = fixture_dir();
    let paths: Vec<_> = (0..5)
        .map(|index| write_numbered_csv(dir.path(), &format!("{index}.csv"), 30))
        .collect();

    // Every write takes long enough for workers to overlap.
    let sink =
        TestSinkWrapper::wrap(MemorySink::new()).with_write_delay(Duration::from_millis(20));
    let result = Pipeline::new(config(2), sink.clone())
        .run(&paths)
        .await
        .unwrap();

    assert_eq!(result.completed(), 5);
    assert_eq!(sink.peak_in_flight(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_permit_processes_files_one_at_a_time() {
    init_test_tracing();

    let dir = fixture_dir();
    let paths: Vec<_> = (0..3)
        .map(|index| write_numbered_csv(dir.path(), &format!("{index}.csv"), 25))
        .collect();

    let sink = TestSinkWrapper::wrap(MemorySink::new()).with_write_delay(Duration::from_millis(5));
    let result = Pipeline::new(config(1), sink.clone())
        .run(&paths)
        .await
        .unwrap();

    assert_eq!(result.completed(), 3);
    assert_eq!(sink.peak_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn more_permits_than_files_runs_everything() {
    init_test_tracing();

    let dir = fixture_dir();
    let paths: Vec<_> = (0..3)
        .map(|index| write_numbered_csv(dir.path(), &format!("{index}.csv"), 10))
        .collect();

    let sink = TestSinkWrapper::wrap(MemorySink::new()).with_write_delay(Duration::from_millis(50));
    let result = Pipeline::new(config(8), sink.clone())
        .run(&paths)
        .await
        .unwrap();

    assert_eq!(result.completed(), 3);
    assert!(sink.peak_in_flight() <= 3);
    for path in &paths {
        assert_eq!(sink.written_records(path).await.len(), 10);
    }
}
