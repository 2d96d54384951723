use ingest::error::ErrorKind;
use ingest::pipeline::Pipeline;
use ingest::sink::json_lines::JsonLinesSink;
use ingest::sink::memory::MemorySink;
use ingest::test_utils::test_sink_wrapper::{FailurePlan, TestSinkWrapper};
use ingest::test_utils::{fixture_dir, record_ids, write_numbered_csv};
use ingest::types::FileOutcome;
use ingest_config::shared::{BatchConfig, PipelineConfig, RetryConfig};
use ingest_telemetry::tracing::init_test_tracing;
use std::path::Path;
use std::time::Duration;

fn config(max_batch_size: usize, max_retries: u32) -> PipelineConfig {
    PipelineConfig {
        batch: BatchConfig {
            max_size: max_batch_size,
        },
        retry: RetryConfig {
            max_retries,
            initial_delay_ms: 2,
            max_delay_ms: 20,
            jitter_percent: 25,
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_fail_the_file_after_the_written_batches() {
    init_test_tracing();

    let dir = fixture_dir();
    let path = write_numbered_csv(dir.path(), "large.csv", 2500);

    let sink = TestSinkWrapper::wrap(MemorySink::new())
        .with_failure_plan(FailurePlan::AfterBatches(1));
    let result = Pipeline::new(config(1000, 2), sink.clone())
        .run([&path])
        .await
        .unwrap();

    assert_eq!(result.completed(), 0);
    assert_eq!(result.failed(), 1);

    let failures: Vec<_> = result.failures().collect();
    assert_eq!(failures.len(), 1);
    let (failed_path, failure) = failures[0];
    assert_eq!(failed_path, path.as_path());
    assert_eq!(failure.error.kind(), ErrorKind::SinkError);
    assert_eq!(failure.rows_written, 1000);
    assert_eq!(failure.batches_written, 1);
    assert_eq!(failure.lost_rows, Some(1000..2000));
    assert_eq!(failure.attempts, 3);

    // One successful write plus three attempts for the second batch, the third batch is never
    // written.
    assert_eq!(sink.write_attempts().await, 4);
    assert_eq!(
        record_ids(&sink.written_records(&path).await),
        (0..1000).collect::<Vec<_>>()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_are_retried_without_duplicates() {
    init_test_tracing();

    let dir = fixture_dir();
    let path = write_numbered_csv(dir.path(), "rows.csv", 40);

    let sink = TestSinkWrapper::wrap(MemorySink::new())
        .with_failure_plan(FailurePlan::FirstAttempts(3));
    let result = Pipeline::new(config(10, 3), sink.clone())
        .run([&path])
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(sink.write_attempts().await, 7);
    assert_eq!(
        record_ids(&sink.written_records(&path).await),
        (0..40).collect::<Vec<_>>()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_file_does_not_affect_other_files() {
    init_test_tracing();

    let dir = fixture_dir();
    let healthy = write_numbered_csv(dir.path(), "healthy.csv", 55);
    let rejected = write_numbered_csv(dir.path(), "rejected.csv", 55);
    let other = write_numbered_csv(dir.path(), "other.csv", 5);

    let sink = TestSinkWrapper::wrap(MemorySink::new())
        .with_failure_plan(FailurePlan::ForSources(vec![rejected.clone()]));
    let result = Pipeline::new(config(10, 1), sink.clone())
        .run([&healthy, &rejected, &other])
        .await
        .unwrap();

    assert_eq!(result.completed(), 2);
    assert_eq!(result.failed(), 1);
    assert!(!result.is_success());

    let failed: Vec<&Path> = result.failures().map(|(path, _)| path).collect();
    assert_eq!(failed, vec![rejected.as_path()]);
    assert_eq!(sink.written_records(&healthy).await.len(), 55);
    assert!(sink.written_records(&rejected).await.is_empty());
    assert_eq!(sink.written_records(&other).await.len(), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_row_fails_the_file_with_its_line_number() {
    init_test_tracing();

    let dir = fixture_dir();
    let broken = dir.path().join("broken.csv");
    std::fs::write(&broken, "id,value\n0,a\n1,b\n2,c\n3\n4,e\n").unwrap();
    let healthy = write_numbered_csv(dir.path(), "healthy.csv", 10);

    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let result = Pipeline::new(config(2, 3), sink.clone())
        .run([&broken, &healthy])
        .await
        .unwrap();

    assert_eq!(result.completed(), 1);
    assert_eq!(result.failed(), 1);

    let (_, failure) = result.failures().next().unwrap();
    assert_eq!(failure.error.kind(), ErrorKind::ParseError);
    assert!(failure.error.detail().unwrap().contains("line 5"));
    assert_eq!(failure.rows_written, 2);
    assert_eq!(failure.attempts, 0);
    assert_eq!(
        record_ids(&sink.written_records(&broken).await),
        vec![0, 1]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_file_is_reported_as_failed() {
    init_test_tracing();

    let dir = fixture_dir();
    let missing = dir.path().join("missing.csv");
    let present = write_numbered_csv(dir.path(), "present.csv", 3);

    let result = Pipeline::new(config(10, 3), MemorySink::new())
        .run([&missing, &present])
        .await
        .unwrap();

    assert_eq!(result.completed(), 1);
    let (path, failure) = result.failures().next().unwrap();
    assert_eq!(path, missing.as_path());
    assert_eq!(failure.error.kind(), ErrorKind::SourceIoError);
    assert_eq!(failure.rows_written, 0);
    assert!(result.to_string().contains("missing.csv: Failed: [SourceIoError]"));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_sink_writes_time_out() {
    init_test_tracing();

    let dir = fixture_dir();
    let path = write_numbered_csv(dir.path(), "rows.csv", 5);

    let sink = TestSinkWrapper::wrap(MemorySink::new()).with_write_delay(Duration::from_secs(5));
    let mut config = config(10, 1);
    config.write_timeout_ms = Some(20);

    let result = Pipeline::new(config, sink.clone())
        .run([&path])
        .await
        .unwrap();

    match &result.reports()[0].outcome {
        FileOutcome::Failed(failure) => {
            assert_eq!(failure.error.kind(), ErrorKind::SinkTimeout);
            assert_eq!(failure.attempts, 2);
            assert_eq!(failure.lost_rows, Some(0..5));
        }
        FileOutcome::Completed(_) => panic!("expected the file to time out"),
    }
    assert!(sink.written_records(&path).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn timed_out_json_lines_writes_are_never_duplicated() {
    init_test_tracing();

    let dir = fixture_dir();
    let path = write_numbered_csv(dir.path(), "large.csv", 20_000);
    let output = dir.path().join("out.jsonl");

    let mut config = config(5000, 3);
    config.write_timeout_ms = Some(1);

    let sink = JsonLinesSink::open(output.clone()).await.unwrap();
    let result = Pipeline::new(config, sink).run([&path]).await.unwrap();

    // Whether attempts time out depends on the machine, the output must match the reported
    // progress either way.
    let contents = std::fs::read_to_string(&output).unwrap();
    let rows: Vec<u64> = contents
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["row"].as_u64().unwrap()
        })
        .collect();

    assert_eq!(rows.len() as u64, result.rows_written());
    assert_eq!(rows, (0..result.rows_written()).collect::<Vec<_>>());
}
