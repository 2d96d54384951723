use ingest::pipeline::Pipeline;
use ingest::sink::json_lines::JsonLinesSink;
use ingest::sink::memory::MemorySink;
use ingest::test_utils::test_sink_wrapper::TestSinkWrapper;
use ingest::test_utils::{fixture_dir, record_ids, write_numbered_csv};
use ingest::types::{FileOutcome, FileStats};
use ingest_config::shared::{BatchConfig, PipelineConfig};
use ingest_telemetry::tracing::init_test_tracing;

fn config(max_batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        batch: BatchConfig {
            max_size: max_batch_size,
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn ingests_files_of_different_sizes() {
    init_test_tracing();

    let dir = fixture_dir();
    let large = write_numbered_csv(dir.path(), "large.csv", 2500);
    let empty = write_numbered_csv(dir.path(), "empty.csv", 0);
    let single = write_numbered_csv(dir.path(), "single.csv", 1);

    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let pipeline = Pipeline::new(config(1000), sink.clone());

    let result = pipeline
        .run([large.clone(), empty.clone(), single.clone()])
        .await
        .unwrap();

    assert_eq!(result.completed(), 3);
    assert_eq!(result.failed(), 0);
    assert!(result.is_success());

    let outcomes: Vec<_> = result
        .reports()
        .iter()
        .map(|report| report.outcome.clone())
        .collect();
    assert_eq!(
        outcomes,
        vec![
            FileOutcome::Completed(FileStats {
                rows_written: 2500,
                batches_written: 3,
            }),
            FileOutcome::Completed(FileStats::default()),
            FileOutcome::Completed(FileStats {
                rows_written: 1,
                batches_written: 1,
            }),
        ]
    );

    let sizes: Vec<_> = sink
        .written_batches(&large)
        .await
        .iter()
        .map(|batch| batch.len())
        .collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    assert!(sink.written_batches(&empty).await.is_empty());
    assert_eq!(sink.written_batches(&single).await.len(), 1);
    assert_eq!(sink.write_attempts().await, 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn every_record_is_delivered_once_and_in_order() {
    init_test_tracing();

    let dir = fixture_dir();
    let paths: Vec<_> = [17, 250, 99, 3]
        .into_iter()
        .enumerate()
        .map(|(index, rows)| write_numbered_csv(dir.path(), &format!("{index}.csv"), rows))
        .collect();

    let sink = TestSinkWrapper::wrap(MemorySink::new());
    let result = Pipeline::new(config(7), sink.clone())
        .run(&paths)
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.rows_written(), 17 + 250 + 99 + 3);

    for (path, rows) in paths.iter().zip([17u64, 250, 99, 3]) {
        let records = sink.written_records(path).await;
        assert_eq!(record_ids(&records), (0..rows).collect::<Vec<_>>());

        for batch in sink.written_batches(path).await {
            assert!((1..=7).contains(&batch.len()));
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_follow_input_order() {
    init_test_tracing();

    let dir = fixture_dir();
    let paths: Vec<_> = (0..6)
        .map(|index| write_numbered_csv(dir.path(), &format!("{index}.csv"), 50 * (6 - index)))
        .collect();

    let mut config = config(10);
    config.max_concurrency = 3;
    let result = Pipeline::new(config, MemorySink::new())
        .run(&paths)
        .await
        .unwrap();

    let reported: Vec<_> = result
        .reports()
        .iter()
        .map(|report| report.path.to_path_buf())
        .collect();
    assert_eq!(reported, paths);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_input_completes_immediately() {
    init_test_tracing();

    let sink = MemorySink::new();
    let result = Pipeline::new(PipelineConfig::default(), sink.clone())
        .run(Vec::<std::path::PathBuf>::new())
        .await
        .unwrap();

    assert_eq!(result.total(), 0);
    assert_eq!(result.completed(), 0);
    assert_eq!(result.failed(), 0);
    assert_eq!(sink.total_records().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn sink_is_shut_down_once_after_all_files() {
    init_test_tracing();

    let dir = fixture_dir();
    let paths: Vec<_> = (0..4)
        .map(|index| write_numbered_csv(dir.path(), &format!("{index}.csv"), 20))
        .collect();

    let sink = TestSinkWrapper::wrap(MemorySink::new());
    Pipeline::new(config(5), sink.clone())
        .run(&paths)
        .await
        .unwrap();

    assert_eq!(sink.shutdown_calls().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn json_lines_sink_receives_every_record() {
    init_test_tracing();

    let dir = fixture_dir();
    let first = write_numbered_csv(dir.path(), "first.csv", 120);
    let second = write_numbered_csv(dir.path(), "second.csv", 30);
    let output = dir.path().join("out.jsonl");

    let sink = JsonLinesSink::open(output.clone()).await.unwrap();
    let result = Pipeline::new(config(25), sink)
        .run([&first, &second])
        .await
        .unwrap();
    assert!(result.is_success());

    let contents = tokio::fs::read_to_string(&output).await.unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 150);

    let first_source = first.to_string_lossy();
    let mut first_rows: Vec<u64> = lines
        .iter()
        .filter(|line| line["source"] == first_source.as_ref())
        .map(|line| line["row"].as_u64().unwrap())
        .collect();
    first_rows.sort();
    assert_eq!(first_rows, (0..120).collect::<Vec<_>>());
}
