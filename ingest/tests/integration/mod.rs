mod concurrency_test;
mod failure_test;
mod pipeline_test;
