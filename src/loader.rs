//! Bulk document loader.
//!
//! Records become [`Document`]s, each queued as its own [`BulkRequestItem`].
//! The queue is cut into chunks that are submitted one after another with a
//! fixed pause in between. Rejected documents never fail the call; they are
//! logged and returned in the [`LoadReport`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use logging_timer::timer;
use tracing::{debug, error, info};

use crate::conf::Config;
use crate::document::{Document, Record};
use crate::errors::Result;
use crate::models::bulk::{BulkItemResult, BulkRequestItem, BulkResponseItem};
use crate::transport::SearchTransport;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Status reported for a document the `_bulk` response has no entry for.
pub const MISSING_ITEM_STATUS: u16 = 0;
pub const MISSING_ITEM_REASON: &str = "no response item";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Streams sub-batches and only logs rejected documents at debug level.
    #[default]
    Quick,
    /// One request per chunk, success or the list of failures logged.
    Sync,
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub chunk_size: usize,
    pub pause: Duration,
    pub mode: SubmitMode,
    pub stream_chunk_size: usize,
    pub request_timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pause: DEFAULT_PAUSE,
            mode: SubmitMode::default(),
            stream_chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl LoaderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.get_chunk_size(),
            pause: Duration::from_secs(config.get_pause_secs()),
            mode: if config.is_quick() {
                SubmitMode::Quick
            } else {
                SubmitMode::Sync
            },
            stream_chunk_size: config.get_stream_chunk_size(),
            request_timeout: Duration::from_secs(config.get_request_timeout_secs()),
        }
    }
}

/// Per-record metadata stamped on every document of one load.
#[derive(Debug, Clone)]
pub struct BasicInfo<'a> {
    pub doc_id: &'a str,
    pub timestamp: DateTime<Utc>,
    pub date_and_time: &'a str,
    pub username: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Position inside the chunk.
    pub position: usize,
    pub index_name: String,
    pub status: u16,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub chunks: Vec<ChunkReport>,
}

impl ChunkReport {
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.submitted
    }
}

impl LoadReport {
    pub fn submitted(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.submitted).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.succeeded).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.submitted().saturating_sub(self.succeeded())
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(ChunkReport::is_complete)
    }
}

/// Queues an owned copy of `doc`; later changes to `doc` don't reach it.
pub fn fill_list_of_docs(list_of_docs: &mut Vec<BulkRequestItem>, index_name: &str, doc: &Document) {
    list_of_docs.push(BulkRequestItem::new(index_name, doc));
}

pub fn build_bulk_items(records: &[Record], index_name: &str, info: &BasicInfo<'_>) -> Vec<BulkRequestItem> {
    let mut list_of_docs = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        debug!("index: {}/{}", index + 1, records.len());
        let mut doc = Document::new();
        doc.add_basic_info(info.doc_id, &info.timestamp, info.date_and_time, info.username);
        doc.add_record(record);
        fill_list_of_docs(&mut list_of_docs, index_name, &doc);
    }
    list_of_docs
}

pub struct BulkLoader<'a, T: SearchTransport + ?Sized> {
    transport: &'a T,
    options: LoaderOptions,
}

impl<'a, T: SearchTransport + ?Sized> BulkLoader<'a, T> {
    pub fn new(transport: &'a T, options: LoaderOptions) -> Self {
        Self { transport, options }
    }

    pub fn get_options(&self) -> &LoaderOptions {
        &self.options
    }

    pub async fn bulk_load(
        &self,
        records: &[Record],
        index_name: &str,
        info: &BasicInfo<'_>,
    ) -> Result<LoadReport> {
        info!(
            "Preparing {} documents for index '{}' (doc_id={})",
            records.len(),
            index_name,
            info.doc_id
        );
        let list_of_docs = build_bulk_items(records, index_name, info);
        self.submit_chunks(&list_of_docs).await
    }

    /// Submits `chunk_size` items at a time, pausing after every chunk.
    pub async fn submit_chunks(&self, list_of_docs: &[BulkRequestItem]) -> Result<LoadReport> {
        let chunk_size = self.options.chunk_size.max(1);
        let total = list_of_docs.len();
        let mut report = LoadReport::default();

        for (number, chunk) in list_of_docs.chunks(chunk_size).enumerate() {
            let start = number * chunk_size;
            info!("index: {} - {} / {}", start, start + chunk.len(), total);
            report.chunks.push(self.submit_chunk(chunk).await?);
            if !self.options.pause.is_zero() {
                tokio::time::sleep(self.options.pause).await;
            }
        }

        if report.is_complete() {
            info!("Loaded {} documents in {} chunks", total, report.chunks.len());
        } else {
            error!(
                "Loaded {} of {} documents, {} rejected",
                report.succeeded(),
                total,
                report.failed_count()
            );
        }
        Ok(report)
    }

    pub async fn submit_chunk(&self, chunk: &[BulkRequestItem]) -> Result<ChunkReport> {
        let _tmr = timer!("SUBMIT_CHUNK", "docs={} mode={:?}", chunk.len(), self.options.mode);
        info!("Start to report the documents to ELK");
        let report = match self.options.mode {
            SubmitMode::Quick => self.submit_streaming(chunk).await?,
            SubmitMode::Sync => self.submit_sync(chunk).await?,
        };
        info!("Finish to report the documents to ELK");
        Ok(report)
    }

    async fn submit_streaming(&self, chunk: &[BulkRequestItem]) -> Result<ChunkReport> {
        let stream_size = self.options.stream_chunk_size.max(1);
        let mut report = ChunkReport {
            submitted: chunk.len(),
            ..ChunkReport::default()
        };

        for (number, batch) in chunk.chunks(stream_size).enumerate() {
            let response = self
                .transport
                .bulk(batch, Some(self.options.request_timeout))
                .await?;
            tally(&mut report, number * stream_size, batch, response.get_items(), |result| {
                if !result.is_created() || result.get_shards_failed() > 0 {
                    debug!("Failed document: \n{:?}", result);
                }
            });
        }
        Ok(report)
    }

    async fn submit_sync(&self, chunk: &[BulkRequestItem]) -> Result<ChunkReport> {
        let response = self.transport.bulk(chunk, None).await?;
        let mut report = ChunkReport {
            submitted: chunk.len(),
            ..ChunkReport::default()
        };
        tally(&mut report, 0, chunk, response.get_items(), |_| {});

        if report.succeeded == chunk.len() {
            info!("All documents were reported successfully");
        } else {
            error!(
                "Not all documents were reported successfully.\n The documents that were not reported successfully: {:?}",
                report.failed
            );
        }
        Ok(report)
    }
}

/// Matches every submitted item with the response entry at the same
/// position. Items the cluster did not answer count as failed; surplus
/// response entries are ignored.
fn tally<F>(
    report: &mut ChunkReport,
    offset: usize,
    batch: &[BulkRequestItem],
    items: &[BulkResponseItem],
    mut inspect: F,
) where
    F: FnMut(&BulkItemResult),
{
    for (position, sent) in batch.iter().enumerate() {
        let Some(item) = items.get(position) else {
            report.failed.push(FailedItem {
                position: offset + position,
                index_name: sent.get_index_name().clone(),
                status: MISSING_ITEM_STATUS,
                reason: MISSING_ITEM_REASON.to_string(),
            });
            continue;
        };
        let result = item.result();
        inspect(result);
        if result.is_success() {
            report.succeeded += 1;
        } else {
            report.failed.push(FailedItem {
                position: offset + position,
                index_name: sent.get_index_name().clone(),
                status: result.get_status(),
                reason: result.error_reason(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bulk::BulkResponse;
    use std::fs;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<(Vec<BulkRequestItem>, Option<Duration>)>>,
        rejected_doc_ids: HashSet<String>,
        /// Fixed answer for every `_bulk` call, whatever was sent.
        canned: Option<Vec<BulkResponseItem>>,
    }

    impl MockTransport {
        fn rejecting(doc_ids: &[&str]) -> Self {
            Self {
                rejected_doc_ids: doc_ids.iter().map(|id| id.to_string()).collect(),
                ..Self::default()
            }
        }

        fn answering(items: Vec<BulkResponseItem>) -> Self {
            Self {
                canned: Some(items),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl SearchTransport for MockTransport {
        async fn ping(&self) -> Result<bool> {
            Ok(true)
        }

        async fn index_exists(&self, _index: &str) -> Result<bool> {
            Ok(true)
        }

        async fn delete_index(&self, _index: &str) -> Result<()> {
            Ok(())
        }

        async fn bulk(
            &self,
            items: &[BulkRequestItem],
            timeout: Option<Duration>,
        ) -> Result<BulkResponse> {
            self.calls.lock().await.push((items.to_vec(), timeout));
            if let Some(canned) = &self.canned {
                return Ok(BulkResponse::new(canned.clone()));
            }
            let results = items
                .iter()
                .map(|item| {
                    let doc_id = item
                        .get_source()
                        .get("doc_id")
                        .and_then(|value| value.as_str())
                        .unwrap_or_default();
                    if self.rejected_doc_ids.contains(doc_id) {
                        BulkResponseItem::new(BulkItemResult::rejected(
                            item.get_index_name(),
                            400,
                            "mapper_parsing_exception",
                        ))
                    } else {
                        BulkResponseItem::new(BulkItemResult::created(item.get_index_name()))
                    }
                })
                .collect();
            Ok(BulkResponse::new(results))
        }
    }

    fn info(doc_id: &str) -> BasicInfo<'_> {
        BasicInfo {
            doc_id,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            date_and_time: "2024-01-05",
            username: None,
        }
    }

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|n| serde_json::from_value(json!({ "n": n })).unwrap())
            .collect()
    }

    fn options(chunk_size: usize, mode: SubmitMode) -> LoaderOptions {
        LoaderOptions {
            chunk_size,
            pause: Duration::ZERO,
            mode,
            ..LoaderOptions::default()
        }
    }

    #[test]
    fn queued_items_are_isolated_from_the_working_document() {
        let mut queue = Vec::new();
        let mut doc = Document::new();
        doc.insert("field", json!("before"));
        fill_list_of_docs(&mut queue, "logs", &doc);
        doc.insert("field", json!("after"));
        doc.insert("extra", json!(1));

        assert_eq!(queue[0].get_source().get("field"), Some(&json!("before")));
        assert!(!queue[0].get_source().contains("extra"));
    }

    #[test]
    fn every_record_gets_its_own_envelope() {
        let items = build_bulk_items(&records(3), "logs", &info("D1"));
        assert_eq!(items.len(), 3);
        for (n, item) in items.iter().enumerate() {
            assert_eq!(item.get_index_name(), "logs");
            assert_eq!(item.get_source().get("n"), Some(&json!(n)));
            assert_eq!(item.get_source().get("doc_id"), Some(&json!("D1")));
        }
    }

    #[tokio::test]
    async fn chunk_count_is_ceiling_of_items_over_size() {
        let mock = MockTransport::default();
        let loader = BulkLoader::new(&mock, options(4, SubmitMode::Sync));
        let report = loader.bulk_load(&records(10), "logs", &info("D1")).await.unwrap();

        let calls = mock.calls.lock().await;
        let sizes: Vec<usize> = calls.iter().map(|(items, _)| items.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(report.chunks.len(), 3);
        assert_eq!(report.submitted(), 10);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn exact_multiple_keeps_last_chunk_full() {
        let mock = MockTransport::default();
        let loader = BulkLoader::new(&mock, options(5, SubmitMode::Sync));
        loader.bulk_load(&records(10), "logs", &info("D1")).await.unwrap();

        let calls = mock.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0.len(), 5);
    }

    #[tokio::test]
    async fn no_records_means_no_submissions() {
        let mock = MockTransport::default();
        let loader = BulkLoader::new(&mock, options(5, SubmitMode::Quick));
        let report = loader.bulk_load(&[], "logs", &info("D1")).await.unwrap();

        assert!(mock.calls.lock().await.is_empty());
        assert_eq!(report, LoadReport::default());
    }

    #[tokio::test]
    async fn quick_mode_streams_sub_batches_with_timeout() {
        let mock = MockTransport::default();
        let loader = BulkLoader::new(
            &mock,
            LoaderOptions {
                stream_chunk_size: 3,
                ..options(10, SubmitMode::Quick)
            },
        );
        let report = loader.bulk_load(&records(7), "logs", &info("D1")).await.unwrap();

        let calls = mock.calls.lock().await;
        let sizes: Vec<usize> = calls.iter().map(|(items, _)| items.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(calls
            .iter()
            .all(|(_, timeout)| *timeout == Some(DEFAULT_REQUEST_TIMEOUT)));
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.succeeded(), 7);
    }

    #[tokio::test]
    async fn rejected_documents_are_reported_not_raised() {
        let mock = MockTransport::rejecting(&["BAD"]);
        for mode in [SubmitMode::Quick, SubmitMode::Sync] {
            let loader = BulkLoader::new(&mock, options(10, mode));
            let report = loader.bulk_load(&records(2), "logs", &info("BAD")).await.unwrap();

            assert_eq!(report.submitted(), 2);
            assert_eq!(report.succeeded(), 0);
            assert_eq!(report.failed_count(), 2);
            let failed = &report.chunks[0].failed;
            assert_eq!(failed.len(), 2);
            assert_eq!(failed[1].position, 1);
            assert_eq!(failed[1].status, 400);
            assert_eq!(failed[1].index_name, "logs");
            assert_eq!(failed[1].reason, "mapper_parsing_exception");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_after_every_chunk() {
        let mock = MockTransport::default();
        let loader = BulkLoader::new(
            &mock,
            LoaderOptions {
                pause: Duration::from_secs(60),
                ..options(2, SubmitMode::Sync)
            },
        );
        let start = tokio::time::Instant::now();
        loader.bulk_load(&records(5), "logs", &info("D1")).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test]
    async fn unanswered_documents_are_reported_as_failed() {
        let created = BulkResponseItem::new(BulkItemResult::created("logs"));
        let mock = MockTransport::answering(vec![created.clone(), created]);
        for mode in [SubmitMode::Quick, SubmitMode::Sync] {
            let loader = BulkLoader::new(&mock, options(10, mode));
            let report = loader.bulk_load(&records(3), "logs", &info("D1")).await.unwrap();

            assert_eq!(report.submitted(), 3);
            assert_eq!(report.succeeded(), 2);
            assert_eq!(report.failed_count(), 1);
            let failed = &report.chunks[0].failed;
            assert_eq!(failed.len(), report.failed_count());
            assert_eq!(
                failed[0],
                FailedItem {
                    position: 2,
                    index_name: "logs".to_string(),
                    status: MISSING_ITEM_STATUS,
                    reason: MISSING_ITEM_REASON.to_string(),
                }
            );
            assert!(!report.is_complete());
        }
    }

    #[tokio::test]
    async fn missing_positions_are_offset_across_sub_batches() {
        let mock = MockTransport::answering(vec![BulkResponseItem::new(BulkItemResult::created("logs"))]);
        let loader = BulkLoader::new(
            &mock,
            LoaderOptions {
                stream_chunk_size: 2,
                ..options(10, SubmitMode::Quick)
            },
        );
        let report = loader.bulk_load(&records(4), "logs", &info("D1")).await.unwrap();

        let positions: Vec<usize> = report.chunks[0].failed.iter().map(|item| item.position).collect();
        assert_eq!(positions, vec![1, 3]);
        assert_eq!(report.succeeded(), 2);
    }

    #[tokio::test]
    async fn surplus_response_items_are_ignored() {
        let created = BulkResponseItem::new(BulkItemResult::created("logs"));
        let mock = MockTransport::answering(vec![created; 4]);
        for mode in [SubmitMode::Quick, SubmitMode::Sync] {
            let loader = BulkLoader::new(&mock, options(10, mode));
            let report = loader.bulk_load(&records(2), "logs", &info("D1")).await.unwrap();

            assert_eq!(report.succeeded(), 2);
            assert_eq!(report.failed_count(), 0);
            assert!(report.chunks[0].failed.is_empty());
            assert!(report.is_complete());
        }
    }

    #[tokio::test]
    async fn updated_and_shard_degraded_documents_still_count_as_loaded() {
        let updated: BulkResponseItem = serde_json::from_value(json!({
            "index": { "_index": "logs", "_id": "1", "result": "updated", "status": 200,
                       "_shards": { "total": 2, "successful": 2, "failed": 0 } }
        }))
        .unwrap();
        let degraded: BulkResponseItem = serde_json::from_value(json!({
            "index": { "_index": "logs", "_id": "2", "result": "created", "status": 201,
                       "_shards": { "total": 2, "successful": 1, "failed": 1 } }
        }))
        .unwrap();
        let mock = MockTransport::answering(vec![updated, degraded]);

        for mode in [SubmitMode::Quick, SubmitMode::Sync] {
            let loader = BulkLoader::new(&mock, options(10, mode));
            let report = loader.bulk_load(&records(2), "logs", &info("D1")).await.unwrap();

            assert_eq!(report.submitted(), 2);
            assert_eq!(report.succeeded(), 2);
            assert!(report.chunks[0].failed.is_empty());
            assert!(report.is_complete());
        }
    }

    fn load_config(name: &str, content: &str) -> Config {
        let dir = std::env::temp_dir().join(format!("es-bulk-loader-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        Config::load(&path).unwrap()
    }

    #[test]
    fn defaults_match_an_empty_config() {
        let options = LoaderOptions::from_config(&load_config("minimal.json", r#"{ "hostname": "elk" }"#));
        let defaults = LoaderOptions::default();
        assert_eq!(options.chunk_size, defaults.chunk_size);
        assert_eq!(options.pause, defaults.pause);
        assert_eq!(options.mode, defaults.mode);
        assert_eq!(options.stream_chunk_size, defaults.stream_chunk_size);
        assert_eq!(options.request_timeout, defaults.request_timeout);
    }

    #[test]
    fn options_are_read_from_a_loaded_config() {
        let options = LoaderOptions::from_config(&load_config(
            "loader.json",
            r#"{ "hostname": "elk.internal", "chunk_size": 250, "pause_secs": 5,
                 "stream_chunk_size": 50, "request_timeout_secs": 30, "quick": false }"#,
        ));
        assert_eq!(options.chunk_size, 250);
        assert_eq!(options.pause, Duration::from_secs(5));
        assert_eq!(options.stream_chunk_size, 50);
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert_eq!(options.mode, SubmitMode::Sync);
    }
}
