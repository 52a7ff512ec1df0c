//! Bounded-concurrency batch pipeline.
//!
//! One run drives the extract, dedupe, transform, merge cycle over every file
//! a [`FileSource`] lists. Two nested limits apply: an outer semaphore bounds
//! file tasks, an inner one (shared by the whole run) bounds remote calls.
//! Every remote call first passes the run's [`RateLimiter`].
//!
//! Failures never escape a chunk: a failed call becomes a [`ChunkError`] and
//! the chunk's original text stands in for the transformed one.

mod rate_limiter;

pub use rate_limiter::RateLimiter;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunkers::{dedupe, ChunkExtractor, TokenCounter};
use crate::error::{ChunkError, ChunkErrorKind, ConfigError, GatewayError, Result};
use crate::graph::{ChunkAnalysis, CodeGraph};
use crate::merge::Reassembler;
use crate::output::TransformGateway;
use crate::processing::FileSource;
use crate::types::{
    BatchResult, Chunk, ConcurrencyPreset, ConcurrencyProfile, PipelineConfig, PipelineMode,
    RepositoryResult, SourceDocument, TransformedChunk,
};
use crate::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    /// Listing files and resolving the concurrency profile
    Scheduling = 1,
    /// Dispatching file tasks
    Running = 2,
    /// Waiting for in-flight file tasks
    Draining = 3,
    Done = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Scheduling,
            2 => RunState::Running,
            3 => RunState::Draining,
            4 => RunState::Done,
            _ => RunState::Idle,
        }
    }
}

/// Current and peak count of holders.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a> {
    gauge: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything one run's tasks share. Built once per run.
struct RunContext {
    extractor: Arc<ChunkExtractor>,
    gateway: Arc<dyn TransformGateway>,
    reassembler: Arc<Reassembler>,
    max_tokens: usize,
    request_timeout: Duration,
    mode: PipelineMode,
    calls: Semaphore,
    limiter: RateLimiter,
    active_files: InFlight,
    active_calls: InFlight,
}

impl RunContext {
    async fn process_file(&self, source: &dyn FileSource, path: PathBuf) -> BatchResult {
        let started = Instant::now();

        let text = match source.read_file(&path).await {
            Ok(text) => text,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read file");
                return BatchResult::failed(path, e);
            }
        };

        // Parsing and token counting are CPU-bound
        let doc = SourceDocument::from_file(path.clone(), text);
        let extractor = Arc::clone(&self.extractor);
        let max_tokens = self.max_tokens;
        let task = tokio::task::spawn_blocking(move || dedupe(extractor.extract(&doc, max_tokens)));
        let chunks = match task.await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Chunk extraction aborted");
                return BatchResult::failed(path, format!("chunk extraction aborted: {e}"));
            }
        };
        debug!(path = %path.display(), chunks = chunks.len(), "Extracted chunks");

        let replies = join_all(chunks.iter().map(|chunk| self.call(chunk))).await;

        let mut result = BatchResult::pending(path);
        match self.mode {
            PipelineMode::Document => self.merge_document(&mut result, chunks, replies),
            PipelineMode::Graph => self.build_graph(&mut result, &chunks, replies),
        }
        result.elapsed_ms = started.elapsed().as_millis() as u64;

        debug!(
            path = %result.path.display(),
            status = ?result.status,
            errors = result.errors.len(),
            elapsed_ms = result.elapsed_ms,
            "File processed"
        );
        result
    }

    /// One remote call under the shared call limit, rate limiter and timeout.
    async fn call(&self, chunk: &Chunk) -> Result<String, ChunkError> {
        let _permit = self.calls.acquire().await.map_err(|_| {
            ChunkError::new(
                &chunk.qualified_name,
                ChunkErrorKind::GatewayUnavailable,
                "call limiter closed",
            )
        })?;
        self.limiter.acquire().await;
        let _active = self.active_calls.enter();

        let reply = match timeout(self.request_timeout, self.gateway.transform(&chunk.content)).await {
            Ok(reply) => reply,
            Err(_) => Err(GatewayError::Timeout(self.request_timeout)),
        };

        reply.map_err(|e| {
            warn!(
                chunk = %chunk.qualified_name,
                kind = ?e.kind(),
                error = %e,
                "Chunk transform failed, keeping original text"
            );
            ChunkError::from_gateway(&chunk.qualified_name, &e)
        })
    }

    fn merge_document(
        &self,
        result: &mut BatchResult,
        chunks: Vec<Chunk>,
        replies: Vec<Result<String, ChunkError>>,
    ) {
        let transformed: Vec<TransformedChunk> = chunks
            .into_iter()
            .zip(replies)
            .map(|(chunk, reply)| match reply {
                Ok(text) => TransformedChunk::success(chunk, text),
                Err(err) => TransformedChunk::failure(chunk, err),
            })
            .collect();

        for chunk in &transformed {
            result.record(chunk);
        }

        let outcome = self.reassembler.merge(&transformed);
        if !outcome.repairs.is_empty() {
            debug!(path = %result.path.display(), repairs = outcome.repairs.len(), "Merged document repaired");
        }
        let warnings = outcome.warning.map(|w| w.issues).unwrap_or_default();
        result.seal(Some(outcome.document), warnings);
    }

    fn build_graph(
        &self,
        result: &mut BatchResult,
        chunks: &[Chunk],
        replies: Vec<Result<String, ChunkError>>,
    ) {
        let mut analyses = Vec::new();

        for (chunk, reply) in chunks.iter().zip(replies) {
            let analysis = reply.and_then(|text| {
                ChunkAnalysis::parse(&text).map_err(|e| {
                    warn!(chunk = %chunk.qualified_name, error = %e, "Reply is not a valid analysis");
                    ChunkError::new(
                        &chunk.qualified_name,
                        ChunkErrorKind::InvalidAnalysis,
                        format!("reply is not a valid analysis: {e}"),
                    )
                })
            });

            match analysis {
                Ok(analysis) => {
                    result.record_success();
                    analyses.push(analysis);
                }
                Err(err) => result.record_error(err),
            }
        }

        result.graph = Some(CodeGraph::from_analysis(&ChunkAnalysis::combine(analyses)));
        result.seal(None, Vec::new());
    }
}

/// Drives batch runs over a repository.
///
/// ```no_run
/// use std::sync::Arc;
/// use splicer::{ApproximateCounter, BatchProcessor, HttpTransformGateway, LocalRepository, PipelineConfig};
///
/// # tokio_test::block_on(async {
/// let config = PipelineConfig::default();
/// let gateway = Arc::new(HttpTransformGateway::from_config(&config).unwrap());
/// let counter = Arc::new(ApproximateCounter::new());
/// let processor = BatchProcessor::from_config(&config, counter, gateway).unwrap();
///
/// let repo = Arc::new(LocalRepository::open("path/to/repo").unwrap());
/// let report = processor.run(repo).await.unwrap();
/// println!("{}", report.summary());
/// # });
/// ```
pub struct BatchProcessor {
    extractor: Arc<ChunkExtractor>,
    gateway: Arc<dyn TransformGateway>,
    reassembler: Arc<Reassembler>,
    max_tokens: usize,
    preset: ConcurrencyPreset,
    profile: Option<ConcurrencyProfile>,
    request_timeout: Duration,
    mode: PipelineMode,
    state: AtomicU8,
}

impl BatchProcessor {
    /// Create a processor with the balanced preset in document mode.
    pub fn new(
        extractor: ChunkExtractor,
        gateway: Arc<dyn TransformGateway>,
        max_tokens: usize,
    ) -> Self {
        Self {
            extractor: Arc::new(extractor),
            gateway,
            reassembler: Arc::new(Reassembler::new()),
            max_tokens,
            preset: ConcurrencyPreset::default(),
            profile: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            mode: PipelineMode::default(),
            state: AtomicU8::new(RunState::Idle as u8),
        }
    }

    /// Processor configured from the pipeline configuration.
    pub fn from_config(
        config: &PipelineConfig,
        counter: Arc<dyn TokenCounter>,
        gateway: Arc<dyn TransformGateway>,
    ) -> Result<Self, ConfigError> {
        let preset = config.concurrency_preset()?;
        let max_tokens = config.token_budget()?;

        Ok(Self::new(ChunkExtractor::new(counter), gateway, max_tokens)
            .with_preset(preset)
            .with_mode(config.mode)
            .with_request_timeout(config.request_timeout()))
    }

    pub fn with_preset(mut self, preset: ConcurrencyPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Use a fixed profile instead of scaling the preset.
    pub fn with_profile(mut self, profile: ConcurrencyProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_reassembler(mut self, reassembler: Reassembler) -> Self {
        self.reassembler = Arc::new(reassembler);
        self
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, next: RunState) {
        let previous = RunState::from_u8(self.state.swap(next as u8, Ordering::SeqCst));
        debug!(from = ?previous, to = ?next, "Batch run state changed");
    }

    /// Effective profile for a run over `file_count` files.
    pub fn profile_for(&self, file_count: usize) -> ConcurrencyProfile {
        self.profile
            .unwrap_or_else(|| ConcurrencyProfile::scaled(self.preset, file_count))
    }

    /// Process every file of `source`.
    ///
    /// Only a failure to list the files is returned as an error; everything
    /// below that is recorded in the returned report.
    pub async fn run(&self, source: Arc<dyn FileSource>) -> Result<RepositoryResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        self.transition(RunState::Scheduling);
        let files = match source.list_files().await {
            Ok(files) => files,
            Err(e) => {
                error!(%run_id, root = %source.root().display(), error = %e, "Failed to list files");
                self.transition(RunState::Done);
                return Err(e.into());
            }
        };

        let profile = self.profile_for(files.len());
        info!(
            %run_id,
            root = %source.root().display(),
            files = files.len(),
            mode = ?self.mode,
            max_files = profile.max_concurrent_files,
            max_calls = profile.max_concurrent_remote_calls,
            delay_ms = profile.base_rate_limit_delay.as_millis() as u64,
            "Starting batch run"
        );

        let ctx = Arc::new(RunContext {
            extractor: Arc::clone(&self.extractor),
            gateway: Arc::clone(&self.gateway),
            reassembler: Arc::clone(&self.reassembler),
            max_tokens: self.max_tokens,
            request_timeout: self.request_timeout,
            mode: self.mode,
            calls: Semaphore::new(profile.max_concurrent_remote_calls.max(1)),
            limiter: RateLimiter::new(profile.base_rate_limit_delay),
            active_files: InFlight::default(),
            active_calls: InFlight::default(),
        });
        let file_permits = Arc::new(Semaphore::new(profile.max_concurrent_files.max(1)));

        self.transition(RunState::Running);
        let mut tasks = JoinSet::new();
        for path in &files {
            let ctx = Arc::clone(&ctx);
            let source = Arc::clone(&source);
            let permits = Arc::clone(&file_permits);
            let path = path.clone();

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return BatchResult::failed(path, "file limiter closed"),
                };
                let _active = ctx.active_files.enter();
                ctx.process_file(source.as_ref(), path).await
            });
        }

        self.transition(RunState::Draining);
        let mut results = Vec::with_capacity(files.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(%run_id, error = %e, "File task aborted"),
            }
        }

        let finished: HashSet<PathBuf> = results.iter().map(|r| r.path.clone()).collect();
        for path in files.iter().filter(|p| !finished.contains(*p)) {
            results.push(BatchResult::failed(path.clone(), "file task aborted"));
        }

        let graph = (self.mode == PipelineMode::Graph).then(|| {
            let mut graph = CodeGraph::new();
            for file_graph in results.iter().filter_map(|r| r.graph.as_ref()) {
                graph.merge(file_graph);
            }
            graph
        });

        let mut report = RepositoryResult::from_files(
            run_id,
            source.root().display().to_string(),
            self.mode,
            profile,
            started_at,
            results,
        );
        report.graph = graph;
        report.peak_concurrent_files = ctx.active_files.peak();
        report.peak_concurrent_calls = ctx.active_calls.peak();

        self.transition(RunState::Done);
        info!(%run_id, summary = %report.summary(), "Batch run complete");
        Ok(report)
    }
}
