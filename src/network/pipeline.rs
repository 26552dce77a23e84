// network/pipeline.rs - Capture loop, pass-through forwarding, analysis workers
use crate::network::capture::FrameIo;
use crate::network::parser::PacketParser;
use crate::security::SecurityAnalyzer;
use crate::storage::PacketSink;
use anyhow::Result;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Pipeline tuning knobs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of analysis worker threads
    pub workers: usize,
    /// Capacity of the analysis queue; a full queue drops analyses, never frames
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 256,
        }
    }
}

/// One frame queued for analysis off the forwarding path
struct AnalysisJob {
    frame: Vec<u8>,
    timestamp_ms: i64,
}

#[derive(Debug, Default)]
struct Counters {
    frames_forwarded: AtomicU64,
    frames_analyzed: AtomicU64,
    analysis_dropped: AtomicU64,
    forward_errors: AtomicU64,
}

/// Point-in-time pipeline counters
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    /// Frames written back to the interface
    pub frames_forwarded: u64,
    /// Frames whose analysis completed and reached the sink
    pub frames_analyzed: u64,
    /// Analyses dropped because the queue was full or the frame was rejected
    pub analysis_dropped: u64,
    /// Forward writes that failed
    pub forward_errors: u64,
}

/// Drives the capture loop: one reader thread owning the interface handle
/// plus a pool of analysis workers behind a bounded queue.
///
/// Forwarding happens synchronously on the reader's path in arrival order;
/// analyses complete in no particular order and never delay forwarding.
pub struct Pipeline {
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    reader: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Start the pipeline. The interface handle is owned by the reader
    /// thread until `stop`; the sink must tolerate unordered concurrent
    /// single-record writes.
    pub fn start(
        config: PipelineConfig,
        io: Box<dyn FrameIo>,
        sink: Arc<dyn PacketSink>,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(Counters::default());
        let (job_tx, job_rx) = bounded::<AnalysisJob>(config.queue_depth.max(1));

        let parser = Arc::new(PacketParser::new());
        let analyzer = Arc::new(SecurityAnalyzer::new());

        let worker_count = config.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = job_rx.clone();
            let parser = Arc::clone(&parser);
            let analyzer = Arc::clone(&analyzer);
            let sink = Arc::clone(&sink);
            let counters = Arc::clone(&counters);
            workers.push(
                thread::Builder::new()
                    .name(format!("analysis-{id}"))
                    .spawn(move || analysis_worker(rx, parser, analyzer, sink, counters))?,
            );
        }
        drop(job_rx);

        let reader = {
            let running = Arc::clone(&running);
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || capture_loop(io, job_tx, running, counters))?
        };

        info!("pipeline started with {} analysis workers", worker_count);
        Ok(Self {
            running,
            counters,
            reader: Some(reader),
            workers,
        })
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_forwarded: self.counters.frames_forwarded.load(Ordering::Relaxed),
            frames_analyzed: self.counters.frames_analyzed.load(Ordering::Relaxed),
            analysis_dropped: self.counters.analysis_dropped.load(Ordering::Relaxed),
            forward_errors: self.counters.forward_errors.load(Ordering::Relaxed),
        }
    }

    /// Stop the capture loop and release the interface handle.
    ///
    /// The reader exits within one read timeout; queued analyses are drained
    /// best-effort before the workers are joined.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!("pipeline stopped");
    }
}

fn capture_loop(
    mut io: Box<dyn FrameIo>,
    jobs: Sender<AnalysisJob>,
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    while running.load(Ordering::SeqCst) {
        let frame = match io.read_frame() {
            Ok(Some(frame)) if !frame.is_empty() => frame,
            Ok(_) => continue, // timeout or empty read, retry
            Err(e) => {
                warn!("frame read error: {e:#}");
                continue;
            }
        };

        let timestamp_ms = chrono::Utc::now().timestamp_millis();

        // Forward first: inspection must never add latency to this path.
        match io.write_frame(&frame) {
            Ok(()) => {
                counters.frames_forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.forward_errors.fetch_add(1, Ordering::Relaxed);
                warn!("frame forward error: {e:#}");
            }
        }

        match jobs.try_send(AnalysisJob {
            frame,
            timestamp_ms,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                counters.analysis_dropped.fetch_add(1, Ordering::Relaxed);
                debug!("analysis queue full, dropping frame analysis");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("analysis workers gone, stopping capture loop");
                break;
            }
        }
    }
    // io and the job sender drop here: the interface handle is released on
    // every exit path and the workers see end-of-queue.
}

fn analysis_worker(
    jobs: Receiver<AnalysisJob>,
    parser: Arc<PacketParser>,
    analyzer: Arc<SecurityAnalyzer>,
    sink: Arc<dyn PacketSink>,
    counters: Arc<Counters>,
) {
    for job in jobs.iter() {
        // Any failure in the chain is contained to this frame's analysis.
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let packet = match parser.parse(&job.frame, job.timestamp_ms) {
                Ok(packet) => packet,
                Err(e) => {
                    debug!("frame not analyzed: {e}");
                    counters.analysis_dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            let findings = analyzer.analyze(&packet);
            for finding in &findings {
                debug!(
                    "{} [{}] {} ({})",
                    finding.kind.as_str(),
                    finding.severity,
                    finding.description,
                    finding.evidence
                );
            }

            sink.store(packet.into_record(findings.len()));
            counters.frames_analyzed.fetch_add(1, Ordering::Relaxed);
        }));

        if outcome.is_err() {
            counters.analysis_dropped.fetch_add(1, Ordering::Relaxed);
            debug!("analysis task panicked, dropping frame analysis");
        }
    }
}
