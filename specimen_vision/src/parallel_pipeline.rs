// THEORY:
// Each frame's measurement is a pure function of that frame's pixels, so frames can
// be analysed on as many cores as the machine has. The only ordering constraint is
// on the way out: records must reach the emitter in gap-free frame order.
//
// Architecture:
// 1.  **Dispatcher**: a single task that receives `FrameTask`s and hands them to the
//     workers round-robin.
// 2.  **Workers**: each owns a copy of the `VisionPipeline` and runs the CPU-bound
//     analysis on tokio's blocking pool, then answers on the task's oneshot channel.
// 3.  **Resequencer**: results come back in completion order; they are parked by
//     frame index and released only when the next expected index arrives.
//
// The number of frames in flight is bounded so that a fast source cannot buffer an
// entire video in memory while the workers catch up.

use crate::core_modules::measurement::{MeasurementEmitter, MeasurementSink};
use crate::error::{Result, VisionError};
use crate::frame_source::{Frame, FrameSource};
use crate::overlay::SnapshotWriter;
use crate::pipeline::{FrameAnalysis, RunSummary, VisionPipeline};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Frames allowed in flight per worker.
const FRAMES_PER_WORKER: usize = 2;

/// One worker per logical core.
pub fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

pub struct FrameTask {
    pub frame: Frame,
    pub result_sender: oneshot::Sender<Result<FrameAnalysis>>,
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<FrameTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawns the dispatcher and `worker_count` workers on the current runtime.
    pub fn new(pipeline: VisionPipeline, snapshots: Option<SnapshotWriter>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<FrameTask>();
        let mut workers = Vec::with_capacity(worker_count + 1);

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<FrameTask>())
            .unzip();

        workers.push(tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    tracing::error!(worker = worker_idx, "worker channel closed");
                    break;
                }
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        }));

        let pipeline = Arc::new(pipeline);
        let snapshots = snapshots.map(Arc::new);
        for mut worker_receiver in worker_receivers {
            let pipeline = Arc::clone(&pipeline);
            let snapshots = snapshots.clone();

            workers.push(tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let pipeline = Arc::clone(&pipeline);
                    let snapshots = snapshots.clone();
                    let frame = task.frame;
                    let outcome = tokio::task::spawn_blocking(move || {
                        let analysis = pipeline.analyze(frame.index, &frame.image);
                        if let Some(snapshots) = snapshots.as_deref() {
                            snapshots.save(&frame.image, &analysis)?;
                        }
                        Ok::<_, VisionError>(analysis)
                    })
                    .await
                    .unwrap_or(Err(VisionError::WorkerPool("frame analysis panicked")));

                    let _ = task.result_sender.send(outcome);
                }
            }));
        }

        tracing::debug!(workers = worker_count, "worker pool started");
        Self {
            task_sender,
            workers,
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queues a frame and returns the channel its analysis will arrive on.
    pub fn submit(&self, frame: Frame) -> Result<oneshot::Receiver<Result<FrameAnalysis>>> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(FrameTask { frame, result_sender })
            .map_err(|_| VisionError::WorkerPool("failed to send task to worker pool"))?;
        Ok(result_receiver)
    }

    pub async fn process_frame(&self, frame: Frame) -> Result<FrameAnalysis> {
        self.submit(frame)?
            .await
            .map_err(|_| VisionError::WorkerPool("failed to receive result from worker"))?
    }

    /// Closes the queue and waits for every worker to drain.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.task_sender);
        for worker in self.workers {
            worker
                .await
                .map_err(|_| VisionError::WorkerPool("worker task panicked"))?;
        }
        Ok(())
    }
}

/// Restores frame order over results that complete out of order.
#[derive(Debug, Default)]
pub struct Resequencer {
    pending_frames: HashMap<u64, FrameAnalysis>,
    next_expected_frame: u64,
}

impl Resequencer {
    pub fn starting_at(first_frame: u64) -> Self {
        Self {
            pending_frames: HashMap::new(),
            next_expected_frame: first_frame,
        }
    }

    /// Parks `analysis` and returns every result that is now releasable, in order.
    pub fn push(&mut self, analysis: FrameAnalysis) -> Vec<FrameAnalysis> {
        self.pending_frames.insert(analysis.measurement.frame_index, analysis);
        let mut ready = Vec::new();
        while let Some(next) = self.pending_frames.remove(&self.next_expected_frame) {
            ready.push(next);
            self.next_expected_frame += 1;
        }
        ready
    }

    pub fn next_expected_frame(&self) -> u64 {
        self.next_expected_frame
    }

    /// Results still waiting on an earlier frame.
    pub fn pending(&self) -> usize {
        self.pending_frames.len()
    }
}

/// Runs the measurement pipeline over a frame source on a worker pool.
pub struct ParallelPipeline {
    worker_pool: WorkerPool,
    max_in_flight: usize,
}

impl ParallelPipeline {
    pub fn new(pipeline: VisionPipeline, worker_count: usize) -> Self {
        Self::with_snapshots(pipeline, None, worker_count)
    }

    pub fn with_snapshots(pipeline: VisionPipeline, snapshots: Option<SnapshotWriter>, worker_count: usize) -> Self {
        let worker_pool = WorkerPool::new(pipeline, snapshots, worker_count);
        let max_in_flight = worker_pool.worker_count() * FRAMES_PER_WORKER;
        Self {
            worker_pool,
            max_in_flight,
        }
    }

    /// Drains `source`, emitting every record through `emitter` in frame order.
    pub async fn process_all<F, S>(&self, source: &mut F, emitter: &mut MeasurementEmitter<S>) -> Result<RunSummary>
    where
        F: FrameSource + ?Sized,
        S: MeasurementSink,
    {
        let first_frame = emitter.next_index();
        let zeroed_before = emitter.zeroed_frames();
        let mut resequencer = Resequencer::starting_at(first_frame);
        let mut in_flight = FuturesUnordered::new();
        let mut exhausted = false;

        loop {
            while !exhausted && in_flight.len() < self.max_in_flight {
                match source.next_frame()? {
                    Some(frame) => in_flight.push(self.worker_pool.submit(frame)?),
                    None => exhausted = true,
                }
            }

            let Some(outcome) = in_flight.next().await else {
                break;
            };
            let analysis = outcome.map_err(|_| VisionError::WorkerPool("failed to receive result from worker"))??;
            for ready in resequencer.push(analysis) {
                emitter.emit(ready.measurement)?;
            }
        }

        if resequencer.pending() > 0 {
            return Err(VisionError::OutOfOrder {
                expected: resequencer.next_expected_frame(),
                got: resequencer.next_expected_frame() + resequencer.pending() as u64,
            });
        }

        let summary = RunSummary {
            frames: emitter.next_index() - first_frame,
            zeroed_frames: emitter.zeroed_frames() - zeroed_before,
        };
        tracing::info!(
            frames = summary.frames,
            zeroed = summary.zeroed_frames,
            workers = self.worker_pool.worker_count(),
            "parallel run complete"
        );
        Ok(summary)
    }

    pub async fn shutdown(self) -> Result<()> {
        self.worker_pool.shutdown().await
    }
}
