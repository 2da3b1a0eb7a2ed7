//! Randomized rect sessions
//!
//! A session allocates a set of randomly sized buffers, performs a sequence of
//! randomly chosen copy, read-and-verify and write operations between them,
//! and finally verifies every buffer against its shadow. Every random choice
//! is drawn from one seeded generator, so a seed reproduces a session exactly.

pub mod config;

use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::backend::RectDevice;
use crate::error::RectResult;
use crate::mirror::{CopyOutcome, MirrorExecutor};
use crate::region::{BufferLayout, Coord3, Region};
use crate::verify::Verifier;

pub use config::RectStressConfig;

/// Attempts at drawing buffer dimensions that fit the allocation limit
pub const MAX_SIZE_TRIES: usize = 1_048_576;

/// Draw a size in `[low, high)`, or `low` when the range is empty.
pub fn random_size<R: Rng>(rng: &mut R, low: usize, high: usize) -> usize {
    if high <= low {
        low
    } else {
        rng.gen_range(low..high)
    }
}

/// One randomly selected session operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Copy,
    ReadVerify,
    Write,
}

impl Operation {
    pub const COUNT: usize = 3;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Operation::Copy),
            1 => Some(Operation::ReadVerify),
            2 => Some(Operation::Write),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Copy => write!(f, "copy"),
            Operation::ReadVerify => write!(f, "read+verify"),
            Operation::Write => write!(f, "write"),
        }
    }
}

/// Dimensions of one session buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSummary {
    pub index: usize,
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub size_bytes: usize,
}

/// Operation counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub copies: usize,
    pub skipped_overlaps: usize,
    pub read_verifies: usize,
    pub writes: usize,
}

/// Outcome of a successful session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressReport {
    pub device: String,
    pub seed: u64,
    pub num_tries: usize,
    pub max_dimension: usize,
    pub total_bytes: usize,
    pub max_buffer_bytes: usize,
    pub buffers: Vec<BufferSummary>,
    pub operations: OperationCounts,
}

/// Source and destination of one random operation
#[derive(Debug, Clone, Copy)]
struct PlannedOp {
    operation: Operation,
    src: usize,
    src_region: Region,
    dst: usize,
    dst_region: Region,
}

/// Randomized session against one device
pub struct RectStressTest<D: RectDevice> {
    config: RectStressConfig,
    executor: MirrorExecutor<D>,
    counts: OperationCounts,
}

impl<D: RectDevice> RectStressTest<D> {
    /// # Errors
    /// `InvalidConfiguration` if `config` does not validate.
    pub fn new(device: D, config: RectStressConfig) -> RectResult<Self> {
        config.validate()?;
        let executor = MirrorExecutor::new(device, config.seed)
            .with_verifier(Verifier::new(config.max_reported_mismatches));
        Ok(RectStressTest {
            config,
            executor,
            counts: OperationCounts::default(),
        })
    }

    pub fn config(&self) -> &RectStressConfig {
        &self.config
    }

    fn plan_layout(&mut self, max_dim: usize) -> RectResult<BufferLayout> {
        let es = self.config.element_size;
        let rng = self.executor.rng_mut();
        for _ in 0..MAX_SIZE_TRIES {
            let width = random_size(rng, 1, max_dim);
            let height = random_size(rng, 1, max_dim);
            let depth = random_size(rng, 1, max_dim);
            let fits = width
                .checked_mul(height)
                .and_then(|n| n.checked_mul(depth))
                .and_then(|n| n.checked_mul(es))
                .map_or(false, |size| size <= self.config.max_alloc_bytes);
            if fits {
                return BufferLayout::new(width, height, depth, es);
            }
        }
        Err(crate::config_error!(
            "could not find random buffer sized at most {} bytes in {} tries",
            self.config.max_alloc_bytes,
            MAX_SIZE_TRIES
        ))
    }

    fn setup(&mut self, max_dim: usize) -> RectResult<()> {
        tracing::info!(
            "Creating {} pairs of random sized host and device buffers",
            self.config.num_buffers
        );

        let mut layouts = Vec::with_capacity(self.config.num_buffers);
        for index in 0..self.config.num_buffers {
            let layout = self.plan_layout(max_dim)?;
            tracing::info!(
                "Buffer[{}] is ({},{},{}) = {} MB (truncated)",
                index,
                layout.width,
                layout.height,
                layout.depth,
                layout.size_bytes() / 1_048_576
            );
            layouts.push(layout);
        }
        tracing::info!(
            "Total size: {} MB (truncated)",
            layouts.iter().map(|l| l.size_bytes()).sum::<usize>() / 1_048_576
        );

        for layout in layouts {
            self.executor.add_random_buffer(layout)?;
        }
        Ok(())
    }

    fn plan_operation(&mut self) -> RectResult<PlannedOp> {
        let num_buffers = self.executor.arena().len();
        let rng = self.executor.rng_mut();
        let src = random_size(rng, 0, num_buffers);
        let dst = random_size(rng, 0, num_buffers);

        let src_bounds = self.executor.buffer(src)?.layout().bounds();
        let dst_bounds = self.executor.buffer(dst)?.layout().bounds();
        let min: Coord3 = [
            src_bounds[0].min(dst_bounds[0]),
            src_bounds[1].min(dst_bounds[1]),
            src_bounds[2].min(dst_bounds[2]),
        ];

        let rng = self.executor.rng_mut();
        let mut start = [0usize; 3];
        for axis in 0..3 {
            start[axis] = random_size(rng, 0, min[axis] - 1);
        }
        let mut extent = [0usize; 3];
        for axis in 0..3 {
            extent[axis] = random_size(rng, 1, min[axis] - start[axis]);
        }
        let mut src_offset = [0usize; 3];
        for axis in 0..3 {
            src_offset[axis] = random_size(rng, 0, src_bounds[axis] - extent[axis]);
        }
        let mut dst_offset = [0usize; 3];
        for axis in 0..3 {
            dst_offset[axis] = random_size(rng, 0, dst_bounds[axis] - extent[axis]);
        }

        let index = random_size(rng, 0, Operation::COUNT);
        let operation = Operation::from_index(index)
            .ok_or_else(|| crate::error::RectCheckError::InternalError(format!("operation index {}", index)))?;

        Ok(PlannedOp {
            operation,
            src,
            src_region: Region {
                offset: src_offset,
                extent,
            },
            dst,
            dst_region: Region {
                offset: dst_offset,
                extent,
            },
        })
    }

    fn execute(&mut self, op: &PlannedOp) -> RectResult<()> {
        tracing::debug!(
            "{} src {} offset {:?} region {:?} -> dst {} offset {:?}",
            op.operation,
            op.src,
            op.src_region.offset,
            op.src_region.extent,
            op.dst,
            op.dst_region.offset
        );

        match op.operation {
            Operation::Copy => {
                match self
                    .executor
                    .copy_region(op.src, op.src_region, op.dst, op.dst_region)?
                {
                    CopyOutcome::Copied => self.counts.copies += 1,
                    CopyOutcome::SkippedOverlap => self.counts.skipped_overlaps += 1,
                }
            }
            Operation::ReadVerify => {
                self.executor
                    .read_verify_region(op.src, op.src_region, op.dst, op.dst_region.offset)?;
                self.counts.read_verifies += 1;
            }
            Operation::Write => {
                self.executor
                    .write_region(op.src, op.src_region.offset, op.dst, op.dst_region)?;
                self.counts.writes += 1;
            }
        }

        if self.config.verify_each_operation {
            self.executor.map_verify_buffer(op.src)?;
            self.executor.map_verify_buffer(op.dst)?;
        }
        Ok(())
    }

    /// Run the session: allocate, perform `num_tries` random operations,
    /// verify every buffer, release.
    ///
    /// # Errors
    /// The first setup, device or verification error. Nothing is retried.
    pub fn run(mut self) -> RectResult<StressReport> {
        let max_dim = self.config.max_dimension();
        tracing::info!("Using maximum dimension = {}", max_dim);

        self.setup(max_dim)?;

        tracing::info!(
            "Executing {} test operations selected at random",
            self.config.num_tries
        );
        for iter in 0..self.config.num_tries {
            let op = self.plan_operation()?;
            if let Err(e) = self.execute(&op) {
                tracing::error!(
                    "Operation {} ({}) src {} -> dst {} failed: {}",
                    iter,
                    op.operation,
                    op.src,
                    op.dst,
                    e
                );
                return Err(e);
            }
        }

        self.executor.verify_all()?;

        let buffers: Vec<BufferSummary> = self
            .executor
            .arena()
            .iter()
            .enumerate()
            .map(|(index, state)| {
                let layout = state.layout();
                BufferSummary {
                    index,
                    width: layout.width,
                    height: layout.height,
                    depth: layout.depth,
                    size_bytes: layout.size_bytes(),
                }
            })
            .collect();

        let report = StressReport {
            device: self.executor.device().name().to_string(),
            seed: self.config.seed,
            num_tries: self.config.num_tries,
            max_dimension: max_dim,
            total_bytes: self.executor.arena().total_bytes(),
            max_buffer_bytes: self.executor.arena().max_size_bytes(),
            buffers,
            operations: self.counts.clone(),
        };

        self.executor.release_all()?;
        tracing::info!(
            "RECT read, write test passed: {} copies ({} skipped overlaps), {} reads, {} writes",
            report.operations.copies,
            report.operations.skipped_overlaps,
            report.operations.read_verifies,
            report.operations.writes
        );
        Ok(report)
    }
}

/// Run one session of `config` against `device`
pub fn run_stress<D: RectDevice>(device: D, config: &RectStressConfig) -> RectResult<StressReport> {
    RectStressTest::new(device, config.clone())?.run()
}
