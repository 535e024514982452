//! Bounded streaming pipeline
//!
//! A single background thread pulls blocks from a [`BlockSource`] and pushes
//! them into a [`BoundedQueue`]; the consumer pulls from the other end. The
//! queue capacity bounds how far production can run ahead of consumption.

use crate::config::TraversalConfig;
use crate::cursor::BlockSource;
use crate::error::{BlockError, Result};
use crate::progress::ProgressHandle;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Result of a pull from the queue
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Item(T),
    /// Production has finished and the queue is drained
    EndOfStream,
}

impl<T> Fetched<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Fetched::EndOfStream)
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            Fetched::Item(item) => Some(item),
            Fetched::EndOfStream => None,
        }
    }
}

/// Queue depth relative to the target depth of `1 + capacity / 2`
///
/// Advisory only; flow control is done by blocking `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    /// Below target: the consumer is outrunning production
    Draining,
    Steady,
    /// Above target: production is outrunning the consumer
    Filling,
}

struct QueueState<T> {
    items: VecDeque<T>,
    finished: bool,
    closed: bool,
    high_water: usize,
}

/// Blocking FIFO with a fixed capacity
pub struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BlockError::InvalidArgument(
                "queue capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                finished: false,
                closed: false,
                high_water: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    /// Append an item, blocking while the queue is full
    ///
    /// Fails with `PipelineClosed` once the consumer side has closed the queue.
    pub fn put(&self, item: T) -> Result<()> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(BlockError::PipelineClosed);
        }
        state.items.push_back(item);
        state.high_water = state.high_water.max(state.items.len());
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the front item, blocking while the queue is empty and production
    /// is still running
    pub fn get(&self) -> Fetched<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Fetched::Item(item);
            }
            if state.finished || state.closed {
                return Fetched::EndOfStream;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Mark production as finished and wake every waiter
    pub fn signal_end_of_production(&self) {
        let mut state = self.state.lock();
        state.finished = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Close from the consumer side: pending items are dropped and
    /// further `put`s fail
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.items.clear();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest depth the queue has reached
    pub fn high_water_mark(&self) -> usize {
        self.state.lock().high_water
    }

    pub fn fill_state(&self) -> FillState {
        let target = 1 + self.capacity / 2;
        match self.len().cmp(&target) {
            std::cmp::Ordering::Less => FillState::Draining,
            std::cmp::Ordering::Equal => FillState::Steady,
            std::cmp::Ordering::Greater => FillState::Filling,
        }
    }
}

/// Cooperative stop flag shared with the production thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Signals end of production when the production thread exits, panics included
struct EndOfProduction<'a, T>(&'a BoundedQueue<T>);

impl<T> Drop for EndOfProduction<'_, T> {
    fn drop(&mut self) {
        self.0.signal_end_of_production();
    }
}

/// Blocks produced on a background thread, consumed in order
pub struct Pipeline<T: Send + 'static> {
    queue: Arc<BoundedQueue<Result<T>>>,
    token: CancellationToken,
    progress: ProgressHandle,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start producing from `source` into a queue of `capacity` items
    pub fn spawn<S>(source: S, capacity: usize) -> Result<Self>
    where
        S: BlockSource<Item = T>,
    {
        Self::start(source, capacity, false)
    }

    /// Start producing with the queue capacity and empty-item skipping of
    /// `config`
    ///
    /// Skipped items never reach the queue; progress still counts them.
    pub fn spawn_with_config<S>(source: S, config: &TraversalConfig) -> Result<Self>
    where
        S: BlockSource<Item = T>,
    {
        config.validate()?;
        Self::start(source, config.queue_capacity, config.skip_empty)
    }

    fn start<S>(source: S, capacity: usize, skip_empty: bool) -> Result<Self>
    where
        S: BlockSource<Item = T>,
    {
        let queue = Arc::new(BoundedQueue::new(capacity)?);
        let token = CancellationToken::new();
        let progress = source.progress();

        let worker = thread::Builder::new()
            .name("block-producer".to_string())
            .spawn({
                let queue = Arc::clone(&queue);
                let token = token.clone();
                move || produce(source, &queue, &token, skip_empty)
            })?;
        debug!(
            capacity,
            skip_empty,
            total = progress.total_work(),
            "pipeline started"
        );

        Ok(Self {
            queue,
            token,
            progress,
            worker: Some(worker),
        })
    }

    /// Next block, blocking until one is ready
    ///
    /// A production error is returned once; the stream then ends.
    pub fn get(&self) -> Result<Fetched<T>> {
        match self.queue.get() {
            Fetched::Item(Ok(item)) => Ok(Fetched::Item(item)),
            Fetched::Item(Err(err)) => Err(err),
            Fetched::EndOfStream => Ok(Fetched::EndOfStream),
        }
    }

    /// Ask the production thread to stop after the block in flight
    ///
    /// Blocks already queued are still delivered.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Progress of the source traversal
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn fill_state(&self) -> FillState {
        self.queue.fill_state()
    }

    /// Blocks produced but not yet consumed
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn high_water_mark(&self) -> usize {
        self.queue.high_water_mark()
    }
}

impl<T: Send + 'static> Iterator for Pipeline<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.get() {
            Ok(Fetched::Item(item)) => Some(Ok(item)),
            Ok(Fetched::EndOfStream) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl<T: Send + 'static> Drop for Pipeline<T> {
    fn drop(&mut self) {
        self.token.cancel();
        self.queue.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("block production thread panicked");
            }
        }
    }
}

fn produce<S: BlockSource>(
    mut source: S,
    queue: &BoundedQueue<Result<S::Item>>,
    token: &CancellationToken,
    skip_empty: bool,
) {
    let _end = EndOfProduction(queue);
    let mut produced = 0usize;
    let mut skipped = 0usize;

    while !token.is_cancelled() && source.has_next() {
        let result = source.next_item();
        if skip_empty && matches!(&result, Ok(item) if S::is_all_absent(item)) {
            skipped += 1;
            trace!(skipped, "empty item skipped");
            continue;
        }
        let failed = result.is_err();
        if let Err(err) = &result {
            warn!(error = %err, produced, "block production failed");
        }
        if queue.put(result).is_err() {
            debug!(produced, "pipeline closed by consumer");
            return;
        }
        if failed {
            return;
        }
        produced += 1;
    }

    debug!(
        produced,
        skipped,
        cancelled = token.is_cancelled(),
        "block production finished"
    );
}
