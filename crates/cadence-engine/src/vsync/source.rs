use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};

use crate::error::PacerError;

use super::signal::VsyncSignal;

/// Sentinel for "no sample". Real vsync timestamps never reach `i64::MIN`.
const UNSET: i64 = i64::MIN;

/// Capability interface over the shared vsync sampler.
///
/// Sessions hold an `Arc<dyn VsyncSampler>` so tests can substitute a
/// deterministic fake for the threaded implementation.
pub trait VsyncSampler: Send + Sync {
    /// Latest sampled vsync timestamp, or `None` while nobody observes the sampler.
    fn current_sample(&self) -> Option<i64>;

    /// Registers one observer. Sampling starts with the first.
    fn add_observer(&self);

    /// Unregisters one observer. The last removal stops sampling and clears the sample.
    fn remove_observer(&self);
}

/// Vsync sampler configuration.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Delay between samples once sampling is active.
    ///
    /// Sampling every vsync is unnecessary; the sample only anchors the phase
    /// of the vsync grid.
    pub sample_delay: Duration,
    pub thread_name: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_delay: Duration::from_millis(500),
            thread_name: "cadence-vsync-sampler".to_string(),
        }
    }
}

enum Request {
    AddObserver,
    RemoveObserver,
    Flush(Sender<()>),
    Shutdown,
}

/// State published by the timing thread.
struct Published {
    sampled_vsync_ns: AtomicI64,
    sampling: AtomicBool,
}

/// Process-wide vsync sampler backed by a single timing thread.
///
/// Every observer change and every sample runs on that thread, so the
/// observer count needs no lock. Callers only post requests; the sampled
/// timestamp is read through an atomic.
pub struct VsyncClockSource {
    published: Arc<Published>,
    tx: Sender<Request>,
    thread: thread::Thread,
    join: Option<thread::JoinHandle<()>>,
}

impl VsyncClockSource {
    /// Starts the timing thread.
    ///
    /// The thread idles until the first observer registers.
    pub fn spawn<S>(signal: S, config: SamplerConfig) -> Result<Arc<Self>, PacerError>
    where
        S: VsyncSignal,
    {
        let (tx, rx) = channel::unbounded();
        let published = Arc::new(Published {
            sampled_vsync_ns: AtomicI64::new(UNSET),
            sampling: AtomicBool::new(false),
        });

        let worker = TimingThread {
            rx,
            published: published.clone(),
            signal: Box::new(signal),
            sample_delay: config.sample_delay,
            observers: 0,
            next_sample: None,
        };

        let join = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker.run())
            .map_err(PacerError::ThreadSpawn)?;
        let thread = join.thread().clone();

        log::debug!("vsync sampler started (delay {:?})", config.sample_delay);

        Ok(Arc::new(Self {
            published,
            tx,
            thread,
            join: Some(join),
        }))
    }

    /// Returns whether the timing thread is currently re-arming samples.
    pub fn is_sampling(&self) -> bool {
        self.published.sampling.load(Ordering::Acquire)
    }

    /// Blocks until every request posted before this call has been handled.
    ///
    /// Returns immediately if the timing thread is gone.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.tx.send(Request::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    fn post(&self, request: Request) {
        if self.tx.send(request).is_err() {
            log::warn!("vsync sampler thread has exited; request dropped");
        }
    }
}

impl VsyncSampler for VsyncClockSource {
    fn current_sample(&self) -> Option<i64> {
        match self.published.sampled_vsync_ns.load(Ordering::Acquire) {
            UNSET => None,
            ns => Some(ns),
        }
    }

    fn add_observer(&self) {
        self.post(Request::AddObserver);
    }

    fn remove_observer(&self) {
        self.post(Request::RemoveObserver);
    }
}

impl Drop for VsyncClockSource {
    fn drop(&mut self) {
        let _ = self.tx.send(Request::Shutdown);
        if let Some(join) = self.join.take() {
            // The last `Arc` can be released from a callback on the timing thread itself.
            if thread::current().id() != self.thread.id() {
                let _ = join.join();
            }
        }
    }
}

struct TimingThread {
    rx: Receiver<Request>,
    published: Arc<Published>,
    signal: Box<dyn VsyncSignal>,
    sample_delay: Duration,
    observers: u32,
    next_sample: Option<Instant>,
}

impl TimingThread {
    fn run(mut self) {
        loop {
            let request = match self.next_sample {
                Some(deadline) => match self.rx.recv_deadline(deadline) {
                    Ok(request) => Some(request),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                },
            };

            match request {
                None => self.sample(),
                Some(Request::AddObserver) => self.add_observer(),
                Some(Request::RemoveObserver) => self.remove_observer(),
                Some(Request::Flush(ack)) => {
                    let _ = ack.send(());
                }
                Some(Request::Shutdown) => break,
            }
        }

        self.stop();
        log::debug!("vsync sampler stopped");
    }

    fn add_observer(&mut self) {
        self.observers += 1;
        if self.observers == 1 {
            log::debug!("first vsync observer registered; sampling started");
            self.published.sampling.store(true, Ordering::Release);
            self.sample();
        }
    }

    fn remove_observer(&mut self) {
        if self.observers == 0 {
            log::warn!("vsync observer removed with no observers registered");
            return;
        }
        self.observers -= 1;
        if self.observers == 0 {
            log::debug!("last vsync observer removed; sampling stopped");
            self.stop();
        }
    }

    /// Stores the latest vsync and re-arms the next sample.
    fn sample(&mut self) {
        match self.signal.latest_vsync_ns() {
            Some(ns) if ns != UNSET => {
                self.published.sampled_vsync_ns.store(ns, Ordering::Release);
                log::trace!("sampled vsync at {ns} ns");
            }
            _ => log::trace!("vsync signal produced no timestamp"),
        }
        self.next_sample = Some(Instant::now() + self.sample_delay);
    }

    fn stop(&mut self) {
        self.next_sample = None;
        self.published.sampling.store(false, Ordering::Release);
        self.published.sampled_vsync_ns.store(UNSET, Ordering::Release);
    }
}
