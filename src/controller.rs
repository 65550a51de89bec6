//! View controller - glue between user gestures, the deal store and the
//! renderer.
//!
//! Store mutations triggered here run one at a time on tokio's blocking pool,
//! fed by a single job worker. Each job finishes by pushing `ViewEvent`s to
//! the renderer through the `Notifier`, after the store lock has been
//! released, so events arrive in the order the jobs took the lock. Teardown
//! detaches the notifier and cancels the shared `ShutdownToken`: queued jobs
//! that have not started are dropped, jobs already running complete silently.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::feed::{BatchCallback, DealFeed, FeedSubscription};
use crate::models::{Deal, SortKey};
use crate::render::RenderSession;
use crate::scheduler::RefreshScheduler;
use crate::shutdown::ShutdownToken;
use crate::store::DealStore;

/// Signals delivered to the rendering thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// Pull a fresh snapshot and redraw
    DataChanged,
    /// Advisory busy indicator
    LoadingStateChanged(bool),
    /// New direction flag after a toggle
    DirectionChanged(bool),
    /// Reset the viewport to the first row
    ScrollToTop,
}

/// One-way channel to the renderer that goes quiet after `detach` or once the
/// shutdown token is cancelled
#[derive(Debug)]
pub struct Notifier {
    tx: Mutex<Option<mpsc::UnboundedSender<ViewEvent>>>,
    shutdown: ShutdownToken,
}

impl Notifier {
    pub fn new(shutdown: ShutdownToken) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
                shutdown,
            },
            rx,
        )
    }

    /// Returns `false` when silenced or the renderer is gone
    pub fn send(&self, event: ViewEvent) -> bool {
        self.send_all(&[event])
    }

    /// Deliver a group of events without interleaving with a concurrent detach
    pub fn send_all(&self, events: &[ViewEvent]) -> bool {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        if self.shutdown.is_cancelled() {
            return false;
        }
        events.iter().all(|event| tx.send(*event).is_ok())
    }

    pub fn detach(&self) {
        self.tx.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.tx.lock().is_some()
    }
}

type Job = Box<dyn FnOnce(&DealStore) -> Vec<ViewEvent> + Send>;

/// Everything the gesture entry points and the timer need, cloneable into
/// closures without referencing the controller itself.
#[derive(Clone)]
struct JobContext {
    store: Arc<DealStore>,
    notifier: Arc<Notifier>,
    shutdown: ShutdownToken,
    runtime: Handle,
    jobs: mpsc::UnboundedSender<(&'static str, Job)>,
    /// User sequences queued or running; the busy hint clears at zero
    busy: Arc<AtomicUsize>,
    refresh_queued: Arc<AtomicBool>,
}

impl JobContext {
    fn spawn<F>(&self, name: &'static str, job: F)
    where
        F: FnOnce(&DealStore) -> Vec<ViewEvent> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            trace!(job = name, "Job rejected after teardown");
            return;
        }
        let job: Job = Box::new(job);
        if self.jobs.send((name, job)).is_err() {
            trace!(job = name, "Job worker gone");
        }
    }

    /// Queue a user sequence bracketed by the busy hint
    fn spawn_user<F>(&self, name: &'static str, job: F)
    where
        F: FnOnce(&DealStore) -> Vec<ViewEvent> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.busy.fetch_add(1, Ordering::AcqRel);
        self.notifier.send(ViewEvent::LoadingStateChanged(true));

        let busy = self.busy.clone();
        self.spawn(name, move |store| {
            let mut events = job(store);
            if busy.fetch_sub(1, Ordering::AcqRel) == 1 {
                events.push(ViewEvent::LoadingStateChanged(false));
            }
            events
        });
    }

    fn refresh(&self) {
        // One pending refresh is enough; a slow resort must not pile up ticks
        if self.refresh_queued.swap(true, Ordering::AcqRel) {
            trace!("Refresh already queued");
            return;
        }
        let queued = self.refresh_queued.clone();
        let busy = self.busy.clone();
        self.spawn("refresh", move |store| {
            queued.store(false, Ordering::Release);
            store.resort();
            let mut events = vec![ViewEvent::DataChanged];
            if busy.load(Ordering::Acquire) == 0 {
                events.push(ViewEvent::LoadingStateChanged(false));
            }
            events
        });
    }
}

/// Runs queued jobs one after another until shutdown
async fn run_jobs(
    mut jobs: mpsc::UnboundedReceiver<(&'static str, Job)>,
    store: Arc<DealStore>,
    notifier: Arc<Notifier>,
    shutdown: ShutdownToken,
) {
    loop {
        let (name, job) = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = jobs.recv() => match next {
                Some(next) => next,
                None => break,
            },
        };
        if shutdown.is_cancelled() {
            trace!(job = name, "Queued job dropped after teardown");
            break;
        }

        let store = store.clone();
        match tokio::task::spawn_blocking(move || job(&store)).await {
            Ok(events) => {
                if !notifier.send_all(&events) {
                    trace!(job = name, "Job finished after renderer detached");
                }
            }
            Err(err) => warn!(job = name, error = %err, "Store job failed"),
        }
    }
    debug!("Job worker stopped");
}

struct SessionTasks {
    worker: Option<JoinHandle<()>>,
    scheduler: Option<RefreshScheduler>,
    subscription: Option<FeedSubscription>,
}

/// Owns the store session: timer, feed subscription and the user entry points
pub struct DealsController {
    ctx: JobContext,
    worker: Mutex<Option<JoinHandle<()>>>,
    scheduler: Mutex<Option<RefreshScheduler>>,
    subscription: Mutex<Option<FeedSubscription>>,
}

impl DealsController {
    /// Create a controller and the event stream the renderer consumes
    pub fn new(
        store: Arc<DealStore>,
        runtime: Handle,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ViewEvent>) {
        let shutdown = ShutdownToken::new();
        let (notifier, events) = Notifier::new(shutdown.clone());
        let notifier = Arc::new(notifier);
        let (jobs, queue) = mpsc::unbounded_channel();
        let worker = runtime.spawn(run_jobs(
            queue,
            store.clone(),
            notifier.clone(),
            shutdown.clone(),
        ));

        let controller = Arc::new(Self {
            ctx: JobContext {
                store,
                notifier,
                shutdown,
                runtime,
                jobs,
                busy: Arc::new(AtomicUsize::new(0)),
                refresh_queued: Arc::new(AtomicBool::new(false)),
            },
            worker: Mutex::new(Some(worker)),
            scheduler: Mutex::new(None),
            subscription: Mutex::new(None),
        });
        (controller, events)
    }

    /// Start the refresh timer (first fire immediately) and subscribe to the
    /// feed. Calling it again replaces neither.
    pub fn start(&self, feed: &dyn DealFeed, refresh_period: Duration) {
        if self.is_torn_down() {
            return;
        }

        let _rt = self.ctx.runtime.enter();

        {
            let mut scheduler = self.scheduler.lock();
            if scheduler.is_none() {
                let ctx = self.ctx.clone();
                let shutdown = ctx.shutdown.clone();
                *scheduler = Some(RefreshScheduler::spawn(refresh_period, shutdown, move || {
                    ctx.refresh()
                }));
            }
        }

        let mut subscription = self.subscription.lock();
        if subscription.is_none() {
            let store = self.ctx.store.clone();
            let shutdown = self.ctx.shutdown.clone();
            let on_batch: BatchCallback = Arc::new(move |batch: Vec<Deal>| {
                if shutdown.is_cancelled() {
                    return;
                }
                store.append(batch);
            });
            *subscription = Some(feed.subscribe(on_batch, self.ctx.shutdown.clone()));
            info!(feed = feed.name(), "🚀 Deals session started");
        }
    }

    pub fn store(&self) -> &Arc<DealStore> {
        &self.ctx.store
    }

    pub fn shutdown_token(&self) -> &ShutdownToken {
        &self.ctx.shutdown
    }

    /// Consistent read view for one redraw
    pub fn render_session(&self) -> RenderSession {
        RenderSession::new(self.ctx.store.snapshot())
    }

    /// Resort and redraw, as the timer does
    pub fn refresh(&self) {
        self.ctx.refresh();
    }

    pub fn user_toggled_direction(&self) {
        self.ctx.spawn_user("toggle_direction", |store| {
            let reversed = store.toggle_direction_and_resort();
            vec![
                ViewEvent::DataChanged,
                ViewEvent::ScrollToTop,
                ViewEvent::DirectionChanged(reversed),
            ]
        });
    }

    pub fn user_selected_sort_key(&self, key: SortKey) {
        self.ctx.spawn_user("select_sort_key", move |store| {
            store.set_sort_key_and_resort(key);
            vec![ViewEvent::DataChanged, ViewEvent::ScrollToTop]
        });
    }

    /// Grow the page when `row` is the last visible one. Returns whether it
    /// grew.
    pub fn user_scrolled_near_end(&self, row: usize) -> bool {
        if self.is_torn_down() {
            return false;
        }
        if self.ctx.store.grow_page_if_last(row).is_none() {
            return false;
        }
        self.ctx.notifier.send(ViewEvent::DataChanged);
        true
    }

    pub fn is_torn_down(&self) -> bool {
        self.ctx.shutdown.is_cancelled()
    }

    /// Stop the timer, the feed and the job worker, silence the notifier.
    /// Returns `false` if teardown had already happened.
    pub fn teardown(&self) -> bool {
        let Some(tasks) = self.begin_teardown() else {
            return false;
        };
        if let Some(worker) = tasks.worker {
            worker.abort();
        }
        drop(tasks.scheduler);
        drop(tasks.subscription);
        self.log_teardown();
        true
    }

    /// Teardown that waits for the worker, timer and feed tasks to exit
    pub async fn shutdown(&self) {
        let Some(tasks) = self.begin_teardown() else {
            return;
        };
        if let Some(worker) = tasks.worker {
            let _ = worker.await;
        }
        if let Some(scheduler) = tasks.scheduler {
            scheduler.join().await;
        }
        if let Some(subscription) = tasks.subscription {
            subscription.join().await;
        }
        self.log_teardown();
    }

    fn begin_teardown(&self) -> Option<SessionTasks> {
        // Silence the renderer before anything can observe the cancellation
        self.ctx.notifier.detach();
        if !self.ctx.shutdown.cancel() {
            return None;
        }

        let tasks = SessionTasks {
            worker: self.worker.lock().take(),
            scheduler: self.scheduler.lock().take(),
            subscription: self.subscription.lock().take(),
        };
        debug!(
            scheduler = tasks.scheduler.is_some(),
            feed = tasks.subscription.is_some(),
            "Releasing session tasks"
        );
        Some(tasks)
    }

    fn log_teardown(&self) {
        let summary = self.ctx.store.metrics().summary();
        info!(
            deals = self.ctx.store.len(),
            batches = summary.batches_appended,
            resorts = summary.resorts,
            max_resort_us = summary.max_resort_us,
            page_size = self.ctx.store.page_size(),
            "🛑 Deals session torn down"
        );
    }
}

impl Drop for DealsController {
    fn drop(&mut self) {
        self.teardown();
    }
}
