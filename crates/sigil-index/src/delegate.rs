//! Serialised, asynchronous delivery of ingestion-progress callbacks.

use std::sync::Arc;
use std::thread;
use std::time::SystemTime;

use crossbeam_channel as channel;
use sigil_core::{OutOfDateTriggerHint, StoreUnitInfo};

/// Consumer interface for ingestion progress. All methods default to no-ops
/// so implementations only override what they care about.
pub trait IndexSystemDelegate: Send + Sync {
    /// `count` new units were queued for processing.
    fn processing_added_pending(&self, count: usize) {
        let _ = count;
    }

    /// `count` units finished processing.
    fn processing_completed(&self, count: usize) {
        let _ = count;
    }

    /// One unit was read into the database.
    fn processed_store_unit(&self, unit_info: StoreUnitInfo) {
        let _ = unit_info;
    }

    /// A unit was found to be out of date. When `synchronous` is true the
    /// call runs inline on the detecting thread.
    fn unit_is_out_of_date(
        &self,
        unit_info: StoreUnitInfo,
        out_of_date_mod_time: SystemTime,
        hint: &OutOfDateTriggerHint,
        synchronous: bool,
    ) {
        let _ = (unit_info, out_of_date_mod_time, hint, synchronous);
    }
}

enum DelegateMessage {
    Task(Box<dyn FnOnce() + Send>),
    Fence(channel::Sender<()>),
    Stop,
}

/// Invokes the user-supplied [`IndexSystemDelegate`] serially and
/// asynchronously on a dedicated worker thread, so ingestion threads never
/// block on consumer implementations.
///
/// Deliveries run in enqueue order, one at a time. The one exception is
/// `unit_is_out_of_date` with `synchronous = true`, which bypasses the queue
/// and runs inline on the caller's thread.
pub struct AsyncIndexDelegate {
    other: Option<Arc<dyn IndexSystemDelegate>>,
    tx: Option<channel::Sender<DelegateMessage>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl AsyncIndexDelegate {
    pub fn new(other: Option<Arc<dyn IndexSystemDelegate>>) -> Self {
        // Without a consumer every delivery is a no-op; don't spin up a
        // worker just to drop messages.
        if other.is_none() {
            return Self {
                other: None,
                tx: None,
                worker: None,
            };
        }

        let (tx, rx) = channel::unbounded();
        let worker = thread::Builder::new()
            .name("sigil-index-delegate".into())
            .spawn(move || run_worker(rx))
            .expect("failed to spawn index delegate worker");
        Self {
            other,
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    fn dispatch(&self, task: impl FnOnce() + Send + 'static) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(DelegateMessage::Task(Box::new(task)));
        }
    }

    pub fn processing_added_pending(&self, count: usize) {
        let Some(other) = self.other.clone() else {
            return;
        };
        self.dispatch(move || other.processing_added_pending(count));
    }

    pub fn processing_completed(&self, count: usize) {
        let Some(other) = self.other.clone() else {
            return;
        };
        self.dispatch(move || other.processing_completed(count));
    }

    pub fn processed_store_unit(&self, unit_info: StoreUnitInfo) {
        let Some(other) = self.other.clone() else {
            return;
        };
        self.dispatch(move || other.processed_store_unit(unit_info));
    }

    pub fn unit_is_out_of_date(
        &self,
        unit_info: StoreUnitInfo,
        out_of_date_mod_time: SystemTime,
        hint: OutOfDateTriggerHint,
        synchronous: bool,
    ) {
        let Some(other) = self.other.clone() else {
            return;
        };
        if synchronous {
            other.unit_is_out_of_date(unit_info, out_of_date_mod_time, &hint, true);
            return;
        }
        self.dispatch(move || {
            other.unit_is_out_of_date(unit_info, out_of_date_mod_time, &hint, false)
        });
    }

    /// Block until every currently-enqueued delivery has run. Test fence.
    pub fn wait(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = channel::bounded(1);
        if tx.send(DelegateMessage::Fence(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

fn run_worker(rx: channel::Receiver<DelegateMessage>) {
    for message in rx {
        match message {
            DelegateMessage::Task(task) => {
                // A panicking consumer must not kill the queue; later
                // deliveries still run.
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
                if result.is_err() {
                    tracing::warn!("index delegate consumer panicked; continuing");
                }
            }
            DelegateMessage::Fence(ack) => {
                let _ = ack.send(());
            }
            DelegateMessage::Stop => break,
        }
    }
}

impl Drop for AsyncIndexDelegate {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(DelegateMessage::Stop);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
