//! Worker → UI completion channel.
//!
//! Generation workers post exactly one [`Completion`] per dispatched request.
//! Only the thread that owns the [`ResultQueue`] (the GTK main thread) reads
//! them, so clipboard and status updates never run on a worker.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::generation::{GenerationError, GenerationResult};

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub request_id: RequestId,
    pub result: GenerationResult<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("result bridge is already installed")]
    AlreadyInstalled,
    #[error("result bridge has not been installed")]
    NotInstalled,
}

#[derive(Debug, Default)]
struct Counters {
    next_id: AtomicU64,
    in_flight: AtomicUsize,
}

/// Sending half, cheap to clone and safe to use from any thread.
#[derive(Debug, Clone)]
pub struct ResultBridge {
    sender: Sender<Completion>,
    counters: Arc<Counters>,
}

static GLOBAL_BRIDGE: OnceLock<ResultBridge> = OnceLock::new();

impl ResultBridge {
    pub fn channel() -> (ResultBridge, ResultQueue) {
        let (sender, receiver) = mpsc::channel();
        let counters = Arc::new(Counters::default());
        (
            ResultBridge {
                sender,
                counters: Arc::clone(&counters),
            },
            ResultQueue { receiver, counters },
        )
    }

    /// Creates the process-wide bridge. Call once, from the UI thread, at startup.
    pub fn install_global() -> Result<ResultQueue, BridgeError> {
        let (bridge, queue) = Self::channel();
        GLOBAL_BRIDGE
            .set(bridge)
            .map_err(|_| BridgeError::AlreadyInstalled)?;
        tracing::debug!("result bridge installed");
        Ok(queue)
    }

    pub fn global() -> Option<&'static ResultBridge> {
        GLOBAL_BRIDGE.get()
    }

    pub fn open_request(&self) -> RequestTicket {
        let id = self.counters.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
        RequestTicket {
            id,
            sender: self.sender.clone(),
            counters: Arc::clone(&self.counters),
            completed: false,
        }
    }

    /// Requests opened but not yet drained by the UI thread.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }
}

/// Obligation to post one result for a dispatched request.
///
/// Dropping an uncompleted ticket (the worker returned early or panicked)
/// posts [`GenerationError::WorkerLost`] instead.
#[derive(Debug)]
pub struct RequestTicket {
    id: RequestId,
    sender: Sender<Completion>,
    counters: Arc<Counters>,
    completed: bool,
}

impl RequestTicket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn complete(mut self, result: GenerationResult<String>) {
        self.post(result);
    }

    fn post(&mut self, result: GenerationResult<String>) {
        if self.completed {
            return;
        }
        self.completed = true;
        let completion = Completion {
            request_id: self.id,
            result,
        };
        if self.sender.send(completion).is_err() {
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(request_id = self.id, "result queue closed; dropping completion");
        }
    }
}

impl Drop for RequestTicket {
    fn drop(&mut self) {
        if !self.completed {
            tracing::warn!(request_id = self.id, "generation worker exited without a result");
            self.post(Err(GenerationError::WorkerLost));
        }
    }
}

/// Receiving half. Owned by the UI thread.
#[derive(Debug)]
pub struct ResultQueue {
    receiver: Receiver<Completion>,
    counters: Arc<Counters>,
}

impl ResultQueue {
    pub fn try_next(&self) -> Option<Completion> {
        match self.receiver.try_recv() {
            Ok(completion) => {
                self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                Some(completion)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Requests still owed a completion, including ones already queued.
    pub fn pending(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completed_ticket_delivers_exactly_one_result() {
        let (bridge, queue) = ResultBridge::channel();
        let ticket = bridge.open_request();
        let id = ticket.id();
        assert_eq!(queue.pending(), 1);

        thread::spawn(move || ticket.complete(Ok("x^2".to_string())))
            .join()
            .expect("worker joins");

        assert_eq!(
            queue.try_next(),
            Some(Completion {
                request_id: id,
                result: Ok("x^2".to_string())
            })
        );
        assert_eq!(queue.try_next(), None);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn dropped_ticket_reports_worker_lost() {
        let (bridge, queue) = ResultBridge::channel();
        let ticket = bridge.open_request();
        let id = ticket.id();
        drop(ticket);

        let completion = queue.try_next().expect("drop guard posts a result");
        assert_eq!(completion.request_id, id);
        assert_eq!(completion.result, Err(GenerationError::WorkerLost));
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn panicking_worker_still_yields_one_failure() {
        let (bridge, queue) = ResultBridge::channel();
        let ticket = bridge.open_request();

        let joined = thread::spawn(move || {
            let _ticket = ticket;
            panic!("backend exploded");
        })
        .join();
        assert!(joined.is_err());

        let completion = queue.try_next().expect("completion after panic");
        assert_eq!(completion.result, Err(GenerationError::WorkerLost));
        assert_eq!(queue.try_next(), None);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn request_ids_are_monotonic_and_counted() {
        let (bridge, queue) = ResultBridge::channel();
        let first = bridge.open_request();
        let second = bridge.open_request();
        assert!(second.id() > first.id());
        assert_eq!(bridge.in_flight(), 2);

        second.complete(Err(GenerationError::EmptyResponse));
        let _ = queue.try_next().expect("second completes first");
        assert_eq!(bridge.in_flight(), 1);

        first.complete(Ok("a".to_string()));
        let _ = queue.try_next().expect("first completes");
        assert_eq!(bridge.in_flight(), 0);
    }

    #[test]
    fn completion_after_queue_dropped_is_discarded() {
        let (bridge, queue) = ResultBridge::channel();
        let ticket = bridge.open_request();
        drop(queue);

        ticket.complete(Ok("late".to_string()));
        assert_eq!(bridge.in_flight(), 0);
    }

    #[test]
    fn global_bridge_installs_once() {
        let queue = ResultBridge::install_global().expect("first install succeeds");
        assert_eq!(
            ResultBridge::install_global().expect_err("second install fails"),
            BridgeError::AlreadyInstalled
        );

        let bridge = ResultBridge::global().expect("global is installed");
        let ticket = bridge.open_request();
        thread::spawn(move || ticket.complete(Ok("global".to_string())))
            .join()
            .expect("worker joins");
        assert_eq!(
            queue.try_next().map(|completion| completion.result),
            Some(Ok("global".to_string()))
        );
    }
}
