//! Applies generation results on the UI thread.

use std::cell::Cell;
use std::rc::Rc;

use crate::bridge::{Completion, RequestId, ResultQueue};
use crate::clipboard::ClipboardBackend;

/// Transient status indicator (toast or desktop notification).
pub trait StatusSurface {
    fn show_loading(&self);
    fn show_success(&self);
    fn dismiss(&self);
}

impl<T: StatusSurface + ?Sized> StatusSurface for Rc<T> {
    fn show_loading(&self) {
        (**self).show_loading();
    }

    fn show_success(&self) {
        (**self).show_success();
    }

    fn dismiss(&self) {
        (**self).dismiss();
    }
}

/// Wraps a surface so `dismiss` only hides a loading indicator, never a
/// success message that is still on screen.
pub struct LoadingStatus<S> {
    inner: S,
    loading: Cell<bool>,
}

impl<S: StatusSurface> LoadingStatus<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            loading: Cell::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }
}

impl<S: StatusSurface> StatusSurface for LoadingStatus<S> {
    fn show_loading(&self) {
        self.loading.set(true);
        self.inner.show_loading();
    }

    fn show_success(&self) {
        self.loading.set(false);
        self.inner.show_success();
    }

    fn dismiss(&self) {
        if self.loading.replace(false) {
            self.inner.dismiss();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Copied { request_id: RequestId, chars: usize },
    Failed { request_id: RequestId },
    ClipboardRejected { request_id: RequestId },
}

/// Writes a successful result to the clipboard, then signals success.
///
/// Failures leave the clipboard untouched. The loading indicator is dismissed
/// only when `others_in_flight` is zero so a concurrent request keeps it.
pub fn deliver(
    completion: Completion,
    clipboard: &dyn ClipboardBackend,
    status: &dyn StatusSurface,
    others_in_flight: usize,
) -> DeliveryOutcome {
    let request_id = completion.request_id;
    match completion.result {
        Ok(text) => match clipboard.set_text(&text) {
            Ok(()) => {
                status.show_success();
                tracing::info!(request_id, "copied generation result to clipboard");
                DeliveryOutcome::Copied {
                    request_id,
                    chars: text.chars().count(),
                }
            }
            Err(err) => {
                tracing::warn!(request_id, %err, "clipboard rejected generation result");
                dismiss_when_idle(status, others_in_flight);
                DeliveryOutcome::ClipboardRejected { request_id }
            }
        },
        Err(err) => {
            tracing::warn!(request_id, %err, "generation produced no text");
            dismiss_when_idle(status, others_in_flight);
            DeliveryOutcome::Failed { request_id }
        }
    }
}

fn dismiss_when_idle(status: &dyn StatusSurface, others_in_flight: usize) {
    if others_in_flight == 0 {
        status.dismiss();
    }
}

/// Drains the result queue. Lives on, and is only called from, the UI thread.
pub struct DeliveryPump<C, S> {
    queue: ResultQueue,
    clipboard: C,
    status: S,
}

impl<C: ClipboardBackend, S: StatusSurface> DeliveryPump<C, S> {
    pub fn new(queue: ResultQueue, clipboard: C, status: S) -> Self {
        Self {
            queue,
            clipboard,
            status,
        }
    }

    pub fn drain(&self) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();
        while let Some(completion) = self.queue.try_next() {
            let others_in_flight = self.queue.pending();
            outcomes.push(deliver(
                completion,
                &self.clipboard,
                &self.status,
                others_in_flight,
            ));
        }
        outcomes
    }

    pub fn has_pending(&self) -> bool {
        self.queue.pending() > 0
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    pub fn status(&self) -> &S {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::thread::{self, ThreadId};

    use super::*;
    use crate::bridge::ResultBridge;
    use crate::clipboard::{ClipboardError, ClipboardResult};
    use crate::generation::GenerationError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Text(String),
        Png,
        Loading,
        Success,
        Dismiss,
    }

    /// Clipboard and status surface in one, so call order is observable.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(Call, ThreadId)>>,
        reject_clipboard: bool,
    }

    impl Recorder {
        fn record(&self, call: Call) {
            self.calls.borrow_mut().push((call, thread::current().id()));
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().iter().map(|(call, _)| call.clone()).collect()
        }

        fn threads(&self) -> Vec<ThreadId> {
            self.calls.borrow().iter().map(|(_, id)| *id).collect()
        }
    }

    impl ClipboardBackend for Recorder {
        fn set_text(&self, text: &str) -> ClipboardResult<()> {
            if self.reject_clipboard {
                return Err(ClipboardError::DisplayUnavailable);
            }
            self.record(Call::Text(text.to_string()));
            Ok(())
        }

        fn set_png(&self, _png: &[u8]) -> ClipboardResult<()> {
            self.record(Call::Png);
            Ok(())
        }
    }

    impl StatusSurface for Recorder {
        fn show_loading(&self) {
            self.record(Call::Loading);
        }

        fn show_success(&self) {
            self.record(Call::Success);
        }

        fn dismiss(&self) {
            self.record(Call::Dismiss);
        }
    }

    fn completion(request_id: RequestId, result: Result<&str, GenerationError>) -> Completion {
        Completion {
            request_id,
            result: result.map(str::to_string),
        }
    }

    #[test]
    fn success_writes_clipboard_before_signalling_success() {
        let recorder = Recorder::default();
        let outcome = deliver(completion(1, Ok("E = mc^2")), &recorder, &recorder, 0);

        assert_eq!(outcome, DeliveryOutcome::Copied { request_id: 1, chars: 8 });
        assert_eq!(
            recorder.calls(),
            vec![Call::Text("E = mc^2".to_string()), Call::Success]
        );
    }

    #[test]
    fn failure_leaves_clipboard_untouched_and_dismisses_loading() {
        let recorder = Recorder::default();
        let outcome = deliver(
            completion(2, Err(GenerationError::EmptyResponse)),
            &recorder,
            &recorder,
            0,
        );

        assert_eq!(outcome, DeliveryOutcome::Failed { request_id: 2 });
        assert_eq!(recorder.calls(), vec![Call::Dismiss]);
    }

    #[test]
    fn failure_keeps_loading_while_other_requests_run() {
        let recorder = Recorder::default();
        let _ = deliver(
            completion(3, Err(GenerationError::WorkerLost)),
            &recorder,
            &recorder,
            1,
        );
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn rejected_clipboard_write_is_not_reported_as_success() {
        let recorder = Recorder {
            reject_clipboard: true,
            ..Recorder::default()
        };
        let outcome = deliver(completion(4, Ok("x")), &recorder, &recorder, 0);

        assert_eq!(outcome, DeliveryOutcome::ClipboardRejected { request_id: 4 });
        assert_eq!(recorder.calls(), vec![Call::Dismiss]);
    }

    #[test]
    fn pump_applies_worker_results_on_the_draining_thread() {
        let (bridge, queue) = ResultBridge::channel();
        let recorder = Rc::new(Recorder::default());
        let pump = DeliveryPump::new(queue, Rc::clone(&recorder), Rc::clone(&recorder));

        let ok_ticket = bridge.open_request();
        let failed_ticket = bridge.open_request();
        assert!(pump.has_pending());

        let workers = [
            thread::spawn(move || ok_ticket.complete(Ok("\\sum_i i".to_string()))),
            thread::spawn(move || failed_ticket.complete(Err(GenerationError::EmptyResponse))),
        ];
        let worker_ids: Vec<ThreadId> = workers.iter().map(|worker| worker.thread().id()).collect();
        for worker in workers {
            worker.join().expect("worker joins");
        }

        let outcomes = pump.drain();
        assert_eq!(outcomes.len(), 2);
        assert!(!pump.has_pending());

        let ui_thread = thread::current().id();
        assert!(!recorder.threads().is_empty());
        assert!(recorder.threads().iter().all(|id| *id == ui_thread));
        assert!(recorder
            .threads()
            .iter()
            .all(|id| !worker_ids.contains(id)));

        let texts: Vec<Call> = recorder
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Text(_)))
            .collect();
        assert_eq!(texts, vec![Call::Text("\\sum_i i".to_string())]);
    }

    #[test]
    fn pump_writes_clipboard_at_most_once_per_request() {
        let (bridge, queue) = ResultBridge::channel();
        let recorder = Rc::new(Recorder::default());
        let pump = DeliveryPump::new(queue, Rc::clone(&recorder), Rc::clone(&recorder));

        let ticket = bridge.open_request();
        ticket.complete(Ok("once".to_string()));

        assert_eq!(pump.drain().len(), 1);
        assert!(pump.drain().is_empty());
        assert_eq!(
            recorder.calls(),
            vec![Call::Text("once".to_string()), Call::Success]
        );
    }

    #[test]
    fn late_failure_keeps_earlier_success_on_screen() {
        let (bridge, queue) = ResultBridge::channel();
        let recorder = Rc::new(Recorder::default());
        let pump = DeliveryPump::new(
            queue,
            Rc::clone(&recorder),
            LoadingStatus::new(Rc::clone(&recorder)),
        );

        let succeeding = bridge.open_request();
        let failing = bridge.open_request();
        pump.status().show_loading();
        pump.status().show_loading();

        succeeding.complete(Ok("a".to_string()));
        assert_eq!(pump.drain().len(), 1);
        failing.complete(Err(GenerationError::EmptyResponse));
        assert_eq!(
            pump.drain(),
            vec![DeliveryOutcome::Failed { request_id: 2 }]
        );

        assert!(!pump.status().is_loading());
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Loading,
                Call::Loading,
                Call::Text("a".to_string()),
                Call::Success
            ]
        );
    }

    #[test]
    fn loading_status_dismisses_only_while_loading() {
        let recorder = Rc::new(Recorder::default());
        let status = LoadingStatus::new(Rc::clone(&recorder));

        status.dismiss();
        status.show_loading();
        assert!(status.is_loading());
        status.dismiss();
        status.dismiss();

        assert_eq!(recorder.calls(), vec![Call::Loading, Call::Dismiss]);
    }

    #[test]
    fn status_surface_forwards_through_rc() {
        let recorder = Rc::new(Recorder::default());
        let surface: Rc<dyn StatusSurface> = recorder.clone();
        surface.show_loading();
        surface.dismiss();
        assert_eq!(recorder.calls(), vec![Call::Loading, Call::Dismiss]);
    }
}
