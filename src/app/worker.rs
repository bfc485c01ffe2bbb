use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::clipboard::ClipboardBackend;
use crate::delivery::{DeliveryPump, StatusSurface};

pub(super) const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(24);

/// Polls the result queue on the GTK main loop while requests are in flight.
#[derive(Debug, Default)]
pub(super) struct DrainTimer {
    running: Rc<Cell<bool>>,
}

impl DrainTimer {
    pub(super) fn ensure_running<C, S>(&self, pump: &Rc<DeliveryPump<C, S>>)
    where
        C: ClipboardBackend + 'static,
        S: StatusSurface + 'static,
    {
        if self.running.replace(true) {
            return;
        }

        let pump = Rc::clone(pump);
        let running = Rc::clone(&self.running);
        gtk4::glib::timeout_add_local(RESULT_POLL_INTERVAL, move || {
            for outcome in pump.drain() {
                tracing::debug!(?outcome, "applied generation result");
            }
            if pump.has_pending() {
                gtk4::glib::ControlFlow::Continue
            } else {
                running.set(false);
                gtk4::glib::ControlFlow::Break
            }
        });
    }
}
