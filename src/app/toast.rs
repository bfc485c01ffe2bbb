use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use gtk4::prelude::*;
use gtk4::{Align, Box as GtkBox, Label, Orientation, Window};

use crate::delivery::StatusSurface;
use crate::notification::{LOADING_MESSAGE, SUCCESS_MESSAGE};

/// Small undecorated status window. Success hides itself after a delay.
pub(super) struct ToastWindow {
    window: Window,
    label: Label,
    sequence: Rc<Cell<u64>>,
    success_duration: Duration,
}

impl ToastWindow {
    pub(super) fn new(success_duration: Duration) -> Self {
        let label = Label::new(None);
        label.set_halign(Align::Center);

        let card = GtkBox::new(Orientation::Horizontal, 10);
        card.add_css_class("sniptex-toast-card");
        card.append(&label);

        let window = Window::builder()
            .title("SnipTex")
            .decorated(false)
            .resizable(false)
            .focusable(false)
            .child(&card)
            .build();
        window.add_css_class("sniptex-toast");

        Self {
            window,
            label,
            sequence: Rc::new(Cell::new(0)),
            success_duration,
        }
    }

    fn show(&self, message: &str, auto_hide: Option<Duration>) {
        self.label.set_text(message);
        self.window.present();

        let sequence = self.bump_sequence();
        let Some(delay) = auto_hide else {
            return;
        };
        let window = self.window.clone();
        let latest_sequence = self.sequence.clone();
        gtk4::glib::timeout_add_local_once(delay, move || {
            if latest_sequence.get() == sequence {
                window.set_visible(false);
            }
        });
    }

    fn bump_sequence(&self) -> u64 {
        let sequence = self.sequence.get().saturating_add(1);
        self.sequence.set(sequence);
        sequence
    }
}

impl StatusSurface for ToastWindow {
    fn show_loading(&self) {
        self.show(LOADING_MESSAGE, None);
    }

    fn show_success(&self) {
        self.show(SUCCESS_MESSAGE, Some(self.success_duration));
    }

    fn dismiss(&self) {
        self.bump_sequence();
        self.window.set_visible(false);
    }
}
