use std::cell::RefCell;
use std::time::Duration;

use notify_rust::{Notification, NotificationHandle, Timeout};

use crate::delivery::StatusSurface;

const APP_NAME: &str = "SnipTex";
pub(crate) const LOADING_MESSAGE: &str = "Sending to model…";
pub(crate) const SUCCESS_MESSAGE: &str = "Copied to clipboard";

fn notification(body: &str) -> Notification {
    let mut notification = Notification::new();
    notification.appname(APP_NAME).summary(APP_NAME).body(body);
    notification
}

/// Status surface backed by desktop notifications instead of the toast window.
pub struct NotificationStatus {
    success_timeout: Duration,
    loading: RefCell<Option<NotificationHandle>>,
}

impl NotificationStatus {
    pub fn new(success_timeout: Duration) -> Self {
        Self {
            success_timeout,
            loading: RefCell::new(None),
        }
    }

    fn close_loading(&self) {
        if let Some(handle) = self.loading.borrow_mut().take() {
            handle.close();
        }
    }
}

impl StatusSurface for NotificationStatus {
    fn show_loading(&self) {
        self.close_loading();
        let mut loading = notification(LOADING_MESSAGE);
        loading.timeout(Timeout::Never);
        match loading.show() {
            Ok(handle) => *self.loading.borrow_mut() = Some(handle),
            Err(err) => tracing::warn!("system notification failed: {err}"),
        }
    }

    fn show_success(&self) {
        self.close_loading();
        let millis = u32::try_from(self.success_timeout.as_millis()).unwrap_or(u32::MAX);
        let mut success = notification(SUCCESS_MESSAGE);
        success.timeout(Timeout::Milliseconds(millis));
        if let Err(err) = success.show() {
            tracing::warn!("system notification failed: {err}");
        }
    }

    fn dismiss(&self) {
        self.close_loading();
    }
}
