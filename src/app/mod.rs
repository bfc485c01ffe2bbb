use std::cell::{Cell, RefCell};
use std::rc::Rc;

use gtk4::prelude::*;
use gtk4::{gio, glib, Application};

use crate::bridge::{BridgeError, ResultBridge, ResultQueue};
use crate::clipboard::{ClipboardBackend, GdkClipboard};
use crate::config::{load_app_config, CaptureMode, StatusSurfaceKind};
use crate::delivery::{DeliveryPump, LoadingStatus, StatusSurface};
use crate::display::XcapDisplayBackend;
use crate::error::AppResult;
use crate::generation::ConfiguredBackend;
use crate::geometry::Rect;
use crate::notification::NotificationStatus;
use crate::pipeline::CapturePipeline;

mod overlay;
mod runtime_css;
mod settings;
mod startup;
mod toast;
mod worker;

use self::overlay::OverlayController;
use self::runtime_css::install_runtime_css;
use self::toast::ToastWindow;
use self::worker::DrainTimer;

pub use self::startup::{StartupCommand, StartupConfig};

const APPLICATION_ID: &str = "io.github.sniptex.SnipTex";
const SNIP_ACTION: &str = "snip";
const QUIT_ACTION: &str = "quit";
const SIGINT: i32 = 2;

type SharedStatus = Rc<dyn StatusSurface>;

/// Capture hand-off and result delivery. Lives on the GTK main thread.
struct Dispatcher {
    pipeline: CapturePipeline<XcapDisplayBackend>,
    pump: Rc<DeliveryPump<GdkClipboard, LoadingStatus<SharedStatus>>>,
    drain: DrainTimer,
}

impl Dispatcher {
    fn handle_selection(&self, capture_rect: Rect) {
        match load_app_config().capture_mode {
            CaptureMode::Text => self.dispatch_text(capture_rect),
            CaptureMode::Image => self.copy_image(capture_rect),
        }
    }

    fn dispatch_text(&self, capture_rect: Rect) {
        if self.pipeline.capture_and_dispatch(capture_rect).is_none() {
            return;
        }
        self.pump.status().show_loading();
        self.drain.ensure_running(&self.pump);
    }

    fn copy_image(&self, capture_rect: Rect) {
        let Some(prepared) = self.pipeline.capture_only(capture_rect) else {
            return;
        };
        match self.pump.clipboard().set_png(&prepared.png) {
            Ok(()) => {
                tracing::info!(bounds = ?prepared.bounds, "copied screenshot to clipboard");
                self.pump.status().show_success();
            }
            Err(err) => tracing::warn!(%err, "failed to copy screenshot"),
        }
    }
}

struct Runtime {
    overlay: OverlayController,
}

impl Runtime {
    fn build(queue: ResultQueue, bridge: ResultBridge) -> Self {
        install_runtime_css();

        let config = load_app_config();
        tracing::debug!(?config, "loaded configuration");
        let status: SharedStatus = match config.status_surface {
            StatusSurfaceKind::Toast => Rc::new(ToastWindow::new(config.toast_duration())),
            StatusSurfaceKind::Notification => {
                Rc::new(NotificationStatus::new(config.toast_duration()))
            }
        };

        let dispatcher = Rc::new(Dispatcher {
            pipeline: CapturePipeline::new(XcapDisplayBackend, ConfiguredBackend::shared(), bridge),
            pump: Rc::new(DeliveryPump::new(queue, GdkClipboard, LoadingStatus::new(status))),
            drain: DrainTimer::default(),
        });

        let overlay = OverlayController::new(
            move |capture_rect| dispatcher.handle_selection(capture_rect),
            settings::present_settings,
        );

        Self { overlay }
    }
}

pub struct App {
    startup: StartupConfig,
}

impl App {
    pub fn new(startup: StartupConfig) -> Self {
        Self { startup }
    }

    pub fn start(&self) -> AppResult<()> {
        let command = self.startup.command;
        if command == StartupCommand::Help {
            println!("{}", startup::USAGE);
            return Ok(());
        }

        let application = Application::new(Some(APPLICATION_ID), gio::ApplicationFlags::empty());
        application.register(gio::Cancellable::NONE)?;

        if application.is_remote() {
            forward_to_primary(&application, command);
            return Ok(());
        }
        if command == StartupCommand::Quit {
            tracing::info!("no running instance to quit");
            return Ok(());
        }

        let queue = ResultBridge::install_global()?;
        let bridge = ResultBridge::global()
            .cloned()
            .ok_or(BridgeError::NotInstalled)?;

        let runtime = Rc::new(RefCell::new(None::<Runtime>));
        let hold_guard = Rc::new(RefCell::new(None::<gio::ApplicationHoldGuard>));

        {
            let runtime = runtime.clone();
            let hold_guard = hold_guard.clone();
            let pending = RefCell::new(Some((queue, bridge)));
            application.connect_startup(move |app| {
                let Some((queue, bridge)) = pending.borrow_mut().take() else {
                    return;
                };
                tracing::info!("building resident runtime");
                runtime.borrow_mut().replace(Runtime::build(queue, bridge));
                let guard = <Application as gio::prelude::ApplicationExtManual>::hold(app);
                hold_guard.borrow_mut().replace(guard);
                install_actions(app, &runtime, &hold_guard);
            });
        }

        {
            let runtime = runtime.clone();
            let first_activation = Cell::new(true);
            application.connect_activate(move |_| {
                let first = first_activation.replace(false);
                if first && command == StartupCommand::Daemon {
                    tracing::info!("resident instance started");
                    return;
                }
                if let Some(runtime) = runtime.borrow().as_ref() {
                    runtime.overlay.open();
                }
            });
        }

        {
            let application = application.clone();
            glib::unix_signal_add_local(SIGINT, move || {
                tracing::info!("interrupt received; quitting");
                application.quit();
                glib::ControlFlow::Break
            });
        }

        let gtk_args = self.startup.gtk_args();
        application.run_with_args(&gtk_args);

        hold_guard.borrow_mut().take();
        runtime.borrow_mut().take();
        tracing::info!("resident instance stopped");
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(StartupConfig::default())
    }
}

fn install_actions(
    app: &Application,
    runtime: &Rc<RefCell<Option<Runtime>>>,
    hold_guard: &Rc<RefCell<Option<gio::ApplicationHoldGuard>>>,
) {
    let snip = gio::SimpleAction::new(SNIP_ACTION, None);
    {
        let runtime = runtime.clone();
        snip.connect_activate(move |_, _| {
            tracing::debug!("snip requested");
            if let Some(runtime) = runtime.borrow().as_ref() {
                runtime.overlay.open();
            }
        });
    }
    app.add_action(&snip);

    let quit = gio::SimpleAction::new(QUIT_ACTION, None);
    {
        let runtime = runtime.clone();
        let hold_guard = hold_guard.clone();
        let app = app.clone();
        quit.connect_activate(move |_, _| {
            tracing::info!("quit requested");
            if let Some(runtime) = runtime.borrow().as_ref() {
                runtime.overlay.close();
            }
            hold_guard.borrow_mut().take();
            app.quit();
        });
    }
    app.add_action(&quit);
}

fn forward_to_primary(application: &Application, command: StartupCommand) {
    let action = match command {
        StartupCommand::Snip => SNIP_ACTION,
        StartupCommand::Quit => QUIT_ACTION,
        StartupCommand::Daemon => {
            tracing::info!("resident instance already running");
            return;
        }
        StartupCommand::Help => return,
    };

    tracing::debug!(action, "forwarding to resident instance");
    application.activate_action(action, None);
    if let Some(connection) = application.dbus_connection() {
        if let Err(err) = connection.flush_sync(gio::Cancellable::NONE) {
            tracing::warn!(?err, "failed to flush request to resident instance");
        }
    }
}
