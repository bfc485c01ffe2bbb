use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use gtk4::cairo::{Context, Operator};
use gtk4::prelude::*;
use gtk4::{gdk, glib, DrawingArea, EventControllerKey, GestureClick, GestureDrag, Widget, Window};

use crate::display::{resolve_monitors, virtual_desktop_of, MonitorDescriptor, XcapDisplayBackend};
use crate::geometry::{Point, Rect};
use crate::state::{PointerButton, SelectionEvent, SelectionMachine, SelectionOutcome};

const DIM_ALPHA: f64 = 100.0 / 255.0;
const BORDER_RGBA: (f64, f64, f64, f64) = (0.0, 153.0 / 255.0, 1.0, 220.0 / 255.0);
const BORDER_WIDTH: f64 = 2.0;
const SETTINGS_BUTTON_OFFSET: i32 = 12;
const SETTINGS_BUTTON_SIZE: i32 = 32;
// Lets the compositor unmap the overlay before the screens are grabbed.
const CAPTURE_AFTER_CLOSE_DELAY: Duration = Duration::from_millis(120);

/// Converts between one overlay window's logical pixels and global coordinates.
///
/// `scale` is physical pixels per logical pixel for this monitor, which may be
/// fractional and may differ between monitors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct MonitorMapping {
    physical_origin: Point,
    scale: f64,
}

impl MonitorMapping {
    /// Maps a monitor's logical geometry onto its physical (capture-space) bounds.
    pub(super) fn between(logical: Rect, physical: Rect) -> Self {
        let scale = if logical.width == 0 || physical.width == 0 {
            1.0
        } else {
            f64::from(physical.width) / f64::from(logical.width)
        };
        Self {
            physical_origin: physical.origin(),
            scale,
        }
    }

    /// Fallback when no capture monitor matches: GDK's integer scale factor.
    pub(super) fn from_scale_factor(logical: Rect, scale_factor: i32) -> Self {
        let scale = scale_factor.max(1);
        Self {
            physical_origin: Point::new(
                logical.x.saturating_mul(scale),
                logical.y.saturating_mul(scale),
            ),
            scale: f64::from(scale),
        }
    }

    pub(super) fn to_global(self, x: f64, y: f64) -> Point {
        Point::new(
            self.physical_origin.x.saturating_add((x * self.scale).round() as i32),
            self.physical_origin.y.saturating_add((y * self.scale).round() as i32),
        )
    }

    /// Global rectangle of a widget-local box (logical pixels).
    pub(super) fn global_rect(self, x: i32, y: i32, width: i32, height: i32) -> Rect {
        let origin = self.to_global(f64::from(x), f64::from(y));
        Rect::new(
            origin.x,
            origin.y,
            (f64::from(width.max(0)) * self.scale).round() as u32,
            (f64::from(height.max(0)) * self.scale).round() as u32,
        )
    }

    /// `(x, y, width, height)` of a global rectangle in this window's logical pixels.
    pub(super) fn local_rect(self, rect: Rect) -> (f64, f64, f64, f64) {
        (
            f64::from(rect.x.saturating_sub(self.physical_origin.x)) / self.scale,
            f64::from(rect.y.saturating_sub(self.physical_origin.y)) / self.scale,
            f64::from(rect.width) / self.scale,
            f64::from(rect.height) / self.scale,
        )
    }
}

/// Physical bounds of the capture monitor backing a GDK monitor.
///
/// Matches on connector name first. Falls back to enumeration order only when
/// both sides list the same number of monitors.
pub(super) fn physical_bounds_for(
    connector: Option<&str>,
    index: usize,
    gdk_monitor_count: usize,
    descriptors: &[MonitorDescriptor],
) -> Option<Rect> {
    if let Some(connector) = connector {
        if let Some(found) = descriptors.iter().find(|monitor| monitor.name == connector) {
            return Some(found.bounds);
        }
    }
    if descriptors.len() == gdk_monitor_count {
        return descriptors.get(index).map(|monitor| monitor.bounds);
    }
    None
}

/// Orders a committed capture against a reopen of the overlay.
///
/// The capture runs after a delay so the closed overlay is off screen. An
/// open requested inside that window waits until the capture has run.
#[derive(Debug, Default)]
pub(super) struct CaptureGate {
    pending: Option<Rect>,
    reopen_requested: bool,
}

impl CaptureGate {
    pub(super) fn schedule(&mut self, capture_rect: Rect) {
        self.pending = Some(capture_rect);
    }

    /// `true` when the overlay may open now; otherwise the open is queued.
    pub(super) fn request_open(&mut self) -> bool {
        if self.pending.is_some() {
            self.reopen_requested = true;
            return false;
        }
        true
    }

    /// The capture to run and whether a queued open should follow it.
    pub(super) fn fire(&mut self) -> (Option<Rect>, bool) {
        let capture = self.pending.take();
        let reopen = std::mem::take(&mut self.reopen_requested);
        (capture, reopen)
    }
}

struct OverlayShared {
    display: XcapDisplayBackend,
    machine: RefCell<SelectionMachine>,
    windows: RefCell<Vec<OverlayWindow>>,
    gate: RefCell<CaptureGate>,
    on_commit: Box<dyn Fn(Rect)>,
    on_settings: Box<dyn Fn(Option<&Window>)>,
}

struct OverlayWindow {
    window: Window,
    area: DrawingArea,
}

/// One translucent fullscreen window per monitor, driven by a shared
/// [`SelectionMachine`].
pub(super) struct OverlayController {
    shared: Rc<OverlayShared>,
}

impl OverlayController {
    pub(super) fn new<C, S>(on_commit: C, on_settings: S) -> Self
    where
        C: Fn(Rect) + 'static,
        S: Fn(Option<&Window>) + 'static,
    {
        Self {
            shared: Rc::new(OverlayShared {
                display: XcapDisplayBackend,
                machine: RefCell::new(SelectionMachine::new()),
                windows: RefCell::new(Vec::new()),
                gate: RefCell::new(CaptureGate::default()),
                on_commit: Box::new(on_commit),
                on_settings: Box::new(on_settings),
            }),
        }
    }

    /// Shows the overlay, starting a fresh session even if one is already open.
    pub(super) fn open(&self) {
        self.shared.open();
    }

    pub(super) fn close(&self) {
        self.shared.cancel();
    }
}

impl OverlayShared {
    fn open(self: &Rc<Self>) {
        if !self.gate.borrow_mut().request_open() {
            tracing::debug!("capture pending; overlay opens after it");
            return;
        }
        self.close_windows();

        let descriptors = resolve_monitors(&self.display);
        let desktop = virtual_desktop_of(&descriptors);
        self.machine.borrow_mut().begin(desktop);
        if desktop.is_empty() {
            tracing::info!("no monitors enumerable; capture unavailable");
            return;
        }

        let Some(display) = gdk::Display::default() else {
            tracing::warn!("no default display; cannot show overlay");
            return;
        };

        let monitors = display.monitors();
        let monitor_count = monitors.n_items() as usize;
        let mut windows = Vec::new();
        let mut reserved = Vec::new();
        for index in 0..monitors.n_items() {
            let Some(monitor) = monitors.item(index).and_downcast::<gdk::Monitor>() else {
                continue;
            };
            let geometry = monitor.geometry();
            let logical = Rect::new(
                geometry.x(),
                geometry.y(),
                geometry.width().max(0).unsigned_abs(),
                geometry.height().max(0).unsigned_abs(),
            );
            let connector = monitor.connector();
            let mapping = match physical_bounds_for(
                connector.as_deref(),
                index as usize,
                monitor_count,
                &descriptors,
            ) {
                Some(physical) => MonitorMapping::between(logical, physical),
                None => {
                    tracing::debug!(?connector, "no capture monitor matched; using integer scale");
                    MonitorMapping::from_scale_factor(logical, monitor.scale_factor())
                }
            };
            let with_settings = windows.is_empty();
            if with_settings {
                reserved.push(mapping.global_rect(
                    SETTINGS_BUTTON_OFFSET,
                    SETTINGS_BUTTON_OFFSET,
                    SETTINGS_BUTTON_SIZE,
                    SETTINGS_BUTTON_SIZE,
                ));
            }
            windows.push(build_overlay_window(
                Rc::downgrade(self),
                &monitor,
                mapping,
                with_settings,
            ));
        }

        self.machine.borrow_mut().set_reserved_regions(reserved);
        for overlay in &windows {
            overlay.window.present();
        }
        tracing::info!(?desktop, windows = windows.len(), "overlay opened");
        *self.windows.borrow_mut() = windows;
    }

    fn handle(self: &Rc<Self>, event: SelectionEvent, source: Option<&Window>) {
        let outcome = self.machine.borrow_mut().handle(event);
        match outcome {
            SelectionOutcome::Ignored => {}
            SelectionOutcome::Started | SelectionOutcome::Updated => self.queue_redraw(),
            SelectionOutcome::ReservedControl => (self.on_settings)(source),
            SelectionOutcome::Cancelled => {
                tracing::info!("selection cancelled");
                self.machine.borrow_mut().finish();
                self.close_windows();
            }
            SelectionOutcome::Committed(capture_rect) => {
                tracing::info!(?capture_rect, "selection committed");
                self.machine.borrow_mut().finish();
                self.close_windows();
                self.gate.borrow_mut().schedule(capture_rect);
                let weak = Rc::downgrade(self);
                glib::timeout_add_local_once(CAPTURE_AFTER_CLOSE_DELAY, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.run_pending_capture();
                    }
                });
            }
        }
    }

    fn run_pending_capture(self: &Rc<Self>) {
        let (capture, reopen) = self.gate.borrow_mut().fire();
        if let Some(capture_rect) = capture {
            (self.on_commit)(capture_rect);
        }
        if reopen {
            self.open();
        }
    }

    fn cancel(self: &Rc<Self>) {
        if self.windows.borrow().is_empty() {
            return;
        }
        self.handle(SelectionEvent::CancelKey, None);
        // A committed or cancelled machine ignores the key; close regardless.
        self.machine.borrow_mut().finish();
        self.close_windows();
    }

    fn queue_redraw(&self) {
        for overlay in self.windows.borrow().iter() {
            overlay.area.queue_draw();
        }
    }

    fn close_windows(&self) {
        let windows = std::mem::take(&mut *self.windows.borrow_mut());
        for overlay in windows {
            overlay.window.destroy();
        }
    }
}

fn dispatch(shared: &Weak<OverlayShared>, widget: Option<Widget>, event: SelectionEvent) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let window = widget
        .and_then(|widget| widget.root())
        .and_downcast::<Window>();
    shared.handle(event, window.as_ref());
}

fn build_overlay_window(
    shared: Weak<OverlayShared>,
    monitor: &gdk::Monitor,
    mapping: MonitorMapping,
    with_settings: bool,
) -> OverlayWindow {
    let area = DrawingArea::new();
    area.set_hexpand(true);
    area.set_vexpand(true);
    area.set_cursor_from_name(Some("crosshair"));

    {
        let shared = shared.clone();
        area.set_draw_func(move |_, context, width, height| {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let selection = shared
                .machine
                .borrow()
                .drag_rect()
                .map(|rect| mapping.local_rect(rect));
            paint_overlay(context, width, height, selection, with_settings);
        });
    }

    let drag = GestureDrag::new();
    drag.set_button(gdk::BUTTON_PRIMARY);
    {
        let shared = shared.clone();
        drag.connect_drag_begin(move |gesture, x, y| {
            let event = SelectionEvent::Press {
                button: PointerButton::Primary,
                at: mapping.to_global(x, y),
            };
            dispatch(&shared, gesture.widget(), event);
        });
    }
    {
        let shared = shared.clone();
        drag.connect_drag_update(move |gesture, offset_x, offset_y| {
            let Some((start_x, start_y)) = gesture.start_point() else {
                return;
            };
            let event = SelectionEvent::Move {
                at: mapping.to_global(start_x + offset_x, start_y + offset_y),
            };
            dispatch(&shared, gesture.widget(), event);
        });
    }
    {
        let shared = shared.clone();
        drag.connect_drag_end(move |gesture, offset_x, offset_y| {
            let Some((start_x, start_y)) = gesture.start_point() else {
                return;
            };
            let event = SelectionEvent::Release {
                button: PointerButton::Primary,
                at: mapping.to_global(start_x + offset_x, start_y + offset_y),
            };
            dispatch(&shared, gesture.widget(), event);
        });
    }
    area.add_controller(drag);

    let secondary = GestureClick::new();
    secondary.set_button(gdk::BUTTON_SECONDARY);
    {
        let shared = shared.clone();
        secondary.connect_pressed(move |gesture, _, x, y| {
            let event = SelectionEvent::Press {
                button: PointerButton::from_gdk(gesture.current_button()),
                at: mapping.to_global(x, y),
            };
            dispatch(&shared, gesture.widget(), event);
        });
    }
    area.add_controller(secondary);

    let window = Window::builder()
        .title("SnipTex selection")
        .decorated(false)
        .resizable(false)
        .child(&area)
        .build();
    window.add_css_class("sniptex-overlay");

    let keys = EventControllerKey::new();
    {
        let shared = shared.clone();
        keys.connect_key_pressed(move |controller, key, _, _| {
            if key != gdk::Key::Escape {
                return glib::Propagation::Proceed;
            }
            dispatch(&shared, controller.widget(), SelectionEvent::CancelKey);
            glib::Propagation::Stop
        });
    }
    window.add_controller(keys);

    window.connect_close_request(move |_| {
        if let Some(shared) = shared.upgrade() {
            shared.cancel();
        }
        glib::Propagation::Proceed
    });

    window.fullscreen_on_monitor(monitor);
    OverlayWindow { window, area }
}

fn paint_overlay(
    context: &Context,
    width: i32,
    height: i32,
    selection: Option<(f64, f64, f64, f64)>,
    with_settings: bool,
) {
    if width <= 0 || height <= 0 {
        return;
    }

    context.set_operator(Operator::Source);
    context.set_source_rgba(0.0, 0.0, 0.0, DIM_ALPHA);
    context.paint().ok();

    if let Some((x, y, w, h)) = selection {
        context.set_operator(Operator::Clear);
        context.rectangle(x, y, w, h);
        context.fill().ok();

        context.set_operator(Operator::Over);
        let (r, g, b, a) = BORDER_RGBA;
        context.set_source_rgba(r, g, b, a);
        context.set_line_width(BORDER_WIDTH);
        context.rectangle(x, y, w, h);
        context.stroke().ok();
    }

    if with_settings {
        paint_settings_button(context);
    }
}

fn paint_settings_button(context: &Context) {
    let origin = f64::from(SETTINGS_BUTTON_OFFSET);
    let size = f64::from(SETTINGS_BUTTON_SIZE);
    let center = origin + size / 2.0;

    context.set_operator(Operator::Over);
    context.set_source_rgba(20.0 / 255.0, 20.0 / 255.0, 20.0 / 255.0, 180.0 / 255.0);
    context.rectangle(origin, origin, size, size);
    context.fill().ok();

    context.set_source_rgba(1.0, 1.0, 1.0, 120.0 / 255.0);
    context.set_line_width(1.0);
    context.rectangle(origin + 0.5, origin + 0.5, size - 1.0, size - 1.0);
    context.stroke().ok();

    context.set_source_rgba(1.0, 1.0, 1.0, 1.0);
    context.set_line_width(2.0);
    context.arc(center, center, 7.0, 0.0, std::f64::consts::TAU);
    context.stroke().ok();
    for spoke in 0..8 {
        let angle = f64::from(spoke) * std::f64::consts::FRAC_PI_4;
        context.move_to(center + 7.0 * angle.cos(), center + 7.0 * angle.sin());
        context.line_to(center + 10.0 * angle.cos(), center + 10.0 * angle.sin());
    }
    context.stroke().ok();
    context.arc(center, center, 2.5, 0.0, std::f64::consts::TAU);
    context.fill().ok();
}
