use image::RgbaImage;
use thiserror::Error;

use crate::geometry::{bounding_rect, Rect};

mod xcap_backend;

pub use xcap_backend::XcapDisplayBackend;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to enumerate monitors: {message}")]
    Enumeration { message: String },
    #[error("failed to read geometry of monitor {name}: {message}")]
    Geometry { name: String, message: String },
}

/// Geometry of one connected monitor in global (cross-monitor) coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDescriptor {
    pub name: String,
    pub bounds: Rect,
    pub is_primary: bool,
}

/// A monitor together with its current framebuffer, if the grab produced one.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub monitor: MonitorDescriptor,
    pub image: Option<RgbaImage>,
}

pub trait DisplayBackend {
    fn monitors(&self) -> Result<Vec<MonitorDescriptor>, DisplayError>;
    /// Grabs every monitor. A failed grab for one monitor yields `image: None`
    /// rather than failing the whole call.
    fn snapshot_all(&self) -> Result<Vec<MonitorSnapshot>, DisplayError>;
}

/// Connected monitors, or none when enumeration fails.
pub fn resolve_monitors<B: DisplayBackend + ?Sized>(backend: &B) -> Vec<MonitorDescriptor> {
    backend.monitors().unwrap_or_else(|err| {
        tracing::warn!(?err, "monitor enumeration failed; virtual desktop unavailable");
        Vec::new()
    })
}

/// Union of every connected monitor. Zero-sized when nothing is enumerable,
/// which callers treat as "capture unavailable".
pub fn resolve_virtual_desktop<B: DisplayBackend + ?Sized>(backend: &B) -> Rect {
    virtual_desktop_of(&resolve_monitors(backend))
}

pub fn virtual_desktop_of(monitors: &[MonitorDescriptor]) -> Rect {
    bounding_rect(monitors.iter().map(|monitor| monitor.bounds))
}


#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::testing::FakeDisplayBackend;
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn resolve_virtual_desktop_unions_disjoint_monitors() {
        let backend = FakeDisplayBackend::new()
            .with_monitor("DP-1", Rect::new(0, 0, 1920, 1080), WHITE)
            .with_monitor("DP-2", Rect::new(1920, 0, 1280, 1024), WHITE);

        assert_eq!(resolve_virtual_desktop(&backend), Rect::new(0, 0, 3200, 1080));
    }

    #[test]
    fn resolve_virtual_desktop_keeps_non_zero_origin() {
        let backend = FakeDisplayBackend::new()
            .with_monitor("DP-1", Rect::new(0, 0, 1920, 1080), WHITE)
            .with_monitor("HDMI-1", Rect::new(-500, -200, 500, 800), WHITE);

        assert_eq!(
            resolve_virtual_desktop(&backend),
            Rect::new(-500, -200, 2420, 1280)
        );
    }

    #[test]
    fn resolve_virtual_desktop_is_empty_without_monitors() {
        let backend = FakeDisplayBackend::new();
        assert!(resolve_virtual_desktop(&backend).is_empty());
    }

    #[test]
    fn resolve_virtual_desktop_is_empty_when_enumeration_fails() {
        let mut backend =
            FakeDisplayBackend::new().with_monitor("DP-1", Rect::new(0, 0, 800, 600), WHITE);
        backend.fail_enumeration = true;
        assert!(resolve_virtual_desktop(&backend).is_empty());
    }

    #[test]
    fn resolve_monitors_is_empty_when_enumeration_fails() {
        let mut backend =
            FakeDisplayBackend::new().with_monitor("DP-1", Rect::new(0, 0, 800, 600), WHITE);
        assert_eq!(resolve_monitors(&backend).len(), 1);

        backend.fail_enumeration = true;
        assert!(resolve_monitors(&backend).is_empty());
    }

    #[test]
    fn resolve_virtual_desktop_reflects_monitor_changes_between_calls() {
        let mut backend =
            FakeDisplayBackend::new().with_monitor("DP-1", Rect::new(0, 0, 800, 600), WHITE);
        assert_eq!(resolve_virtual_desktop(&backend), Rect::new(0, 0, 800, 600));

        backend = backend.with_monitor("DP-2", Rect::new(800, 0, 800, 600), WHITE);
        assert_eq!(resolve_virtual_desktop(&backend), Rect::new(0, 0, 1600, 600));
    }
}
