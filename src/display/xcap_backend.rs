use xcap::Monitor;

use super::{DisplayBackend, DisplayError, MonitorDescriptor, MonitorSnapshot};
use crate::geometry::Rect;

/// Monitor enumeration and framebuffer grabs through `xcap`.
///
/// Must be driven from the UI-owning thread; several platform capture APIs
/// refuse to run anywhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapDisplayBackend;

impl DisplayBackend for XcapDisplayBackend {
    fn monitors(&self) -> Result<Vec<MonitorDescriptor>, DisplayError> {
        Ok(all_monitors()?
            .iter()
            .filter_map(describe_or_skip)
            .collect())
    }

    fn snapshot_all(&self) -> Result<Vec<MonitorSnapshot>, DisplayError> {
        let snapshots = all_monitors()?
            .iter()
            .filter_map(|monitor| {
                let descriptor = describe_or_skip(monitor)?;
                let image = match monitor.capture_image() {
                    Ok(image) if image.width() > 0 && image.height() > 0 => Some(image),
                    Ok(_) => {
                        tracing::warn!(monitor = %descriptor.name, "monitor grab returned an empty image");
                        None
                    }
                    Err(err) => {
                        tracing::warn!(monitor = %descriptor.name, %err, "monitor grab failed");
                        None
                    }
                };
                Some(MonitorSnapshot {
                    monitor: descriptor,
                    image,
                })
            })
            .collect();
        Ok(snapshots)
    }
}

fn all_monitors() -> Result<Vec<Monitor>, DisplayError> {
    Monitor::all().map_err(|err| DisplayError::Enumeration {
        message: err.to_string(),
    })
}

fn describe_or_skip(monitor: &Monitor) -> Option<MonitorDescriptor> {
    match describe(monitor) {
        Ok(descriptor) => Some(descriptor),
        Err(err) => {
            tracing::warn!(?err, "skipping monitor with unreadable geometry");
            None
        }
    }
}

fn describe(monitor: &Monitor) -> Result<MonitorDescriptor, DisplayError> {
    let name = monitor.name().unwrap_or_default();
    let geometry_error = |err: xcap::XCapError| DisplayError::Geometry {
        name: name.clone(),
        message: err.to_string(),
    };
    let x = monitor.x().map_err(geometry_error)?;
    let y = monitor.y().map_err(geometry_error)?;
    let width = monitor.width().map_err(geometry_error)?;
    let height = monitor.height().map_err(geometry_error)?;

    Ok(MonitorDescriptor {
        is_primary: monitor.is_primary().unwrap_or(false),
        bounds: Rect::new(x, y, width, height),
        name,
    })
}
