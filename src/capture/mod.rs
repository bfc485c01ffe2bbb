use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use thiserror::Error;

use crate::display::{DisplayBackend, MonitorSnapshot};
use crate::geometry::{bounding_rect, Point, Rect};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("selection {width}x{height} is too small to capture")]
    DegenerateSelection { width: u32, height: u32 },
    #[error("desktop capture unavailable")]
    DesktopUnavailable,
    #[error("selection {rect:?} lies outside the captured desktop")]
    OutsideDesktop { rect: Rect },
    #[error("failed to encode capture as png: {message}")]
    EncodeFailed { message: String },
}

/// Every monitor's pixels stitched into one buffer covering the virtual desktop.
///
/// Pixel (0, 0) corresponds to `origin` in global coordinates. Areas no monitor
/// covers stay fully transparent.
#[derive(Debug, Clone)]
pub struct ComposedImage {
    pub origin: Point,
    pub image: RgbaImage,
}

impl ComposedImage {
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.image.width(), self.image.height())
    }
}

/// Grabs every monitor and composes them at their virtual-desktop offsets.
///
/// Returns `None` when there is no monitor, the desktop is degenerate, or no
/// monitor produced any pixels. Individual failed grabs are skipped.
pub fn stitch_desktop_with<B: DisplayBackend + ?Sized>(backend: &B) -> Option<ComposedImage> {
    let snapshots = match backend.snapshot_all() {
        Ok(snapshots) => snapshots,
        Err(err) => {
            tracing::warn!(?err, "failed to grab monitors");
            return None;
        }
    };

    let Some(primary) = primary_snapshot(&snapshots) else {
        tracing::info!("no primary monitor; nothing to capture");
        return None;
    };
    tracing::debug!(primary = %primary.monitor.name, monitors = snapshots.len(), "stitching desktop");

    let desktop = bounding_rect(snapshots.iter().map(|snapshot| snapshot.monitor.bounds));
    if desktop.is_empty() {
        tracing::info!(?desktop, "virtual desktop is empty");
        return None;
    }

    compose(desktop, &snapshots)
}

fn primary_snapshot(snapshots: &[MonitorSnapshot]) -> Option<&MonitorSnapshot> {
    snapshots
        .iter()
        .find(|snapshot| snapshot.monitor.is_primary)
        .or_else(|| snapshots.first())
}

fn compose(desktop: Rect, snapshots: &[MonitorSnapshot]) -> Option<ComposedImage> {
    let mut canvas = RgbaImage::new(desktop.width, desktop.height);
    let mut blitted = 0usize;

    for snapshot in snapshots {
        let Some(pixels) = snapshot.image.as_ref() else {
            tracing::debug!(monitor = %snapshot.monitor.name, "skipping monitor without pixels");
            continue;
        };
        let bounds = snapshot.monitor.bounds;
        let offset = bounds.relative_to(desktop.origin()).origin();
        if pixels.dimensions() == (bounds.width, bounds.height) {
            imageops::replace(&mut canvas, pixels, i64::from(offset.x), i64::from(offset.y));
        } else {
            tracing::debug!(
                monitor = %snapshot.monitor.name,
                grab = ?pixels.dimensions(),
                ?bounds,
                "scaling grab to monitor bounds"
            );
            let scaled = imageops::resize(pixels, bounds.width, bounds.height, FilterType::Triangle);
            imageops::replace(&mut canvas, &scaled, i64::from(offset.x), i64::from(offset.y));
        }
        blitted += 1;
    }

    if blitted == 0 {
        tracing::warn!("no monitor produced pixels");
        return None;
    }

    Some(ComposedImage {
        origin: desktop.origin(),
        image: canvas,
    })
}

/// Clips a capture-space rectangle to the pixels the composed image actually has.
pub fn bound_to_image(composed: &ComposedImage, capture_rect: Rect) -> Result<Rect, CaptureError> {
    capture_rect
        .intersect(&composed.bounds())
        .ok_or(CaptureError::OutsideDesktop { rect: capture_rect })
}

/// Copies `bounded` out of the composed image. `bounded` must come from
/// [`bound_to_image`]; it is clipped again so the copy never reads out of range.
pub fn crop_composed(composed: &ComposedImage, bounded: Rect) -> Result<RgbaImage, CaptureError> {
    let bounded = bound_to_image(composed, bounded)?;
    Ok(imageops::crop_imm(
        &composed.image,
        bounded.x as u32,
        bounded.y as u32,
        bounded.width,
        bounded.height,
    )
    .to_image())
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| CaptureError::EncodeFailed {
            message: err.to_string(),
        })?;
    Ok(png)
}
