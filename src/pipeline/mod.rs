//! Capture & dispatch: selection → stitched desktop → crop → PNG → worker.

use std::sync::Arc;
use std::thread;

use image::RgbaImage;

use crate::bridge::{RequestId, RequestTicket, ResultBridge};
use crate::capture::{bound_to_image, crop_composed, encode_png, stitch_desktop_with, CaptureError};
use crate::display::DisplayBackend;
use crate::generation::GenerationBackend;
use crate::geometry::Rect;

/// Selections this thin or thinner are clicks, not drags.
pub const MAX_DEGENERATE_EXTENT: u32 = 1;

/// A cropped selection ready to hand off. Each capture owns its own buffer.
#[derive(Debug, Clone)]
pub struct PreparedCapture {
    /// Crop bounds in capture space after clipping to the composed image.
    pub bounds: Rect,
    pub png: Vec<u8>,
}

pub fn is_degenerate(rect: Rect) -> bool {
    rect.width <= MAX_DEGENERATE_EXTENT || rect.height <= MAX_DEGENERATE_EXTENT
}

/// Stitches the desktop and crops `capture_rect` out of it.
pub fn crop_selection<B: DisplayBackend + ?Sized>(
    display: &B,
    capture_rect: Rect,
) -> Result<(Rect, RgbaImage), CaptureError> {
    if is_degenerate(capture_rect) {
        return Err(CaptureError::DegenerateSelection {
            width: capture_rect.width,
            height: capture_rect.height,
        });
    }

    let composed = stitch_desktop_with(display).ok_or(CaptureError::DesktopUnavailable)?;
    let bounded = bound_to_image(&composed, capture_rect)?;
    let cropped = crop_composed(&composed, bounded)?;
    Ok((bounded, cropped))
}

pub fn prepare_capture<B: DisplayBackend + ?Sized>(
    display: &B,
    capture_rect: Rect,
) -> Result<PreparedCapture, CaptureError> {
    let (bounds, cropped) = crop_selection(display, capture_rect)?;
    let png = encode_png(&cropped)?;
    Ok(PreparedCapture { bounds, png })
}

pub struct CapturePipeline<D> {
    display: D,
    generator: Arc<dyn GenerationBackend>,
    bridge: ResultBridge,
}

impl<D: DisplayBackend> CapturePipeline<D> {
    pub fn new(display: D, generator: Arc<dyn GenerationBackend>, bridge: ResultBridge) -> Self {
        Self {
            display,
            generator,
            bridge,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Captures the selection and starts a generation worker for it.
    ///
    /// Returns immediately. `None` means the selection was dropped and no
    /// result will arrive; otherwise exactly one completion for the returned
    /// id will reach the bridge.
    pub fn capture_and_dispatch(&self, capture_rect: Rect) -> Option<RequestId> {
        let prepared = self.prepare_or_log(capture_rect)?;
        let ticket = self.bridge.open_request();
        let request_id = ticket.id();
        tracing::info!(
            request_id,
            bytes = prepared.png.len(),
            bounds = ?prepared.bounds,
            backend = self.generator.name(),
            "dispatched capture"
        );

        let generator = Arc::clone(&self.generator);
        let spawned = thread::Builder::new()
            .name(format!("generation-{request_id}"))
            .spawn(move || run_generation(generator.as_ref(), &prepared.png, ticket));
        if let Err(err) = spawned {
            // The unspawned closure drops its ticket, which posts WorkerLost.
            tracing::error!(request_id, ?err, "failed to spawn generation worker");
        }
        Some(request_id)
    }

    /// Captures the selection without contacting the generation backend.
    pub fn capture_only(&self, capture_rect: Rect) -> Option<PreparedCapture> {
        self.prepare_or_log(capture_rect)
    }

    fn prepare_or_log(&self, capture_rect: Rect) -> Option<PreparedCapture> {
        match prepare_capture(&self.display, capture_rect) {
            Ok(prepared) => Some(prepared),
            Err(err) => {
                log_dropped_capture(capture_rect, &err);
                None
            }
        }
    }
}

fn run_generation(generator: &dyn GenerationBackend, png: &[u8], ticket: RequestTicket) {
    let request_id = ticket.id();
    let result = generator.generate(png);
    match &result {
        Ok(text) => tracing::info!(request_id, chars = text.chars().count(), "generation succeeded"),
        Err(err) => tracing::warn!(request_id, %err, "generation failed"),
    }
    ticket.complete(result);
}

fn log_dropped_capture(capture_rect: Rect, err: &CaptureError) {
    match err {
        CaptureError::DegenerateSelection { .. } => {
            tracing::debug!(?capture_rect, "ignoring degenerate selection");
        }
        CaptureError::DesktopUnavailable | CaptureError::OutsideDesktop { .. } => {
            tracing::info!(?capture_rect, %err, "nothing to capture");
        }
        CaptureError::EncodeFailed { .. } => {
            tracing::warn!(?capture_rect, %err, "capture aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use image::Rgba;

    use super::*;
    use crate::bridge::{Completion, ResultQueue};
    use crate::display::testing::FakeDisplayBackend;
    use crate::generation::{GenerationError, GenerationResult};

    const GREEN: Rgba<u8> = Rgba([0, 200, 0, 255]);

    struct RecordingGenerator {
        payloads: Mutex<Vec<Vec<u8>>>,
        reply: GenerationResult<String>,
    }

    impl RecordingGenerator {
        fn replying(reply: GenerationResult<String>) -> Arc<Self> {
            Arc::new(Self {
                payloads: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn calls(&self) -> usize {
            self.payloads.lock().map(|payloads| payloads.len()).unwrap_or(0)
        }

        fn payload_dimensions(&self) -> Vec<(u32, u32)> {
            self.payloads
                .lock()
                .expect("payload lock")
                .iter()
                .map(|png| {
                    image::load_from_memory(png)
                        .expect("payload is a png")
                        .to_rgba8()
                        .dimensions()
                })
                .collect()
        }
    }

    impl GenerationBackend for RecordingGenerator {
        fn name(&self) -> &str {
            "recording"
        }

        fn generate(&self, png: &[u8]) -> GenerationResult<String> {
            self.payloads.lock().expect("payload lock").push(png.to_vec());
            self.reply.clone()
        }
    }

    /// Blocks inside `generate` until the test releases it.
    struct GatedGenerator {
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl GenerationBackend for GatedGenerator {
        fn name(&self) -> &str {
            "gated"
        }

        fn generate(&self, _png: &[u8]) -> GenerationResult<String> {
            let _ = self.entered.lock().expect("entered lock").send(());
            let released = self
                .release
                .lock()
                .expect("release lock")
                .recv_timeout(Duration::from_secs(5));
            match released {
                Ok(()) => Ok("\\frac{a}{b}".to_string()),
                Err(_) => Err(GenerationError::RequestFailed {
                    message: "never released".to_string(),
                }),
            }
        }
    }

    fn desktop() -> FakeDisplayBackend {
        FakeDisplayBackend::new()
            .with_monitor("DP-1", Rect::new(0, 0, 200, 100), GREEN)
            .with_monitor("DP-2", Rect::new(200, 0, 100, 100), GREEN)
    }

    fn pipeline_with(
        display: FakeDisplayBackend,
        generator: Arc<RecordingGenerator>,
    ) -> (CapturePipeline<FakeDisplayBackend>, ResultQueue) {
        let (bridge, queue) = ResultBridge::channel();
        (CapturePipeline::new(display, generator, bridge), queue)
    }

    fn wait_for_completions(queue: &ResultQueue, expected: usize) -> Vec<Completion> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut completions = Vec::new();
        while completions.len() < expected && Instant::now() < deadline {
            match queue.try_next() {
                Some(completion) => completions.push(completion),
                None => std::thread::sleep(Duration::from_millis(5)),
            }
        }
        completions
    }

    #[test]
    fn degenerate_selection_never_reaches_compositor_or_backend() {
        let generator = RecordingGenerator::replying(Ok("x".to_string()));
        let (pipeline, queue) = pipeline_with(desktop(), Arc::clone(&generator));

        for rect in [
            Rect::new(10, 10, 1, 50),
            Rect::new(10, 10, 50, 1),
            Rect::new(10, 10, 0, 0),
        ] {
            assert_eq!(pipeline.capture_and_dispatch(rect), None);
        }

        assert_eq!(pipeline.display().snapshot_calls.get(), 0);
        assert_eq!(generator.calls(), 0);
        assert_eq!(queue.pending(), 0);
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn dispatch_delivers_exactly_one_completion() {
        let generator = RecordingGenerator::replying(Ok("\\alpha".to_string()));
        let (pipeline, queue) = pipeline_with(desktop(), Arc::clone(&generator));

        let request_id = pipeline
            .capture_and_dispatch(Rect::new(150, 20, 100, 40))
            .expect("selection dispatches");

        let completions = wait_for_completions(&queue, 1);
        assert_eq!(
            completions,
            vec![Completion {
                request_id,
                result: Ok("\\alpha".to_string())
            }]
        );
        assert_eq!(pipeline.display().snapshot_calls.get(), 1);
        assert_eq!(generator.payload_dimensions(), vec![(100, 40)]);

        std::thread::sleep(Duration::from_millis(20));
        assert!(queue.try_next().is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn dispatch_returns_while_backend_is_still_working() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let generator = Arc::new(GatedGenerator {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let (bridge, queue) = ResultBridge::channel();
        let pipeline = CapturePipeline::new(desktop(), generator, bridge);

        let request_id = pipeline
            .capture_and_dispatch(Rect::new(10, 10, 40, 40))
            .expect("selection dispatches");
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker reaches the backend");
        assert!(queue.try_next().is_none());
        assert_eq!(queue.pending(), 1);

        // The overlay and pipeline going away does not cancel the request.
        drop(pipeline);
        release_tx.send(()).expect("worker is waiting");

        let completions = wait_for_completions(&queue, 1);
        assert_eq!(
            completions,
            vec![Completion {
                request_id,
                result: Ok("\\frac{a}{b}".to_string())
            }]
        );
        std::thread::sleep(Duration::from_millis(20));
        assert!(queue.try_next().is_none());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn backend_failure_is_delivered_as_failed_completion() {
        let generator = RecordingGenerator::replying(Err(GenerationError::MissingCredential));
        let (pipeline, queue) = pipeline_with(desktop(), generator);

        let request_id = pipeline
            .capture_and_dispatch(Rect::new(0, 0, 10, 10))
            .expect("selection dispatches");

        let completions = wait_for_completions(&queue, 1);
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].request_id, request_id);
        assert_eq!(completions[0].result, Err(GenerationError::MissingCredential));
    }

    #[test]
    fn selection_past_desktop_edge_is_clamped_before_cropping() {
        let prepared = prepare_capture(&desktop(), Rect::new(250, 60, 500, 500))
            .expect("overlapping selection captures");

        assert_eq!(prepared.bounds, Rect::new(250, 60, 50, 40));
        let decoded = image::load_from_memory(&prepared.png)
            .expect("png decodes")
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (50, 40));
        assert_eq!(*decoded.get_pixel(0, 0), GREEN);
    }

    #[test]
    fn selection_entirely_outside_coverage_is_dropped() {
        let generator = RecordingGenerator::replying(Ok("x".to_string()));
        let (pipeline, queue) = pipeline_with(desktop(), Arc::clone(&generator));

        assert_eq!(pipeline.capture_and_dispatch(Rect::new(400, 400, 50, 50)), None);
        assert_eq!(pipeline.display().snapshot_calls.get(), 1);
        assert_eq!(generator.calls(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn missing_monitors_abort_silently() {
        let generator = RecordingGenerator::replying(Ok("x".to_string()));
        let (pipeline, _queue) = pipeline_with(FakeDisplayBackend::new(), Arc::clone(&generator));

        assert_eq!(pipeline.capture_and_dispatch(Rect::new(0, 0, 50, 50)), None);
        assert_eq!(generator.calls(), 0);
    }

    #[test]
    fn overlapping_dispatches_carry_independent_payloads() {
        let generator = RecordingGenerator::replying(Ok("x".to_string()));
        let (pipeline, queue) = pipeline_with(desktop(), Arc::clone(&generator));

        let first = pipeline
            .capture_and_dispatch(Rect::new(0, 0, 20, 10))
            .expect("first dispatch");
        let second = pipeline
            .capture_and_dispatch(Rect::new(0, 0, 30, 15))
            .expect("second dispatch");
        assert_ne!(first, second);

        let completions = wait_for_completions(&queue, 2);
        assert_eq!(completions.len(), 2);

        let mut dimensions = generator.payload_dimensions();
        dimensions.sort_unstable();
        assert_eq!(dimensions, vec![(20, 10), (30, 15)]);
    }

    #[test]
    fn capture_only_skips_the_backend() {
        let generator = RecordingGenerator::replying(Ok("x".to_string()));
        let (pipeline, queue) = pipeline_with(desktop(), Arc::clone(&generator));

        let prepared = pipeline
            .capture_only(Rect::new(190, 10, 20, 20))
            .expect("image capture");
        assert_eq!(prepared.bounds, Rect::new(190, 10, 20, 20));
        assert_eq!(generator.calls(), 0);
        assert_eq!(queue.pending(), 0);
    }
}
