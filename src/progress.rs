//! Progress-callback trait for stage and per-unit pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each stage and unit.
//!
//! # Example
//!
//! ```rust
//! use ebook_translate::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     translated: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, unit: usize, total: usize, len: usize) {
//!         self.translated.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Unit {}/{} translated ({} bytes)", unit, total, len);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { translated: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(cb as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::stage::Stage;
use std::sync::Arc;

/// Called by the pipeline as it runs stages and translates units.
///
/// Stages and units run one after another, so callbacks are never invoked
/// concurrently; the `Send + Sync` bound only lets the callback live in a
/// shared [`crate::config::PipelineConfig`]. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called before a unit is handed to the translator.
    ///
    /// # Arguments
    /// * `unit`  - 1-based sequence index
    /// * `total` - number of source units
    fn on_unit_start(&self, unit: usize, total: usize) {
        let _ = (unit, total);
    }

    /// Called when a unit is translated and written.
    ///
    /// `len` is the byte length of the translated text.
    fn on_unit_complete(&self, unit: usize, total: usize, len: usize) {
        let _ = (unit, total, len);
    }

    /// Called when a unit is skipped because its translation already exists.
    fn on_unit_skipped(&self, unit: usize, total: usize) {
        let _ = (unit, total);
    }

    /// Called when a unit fails; the stage continues with the next one.
    fn on_unit_error(&self, unit: usize, total: usize, error: &str) {
        let _ = (unit, total, error);
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        completes: AtomicUsize,
        skips: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_stage_start(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_unit_complete(&self, _unit: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_skipped(&self, _unit: usize, _total: usize) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _unit: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Translated);
        cb.on_unit_start(1, 3);
        cb.on_unit_complete(1, 3, 42);
        cb.on_unit_skipped(2, 3);
        cb.on_unit_error(3, 3, "timeout");
        cb.on_stage_complete(Stage::Translated);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage_start(Stage::Split);
        tracker.on_stage_start(Stage::Translated);
        tracker.on_unit_complete(1, 3, 10);
        tracker.on_unit_skipped(2, 3);
        tracker.on_unit_error(3, 3, "boom");

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Split, Stage::Translated]
        );
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Merged);
        cb.on_stage_complete(Stage::Merged);
    }
}
