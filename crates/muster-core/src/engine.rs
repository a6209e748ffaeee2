//! Capture-side orchestration: the enrollment loop and the recognition
//! loop.
//!
//! Both loops pull frames from a [`FrameSource`], hand them to a
//! [`FaceDetector`], and check for cancellation once per frame. Rendering
//! stays external: the recognition loop reports what it saw through a
//! per-frame callback.

use chrono::Local;
use image::GrayImage;
use muster_store::{AttendanceLedger, Identity, LedgerError, MarkOutcome, SampleStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::classifier::{Decision, TrainedModel};
use crate::detector::{extract_sample, DetectorError, DetectorParams, FaceDetector, FaceRect};

/// Samples collected per identity in one enrollment session.
pub const ENROLLMENT_TARGET: usize = 100;

/// Side length of the normalized square face sample.
pub const SAMPLE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Lazy sequence of grayscale frames from an external capture source.
///
/// `Ok(None)` means the source is drained; an error means the device
/// cannot produce frames and the current loop is over.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, CaptureError>;
}

/// Clone-safe cancellation flag, checked at frame granularity.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// How an enrollment session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentOutcome {
    /// Samples stored this session.
    pub collected: usize,
    /// Frames pulled from the source.
    pub frames: u64,
    pub cancelled: bool,
}

/// Collect face samples for one identity until `target` samples are
/// stored, the source drains, or the token is cancelled.
///
/// Every detected region in a frame becomes one stored sample, cropped
/// and normalized to [`SAMPLE_SIZE`]; no per-sample quality filtering is
/// applied. `on_progress` is invoked after each stored sample with
/// (collected, target).
pub fn enroll_samples<S, D>(
    store: &SampleStore,
    identity: &Identity,
    target: usize,
    source: &mut S,
    detector: &mut D,
    params: &DetectorParams,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<EnrollmentOutcome, EngineError>
where
    S: FrameSource,
    D: FaceDetector,
{
    let mut collected = 0usize;
    let mut frames = 0u64;
    let mut cancelled = false;

    while collected < target {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let Some(frame) = source.next_frame()? else {
            break;
        };
        frames += 1;

        for rect in detector.detect(&frame, params)? {
            if collected >= target {
                break;
            }
            let sample = extract_sample(&frame, &rect, SAMPLE_SIZE);
            store.add_sample(identity, &sample)?;
            collected += 1;
            on_progress(collected, target);
        }
    }

    tracing::info!(
        identity = %identity,
        collected,
        frames,
        cancelled,
        "enrollment session finished"
    );
    Ok(EnrollmentOutcome {
        collected,
        frames,
        cancelled,
    })
}

/// One classified region within a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub rect: FaceRect,
    pub decision: Decision,
    /// Ledger outcome for Known sightings; None for Unknown.
    pub outcome: Option<MarkOutcome>,
}

/// Everything the loop observed in one frame, for external display.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub sightings: Vec<Sighting>,
}

/// Totals for a finished recognition run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecognitionSummary {
    pub frames: u64,
    pub marked: usize,
    pub already_marked: usize,
    pub unknown: usize,
    pub cancelled: bool,
}

/// Continuous per-frame recognition: detect, classify, threshold, and
/// conditionally mark attendance.
///
/// The rule is applied independently per detected region per frame; there
/// is no cross-frame tracking. The ledger's own dedup makes the repeated
/// marks that follow from that harmless.
pub struct RecognitionLoop<'a, D: FaceDetector> {
    model: &'a TrainedModel,
    detector: &'a mut D,
    ledger: &'a mut AttendanceLedger,
    threshold: f32,
    params: DetectorParams,
}

impl<'a, D: FaceDetector> RecognitionLoop<'a, D> {
    pub fn new(
        model: &'a TrainedModel,
        detector: &'a mut D,
        ledger: &'a mut AttendanceLedger,
        threshold: f32,
        params: DetectorParams,
    ) -> Self {
        Self {
            model,
            detector,
            ledger,
            threshold,
            params,
        }
    }

    /// Run until the source drains or the token is cancelled. Recognition
    /// outcomes never terminate the loop.
    pub fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
        cancel: &CancelToken,
        mut on_frame: impl FnMut(&FrameReport),
    ) -> Result<RecognitionSummary, EngineError> {
        let mut summary = RecognitionSummary::default();

        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let Some(frame) = source.next_frame()? else {
                break;
            };

            let rects = self.detector.detect(&frame, &self.params)?;
            let mut sightings = Vec::with_capacity(rects.len());

            for rect in rects {
                let face = extract_sample(&frame, &rect, SAMPLE_SIZE);
                let decision = self.model.decide(&face, self.threshold);

                let outcome = match &decision {
                    Decision::Known { identity, confidence } => {
                        let outcome =
                            self.ledger.mark_present(identity, Local::now().naive_local())?;
                        match outcome {
                            MarkOutcome::Marked => summary.marked += 1,
                            MarkOutcome::AlreadyMarkedToday => summary.already_marked += 1,
                        }
                        tracing::debug!(identity = %identity, confidence, ?outcome, "face recognized");
                        Some(outcome)
                    }
                    Decision::Unknown { confidence } => {
                        summary.unknown += 1;
                        tracing::trace!(confidence, "unrecognized face");
                        None
                    }
                };

                sightings.push(Sighting {
                    rect,
                    decision,
                    outcome,
                });
            }

            let report = FrameReport {
                frame_index: summary.frames,
                sightings,
            };
            summary.frames += 1;
            on_frame(&report);
        }

        tracing::info!(
            frames = summary.frames,
            marked = summary.marked,
            unknown = summary.unknown,
            cancelled = summary.cancelled,
            "recognition loop finished"
        );
        Ok(summary)
    }
}
