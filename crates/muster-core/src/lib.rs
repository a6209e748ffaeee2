//! muster-core — Enrollment, training, and recognition pipeline.
//!
//! Samples flow one way: sample store → trainer → trained model →
//! recognition loop → attendance ledger. Capture and face detection are
//! external collaborators behind the [`FrameSource`] and [`FaceDetector`]
//! traits.

pub mod classifier;
pub mod detector;
pub mod engine;
pub mod labels;
pub mod lbph;
pub mod trainer;

pub use classifier::{
    ClassifierBackend, Decision, ModelError, Prediction, TrainedModel,
    DEFAULT_RECOGNITION_THRESHOLD,
};
pub use detector::{DetectorError, DetectorParams, FaceDetector, FaceRect};
pub use engine::{
    enroll_samples, CancelToken, CaptureError, EngineError, EnrollmentOutcome, FrameReport,
    FrameSource, RecognitionLoop, RecognitionSummary, Sighting, ENROLLMENT_TARGET, SAMPLE_SIZE,
};
pub use labels::LabelMap;
pub use lbph::LbphModel;
pub use trainer::{TrainError, Trainer};
