//! End-to-end pipeline: enroll two identities through the capture loop,
//! train, then recognize against a live-ish frame sequence and check the
//! attendance ledger.

use image::{GrayImage, Luma};
use muster_core::{
    enroll_samples, CancelToken, CaptureError, Decision, DetectorError, DetectorParams,
    FaceDetector, FaceRect, FrameSource, RecognitionLoop, TrainedModel, Trainer,
    DEFAULT_RECOGNITION_THRESHOLD,
};
use muster_store::{AttendanceLedger, Identity, SampleStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tempfile::TempDir;

fn pattern_a(seed: u8) -> GrayImage {
    GrayImage::from_fn(100, 100, |x, _| {
        if (x / 4) % 2 == 0 {
            Luma([220 - seed])
        } else {
            Luma([30 + seed])
        }
    })
}

fn pattern_b(seed: u8) -> GrayImage {
    GrayImage::from_fn(100, 100, |_, y| {
        if (y / 4) % 2 == 0 {
            Luma([220 - seed])
        } else {
            Luma([30 + seed])
        }
    })
}

fn noise(seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    GrayImage::from_fn(100, 100, |_, _| Luma([rng.gen()]))
}

struct VecSource {
    frames: VecDeque<GrayImage>,
}

impl VecSource {
    fn new(frames: impl IntoIterator<Item = GrayImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, CaptureError> {
        Ok(self.frames.pop_front())
    }
}

/// One full-frame face per frame.
struct FullFrameDetector;

impl FaceDetector for FullFrameDetector {
    fn detect(
        &mut self,
        frame: &GrayImage,
        _params: &DetectorParams,
    ) -> Result<Vec<FaceRect>, DetectorError> {
        Ok(vec![FaceRect {
            x: 0,
            y: 0,
            width: frame.width(),
            height: frame.height(),
        }])
    }
}

#[test]
fn enroll_train_recognize_mark() {
    let data = TempDir::new().unwrap();
    let store = SampleStore::open(data.path().join("samples")).unwrap();
    let model_path = data.path().join("model.json");

    let alice = Identity::new("alice").unwrap();
    let bob = Identity::new("bob").unwrap();

    // Enroll 100 samples per identity through the capture loop. Seeds stay
    // below the point where the two stripe intensities would cross over.
    for (identity, frames) in [
        (&alice, (0..100).map(|s| pattern_a((s % 80) as u8)).collect::<Vec<_>>()),
        (&bob, (0..100).map(|s| pattern_b((s % 80) as u8)).collect::<Vec<_>>()),
    ] {
        let mut source = VecSource::new(frames);
        let outcome = enroll_samples(
            &store,
            identity,
            100,
            &mut source,
            &mut FullFrameDetector,
            &DetectorParams::default(),
            &CancelToken::new(),
            |_, _| {},
        )
        .unwrap();
        assert_eq!(outcome.collected, 100);
    }

    // Train and persist.
    let trained = Trainer::new(&store).train_and_save(&model_path).unwrap();
    assert_eq!(trained.label_map().len(), 2);

    // Recognition loads the persisted artifact, never the in-memory one.
    let model = TrainedModel::load(&model_path).unwrap();

    // Fresh samples that were not part of training.
    match model.decide(&pattern_a(85), DEFAULT_RECOGNITION_THRESHOLD) {
        Decision::Known { identity, confidence } => {
            assert_eq!(identity, alice);
            assert!(confidence < DEFAULT_RECOGNITION_THRESHOLD);
        }
        other => panic!("expected alice, got {other:?}"),
    }
    assert!(matches!(
        model.decide(&noise(7), DEFAULT_RECOGNITION_THRESHOLD),
        Decision::Unknown { .. }
    ));

    // Live sequence: alice three times, bob twice, one stranger.
    let mut ledger = AttendanceLedger::open(data.path().join("attendance.csv")).unwrap();
    let mut detector = FullFrameDetector;
    let mut source = VecSource::new([
        pattern_a(86),
        pattern_a(87),
        pattern_b(86),
        pattern_a(88),
        pattern_b(87),
        noise(8),
    ]);

    let mut recognition = RecognitionLoop::new(
        &model,
        &mut detector,
        &mut ledger,
        DEFAULT_RECOGNITION_THRESHOLD,
        DetectorParams::default(),
    );
    let summary = recognition
        .run(&mut source, &CancelToken::new(), |_| {})
        .unwrap();

    assert_eq!(summary.frames, 6);
    assert_eq!(summary.marked, 2);
    assert_eq!(summary.already_marked, 3);
    assert_eq!(summary.unknown, 1);

    // One row per identity for today, nothing for the stranger.
    let records = ledger.records();
    assert_eq!(records.len(), 2);
    let names: Vec<&str> = records.iter().map(|r| r.identity.as_str()).collect();
    assert!(names.contains(&"alice"));
    assert!(names.contains(&"bob"));
}
