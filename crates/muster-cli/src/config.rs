use muster_core::{DetectorParams, DEFAULT_RECOGNITION_THRESHOLD, ENROLLMENT_TARGET};
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Root of the face sample store.
    pub samples_dir: PathBuf,
    /// Path of the persisted classifier artifact.
    pub model_path: PathBuf,
    /// Path of the attendance CSV ledger.
    pub ledger_path: PathBuf,
    /// Path of the SeetaFace detection model.
    pub detector_model_path: PathBuf,
    /// V4L2 device path.
    pub camera_device: String,
    /// Accept threshold on the classifier's distance scale.
    pub recognition_threshold: f32,
    /// Samples collected per enrollment session.
    pub enrollment_target: usize,
    /// Detector scale factor, forwarded unmodified.
    pub scale_factor: f32,
    /// Detector min_neighbors, forwarded unmodified.
    pub min_neighbors: u32,
}

impl Config {
    /// Load configuration from `MUSTER_*` environment variables with
    /// XDG-based defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("MUSTER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                std::env::var("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| {
                        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                        PathBuf::from(home).join(".local/share")
                    })
                    .join("muster")
            });

        let detector_defaults = DetectorParams::default();

        Self {
            samples_dir: env_path("MUSTER_SAMPLES_DIR", data_dir.join("samples")),
            model_path: env_path("MUSTER_MODEL_PATH", data_dir.join("model.json")),
            ledger_path: env_path("MUSTER_LEDGER_PATH", data_dir.join("attendance.csv")),
            detector_model_path: env_path(
                "MUSTER_DETECTOR_MODEL",
                data_dir.join("seeta_fd_frontal_v1.0.bin"),
            ),
            camera_device: std::env::var("MUSTER_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            recognition_threshold: env_f32(
                "MUSTER_RECOGNITION_THRESHOLD",
                DEFAULT_RECOGNITION_THRESHOLD,
            ),
            enrollment_target: env_usize("MUSTER_ENROLLMENT_TARGET", ENROLLMENT_TARGET),
            scale_factor: env_f32("MUSTER_DETECTOR_SCALE_FACTOR", detector_defaults.scale_factor),
            min_neighbors: env_u32("MUSTER_DETECTOR_MIN_NEIGHBORS", detector_defaults.min_neighbors),
        }
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
