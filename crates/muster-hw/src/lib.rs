//! muster-hw — External collaborators for the recognition pipeline.
//!
//! V4L2 camera capture feeding the core `FrameSource` trait, and a
//! SeetaFace-backed implementation of the core `FaceDetector` trait.

pub mod camera;
pub mod detect;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream};
pub use detect::SeetaDetector;
pub use frame::Frame;
