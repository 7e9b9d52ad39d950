//! Live visualization of the local microphone for mentor_room
//!
//! [`Analyser`] turns raw samples into byte-scaled frequency bins, the
//! [`scene`] module turns bins into a display list, and the
//! [`VisualizationPipeline`] runs both once per frame while the session is
//! connected.

pub mod analyser;
pub mod pipeline;
pub mod scene;

pub use analyser::{Analyser, FFT_SIZE, FREQUENCY_BIN_COUNT};
pub use pipeline::{
    VisualizationConfig, VisualizationHandle, VisualizationPipeline, MIN_FRAME_INTERVAL,
};
pub use scene::{pulse, render, Gradient, Rgba, Scene, Shape, VisualizationStyle};
