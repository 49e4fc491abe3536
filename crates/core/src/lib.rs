//! Core library for the Pulse Canvas visualiser.
//!
//! The crate turns an audio stream into per-frame analysis snapshots and
//! feeds them to one of eighteen audio-reactive visual modes. Each module
//! owns a distinct subsystem (audio graph, analysis, scheduling, 2D drawing,
//! GPU scene management) and the [`Visualizer`] ties them together for a
//! host shell.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod modes;
pub mod reactive;
pub mod render;
pub mod scene;
pub mod timeline;
pub mod visualizer;

pub use analysis::{Analyser, AudioSnapshot, NormalizedBands, BASS_END, MID_END};
pub use audio::{
    AudioEngine, MicrophoneAccess, NullSink, OutputSink, Routing, SourceHandle, SourceId,
    SourceKind,
};
pub use config::{
    AppConfig, AudioConfig, RenderConfig, BIN_COUNT, FFT_SIZE, MAX_DECIBELS, MIN_DECIBELS,
    SCENE_CLOCK_DELTA, SMOOTHING_TIME_CONSTANT,
};
pub use error::{MusicVizError, Result};
pub use modes::{ModeFamily, ModeRegistry, RenderMode};
pub use render::{Canvas, DisplayList, GpuDevice, HeadlessGpu, Renderer, Surfaces, Viewport};
pub use timeline::{
    FrameClock, FrameRequester, FrameToken, ManualFrameLoop, Scheduler, SchedulerState,
};
pub use visualizer::Visualizer;
