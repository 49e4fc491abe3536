use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Analyser, AudioConfig, AudioSnapshot, MusicVizError, Result};

/// Where the samples of a source come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// A file-backed media element. Audible through the output sink.
    MediaElement,
    /// Live capture. Analysed only, never routed to the output.
    Microphone,
}

/// Stable identity of a source handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

/// Handle to an audio source owned by the playback collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHandle {
    pub id: SourceId,
    pub kind: SourceKind,
    pub label: String,
}

impl SourceHandle {
    pub fn media_element(id: u64, label: impl Into<String>) -> Self {
        Self {
            id: SourceId(id),
            kind: SourceKind::MediaElement,
            label: label.into(),
        }
    }

    pub fn microphone(id: u64) -> Self {
        Self {
            id: SourceId(id),
            kind: SourceKind::Microphone,
            label: "microphone".to_string(),
        }
    }
}

/// Which graph edges a source node feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub to_analyser: bool,
    pub to_output: bool,
}

impl Routing {
    fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::MediaElement => Self {
                to_analyser: true,
                to_output: true,
            },
            SourceKind::Microphone => Self {
                to_analyser: true,
                to_output: false,
            },
        }
    }
}

/// Audible destination of the graph.
pub trait OutputSink {
    fn write(&mut self, samples: &[f32]);
}

/// Sink that drops audio but remembers how much it was handed.
#[derive(Debug, Default, Clone)]
pub struct NullSink {
    pub samples_written: usize,
    pub peak: f32,
}

impl OutputSink for NullSink {
    fn write(&mut self, samples: &[f32]) {
        self.samples_written += samples.len();
        self.peak = samples.iter().fold(self.peak, |peak, s| peak.max(s.abs()));
    }
}

/// Permission-gated access to a capture device.
pub trait MicrophoneAccess {
    /// Requests the device. Denial or absence is reported as
    /// [`MusicVizError::Acquisition`].
    fn acquire(&mut self) -> Result<SourceHandle>;
}

#[derive(Debug)]
struct SourceNode {
    handle: SourceHandle,
    routing: Routing,
}

/// Single audio graph: wrapped sources, one analyser, one gain-controlled
/// output. Constructed once and passed to whoever drives the frames.
pub struct AudioEngine {
    sample_rate: u32,
    analyser: Option<Analyser>,
    nodes: HashMap<SourceId, SourceNode>,
    active: Option<SourceId>,
    output_level: f32,
    sink: Box<dyn OutputSink>,
    nodes_created: usize,
}

impl AudioEngine {
    /// Creates an engine that discards its audible output.
    pub fn new(config: &AudioConfig) -> Self {
        Self::with_sink(config, Box::new(NullSink::default()))
    }

    pub fn with_sink(config: &AudioConfig, sink: Box<dyn OutputSink>) -> Self {
        Self {
            sample_rate: config.sample_rate,
            analyser: None,
            nodes: HashMap::new(),
            active: None,
            output_level: config.output_level.clamp(0.0, 1.0),
            sink,
            nodes_created: 0,
        }
    }

    /// Returns the sample rate the engine operates at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_initialized(&self) -> bool {
        self.analyser.is_some()
    }

    pub fn active_source(&self) -> Option<SourceId> {
        self.active
    }

    pub fn output_level(&self) -> f32 {
        self.output_level
    }

    /// Number of source nodes ever created. Re-attaching a known source
    /// does not create a new one.
    pub fn nodes_created(&self) -> usize {
        self.nodes_created
    }

    /// Current routing of the active source, if any.
    pub fn routing(&self) -> Option<Routing> {
        self.active
            .and_then(|id| self.nodes.get(&id))
            .map(|node| node.routing)
    }

    /// Attaches `source` as the single active source.
    pub fn connect_source(&mut self, source: &SourceHandle) -> Result<()> {
        if self.analyser.is_none() {
            tracing::debug!("creating analysis node");
            self.analyser = Some(Analyser::new());
        }

        if let Some(previous) = self.active.take() {
            if previous != source.id {
                tracing::debug!(source = previous.0, "detaching previous source");
                if let Some(analyser) = self.analyser.as_mut() {
                    analyser.reset();
                }
            }
        }

        match self.nodes.get_mut(&source.id) {
            Some(node) => {
                tracing::debug!(source = source.id.0, "reusing existing source node");
                node.routing = Routing::for_kind(node.handle.kind);
            }
            None => {
                tracing::debug!(source = source.id.0, kind = ?source.kind, "wrapping new source");
                self.nodes.insert(
                    source.id,
                    SourceNode {
                        handle: source.clone(),
                        routing: Routing::for_kind(source.kind),
                    },
                );
                self.nodes_created += 1;
            }
        }

        self.active = Some(source.id);
        Ok(())
    }

    /// Requests the microphone and attaches it. On failure the previous
    /// connection stays exactly as it was.
    pub fn connect_microphone(&mut self, access: &mut dyn MicrophoneAccess) -> Result<SourceId> {
        let handle = access.acquire().map_err(|err| {
            tracing::warn!(error = %err, "microphone acquisition failed");
            match err {
                MusicVizError::Acquisition(_) => err,
                other => MusicVizError::Acquisition(other.to_string()),
            }
        })?;

        if handle.kind != SourceKind::Microphone {
            return Err(MusicVizError::Acquisition(format!(
                "device `{}` is not a capture source",
                handle.label
            )));
        }

        self.connect_source(&handle)?;
        Ok(handle.id)
    }

    /// Detaches the active source. The analyser and wrapped nodes survive.
    pub fn disconnect(&mut self) {
        if let Some(id) = self.active.take() {
            tracing::debug!(source = id.0, "source disconnected");
        }
    }

    /// Scales the audible output. Analysis data is unaffected.
    pub fn set_output_level(&mut self, level: f32) {
        self.output_level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Feeds a block of mono samples produced by `source`. Blocks from any
    /// source other than the active one are ignored.
    pub fn push_samples(&mut self, source: SourceId, samples: &[f32]) {
        if samples.is_empty() || self.active != Some(source) {
            return;
        }
        let Some(node) = self.nodes.get(&source) else {
            return;
        };
        let routing = node.routing;

        if routing.to_analyser {
            if let Some(analyser) = self.analyser.as_mut() {
                analyser.push_samples(samples);
            }
        }

        if routing.to_output {
            let level = self.output_level;
            let gained: Vec<f32> = samples.iter().map(|s| s * level).collect();
            self.sink.write(&gained);
        }
    }

    /// Performs the single per-frame read. Before the first source is
    /// attached this is the empty snapshot.
    pub fn snapshot(&mut self) -> AudioSnapshot {
        match self.analyser.as_mut() {
            Some(analyser) => analyser.snapshot().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "analysis read failed");
                AudioSnapshot::empty()
            }),
            None => AudioSnapshot::empty(),
        }
    }
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("sample_rate", &self.sample_rate)
            .field("initialized", &self.analyser.is_some())
            .field("nodes", &self.nodes.len())
            .field("active", &self.active)
            .field("output_level", &self.output_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<NullSink>>);

    impl OutputSink for SharedSink {
        fn write(&mut self, samples: &[f32]) {
            self.0.borrow_mut().write(samples);
        }
    }

    struct Denied;

    impl MicrophoneAccess for Denied {
        fn acquire(&mut self) -> Result<SourceHandle> {
            Err(MusicVizError::Acquisition("permission denied".into()))
        }
    }

    struct Granted(u64);

    impl MicrophoneAccess for Granted {
        fn acquire(&mut self) -> Result<SourceHandle> {
            Ok(SourceHandle::microphone(self.0))
        }
    }

    fn engine_with_sink() -> (AudioEngine, SharedSink) {
        let sink = SharedSink::default();
        let engine = AudioEngine::with_sink(&AudioConfig::default(), Box::new(sink.clone()));
        (engine, sink)
    }

    #[test]
    fn snapshot_before_connect_is_empty() {
        let mut engine = AudioEngine::new(&AudioConfig::default());
        let snapshot = engine.snapshot();
        assert!(!engine.is_initialized());
        assert_eq!(snapshot, AudioSnapshot::empty());
    }

    #[test]
    fn reconnecting_same_source_reuses_node() {
        let mut engine = AudioEngine::new(&AudioConfig::default());
        let track = SourceHandle::media_element(1, "track.mp3");

        engine.connect_source(&track).unwrap();
        let routing_once = engine.routing();
        engine.connect_source(&track).unwrap();

        assert_eq!(engine.nodes_created(), 1);
        assert_eq!(engine.routing(), routing_once);
        assert_eq!(engine.active_source(), Some(SourceId(1)));
    }

    #[test]
    fn media_element_is_audible_and_scaled() {
        let (mut engine, sink) = engine_with_sink();
        let track = SourceHandle::media_element(7, "track.mp3");
        engine.connect_source(&track).unwrap();
        engine.set_output_level(0.5);

        engine.push_samples(track.id, &[1.0; 64]);

        let sink = sink.0.borrow();
        assert_eq!(sink.samples_written, 64);
        assert!((sink.peak - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn microphone_never_reaches_output() {
        let (mut engine, sink) = engine_with_sink();
        let id = engine.connect_microphone(&mut Granted(3)).unwrap();

        engine.push_samples(id, &[0.8; 256]);

        assert_eq!(sink.0.borrow().samples_written, 0);
        assert_eq!(
            engine.routing(),
            Some(Routing {
                to_analyser: true,
                to_output: false
            })
        );
        assert!(engine.snapshot().rms > 0.0);
    }

    #[test]
    fn denied_microphone_keeps_previous_source() {
        let mut engine = AudioEngine::new(&AudioConfig::default());
        let track = SourceHandle::media_element(1, "track.mp3");
        engine.connect_source(&track).unwrap();

        let err = engine.connect_microphone(&mut Denied).unwrap_err();

        assert!(matches!(err, MusicVizError::Acquisition(_)));
        assert_eq!(engine.active_source(), Some(track.id));
        assert_eq!(engine.nodes_created(), 1);
    }

    #[test]
    fn inactive_sources_are_ignored() {
        let (mut engine, sink) = engine_with_sink();
        let first = SourceHandle::media_element(1, "a.mp3");
        let second = SourceHandle::media_element(2, "b.mp3");
        engine.connect_source(&first).unwrap();
        engine.connect_source(&second).unwrap();

        engine.push_samples(first.id, &[1.0; 32]);
        assert_eq!(sink.0.borrow().samples_written, 0);

        engine.push_samples(second.id, &[1.0; 32]);
        assert_eq!(sink.0.borrow().samples_written, 32);
    }

    #[test]
    fn output_level_is_clamped() {
        let mut engine = AudioEngine::new(&AudioConfig::default());
        engine.set_output_level(3.0);
        assert_eq!(engine.output_level(), 1.0);
        engine.set_output_level(-1.0);
        assert_eq!(engine.output_level(), 0.0);
        engine.set_output_level(f32::NAN);
        assert_eq!(engine.output_level(), 0.0);
    }
}
