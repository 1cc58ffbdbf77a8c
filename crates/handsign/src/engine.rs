//! The interface to the landmark inference engine.
//!
//! The engine itself (model loading, hardware backends, the neural network) is opaque to this
//! crate. It is plugged in through [`EngineFactory`], which builds a [`LandmarkEngine`] for a given
//! set of [`EngineOptions`].

use std::{env, fmt, str::FromStr};

use crossbeam::channel::Sender;

use crate::{
    error::{Error, InitErrorKind, Result},
    frame::InputImage,
    landmark::LandmarkerResult,
    resolution::Resolution,
};

/// Operating regime of a [`HandLandmarker`][crate::landmarker::HandLandmarker].
///
/// The mode is fixed when the engine is built; every detection entry point only works in its own
/// mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunningMode {
    /// Single still images, processed synchronously.
    #[default]
    Image,
    /// Offline videos sampled at a fixed interval, processed synchronously.
    Video,
    /// Live camera frames, processed asynchronously with results delivered to a listener.
    LiveStream,
}

/// Hardware backend the engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delegate {
    #[default]
    Cpu,
    /// Accelerator backend. Engines using it must only be used from the thread that built them.
    Gpu,
}

impl FromStr for Delegate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Delegate::Cpu),
            "gpu" => Ok(Delegate::Gpu),
            _ => Err(Error::InvalidConfig(format!(
                "unknown delegate '{s}' (expected 'cpu' or 'gpu')"
            ))),
        }
    }
}

impl fmt::Display for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Delegate::Cpu => "cpu",
            Delegate::Gpu => "gpu",
        })
    }
}

/// User-tunable engine parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    min_hand_detection_confidence: f32,
    min_tracking_confidence: f32,
    min_presence_confidence: f32,
    num_hands: u32,
    delegate: Delegate,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_hand_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            min_presence_confidence: 0.5,
            num_hands: 1,
            delegate: Delegate::Cpu,
        }
    }
}

impl EngineSettings {
    /// Reads settings from the `HANDSIGN_*` environment variables.
    ///
    /// Variables that are not set keep their default value. Values that fail to parse, or that are
    /// out of range, result in [`Error::InvalidConfig`].
    pub fn from_env() -> Result<Self> {
        fn var<T: FromStr>(name: &str) -> Result<Option<T>> {
            match env::var(name) {
                Ok(value) => value.trim().parse().map(Some).map_err(|_| {
                    Error::InvalidConfig(format!("invalid value '{value}' for {name}"))
                }),
                Err(_) => Ok(None),
            }
        }

        let mut settings = Self::default();
        if let Some(delegate) = var("HANDSIGN_DELEGATE")? {
            settings.delegate = delegate;
        }
        if let Some(num_hands) = var("HANDSIGN_NUM_HANDS")? {
            settings.num_hands = num_hands;
        }
        if let Some(conf) = var("HANDSIGN_MIN_DETECTION_CONFIDENCE")? {
            settings.min_hand_detection_confidence = conf;
        }
        if let Some(conf) = var("HANDSIGN_MIN_TRACKING_CONFIDENCE")? {
            settings.min_tracking_confidence = conf;
        }
        if let Some(conf) = var("HANDSIGN_MIN_PRESENCE_CONFIDENCE")? {
            settings.min_presence_confidence = conf;
        }
        settings.validate()?;

        log::debug!("engine settings from environment: {settings:?}");
        Ok(settings)
    }

    /// Sets the minimum confidence for the palm detector to report a hand.
    pub fn min_hand_detection_confidence(self, conf: f32) -> Self {
        Self {
            min_hand_detection_confidence: conf,
            ..self
        }
    }

    /// Sets the minimum confidence for a hand to keep being tracked between frames.
    pub fn min_tracking_confidence(self, conf: f32) -> Self {
        Self {
            min_tracking_confidence: conf,
            ..self
        }
    }

    /// Sets the minimum hand presence score.
    pub fn min_presence_confidence(self, conf: f32) -> Self {
        Self {
            min_presence_confidence: conf,
            ..self
        }
    }

    /// Sets the maximum number of hands to detect per frame.
    pub fn num_hands(self, num_hands: u32) -> Self {
        Self { num_hands, ..self }
    }

    pub fn delegate(self, delegate: Delegate) -> Self {
        Self { delegate, ..self }
    }

    pub fn hand_detection_confidence(&self) -> f32 {
        self.min_hand_detection_confidence
    }

    pub fn tracking_confidence(&self) -> f32 {
        self.min_tracking_confidence
    }

    pub fn presence_confidence(&self) -> f32 {
        self.min_presence_confidence
    }

    pub fn max_hands(&self) -> u32 {
        self.num_hands
    }

    pub fn selected_delegate(&self) -> Delegate {
        self.delegate
    }

    /// Checks that all thresholds are in range 0.0 to 1.0 and that at least one hand is detected.
    pub fn validate(&self) -> Result<()> {
        for (name, conf) in [
            ("hand detection", self.min_hand_detection_confidence),
            ("tracking", self.min_tracking_confidence),
            ("presence", self.min_presence_confidence),
        ] {
            if !(0.0..=1.0).contains(&conf) {
                return Err(Error::InvalidConfig(format!(
                    "minimum {name} confidence must be in range 0.0 to 1.0, got {conf}"
                )));
            }
        }
        if self.num_hands == 0 {
            return Err(Error::InvalidConfig(
                "number of hands must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Everything an [`EngineFactory`] needs to build an engine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineOptions {
    pub settings: EngineSettings,
    pub running_mode: RunningMode,
}

impl EngineOptions {
    pub fn new(settings: EngineSettings, running_mode: RunningMode) -> Self {
        Self {
            settings,
            running_mode,
        }
    }
}

/// A landmark inference engine built for one [`RunningMode`].
///
/// The driver only calls the entry point matching the mode the engine was built for. Calls are
/// serialized by the driver; the engine never sees two concurrent calls.
pub trait LandmarkEngine: Send {
    /// Runs inference on a single image. [`None`] means the engine could not produce a result.
    fn detect(&mut self, image: &InputImage) -> Option<LandmarkerResult>;

    /// Runs inference on a video frame. Timestamps are strictly increasing within one video.
    fn detect_for_video(&mut self, image: &InputImage, timestamp_ms: u64)
        -> Option<LandmarkerResult>;

    /// Submits a live frame for inference and returns without waiting for it.
    ///
    /// The engine must eventually consume `completion` (or drop it, which reports a failure). The
    /// result's timestamp must be `timestamp_ms`.
    fn detect_async(&mut self, image: InputImage, timestamp_ms: u64, completion: Completion);

    /// Releases the engine's resources. No other method is called afterwards.
    ///
    /// Every [`Completion`] handed to [`detect_async`](Self::detect_async) must be completed or
    /// dropped by the time this returns, including those still queued on other threads. Dropping
    /// the owning [`HandLandmarker`](crate::landmarker::HandLandmarker) waits for all of them.
    fn close(&mut self);
}

/// Builds [`LandmarkEngine`]s.
pub trait EngineFactory: Send {
    fn create(&self, options: &EngineOptions) -> Result<Box<dyn LandmarkEngine>, InitError>;
}

impl<F> EngineFactory for F
where
    F: Fn(&EngineOptions) -> Result<Box<dyn LandmarkEngine>, InitError> + Send,
{
    fn create(&self, options: &EngineOptions) -> Result<Box<dyn LandmarkEngine>, InitError> {
        self(options)
    }
}

/// Failure reported by an [`EngineFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitError {
    pub kind: InitErrorKind,
    pub message: String,
}

impl InitError {
    pub fn new<M: Into<String>>(kind: InitErrorKind, message: M) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The selected delegate cannot run the model.
    pub fn delegate_unsupported<M: Into<String>>(message: M) -> Self {
        Self::new(InitErrorKind::DelegateUnsupported, message)
    }

    pub fn other<M: Into<String>>(message: M) -> Self {
        Self::new(InitErrorKind::Other, message)
    }
}

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Error::EngineInit {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// An outcome of asynchronous inference, on its way to the delivery thread.
#[derive(Debug)]
pub(crate) enum AsyncEvent {
    Result {
        result: LandmarkerResult,
        input: Resolution,
    },
    Error {
        timestamp_ms: u64,
        message: Option<String>,
    },
}

/// Message reported when an engine drops a [`Completion`] without completing it.
pub(crate) const DROPPED_FRAME: &str = "frame was dropped by the landmark engine";

/// Single-use token for reporting the outcome of one [`LandmarkEngine::detect_async`] call.
///
/// Every submitted frame produces exactly one callback on the listener: either through
/// [`Completion::succeed`], [`Completion::fail`], or an error when the token is dropped unused.
pub struct Completion {
    sender: Option<Sender<AsyncEvent>>,
    timestamp_ms: u64,
    input: Resolution,
}

impl Completion {
    pub(crate) fn new(sender: Sender<AsyncEvent>, timestamp_ms: u64, input: Resolution) -> Self {
        Self {
            sender: Some(sender),
            timestamp_ms,
            input,
        }
    }

    /// Timestamp of the frame this completion belongs to.
    #[inline]
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Resolution of the submitted image.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input
    }

    /// Delivers a successful result.
    pub fn succeed(mut self, result: LandmarkerResult) {
        if result.timestamp_ms() != self.timestamp_ms {
            log::warn!(
                "engine result timestamp {} does not match frame timestamp {}",
                result.timestamp_ms(),
                self.timestamp_ms,
            );
        }
        let input = self.input;
        self.send(AsyncEvent::Result { result, input });
    }

    /// Reports that inference failed. `message` may be [`None`] if the engine has no details.
    pub fn fail(mut self, message: Option<String>) {
        let timestamp_ms = self.timestamp_ms;
        self.send(AsyncEvent::Error {
            timestamp_ms,
            message,
        });
    }

    fn send(&mut self, event: AsyncEvent) {
        if let Some(sender) = self.sender.take() {
            if sender.send(event).is_err() {
                log::debug!(
                    "delivery thread is gone, discarding outcome for frame at {} ms",
                    self.timestamp_ms
                );
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let timestamp_ms = self.timestamp_ms;
            self.send(AsyncEvent::Error {
                timestamp_ms,
                message: Some(DROPPED_FRAME.into()),
            });
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("timestamp_ms", &self.timestamp_ms)
            .field("input", &self.input)
            .field("pending", &self.sender.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Tests touching the process environment must not run concurrently.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 5] = [
        "HANDSIGN_DELEGATE",
        "HANDSIGN_NUM_HANDS",
        "HANDSIGN_MIN_DETECTION_CONFIDENCE",
        "HANDSIGN_MIN_TRACKING_CONFIDENCE",
        "HANDSIGN_MIN_PRESENCE_CONFIDENCE",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn default_settings() {
        let s = EngineSettings::default();
        assert_eq!(s.hand_detection_confidence(), 0.5);
        assert_eq!(s.tracking_confidence(), 0.5);
        assert_eq!(s.presence_confidence(), 0.5);
        assert_eq!(s.max_hands(), 1);
        assert_eq!(s.selected_delegate(), Delegate::Cpu);
        s.validate().unwrap();
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(EngineSettings::default().num_hands(0).validate().is_err());
        assert!(EngineSettings::default()
            .min_tracking_confidence(1.5)
            .validate()
            .is_err());
        assert!(EngineSettings::default()
            .min_presence_confidence(f32::NAN)
            .validate()
            .is_err());
        EngineSettings::default()
            .min_hand_detection_confidence(0.0)
            .min_presence_confidence(1.0)
            .num_hands(2)
            .validate()
            .unwrap();
    }

    #[test]
    fn settings_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert_eq!(EngineSettings::from_env().unwrap(), EngineSettings::default());

        env::set_var("HANDSIGN_DELEGATE", "GPU");
        env::set_var("HANDSIGN_NUM_HANDS", "2");
        env::set_var("HANDSIGN_MIN_TRACKING_CONFIDENCE", " 0.75 ");
        let s = EngineSettings::from_env().unwrap();
        assert_eq!(s.selected_delegate(), Delegate::Gpu);
        assert_eq!(s.max_hands(), 2);
        assert_eq!(s.tracking_confidence(), 0.75);
        assert_eq!(s.presence_confidence(), 0.5);

        env::set_var("HANDSIGN_NUM_HANDS", "many");
        assert!(matches!(
            EngineSettings::from_env(),
            Err(Error::InvalidConfig(_))
        ));

        env::set_var("HANDSIGN_NUM_HANDS", "1");
        env::set_var("HANDSIGN_MIN_DETECTION_CONFIDENCE", "2");
        assert!(matches!(
            EngineSettings::from_env(),
            Err(Error::InvalidConfig(_))
        ));
        clear_env();
    }

    #[test]
    fn parse_delegate() {
        assert_eq!("cpu".parse::<Delegate>().unwrap(), Delegate::Cpu);
        assert_eq!("Gpu".parse::<Delegate>().unwrap(), Delegate::Gpu);
        assert!("tpu".parse::<Delegate>().is_err());
        assert_eq!(Delegate::Gpu.to_string(), "gpu");
    }

    #[test]
    fn completion_delivers_exactly_once() {
        let (sender, recv) = crossbeam::channel::unbounded();
        let res = Resolution::new(4, 3);

        Completion::new(sender.clone(), 7, res).succeed(LandmarkerResult::new(Vec::new(), 7));
        Completion::new(sender.clone(), 8, res).fail(None);
        drop(Completion::new(sender, 9, res));

        let events: Vec<_> = recv.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            AsyncEvent::Result { result, input } if result.timestamp_ms() == 7 && *input == res
        ));
        assert!(matches!(
            &events[1],
            AsyncEvent::Error { timestamp_ms: 8, message: None }
        ));
        assert!(matches!(
            &events[2],
            AsyncEvent::Error { timestamp_ms: 9, message: Some(m) } if m == DROPPED_FRAME
        ));
    }

    #[test]
    fn closures_are_factories() {
        let factory = |_: &EngineOptions| -> Result<Box<dyn LandmarkEngine>, InitError> {
            Err(InitError::delegate_unsupported("no accelerator"))
        };
        let err = factory.create(&EngineOptions::default()).err().unwrap();
        assert_eq!(err.kind, InitErrorKind::DelegateUnsupported);
        assert_eq!(Error::from(err).code(), crate::ErrorCode::Gpu);
    }
}
