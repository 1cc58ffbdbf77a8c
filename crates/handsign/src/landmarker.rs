//! The hand landmarker driver.
//!
//! [`HandLandmarker`] owns one [`LandmarkEngine`] at a time and exposes a detection entry point
//! per [`RunningMode`]:
//!
//! - [`HandLandmarker::detect_image`] for single images,
//! - [`HandLandmarker::detect_video_file`] for stored videos, sampled at a fixed interval,
//! - [`HandLandmarker::detect_live_stream`] for camera frames, with results delivered to a
//!   [`LandmarkerListener`] on a background thread.
//!
//! All entry points take `&mut self`, so calls into the engine are serialized at compile time.

use std::{
    sync::Arc,
    thread::{self, ThreadId},
};

use image::DynamicImage;

use crate::{
    bundle::ResultBundle,
    engine::{
        AsyncEvent, Completion, Delegate, EngineFactory, EngineOptions, EngineSettings,
        LandmarkEngine, RunningMode,
    },
    error::{Error, ErrorCode, InitErrorKind, Result},
    frame::{CameraFrame, InputImage, VideoSource},
    listener::LandmarkerListener,
    resolution::Resolution,
    timer::{uptime_millis, FpsCounter, Timer},
    worker::Worker,
};

const FAILED_TO_INITIALIZE: &str = "Hand Landmarker failed to initialize. See error logs for details";
const FAILED_TO_DETECT: &str = "Hand Landmarker failed to detect.";
const VIDEO_RESULT_MISSING: &str = "ResultBundle could not be returned in detectVideoFile";
const VIDEO_FRAME_MISSING: &str =
    "Frame at specified time could not be retrieved when detecting in video.";
const UNKNOWN_ERROR: &str = "An unknown error has occurred";

/// Capacity of the live-stream delivery queue. The engine blocks when the listener falls this far
/// behind.
const DELIVERY_QUEUE_CAPACITY: usize = 16;

/// Upper bound on the frames sampled from one video. Durations implying more are treated as
/// corrupt metadata.
const MAX_VIDEO_SAMPLES: u64 = 1 << 24;

/// Lifecycle state of a [`HandLandmarker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No engine has been built yet, or the last build failed.
    Uninitialized,
    /// An engine is available and detection calls are accepted.
    Ready,
    /// The engine was released by [`HandLandmarker::close`].
    Closed,
}

enum Lifecycle {
    Uninitialized,
    Ready(Box<dyn LandmarkEngine>),
    Closed,
}

impl Lifecycle {
    fn state(&self) -> State {
        match self {
            Lifecycle::Uninitialized => State::Uninitialized,
            Lifecycle::Ready(_) => State::Ready,
            Lifecycle::Closed => State::Closed,
        }
    }

    fn engine(&mut self) -> Result<&mut dyn LandmarkEngine> {
        let state = self.state();
        match self {
            Lifecycle::Ready(engine) => Ok(&mut **engine),
            _ => Err(Error::NotReady(state)),
        }
    }
}

/// Drives a hand landmark engine.
pub struct HandLandmarker {
    factory: Box<dyn EngineFactory>,
    options: EngineOptions,
    listener: Option<Arc<dyn LandmarkerListener>>,
    lifecycle: Lifecycle,
    /// Thread that built a GPU-delegated engine. Only that thread may use it.
    owner: Option<ThreadId>,
    t_convert: Timer,
    t_infer: Timer,
    /// Delivers live-stream outcomes to the listener. Declared last so that it is joined after
    /// the engine is gone.
    delivery: Option<Worker<AsyncEvent>>,
}

impl HandLandmarker {
    /// Creates a landmarker and builds its engine.
    ///
    /// The listener receives initialization and inference errors in every mode. In
    /// [`RunningMode::LiveStream`] it also receives all results and is mandatory.
    ///
    /// # Errors
    ///
    /// - [`Error::ListenerRequired`] if live-stream mode is requested without a listener.
    /// - [`Error::InvalidConfig`] if the settings are out of range.
    /// - [`Error::EngineInit`] if the factory fails. The listener is notified as well, with
    ///   [`ErrorCode::Gpu`] if the delegate is unsupported.
    pub fn new<F: EngineFactory + 'static>(
        factory: F,
        options: EngineOptions,
        listener: Option<Arc<dyn LandmarkerListener>>,
    ) -> Result<Self> {
        let delivery = if options.running_mode == RunningMode::LiveStream {
            let listener = match &listener {
                Some(listener) => listener.clone(),
                None => {
                    log::error!("live-stream mode requires a result listener");
                    return Err(Error::ListenerRequired);
                }
            };
            Some(spawn_delivery(listener)?)
        } else {
            None
        };

        let mut this = Self {
            factory: Box::new(factory),
            options,
            listener,
            lifecycle: Lifecycle::Uninitialized,
            owner: None,
            t_convert: Timer::new("convert"),
            t_infer: Timer::new("infer"),
            delivery,
        };
        this.rebuild()?;
        Ok(this)
    }

    /// (Re)builds the engine from the current options, releasing the previous engine first.
    ///
    /// On failure, the landmarker is left without an engine ([`State::Uninitialized`]).
    pub fn rebuild(&mut self) -> Result<()> {
        self.release();
        self.options.settings.validate()?;

        match self.factory.create(&self.options) {
            Ok(engine) => {
                self.lifecycle = Lifecycle::Ready(engine);
                self.owner = match self.options.settings.selected_delegate() {
                    Delegate::Gpu => Some(thread::current().id()),
                    Delegate::Cpu => None,
                };
                log::debug!(
                    "built {:?} mode engine with {:?}",
                    self.options.running_mode,
                    self.options.settings,
                );
                Ok(())
            }
            Err(e) => {
                log::error!("hand landmarker failed to load model: {}", e.message);
                let err = Error::from(e);
                self.notify_error(FAILED_TO_INITIALIZE, err.code());
                Err(err)
            }
        }
    }

    /// Replaces the engine settings and rebuilds the engine with them.
    ///
    /// The running mode and listener stay the same.
    pub fn reconfigure(&mut self, settings: EngineSettings) -> Result<()> {
        self.options.settings = settings;
        self.rebuild()
    }

    /// Releases the engine. Calling this more than once has no further effect.
    ///
    /// Live-stream frames that are still in flight are reported to the listener as failed when the
    /// engine drops them. [`HandLandmarker::rebuild`] can be used to start over.
    pub fn close(&mut self) {
        if matches!(self.lifecycle, Lifecycle::Closed) {
            return;
        }
        self.release();
        self.lifecycle = Lifecycle::Closed;
        log::debug!("hand landmarker closed ({}, {})", self.t_convert, self.t_infer);
    }

    fn release(&mut self) {
        if let Lifecycle::Ready(mut engine) =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Uninitialized)
        {
            engine.close();
        }
        self.owner = None;
    }

    /// Returns `true` after [`HandLandmarker::close`] was called (and no rebuild happened since).
    pub fn is_closed(&self) -> bool {
        self.state() == State::Closed
    }

    pub fn state(&self) -> State {
        self.lifecycle.state()
    }

    pub fn running_mode(&self) -> RunningMode {
        self.options.running_mode
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.options.settings
    }

    /// Returns profiling timers for image conversion and inference.
    pub fn timers(&self) -> impl IntoIterator<Item = &Timer> + '_ {
        [&self.t_convert, &self.t_infer]
    }

    /// Runs detection on a single image.
    ///
    /// The returned bundle holds exactly one result. Its inference time covers pixel format
    /// conversion and inference.
    pub fn detect_image(&mut self, image: impl Into<DynamicImage>) -> Result<ResultBundle> {
        self.check_call("detect_image", RunningMode::Image)?;

        let start = uptime_millis();
        let input = self.t_convert.time(|| InputImage::from_dynamic(image.into()));
        let resolution = input.resolution();
        if resolution.is_empty() {
            return Err(Error::FrameUnavailable(format!(
                "cannot run detection on a {resolution} image"
            )));
        }

        let engine = self.lifecycle.engine()?;
        match self.t_infer.time(|| engine.detect(&input)) {
            Some(result) => {
                let latency = uptime_millis().saturating_sub(start);
                ResultBundle::new(vec![result], latency, resolution)
            }
            None => {
                self.notify_error(FAILED_TO_DETECT, ErrorCode::Other);
                Err(Error::InferenceFailure(FAILED_TO_DETECT.into()))
            }
        }
    }

    /// Runs detection on a video, sampling one frame every `interval_ms` milliseconds.
    ///
    /// Frames are sampled at `0, interval_ms, 2 * interval_ms, ...` up to and including the
    /// video's duration. The bundle holds one result per sampled frame, in timestamp order, and its
    /// inference time is the average over all sampled frames. Its resolution is that of the first
    /// frame.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `interval_ms` is 0.
    /// - [`Error::FrameUnavailable`] if the video's duration or first frame cannot be read, or if
    ///   the duration implies more than 2^24 sampled frames.
    /// - If any sampled frame fails, every failure is reported to the listener and the first one
    ///   is returned. No partial results are returned.
    pub fn detect_video_file(
        &mut self,
        video: &mut dyn VideoSource,
        interval_ms: u64,
    ) -> Result<ResultBundle> {
        self.check_call("detect_video_file", RunningMode::Video)?;
        if interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "video sampling interval must be positive".into(),
            ));
        }

        let start = uptime_millis();
        let (duration, first_frame) = match (video.duration_ms(), video.frame_at(0)) {
            (Some(duration), Some(first_frame)) => (duration, first_frame),
            _ => {
                log::warn!("video duration or first frame unavailable");
                return Err(Error::FrameUnavailable(
                    "video duration or first frame unavailable".into(),
                ));
            }
        };
        let resolution = Resolution::of(&first_frame);
        drop(first_frame);

        let num_frames = match (duration / interval_ms).checked_add(1) {
            Some(n) if n <= MAX_VIDEO_SAMPLES => n,
            _ => {
                log::warn!("video duration of {duration} ms is implausible");
                return Err(Error::FrameUnavailable(format!(
                    "video of {duration} ms yields too many samples at {interval_ms} ms"
                )));
            }
        };
        log::debug!("sampling {num_frames} frames from a {duration} ms video ({resolution})");

        let engine = self.lifecycle.engine()?;
        let mut results = Vec::new();
        let mut first_error = None;
        for i in 0..num_frames {
            let timestamp_ms = i * interval_ms;
            let outcome = match video.frame_at(timestamp_ms) {
                Some(frame) => {
                    let input = self.t_convert.time(|| InputImage::from_dynamic(frame));
                    match self
                        .t_infer
                        .time(|| engine.detect_for_video(&input, timestamp_ms))
                    {
                        Some(result) => Ok(result),
                        None => Err((
                            VIDEO_RESULT_MISSING,
                            Error::InferenceFailure(format!(
                                "no result for video frame at {timestamp_ms} ms"
                            )),
                        )),
                    }
                }
                None => Err((
                    VIDEO_FRAME_MISSING,
                    Error::FrameUnavailable(format!(
                        "video frame at {timestamp_ms} ms could not be retrieved"
                    )),
                )),
            };

            match outcome {
                Ok(result) => results.push(result),
                Err((message, err)) => {
                    log::warn!("{err}");
                    notify_error(self.listener.as_deref(), message, ErrorCode::Other);
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let latency = uptime_millis().saturating_sub(start) / num_frames;
        ResultBundle::new(results, latency, resolution)
    }

    /// Submits a camera frame for asynchronous detection.
    ///
    /// The frame is rotated upright and, if `mirrored` is set (eg. for front cameras), flipped
    /// horizontally. It is timestamped with [`uptime_millis`]. The result is delivered to the
    /// listener.
    pub fn detect_live_stream(&mut self, frame: CameraFrame, mirrored: bool) -> Result<()> {
        self.check_call("detect_live_stream", RunningMode::LiveStream)?;

        let frame_time = uptime_millis();
        let input = self.t_convert.time(|| frame.into_input(mirrored));
        self.detect_async(input, frame_time)
    }

    /// Submits an already converted image for asynchronous detection.
    ///
    /// `frame_time_ms` must be on the [`uptime_millis`] clock, since the latency reported to the
    /// listener is measured against it.
    pub fn detect_async(&mut self, image: InputImage, frame_time_ms: u64) -> Result<()> {
        self.check_call("detect_async", RunningMode::LiveStream)?;

        let sender = match &self.delivery {
            Some(delivery) => delivery.sender(),
            None => return Err(Error::ListenerRequired),
        };
        let completion = Completion::new(sender, frame_time_ms, image.resolution());
        let engine = self.lifecycle.engine()?;
        self.t_infer
            .time(|| engine.detect_async(image, frame_time_ms, completion));
        Ok(())
    }

    /// Checks running mode, lifecycle state and thread affinity before a detection call.
    fn check_call(&self, operation: &'static str, expected: RunningMode) -> Result<()> {
        let actual = self.options.running_mode;
        if actual != expected {
            return Err(Error::ModeMismatch {
                operation,
                expected,
                actual,
            });
        }
        let state = self.state();
        if state != State::Ready {
            log::warn!("`{operation}` called on a {state:?} hand landmarker");
            return Err(Error::NotReady(state));
        }
        if let Some(owner) = self.owner {
            if owner != thread::current().id() {
                return Err(Error::WrongThread);
            }
        }
        Ok(())
    }

    fn notify_error(&self, message: &str, code: ErrorCode) {
        notify_error(self.listener.as_deref(), message, code);
    }
}

impl Drop for HandLandmarker {
    fn drop(&mut self) {
        self.close();
    }
}

fn notify_error(listener: Option<&dyn LandmarkerListener>, message: &str, code: ErrorCode) {
    if let Some(listener) = listener {
        listener.on_error(message, code);
    }
}

fn spawn_delivery(listener: Arc<dyn LandmarkerListener>) -> Result<Worker<AsyncEvent>> {
    let mut fps = FpsCounter::new("live stream");
    let deliver = move |event: AsyncEvent| {
        match event {
            AsyncEvent::Result { result, input } => {
                let latency = uptime_millis().saturating_sub(result.timestamp_ms());
                match ResultBundle::new(vec![result], latency, input) {
                    Ok(bundle) => listener.on_results(bundle),
                    Err(e) => listener.on_error(&e.to_string(), e.code()),
                }
            }
            AsyncEvent::Error {
                timestamp_ms,
                message,
            } => {
                log::debug!("live-stream frame at {timestamp_ms} ms failed: {message:?}");
                let message = message.as_deref().unwrap_or(UNKNOWN_ERROR);
                listener.on_error(message, ErrorCode::Other);
            }
        }
        fps.tick();
    };

    Worker::spawn("hand landmarker delivery", DELIVERY_QUEUE_CAPACITY, deliver).map_err(|e| {
        Error::EngineInit {
            kind: InitErrorKind::Other,
            message: format!("failed to spawn result delivery thread: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{catch_unwind, AssertUnwindSafe},
        time::Duration,
    };

    use image::RgbaImage;

    use crate::{
        engine::{InitError, DROPPED_FRAME},
        frame::Rotation,
        test::{FakeFactory, FakeVideo, ListenerEvent, RecordingListener, Script},
    };

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn options(mode: RunningMode) -> EngineOptions {
        EngineOptions::new(EngineSettings::default(), mode)
    }

    fn landmarker(
        factory: FakeFactory,
        mode: RunningMode,
    ) -> (HandLandmarker, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let lm = HandLandmarker::new(factory, options(mode), Some(listener.clone())).unwrap();
        (lm, listener)
    }

    #[test]
    fn detect_image_returns_one_result() {
        let (mut lm, listener) = landmarker(FakeFactory::new(), RunningMode::Image);
        assert_eq!(lm.state(), State::Ready);

        let bundle = lm.detect_image(RgbaImage::new(64, 48)).unwrap();
        assert_eq!(bundle.results().len(), 1);
        assert_eq!(bundle.resolution(), Resolution::new(64, 48));
        assert_eq!(bundle.results()[0].hands().len(), 1);
        assert!(listener.events().is_empty());
        assert_eq!(lm.timers().into_iter().map(|t| t.count()).sum::<u32>(), 2);
    }

    #[test]
    fn detect_image_failure_notifies_listener() {
        let factory = FakeFactory::new().script(Script::failing_detect());
        let (mut lm, listener) = landmarker(factory, RunningMode::Image);

        let err = lm.detect_image(RgbaImage::new(8, 8)).unwrap_err();
        assert!(matches!(err, Error::InferenceFailure(_)), "{err}");
        assert_eq!(
            listener.events(),
            [ListenerEvent::Error(FAILED_TO_DETECT.into(), ErrorCode::Other)]
        );
    }

    #[test]
    fn empty_image_is_rejected() {
        let (mut lm, _) = landmarker(FakeFactory::new(), RunningMode::Image);
        let err = lm.detect_image(RgbaImage::new(0, 8)).unwrap_err();
        assert!(matches!(err, Error::FrameUnavailable(_)), "{err}");
    }

    #[test]
    fn mode_mismatch() {
        let (mut lm, _) = landmarker(FakeFactory::new(), RunningMode::Video);
        let err = lm.detect_image(RgbaImage::new(8, 8)).unwrap_err();
        assert!(
            matches!(
                err,
                Error::ModeMismatch {
                    operation: "detect_image",
                    expected: RunningMode::Image,
                    actual: RunningMode::Video,
                }
            ),
            "{err}"
        );

        let frame = CameraFrame::new(RgbaImage::new(8, 8), Rotation::None);
        assert!(matches!(
            lm.detect_live_stream(frame, false),
            Err(Error::ModeMismatch { .. })
        ));

        let (mut lm, _) = landmarker(FakeFactory::new(), RunningMode::Image);
        let mut video = FakeVideo::new(1000);
        assert!(matches!(
            lm.detect_video_file(&mut video, 100),
            Err(Error::ModeMismatch { .. })
        ));
    }

    #[test]
    fn video_samples_every_interval() {
        let factory = FakeFactory::new();
        let calls = factory.calls();
        let (mut lm, listener) = landmarker(factory, RunningMode::Video);

        let mut video = FakeVideo::new(1000);
        let bundle = lm.detect_video_file(&mut video, 100).unwrap();
        assert_eq!(bundle.results().len(), 11);
        let timestamps: Vec<_> = bundle.results().iter().map(|r| r.timestamp_ms()).collect();
        assert_eq!(timestamps, (0..=10).map(|i| i * 100).collect::<Vec<_>>());
        assert_eq!(bundle.resolution(), video.resolution());
        assert_eq!(calls.lock().unwrap().len(), 11);
        assert!(listener.events().is_empty());
    }

    #[test]
    fn video_interval_longer_than_video() {
        let (mut lm, _) = landmarker(FakeFactory::new(), RunningMode::Video);
        let bundle = lm.detect_video_file(&mut FakeVideo::new(250), 1000).unwrap();
        assert_eq!(bundle.results().len(), 1);
        assert_eq!(bundle.results()[0].timestamp_ms(), 0);
    }

    #[test]
    fn video_rejects_zero_interval() {
        let (mut lm, _) = landmarker(FakeFactory::new(), RunningMode::Video);
        assert!(matches!(
            lm.detect_video_file(&mut FakeVideo::new(1000), 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn video_without_metadata() {
        let (mut lm, listener) = landmarker(FakeFactory::new(), RunningMode::Video);
        let mut video = FakeVideo::new(1000).without_duration();
        assert!(matches!(
            lm.detect_video_file(&mut video, 100),
            Err(Error::FrameUnavailable(_))
        ));
        let mut video = FakeVideo::new(1000).missing_frame(0);
        assert!(matches!(
            lm.detect_video_file(&mut video, 100),
            Err(Error::FrameUnavailable(_))
        ));
        assert!(listener.events().is_empty());
    }

    #[test]
    fn video_failures_are_all_or_nothing() {
        let factory = FakeFactory::new().script(Script::failing_video_at([300]));
        let (mut lm, listener) = landmarker(factory, RunningMode::Video);

        let mut video = FakeVideo::new(1000).missing_frame(500).missing_frame(700);
        let err = lm.detect_video_file(&mut video, 100).unwrap_err();
        // The first failure (in timestamp order) is returned.
        assert!(matches!(err, Error::InferenceFailure(_)), "{err}");
        assert_eq!(
            listener.events(),
            [
                ListenerEvent::Error(VIDEO_RESULT_MISSING.into(), ErrorCode::Other),
                ListenerEvent::Error(VIDEO_FRAME_MISSING.into(), ErrorCode::Other),
                ListenerEvent::Error(VIDEO_FRAME_MISSING.into(), ErrorCode::Other),
            ]
        );
    }

    #[test]
    fn video_with_implausible_duration_fails() {
        let (mut lm, listener) = landmarker(FakeFactory::new(), RunningMode::Video);

        for mut video in [
            FakeVideo::new(u64::MAX / 4).missing_frame(1),
            FakeVideo::new(u64::MAX),
        ] {
            let res = catch_unwind(AssertUnwindSafe(|| lm.detect_video_file(&mut video, 1)));
            match res {
                Ok(Err(Error::FrameUnavailable(_))) => {}
                Ok(other) => panic!("unexpected result {other:?}"),
                Err(_) => panic!("detect_video_file panicked"),
            }
        }
        assert!(listener.events().is_empty());

        // Still usable afterwards.
        let bundle = lm.detect_video_file(&mut FakeVideo::new(200), 100).unwrap();
        assert_eq!(bundle.results().len(), 3);
    }

    #[test]
    fn video_latency_is_per_frame_average() {
        let factory = FakeFactory::new().script(Script::slow_video(Duration::from_millis(10)));
        let (mut lm, _) = landmarker(factory, RunningMode::Video);
        let bundle = lm.detect_video_file(&mut FakeVideo::new(1000), 100).unwrap();
        assert_eq!(bundle.results().len(), 11);
        let latency = bundle.inference_time_ms();
        assert!((10..60).contains(&latency), "{latency} ms");

        // Two samples: the total is divided by both of them.
        let factory = FakeFactory::new().script(Script::slow_video(Duration::from_millis(50)));
        let (mut lm, _) = landmarker(factory, RunningMode::Video);
        let bundle = lm.detect_video_file(&mut FakeVideo::new(100), 100).unwrap();
        assert_eq!(bundle.results().len(), 2);
        let latency = bundle.inference_time_ms();
        assert!((50..100).contains(&latency), "{latency} ms");
    }

    #[test]
    fn live_stream_requires_listener() {
        let res = HandLandmarker::new(
            FakeFactory::new(),
            options(RunningMode::LiveStream),
            None,
        );
        assert!(matches!(res, Err(Error::ListenerRequired)));
    }

    #[test]
    fn live_stream_delivers_every_frame() {
        let (mut lm, listener) = landmarker(FakeFactory::new(), RunningMode::LiveStream);

        for _ in 0..8 {
            let frame = CameraFrame::new(RgbaImage::new(32, 24), Rotation::Cw90);
            lm.detect_live_stream(frame, true).unwrap();
        }

        listener.wait_for(8, TIMEOUT);
        // Joins the delivery thread, so every callback has arrived.
        drop(lm);
        let events = listener.events();
        assert_eq!(events.len(), 8);
        let mut last_timestamp = 0;
        for event in events {
            let bundle = match event {
                ListenerEvent::Results(bundle) => bundle,
                other => panic!("unexpected event {other:?}"),
            };
            assert_eq!(bundle.results().len(), 1);
            // Rotated by 90 degrees before inference.
            assert_eq!(bundle.resolution(), Resolution::new(24, 32));
            let timestamp = bundle.results()[0].timestamp_ms();
            assert!(timestamp >= last_timestamp);
            assert!(bundle.inference_time_ms() <= uptime_millis() - timestamp);
            last_timestamp = timestamp;
        }
    }

    #[test]
    fn live_stream_dropped_frames_still_get_one_callback() {
        let factory = FakeFactory::new().script(Script::dropping_async_every(3));
        let (mut lm, listener) = landmarker(factory, RunningMode::LiveStream);

        for _ in 0..9 {
            lm.detect_async(InputImage::new(RgbaImage::new(4, 4)), uptime_millis())
                .unwrap();
        }
        drop(lm);

        let events = listener.events();
        assert_eq!(events.len(), 9);
        let dropped = events
            .iter()
            .filter(|e| **e == ListenerEvent::Error(DROPPED_FRAME.into(), ErrorCode::Other))
            .count();
        let results = events
            .iter()
            .filter(|e| matches!(e, ListenerEvent::Results(_)))
            .count();
        assert_eq!((dropped, results), (3, 6));
    }

    #[test]
    fn live_stream_failures_are_reported() {
        let factory = FakeFactory::new().script(Script::failing_async());
        let (mut lm, listener) = landmarker(factory, RunningMode::LiveStream);

        lm.detect_async(InputImage::new(RgbaImage::new(4, 4)), uptime_millis())
            .unwrap();
        assert_eq!(
            listener.wait_for(1, TIMEOUT),
            [ListenerEvent::Error(UNKNOWN_ERROR.into(), ErrorCode::Other)]
        );
    }

    #[test]
    fn close_is_idempotent() {
        let factory = FakeFactory::new();
        let closes = factory.closes();
        let (mut lm, _) = landmarker(factory, RunningMode::Image);

        lm.close();
        lm.close();
        assert!(lm.is_closed());
        assert_eq!(lm.state(), State::Closed);
        drop(lm);
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_landmarker_is_not_ready() {
        let (mut lm, _) = landmarker(FakeFactory::new(), RunningMode::Image);
        lm.close();
        let err = lm.detect_image(RgbaImage::new(8, 8)).unwrap_err();
        assert!(matches!(err, Error::NotReady(State::Closed)), "{err}");

        lm.rebuild().unwrap();
        assert_eq!(lm.state(), State::Ready);
        lm.detect_image(RgbaImage::new(8, 8)).unwrap();
    }

    #[test]
    fn init_failure_is_reported_with_code() {
        let listener = Arc::new(RecordingListener::default());
        let factory = FakeFactory::new().failing(InitError::delegate_unsupported("no GPU"));
        let res = HandLandmarker::new(
            factory,
            options(RunningMode::Image),
            Some(listener.clone()),
        );
        match res {
            Err(Error::EngineInit { kind, .. }) => {
                assert_eq!(kind, InitErrorKind::DelegateUnsupported)
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("expected initialization to fail"),
        }
        assert_eq!(
            listener.events(),
            [ListenerEvent::Error(FAILED_TO_INITIALIZE.into(), ErrorCode::Gpu)]
        );
    }

    #[test]
    fn reconfigure_releases_previous_engine() {
        let factory = FakeFactory::new();
        let (created, closes) = (factory.created(), factory.closes());
        let (mut lm, _) = landmarker(factory, RunningMode::Image);

        lm.reconfigure(EngineSettings::default().num_hands(2)).unwrap();
        assert_eq!(lm.settings().max_hands(), 2);
        assert_eq!(created.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);

        let err = lm
            .reconfigure(EngineSettings::default().min_tracking_confidence(2.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
        assert_eq!(lm.state(), State::Uninitialized);
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn gpu_engine_is_bound_to_its_thread() {
        let listener = Arc::new(RecordingListener::default());
        let settings = EngineSettings::default().delegate(Delegate::Gpu);
        let mut lm = HandLandmarker::new(
            FakeFactory::new(),
            EngineOptions::new(settings, RunningMode::Image),
            Some(listener),
        )
        .unwrap();
        lm.detect_image(RgbaImage::new(8, 8)).unwrap();

        let mut lm = thread::spawn(move || {
            let err = lm.detect_image(RgbaImage::new(8, 8)).unwrap_err();
            assert!(matches!(err, Error::WrongThread), "{err}");
            lm
        })
        .join()
        .unwrap();
        lm.detect_image(RgbaImage::new(8, 8)).unwrap();
    }
}
