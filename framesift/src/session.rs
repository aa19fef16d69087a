//! Runs an extraction on a worker thread.
//!
//! The caller starts a session with two callbacks. The worker reads the video from
//! start to end, keeps the first frame and every frame that either the sampling policy
//! forces or the change detector finds different enough from the frame before it, and
//! writes the kept frames to the output directory. It reports progress after every
//! frame and finishes with exactly one completion event. The caller can only ask the
//! worker to stop, which it checks once per frame.

use std::{
    io,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use color_eyre::eyre;
use framesift_common::utils::{
    fsutils,
    workers::{catch_panic, spawn_named, CaughtPanic},
};

use crate::{
    change_detector::ChangeDetector,
    config::{ConfigError, ExtractionConfig},
    frame_source::{frames_to_seconds, FrameRecord, FrameSource, VideoSource},
    frame_writer::FrameWriter,
    output_namer,
    sampling::SamplingPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    /// Index of the frame that was just processed.
    pub current_frame: u64,
    pub total_frames: u64,
    pub elapsed_seconds: f64,
    pub total_seconds: f64,
    pub saved_frames: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub success: bool,
    pub message: String,
}

impl CompletionEvent {
    pub const INTERRUPTED: &'static str = "interrupted";

    fn success(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }

    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// The counters of a run, owned by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionState {
    pub current_frame: u64,
    pub total_frames: u64,
    pub frames_read: u64,
    pub saved_frames: u64,
    pub write_errors: u64,
}

impl ExtractionState {
    fn summary(&self) -> String {
        let mut msg = format!(
            "{}/{} frames extracted",
            self.saved_frames, self.frames_read
        );
        if self.write_errors > 0 {
            msg.push_str(&format!(", {} failed to write", self.write_errors));
        }
        if self.frames_read < self.total_frames {
            msg.push_str(&format!(
                ", the video ended after {} of {} frames",
                self.frames_read, self.total_frames
            ));
        }
        msg
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("an extraction is already running")]
    AlreadyRunning,
    #[error("failed to create the output directory {}: {source}", path.display())]
    OutputDirectory { path: PathBuf, source: io::Error },
    #[error("failed to spawn the worker thread: {0}")]
    Spawn(io::Error),
}

/// The only parts of a run the caller thread and the worker both touch.
#[derive(Debug, Default)]
struct Flags {
    is_processing: AtomicBool,
    stop_requested: AtomicBool,
}

/// Asks a running extraction to stop. Can be sent to, and used from, any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<Flags>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.stop_requested.load(Ordering::SeqCst)
    }
}

pub struct ExtractionSession {
    flags: Arc<Flags>,
    writer: Arc<FrameWriter>,
    worker: Option<JoinHandle<()>>,
}

impl Default for ExtractionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionSession {
    pub fn new() -> Self {
        Self::with_writer(FrameWriter::default())
    }

    pub fn with_writer(writer: FrameWriter) -> Self {
        Self {
            flags: Arc::new(Flags::default()),
            writer: Arc::new(writer),
            worker: None,
        }
    }

    /// Extracts frames from the video at `video_path`. Returns as soon as the worker
    /// is running. Failing to open the video is reported through `on_completion`.
    pub fn start<P, C>(
        &mut self,
        video_path: impl Into<PathBuf>,
        config: ExtractionConfig,
        on_progress: P,
        on_completion: C,
    ) -> Result<(), SessionError>
    where
        P: FnMut(ProgressEvent) + Send + 'static,
        C: FnOnce(CompletionEvent) + Send + 'static,
    {
        let video_path = video_path.into();
        self.start_with(
            move || VideoSource::open(video_path),
            config,
            on_progress,
            on_completion,
        )
    }

    /// Like [`Self::start`], but the frames come from whatever `open` returns. `open`
    /// runs on the worker thread, so the source itself doesn't need to be `Send`.
    pub fn start_with<S, O, P, C>(
        &mut self,
        open: O,
        config: ExtractionConfig,
        on_progress: P,
        on_completion: C,
    ) -> Result<(), SessionError>
    where
        S: FrameSource,
        O: FnOnce() -> eyre::Result<S> + Send + 'static,
        P: FnMut(ProgressEvent) + Send + 'static,
        C: FnOnce(CompletionEvent) + Send + 'static,
    {
        if self
            .flags
            .is_processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::AlreadyRunning);
        }

        if let Err(e) = self.prepare(&config) {
            self.flags.is_processing.store(false, Ordering::SeqCst);
            return Err(e);
        }
        self.flags.stop_requested.store(false, Ordering::SeqCst);

        let flags = Arc::clone(&self.flags);
        let writer = Arc::clone(&self.writer);
        let work = move || {
            let mut on_progress = on_progress;
            let event = match catch_panic(|| run(open, &config, &writer, &flags, &mut on_progress))
            {
                Ok(outcome) => outcome.into_event(),
                Err(panic) => panicked(panic),
            };
            if event.success {
                log::info!("Done: {}", event.message);
            } else {
                log::warn!("Stopped: {}", event.message);
            }
            flags.is_processing.store(false, Ordering::SeqCst);
            on_completion(event);
        };

        match spawn_named("extractor", work) {
            Ok(handle) => {
                // a previous worker has already released the flag, let it finish on
                // its own
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.flags.is_processing.store(false, Ordering::SeqCst);
                Err(SessionError::Spawn(e))
            }
        }
    }

    fn prepare(&self, config: &ExtractionConfig) -> Result<(), SessionError> {
        config.validate()?;
        fsutils::ensure_dir(&config.output_directory).map_err(|source| {
            SessionError::OutputDirectory {
                path: config.output_directory.clone(),
                source,
            }
        })
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.flags))
    }

    /// Asks the worker to stop after the frame it is currently processing.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    pub fn is_running(&self) -> bool {
        self.flags.is_processing.load(Ordering::SeqCst)
    }

    /// Blocks until the latest worker, including its completion callback, has
    /// finished.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            if let Err(panic) = handle.join() {
                log::error!("The completion callback panicked: {}", CaughtPanic(panic));
            }
        }
    }
}

enum Outcome {
    OpenFailed(eyre::Report),
    Interrupted(ExtractionState),
    Finished(ExtractionState),
}

impl Outcome {
    fn into_event(self) -> CompletionEvent {
        match self {
            Outcome::OpenFailed(e) => CompletionEvent::failure(format!("{e:#}")),
            Outcome::Interrupted(state) => {
                log::debug!("Interrupted after {}", state.summary());
                CompletionEvent::failure(CompletionEvent::INTERRUPTED.to_owned())
            }
            Outcome::Finished(state) => CompletionEvent::success(state.summary()),
        }
    }
}

fn panicked(panic: CaughtPanic) -> CompletionEvent {
    CompletionEvent::failure(format!("worker panicked: {panic}"))
}

struct Worker<'a, P> {
    config: &'a ExtractionConfig,
    writer: &'a FrameWriter,
    on_progress: &'a mut P,
    fps: f64,
    total_seconds: f64,
    state: ExtractionState,
}

impl<P> Worker<'_, P>
where
    P: FnMut(ProgressEvent),
{
    fn save(&mut self, frame: &FrameRecord) {
        let path = self.config.output_directory.join(output_namer::name(
            frame.index,
            frame.timestamp_seconds,
            self.config.output_format,
        ));
        match self.writer.write(
            &frame.pixels,
            &path,
            self.config.resize_to,
            self.config.output_format,
        ) {
            Ok(()) => {
                log::debug!("Saved frame {} to {}", frame.index, path.display());
                self.state.saved_frames += 1;
            }
            Err(e) => {
                log::warn!("{e}");
                self.state.write_errors += 1;
            }
        }
    }

    fn processed(&mut self, frame: &FrameRecord) {
        self.state.frames_read += 1;
        self.state.current_frame = frame.index;
        (self.on_progress)(ProgressEvent {
            current_frame: self.state.current_frame,
            total_frames: self.state.total_frames,
            elapsed_seconds: frames_to_seconds(self.state.current_frame, self.fps),
            total_seconds: self.total_seconds,
            saved_frames: self.state.saved_frames,
        });
    }
}

/// Whether to keep `frame`, which is not the first one. The frames are only compared if
/// the policy doesn't force it.
fn retain(
    policy: &SamplingPolicy,
    detector: &ChangeDetector,
    prev: &FrameRecord,
    frame: &FrameRecord,
) -> bool {
    policy.forced(frame.index) || detector.has_changed(prev, frame)
}

fn run<S, O, P>(
    open: O,
    config: &ExtractionConfig,
    writer: &FrameWriter,
    flags: &Flags,
    on_progress: &mut P,
) -> Outcome
where
    S: FrameSource,
    O: FnOnce() -> eyre::Result<S>,
    P: FnMut(ProgressEvent),
{
    let mut source = match open() {
        Ok(source) => source,
        Err(e) => return Outcome::OpenFailed(e),
    };

    let metadata = source.metadata();
    log::debug!("Opened a video: {metadata:?}");

    let detector = ChangeDetector::new(config);
    let policy = SamplingPolicy::from_config(config, metadata.fps);
    let mut worker = Worker {
        config,
        writer,
        on_progress,
        fps: metadata.fps,
        total_seconds: metadata.duration_seconds,
        state: ExtractionState {
            total_frames: metadata.total_frames,
            ..ExtractionState::default()
        },
    };

    let Some(mut prev) = source.next_frame() else {
        return Outcome::Finished(worker.state);
    };
    worker.save(&prev);
    worker.processed(&prev);

    loop {
        if flags.stop_requested.load(Ordering::SeqCst) {
            return Outcome::Interrupted(worker.state);
        }

        let Some(frame) = source.next_frame() else {
            break;
        };

        if retain(&policy, &detector, &prev, &frame) {
            worker.save(&frame);
        }
        worker.processed(&frame);

        prev = frame;
    }

    Outcome::Finished(worker.state)
}
