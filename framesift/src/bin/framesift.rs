use std::{
    path::PathBuf,
    sync::mpsc::{self, RecvTimeoutError},
    time::Duration,
};

use clap::Parser;
use color_eyre::eyre::{self, Context};
use framesift::{
    config::{ExtractionConfig, OutputFormat, ResizeSpec},
    session::{CompletionEvent, ExtractionSession, ProgressEvent},
};
use framesift_common::{
    bin_common::{
        init::{init_eyre, init_logger},
        termination,
    },
    utils::time::{seconds_to_clock, Every},
};

#[derive(Parser, Debug)]
#[command()]
/// Extracts the frames of a video where something visibly changes, e.g., every new step
/// of a screen recording.
struct Cli {
    /// How dissimilar (1 - SSIM) a frame must be from the previous one to be kept
    #[arg(long, default_value_t = ExtractionConfig::DEFAULT_DIFF_THRESHOLD)]
    diff_threshold: f64,

    /// How many pixels a changed region must cover for the frame to be kept
    #[arg(long, default_value_t = ExtractionConfig::DEFAULT_MIN_AREA_THRESHOLD)]
    min_area: f64,

    /// Size of the blur applied before comparing frames, must be odd
    #[arg(long, default_value_t = ExtractionConfig::DEFAULT_BLUR_KERNEL_SIZE)]
    blur_kernel: u32,

    /// Keep a frame this often no matter what, if `--force-sampling`
    #[arg(long, default_value = "1s")]
    sample_interval: humantime::Duration,

    /// Keep a frame every `--sample-interval`
    #[arg(long)]
    force_sampling: bool,

    /// Stretch the saved frames to this size, e.g., 1280x720
    #[arg(long)]
    resize: Option<ResizeSpec>,

    /// The image format of the saved frames
    #[arg(long, default_value_t = OutputFormat::Jpg)]
    format: OutputFormat,

    /// Where to place the frames
    #[arg(long)]
    outdir: PathBuf,

    /// A file to additionally write the logs to
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Log the progress this often
    #[arg(long, default_value = "2s")]
    progress_every: humantime::Duration,

    /// Also log what happens to every frame
    #[arg(long, short = 'v')]
    verbose: bool,

    /// The video file to extract from
    videofile: PathBuf,
}

impl Cli {
    fn config(&self) -> ExtractionConfig {
        ExtractionConfig {
            diff_threshold: self.diff_threshold,
            min_area_threshold: self.min_area,
            blur_kernel_size: self.blur_kernel,
            sample_interval_seconds: Duration::from(self.sample_interval).as_secs_f64(),
            force_sampling: self.force_sampling,
            resize_to: self.resize,
            output_format: self.format,
            output_directory: self.outdir.clone(),
        }
    }
}

enum Event {
    Progress(ProgressEvent),
    Completion(CompletionEvent),
}

fn main() -> eyre::Result<()> {
    init_eyre()?;
    let cli = Cli::parse();
    init_logger(cli.logfile.as_deref(), cli.verbose)?;

    log::debug!("CLI arguments: {cli:#?}");

    let term_cookie =
        termination::Cookie::new().wrap_err("failed to create term cookie")?;

    let (tx, rx) = mpsc::channel();
    let progress_tx = tx.clone();

    log::info!("Extracting frames from: {}", cli.videofile.display());
    let mut session = ExtractionSession::new();
    session
        .start(
            &cli.videofile,
            cli.config(),
            move |progress| {
                let _ = progress_tx.send(Event::Progress(progress));
            },
            move |completion| {
                let _ = tx.send(Event::Completion(completion));
            },
        )
        .wrap_err("failed to start the extraction")?;

    let mut progress_log = Every::new(cli.progress_every.into());
    let mut signals_seen = 0;
    let completion = loop {
        let signals = term_cookie.signals_received();
        if signals > signals_seen {
            if signals_seen == 0 {
                log::warn!("Received a termination signal, stopping after the current frame");
                session.cancel();
            } else {
                log::warn!("Still stopping, one more signal kills the process");
            }
            signals_seen = signals;
        }

        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Event::Progress(progress)) => progress_log.perform(|| log_progress(&progress)),
            Ok(Event::Completion(completion)) => break completion,
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => {
                eyre::bail!("the extraction ended without reporting a result")
            }
        }
    };
    session.wait();

    eyre::ensure!(completion.success, "extraction failed: {}", completion.message);
    log::info!("{} into {}", completion.message, cli.outdir.display());

    Ok(())
}

fn log_progress(progress: &ProgressEvent) {
    log::info!(
        "At {}/{} ({} of {}), saved {} frames",
        progress.current_frame + 1,
        progress.total_frames,
        seconds_to_clock(progress.elapsed_seconds),
        seconds_to_clock(progress.total_seconds),
        progress.saved_frames
    );
}
