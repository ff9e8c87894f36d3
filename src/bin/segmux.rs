use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use segmux::{
    ExportOptions, FfmpegLogLevel, MediaProbe, OverlapPolicy, ProgressCallback, ProgressInfo,
    ProgressMode, Segment, SegmentExporter,
};

const CLI_AFTER_HELP: &str = "Examples:\n  segmux export input.mp4 output.mp4 --segment 0:10-0:20 --segment 1:40-2:10 --progress\n  segmux export input.mkv output.mkv --segments cuts.json --cpu-limit 50\n  segmux probe input.mp4 --json\n  segmux completions zsh > _segmux";

#[derive(Debug, Parser)]
#[command(
    name = "segmux",
    version,
    about = "Export time ranges of a media file into one container without re-encoding",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<FfmpegLogLevel>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Concatenate segments of the input into one output file.
    #[command(
        about = "Export segments losslessly",
        after_help = "Segments are START-END pairs in seconds or [HH:]MM:SS[.fff].\nA segment file is a JSON array of {\"start\": 10.0, \"end\": 20.0} objects.\n\nExamples:\n  segmux export input.mp4 out.mp4 --segment 10-20 --segment 100-130\n  segmux export input.mp4 out.mp4 --segments cuts.json --per-segment-progress --progress"
    )]
    Export {
        /// Input media path.
        input: PathBuf,
        /// Output media path; the container follows the extension.
        output: PathBuf,
        /// A segment to keep, as START-END. Repeatable.
        #[arg(long, value_name = "START-END")]
        segment: Vec<String>,
        /// JSON file with the segment list.
        #[arg(long = "segments", value_name = "FILE")]
        segments_file: Option<PathBuf>,
        /// CPU cap in percent of all cores (1-100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        cpu_limit: Option<u8>,
        /// Disable CPU throttling.
        #[arg(long, conflicts_with = "cpu_limit")]
        no_throttle: bool,
        /// Export overlapping segments instead of rejecting them.
        #[arg(long)]
        allow_overlap: bool,
        /// Restart the percentage at every segment.
        #[arg(long)]
        per_segment_progress: bool,
    },

    /// Print information about a media file.
    #[command(
        about = "Print media information",
        visible_alias = "info",
        after_help = "Examples:\n  segmux probe input.mp4\n  segmux probe input.mp4 --json"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,

        /// Output machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(Duration::try_from_secs_f64(seconds)?);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!("invalid time format: {trimmed}").into());
    }

    let (hours, minutes, seconds_str) = if parts.len() == 3 {
        (parts[0].parse::<u64>()?, parts[1].parse::<u64>()?, parts[2])
    } else {
        (0_u64, parts[0].parse::<u64>()?, parts[1])
    };

    let seconds = seconds_str.parse::<f64>()?;
    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    Ok(Duration::try_from_secs_f64(total_seconds)?)
}

fn parse_segment(value: &str) -> Result<Segment, Box<dyn std::error::Error>> {
    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| format!("segment must be START-END: {value}"))?;
    Ok(Segment::new(parse_timecode(start)?, parse_timecode(end)?))
}

fn collect_segments(
    segment: &[String],
    segments_file: Option<&Path>,
) -> Result<Vec<Segment>, Box<dyn std::error::Error>> {
    let mut segments = Vec::new();
    if let Some(path) = segments_file {
        let json = fs::read_to_string(path)?;
        segments.extend(segmux::segments_from_json(&json)?);
    }
    for value in segment {
        segments.push(parse_segment(value)?);
    }
    if segments.is_empty() {
        return Err("no segments given (use --segment or --segments)".into());
    }
    Ok(segments)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(global: &GlobalOptions) {
    let default_level = if global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn apply_global_options(global: &GlobalOptions) {
    init_logging(global);
    segmux::set_ffmpeg_log_level(global.log_level.unwrap_or(FfmpegLogLevel::Error));
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {bar:40.cyan/blue} {pos:>3}% {msg} [{elapsed_precise}]",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_message(format!(
            "segment {}/{}",
            info.segment_index + 1,
            info.segment_count
        ));
        self.bar.set_position(u64::from(info.percent));
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global);

    match cli.command {
        Commands::Export {
            input,
            output,
            segment,
            segments_file,
            cpu_limit,
            no_throttle,
            allow_overlap,
            per_segment_progress,
        } => {
            let segments = collect_segments(&segment, segments_file.as_deref())?;
            ensure_writable_path(&output, cli.global.overwrite)?;

            let mut options = ExportOptions::new();
            if no_throttle {
                options = options.without_throttle();
            } else if let Some(limit) = cpu_limit {
                options = options.with_cpu_limit(limit);
            }
            if allow_overlap {
                options = options.with_overlap_policy(OverlapPolicy::Permit);
            }
            if per_segment_progress {
                options = options.with_progress_mode(ProgressMode::PerSegment);
            }

            let bar = if cli.global.progress {
                let progress = Arc::new(BarProgress::new()?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            let result = SegmentExporter::new(&input, &output)?
                .segments(segments)
                .with_options(options)
                .run();

            if let Some(progress) = &bar {
                progress.bar.finish_and_clear();
            }
            let report = result?;

            println!(
                "{} {} ({} segment(s), {:.2}s)",
                "exported".green().bold(),
                output.display(),
                report.segments,
                report.output_duration.as_secs_f64(),
            );
            if cli.global.verbose {
                println!(
                    "packets written={} discarded={} elapsed={:.2}s",
                    report.packets_written,
                    report.packets_discarded,
                    report.elapsed.as_secs_f64(),
                );
            }
        }
        Commands::Probe { input, json } => {
            let info = MediaProbe::probe(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{} {}", "file".cyan().bold(), info.name);
                println!("Format: {}", info.format);
                match info.duration {
                    Some(duration) => println!("Duration: {:.3}s", duration.as_secs_f64()),
                    None => println!("Duration: unknown"),
                }
                println!(
                    "Video: {} {} @ {}",
                    info.video_codec.as_deref().unwrap_or("none"),
                    info.resolution.as_deref().unwrap_or("?"),
                    info.frame_rate
                        .map(|rate| format!("{rate:.3} fps"))
                        .unwrap_or_else(|| "? fps".to_string()),
                );
                if let Some(codec) = &info.audio_codec {
                    println!(
                        "Audio: {codec} {} Hz, {} channel(s)",
                        info.audio_sample_rate.unwrap_or(0),
                        info.audio_channels.unwrap_or(0),
                    );
                }
                if let Some(size) = info.file_size {
                    println!("Size: {size} bytes");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "segmux", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
