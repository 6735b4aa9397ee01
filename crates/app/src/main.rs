use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use practice_core::duration::{planned_duration, playback_duration};
use practice_core::model::{QualityRating, SessionTemplate, Step};
use practice_core::sequence::{expand_sequence, sequence_for};
use practice_core::settings::PlayerSettingsDraft;
use practice_core::shuffle::ThreadRandom;
use services::metronome::MonotonicClock;
use services::{
    AppServices, Clock, FinalizeRequest, FinalizeWarning, MetronomeStatus, SessionPhase,
    TickOutcome,
};
use storage::{MediaFile, UploadContext};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    MissingTemplate,
    InvalidNumber { flag: &'static str, raw: String },
    InvalidRating { raw: String },
    InvalidEnv { name: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::MissingTemplate => write!(f, "--template is required"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidRating { raw } => write!(f, "--rating must be 1..4, got {raw}"),
            ArgsError::InvalidEnv { name, raw } => write!(f, "invalid {name} value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn env_value<T: FromStr>(name: &'static str) -> Result<Option<T>, ArgsError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ArgsError::InvalidEnv { name, raw }),
        Err(_) => Ok(None),
    }
}

fn settings_from_env() -> Result<PlayerSettingsDraft, ArgsError> {
    Ok(PlayerSettingsDraft {
        bpm: env_value("STUDIA_BPM")?,
        volume: env_value("STUDIA_VOLUME")?,
        max_session_secs: env_value("STUDIA_MAX_SESSION_SECS")?,
        finalize_grace_ms: env_value("STUDIA_GRACE_MS")?,
        ..PlayerSettingsDraft::default()
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- plan      --template <file.json>");
    eprintln!("  cargo run -p app -- run       --template <file.json> [--seconds <n>] [--try]");
    eprintln!("                                [--rating <1-4>] [--notes <text>]");
    eprintln!("                                [--user <id>] [--video <file>]");
    eprintln!("  cargo run -p app -- metronome [--bpm <30-300>] [--seconds <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --rating 3, --seconds: each block's target (run) or 5 (metronome)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDIA_TEMPLATE, STUDIA_BPM, STUDIA_VOLUME, STUDIA_MAX_SESSION_SECS, STUDIA_GRACE_MS");
    eprintln!("  RUST_LOG (e.g. RUST_LOG=info)");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Plan,
    Run,
    Metronome,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "plan" => Some(Self::Plan),
            "run" => Some(Self::Run),
            "metronome" => Some(Self::Metronome),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    template: Option<PathBuf>,
    rating: QualityRating,
    notes: String,
    try_mode: bool,
    seconds: Option<u64>,
    user: Option<String>,
    video: Option<PathBuf>,
    settings: PlayerSettingsDraft,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        settings: PlayerSettingsDraft,
        template: Option<PathBuf>,
    ) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            template,
            rating: QualityRating::default(),
            notes: String::new(),
            try_mode: false,
            seconds: None,
            user: None,
            video: None,
            settings,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--template" => parsed.template = Some(require_value(args, "--template")?.into()),
                "--rating" => {
                    let value = require_value(args, "--rating")?;
                    parsed.rating = value
                        .trim()
                        .parse::<u8>()
                        .ok()
                        .and_then(|v| QualityRating::from_u8(v).ok())
                        .ok_or(ArgsError::InvalidRating { raw: value })?;
                }
                "--notes" => parsed.notes = require_value(args, "--notes")?,
                "--try" => parsed.try_mode = true,
                "--seconds" => {
                    parsed.seconds = Some(parse_number(require_value(args, "--seconds")?, "--seconds")?);
                }
                "--bpm" => {
                    parsed.settings.bpm = Some(parse_number(require_value(args, "--bpm")?, "--bpm")?);
                }
                "--user" => parsed.user = Some(require_value(args, "--user")?),
                "--video" => parsed.video = Some(require_value(args, "--video")?.into()),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn template_path(&self) -> Result<&Path, ArgsError> {
        self.template.as_deref().ok_or(ArgsError::MissingTemplate)
    }
}

fn load_template(path: &Path) -> Result<SessionTemplate, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn load_video(path: &Path) -> Result<MediaFile, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("webm") => "video/webm",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    };
    let name = path
        .file_name()
        .map_or_else(|| "video".to_owned(), |n| n.to_string_lossy().into_owned());
    Ok(MediaFile::new(name, content_type, bytes))
}

fn describe_step(template: &SessionTemplate, step: &Step) -> String {
    match step {
        Step::Block(code) => match template.block(code) {
            Some(block) => format!(
                "block {code} ({}, {}s)",
                block.kind.as_code(),
                block.duration_secs
            ),
            None => format!("block {code} (missing)"),
        },
        Step::Round(id) => match template.round(id) {
            Some(round) => {
                let codes: Vec<&str> = round.block_codes.iter().map(|c| c.as_str()).collect();
                format!(
                    "round {id} x{} [{}]{}",
                    round.effective_repetitions(),
                    codes.join(", "),
                    if round.shuffle { " (shuffled)" } else { "" }
                )
            }
            None => format!("round {id} (missing)"),
        },
    }
}

fn plan(template: &SessionTemplate) {
    let steps = sequence_for(template);
    let units = expand_sequence(template, &mut ThreadRandom);

    println!("template: {}", template.name());
    println!("sequence:");
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {}", i + 1, describe_step(template, step));
    }
    println!("units: {}", units.len());
    println!(
        "planned: {}s authored, {}s as played",
        planned_duration(template),
        playback_duration(&units)
    );
}

async fn run_session(
    services: &AppServices,
    template: SessionTemplate,
    args: Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let name = template.name().to_owned();
    let mut controller = if args.try_mode {
        services.try_controller(template)
    } else {
        services.controller(template)
    };
    controller.start()?;

    // Try sessions leave no trace in the store.
    let mut recorder = (!args.try_mode).then(|| services.recorder(args.user.clone()));
    if let Some(recorder) = recorder.as_mut() {
        recorder.begin(&controller).await;
    }

    let total = controller.state().units().len();
    for index in 0..total {
        controller.navigate_to(index)?;
        let block = controller.state().units()[index].block.clone();
        let secs = args.seconds.unwrap_or(u64::from(block.duration_secs));
        if !block.kind.is_announcement() && controller.tick(secs) == TickOutcome::TimeLimitReached
        {
            println!("time limit reached at unit {}", index + 1);
            break;
        }
        controller.mark_completed(index)?;
        if let Some(recorder) = recorder.as_mut() {
            recorder.record_mark(&controller, index).await;
        }
        println!(
            "[{}/{total}] {} {} {:?}",
            index + 1,
            block.kind.as_code(),
            block.code,
            controller.unit_timing(index)
        );
    }

    let Some(mut recorder) = recorder else {
        if controller.phase() == SessionPhase::InProgress {
            let choices = controller.request_exit()?;
            println!("exit choices: {choices:?}");
            controller.discard_and_exit()?;
        }
        println!("try session discarded");
        return Ok(());
    };

    let finished = controller.finish()?;
    let video = args.video.as_deref().map(load_video).transpose()?;
    let context = args
        .user
        .map(UploadContext::for_user)
        .unwrap_or_default()
        .with_session(name);
    let request = FinalizeRequest {
        rating: args.rating,
        notes: args.notes,
        media_links: Vec::new(),
        video,
        context,
    };

    let report = services
        .finalizer()
        .finalize_and_exit(&finished, request, &mut recorder)
        .await?;
    for warning in &report.warnings {
        match warning {
            FinalizeWarning::UploadFailed { reason } => eprintln!("video not saved: {reason}"),
        }
    }
    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}

async fn run_metronome(services: &AppServices, seconds: u64) {
    let clock = Arc::new(MonotonicClock::new());
    let mut metronome = services.metronome(clock.clone());
    if metronome.start() == MetronomeStatus::Unavailable {
        warn!("audio output unavailable, metronome is silent");
    }
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    metronome.shutdown();
    println!(
        "{} clicks at {} bpm over {seconds}s",
        clock.tones().len(),
        metronome.bpm()
    );
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let parsed = settings_from_env()
        .and_then(|settings| {
            let template = std::env::var("STUDIA_TEMPLATE").ok().map(PathBuf::from);
            Args::parse(&mut iter, settings, template)
        })
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;

    let settings = parsed.settings.clone().validate()?;
    let services = AppServices::in_memory(settings, Clock::system());
    info!(?cmd, "starting");

    match cmd {
        Command::Plan => {
            let template = load_template(parsed.template_path()?)?;
            plan(&template);
            Ok(())
        }
        Command::Run => {
            let template = load_template(parsed.template_path()?)?;
            run_session(&services, template, parsed).await
        }
        Command::Metronome => {
            run_metronome(&services, parsed.seconds.unwrap_or(5)).await;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
