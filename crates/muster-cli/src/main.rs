use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use muster_core::{
    enroll_samples, Decision, RecognitionLoop, TrainedModel, Trainer,
};
use muster_hw::{Camera, SeetaDetector};
use muster_store::{ledger, AttendanceLedger, Identity, MarkOutcome, SampleStore};

mod config;
mod signal;

use config::Config;

#[derive(Parser)]
#[command(name = "muster", about = "Face-recognition attendance", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect face samples for a named identity from the camera
    Enroll {
        /// Identity to enroll
        name: String,
        /// Samples to collect this session (default from config)
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Train the classifier from all stored samples
    Train,
    /// Run live recognition and mark attendance
    Recognize {
        /// Accept threshold override (distance scale, lower = stricter)
        #[arg(short, long)]
        threshold: Option<f32>,
    },
    /// Show the attendance ledger
    Attendance {
        /// Only show records for this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List enrolled identities and their sample counts
    Identities,
    /// Delete an identity's sample set
    Remove {
        /// Identity to remove
        name: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Enroll { name, count } => cmd_enroll(&config, &name, count),
        Commands::Train => cmd_train(&config),
        Commands::Recognize { threshold } => cmd_recognize(&config, threshold),
        Commands::Attendance { date } => cmd_attendance(&config, date),
        Commands::Identities => cmd_identities(&config),
        Commands::Remove { name } => cmd_remove(&config, &name),
    }
}

fn cmd_enroll(config: &Config, name: &str, count: Option<usize>) -> Result<()> {
    let identity = Identity::new(name)?;
    let store = SampleStore::open(&config.samples_dir)?;
    let mut detector = SeetaDetector::load(&config.detector_model_path)?;
    let camera = Camera::open(&config.camera_device).context("failed to open camera")?;
    let mut stream = camera.stream()?;
    let cancel = signal::cancel_on_sigint();

    let target = count.unwrap_or(config.enrollment_target);
    println!("Collecting {target} samples for {identity} — press Ctrl-C to stop");

    let outcome = enroll_samples(
        &store,
        &identity,
        target,
        &mut stream,
        &mut detector,
        &config.detector_params(),
        &cancel,
        |collected, target| {
            if collected % 10 == 0 || collected == target {
                println!("  {collected}/{target}");
            }
        },
    )?;

    if outcome.cancelled {
        println!("Cancelled after {} samples.", outcome.collected);
    } else {
        println!("Stored {} samples for {identity}.", outcome.collected);
    }
    println!("Run `muster train` to rebuild the model.");
    Ok(())
}

fn cmd_train(config: &Config) -> Result<()> {
    let store = SampleStore::open(&config.samples_dir)?;
    let model = Trainer::new(&store).train_and_save(&config.model_path)?;

    println!("Trained {} identities:", model.label_map().len());
    for (label, identity) in model.label_map().iter() {
        let count = store.sample_count(identity)?;
        println!("  [{label}] {identity} ({count} samples)");
    }
    println!("Model written to {}", config.model_path.display());
    Ok(())
}

fn cmd_recognize(config: &Config, threshold: Option<f32>) -> Result<()> {
    let model = TrainedModel::load(&config.model_path)?;
    let mut ledger = AttendanceLedger::open(&config.ledger_path)?;
    let mut detector = SeetaDetector::load(&config.detector_model_path)?;
    let camera = Camera::open(&config.camera_device).context("failed to open camera")?;
    let mut stream = camera.stream()?;
    let cancel = signal::cancel_on_sigint();

    let threshold = threshold.unwrap_or(config.recognition_threshold);
    println!(
        "Recognizing {} identities (threshold {threshold}) — press Ctrl-C to stop",
        model.label_map().len()
    );

    let mut recognition = RecognitionLoop::new(
        &model,
        &mut detector,
        &mut ledger,
        threshold,
        config.detector_params(),
    );
    let summary = recognition.run(&mut stream, &cancel, |report| {
        for sighting in &report.sightings {
            match &sighting.decision {
                Decision::Known { identity, confidence } => {
                    let status = match sighting.outcome {
                        Some(MarkOutcome::Marked) => "marked present",
                        Some(MarkOutcome::AlreadyMarkedToday) => "already marked today",
                        None => "not marked",
                    };
                    println!("  {identity} (distance {confidence:.1}) — {status}");
                }
                Decision::Unknown { confidence } => {
                    println!("  unknown face (distance {confidence:.1})");
                }
            }
        }
    })?;

    println!(
        "{} frames seen; {} marked, {} already marked, {} unknown.",
        summary.frames, summary.marked, summary.already_marked, summary.unknown
    );
    Ok(())
}

fn cmd_attendance(config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let mut records = ledger::read_records(&config.ledger_path)?;
    if let Some(date) = date {
        records.retain(|r| r.date == date);
    }

    if records.is_empty() {
        println!("No attendance records.");
        return Ok(());
    }

    println!("{:<24} {:<12} {:<10}", "Name", "Date", "Time");
    for record in &records {
        println!(
            "{:<24} {:<12} {:<10}",
            record.identity,
            record.date.format("%Y-%m-%d"),
            record.time.format("%H:%M:%S")
        );
    }
    Ok(())
}

fn cmd_identities(config: &Config) -> Result<()> {
    let store = SampleStore::open(&config.samples_dir)?;
    let identities = store.list_identities()?;

    if identities.is_empty() {
        println!("No identities enrolled.");
        return Ok(());
    }

    for identity in identities {
        let count = store.sample_count(&identity)?;
        println!("{identity} ({count} samples)");
    }
    Ok(())
}

fn cmd_remove(config: &Config, name: &str) -> Result<()> {
    let identity = Identity::new(name)?;
    let store = SampleStore::open(&config.samples_dir)?;

    if store.remove_identity(&identity)? {
        println!("Removed sample set for {identity}.");
        println!("Run `muster train` to rebuild the model without them.");
    } else {
        println!("No samples stored for {identity}.");
    }
    Ok(())
}
