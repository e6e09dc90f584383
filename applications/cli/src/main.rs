//! Cadence - headless player driven from stdin

mod commands;
mod config;

use anyhow::{Context, Result};
use cadence_core::{ItemBuilder, ItemResolver, Locator, MediaLibrary, SharedItem};
use cadence_playback::{
    BackendRegistry, PlaybackEvent, PlayerCommand, PlayerHandle, PlayerService, QueueEngine,
    SnapshotEntry,
};
use clap::Parser;
use crate::commands::Command;
use crate::config::CliConfig;
use crossbeam_channel::Receiver;
use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Cadence headless player", long_about = None)]
struct Cli {
    /// Songs to queue (file paths or URLs)
    locators: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tracing filter, overrides RUST_LOG and the config file
    #[arg(long)]
    log_filter: Option<String>,

    /// Start playing right away
    #[arg(long)]
    autoplay: bool,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    init_tracing(cli.log_filter.as_deref(), &config.log_filter);

    let base = std::env::current_dir().context("failed to read working directory")?;
    let library = Arc::new(MediaLibrary::new());

    let mut engine = QueueEngine::new(BackendRegistry::headless(), config.playback.clone())?;
    for input in &cli.locators {
        let item = build_item(input, &base)?;
        library.add_item(item.clone());
        engine.enqueue_item(item);
    }
    tracing::info!(
        songs = engine.queue().size(),
        max_live = config.playback.max_live_decoders,
        "Starting player"
    );

    let resolver: Arc<dyn ItemResolver> = library.clone();
    let handle = PlayerService::spawn(engine, Some(resolver))?;
    let printer = spawn_printer(handle.events().clone(), cli.json)?;

    if cli.autoplay {
        handle.play()?;
    }

    let result = run_repl(&handle, &library, &base);

    handle.shutdown();
    if printer.join().is_err() {
        tracing::error!("event printer panicked");
    }
    tracing::info!("Player stopped");

    result
}

fn init_tracing(explicit: Option<&str>, configured: &str) {
    let filter = match explicit {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn build_item(input: &str, base: &Path) -> Result<SharedItem> {
    let locator = Locator::from_user_input(input, base)
        .with_context(|| format!("cannot queue '{input}'"))?;
    Ok(ItemBuilder::new(locator).build_shared())
}

fn spawn_printer(events: Receiver<PlaybackEvent>, json: bool) -> Result<thread::JoinHandle<()>> {
    let printer = thread::Builder::new()
        .name("cadence-events".to_string())
        .spawn(move || {
            for event in &events {
                if json {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!("Failed to encode event: {}", e),
                    }
                } else if let Some(line) = describe(&event) {
                    println!("{line}");
                }
            }
        })?;
    Ok(printer)
}

/// Human readable event line; chatty events are left to `--json`
fn describe(event: &PlaybackEvent) -> Option<String> {
    let line = match event {
        PlaybackEvent::StateChanged { state } => format!("state: {state:?}"),
        PlaybackEvent::NowPlayingChanged {
            now_playing: Some(now),
        } => format!("now playing: {} - {}", now.artist, now.title),
        PlaybackEvent::NowPlayingChanged { now_playing: None } => "now playing: -".to_string(),
        PlaybackEvent::ItemFailed { item, message } => format!("failed: {item}: {message}"),
        PlaybackEvent::VolumeChanged { volume } => format!("volume: {volume:.2}"),
        PlaybackEvent::QueueChanged { size } => format!("queue: {size} songs"),
        PlaybackEvent::QueueExhausted => "end of queue".to_string(),
        PlaybackEvent::Error { message } => format!("error: {message}"),
        PlaybackEvent::PositionChanged { .. }
        | PlaybackEvent::Progress { .. }
        | PlaybackEvent::MetadataRefined { .. } => return None,
    };
    Some(line)
}

fn run_repl(handle: &PlayerHandle, library: &MediaLibrary, base: &Path) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(message) => {
                if !message.is_empty() {
                    writeln!(stdout, "{message}")?;
                }
                continue;
            }
        };

        match command {
            Command::Play => handle.play()?,
            Command::Pause => handle.pause()?,
            Command::Stop => handle.stop(false)?,
            Command::Next => handle.next()?,
            Command::Previous => handle.previous()?,
            Command::Jump(index) => handle.jump_to(index)?,
            Command::Seek(position) => handle.seek(position)?,
            Command::Volume(volume) => handle.set_volume(volume)?,
            Command::Loop(mode) => handle.send(PlayerCommand::SetLoopMode(mode))?,
            Command::Shuffle(shuffle) => handle.send(PlayerCommand::SetShuffle(shuffle))?,
            Command::Add(input) => match build_item(&input, base) {
                Ok(item) => {
                    let id = item.id().clone();
                    library.add_item(item);
                    handle.enqueue_by_id(id)?;
                }
                Err(e) => writeln!(stdout, "{e:#}")?,
            },
            Command::Clear => handle.clear_queue()?,
            Command::Queue => print_queue(handle, &mut stdout)?,
            Command::Status => match handle.current() {
                Some(now) => writeln!(stdout, "{:?}: {} - {}", now.state, now.artist, now.title)?,
                None => writeln!(stdout, "nothing playing")?,
            },
            Command::Help => writeln!(stdout, "{}", commands::HELP)?,
            Command::Quit => break,
        }
    }

    Ok(())
}

fn print_queue(handle: &PlayerHandle, out: &mut impl Write) -> Result<()> {
    let snapshot = handle.snapshot()?;
    writeln!(
        out,
        "{} ({} songs, {:?})",
        snapshot.name, snapshot.size, snapshot.state
    )?;

    for (index, entry) in snapshot.entries.iter().enumerate() {
        match entry {
            SnapshotEntry::Song { entry, title, .. } => {
                let marker = if snapshot.current == Some(*entry) { '>' } else { ' ' };
                writeln!(out, "{marker} {index:>3}  {title}")?;
            }
            SnapshotEntry::Playlist { name, size, .. } => {
                writeln!(out, "  {index:>3}  [{name}] {size} songs")?;
            }
        }
    }
    Ok(())
}
