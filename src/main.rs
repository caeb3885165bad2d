mod audio;
mod audio_api;
mod error;
mod middle;
mod settings;
mod shared;
mod station;
mod tui;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use middle::Middle;
use settings::persistence;
use shared::InputEvent;

const RAW_MODE_ATTEMPTS: u32 = 3;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    init_logging(&project_dir)?;

    let config = persistence::load_config(&project_dir).unwrap_or_default();
    tracing::info!(
        bpm = config.tempo.bpm,
        meter = ?config.tempo.meter,
        bars = config.tempo.bars,
        latency = config.latency_secs,
        "starting"
    );

    let audio = audio::start_audio(&config)?;
    let mut middle = Middle::new(config, audio.sample_rate(), audio.has_input());

    // the guard restores the terminal however we leave this function
    let _guard = enter_raw_mode()?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;

        // station → middle → display
        while let Some(event) = audio.poll_event() {
            middle.on_event(event);
        }
        middle.set_loop_position(audio.loop_position());

        if audio.faulted() {
            save_settings(&project_dir, &middle);
            drop(term);
            anyhow::bail!("the audio output device went away");
        }

        let ds = middle.display_state().clone();
        tui_state.screen = ds.screen;

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, blink_on);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            if event == InputEvent::Quit {
                save_settings(&project_dir, &middle);
                drop(term);
                drop(audio);
                tracing::info!("bye");
                return Ok(());
            }
            for cmd in middle.handle_input(event) {
                audio.send(cmd);
            }
        }
    }
}

// the audio thread never logs; everything else goes to .looptty/looptty.log
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let path = persistence::log_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn save_settings(project_dir: &Path, middle: &Middle) {
    if let Err(e) = persistence::save_config(project_dir, middle.config()) {
        tracing::warn!("could not save settings: {e:#}");
    }
}

// some terminals refuse raw mode for a moment right after launch
fn enter_raw_mode() -> anyhow::Result<RawModeGuard> {
    let mut last_err = None;
    for attempt in 1..=RAW_MODE_ATTEMPTS {
        match terminal::enable_raw_mode() {
            Ok(()) => {
                // real press/release reporting where the terminal supports it
                let _ = crossterm::execute!(
                    std::io::stdout(),
                    crossterm::event::PushKeyboardEnhancementFlags(
                        crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                    )
                );
                return Ok(RawModeGuard);
            }
            Err(e) => {
                tracing::warn!(attempt, "could not enable raw mode: {e}");
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(200));
            }
        }
    }
    let err = last_err.map_or_else(|| anyhow::anyhow!("raw mode unavailable"), anyhow::Error::from);
    Err(err.context("setting up the terminal"))
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
