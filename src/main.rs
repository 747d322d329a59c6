use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};

use tui_globe::app::{App, Viewport};
use tui_globe::config::{CliArgs, Config};
use tui_globe::data::{load_locations, outline_sources, OutlineLoader};
use tui_globe::{logging, ui};

/// ~60 FPS
const FRAME_TIME: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    config.apply_cli_overrides(&args);
    logging::init_logging(&config.log)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting tui-globe");

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;

    // Enable mouse capture
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, &config);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    if let Err(ref e) = result {
        tracing::error!("exiting with error: {e:#}");
    }
    result
}

fn run(terminal: &mut DefaultTerminal, config: &Config) -> Result<()> {
    let (locations, source) = load_locations(Some(&config.data.locations))?;

    let size = terminal.size()?;
    let viewport = Viewport {
        cols: size.width,
        rows: size.height,
    };
    let mut app = App::new(config, locations, source, viewport, Instant::now(), Utc::now());

    let loader = OutlineLoader::spawn(
        outline_sources(&config.data.data_dir),
        Duration::from_secs(config.data.outline_timeout_secs),
    );
    app.attach_loader(loader);

    loop {
        if event::poll(FRAME_TIME)? {
            // Drain everything queued so drags stay responsive
            loop {
                let ev = event::read()?;
                app.input.push_host_event(&ev, Viewport::ORIGIN);
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }

        app.tick(Instant::now(), Utc::now());

        if app.take_retry_request() {
            let size = terminal.size()?;
            app.resize(size.width, size.height);
            tracing::info!(cols = size.width, rows = size.height, "capability re-checked");
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|frame| ui::render(frame, &app))?;
    }

    tracing::info!("shutting down");
    Ok(())
}
