use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use taxdesk_core::{AnalyticsClient, Config};

mod app;
mod handler;
mod logging;
mod picker;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Ignoring config: {}", e);
            Config::new()
        }
    };

    if let Err(e) = logging::init(&config) {
        eprintln!("Logging disabled: {}", e);
    }
    info!(backend_url = config.backend_url(), "starting taxdesk");

    let client = Arc::new(AnalyticsClient::new(config.backend_url()));
    let mut app = App::new(client, config.backend_url(), &std::env::current_dir()?);
    app.check_backend();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Err(e) = &result {
        warn!(error = %e, "exited with error");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();
    let mut log_changes = app.store.subscribe();
    let task_done = app.task_done.clone();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event).await?,
            Ok(()) = log_changes.changed() => app.on_log_changed(),
            _ = task_done.notified() => {}
            else => break,
        }

        app.poll_tasks();
    }

    Ok(())
}
