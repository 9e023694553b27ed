use std::path::Path;
use std::time::{Duration, SystemTime};

use studia_core::export::render_markdown_day;
use studia_core::{DateKey, DayViewModel};

use crate::commands::common::AppContext;
use crate::error::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

enum WatchEvent {
    Updated,
    Poll,
    Stop,
}

pub async fn run_watch(
    context: &AppContext,
    date: DateKey,
    count: Option<usize>,
) -> Result<(), CliError> {
    let mut view = context.day_view(date).await?;
    print_view(&view);

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    let mut last_modified = modified_at(&context.store_path);
    let mut updates = 0;

    while !count.is_some_and(|limit| updates >= limit) {
        let event = tokio::select! {
            update = view.next_update() => {
                if update.is_some() { WatchEvent::Updated } else { WatchEvent::Stop }
            }
            _ = poll.tick() => WatchEvent::Poll,
            _ = tokio::signal::ctrl_c() => WatchEvent::Stop,
        };

        match event {
            WatchEvent::Updated => {
                updates += 1;
                print_view(&view);
            }
            WatchEvent::Poll => {
                // Other processes write through the emulator file.
                let modified = modified_at(&context.store_path);
                if modified != last_modified {
                    last_modified = modified;
                    tracing::debug!("Store file changed, reloading");
                    context.client.backend().reload_file(&context.store_path)?;
                }
            }
            WatchEvent::Stop => break,
        }
    }

    Ok(())
}

fn print_view(view: &DayViewModel) {
    let record = view.record().cloned().unwrap_or_default();
    println!("{}", render_markdown_day(view.date(), &record));
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
}
