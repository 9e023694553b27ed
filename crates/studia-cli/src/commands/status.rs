use serde::Serialize;
use studia_core::ConnectivityMonitor;

use crate::commands::common::AppContext;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub user: Option<String>,
    pub online: bool,
    pub sync_state: String,
    pub pending_writes: usize,
    pub offline_persistence: bool,
    pub store_path: String,
    pub cache_path: String,
}

pub fn collect_status(context: &AppContext) -> StatusReport {
    let monitor = ConnectivityMonitor::new(context.client.clone());
    let sync_state = *context.client.sync_state().borrow();
    StatusReport {
        user: context
            .client
            .session()
            .current_user()
            .map(|user| user.as_str().to_string()),
        online: monitor.is_online(),
        sync_state: sync_state.label().to_string(),
        pending_writes: context.client.pending_count(),
        offline_persistence: context.client.config().offline_persistence(),
        store_path: context.store_path.display().to_string(),
        cache_path: context.cache_path.display().to_string(),
    }
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    vec![
        format!("user: {}", report.user.as_deref().unwrap_or("(signed out)")),
        format!(
            "connection: {}",
            if report.online { "online" } else { "offline" }
        ),
        format!("sync: {}", report.sync_state),
        format!("pending writes: {}", report.pending_writes),
        format!("offline persistence: {}", report.offline_persistence),
        format!("store: {}", report.store_path),
        format!("cache: {}", report.cache_path),
    ]
}

pub fn run_status(context: &AppContext, json: bool) -> Result<(), CliError> {
    let report = collect_status(context);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}
