use std::path::{Path, PathBuf};

use studia_core::export::{render_day, suggested_export_file_name};
use studia_core::DateKey;

use crate::cli::ExportFormat;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_show(
    context: &AppContext,
    date: DateKey,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let record = context.repository().read(date).await?;
    let rendered = render_day(date, &record, format.into())?;

    if let Some(path) = output_path {
        let path = resolve_output_path(path, date, format);
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// A directory gets a generated file name inside it.
pub fn resolve_output_path(path: &Path, date: DateKey, format: ExportFormat) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(date, format.into()))
    } else {
        path.to_path_buf()
    }
}
