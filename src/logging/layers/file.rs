use crate::logging::config::LoggingConfig;
use crate::Result;
use anyhow::{anyhow, Context};
use dirs_next::home_dir;
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

const LOG_DIR: &str = ".migrate/logs";
const LOG_FILE_NAME: &str = "migrate-tools.log";

/// Layer type produced by the file sink builder.
pub type FileFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Layer stack with the optional file sink applied to `S`.
pub type FileLayerStack<S> = tracing_subscriber::layer::Layered<Option<FileFmtLayer<S>>, S>;

/// Where the file sink writes.
///
/// A relative `log_dir` is resolved against the workspace (or `$HOME` when
/// there is none) and may not leave it; an absolute one is used as is.
pub fn log_file_path(config: &LoggingConfig, workspace_root: Option<&Path>) -> Result<PathBuf> {
    let anchor = match workspace_root {
        Some(workspace) => workspace.to_path_buf(),
        None => home_dir().ok_or_else(|| anyhow!("$HOME directory unavailable"))?,
    };
    let directory = match &config.log_dir {
        Some(custom) if custom.is_absolute() => custom.clone(),
        Some(custom) => {
            let resolved = canonicalize_or_clone(&anchor.join(custom));
            let anchor = canonicalize_or_clone(&anchor);
            if !resolved.starts_with(&anchor) {
                return Err(anyhow!(
                    "logging.log_dir resolves outside {}",
                    anchor.display()
                ));
            }
            resolved
        }
        None => anchor.join(LOG_DIR),
    };
    Ok(directory.join(LOG_FILE_NAME))
}

/// Append-only file layer behind a non-blocking writer. The guard must
/// outlive the subscriber or buffered lines are lost.
pub fn file_layer<S>(log_file: &Path) -> Result<(FileFmtLayer<S>, WorkerGuard)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let directory = log_file.parent().ok_or_else(|| {
        anyhow!(
            "log file path {} has no parent directory",
            log_file.display()
        )
    })?;
    create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let layer = tracing_fmt::layer()
        .with_writer(BoxMakeWriter::new(non_blocking))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);
    Ok((layer, guard))
}

fn canonicalize_or_clone(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
