use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;

/// Log to stderr, keeping stdout for the translated text
pub fn setup_logging(verbose_level: u8) {
    setup_logging_with_file(verbose_level, None);
}

/// Log to a file in the cache directory, so log lines do not interleave with
/// the streamed output of an interactive session
pub fn setup_logging_for_interactive(verbose_level: u8) {
    let log_file_path = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("quick-tl")
        .join("interactive.log");

    if let Some(parent) = log_file_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    setup_logging_with_file(verbose_level, Some(log_file_path));
}

fn filter_for(verbose_level: u8) -> tracing_subscriber::EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let filter_str = match verbose_level {
            0 => "warn,quick_tl=info,llm=info",
            1 => "info,quick_tl=debug,llm=debug",
            _ => "debug,quick_tl=trace,llm=trace",
        };
        tracing_subscriber::EnvFilter::new(filter_str)
    }
}

fn setup_logging_with_file(verbose_level: u8, log_file: Option<PathBuf>) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!(
                    "Warning: Could not open log file {:?} ({e}), falling back to stderr",
                    path
                );
                None
            }
        }
    });

    match file {
        Some(file) => subscriber
            .with_ansi(false)
            .with_writer(move || match file.try_clone() {
                Ok(file) => Box::new(file) as Box<dyn io::Write + Send>,
                Err(_) => Box::new(io::sink()) as Box<dyn io::Write + Send>,
            })
            .init(),
        None => subscriber.with_writer(io::stderr).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_filters() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert!(filter_for(0).to_string().contains("quick_tl=info"));
        assert!(filter_for(1).to_string().contains("quick_tl=debug"));
        assert!(filter_for(5).to_string().contains("llm=trace"));
    }
}
