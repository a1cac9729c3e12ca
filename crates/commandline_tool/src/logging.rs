use chrono::{Datelike, Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter as SubLevel;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Archive name for the previous `latest.log`: `yyMMddHH` plus two random
/// digits, with `-N` appended while the name is taken.
fn archive_path(log_dir: &Path, modified: chrono::DateTime<Local>) -> PathBuf {
    let mut rng = StdRng::from_entropy();
    let rnd: u8 = rng.gen_range(0..100);
    let code = format!(
        "{:02}{:02}{:02}{:02}{:02}",
        modified.year() % 100,
        modified.month(),
        modified.day(),
        modified.hour(),
        rnd
    );

    let mut path = log_dir.join(format!("{}.log", code));
    let mut idx = 1;
    while path.exists() {
        path = log_dir.join(format!("{}-{}.log", code, idx));
        idx += 1;
    }
    path
}

fn archive_latest(log_dir: &Path) {
    let latest = log_dir.join("latest.log");
    let Ok(modified) = fs::metadata(&latest).and_then(|m| m.modified()) else {
        return;
    };
    let target = archive_path(log_dir, modified.into());
    if let Err(e) = fs::rename(&latest, &target) {
        eprintln!("failed to archive {}: {}", latest.display(), e);
    }
}

/// Routes `log` records and `tracing` events to the console (WARN, or DEBUG
/// with `debug`) and to `log/latest.log` (INFO, or DEBUG). Keep the guard
/// alive until exit so buffered lines reach the file.
pub fn init_logging(log_dir: &Path, debug: bool) -> Option<WorkerGuard> {
    let _ = LogTracer::init();

    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create {}: {}", log_dir.display(), e);
    }
    archive_latest(log_dir);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::uptime());
    let (console_filter, file_filter) = if debug {
        (SubLevel::DEBUG, SubLevel::DEBUG)
    } else {
        (SubLevel::WARN, SubLevel::INFO)
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(rolling::never(log_dir, "latest.log"));
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    let subscriber = tracing_subscriber::registry()
        .with(console_layer.with_filter(console_filter))
        .with(file_layer.with_filter(file_filter));
    match subscriber.try_init() {
        Ok(()) => Some(guard),
        Err(e) => {
            eprintln!("logging already initialized: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_previous_log_archived() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("latest.log"), "old run\n").unwrap();

        archive_latest(dir.path());

        assert!(!dir.path().join("latest.log").exists());
        let archived: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(archived.len(), 1);
        assert!(archived[0].ends_with(".log"));
        assert_eq!(archived[0].len(), "0000000000.log".len());
    }

    #[test]
    fn test_archive_name_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        let first = archive_path(dir.path(), now);
        fs::write(&first, "").unwrap();
        let second = archive_path(dir.path(), now);
        assert_ne!(first, second);
    }
}
