use batlayer_core::paths;
use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::sync::Mutex;

// Dimmed target colours, picked by hashing the target name so a module keeps its colour.
const TARGET_COLORS: [Color; 5] = [
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
];

/// Writes coloured lines to stderr and a plain copy to the log file. Stdout is left alone because
/// stdin/stdout may be part of a pipeline.
pub struct BatLayerLogger {
    filter: LevelFilter,
    log_file: Mutex<Option<LineWriter<File>>>,
}

impl BatLayerLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        let log_file = paths::log_file_path().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| eprintln!("Warning: could not open log file {}: {e}", path.display()))
                .ok()
        });

        Self {
            filter: level_filter(quiet, verbose),
            log_file: Mutex::new(log_file.map(LineWriter::new)),
        }
    }

    fn format_colored(&self, record: &Record) -> String {
        let level = level_tag(record.level());
        let target = short_target(record.target());
        let message = record.args().to_string();

        let tag = match record.level() {
            Level::Error => level.red().bold(),
            Level::Warn => level.yellow().bold(),
            Level::Info => level.green().bold(),
            Level::Debug => level.blue().bold(),
            Level::Trace => level.white().bold(),
        };
        let message = match record.level() {
            Level::Error => message.red().bold().to_string(),
            Level::Warn => message.yellow().bold().to_string(),
            _ => message,
        };

        match target {
            Some(target) => format!(
                "{tag} [{}] {message}",
                target.color(target_color(target)).dimmed()
            ),
            None => format!("{tag} {message}"),
        }
    }
}

fn level_filter(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Info
    } else if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[E]",
        Level::Warn => "[W]",
        Level::Info => "[I]",
        Level::Debug => "[D]",
        Level::Trace => "[T]",
    }
}

/// Last path segment of a module target, `batlayer_core::engine` becomes `engine`.
fn short_target(target: &str) -> Option<&str> {
    target.rsplit("::").next().filter(|t| !t.is_empty())
}

fn target_color(target: &str) -> Color {
    let hash = target
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    TARGET_COLORS[hash % TARGET_COLORS.len()]
}

fn format_plain(record: &Record) -> String {
    let level = level_tag(record.level());
    match short_target(record.target()) {
        Some(target) => format!("{level} [{target}] {}", record.args()),
        None => format!("{level} {}", record.args()),
    }
}

impl Log for BatLayerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        eprintln!("{}", self.format_colored(record));

        if let Ok(mut file) = self.log_file.lock() {
            if let Some(file) = file.as_mut() {
                let _ = writeln!(file, "{}", format_plain(record));
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.log_file.lock() {
            if let Some(file) = file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

pub fn init_logger(quiet: bool, verbose: bool) -> Result<(), log::SetLoggerError> {
    let logger = BatLayerLogger::new(quiet, verbose);
    let filter = logger.filter;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(filter);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(true, false), LevelFilter::Info);
        assert_eq!(level_filter(false, false), LevelFilter::Debug);
        assert_eq!(level_filter(false, true), LevelFilter::Trace);
    }

    #[test]
    fn test_short_target() {
        assert_eq!(short_target("batlayer_core::engine"), Some("engine"));
        assert_eq!(short_target("batlayer"), Some("batlayer"));
        assert_eq!(short_target(""), None);
    }

    #[test]
    fn test_plain_format() {
        let line = format_plain(
            &Record::builder()
                .args(format_args!("Overlay removed"))
                .level(Level::Info)
                .target("batlayer_core::engine")
                .build(),
        );
        assert_eq!(line, "[I] [engine] Overlay removed");
    }

    #[test]
    fn test_target_color_is_stable() {
        assert_eq!(target_color("run_loop"), target_color("run_loop"));
    }
}
