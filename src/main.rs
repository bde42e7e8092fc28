use log::{LevelFilter, Log, Metadata, Record};
use strand::prelude::*;

/// Prints `log` records to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// `STRAND_LOG=debug` (or trace, warn, error, off) overrides the default `info`.
fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|level| level.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn main() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(parse_level(std::env::var("STRAND_LOG").ok().as_deref()));
    }

    let rope = RopeConfig::new().with_segments(60).with_rope_length(6.0);
    let middle = rope.segments / 2;

    let result = Viewer::new()
        .with_rope(rope)
        .with_gust(Gust::new(Vec3::new(0.0, 0.0, 1.0)).with_strength(0.03))
        .with_marker(middle)
        .with_title("strand - rope in the wind")
        .run();

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" WARN ")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("off")), LevelFilter::Off);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Info);
    }
}
