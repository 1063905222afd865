use std::time::{Duration, Instant};

use log::LevelFilter;
use tracing::Level;

#[derive(Clone, Debug)]
#[non_exhaustive]
/// Logging configuration for executed statements.
pub struct LogSettings {
    /// Log level for statements.
    pub statements_level: LevelFilter,
    /// Log level for slow statements.
    pub slow_statements_level: LevelFilter,
    /// Threshold for slow statements.
    pub slow_statements_duration: Duration,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            statements_level: LevelFilter::Debug,
            slow_statements_level: LevelFilter::Warn,
            slow_statements_duration: Duration::from_secs(1),
        }
    }
}

impl LogSettings {
    /// Configure statement logging level.
    pub fn log_statements(&mut self, level: LevelFilter) {
        self.statements_level = level;
    }

    /// Configure slow statement logging level and threshold.
    pub fn log_slow_statements(&mut self, level: LevelFilter, duration: Duration) {
        self.slow_statements_level = level;
        self.slow_statements_duration = duration;
    }

    /// Returns `true` if any logging level is enabled.
    pub fn is_enabled(&self) -> bool {
        self.statements_level != LevelFilter::Off || self.slow_statements_level != LevelFilter::Off
    }
}

fn level_filter_to_levels(filter: LevelFilter) -> Option<(Level, log::Level)> {
    let tracing_level = match filter {
        LevelFilter::Error => Some(Level::ERROR),
        LevelFilter::Warn => Some(Level::WARN),
        LevelFilter::Info => Some(Level::INFO),
        LevelFilter::Debug => Some(Level::DEBUG),
        LevelFilter::Trace => Some(Level::TRACE),
        LevelFilter::Off => None,
    };

    tracing_level.zip(filter.to_level())
}

/// Check whether tracing is enabled for the query target at the provided level.
fn tracing_enabled_for(level: Level) -> bool {
    match level {
        Level::ERROR => tracing::enabled!(target: "query", Level::ERROR),
        Level::WARN => tracing::enabled!(target: "query", Level::WARN),
        Level::INFO => tracing::enabled!(target: "query", Level::INFO),
        Level::DEBUG => tracing::enabled!(target: "query", Level::DEBUG),
        Level::TRACE => tracing::enabled!(target: "query", Level::TRACE),
    }
}

/// Emit a tracing event with a dynamically chosen log level.
fn emit_query_event(
    tracing_level: Level,
    summary: &str,
    sql: &str,
    rows_affected: u64,
    rows_returned: u64,
    elapsed: Duration,
) {
    macro_rules! event {
        ($level:expr) => {
            tracing::event!(
                target: "query",
                $level,
                summary,
                db.statement = sql,
                rows_affected,
                rows_returned,
                ?elapsed,
            )
        };
    }

    match tracing_level {
        Level::ERROR => event!(Level::ERROR),
        Level::WARN => event!(Level::WARN),
        Level::INFO => event!(Level::INFO),
        Level::DEBUG => event!(Level::DEBUG),
        Level::TRACE => event!(Level::TRACE),
    }
}

/// Tracks execution statistics for one statement and logs them when
/// dropped.
pub(crate) struct QueryLogger<'q> {
    sql: &'q str,
    rows_returned: u64,
    rows_affected: u64,
    start: Instant,
    settings: LogSettings,
}

impl<'q> QueryLogger<'q> {
    pub(crate) fn new(sql: &'q str, settings: LogSettings) -> Self {
        Self {
            sql,
            rows_returned: 0,
            rows_affected: 0,
            start: Instant::now(),
            settings,
        }
    }

    pub(crate) fn inc_rows_returned(&mut self) {
        self.rows_returned += 1;
    }

    pub(crate) fn inc_rows_affected(&mut self, n: u64) {
        self.rows_affected += n;
    }

    /// Emit a log event for the completed statement.
    fn finish(&self) {
        let elapsed = self.start.elapsed();
        let filter = if elapsed >= self.settings.slow_statements_duration {
            self.settings.slow_statements_level
        } else {
            self.settings.statements_level
        };

        let Some((tracing_level, log_level)) = level_filter_to_levels(filter) else {
            return;
        };

        // The enabled level could be set from either tracing world or log
        // world, so check both.
        if !log::log_enabled!(target: "query", log_level) && !tracing_enabled_for(tracing_level) {
            return;
        }

        let (summary, sql) = self.build_log_payload();

        emit_query_event(
            tracing_level,
            summary.as_str(),
            sql.as_str(),
            self.rows_affected,
            self.rows_returned,
            elapsed,
        );
    }

    /// Build the summary line and optional formatted SQL payload.
    fn build_log_payload(&self) -> (String, String) {
        let mut summary = parse_query_summary(self.sql);
        if summary != self.sql {
            summary.push('…');
            let formatted = sqlformat::format(
                self.sql,
                &sqlformat::QueryParams::None,
                &sqlformat::FormatOptions::default(),
            );
            (summary, format!("\n\n{}\n", formatted))
        } else {
            (summary, String::new())
        }
    }
}

impl<'q> Drop for QueryLogger<'q> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Produce a short summary of a SQL statement for logging.
fn parse_query_summary(sql: &str) -> String {
    sql.split_whitespace().take(4).collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_truncates_to_four_words() {
        assert_eq!(
            parse_query_summary("SELECT a, b FROM t WHERE x"),
            "SELECT a, b FROM"
        );
        assert_eq!(parse_query_summary("COMMIT"), "COMMIT");
    }

    #[test]
    fn test_off_maps_to_no_levels() {
        assert!(level_filter_to_levels(LevelFilter::Off).is_none());
        assert!(level_filter_to_levels(LevelFilter::Debug).is_some());
    }
}
