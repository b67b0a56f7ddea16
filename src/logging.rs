use chrono::{SecondsFormat, Utc};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use serde_json::Value;

pub const LOG_LEVEL_ENV: &str = "RANK_MERGE_LOG";

static LOGGER: StructuredLogger = StructuredLogger;

#[derive(Clone, Debug, Default)]
pub struct LogContext {
    pub match_id: Option<String>,
    pub session_id: Option<String>,
    pub seed: Option<u32>,
    pub tick: Option<u64>,
}

impl LogContext {
    pub fn for_match(match_id: &str) -> Self {
        Self {
            match_id: Some(match_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine<'a> {
    timestamp: String,
    level: &'a str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "matchId", skip_serializing_if = "Option::is_none")]
    match_id: Option<&'a str>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    #[serde(skip_serializing_if = "Value::is_null")]
    details: Value,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredLogger;

impl Log for StructuredLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = StructuredLogLine {
            timestamp: timestamp_now(),
            level: level_name(record.level()),
            event: "log",
            target: Some(record.target()),
            message: Some(record.args().to_string()),
            match_id: None,
            session_id: None,
            seed: None,
            tick: None,
            details: Value::Null,
        };
        eprintln!("{}", render(&line));
    }

    fn flush(&self) {}
}

pub fn init() -> Result<LevelFilter, SetLoggerError> {
    let filter = parse_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());
    log::set_logger(&LOGGER)?;
    log::set_max_level(filter);
    Ok(filter)
}

pub fn parse_level(raw: Option<&str>) -> LevelFilter {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") | Some("warning") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

pub fn emit_log(level: Level, event: &str, context: &LogContext, details: Value) {
    if level > log::max_level() {
        return;
    }
    eprintln!("{}", format_event(level, event, context, details));
}

pub fn format_event(level: Level, event: &str, context: &LogContext, details: Value) -> String {
    let line = StructuredLogLine {
        timestamp: timestamp_now(),
        level: level_name(level),
        event,
        target: None,
        message: None,
        match_id: context.match_id.as_deref(),
        session_id: context.session_id.as_deref(),
        seed: context.seed,
        tick: context.tick,
        details,
    };
    render(&line)
}

fn render(line: &StructuredLogLine<'_>) -> String {
    serde_json::to_string(line).unwrap_or_else(|error| {
        format!(
            "{{\"level\":\"error\",\"event\":\"log_encode_failed\",\"message\":{:?}}}",
            error.to_string()
        )
    })
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "error",
        Level::Warn => "warn",
        Level::Info => "info",
        Level::Debug => "debug",
        Level::Trace => "trace",
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
