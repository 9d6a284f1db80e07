//! Structured JSONL logging.
//!
//! Nothing here writes to stdout; command output owns it. Log lines go to a
//! daily-rolling file, or to stderr when no file can be opened.

use anyhow::Result;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "TALLY_LOG_PATH";
const ENV_LOG_DIR: &str = "TALLY_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and under what name to log.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name, stamped on every line and used for the file name.
    pub service: String,
    /// Log directory from config; environment overrides win over it.
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Build from the package name and an optional configured directory.
    pub fn from_env_with_overrides(log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

/// Keeps the background writer alive; drop it last.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match LogTarget::resolve(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(target) => {
            let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
            tracing_appender::non_blocking(appender)
        }
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer {
            writer,
            service: cfg.service.clone(),
        })
        .init();

    tracing::debug!("observability initialized");
    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Pick the filter: `-q` beats `-v`, which beats `RUST_LOG`, which beats
/// the configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

// ──────────────────────────────────────────────
// JSON layer
// ──────────────────────────────────────────────

struct JsonLogLayer<W> {
    writer: W,
    service: String,
}

#[derive(Clone, Debug)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.0));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = JsonVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.0),
            None => extensions.insert(SpanFields(visitor.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut line = Map::new();
        line.insert("timestamp".into(), Value::String(rfc3339_now()));
        line.insert("level".into(), Value::String(meta.level().as_str().to_lowercase()));
        line.insert("service".into(), Value::String(self.service.clone()));
        line.insert("target".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    line.extend(fields.0.clone());
                }
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        line.extend(visitor.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(line)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Default)]
struct JsonVisitor(Map<String, Value>);

impl JsonVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

/// UTC now as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
fn rfc3339_now() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_epoch_millis(now.as_secs(), now.subsec_millis())
}

fn format_epoch_millis(secs: u64, millis: u32) -> String {
    let (year, month, day) = civil_from_days((secs / 86_400).cast_signed());
    let tod = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        tod / 3600,
        (tod % 3600) / 60,
        tod % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

// ──────────────────────────────────────────────
// Target resolution
// ──────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

impl LogTarget {
    fn resolve(service: &str, config_dir: Option<&Path>) -> Result<Self, String> {
        Self::resolve_with(
            service,
            std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
            std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
            config_dir.map(Path::to_path_buf),
        )
    }

    /// Explicit path, then env dir, then config dir, then the platform
    /// data directory, then the working directory.
    fn resolve_with(
        service: &str,
        path_override: Option<PathBuf>,
        dir_override: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self, String> {
        if let Some(path) = path_override {
            return Self::from_path(&path);
        }
        if let Some(dir) = dir_override.or(config_dir) {
            return Self::in_dir(dir, service);
        }

        let fallbacks = directories::ProjectDirs::from("", "", service)
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .into_iter()
            .chain(std::env::current_dir().ok());
        for dir in fallbacks {
            if let Ok(target) = Self::in_dir(dir, service) {
                return Ok(target);
            }
        }
        Err("No writable log directory found".to_string())
    }

    fn in_dir(dir: PathBuf, service: &str) -> Result<Self, String> {
        let target = Self {
            dir,
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        };
        target.ensure_writable()?;
        Ok(target)
    }

    fn from_path(path: &Path) -> Result<Self, String> {
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("{ENV_LOG_PATH} must include a file name"))?
            .to_str()
            .ok_or_else(|| format!("{ENV_LOG_PATH} must be valid UTF-8"))?
            .to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let target = Self { dir, file_name };
        target.ensure_writable()?;
        Ok(target)
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn ensure_writable(&self) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            format!("Failed to create log directory {}: {e}", self.dir.display())
        })?;
        let path = self.path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn quiet_beats_verbose() {
        assert_eq!(env_filter(true, 2, "info").to_string(), "error");
    }

    #[test]
    fn verbose_levels() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 5, "info").to_string(), "trace");
    }

    #[test]
    fn path_override_wins() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("custom.jsonl");
        let target = LogTarget::resolve_with(
            "tally",
            Some(file.clone()),
            Some(tmp.path().join("ignored")),
            None,
        )
        .unwrap();
        assert_eq!(target.path(), file);
        assert!(file.exists());
    }

    #[test]
    fn dir_override_beats_config_dir() {
        let tmp = TempDir::new().unwrap();
        let env_dir = tmp.path().join("env");
        let target = LogTarget::resolve_with(
            "tally",
            None,
            Some(env_dir.clone()),
            Some(tmp.path().join("config")),
        )
        .unwrap();
        assert_eq!(target.dir, env_dir);
        assert_eq!(target.file_name, "tally.jsonl");
    }

    #[test]
    fn config_dir_is_used() {
        let tmp = TempDir::new().unwrap();
        let target =
            LogTarget::resolve_with("demo", None, None, Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(target.path(), tmp.path().join("demo.jsonl"));
    }

    #[test]
    fn timestamp_shape() {
        let ts = rfc3339_now();
        assert_eq!(ts.len(), 24, "{ts}");
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }

    #[test]
    fn known_instants() {
        assert_eq!(format_epoch_millis(0, 0), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            format_epoch_millis(1_709_164_800 + 3661, 42),
            "2024-02-29T01:01:01.042Z"
        );
        assert_eq!(civil_from_days(10_957), (2000, 1, 1));
    }
}
