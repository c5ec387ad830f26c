use crate::config::{LoggingConfig, Section};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{fmt, util::SubscriberInitExt, Layer};

// Keep a guard for non-blocking console to avoid being dropped.
static CONSOLE_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

// ================= level helpers =================

fn parse_tracing_level(s: &str) -> Option<tracing::Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// Returns true if target == crate_name or target starts with "crate_name::"
fn matches_crate_prefix(target: &str, crate_name: &str) -> bool {
    target == crate_name
        || (target.starts_with(crate_name) && target[crate_name.len()..].starts_with("::"))
}

// ================= rotating writer for files =================

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

#[derive(Clone)]
struct RotWriterHandle(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

// A writer handle that may be None (drops writes)
#[derive(Clone)]
struct RoutedWriterHandle(Option<RotWriterHandle>);

impl Write for RoutedWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(w) = &mut self.0 {
            w.write(buf)
        } else {
            Ok(buf.len())
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(w) = &mut self.0 {
            w.flush()
        } else {
            Ok(())
        }
    }
}

/// Route log records to different files by target prefix:
/// keys are crate/target prefixes like "modkit" or "ops_heartbeat"
#[derive(Clone)]
struct MultiFileRouter {
    default: Option<RotWriter>,            // default file (from "default" section), optional
    by_prefix: HashMap<String, RotWriter>, // subsystem → writer
}

impl MultiFileRouter {
    fn resolve_for(&self, target: &str) -> Option<RotWriterHandle> {
        // longest matching prefix wins
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| matches_crate_prefix(target, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, wr)| RotWriterHandle(wr.0.clone()))
            .or_else(|| self.default.as_ref().map(|w| RotWriterHandle(w.0.clone())))
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for MultiFileRouter {
    type Writer = RoutedWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriterHandle(self.default.as_ref().map(|w| RotWriterHandle(w.0.clone())))
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RoutedWriterHandle(self.resolve_for(meta.target()))
    }
}

// ================= config extraction =================

struct ConfigData<'a> {
    default_section: Option<&'a Section>,
    crate_sections: Vec<(String, &'a Section)>,
}

fn extract_config_data(cfg: &LoggingConfig) -> ConfigData<'_> {
    let mut crate_sections = cfg
        .iter()
        .filter(|(k, _)| k.as_str() != "default")
        .map(|(k, v)| (k.clone(), v))
        .collect::<Vec<_>>();
    crate_sections.sort_by(|a, b| a.0.cmp(&b.0));

    ConfigData {
        default_section: cfg.get("default"),
        crate_sections,
    }
}

// ================= path helpers =================

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn create_rotating_writer(section: &Section, base_dir: &Path) -> std::io::Result<RotWriter> {
    let log_path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let max_bytes = section.max_size_mb.unwrap_or(100) as usize * 1024 * 1024;

    // Retention: MaxFiles when given, else by age
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(
            section.max_age_days.unwrap_or(1) as i64,
        )),
    };

    let rot = FileRotate::new(
        log_path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );

    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

fn open_file_writer(name: &str, section: &Section, base_dir: &Path) -> Option<RotWriter> {
    if section.file.trim().is_empty() {
        return None;
    }
    match create_rotating_writer(section, base_dir) {
        Ok(writer) => Some(writer),
        Err(e) => {
            eprintln!(
                "Failed to init log file for '{}': {} ({})",
                name,
                resolve_log_path(&section.file, base_dir).display(),
                e
            );
            None
        }
    }
}

// ================= public init =================

/// Install the global subscriber: console (non-blocking stderr) plus optional
/// rotating JSON files, with per-subsystem levels from `cfg`. Relative log paths are
/// resolved against `base_dir`. `RUST_LOG`, when set, caps every sink.
pub fn init_logging_unified(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` *before* installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let data = extract_config_data(cfg);

    if data.crate_sections.is_empty() && data.default_section.is_none() {
        // Minimal fallback (INFO to console; honors RUST_LOG)
        init_minimal();
        return;
    }

    let file_router = build_file_router(&data, base_dir);

    let console_targets = build_targets(&data, SinkKind::Console);
    let file_targets = build_targets(
        &data,
        SinkKind::File {
            has_default_file: file_router.default.is_some(),
        },
    );

    install_subscriber(console_targets, file_targets, file_router);
}

// ================= generic targets builder =================

use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;

/// Different "sinks" (destinations) for which we build Targets.
enum SinkKind {
    Console,
    File { has_default_file: bool },
}

fn build_targets(config: &ConfigData, kind: SinkKind) -> Targets {
    match kind {
        SinkKind::Console => {
            let default_level = config
                .default_section
                .and_then(|s| parse_tracing_level(s.console_level.as_str()))
                .map(LevelFilter::from_level)
                .unwrap_or(LevelFilter::INFO);

            let mut targets = Targets::new().with_default(default_level);

            for (crate_name, section) in &config.crate_sections {
                let level = parse_tracing_level(section.console_level.as_str())
                    .map(LevelFilter::from_level)
                    .unwrap_or(LevelFilter::OFF);
                targets = targets.with_target(crate_name.clone(), level);
            }

            targets
        }

        SinkKind::File { has_default_file } => {
            // no default file → nothing is written unless a subsystem has its own file
            let default_level = if has_default_file {
                config
                    .default_section
                    .and_then(|s| parse_tracing_level(s.file_level.as_str()))
                    .map(LevelFilter::from_level)
                    .unwrap_or(LevelFilter::INFO)
            } else {
                LevelFilter::OFF
            };

            let mut targets = Targets::new().with_default(default_level);

            for (crate_name, section) in &config.crate_sections {
                if section.file.trim().is_empty() {
                    continue;
                }
                let level = parse_tracing_level(section.file_level.as_str())
                    .map(LevelFilter::from_level)
                    .unwrap_or(LevelFilter::OFF);
                targets = targets.with_target(crate_name.clone(), level);
            }

            targets
        }
    }
}

// ================= building routers =================

fn build_file_router(config: &ConfigData, base_dir: &Path) -> MultiFileRouter {
    let mut router = MultiFileRouter {
        default: None,
        by_prefix: HashMap::new(),
    };

    if let Some(section) = config.default_section {
        router.default = open_file_writer("default", section, base_dir);
    }

    for (crate_name, section) in &config.crate_sections {
        if let Some(writer) = open_file_writer(crate_name, section, base_dir) {
            router.by_prefix.insert(crate_name.clone(), writer);
        }
    }

    router
}

// ================= registry & layers =================

fn install_subscriber(console_targets: Targets, file_targets: Targets, file_router: MultiFileRouter) {
    use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

    // RUST_LOG acts as a global upper-bound for console/file if present.
    let env: Option<EnvFilter> = EnvFilter::try_from_default_env().ok();

    // Console writer (non-blocking stderr)
    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let file_layer_opt = if !file_router.is_empty() {
        Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(file_router)
                .with_filter(file_targets),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        .with(env)
        .with(console_layer)
        .with(file_layer_opt);

    let _ = subscriber.try_init();
}

fn init_minimal() {
    use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

    let env = EnvFilter::try_from_default_env().ok();

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(LevelFilter::INFO);

    let _ = Registry::default().with(env).with(fmt_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.to_string(),
            file: file.to_string(),
            file_level: file_level.to_string(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn levels_parse_with_info_fallback() {
        assert_eq!(parse_tracing_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_tracing_level("off"), None);
        assert_eq!(parse_tracing_level("chatty"), Some(Level::INFO));
    }

    #[test]
    fn crate_prefix_requires_path_boundary() {
        assert!(matches_crate_prefix("modkit", "modkit"));
        assert!(matches_crate_prefix("modkit::hooks", "modkit"));
        assert!(!matches_crate_prefix("modkit_bootstrap::logging", "modkit"));
    }

    #[test]
    fn router_prefers_longest_prefix_and_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/all.log", "debug"));
        cfg.insert("modkit".into(), section("info", "logs/modkit.log", "debug"));
        cfg.insert(
            "modkit::hooks".into(),
            section("debug", "logs/hooks.log", "trace"),
        );

        let data = extract_config_data(&cfg);
        let router = build_file_router(&data, tmp.path());

        assert!(!router.is_empty());
        let hooks = router.resolve_for("modkit::hooks::scheduler").unwrap();
        let expected = router.by_prefix.get("modkit::hooks").unwrap();
        assert!(Arc::ptr_eq(&hooks.0, &expected.0));

        let other = router.resolve_for("ops_heartbeat").unwrap();
        assert!(Arc::ptr_eq(&other.0, &router.default.as_ref().unwrap().0));
        assert!(tmp.path().join("logs").is_dir());
    }

    #[test]
    fn empty_file_means_no_writer() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "", ""));

        let data = extract_config_data(&cfg);
        assert!(build_file_router(&data, tmp.path()).is_empty());
    }
}
