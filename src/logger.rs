//! Diagnostic request log written to a file and the console.
//!
//! Every chat completion request produces one record. The record text is
//! scraped by downstream tooling, so its layout is fixed:
//!
//! ```text
//!
//! ============================================================
//! [14:03:27] 收到请求！
//! ✅ 成功检测到字段 'api_key': sk-test
//! ❌ 未检测到 'conversation_id' 字段！
//! 完整请求体 Body:
//! {
//!   "api_key": "sk-test"
//! }
//! ============================================================
//!
//! ```
//!
//! Tracked field values that are strings appear as raw text. Any other value
//! appears as compact JSON (`true`, `null`, `{"a":1}`); scrapers matching
//! `True`, `None` or `{'a': 1}` will not find those spellings. Integers keep
//! every digit.

use crate::config::LoggingConfig;
use crate::error::MockServerError;
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Width of the separator line framing each record.
pub const SEPARATOR_WIDTH: usize = 60;

/// Body keys whose presence is reported in every record.
pub const TRACKED_FIELDS: [&str; 2] = ["api_key", "conversation_id"];

struct Sink {
    name: String,
    writer: Box<dyn Write + Send>,
}

/// Append-only log handle shared by all request handlers.
///
/// Records are written whole under a single lock, so concurrent requests
/// never interleave within one record.
pub struct DiagnosticLog {
    sinks: Mutex<Vec<Sink>>,
}

impl DiagnosticLog {
    /// Create a log with no sinks. Records are discarded.
    pub fn new() -> Self {
        Self {
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Add a named sink. Sinks receive records in the order they were added.
    pub fn with_sink(self, name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        self.sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Sink {
                name: name.into(),
                writer: Box::new(writer),
            });
        self
    }

    /// Open the file sink (create or append) and, if enabled, the stdout sink.
    pub fn open(config: &LoggingConfig) -> Result<Self, MockServerError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)
            .map_err(|e| MockServerError::LogSink {
                sink: config.file.display().to_string(),
                message: e.to_string(),
            })?;

        let log = Self::new().with_sink(config.file.display().to_string(), file);
        if config.console {
            Ok(log.with_sink("stdout", std::io::stdout()))
        } else {
            Ok(log)
        }
    }

    /// Write one record, followed by a newline, to every sink.
    ///
    /// Sink failures are reported through tracing and otherwise ignored; the
    /// remaining sinks still receive the record.
    pub fn emit(&self, record: &str) {
        let line = format!("{}\n", record);
        let mut sinks = self
            .sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for sink in sinks.iter_mut() {
            if let Err(e) = write_record(sink, line.as_bytes()) {
                tracing::warn!("{}", e);
            }
        }
    }

    /// Number of attached sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

fn write_record(sink: &mut Sink, bytes: &[u8]) -> Result<(), MockServerError> {
    sink.writer
        .write_all(bytes)
        .and_then(|_| sink.writer.flush())
        .map_err(|e| MockServerError::LogSink {
            sink: sink.name.clone(),
            message: e.to_string(),
        })
}

/// Render a body value the way it appears in log lines and replies.
///
/// Strings are shown without quotes; everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn separator() -> String {
    "=".repeat(SEPARATOR_WIDTH)
}

fn field_line(body: &Map<String, Value>, field: &str) -> String {
    match body.get(field) {
        Some(value) => format!("✅ 成功检测到字段 '{}': {}", field, display_value(value)),
        None => format!("❌ 未检测到 '{}' 字段！", field),
    }
}

/// Format the diagnostic record for one chat completion request.
///
/// `time` is the wall-clock time as `HH:MM:SS`.
pub fn format_request_record(body: &Map<String, Value>, time: &str) -> String {
    let separator = separator();
    let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());

    let mut lines = vec![
        String::new(),
        separator.clone(),
        format!("[{}] 收到请求！", time),
    ];
    lines.extend(TRACKED_FIELDS.iter().map(|field| field_line(body, field)));
    lines.push("完整请求体 Body:".to_string());
    lines.push(pretty);
    lines.push(separator);
    lines.push(String::new());

    lines.join("\n")
}

/// Format the two lines announced at startup.
pub fn format_startup_banner(port: u16, log_file: &Path) -> String {
    format!(
        "正在启动模拟服务器，监听端口 {}...\n日志将实时保存到当前目录下的 '{}' 文件中。",
        port,
        log_file.display()
    )
}

/// In-memory sink whose contents can be read back by tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Sink that rejects every write.
#[cfg(test)]
pub(crate) struct FailingWriter;

#[cfg(test)]
impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::other("disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::other("disk full"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn record_matches_fixed_layout() {
        let body = object(json!({
            "model": "gpt-x",
            "api_key": "sk-test",
            "conversation_id": "conv-1"
        }));

        let record = format_request_record(&body, "14:03:27");
        let sep = "=".repeat(60);

        let expected = format!(
            "\n{sep}\n\
             [14:03:27] 收到请求！\n\
             ✅ 成功检测到字段 'api_key': sk-test\n\
             ✅ 成功检测到字段 'conversation_id': conv-1\n\
             完整请求体 Body:\n\
             {{\n  \"model\": \"gpt-x\",\n  \"api_key\": \"sk-test\",\n  \"conversation_id\": \"conv-1\"\n}}\n\
             {sep}\n",
            sep = sep
        );
        assert_eq!(record, expected);
    }

    #[test]
    fn record_reports_missing_fields() {
        let record = format_request_record(&Map::new(), "00:00:00");
        let lines: Vec<&str> = record.lines().collect();

        assert_eq!(lines[0], "");
        assert_eq!(lines[1].len(), 60);
        assert_eq!(lines[2], "[00:00:00] 收到请求！");
        assert_eq!(lines[3], "❌ 未检测到 'api_key' 字段！");
        assert_eq!(lines[4], "❌ 未检测到 'conversation_id' 字段！");
        assert_eq!(lines[5], "完整请求体 Body:");
        assert_eq!(lines[6], "{}");
        assert_eq!(lines[7], "=".repeat(60));
    }

    #[test]
    fn record_preserves_non_ascii_and_key_order() {
        let body = object(json!({
            "zeta": "最后",
            "alpha": {"nested": ["一", 2, true]}
        }));

        let record = format_request_record(&body, "12:00:00");

        assert!(record.contains("\"zeta\": \"最后\""));
        assert!(record.find("\"zeta\"").unwrap() < record.find("\"alpha\"").unwrap());
        assert!(record.contains("    \"nested\": [\n      \"一\",\n      2,\n      true\n    ]"));
    }

    #[test]
    fn non_string_fields_render_as_json() {
        let body = object(json!({"api_key": 42, "conversation_id": null}));

        let record = format_request_record(&body, "12:00:00");

        assert!(record.contains("✅ 成功检测到字段 'api_key': 42"));
        assert!(record.contains("✅ 成功检测到字段 'conversation_id': null"));
    }

    #[test]
    fn display_value_strips_quotes_only_from_strings() {
        assert_eq!(display_value(&json!("sk-test")), "sk-test");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&json!(false)), "false");
        assert_eq!(display_value(&json!({"a": [1]})), "{\"a\":[1]}");
    }

    #[test]
    fn startup_banner_announces_port_and_file() {
        let banner = format_startup_banner(9090, Path::new("mock_server.log"));

        assert_eq!(
            banner,
            "正在启动模拟服务器，监听端口 9090...\n日志将实时保存到当前目录下的 'mock_server.log' 文件中。"
        );
    }

    #[test]
    fn emit_writes_to_every_sink() {
        let file = SharedBuffer::default();
        let console = SharedBuffer::default();
        let log = DiagnosticLog::new()
            .with_sink("file", file.clone())
            .with_sink("console", console.clone());

        log.emit("hello");

        assert_eq!(log.sink_count(), 2);
        assert_eq!(file.contents(), "hello\n");
        assert_eq!(console.contents(), "hello\n");
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let console = SharedBuffer::default();
        let log = DiagnosticLog::new()
            .with_sink("broken", FailingWriter)
            .with_sink("console", console.clone());

        log.emit("still delivered");

        assert_eq!(console.contents(), "still delivered\n");
    }

    #[test]
    fn concurrent_records_stay_contiguous() {
        let buffer = SharedBuffer::default();
        let log = Arc::new(DiagnosticLog::new().with_sink("memory", buffer.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    let body = object(json!({"api_key": format!("key-{}", i)}));
                    for _ in 0..25 {
                        log.emit(&format_request_record(&body, "10:00:00"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = buffer.contents();
        for i in 0..8 {
            let body = object(json!({"api_key": format!("key-{}", i)}));
            let record = format!("{}\n", format_request_record(&body, "10:00:00"));
            assert_eq!(contents.matches(&record).count(), 25);
        }
    }

    #[test]
    fn open_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mock_server.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let config = LoggingConfig {
            file: path.clone(),
            console: false,
        };
        let log = DiagnosticLog::open(&config).unwrap();
        log.emit("next run");
        drop(log);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier run\nnext run\n");
    }

    #[test]
    fn open_creates_missing_file_and_console_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");

        let config = LoggingConfig {
            file: path.clone(),
            console: true,
        };
        let log = DiagnosticLog::open(&config).unwrap();

        assert!(path.exists());
        assert_eq!(log.sink_count(), 2);
    }

    #[test]
    fn open_fails_for_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            file: dir.path().join("missing").join("dir").join("mock_server.log"),
            console: false,
        };

        let result = DiagnosticLog::open(&config);
        assert!(matches!(result, Err(MockServerError::LogSink { .. })));
    }
}
