use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Line-per-event JSON trace of document assembly.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: HashMap<String, u64>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Field<'a> {
    Int(u64),
    Float(f64),
    Str(&'a str),
    Bool(bool),
    /// Already-encoded JSON value.
    Raw(&'a str),
}

impl Field<'_> {
    fn encode_into(&self, json: &mut String) {
        match self {
            Field::Int(v) => json.push_str(&v.to_string()),
            Field::Float(v) if v.is_finite() => json.push_str(&format!("{:.3}", v)),
            Field::Float(_) => json.push_str("null"),
            Field::Str(v) => {
                json.push('"');
                json.push_str(&json_escape(v));
                json.push('"');
            }
            Field::Bool(v) => json.push_str(if *v { "true" } else { "false" }),
            Field::Raw(v) => json.push_str(v),
        }
    }
}

fn record(kind: &str, fields: &[(&str, Field<'_>)]) -> String {
    let mut json = format!("{{\"type\":\"{}\"", json_escape(kind));
    for (key, value) in fields {
        json.push_str(&format!(",\"{}\":", json_escape(key)));
        value.encode_into(&mut json);
    }
    json.push('}');
    json
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: HashMap::new(),
            })),
        })
    }

    /// Writes `{"type":kind, ...fields}` and bumps the per-type counter.
    pub fn event(&self, kind: &str, fields: &[(&str, Field<'_>)]) {
        let line = record(kind, fields);
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{line}");
            *state.counters.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Writes the event counts gathered so far as one `debug.summary`
    /// record and resets them.
    pub fn emit_summary(&self, context: &str) {
        let Ok(mut state) = self.inner.lock() else {
            return;
        };
        let mut counts: Vec<(String, u64)> = state.counters.drain().collect();
        counts.sort();
        let counts = counts
            .iter()
            .map(|(kind, n)| format!("\"{}\":{}", json_escape(kind), n))
            .collect::<Vec<_>>()
            .join(",");
        let counts = format!("{{{counts}}}");
        let line = record(
            "debug.summary",
            &[("context", Field::Str(context)), ("counts", Field::Raw(&counts))],
        );
        let _ = writeln!(state.writer, "{line}");
        let _ = state.writer.flush();
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    raw.chars().fold(String::with_capacity(raw.len()), |mut out, ch| {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "pagewright_debug_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn events_and_summary_are_jsonl() {
        let path = temp_log_path("events");
        let logger = DebugLogger::new(&path).expect("logger");
        logger.event(
            "pdf.page.begin",
            &[("page", Field::Int(1)), ("note", Field::Str("a\"b"))],
        );
        logger.event("pdf.page.begin", &[("landscape", Field::Bool(true))]);
        logger.emit_summary("close");
        logger.flush();

        let text = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "{\"type\":\"pdf.page.begin\",\"page\":1,\"note\":\"a\\\"b\"}");
        assert!(lines[1].contains("\"landscape\":true"));
        assert!(lines[2].contains("\"pdf.page.begin\":2"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(json_escape("a\u{1}\n"), "a\\u0001\\n");
        assert_eq!(json_escape("\t\\"), "\\u0009\\\\");
    }
}
