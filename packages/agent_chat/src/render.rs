//! Incremental terminal rendering of log snapshots.
//!
//! Each entry is printed once with a `[HH:MM:SS] author:` header. A growing
//! assistant entry only prints the text that arrived since the last render,
//! and its line is terminated when it is sealed or another entry follows.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use agent_convo::{ConversationEntry, EntryId, EntryKind};
use chrono::{DateTime, Local};
use serde_json::Value;

use crate::session::LogSnapshot;

pub struct Renderer {
    own_id: String,
    show_tool_calls: bool,
    /// Bytes of `text` already written, per entry.
    printed: HashMap<EntryId, usize>,
    /// Entry whose line is still open for more text.
    open_line: Option<EntryId>,
}

impl Renderer {
    pub fn new(own_id: impl Into<String>, show_tool_calls: bool) -> Self {
        Self {
            own_id: own_id.into(),
            show_tool_calls,
            printed: HashMap::new(),
            open_line: None,
        }
    }

    /// Write whatever changed since the previous call.
    pub fn render<W: Write>(&mut self, snapshot: &LogSnapshot, out: &mut W) -> io::Result<()> {
        for entry in &snapshot.entries {
            match self.printed.get(&entry.id).copied() {
                None => {
                    self.end_line(out)?;
                    self.write_entry(entry, out)?;
                }
                Some(len) if entry.text.len() > len => {
                    if self.open_line != Some(entry.id) {
                        self.end_line(out)?;
                        self.write_header(entry, out)?;
                        self.open_line = Some(entry.id);
                    }
                    if let Some(suffix) = entry.text.get(len..) {
                        out.write_all(suffix.as_bytes())?;
                    }
                }
                Some(_) => {}
            }
            self.printed.insert(entry.id, entry.text.len());

            if self.open_line == Some(entry.id) && !entry.is_open_ai() {
                self.end_line(out)?;
            }
        }

        let live: HashSet<EntryId> = snapshot.entries.iter().map(|e| e.id).collect();
        self.printed.retain(|id, _| live.contains(id));
        out.flush()
    }

    fn end_line<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.open_line.take().is_some() {
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_header<W: Write>(&self, entry: &ConversationEntry, out: &mut W) -> io::Result<()> {
        let marker = if entry.kind == EntryKind::Error { "! " } else { "" };
        write!(
            out,
            "{}[{}] {}: ",
            marker,
            format_time(entry.timestamp),
            self.label(entry)
        )
    }

    fn write_entry<W: Write>(&mut self, entry: &ConversationEntry, out: &mut W) -> io::Result<()> {
        self.write_header(entry, out)?;

        if entry.kind == EntryKind::Tool && self.show_tool_calls {
            let name = entry.tool_name.as_deref().unwrap_or("unknown");
            writeln!(out, "⚙ {}", name)?;
            if let Some(args) = entry.tool_args.as_ref().and_then(pretty_args) {
                for line in args.lines() {
                    writeln!(out, "    {}", line)?;
                }
            }
            return Ok(());
        }

        out.write_all(entry.text.as_bytes())?;
        if entry.is_open_ai() {
            self.open_line = Some(entry.id);
        } else {
            writeln!(out)?;
        }
        Ok(())
    }

    fn label<'a>(&'a self, entry: &'a ConversationEntry) -> &'a str {
        if entry.author == self.own_id {
            "you"
        } else {
            &entry.author
        }
    }
}

fn format_time(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Args arrive either as a JSON object or as a string holding JSON.
fn pretty_args(args: &Value) -> Option<String> {
    let parsed;
    let value = match args {
        Value::Null => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                parsed = v;
                &parsed
            }
            Err(_) => return Some(s.clone()),
        },
        other => other,
    };
    serde_json::to_string_pretty(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render_to_string(renderer: &mut Renderer, entries: &[ConversationEntry]) -> String {
        let snapshot = LogSnapshot {
            entries: entries.to_vec(),
            streaming: false,
        };
        let mut out = Vec::new();
        renderer.render(&snapshot, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_own_entries_are_labelled_you() {
        let mut r = Renderer::new("me", false);
        let out = render_to_string(&mut r, &[ConversationEntry::human("me", "hello")]);
        assert!(out.starts_with('['));
        assert!(out.ends_with("] you: hello\n"), "got {out:?}");
    }

    #[test]
    fn test_streaming_prints_only_suffix() {
        let mut r = Renderer::new("me", false);
        let mut entry = ConversationEntry::ai_streaming("Hel");

        let first = render_to_string(&mut r, std::slice::from_ref(&entry));
        assert!(first.ends_with("] ai: Hel"));

        entry.text.push_str("lo");
        assert_eq!(render_to_string(&mut r, std::slice::from_ref(&entry)), "lo");

        entry.seal();
        assert_eq!(render_to_string(&mut r, std::slice::from_ref(&entry)), "\n");

        assert_eq!(render_to_string(&mut r, std::slice::from_ref(&entry)), "");
    }

    #[test]
    fn test_new_entry_terminates_open_line() {
        let mut r = Renderer::new("me", false);
        let open = ConversationEntry::ai_streaming("partial");
        render_to_string(&mut r, std::slice::from_ref(&open));

        let err = ConversationEntry::error("system", "boom");
        let out = render_to_string(&mut r, &[open, err]);
        assert!(out.starts_with("\n! ["), "got {out:?}");
        assert!(out.ends_with("] system: boom\n"));
    }

    #[test]
    fn test_tool_calls_hidden_by_default() {
        let mut r = Renderer::new("me", false);
        let tool = ConversationEntry::tool("search", json!({"q": "rust"}));
        let out = render_to_string(&mut r, &[tool]);
        assert!(out.ends_with("] ai: Tool call: search\n"));
    }

    #[test]
    fn test_tool_calls_shown_with_args() {
        let mut r = Renderer::new("me", true);
        let tool = ConversationEntry::tool("search", Value::String("{\"q\":\"rust\"}".into()));
        let out = render_to_string(&mut r, &[tool]);
        assert!(out.contains("] ai: ⚙ search\n"));
        assert!(out.contains("\"q\": \"rust\""));
    }

    #[test]
    fn test_pretty_args_variants() {
        assert_eq!(pretty_args(&Value::Null), None);
        assert_eq!(pretty_args(&json!("")), None);
        assert_eq!(pretty_args(&json!("not json")).as_deref(), Some("not json"));
        assert_eq!(
            pretty_args(&json!({"a": 1})).as_deref(),
            Some("{\n  \"a\": 1\n}")
        );
    }
}
