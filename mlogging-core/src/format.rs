use std::{fmt::Write, path::Path, sync::Arc};

use chrono::{DateTime, Utc};

use crate::level::Level;

pub const DEFAULT_FORMAT: &str = "{time} {module} {name} {level} {message}";

/// A single log record, captured when it is emitted.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub name: Arc<str>,
    pub module: String,
    pub message: String,
}

impl Record {
    pub fn new(level: Level, name: Arc<str>, module: String, message: String) -> Self {
        Self {
            time: Utc::now(),
            level,
            name,
            module,
            message,
        }
    }
}

/// Module name of a source file, i.e. its stem.
pub fn module_of(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Time,
    Module,
    Name,
    Level,
    Message,
}

/// A compiled line template.
///
/// Recognised placeholders are `{time}`, `{module}`, `{name}`, `{level}`
/// and `{message}`. Anything else, unknown placeholders included, is kept
/// as literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    template: String,
    segments: Vec<Segment>,
}

impl FormatSpec {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = compile(&template);
        Self { template, segments }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, record: &Record, colorize: bool) -> String {
        let mut line = String::with_capacity(self.template.len() + record.message.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Time => {
                    let _ = write!(line, "{}", record.time.format("%Y-%m-%dT%H:%M:%S%.3f"));
                }
                Segment::Module => line.push_str(&record.module),
                Segment::Name => line.push_str(&record.name),
                Segment::Level if colorize => {
                    let _ = write!(line, "{}", record.level.colored());
                }
                Segment::Level => line.push_str(record.level.as_str()),
                Segment::Message => line.push_str(&record.message),
            }
        }
        line
    }
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self::new(DEFAULT_FORMAT)
    }
}

impl From<&str> for FormatSpec {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

impl From<String> for FormatSpec {
    fn from(template: String) -> Self {
        Self::new(template)
    }
}

fn compile(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        literal.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('}') else {
            rest = after;
            break;
        };
        let placeholder = match &after[1..end] {
            "time" => Some(Segment::Time),
            "module" => Some(Segment::Module),
            "name" => Some(Segment::Name),
            "level" => Some(Segment::Level),
            "message" => Some(Segment::Message),
            _ => None,
        };
        match placeholder {
            Some(segment) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(segment);
            }
            None => literal.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: Level, message: &str) -> Record {
        Record::new(level, "a.b.c".into(), "worker".into(), message.into())
    }

    #[test]
    fn test_default_format_fields() {
        let line = FormatSpec::default().render(&record(Level::Warning, "hi there"), false);
        let fields: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(fields[1..5], ["worker", "a.b.c", "WARNING", "hi"]);
        assert_eq!(fields[5], "there");
    }

    #[test]
    fn test_message_only() {
        let spec = FormatSpec::new("{message}");
        assert_eq!(spec.render(&record(Level::Info, "some info"), false), "some info");
    }

    #[test]
    fn test_unknown_placeholders_are_literal() {
        let spec = FormatSpec::new("[{level}] {pid} {message} {");
        assert_eq!(
            spec.render(&record(Level::Error, "boom"), false),
            "[ERROR] {pid} boom {"
        );
    }

    #[test]
    fn test_module_of() {
        assert_eq!(module_of("src/bin/worker.rs"), "worker");
        assert_eq!(module_of(""), "");
    }
}
