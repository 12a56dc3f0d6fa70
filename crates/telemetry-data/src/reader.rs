//! JSONL script discovery and loading.
//!
//! A script is a recorded client session: one JSON object per line, each
//! naming an aggregator operation in its `"op"` field and optionally the
//! time it happened in `"at"`. Unparseable lines are logged and skipped.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use telemetry_core::error::{Result, TelemetryError};
use telemetry_core::time_utils::TimezoneHandler;
use tracing::{debug, warn};

// ── Script commands ───────────────────────────────────────────────────────────

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptCommand {
    JourneyStep {
        step: String,
        screen: String,
        #[serde(default)]
        data: Option<Value>,
    },
    Event {
        event: String,
        #[serde(default)]
        screen: Option<String>,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        duration: Option<f64>,
    },
    Chokepoint {
        name: String,
        success: bool,
        #[serde(default)]
        duration: Option<f64>,
        #[serde(default)]
        error: Option<String>,
    },
    Satisfaction {
        screen: String,
        rating: f64,
        #[serde(default)]
        feedback: Option<String>,
    },
    Conversion {
        conversion_type: String,
        screen: String,
        #[serde(default)]
        data: Option<Value>,
    },
    Error {
        error: String,
        screen: String,
        #[serde(default)]
        context: Option<Value>,
    },
    Identify {
        user_id: String,
    },
    SignIn {
        user_id: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        display_name: Option<String>,
        token: String,
    },
    SignOut,
    Clear,
}

/// A command together with where it came from and when it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedCommand {
    pub at: Option<DateTime<Utc>>,
    pub command: ScriptCommand,
    pub source: PathBuf,
    /// 1-based line number within `source`.
    pub line: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all `.jsonl` files recursively under `dir`, sorted by path.
pub fn find_jsonl_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "jsonl")
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every command from a script file, or from all scripts under a
/// directory in path order.
pub fn load_commands(path: &Path, timezone: &TimezoneHandler) -> Result<Vec<TimedCommand>> {
    if !path.exists() {
        return Err(TelemetryError::DataPathNotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        let files = find_jsonl_files(path);
        if files.is_empty() {
            return Err(TelemetryError::NoDataFiles(path.to_path_buf()));
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut commands = Vec::new();
    for file in &files {
        commands.extend(load_file(file, timezone)?);
    }

    debug!(
        "Loaded {} commands from {} script files",
        commands.len(),
        files.len()
    );
    Ok(commands)
}

/// Parse one script file.
pub fn load_file(path: &Path, timezone: &TimezoneHandler) -> Result<Vec<TimedCommand>> {
    let file = std::fs::File::open(path).map_err(|source| TelemetryError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(std::io::BufReader::new(file), path, timezone)
}

/// Parse script lines from any reader. `source` is only used for reporting.
pub fn parse_script(
    reader: impl BufRead,
    source: &Path,
    timezone: &TimezoneHandler,
) -> Result<Vec<TimedCommand>> {
    let mut commands = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = match line_result {
            Ok(line) => line,
            // The undecodable line is already consumed; later lines still read.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!("Skipping {}:{}: {}", source.display(), line_no, e);
                continue;
            }
            Err(e) => {
                return Err(TelemetryError::FileRead {
                    path: source.to_path_buf(),
                    source: e,
                })
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }

        match parse_line(trimmed, timezone) {
            Ok((at, command)) => commands.push(TimedCommand {
                at,
                command,
                source: source.to_path_buf(),
                line: line_no,
            }),
            Err(e) => warn!(
                "Skipping {}:{}: {}",
                source.display(),
                line_no,
                e
            ),
        }
    }

    Ok(commands)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn parse_line(
    line: &str,
    timezone: &TimezoneHandler,
) -> Result<(Option<DateTime<Utc>>, ScriptCommand)> {
    let value: Value = serde_json::from_str(line)?;

    let at = match value.get("at") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(timezone.parse_timestamp(s)?),
        Some(other) => return Err(TelemetryError::TimestampParse(other.to_string())),
    };

    let command = serde_json::from_value(value)?;
    Ok((at, command))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn utc() -> TimezoneHandler {
        TimezoneHandler::new("UTC")
    }

    fn write_script(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_parse_every_op() {
        let script = r#"
{"op":"journey_step","step":"open_chat","screen":"Chat","at":"2024-05-01T12:00:00Z"}
{"op":"event","event":"tap_send","screen":"Chat","duration":12.5}
{"op":"chokepoint","name":"message_sending","success":false,"duration":300,"error":"timeout"}
{"op":"satisfaction","screen":"Chat","rating":5}
{"op":"conversion","conversion_type":"premium","screen":"Insights","data":{"plan":"annual"}}
{"op":"error","error":"network down","screen":"Chat"}
{"op":"identify","user_id":"u1"}
{"op":"sign_in","user_id":"u2","email":"a@b.c","token":"t0k"}
{"op":"sign_out"}
{"op":"clear"}
"#;
        let commands = parse_script(script.as_bytes(), Path::new("inline"), &utc()).unwrap();
        assert_eq!(commands.len(), 10);
        assert!(commands[0].at.is_some());
        assert!(commands[1].at.is_none());
        assert_eq!(commands[0].line, 2);
        assert_eq!(
            commands[2].command,
            ScriptCommand::Chokepoint {
                name: "message_sending".to_string(),
                success: false,
                duration: Some(300.0),
                error: Some("timeout".to_string()),
            }
        );
        assert_eq!(commands[8].command, ScriptCommand::SignOut);
        assert_eq!(commands[9].command, ScriptCommand::Clear);
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let script = concat!(
            "{\"op\":\"identify\",\"user_id\":\"u1\"}\n",
            "not json\n",
            "{\"op\":\"teleport\"}\n",
            "{\"op\":\"identify\"}\n",
            "{\"op\":\"clear\",\"at\":\"someday\"}\n",
            "// comment\n",
            "{\"op\":\"clear\"}\n",
        );
        let commands = parse_script(script.as_bytes(), Path::new("inline"), &utc()).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].line, 7);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let script: &[u8] = b"{\"op\":\"identify\",\"user_id\":\"u1\"}\n\
{\"op\":\"identify\",\"user_id\":\"\xff\xfe\"}\n\
{\"op\":\"clear\"}\n";
        let commands = parse_script(script, Path::new("inline"), &utc()).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].line, 1);
        assert_eq!(commands[1].command, ScriptCommand::Clear);
        assert_eq!(commands[1].line, 3);
    }

    #[test]
    fn test_load_missing_path() {
        let err = load_commands(Path::new("/definitely/not/here"), &utc()).unwrap_err();
        assert!(matches!(err, TelemetryError::DataPathNotFound(_)));
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = load_commands(dir.path(), &utc()).unwrap_err();
        assert!(matches!(err, TelemetryError::NoDataFiles(_)));
    }

    #[test]
    fn test_load_directory_in_path_order() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "b.jsonl", &[r#"{"op":"identify","user_id":"second"}"#]);
        write_script(
            dir.path(),
            "a/nested.jsonl",
            &[r#"{"op":"identify","user_id":"first"}"#],
        );
        write_script(dir.path(), "notes.txt", &["ignored"]);

        let commands = load_commands(dir.path(), &utc()).unwrap();
        let users: Vec<&str> = commands
            .iter()
            .map(|c| match &c.command {
                ScriptCommand::Identify { user_id } => user_id.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(users, vec!["first", "second"]);
    }

    #[test]
    fn test_load_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_script(
            dir.path(),
            "session.jsonl",
            &[r#"{"op":"journey_step","step":"a","screen":"App","at":"2024-05-01 12:00:00"}"#],
        );
        let commands = load_commands(&path, &utc()).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].source, path);
    }

    #[test]
    fn test_find_jsonl_files_sorted() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "z.jsonl", &[]);
        write_script(dir.path(), "m.jsonl", &[]);
        let files = find_jsonl_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("m.jsonl"));
    }
}
