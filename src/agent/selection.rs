//! Tool selection and argument building for the planner
//!
//! Selection walks [`SELECTION_RULES`] in declared order and picks every
//! tool whose condition matches and that the manifest actually offers.
//! Arguments come from a per-tool builder: known tools get bespoke
//! extraction, anything else falls back to a metadata field named after
//! the tool id.

use crate::error::{AgentError, Result};
use crate::types::{Args, Metadata, ToolManifest};
use serde_json::Value;

/// Tools with bespoke selection rules and argument builders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownTool {
    SyncGetStatus,
    SyncQueuePush,
    SyncQueuePull,
    ClickupCreateTask,
    ClickupGetTask,
    Context7ResolveLibraryId,
    Context7GetLibraryDocs,
    FilesystemFindFile,
    FilesystemReadFile,
    FilesystemWriteFile,
}

impl KnownTool {
    pub const ALL: [KnownTool; 10] = [
        KnownTool::SyncGetStatus,
        KnownTool::SyncQueuePush,
        KnownTool::SyncQueuePull,
        KnownTool::ClickupCreateTask,
        KnownTool::ClickupGetTask,
        KnownTool::Context7ResolveLibraryId,
        KnownTool::Context7GetLibraryDocs,
        KnownTool::FilesystemFindFile,
        KnownTool::FilesystemReadFile,
        KnownTool::FilesystemWriteFile,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            KnownTool::SyncGetStatus => "sync_get_status",
            KnownTool::SyncQueuePush => "sync_queue_push",
            KnownTool::SyncQueuePull => "sync_queue_pull",
            KnownTool::ClickupCreateTask => "clickup_create_task",
            KnownTool::ClickupGetTask => "clickup_get_task",
            KnownTool::Context7ResolveLibraryId => "context7_resolve_library_id",
            KnownTool::Context7GetLibraryDocs => "context7_get_library_docs",
            KnownTool::FilesystemFindFile => "filesystem_find_file",
            KnownTool::FilesystemReadFile => "filesystem_read_file",
            KnownTool::FilesystemWriteFile => "filesystem_write_file",
        }
    }

    pub fn from_id(tool_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == tool_id)
    }

    /// Derive arguments, or `None` when required metadata is missing
    pub fn build_args(self, command: &str, metadata: Option<&Metadata>) -> Option<Args> {
        let mut args = Args::new();
        match self {
            KnownTool::SyncGetStatus => {}
            KnownTool::SyncQueuePush => {
                let path = truthy(metadata, "path")?;
                args.insert("path".into(), path.clone());
                put(&mut args, "hash", present(metadata, "hash").cloned());
                put(&mut args, "remoteId", present(metadata, "remoteId").cloned());
            }
            KnownTool::SyncQueuePull => {
                put(&mut args, "since", present(metadata, "since").cloned());
            }
            KnownTool::ClickupCreateTask => {
                args.insert("name".into(), or_command(metadata, "taskName", command));
                put(&mut args, "description", present(metadata, "description").cloned());
                args.insert("status".into(), or_str(metadata, "status", "todo"));
            }
            KnownTool::ClickupGetTask => {
                let id = truthy(metadata, "taskId")?;
                args.insert("id".into(), id.clone());
            }
            KnownTool::Context7ResolveLibraryId => {
                args.insert("libraryName".into(), or_command(metadata, "libraryName", command));
            }
            KnownTool::Context7GetLibraryDocs => {
                args.insert(
                    "context7CompatibleLibraryID".into(),
                    or_str(metadata, "context7CompatibleLibraryID", "/mock/library/docs"),
                );
                put(&mut args, "topic", present(metadata, "topic").cloned());
                put(&mut args, "tokens", present(metadata, "tokens").cloned());
            }
            KnownTool::FilesystemFindFile => {
                args.insert("query".into(), or_command(metadata, "query", command));
                args.insert(
                    "limit".into(),
                    present(metadata, "limit").cloned().unwrap_or_else(|| Value::from(20)),
                );
            }
            KnownTool::FilesystemReadFile => {
                let path = truthy(metadata, "path")?;
                args.insert("path".into(), path.clone());
                args.insert("encoding".into(), or_str(metadata, "encoding", "utf-8"));
            }
            KnownTool::FilesystemWriteFile => {
                let path = truthy(metadata, "path")?;
                let content = present(metadata, "content").filter(|v| v.is_string())?;
                args.insert("path".into(), path.clone());
                args.insert("content".into(), content.clone());
                args.insert("encoding".into(), or_str(metadata, "encoding", "utf-8"));
            }
        }
        Some(args)
    }
}

/// When a selection rule fires
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// Any keyword occurs in the lower-cased command
    Keywords(&'static [&'static str]),
    /// Metadata field is present and truthy
    MetadataPresent(&'static str),
    /// Any nested condition matches
    Any(&'static [Condition]),
}

impl Condition {
    pub fn matches(&self, lower_command: &str, metadata: Option<&Metadata>) -> bool {
        match self {
            Condition::Keywords(words) => words.iter().any(|w| lower_command.contains(w)),
            Condition::MetadataPresent(key) => truthy(metadata, key).is_some(),
            Condition::Any(conditions) => conditions
                .iter()
                .any(|c| c.matches(lower_command, metadata)),
        }
    }
}

/// A tool paired with the condition that selects it
#[derive(Debug, Clone, Copy)]
pub struct SelectionRule {
    pub tool: KnownTool,
    pub condition: Condition,
}

const SYNC_WORDS: &[&str] = &["sync", "synchronise", "synchronize", "upload", "download"];
const DOC_WORDS: &[&str] = &["doc", "documentation", "api", "library"];

/// Selection rules, evaluated in this order
pub const SELECTION_RULES: &[SelectionRule] = &[
    SelectionRule {
        tool: KnownTool::SyncGetStatus,
        condition: Condition::Keywords(SYNC_WORDS),
    },
    SelectionRule {
        tool: KnownTool::SyncQueuePush,
        condition: Condition::Keywords(&["upload", "push"]),
    },
    SelectionRule {
        tool: KnownTool::SyncQueuePull,
        condition: Condition::Keywords(&["pull", "download"]),
    },
    SelectionRule {
        tool: KnownTool::ClickupCreateTask,
        condition: Condition::Keywords(&["task", "clickup", "todo"]),
    },
    SelectionRule {
        tool: KnownTool::ClickupGetTask,
        condition: Condition::MetadataPresent("taskId"),
    },
    SelectionRule {
        tool: KnownTool::Context7ResolveLibraryId,
        condition: Condition::Keywords(DOC_WORDS),
    },
    SelectionRule {
        tool: KnownTool::Context7GetLibraryDocs,
        condition: Condition::Keywords(DOC_WORDS),
    },
    SelectionRule {
        tool: KnownTool::FilesystemFindFile,
        condition: Condition::Keywords(&["file", "note", "find", "search"]),
    },
    SelectionRule {
        tool: KnownTool::FilesystemReadFile,
        condition: Condition::MetadataPresent("path"),
    },
    SelectionRule {
        tool: KnownTool::FilesystemWriteFile,
        condition: Condition::Any(&[
            Condition::MetadataPresent("content"),
            Condition::Keywords(&["write", "create"]),
        ]),
    },
];

/// Pick tools for `command` from `manifest`
///
/// Each tool is selected at most once, in rule order. When no rule
/// matches, the first manifest entry is used so a non-empty registry
/// always gets something to do.
pub fn select_tools(
    manifest: &[ToolManifest],
    command: &str,
    metadata: Option<&Metadata>,
) -> Vec<ToolManifest> {
    let lower = command.to_lowercase();
    let mut selected: Vec<ToolManifest> = Vec::new();

    for rule in SELECTION_RULES {
        if !rule.condition.matches(&lower, metadata) {
            continue;
        }
        let id = rule.tool.id();
        if selected.iter().any(|t| t.tool_id == id) {
            continue;
        }
        if let Some(tool) = manifest.iter().find(|t| t.tool_id == id) {
            selected.push(tool.clone());
        }
    }

    if selected.is_empty() {
        if let Some(first) = manifest.first() {
            selected.push(first.clone());
        }
    }

    selected
}

/// Derive arguments for any tool id
///
/// `Ok(None)` means required data is missing and the tool must be
/// skipped. Unknown tools take `metadata[tool_id]` when it is an object,
/// or empty args when it is absent; any other shape is an error.
pub fn build_args(tool_id: &str, command: &str, metadata: Option<&Metadata>) -> Result<Option<Args>> {
    if let Some(known) = KnownTool::from_id(tool_id) {
        return Ok(known.build_args(command, metadata));
    }

    match present(metadata, tool_id) {
        None => Ok(Some(Args::new())),
        Some(Value::Object(args)) => Ok(Some(args.clone())),
        Some(other) => Err(AgentError::InvalidArguments {
            tool_id: tool_id.to_string(),
            reason: format!("metadata field must be an object, got {}", json_kind(other)),
        }),
    }
}

/// Step description: the manifest text, or a synthesized one
pub fn describe_step(tool: &ToolManifest, command: &str) -> String {
    if tool.description.is_empty() {
        format!("Run {} for command \"{}\"", tool.tool_id, command)
    } else {
        tool.description.clone()
    }
}

/// Metadata value that is neither missing nor null
fn present<'a>(metadata: Option<&'a Metadata>, key: &str) -> Option<&'a Value> {
    metadata?.get(key).filter(|v| !v.is_null())
}

/// Metadata value that is present and not false, zero, or empty text
fn truthy<'a>(metadata: Option<&'a Metadata>, key: &str) -> Option<&'a Value> {
    present(metadata, key).filter(|v| match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn or_command(metadata: Option<&Metadata>, key: &str, command: &str) -> Value {
    present(metadata, key)
        .cloned()
        .unwrap_or_else(|| Value::from(command))
}

fn or_str(metadata: Option<&Metadata>, key: &str, default: &str) -> Value {
    present(metadata, key)
        .cloned()
        .unwrap_or_else(|| Value::from(default))
}

fn put(args: &mut Args, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        args.insert(key.to_string(), value);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
