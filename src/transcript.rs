//! Append-only conversation transcript
//!
//! The transcript is the only shared state of a conversation. Participants
//! read it, the scheduler appends to it, and nothing ever rewrites an entry.

use crate::termination::StopReason;
use crate::tools::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Source name of the synthetic utterance that seeds every conversation
pub const TASK_SOURCE: &str = "task";

/// Identity of a participant, unique within one conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The pseudo-participant that authored the initial task
    pub fn task() -> Self {
        Self(TASK_SOURCE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_task(&self) -> bool {
        self.0 == TASK_SOURCE
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Result of a single tool execution, as recorded in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    Failure(ToolError),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Text handed back to the model: the output, or the rendered error
    pub fn content(&self) -> String {
        match self {
            ToolOutcome::Success(output) => output.clone(),
            ToolOutcome::Failure(error) => error.to_string(),
        }
    }
}

impl From<Result<String, ToolError>> for ToolOutcome {
    fn from(result: Result<String, ToolError>) -> Self {
        match result {
            Ok(output) => ToolOutcome::Success(output),
            Err(error) => ToolOutcome::Failure(error),
        }
    }
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    /// A turn produced by a participant (or the seeding task)
    Utterance { source: ParticipantId, text: String },

    /// A participant asked for a tool to be run
    ToolCall {
        source: ParticipantId,
        tool_name: String,
        arguments: Map<String, Value>,
    },

    /// Result of the immediately preceding tool call
    ToolResult {
        tool_name: String,
        outcome: ToolOutcome,
    },

    /// Terminal marker; nothing may follow it
    StopSignal { reason: StopReason },
}

impl Entry {
    pub fn utterance(source: impl Into<ParticipantId>, text: impl Into<String>) -> Self {
        Entry::Utterance {
            source: source.into(),
            text: text.into(),
        }
    }

    /// The seed utterance for a conversation
    pub fn task(text: impl Into<String>) -> Self {
        Entry::Utterance {
            source: ParticipantId::task(),
            text: text.into(),
        }
    }

    /// Participant that produced this entry, if it has one
    pub fn source(&self) -> Option<&ParticipantId> {
        match self {
            Entry::Utterance { source, .. } | Entry::ToolCall { source, .. } => Some(source),
            Entry::ToolResult { .. } | Entry::StopSignal { .. } => None,
        }
    }

    pub fn is_utterance(&self) -> bool {
        matches!(self, Entry::Utterance { .. })
    }
}

/// Violations of the transcript's append-only contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("transcript is closed by a stop signal ({reason})")]
    Sealed { reason: StopReason },
    #[error("tool result for {tool_name} has no matching tool call")]
    UnmatchedToolResult { tool_name: String },
}

/// Ordered, append-only sequence of entries for one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcript holding only the seed utterance for `task`
    pub fn seeded(task: impl Into<String>) -> Self {
        Self {
            entries: vec![Entry::task(task)],
        }
    }

    /// Append an entry, enforcing the stop-signal and tool-result invariants
    pub fn append(&mut self, entry: Entry) -> Result<&Entry, TranscriptError> {
        if let Some(reason) = self.stop_reason() {
            return Err(TranscriptError::Sealed { reason });
        }

        if let Entry::ToolResult { tool_name, .. } = &entry {
            let matched = matches!(
                self.entries.last(),
                Some(Entry::ToolCall { tool_name: called, .. }) if called == tool_name
            );
            if !matched {
                return Err(TranscriptError::UnmatchedToolResult {
                    tool_name: tool_name.clone(),
                });
            }
        }

        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Source and text of the most recent utterance
    pub fn last_utterance(&self) -> Option<(&ParticipantId, &str)> {
        self.entries.iter().rev().find_map(|entry| match entry {
            Entry::Utterance { source, text } => Some((source, text.as_str())),
            _ => None,
        })
    }

    /// All utterances, in order, excluding the seed task
    pub fn utterances(&self) -> impl Iterator<Item = (&ParticipantId, &str)> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Utterance { source, text } if !source.is_task() => {
                Some((source, text.as_str()))
            }
            _ => None,
        })
    }

    /// Reason recorded by the stop signal, once one has been appended
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.entries.last() {
            Some(Entry::StopSignal { reason }) => Some(*reason),
            _ => None,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.stop_reason().is_some()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
