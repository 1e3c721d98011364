//! Notes and the narrative campaign log.

use crate::ids::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-form GM note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            title: title.into(),
            body: body.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Category of a log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Quest,
    Travel,
    Combat,
    Party,
    #[default]
    General,
}

/// One entry in the campaign log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default)]
    pub id: RecordId,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub kind: LogKind,
    pub text: String,
}

impl LogEntry {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            at: Utc::now(),
            kind,
            text: text.into(),
        }
    }
}

/// GM notes, most recently created last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notebook {
    notes: Vec<Note>,
}

impl Notebook {
    pub fn all(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: RecordId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn add(&mut self, note: Note) -> RecordId {
        let id = note.id;
        self.notes.push(note);
        id
    }

    /// Replace title and body; bumps `updated_at`.
    pub fn edit(
        &mut self,
        id: RecordId,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> bool {
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.title = title.into();
                note.body = body.into();
                note.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: RecordId) -> Option<Note> {
        let index = self.notes.iter().position(|n| n.id == id)?;
        Some(self.notes.remove(index))
    }

    /// Notes whose title or body contains `needle` (case-insensitive).
    pub fn search<'a>(&'a self, needle: &str) -> Vec<&'a Note> {
        let needle = needle.to_lowercase();
        self.notes
            .iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&needle) || n.body.to_lowercase().contains(&needle)
            })
            .collect()
    }
}

/// Append-only narrative log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignLog {
    entries: Vec<LogEntry>,
}

impl CampaignLog {
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn record(&mut self, kind: LogKind, text: impl Into<String>) {
        self.push(LogEntry::new(kind, text));
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notebook_crud() {
        let mut notebook = Notebook::default();
        let id = notebook.add(Note::new("Session 1", "The party met in a tavern."));
        let created = notebook.get(id).unwrap().created_at;

        assert!(notebook.edit(id, "Session 1", "The party met in a ruined tavern."));
        let note = notebook.get(id).unwrap();
        assert!(note.body.contains("ruined"));
        assert!(note.updated_at >= created);

        assert_eq!(notebook.search("RUINED").len(), 1);
        assert!(notebook.remove(id).is_some());
        assert!(notebook.all().is_empty());
    }

    #[test]
    fn test_log_recent() {
        let mut log = CampaignLog::default();
        for i in 0..5 {
            log.record(LogKind::General, format!("entry {i}"));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "entry 3");
        assert_eq!(log.recent(50).len(), 5);
    }
}
