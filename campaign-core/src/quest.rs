//! Quest tracking.

use crate::ids::RecordId;
use crate::journal::{LogEntry, LogKind};
use serde::{Deserialize, Serialize};

/// Status of a quest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl QuestStatus {
    fn verb(self) -> &'static str {
        match self {
            QuestStatus::Active => "reopened",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        }
    }
}

/// A single step of a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

impl Objective {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }
}

/// A quest with ordered objectives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullQuest {
    #[serde(default)]
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: QuestStatus,
    #[serde(default)]
    pub objectives: Vec<Objective>,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub reward: String,
}

impl FullQuest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            title: title.into(),
            description: String::new(),
            status: QuestStatus::Active,
            objectives: Vec::new(),
            threats: Vec::new(),
            reward: String::new(),
        }
    }

    pub fn with_objective(mut self, text: impl Into<String>) -> Self {
        self.objectives.push(Objective::new(text));
        self
    }

    pub fn with_reward(mut self, reward: impl Into<String>) -> Self {
        self.reward = reward.into();
        self
    }

    /// Change the status. Returns a log entry for a real transition, `None`
    /// when the status was already `status`.
    pub fn set_status(&mut self, status: QuestStatus) -> Option<LogEntry> {
        if self.status == status {
            return None;
        }
        self.status = status;
        Some(LogEntry::new(
            LogKind::Quest,
            format!("Quest '{}' {}", self.title, status.verb()),
        ))
    }

    /// Flip an objective's done flag. Returns the new value.
    pub fn toggle_objective(&mut self, index: usize) -> Option<bool> {
        let objective = self.objectives.get_mut(index)?;
        objective.done = !objective.done;
        Some(objective.done)
    }

    /// (done, total) objectives.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.objectives.iter().filter(|o| o.done).count();
        (done, self.objectives.len())
    }
}

/// All quests in the campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestLog {
    quests: Vec<FullQuest>,
}

impl QuestLog {
    pub fn all(&self) -> &[FullQuest] {
        &self.quests
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Add a quest, replacing one with the same id.
    pub fn add(&mut self, quest: FullQuest) {
        match self.quests.iter_mut().find(|q| q.id == quest.id) {
            Some(existing) => *existing = quest,
            None => self.quests.push(quest),
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&FullQuest> {
        self.quests.iter().find(|q| q.id == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut FullQuest> {
        self.quests.iter_mut().find(|q| q.id == id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&FullQuest> {
        let title = title.trim().to_lowercase();
        self.quests
            .iter()
            .find(|q| q.title.trim().to_lowercase() == title)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<FullQuest> {
        let index = self.quests.iter().position(|q| q.id == id)?;
        Some(self.quests.remove(index))
    }

    pub fn active(&self) -> impl Iterator<Item = &FullQuest> {
        self.quests
            .iter()
            .filter(|q| q.status == QuestStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transition_logs_once() {
        let mut quest = FullQuest::new("Rats in the Cellar");
        let entry = quest.set_status(QuestStatus::Completed).unwrap();
        assert_eq!(entry.kind, LogKind::Quest);
        assert_eq!(entry.text, "Quest 'Rats in the Cellar' completed");

        assert!(quest.set_status(QuestStatus::Completed).is_none());
        assert_eq!(quest.status, QuestStatus::Completed);
    }

    #[test]
    fn test_objectives_progress() {
        let mut quest = FullQuest::new("Escort")
            .with_objective("Meet the caravan")
            .with_objective("Reach the pass");

        assert_eq!(quest.progress(), (0, 2));
        assert_eq!(quest.toggle_objective(1), Some(true));
        assert_eq!(quest.progress(), (1, 2));
        assert_eq!(quest.toggle_objective(1), Some(false));
        assert_eq!(quest.toggle_objective(9), None);
    }

    #[test]
    fn test_quest_log() {
        let mut log = QuestLog::default();
        let quest = FullQuest::new("Lost Ring");
        let id = quest.id;
        log.add(quest);
        log.add(FullQuest::new("Dragon"));

        log.get_mut(id)
            .unwrap()
            .set_status(QuestStatus::Failed)
            .unwrap();
        assert_eq!(log.active().count(), 1);
        assert_eq!(log.find_by_title("lost ring").unwrap().id, id);
    }

    #[test]
    fn test_find_cyrillic_title() {
        let mut log = QuestLog::default();
        let quest = FullQuest::new("Таинственная башня");
        let id = quest.id;
        log.add(quest);
        assert_eq!(log.find_by_title(" таинственная БАШНЯ ").unwrap().id, id);
    }
}
