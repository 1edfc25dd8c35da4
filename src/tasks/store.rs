//! Task Store
//!
//! Lock-protected map of every task. Reads are scoped to the caller's
//! session and fail closed: a task owned by another session is reported as
//! not found.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{BlockStats, Task, TaskError};

#[derive(Clone, Default)]
pub struct TaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id, task);
    }

    /// Task snapshot, if owned by `session`
    pub async fn get(&self, session: &str, id: Uuid) -> Result<Task, TaskError> {
        self.tasks
            .read()
            .await
            .get(&id)
            .filter(|t| t.session == session)
            .cloned()
            .ok_or(TaskError::NotFound(id))
    }

    /// All tasks of a session, oldest first
    pub async fn list(&self, session: &str) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.session == session)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Apply `f` to a non-terminal task. Returns false when the task is
    /// unknown or already completed/failed.
    pub async fn update(&self, id: Uuid, f: impl FnOnce(&mut Task)) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&id) {
            Some(task) if !task.status.is_terminal() => {
                f(task);
                true
            }
            _ => false,
        }
    }

    /// Record block counters; progress only moves forward
    pub async fn record_progress(&self, id: Uuid, stats: &BlockStats) {
        let progress = if stats.total == 0 {
            0.0
        } else {
            stats.completed() as f64 / stats.total as f64
        };
        self.update(id, |task| {
            task.progress = task.progress.max(progress.min(1.0));
            task.stats = stats.clone();
        })
        .await;
    }

    /// Drop every task of a session, returning their ids
    pub async fn remove_session(&self, session: &str) -> Vec<Uuid> {
        let mut tasks = self.tasks.write().await;
        let ids: Vec<Uuid> = tasks
            .values()
            .filter(|t| t.session == session)
            .map(|t| t.id)
            .collect();
        for id in &ids {
            tasks.remove(id);
        }
        ids
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentFormat, GenerateMode, OutputFormat};
    use crate::provider::{ProviderConfig, ProviderKind};
    use crate::tasks::TaskStatus;

    fn task(session: &str) -> Task {
        Task::new(
            session,
            "book.epub",
            DocumentFormat::Epub,
            OutputFormat::Epub,
            "de",
            GenerateMode::Bilingual,
            &ProviderConfig::new(ProviderKind::Ollama, "qwen2.5"),
        )
    }

    #[tokio::test]
    async fn test_get_fails_closed_across_sessions() {
        let store = TaskStore::new();
        let owned = task("alice");
        let id = owned.id;
        store.insert(owned).await;

        assert!(store.get("alice", id).await.is_ok());
        assert!(matches!(store.get("bob", id).await, Err(TaskError::NotFound(_))));
        assert!(store.list("bob").await.is_empty());
        assert_eq!(store.list("alice").await.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = TaskStore::new();
        let t = task("alice");
        let id = t.id;
        store.insert(t).await;

        let mut stats = BlockStats {
            total: 4,
            translated: 3,
            ..Default::default()
        };
        store.record_progress(id, &stats).await;
        stats.translated = 1;
        store.record_progress(id, &stats).await;

        assert_eq!(store.get("alice", id).await.unwrap().progress, 0.75);
    }

    #[tokio::test]
    async fn test_terminal_tasks_are_frozen() {
        let store = TaskStore::new();
        let t = task("alice");
        let id = t.id;
        store.insert(t).await;

        assert!(store.update(id, |t| t.status = TaskStatus::Failed).await);
        assert!(!store.update(id, |t| t.status = TaskStatus::Processing).await);
        assert_eq!(store.get("alice", id).await.unwrap().status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_remove_session() {
        let store = TaskStore::new();
        store.insert(task("alice")).await;
        store.insert(task("alice")).await;
        store.insert(task("bob")).await;

        assert_eq!(store.remove_session("alice").await.len(), 2);
        assert_eq!(store.len().await, 1);
    }
}
