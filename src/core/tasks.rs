use crate::core::platform::{same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{
    Role, SosAlert, SosStatus, Task, TaskNote, TaskReport, TaskStatus, User,
};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use chrono::Utc;
use serde_json::json;

fn find_task<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| PlatformError::not_found("task", id))
}

fn is_assignee(task: &Task, actor: &User) -> bool {
    task.volunteer
        .as_deref()
        .is_some_and(|v| same_user(v, &actor.email))
}

/// "{d}d {h}h", or "{h}h" under a day.
pub fn completion_time(task: &Task) -> Option<String> {
    let completed = task.completed_at?;
    let elapsed = completed - task.created_at;
    let hours = elapsed.num_hours().max(0);
    let (days, hours) = (hours / 24, hours % 24);
    Some(if days > 0 {
        format!("{}d {}h", days, hours)
    } else {
        format!("{}h", hours)
    })
}

impl<S: Storage> Platform<S> {
    pub async fn claim_task(&self, actor: &User, id: &str) -> Result<Task> {
        if !actor.is_responder() {
            return Err(PlatformError::denied("claim tasks", actor.role));
        }
        let task = self
            .store
            .update(names::TASKS, |tasks: &mut Vec<Task>| {
                let task = find_task(tasks, id)?;
                if !matches!(task.status, TaskStatus::Pending | TaskStatus::Assigned) {
                    return Err(PlatformError::transition("task", task.status, TaskStatus::InProgress));
                }
                if task.volunteer.is_some() && !is_assignee(task, actor) {
                    return Err(PlatformError::conflict(format!(
                        "task {} is already claimed",
                        task.id
                    )));
                }
                task.volunteer = Some(actor.email.clone());
                task.status = TaskStatus::InProgress;
                Ok(task.clone())
            })
            .await?;
        tracing::info!("{} claimed task {}", actor.email, task.id);
        Ok(task)
    }

    pub async fn update_task_status(&self, actor: &User, id: &str, status: TaskStatus) -> Result<Task> {
        let now = Utc::now();
        let task = self
            .store
            .update(names::TASKS, |tasks: &mut Vec<Task>| {
                let task = find_task(tasks, id)?;
                if !is_assignee(task, actor) && actor.role != Role::Admin {
                    return Err(PlatformError::denied("update this task", actor.role));
                }
                if task.status == TaskStatus::Completed {
                    return Err(PlatformError::transition("task", task.status, status));
                }
                task.status = status;
                if status == TaskStatus::Completed {
                    task.completed_at = Some(now);
                }
                Ok(task.clone())
            })
            .await?;

        if task.status == TaskStatus::Completed {
            if let Some(sos_id) = &task.sos_id {
                let alerts: Vec<SosAlert> = self.store.load(names::SOS).await?;
                let dispatched = alerts
                    .iter()
                    .any(|s| &s.id == sos_id && s.status == SosStatus::Dispatched);
                if dispatched {
                    self.resolve_linked_sos(actor, sos_id).await?;
                }
            }
        }
        self.audit(
            "task_status",
            Some(actor),
            json!({ "id": task.id, "status": task.status }),
        )
        .await?;
        Ok(task)
    }

    /// Resolves an SOS on behalf of whoever completed its task, without the
    /// assignee check `resolve_sos` applies.
    async fn resolve_linked_sos(&self, actor: &User, sos_id: &str) -> Result<()> {
        let now = Utc::now();
        self.store
            .update(names::SOS, |alerts: &mut Vec<SosAlert>| {
                if let Some(sos) = alerts
                    .iter_mut()
                    .find(|s| s.id == sos_id && s.status == SosStatus::Dispatched)
                {
                    sos.status = SosStatus::Resolved;
                    sos.resolved_at = Some(now);
                    sos.resolved_by = Some(actor.email.clone());
                }
                Ok(())
            })
            .await?;
        tracing::info!("SOS {} resolved through its task by {}", sos_id, actor.email);
        Ok(())
    }

    pub async fn add_task_note(&self, actor: &User, id: &str, text: &str) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlatformError::validation("note cannot be empty"));
        }
        self.store
            .update(names::TASKS, |tasks: &mut Vec<Task>| {
                let task = find_task(tasks, id)?;
                if !is_assignee(task, actor) && actor.role != Role::Admin {
                    return Err(PlatformError::denied("add notes to this task", actor.role));
                }
                task.notes.push(TaskNote {
                    author: actor.email.clone(),
                    text: text.to_string(),
                    time: Utc::now(),
                });
                Ok(task.clone())
            })
            .await
    }

    pub async fn submit_report(&self, actor: &User, id: &str, report: TaskReport) -> Result<Task> {
        if report.notes.trim().is_empty() {
            return Err(PlatformError::validation("report notes cannot be empty"));
        }
        self.store
            .update(names::TASKS, |tasks: &mut Vec<Task>| {
                let task = find_task(tasks, id)?;
                if !is_assignee(task, actor) && actor.role != Role::Admin {
                    return Err(PlatformError::denied("report on this task", actor.role));
                }
                if task.status != TaskStatus::Completed {
                    return Err(PlatformError::validation(format!(
                        "task {} must be completed before reporting",
                        task.id
                    )));
                }
                if task.submission.is_some() {
                    return Err(PlatformError::conflict(format!(
                        "task {} already has a report",
                        task.id
                    )));
                }
                task.submission = Some(TaskReport {
                    submitted_by: actor.email.clone(),
                    submitted_at: Some(Utc::now()),
                    ..report
                });
                Ok(task.clone())
            })
            .await
    }

    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.store.load(names::TASKS).await
    }

    pub async fn my_tasks(&self, actor: &User) -> Result<Vec<Task>> {
        let mut tasks = self.tasks().await?;
        tasks.retain(|t| is_assignee(t, actor));
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Unfinished tasks, highest priority first.
    pub async fn open_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks = self.tasks().await?;
        tasks.retain(|t| t.status != TaskStatus::Completed);
        tasks.sort_by_key(|t| (t.priority as u8, t.created_at));
        Ok(tasks)
    }
}
