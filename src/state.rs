//! UI state and the reducer that drives it.
//!
//! Every transition is `reduce(&state, event) -> (state, effects)`: the old
//! snapshot is never mutated, and any network work the transition needs is
//! returned as [`Effect`]s for the view-model to run. Completed calls come
//! back in as events, so the whole screen lifecycle is an ordered log of
//! events folded over [`UiState::new`].

use crate::api_result::ApiResult;
use crate::datetime::week_of;
use crate::models::{Task, TaskLog, TaskRequest};
use crate::parser::parse_draft;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
}

/// Started/finished marks. Starting a task opens a time log on the
/// service, finishing it closes that log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskProgress {
    pub started: bool,
    pub finished: bool,
    /// Log opened by the current start, once the service has created it.
    pub open_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetail {
    pub task_id: String,
    pub task: Loadable<Task>,
    pub logs: Loadable<Vec<TaskLog>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServerStatus {
    #[default]
    Unknown,
    Online(String),
    Offline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub draft: Draft,
    /// Set while the draft edits an existing task instead of a new one.
    pub editing: Option<String>,
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub error_message: Option<String>,
    pub selected_date: NaiveDate,
    pub calendar_dates: Vec<NaiveDate>,
    pub progress: HashMap<String, TaskProgress>,
    pub detail: Option<TaskDetail>,
    pub server: ServerStatus,
    list_seq: u64,
}

impl UiState {
    pub fn new(today: NaiveDate) -> Self {
        UiState {
            draft: Draft::default(),
            editing: None,
            tasks: Vec::new(),
            loading: false,
            error_message: None,
            selected_date: today,
            calendar_dates: week_of(today),
            progress: HashMap::new(),
            detail: None,
            server: ServerStatus::Unknown,
            list_seq: 0,
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn progress_of(&self, task_id: &str) -> TaskProgress {
        self.progress.get(task_id).cloned().unwrap_or_default()
    }
}

#[derive(Debug)]
pub enum Event {
    // intents
    UpdateTitle(String),
    UpdateDescription(String),
    Submit,
    FetchList,
    Delete(String),
    ClearError,
    SelectDate(NaiveDate),
    ToggleStart(String),
    ToggleFinish(String),
    OpenDetail(String),
    CloseDetail,
    BeginEdit(String),
    CancelEdit,
    CheckHealth,

    // completions
    TaskCreated(ApiResult<Task>),
    TaskUpdated {
        task_id: String,
        result: ApiResult<Task>,
    },
    ListLoaded {
        seq: u64,
        result: ApiResult<Vec<Task>>,
    },
    TaskDeleted {
        task_id: String,
        result: ApiResult<()>,
    },
    DetailLoaded {
        task_id: String,
        result: ApiResult<Task>,
    },
    LogsLoaded {
        task_id: String,
        result: ApiResult<Vec<TaskLog>>,
    },
    HealthChecked(ApiResult<String>),
    LogStarted {
        task_id: String,
        result: ApiResult<TaskLog>,
    },
    LogClosed {
        task_id: String,
        log_id: String,
        result: ApiResult<TaskLog>,
    },
    LogDiscarded {
        task_id: String,
        result: ApiResult<()>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CheckHealth,
    CreateTask(TaskRequest),
    UpdateTask {
        task_id: String,
        request: TaskRequest,
    },
    FetchList {
        seq: u64,
    },
    DeleteTask(String),
    FetchTask(String),
    FetchLogs(String),
    StartLog(String),
    CloseLog {
        task_id: String,
        log_id: String,
    },
    DiscardLog {
        task_id: String,
        log_id: String,
    },
}

pub fn reduce(state: &UiState, event: Event) -> (UiState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match event {
        Event::UpdateTitle(title) => next.draft.title = title,
        Event::UpdateDescription(description) => next.draft.description = description,
        Event::Submit => match parse_draft(&next.draft) {
            Ok(request) => {
                next.loading = true;
                next.error_message = None;
                match next.editing.clone() {
                    Some(task_id) => effects.push(Effect::UpdateTask { task_id, request }),
                    None => effects.push(Effect::CreateTask(request)),
                }
            }
            Err(err) => next.error_message = Some(err.to_string()),
        },
        Event::FetchList => start_list_fetch(&mut next, &mut effects),
        Event::Delete(task_id) => effects.push(Effect::DeleteTask(task_id)),
        Event::ClearError => next.error_message = None,
        Event::SelectDate(date) => next.selected_date = date,
        Event::ToggleStart(task_id) => {
            if next.task(&task_id).is_some() {
                let progress = next.progress.entry(task_id.clone()).or_default();
                progress.started = !progress.started;
                if progress.started {
                    progress.finished = false;
                    effects.push(Effect::StartLog(task_id));
                } else if let Some(log_id) = progress.open_log.take() {
                    effects.push(Effect::DiscardLog { task_id, log_id });
                }
            }
        }
        Event::ToggleFinish(task_id) => {
            if next.task(&task_id).is_some() {
                let progress = next.progress.entry(task_id.clone()).or_default();
                progress.finished = !progress.finished;
                if progress.finished {
                    if let Some(log_id) = progress.open_log.take() {
                        effects.push(Effect::CloseLog { task_id, log_id });
                    }
                }
            }
        }
        Event::OpenDetail(task_id) => {
            effects.push(Effect::FetchTask(task_id.clone()));
            effects.push(Effect::FetchLogs(task_id.clone()));
            next.detail = Some(TaskDetail {
                task_id,
                task: Loadable::Loading,
                logs: Loadable::Loading,
            });
        }
        Event::CloseDetail => next.detail = None,
        Event::BeginEdit(task_id) => {
            if let Some(task) = state.task(&task_id) {
                next.draft = Draft {
                    title: task.title.clone(),
                    description: task.description.clone().unwrap_or_default(),
                };
                next.editing = Some(task_id);
            }
        }
        Event::CancelEdit => {
            next.draft = Draft::default();
            next.editing = None;
        }
        Event::CheckHealth => effects.push(Effect::CheckHealth),

        Event::TaskCreated(result) => match result.into_result() {
            Ok(task) => {
                tracing::info!(task_id = %task.id, "task created");
                // An edit begun while the create was in flight keeps its draft.
                if next.editing.is_none() {
                    next.draft = Draft::default();
                }
                start_list_fetch(&mut next, &mut effects);
            }
            Err(reason) => fail(&mut next, "Failed to create task", &reason),
        },
        Event::TaskUpdated { task_id, result } => match result.into_result() {
            Ok(task) => {
                tracing::info!(task_id = %task.id, "task updated");
                if next.editing.as_deref() == Some(task_id.as_str()) {
                    next.draft = Draft::default();
                    next.editing = None;
                }
                if let Some(detail) = next.detail.as_mut() {
                    if detail.task_id == task.id {
                        detail.task = Loadable::Loaded(task);
                    }
                }
                start_list_fetch(&mut next, &mut effects);
            }
            Err(reason) => fail(&mut next, "Failed to update task", &reason),
        },
        Event::ListLoaded { seq, result } => {
            if seq != next.list_seq {
                tracing::debug!(seq, latest = next.list_seq, "dropping stale task list");
                return (next, effects);
            }
            match result.into_result() {
                Ok(tasks) => {
                    next.progress.retain(|id, _| tasks.iter().any(|t| &t.id == id));
                    next.tasks = tasks;
                    next.loading = false;
                    next.error_message = None;
                }
                Err(reason) => fail(&mut next, "Failed to load tasks", &reason),
            }
        }
        Event::TaskDeleted { task_id, result } => match result.into_result() {
            Ok(()) => {
                tracing::info!(%task_id, "task deleted");
                if next.detail.as_ref().map(|d| d.task_id.as_str()) == Some(task_id.as_str()) {
                    next.detail = None;
                }
                if next.editing.as_deref() == Some(task_id.as_str()) {
                    next.draft = Draft::default();
                    next.editing = None;
                }
                start_list_fetch(&mut next, &mut effects);
            }
            Err(reason) => fail(&mut next, "Failed to delete task", &reason),
        },
        Event::DetailLoaded { task_id, result } => {
            let Some(detail) = next.detail.as_mut().filter(|d| d.task_id == task_id) else {
                return (next, effects);
            };
            match result.into_result() {
                Ok(task) => detail.task = Loadable::Loaded(task),
                Err(reason) => {
                    detail.task = Loadable::Failed(reason.clone());
                    next.error_message = Some(format!("Failed to load task: {}", reason));
                }
            }
        }
        Event::LogsLoaded { task_id, result } => {
            let Some(detail) = next.detail.as_mut().filter(|d| d.task_id == task_id) else {
                return (next, effects);
            };
            match result.into_result() {
                Ok(logs) => detail.logs = Loadable::Loaded(logs),
                Err(reason) => {
                    detail.logs = Loadable::Failed(reason.clone());
                    next.error_message = Some(format!("Failed to load logs: {}", reason));
                }
            }
        }
        Event::HealthChecked(result) => {
            next.server = match result.into_result() {
                Ok(text) => ServerStatus::Online(text.trim().to_string()),
                Err(reason) => ServerStatus::Offline(reason),
            };
        }
        Event::LogStarted { task_id, result } => match result.into_result() {
            Ok(log) => {
                let waiting = next
                    .progress
                    .get_mut(&task_id)
                    .filter(|p| p.started && p.open_log.is_none());
                match waiting {
                    // Finished before the service answered.
                    Some(progress) if progress.finished => effects.push(Effect::CloseLog {
                        task_id: task_id.clone(),
                        log_id: log.id,
                    }),
                    Some(progress) => {
                        tracing::info!(%task_id, log_id = %log.id, "task log opened");
                        progress.open_log = Some(log.id);
                        refresh_logs(&next, &task_id, &mut effects);
                    }
                    None => effects.push(Effect::DiscardLog {
                        task_id: task_id.clone(),
                        log_id: log.id,
                    }),
                }
            }
            Err(reason) => {
                if let Some(progress) = next.progress.get_mut(&task_id) {
                    if progress.open_log.is_none() {
                        progress.started = false;
                    }
                }
                report(&mut next, "Failed to start task", &reason);
            }
        },
        Event::LogClosed {
            task_id,
            log_id,
            result,
        } => match result.into_result() {
            Ok(_) => {
                tracing::info!(%task_id, %log_id, "task log closed");
                refresh_logs(&next, &task_id, &mut effects);
            }
            Err(reason) => {
                if let Some(progress) = next.progress.get_mut(&task_id) {
                    if progress.open_log.is_none() {
                        progress.open_log = Some(log_id);
                        progress.finished = false;
                    }
                }
                report(&mut next, "Failed to finish task", &reason);
            }
        },
        Event::LogDiscarded { task_id, result } => match result.into_result() {
            Ok(()) => refresh_logs(&next, &task_id, &mut effects),
            Err(reason) => report(&mut next, "Failed to discard log", &reason),
        },
    }

    (next, effects)
}

fn start_list_fetch(next: &mut UiState, effects: &mut Vec<Effect>) {
    next.list_seq += 1;
    next.loading = true;
    next.error_message = None;
    effects.push(Effect::FetchList { seq: next.list_seq });
}

fn fail(next: &mut UiState, what: &str, reason: &str) {
    next.loading = false;
    report(next, what, reason);
}

// Like `fail`, for calls that never put the list into `loading`.
fn report(next: &mut UiState, what: &str, reason: &str) {
    tracing::warn!(%reason, "{}", what);
    next.error_message = Some(format!("{}: {}", what, reason));
}

fn refresh_logs(next: &UiState, task_id: &str, effects: &mut Vec<Effect>) {
    if next.detail.as_ref().is_some_and(|d| d.task_id == task_id) {
        effects.push(Effect::FetchLogs(task_id.to_string()));
    }
}
