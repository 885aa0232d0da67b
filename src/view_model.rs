use crate::api::TaskApi;
use crate::models::LogRequest;
use crate::state::{reduce, Effect, Event, UiState};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Owns the [`UiState`] for the task screens.
///
/// Intents go through [`reduce`]; the effects it returns run as tokio tasks
/// against the injected [`TaskApi`] and report back over a channel. The UI
/// loop folds those completions in with [`TaskViewModel::drain`]. Screens
/// only ever see the state through [`TaskViewModel::subscribe`].
pub struct TaskViewModel {
    api: Arc<dyn TaskApi>,
    state: watch::Sender<UiState>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions_rx: mpsc::UnboundedReceiver<Event>,
    in_flight: usize,
}

impl TaskViewModel {
    /// Builds the view-model and starts the initial list fetch.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(api: Arc<dyn TaskApi>, today: NaiveDate) -> Self {
        let (state, _) = watch::channel(UiState::new(today));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let mut view_model = TaskViewModel {
            api,
            state,
            completions_tx,
            completions_rx,
            in_flight: 0,
        };
        view_model.dispatch(Event::FetchList);
        view_model
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.state.subscribe()
    }

    /// Number of API calls started but not yet folded back into state.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, event: Event) {
        let (next, effects) = {
            let current = self.state.borrow();
            reduce(&current, event)
        };
        self.state.send_replace(next);
        for effect in effects {
            self.spawn(effect);
        }
    }

    fn spawn(&mut self, effect: Effect) {
        tracing::debug!(?effect, "running effect");
        let api = Arc::clone(&self.api);
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let event = run_effect(api.as_ref(), effect).await;
            // The receiver only goes away with the view-model itself.
            let _ = tx.send(event);
        });
    }

    /// Applies every completion that has already arrived, without waiting.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.completions_rx.try_recv() {
            self.complete(event);
            applied += 1;
        }
        applied
    }

    /// Waits for the next completion and applies it.
    pub async fn next_completion(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(event) => {
                self.complete(event);
                true
            }
            None => false,
        }
    }

    /// Waits until no API call is outstanding, chained ones included.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    fn complete(&mut self, event: Event) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.dispatch(event);
    }

    pub fn update_title(&mut self, title: impl Into<String>) {
        self.dispatch(Event::UpdateTitle(title.into()));
    }

    pub fn update_description(&mut self, description: impl Into<String>) {
        self.dispatch(Event::UpdateDescription(description.into()));
    }

    pub fn create_task(&mut self) {
        self.dispatch(Event::Submit);
    }

    pub fn fetch_tasks(&mut self) {
        self.dispatch(Event::FetchList);
    }

    pub fn delete_task(&mut self, task_id: impl Into<String>) {
        self.dispatch(Event::Delete(task_id.into()));
    }

    pub fn clear_error(&mut self) {
        self.dispatch(Event::ClearError);
    }

    pub fn on_date_selected(&mut self, date: NaiveDate) {
        self.dispatch(Event::SelectDate(date));
    }

    pub fn toggle_start(&mut self, task_id: impl Into<String>) {
        self.dispatch(Event::ToggleStart(task_id.into()));
    }

    pub fn toggle_finish(&mut self, task_id: impl Into<String>) {
        self.dispatch(Event::ToggleFinish(task_id.into()));
    }

    pub fn open_detail(&mut self, task_id: impl Into<String>) {
        self.dispatch(Event::OpenDetail(task_id.into()));
    }

    pub fn close_detail(&mut self) {
        self.dispatch(Event::CloseDetail);
    }

    pub fn begin_edit(&mut self, task_id: impl Into<String>) {
        self.dispatch(Event::BeginEdit(task_id.into()));
    }

    pub fn cancel_edit(&mut self) {
        self.dispatch(Event::CancelEdit);
    }

    pub fn check_health(&mut self) {
        self.dispatch(Event::CheckHealth);
    }
}

async fn run_effect(api: &dyn TaskApi, effect: Effect) -> Event {
    match effect {
        Effect::CheckHealth => Event::HealthChecked(api.health().await),
        Effect::CreateTask(request) => {
            tracing::info!(title = %request.title, "creating task");
            Event::TaskCreated(api.create_task(&request).await)
        }
        Effect::UpdateTask { task_id, request } => {
            tracing::info!(%task_id, "updating task");
            let result = api.update_task(&task_id, &request).await;
            Event::TaskUpdated { task_id, result }
        }
        Effect::FetchList { seq } => Event::ListLoaded {
            seq,
            result: api.list_tasks().await,
        },
        Effect::DeleteTask(task_id) => {
            tracing::info!(%task_id, "deleting task");
            let result = api.delete_task(&task_id).await;
            Event::TaskDeleted { task_id, result }
        }
        Effect::FetchTask(task_id) => {
            let result = api.get_task(&task_id).await;
            Event::DetailLoaded { task_id, result }
        }
        Effect::FetchLogs(task_id) => {
            let result = api.list_logs(&task_id).await;
            Event::LogsLoaded { task_id, result }
        }
        Effect::StartLog(task_id) => {
            tracing::info!(%task_id, "starting task");
            let request = LogRequest {
                start_at: Some(Utc::now()),
                end_at: None,
                memo: None,
            };
            let result = api.create_log(&task_id, &request).await;
            Event::LogStarted { task_id, result }
        }
        Effect::CloseLog { task_id, log_id } => {
            tracing::info!(%task_id, %log_id, "finishing task");
            let request = LogRequest {
                start_at: None,
                end_at: Some(Utc::now()),
                memo: None,
            };
            let result = api.update_log(&log_id, &request).await;
            Event::LogClosed {
                task_id,
                log_id,
                result,
            }
        }
        Effect::DiscardLog { task_id, log_id } => {
            tracing::info!(%task_id, %log_id, "discarding task log");
            let result = api.delete_log(&log_id).await;
            Event::LogDiscarded { task_id, result }
        }
    }
}
