use crate::datetime::created_on;
use crate::models::Task;
use crate::state::UiState;
use crate::view_model::TaskViewModel;
use chrono::Duration;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use tokio::sync::watch;

pub struct App {
    pub state_rx: watch::Receiver<UiState>,
    pub list_state: ListState,
    pub input_mode: InputMode,
    pub active_input: ActiveInput,
    pub confirm_delete: Option<String>,
    pub show_inactive: bool,
    pub filter_by_date: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveInput {
    Title,
    Description,
}

impl App {
    pub fn new(state_rx: watch::Receiver<UiState>) -> App {
        App {
            state_rx,
            list_state: ListState::default(),
            input_mode: InputMode::Normal,
            active_input: ActiveInput::Title,
            confirm_delete: None,
            show_inactive: false,
            filter_by_date: false,
        }
    }

    pub fn state(&self) -> UiState {
        self.state_rx.borrow().clone()
    }

    /// Tasks as shown in the list, after the local filters.
    pub fn visible_tasks(&self, state: &UiState) -> Vec<Task> {
        state
            .tasks
            .iter()
            .filter(|task| self.show_inactive || task.is_active)
            .filter(|task| !self.filter_by_date || created_on(task, state.selected_date))
            .cloned()
            .collect()
    }

    /// Keeps the selection inside the visible list.
    pub fn clamp_selection(&mut self, len: usize) {
        let selected = match (self.list_state.selected(), len) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(i), len) => Some(i.min(len - 1)),
        };
        self.list_state.select(selected);
    }

    pub fn next(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    fn selected_task_id(&self, state: &UiState) -> Option<String> {
        let tasks = self.visible_tasks(state);
        self.list_state
            .selected()
            .and_then(|i| tasks.get(i))
            .map(|task| task.id.clone())
    }

    fn shift_date(&self, vm: &mut TaskViewModel, state: &UiState, days: i64) {
        let date = state.selected_date + Duration::days(days);
        if state.calendar_dates.contains(&date) {
            vm.on_date_selected(date);
        }
    }

    /// Routes one key press. Returns `true` when the user asked to quit.
    pub fn handle_input(&mut self, key: KeyEvent, vm: &mut TaskViewModel) -> bool {
        let state = self.state();

        if let Some(task_id) = self.confirm_delete.take() {
            if key.code == KeyCode::Char('y') {
                vm.delete_task(task_id);
            }
            return false;
        }

        match self.input_mode {
            InputMode::Normal => {
                let len = self.visible_tasks(&state).len();
                match key.code {
                    KeyCode::Char('q') => return true,
                    KeyCode::Char('j') | KeyCode::Down => self.next(len),
                    KeyCode::Char('k') | KeyCode::Up => self.previous(len),
                    KeyCode::Char('r') => vm.fetch_tasks(),
                    KeyCode::Char('c') => vm.clear_error(),
                    KeyCode::Char('t') => {
                        self.show_inactive = !self.show_inactive;
                        self.list_state.select(Some(0));
                    }
                    KeyCode::Char('f') => {
                        self.filter_by_date = !self.filter_by_date;
                        self.list_state.select(Some(0));
                    }
                    KeyCode::Char('h') | KeyCode::Left => self.shift_date(vm, &state, -1),
                    KeyCode::Char('l') | KeyCode::Right => self.shift_date(vm, &state, 1),
                    KeyCode::Char('a') => {
                        if state.editing.is_some() {
                            vm.cancel_edit();
                        }
                        self.input_mode = InputMode::Editing;
                        self.active_input = ActiveInput::Title;
                    }
                    KeyCode::Char('e') => {
                        if let Some(task_id) = self.selected_task_id(&state) {
                            vm.begin_edit(task_id);
                            self.input_mode = InputMode::Editing;
                            self.active_input = ActiveInput::Title;
                        }
                    }
                    KeyCode::Char('d') => {
                        self.confirm_delete = self.selected_task_id(&state);
                    }
                    KeyCode::Char('s') => {
                        if let Some(task_id) = self.selected_task_id(&state) {
                            vm.toggle_start(task_id);
                        }
                    }
                    KeyCode::Char('x') => {
                        if let Some(task_id) = self.selected_task_id(&state) {
                            vm.toggle_finish(task_id);
                        }
                    }
                    KeyCode::Enter => {
                        if let Some(task_id) = self.selected_task_id(&state) {
                            vm.open_detail(task_id);
                        }
                    }
                    KeyCode::Esc => vm.close_detail(),
                    _ => {}
                }
            }

            InputMode::Editing => match key.code {
                KeyCode::Char('i') => {
                    self.input_mode = InputMode::Insert;
                }
                KeyCode::Tab => {
                    self.active_input = match self.active_input {
                        ActiveInput::Title => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Title,
                    };
                }
                KeyCode::Enter => {
                    // A rejected or failed submit keeps the draft for another try.
                    vm.create_task();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Esc => {
                    if state.editing.is_some() {
                        vm.cancel_edit();
                    }
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },

            InputMode::Insert => match key.code {
                KeyCode::Char(c) => match self.active_input {
                    ActiveInput::Title => vm.update_title(format!("{}{}", state.draft.title, c)),
                    ActiveInput::Description => {
                        vm.update_description(format!("{}{}", state.draft.description, c))
                    }
                },
                KeyCode::Backspace => match self.active_input {
                    ActiveInput::Title => {
                        let mut title = state.draft.title;
                        title.pop();
                        vm.update_title(title);
                    }
                    ActiveInput::Description => {
                        let mut description = state.draft.description;
                        description.pop();
                        vm.update_description(description);
                    }
                },
                KeyCode::Tab => {
                    self.active_input = match self.active_input {
                        ActiveInput::Title => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Title,
                    };
                }
                KeyCode::Esc => {
                    self.input_mode = InputMode::Editing;
                }
                _ => {}
            },
        }
        false
    }
}
