use crate::app::{ActiveInput, App, InputMode};
use crate::datetime::{format_date_time, format_duration, format_relative, format_time};
use crate::models::{Task, TaskLog};
use crate::state::{Loadable, ServerStatus, TaskDetail, UiState};
use crate::view_model::TaskViewModel;
use chrono::{Local, Utc};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn percent_of(value: u16, percent: u16) -> u16 {
    (u32::from(value) * u32::from(percent) / 100) as u16
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Red)),
        Span::raw(action),
    ]
}

fn get_legend(app: &App) -> Text<'static> {
    if app.confirm_delete.is_some() {
        return Text::from(Line::from(
            [key_hint(" y ", ": Confirm delete "), key_hint(" any ", ": Cancel ")].concat(),
        ));
    }
    let hints = match app.input_mode {
        InputMode::Normal => vec![
            key_hint(" q ", ": Quit "),
            key_hint(" j/k ", ": Move "),
            key_hint(" Enter ", ": Details "),
            key_hint(" a ", ": Add "),
            key_hint(" e ", ": Edit "),
            key_hint(" d ", ": Delete "),
            key_hint(" r ", ": Refresh "),
            key_hint(" s ", ": Start "),
            key_hint(" x ", ": Finish "),
            key_hint(" h/l ", ": Day "),
            key_hint(" f ", ": Day Filter "),
            key_hint(" t ", ": Show Inactive "),
            key_hint(" c ", ": Clear Error "),
        ],
        InputMode::Editing => vec![
            key_hint(" i ", ": Insert "),
            key_hint(" Tab ", ": Switch Field "),
            key_hint(" Enter ", ": Submit "),
            key_hint(" Esc ", ": Cancel "),
        ],
        InputMode::Insert => vec![
            key_hint(" Tab ", ": Switch Field "),
            key_hint(" Esc ", ": Done Typing "),
        ],
    };
    Text::from(Line::from(hints.concat()))
}

fn calendar_line(state: &UiState) -> Line<'static> {
    let today = Local::now().date_naive();
    let mut spans = Vec::new();
    for date in &state.calendar_dates {
        let mut style = Style::default();
        if *date == state.selected_date {
            style = style.fg(Color::Black).bg(Color::White);
        }
        if *date == today {
            style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
        }
        spans.push(Span::styled(format!(" {} ", date.format("%a %d")), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn server_span(server: &ServerStatus) -> Span<'static> {
    match server {
        ServerStatus::Unknown => Span::styled(" checking server ", Style::default().fg(Color::Gray)),
        // Short plain-text health replies are worth showing, JSON ones are not.
        ServerStatus::Online(text) if !text.is_empty() && text.len() <= 16 => Span::styled(
            format!(" online: {} ", text),
            Style::default().fg(Color::Green),
        ),
        ServerStatus::Online(_) => Span::styled(" online ", Style::default().fg(Color::Green)),
        ServerStatus::Offline(reason) => {
            Span::styled(format!(" offline: {} ", reason), Style::default().fg(Color::Red))
        }
    }
}

fn task_item(task: &Task, state: &UiState) -> ListItem<'static> {
    let progress = state.progress_of(&task.id);
    let mut content = Vec::new();
    if !task.is_active {
        content.push(Span::styled("INACTIVE ", Style::default().fg(Color::DarkGray)));
    }
    if progress.finished {
        content.push(Span::styled("DONE ", Style::default().fg(Color::Green)));
    } else if progress.started {
        content.push(Span::styled("STARTED ", Style::default().fg(Color::Yellow)));
    }
    content.push(Span::raw(task.title.clone()));
    ListItem::new(Line::from(content))
}

fn log_line(log: &TaskLog) -> Line<'static> {
    let end = match log.end_at {
        Some(end) => format_time(end),
        None => "running".to_string(),
    };
    let mut spans = vec![Span::raw(format!(
        "  {} - {} ({})",
        format_time(log.start_at),
        end,
        format_duration(log.duration_min)
    ))];
    if let Some(memo) = &log.memo {
        spans.push(Span::styled(
            format!(" {}", memo),
            Style::default().fg(Color::Gray),
        ));
    }
    Line::from(spans)
}

fn label(text: &'static str) -> Span<'static> {
    Span::styled(text, Style::default().add_modifier(Modifier::BOLD))
}

fn detail_lines(detail: &TaskDetail) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    match &detail.task {
        Loadable::Loading => lines.push(Line::from("Loading task...")),
        Loadable::Failed(reason) => lines.push(Line::from(Span::styled(
            reason.clone(),
            Style::default().fg(Color::Red),
        ))),
        Loadable::Loaded(task) => {
            lines.push(Line::from(vec![label("Title: "), Span::raw(task.title.clone())]));
            let status = if task.is_active { "Active" } else { "Inactive" };
            lines.push(Line::from(vec![label("Status: "), Span::raw(status)]));
            lines.push(Line::from(vec![
                label("Created: "),
                Span::raw(format_date_time(task.created_at)),
            ]));
            lines.push(Line::from(vec![
                label("Updated: "),
                Span::raw(format_relative(task.updated_at, Utc::now())),
            ]));

            lines.push(Line::from(label("Description: ")));
            match task.description.as_deref().map(str::trim) {
                Some(desc) if !desc.is_empty() => {
                    for line in desc.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                _ => lines.push(Line::from("No description")),
            }
        }
    }

    lines.push(Line::from(""));
    lines.push(Line::from(label("Logs: ")));
    match &detail.logs {
        Loadable::Loading => lines.push(Line::from("  Loading logs...")),
        Loadable::Failed(reason) => lines.push(Line::from(Span::styled(
            format!("  {}", reason),
            Style::default().fg(Color::Red),
        ))),
        Loadable::Loaded(logs) if logs.is_empty() => lines.push(Line::from("  No logs")),
        Loadable::Loaded(logs) => lines.extend(logs.iter().map(log_line)),
    }

    lines
}

fn draw_draft_popup(f: &mut Frame, app: &App, state: &UiState, area: Rect) {
    let popup_width = percent_of(area.width, 60).saturating_sub(2).max(10);
    let title_lines = calculate_wrapped_lines(&state.draft.title, popup_width).max(1) as u16;
    let desc_lines = calculate_wrapped_lines(&state.draft.description, popup_width).max(1) as u16;

    let popup_height = (title_lines + desc_lines + 6).min(area.height);
    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);

    let heading = if state.editing.is_some() {
        "Edit Task (Enter to Submit)"
    } else {
        "New Task (Enter to Submit)"
    };
    let outer = Block::default()
        .title(heading)
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Green));

    let inner = outer.inner(popup_area);
    f.render_widget(Clear, popup_area);
    f.render_widget(outer, popup_area);

    let fields = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(title_lines + 2),
                Constraint::Min(desc_lines + 2),
            ]
            .as_ref(),
        )
        .split(inner);

    let field_style = |input: ActiveInput| {
        if app.active_input == input {
            if app.input_mode == InputMode::Insert {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            }
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let title = Paragraph::new(state.draft.title.as_str())
        .style(field_style(ActiveInput::Title))
        .block(Block::default().borders(Borders::ALL).title("Title"))
        .wrap(Wrap { trim: false });
    f.render_widget(title, fields[0]);

    let description = Paragraph::new(state.draft.description.as_str())
        .style(field_style(ActiveInput::Description))
        .block(Block::default().borders(Borders::ALL).title("Description"))
        .wrap(Wrap { trim: false });
    f.render_widget(description, fields[1]);
}

fn draw_confirm_popup(f: &mut Frame, state: &UiState, task_id: &str, area: Rect) {
    let title = state
        .task(task_id)
        .map(|task| task.title.clone())
        .unwrap_or_else(|| task_id.to_string());
    let popup_area = centered_rect_absolute(percent_of(area.width, 50).max(20), 3, area);
    let prompt = Paragraph::new(format!("Delete \"{}\"? (y/n)", title))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm")
                .style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, popup_area);
    f.render_widget(prompt, popup_area);
}

pub fn draw(f: &mut Frame, app: &mut App, state: &UiState, visible: &[Task]) {
    let size = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let header_chunk = chunks[0];
    let body_chunk = chunks[1];
    let status_chunk = chunks[2];
    let footer_chunk = chunks[3];

    let header = Paragraph::new(calendar_line(state)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Line::from(vec![
                Span::styled("Taskio", Style::default().add_modifier(Modifier::BOLD)),
                server_span(&state.server),
            ])),
    );
    f.render_widget(header, header_chunk);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
        .split(body_chunk);

    let list_title = match (app.show_inactive, app.filter_by_date) {
        (false, false) => "Tasks (Active)".to_string(),
        (true, false) => "Tasks (All)".to_string(),
        (false, true) => format!("Tasks (Active, {})", state.selected_date.format("%Y/%m/%d")),
        (true, true) => format!("Tasks (All, {})", state.selected_date.format("%Y/%m/%d")),
    };

    let tasks_widget = if !visible.is_empty() {
        let items: Vec<ListItem> = visible.iter().map(|task| task_item(task, state)).collect();
        List::new(items)
            .block(Block::default().borders(Borders::ALL).title(list_title))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else {
        let empty = if state.loading {
            "Loading tasks..."
        } else {
            "No tasks available"
        };
        List::new(vec![ListItem::new(empty)])
            .block(Block::default().borders(Borders::ALL).title(list_title))
    };
    f.render_stateful_widget(tasks_widget, body[0], &mut app.list_state);

    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let detail = match &state.detail {
        Some(detail) => Paragraph::new(detail_lines(detail)),
        None => Paragraph::new("Press Enter to view task details"),
    };
    f.render_widget(detail.block(detail_block).wrap(Wrap { trim: true }), body[1]);

    let status = match (&state.error_message, state.loading) {
        (Some(message), _) => Line::from(Span::styled(
            format!(" Error: {} (c to dismiss)", message),
            Style::default().fg(Color::Red),
        )),
        (None, true) => Line::from(Span::styled(" Loading...", Style::default().fg(Color::Yellow))),
        (None, false) => Line::from(""),
    };
    f.render_widget(Paragraph::new(status), status_chunk);

    if matches!(app.input_mode, InputMode::Editing | InputMode::Insert) {
        draw_draft_popup(f, app, state, body_chunk);
    }
    if let Some(task_id) = &app.confirm_delete {
        draw_confirm_popup(f, state, task_id, body_chunk);
    }

    let legend = Paragraph::new(get_legend(app))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(legend, footer_chunk);
}

pub async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    vm: &mut TaskViewModel,
    poll_timeout: Duration,
) -> io::Result<()> {
    loop {
        vm.drain();

        let state = app.state();
        let visible = app.visible_tasks(&state);
        app.clamp_selection(visible.len());

        terminal.draw(|f| draw(f, &mut app, &state, &visible))?;

        // Handle input
        if event::poll(poll_timeout)? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_input(key, vm) {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    let max_width = usize::from(max_width.max(1));
    text.lines()
        .map(|line| line.chars().count().max(1).div_ceil(max_width))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TaskApi;
    use crate::api_result::ApiResult;
    use crate::models::{LogRequest, TaskRequest};
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    #[test]
    fn test_calculate_wrapped_lines() {
        assert_eq!(calculate_wrapped_lines("", 10), 0);
        assert_eq!(calculate_wrapped_lines("short", 10), 1);
        assert_eq!(calculate_wrapped_lines("exactly10!", 10), 1);
        assert_eq!(calculate_wrapped_lines("eleven chars", 10), 2);
        assert_eq!(calculate_wrapped_lines("a\n\nb", 10), 3);
        assert_eq!(calculate_wrapped_lines("abc", 0), 3);
    }

    #[test]
    fn test_centered_rect_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect_absolute(60, 10, area);
        assert_eq!(popup.width, 60);
        assert_eq!(popup.height, 10);
        assert_eq!(popup.x, 20);
        assert_eq!(popup.y, 15);
    }

    #[test]
    fn test_log_line_formats_running_log() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        let log = TaskLog {
            id: "l1".to_string(),
            task_id: "t1".to_string(),
            start_at: at,
            end_at: None,
            duration_min: None,
            memo: Some("focus".to_string()),
        };
        let text: String = log_line(&log)
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(text.contains("running"));
        assert!(text.contains("(0m)"));
        assert!(text.ends_with(" focus"));
    }

    struct OneTaskApi;

    #[async_trait]
    impl TaskApi for OneTaskApi {
        async fn health(&self) -> ApiResult<String> {
            ApiResult::Success("ok".to_string())
        }

        async fn create_task(&self, _request: &TaskRequest) -> ApiResult<Task> {
            ApiResult::Error {
                code: 500,
                message: "unused".to_string(),
            }
        }

        async fn list_tasks(&self) -> ApiResult<Vec<Task>> {
            let at = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
            ApiResult::Success(vec![Task {
                id: "t1".to_string(),
                title: "Water the plants".to_string(),
                description: None,
                is_active: true,
                created_at: at,
                updated_at: at,
            }])
        }

        async fn get_task(&self, _task_id: &str) -> ApiResult<Task> {
            ApiResult::Error {
                code: 404,
                message: "task not found".to_string(),
            }
        }

        async fn update_task(&self, _task_id: &str, _request: &TaskRequest) -> ApiResult<Task> {
            ApiResult::Error {
                code: 500,
                message: "unused".to_string(),
            }
        }

        async fn delete_task(&self, _task_id: &str) -> ApiResult<()> {
            ApiResult::Success(())
        }

        async fn list_logs(&self, _task_id: &str) -> ApiResult<Vec<TaskLog>> {
            ApiResult::Success(Vec::new())
        }

        async fn create_log(&self, _task_id: &str, _request: &LogRequest) -> ApiResult<TaskLog> {
            ApiResult::Error {
                code: 500,
                message: "unused".to_string(),
            }
        }

        async fn update_log(&self, _log_id: &str, _request: &LogRequest) -> ApiResult<TaskLog> {
            ApiResult::Error {
                code: 500,
                message: "unused".to_string(),
            }
        }

        async fn delete_log(&self, _log_id: &str) -> ApiResult<()> {
            ApiResult::Success(())
        }
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[tokio::test]
    async fn test_draw_lists_tasks_and_errors() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date");
        let mut vm = TaskViewModel::new(Arc::new(OneTaskApi), today);
        vm.settle().await;
        vm.clear_error();
        vm.open_detail("t1");
        vm.settle().await;

        let mut app = App::new(vm.subscribe());
        let state = app.state();
        let visible = app.visible_tasks(&state);
        app.clamp_selection(visible.len());

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).expect("terminal");
        terminal
            .draw(|f| draw(f, &mut app, &state, &visible))
            .expect("draw");

        let text = buffer_text(&terminal);
        assert!(text.contains("Water the plants"));
        assert!(text.contains("Failed to load task: task not found (404)"));
        assert!(text.contains("No logs"));
    }
}
