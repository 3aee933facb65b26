use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
    },
};
use unicode_width::UnicodeWidthChar;
use crate::app::{App, InputMode, SUGGESTED_PROMPTS};
use crate::markdown::{code_header, RenderedMessage};
use crate::state::Role;
use crate::theme::Theme;

/// Most input rows shown before the input box scrolls
const MAX_INPUT_ROWS: usize = 5;

const JUMP_LABEL: &str = " ↓ Jump to bottom (G) ";

/// Split a styled line into rows of at most `width` columns, breaking
/// between characters and keeping every span's style
pub fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line.clone()];
    }

    let mut rows = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;

    for span in &line.spans {
        let mut buf = String::new();
        for ch in span.content.chars() {
            let w = ch.width().unwrap_or(0);
            if current_width + w > width && current_width > 0 {
                if !buf.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut buf), span.style));
                }
                rows.push(Line::from(std::mem::take(&mut current)));
                current_width = 0;
            }
            buf.push(ch);
            current_width += w;
        }
        if !buf.is_empty() {
            current.push(Span::styled(buf, span.style));
        }
    }

    if !current.is_empty() {
        rows.push(Line::from(current));
    }

    rows
}

fn role_line(role: Role, time: &str, theme: &Theme) -> Line<'static> {
    let color = match role {
        Role::User => theme.user,
        Role::Assistant => theme.assistant,
    };
    let mut spans = vec![Span::styled(
        format!("● {}", role.display_name()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )];
    if !time.is_empty() {
        spans.push(Span::styled(format!("  {}", time), Style::default().fg(theme.muted)));
    }
    Line::from(spans)
}

/// Header row of a code block inside a wrapped message
#[derive(Debug, Clone)]
pub struct CodeHeaderRow {
    pub row: usize,
    pub label: String,
}

/// One message laid out as terminal rows: role header, body and a trailing
/// blank row
#[derive(Debug, Clone, Default)]
pub struct WrappedMessage {
    pub rows: Vec<Line<'static>>,
    /// In block order
    pub code_headers: Vec<CodeHeaderRow>,
}

pub fn wrap_message(
    role: Role,
    time: &str,
    message: &RenderedMessage,
    width: usize,
    theme: &Theme,
) -> WrappedMessage {
    let mut rows = wrap_line(&role_line(role, time, theme), width);
    let mut code_headers = Vec::new();

    for (i, line) in message.lines.iter().enumerate() {
        if let Some(block) = message.code_blocks.iter().find(|b| b.header_line == i) {
            code_headers.push(CodeHeaderRow {
                row: rows.len(),
                label: block.label().to_string(),
            });
        }
        rows.extend(wrap_line(line, width));
    }
    rows.push(Line::default());

    WrappedMessage { rows, code_headers }
}

/// Rows `[start, end)` of the wrapped messages. The selected code block's
/// header is drawn highlighted.
fn visible_rows(
    messages: &[WrappedMessage],
    selected: Option<usize>,
    width: usize,
    theme: &Theme,
    start: usize,
    end: usize,
) -> Vec<Line<'static>> {
    let mut out = Vec::new();
    let mut base = 0;
    let mut first_block = 0;

    for message in messages {
        let len = message.rows.len();
        if base + len > start && base < end {
            // Same text as the plain header, so it wraps to the same rows
            let highlighted = selected
                .and_then(|s| s.checked_sub(first_block))
                .and_then(|i| message.code_headers.get(i))
                .map(|h| (h.row, wrap_line(&code_header(&h.label, theme, true), width)));

            for row in start.saturating_sub(base)..(end - base).min(len) {
                let line = match &highlighted {
                    Some((first, lines)) if row >= *first && row < first + lines.len() => {
                        lines[row - first].clone()
                    }
                    _ => message.rows[row].clone(),
                };
                out.push(line);
            }
        }

        base += len;
        first_block += message.code_headers.len();
        if base >= end {
            break;
        }
    }

    out
}

fn thinking_lines(app: &App) -> Vec<Line<'static>> {
    let dots = ".".repeat(app.animation_frame as usize + 1);
    vec![
        role_line(Role::Assistant, "", &app.theme),
        Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(app.theme.muted).add_modifier(Modifier::ITALIC),
        )),
    ]
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    frame.render_widget(
        Block::default().style(Style::default().bg(app.theme.background).fg(app.theme.text)),
        area,
    );

    let input_rows = app.input.split('\n').count().clamp(1, MAX_INPUT_ROWS) as u16;

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_rows + 2),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;

    let (status_text, status_color) = match &app.service_status {
        None => ("… connecting".to_string(), theme.muted),
        Some(Ok(status)) if status.is_online() => {
            let providers = if status.ai_providers.is_empty() {
                String::new()
            } else {
                format!(" · {}", status.ai_providers.join(", "))
            };
            (format!("● online{}", providers), theme.success)
        }
        Some(Ok(status)) => (format!("○ {}", status.status), theme.error),
        Some(Err(_)) => ("○ offline".to_string(), theme.error),
    };
    let theme_text = if theme.is_dark { "☾ dark" } else { "☀ light" };

    let right = Line::from(vec![
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::styled(format!("  {} ", theme_text), Style::default().fg(theme.muted)),
    ]);
    let right_width = right.width() as u16;

    let [left_area, right_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(right_width)]).areas(area);

    let left = Line::from(vec![
        Span::styled(
            " chat ",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.endpoint.clone(), Style::default().fg(theme.muted)),
    ]);

    frame.render_widget(Paragraph::new(left), left_area);
    frame.render_widget(Paragraph::new(right), right_area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let border_color = if app.input_mode == InputMode::Normal {
        app.theme.border_focused
    } else {
        app.theme.border
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Store area for mouse hit-testing
    app.chat_area = Some(inner);

    if app.conversation.is_empty() && !app.conversation.is_loading() {
        app.view.measure(0, inner.height);
        app.code_block_rows.clear();
        app.jump_area = None;
        render_welcome(app, frame, inner);
        return;
    }

    // Leave the last column for the scrollbar
    let [text_area, _] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(1)]).areas(inner);

    let width = text_area.width as usize;
    let theme = app.theme.clone();
    let selected = app.selected_code_block;
    let thinking = if app.conversation.is_loading() {
        thinking_lines(app)
    } else {
        Vec::new()
    };

    let mut message_rows = 0;
    let mut code_rows = Vec::new();
    for message in app.wrapped_messages(width) {
        for header in &message.code_headers {
            code_rows.push(u16::try_from(message_rows + header.row).unwrap_or(u16::MAX));
        }
        message_rows += message.rows.len();
    }
    let content_height = u16::try_from(message_rows + thinking.len()).unwrap_or(u16::MAX);
    app.view.measure(content_height, inner.height);
    app.code_block_rows = code_rows;

    let start = app.view.offset() as usize;
    let end = start + inner.height as usize;
    let mut lines = visible_rows(app.wrapped_messages(width), selected, width, &theme, start, end);
    for (i, line) in thinking.into_iter().enumerate() {
        if (start..end).contains(&(message_rows + i)) {
            lines.push(line);
        }
    }

    frame.render_widget(Paragraph::new(Text::from(lines)), text_area);

    if app.view.max_offset() > 0 {
        let mut scrollbar_state = ScrollbarState::new(app.view.max_offset() as usize)
            .position(app.view.offset() as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .style(Style::default().fg(app.theme.muted)),
            inner,
            &mut scrollbar_state,
        );
    }

    app.jump_area = None;
    if app.view.show_jump_to_bottom() && inner.height > 0 {
        let width = (Line::from(JUMP_LABEL).width() as u16).min(inner.width);
        let jump = Rect::new(
            inner.x + (inner.width - width) / 2,
            inner.y + inner.height - 1,
            width,
            1,
        );
        frame.render_widget(Clear, jump);
        frame.render_widget(
            Paragraph::new(JUMP_LABEL).style(
                Style::default()
                    .bg(app.theme.accent)
                    .fg(app.theme.background)
                    .add_modifier(Modifier::BOLD),
            ),
            jump,
        );
        app.jump_area = Some(jump);
    }
}

fn render_welcome(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;

    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            "How can I help you today?",
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(Span::styled(
            "Try one of these (press 1-4 in normal mode):",
            Style::default().fg(theme.muted),
        )),
        Line::default(),
    ];
    for (i, prompt) in SUGGESTED_PROMPTS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{}. ", i + 1), Style::default().fg(theme.accent)),
            Span::styled(*prompt, Style::default().fg(theme.text)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;
    let editing = app.input_mode == InputMode::Editing;

    let border_color = if editing { theme.border_focused } else { theme.border };
    let title = if app.is_waiting_for_reply() {
        " Waiting for reply... "
    } else {
        " Message (Enter to send, Alt+Enter for newline) "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.input.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("Type a message...", Style::default().fg(theme.muted))),
            inner,
        );
    } else {
        // Cursor position as (row, column) within the input text
        let before_cursor: String = app.input.chars().take(app.input_cursor).collect();
        let cursor_row = before_cursor.matches('\n').count();
        let cursor_col = before_cursor
            .rsplit('\n')
            .next()
            .map(|line| line.chars().count())
            .unwrap_or(0);

        let visible_rows = inner.height.max(1) as usize;
        let first_row = (cursor_row + 1).saturating_sub(visible_rows);

        // Horizontal scroll keeps the cursor column visible
        let inner_width = inner.width as usize;
        let scroll_offset = if inner_width == 0 {
            0
        } else if cursor_col >= inner_width {
            cursor_col - inner_width + 1
        } else {
            0
        };

        let lines: Vec<Line> = app
            .input
            .split('\n')
            .skip(first_row)
            .take(visible_rows)
            .map(|line| {
                let visible: String = line.chars().skip(scroll_offset).take(inner_width).collect();
                Line::from(Span::styled(visible, Style::default().fg(theme.text)))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);

        if editing {
            let cursor_x = (cursor_col - scroll_offset) as u16;
            let cursor_y = (cursor_row - first_row) as u16;
            frame.set_cursor_position((inner.x + cursor_x, inner.y + cursor_y));
        }
        return;
    }

    if editing {
        frame.set_cursor_position((inner.x, inner.y));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[
            ("Enter", "send"),
            ("Alt+Enter", "newline"),
            ("Esc", "normal mode"),
            ("Ctrl-L", "clear"),
            ("Ctrl-T", "theme"),
            ("Ctrl-C", "quit"),
        ],
        InputMode::Normal => &[
            ("i", "type"),
            ("j/k", "scroll"),
            ("G", "bottom"),
            ("[ ]", "code blocks"),
            ("y", "copy code"),
            ("t", "theme"),
            ("Ctrl-L", "clear"),
            ("q", "quit"),
        ],
    };

    let mut spans = vec![Span::raw(" ")];
    for (i, (key, action)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" · ", Style::default().fg(app.theme.border)));
        }
        spans.push(Span::styled(
            *key,
            Style::default().fg(app.theme.accent).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(format!(" {}", action), Style::default().fg(app.theme.muted)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
