use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use serde_json::Value;
use taxdesk_core::{ChatRole, Message, QueryKind, QueryResult};
use crate::app::App;

/// Rows of a structured answer shown inline before eliding the rest.
const MAX_ROWS_SHOWN: usize = 5;

fn label_style() -> Style {
    Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

fn kind_color(kind: QueryKind) -> Color {
    match kind {
        QueryKind::Structured => Color::Blue,
        QueryKind::Unstructured => Color::Green,
        QueryKind::Hybrid => Color::Magenta,
        QueryKind::Error => Color::Red,
        QueryKind::Unrecognized => Color::DarkGray,
    }
}

/// Parse simple markdown (**bold**) into styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if end == 0 {
            // "****" has nothing to embolden
            spans.push(Span::raw(rest[..start + 4].to_string()));
            rest = &after[2..];
            continue;
        }
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after[..end].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn push_text(lines: &mut Vec<Line<'static>>, text: &str) {
    for line in text.lines() {
        lines.push(parse_markdown_line(line));
    }
}

/// A labelled block: dim heading, then the body indented as code.
fn push_section(lines: &mut Vec<Line<'static>>, label: &str, body: &str, code: bool) {
    lines.push(Line::from(Span::styled(label.to_string(), label_style())));
    let body_style = if code {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    for line in body.lines() {
        lines.push(Line::from(Span::styled(format!("  {}", line), body_style)));
    }
}

fn row_text(row: &Value) -> String {
    match row {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Lines for one interpreted answer.
pub fn result_lines(result: &QueryResult) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let kind = result.kind();

    lines.push(Line::from(Span::styled(
        format!(" {} ", kind.display_name()),
        Style::default().bg(kind_color(kind)).fg(Color::White).bold(),
    )));

    if let Some(reasoning) = result.reasoning() {
        lines.push(Line::from(Span::styled(
            reasoning.to_string(),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    match result {
        QueryResult::Structured { answer, generated_query, rows, .. } => {
            if let Some(answer) = answer {
                lines.push(Line::from(Span::styled("Answer", label_style())));
                push_text(&mut lines, answer);
            }
            if let Some(query) = generated_query {
                push_section(&mut lines, "SQL QUERY", query, true);
            }
            if !rows.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("ROWS ({})", rows.len()),
                    label_style(),
                )));
                for row in rows.iter().take(MAX_ROWS_SHOWN) {
                    lines.push(Line::from(format!("  {}", row_text(row))));
                }
                if rows.len() > MAX_ROWS_SHOWN {
                    lines.push(Line::from(Span::styled(
                        format!("  … {} more", rows.len() - MAX_ROWS_SHOWN),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
            }
        }
        QueryResult::Unstructured { answer, .. } => {
            push_text(&mut lines, answer);
        }
        QueryResult::Hybrid { retrieval_query, context_rule, final_answer, .. } => {
            if let Some(query) = retrieval_query {
                push_section(&mut lines, "STEP 1: SQL RETRIEVAL", query, true);
            }
            if let Some(rule) = context_rule {
                push_section(&mut lines, "STEP 2: GST CONTEXT", rule, false);
            }
            if !final_answer.is_empty() {
                lines.push(Line::from(Span::styled(
                    "Final Analysis",
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                )));
                push_text(&mut lines, final_answer);
            }
        }
        QueryResult::Error { message } => {
            lines.push(Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red),
            )));
        }
        QueryResult::Unrecognized { .. } => {}
    }

    lines
}

/// Lines for one conversation entry, including its speaker heading.
pub fn message_lines(msg: &Message) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(msg.text().to_string()));
        }
        ChatRole::Assistant => {
            let (heading, color) = if msg.is_error {
                ("Error:", Color::Red)
            } else if msg.is_system() {
                ("System:", Color::Green)
            } else {
                ("AI:", Color::Yellow)
            };
            lines.push(Line::from(Span::styled(
                heading,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));

            match &msg.payload {
                Some(result) if !msg.is_error => lines.extend(result_lines(result)),
                _ => {
                    let style = if msg.is_error {
                        Style::default().fg(Color::Red)
                    } else if msg.is_system() {
                        Style::default().fg(Color::Green)
                    } else {
                        Style::default()
                    };
                    for line in msg.text().lines() {
                        lines.push(Line::from(Span::styled(line.to_string(), style)));
                    }
                }
            }
        }
    }

    lines.push(Line::default());
    lines
}

/// Rows a set of lines takes once wrapped to `width` columns.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.picker.is_some() {
        render_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" GST & Invoice Intelligence ", Style::default().fg(Color::Yellow).bold()),
        Span::styled(app.backend_url.clone(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    let messages = app.store.all();
    let mut lines: Vec<Line> = Vec::new();

    if messages.is_empty() && !app.in_progress() {
        lines.push(Line::from(Span::styled(
            "Ready to analyze invoices and GST rules.",
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(Span::styled(
            "Try asking about tax totals or penalty rules, or press Ctrl+U to upload an invoice.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for msg in &messages {
        lines.extend(message_lines(msg));
    }

    // Progress indicator, never part of the log
    if app.in_progress() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        if app.is_busy() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
        if app.is_uploading() {
            let label = app.upload_label.as_deref().unwrap_or("invoice");
            lines.push(Line::from(Span::styled(
                format!("Processing {}{}", label, dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }
    }

    let total = wrapped_height(&lines, inner_width);
    let max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_bottom || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_bottom = true;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let (border_color, title) = if app.is_busy() {
        (Color::DarkGray, " Waiting for answer... ")
    } else {
        (Color::Yellow, " Ask a question (Enter to send) ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.draft_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .draft_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if app.picker.is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    if let Some(status) = &app.status {
        let line = Line::from(Span::styled(
            format!(" {} ", status),
            Style::default().fg(Color::Yellow),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let hints: Vec<(&str, &str)> = if app.picker.is_some() {
        vec![("↑↓", "select"), ("Enter", "open/upload"), ("Esc", "cancel")]
    } else {
        let upload_hint = if app.is_uploading() { "uploading" } else { "upload invoice" };
        vec![
            ("Enter", "send"),
            ("Ctrl+U", upload_hint),
            (":ingest", "<id> <file>"),
            ("↑↓ PgUp PgDn", "scroll"),
            ("Ctrl+C", "quit"),
        ]
    };

    let mut spans = Vec::new();
    for (k, label) in hints {
        spans.push(Span::styled(format!(" {} ", k), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let Some(picker) = app.picker.as_mut() else {
        return;
    };

    let [popup] = Layout::vertical([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(60)])
        .flex(Flex::Center)
        .areas(popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Upload invoice (images, PDF): {} ", picker.dir.display()));

    let items: Vec<ListItem> = if picker.entries.is_empty() {
        vec![ListItem::new(Span::styled(
            "No invoices here",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        picker
            .entries
            .iter()
            .map(|entry| {
                if entry.is_dir {
                    ListItem::new(Span::styled(
                        format!("{}/", entry.name),
                        Style::default().fg(Color::Blue),
                    ))
                } else {
                    ListItem::new(entry.name.clone())
                }
            })
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_widget(Clear, popup);
    frame.render_stateful_widget(list, popup, &mut picker.state);
}
