use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use md2docx_core::auth::CallbackState;

use crate::app::{App, AppState, Screen};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, chunks[0]);
    match app.screen {
        Screen::Home => render_home(frame, app, chunks[1]),
        Screen::RedirectPrompt => render_redirect_prompt(frame, app, chunks[1]),
        Screen::Callback => render_callback(frame, app, chunks[1]),
    }
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, area: Rect) {
    let title = "  Markdown to DOCX";
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + help_hint.len() as u16 + 4)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::border_style(false));

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

// ============================================================================
// Home
// ============================================================================

fn render_home(frame: &mut Frame, app: &App, area: Rect) {
    if !app.is_authenticated() {
        render_signed_out(frame, app, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_documents(frame, app, chunks[0]);
    render_conversion(frame, app, chunks[1]);
}

fn render_signed_out(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Convert your Google Drive markdown files to Word documents.",
            styles::list_item_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  [l] ", styles::help_key_style()),
            Span::styled("Login with Google", styles::help_desc_style()),
        ]),
        Line::from(vec![
            Span::styled("  [p] ", styles::help_key_style()),
            Span::styled("Paste a redirect URL", styles::help_desc_style()),
        ]),
    ];

    if let Some(activity) = app.activity {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", activity.label()),
            styles::muted_style(),
        )));
    }
    if let Some(ref error) = app.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(" Welcome ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_documents(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Documents ({}) ", app.docs.len()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    if app.docs.is_empty() {
        let hint = if app.activity.is_some() {
            "  Working..."
        } else {
            "  Press [f] to fetch your markdown files"
        };
        let paragraph = Paragraph::new(Span::styled(hint, styles::muted_style())).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .docs
        .iter()
        .map(|doc| ListItem::new(Span::styled(doc.name.clone(), styles::list_item_style())))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(styles::selected_style())
        .highlight_symbol("▶ ");

    let mut state = ListState::default();
    state.select(Some(app.doc_selection));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_conversion(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();

    if let Some(activity) = app.activity {
        lines.push(Line::from(Span::styled(
            format!(" {}", activity.label()),
            styles::highlight_style(),
        )));
        lines.push(Line::from(""));
    }

    match app.conversion {
        Some(ref result) => {
            lines.push(Line::from(Span::styled(
                format!(
                    " Converted {} of {} files",
                    result.converted_count(),
                    result.total_files
                ),
                styles::success_style(),
            )));
            lines.push(Line::from(""));
            for file in &result.converted_files {
                let style = if file.is_converted() {
                    styles::list_item_style()
                } else {
                    styles::error_style()
                };
                lines.push(Line::from(Span::styled(format!(" {}", file.summary()), style)));
            }
            if result.has_archive() {
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(" [d] ", styles::help_key_style()),
                    Span::styled("Download all as ZIP", styles::help_desc_style()),
                ]));
            }
        }
        None if !app.docs.is_empty() => {
            lines.push(Line::from(vec![
                Span::styled(" [c] ", styles::help_key_style()),
                Span::styled("Convert all to DOCX", styles::help_desc_style()),
            ]));
        }
        None => {}
    }

    if let Some(ref error) = app.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(" Conversion ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Login Routes
// ============================================================================

fn render_redirect_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];

    if let Some(ref url) = app.login_url {
        lines.push(Line::from(Span::styled(
            "  Complete the Google sign-in in your browser. If it did not open, visit:",
            styles::list_item_style(),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {}", url),
            styles::highlight_style(),
        )));
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        "  Paste the URL you were redirected to:",
        styles::list_item_style(),
    )));
    lines.push(Line::from(vec![
        Span::styled("  > ", styles::muted_style()),
        Span::styled(format!("{}▌", app.redirect_input), styles::input_style()),
    ]));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  [Enter] ", styles::help_key_style()),
        Span::styled("Continue  ", styles::help_desc_style()),
        Span::styled("[Esc] ", styles::help_key_style()),
        Span::styled("Cancel", styles::help_desc_style()),
    ]));

    let block = Block::default()
        .title(" Login with Google ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_callback(frame: &mut Frame, app: &App, area: Rect) {
    let dialog = centered_rect_fixed(50, 9, area);

    let (title, lines) = match app.callback_state() {
        CallbackState::Failed(message) => (
            " Authentication Error ",
            vec![
                Line::from(""),
                Line::from(Span::styled(format!(" {}", message), styles::error_style())),
                Line::from(""),
                Line::from(vec![
                    Span::styled(" [Enter] ", styles::help_key_style()),
                    Span::styled("Return to Home", styles::help_desc_style()),
                ]),
            ],
        ),
        state => (
            " Signing In ",
            vec![
                Line::from(""),
                Line::from(Span::styled(
                    " Processing authentication...",
                    styles::highlight_style(),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    format!(" {}", progress_label(&state)),
                    styles::muted_style(),
                )),
            ],
        ),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Clear, dialog);
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

fn progress_label(state: &CallbackState) -> &'static str {
    match state {
        CallbackState::Extracting => "Reading authorization code",
        CallbackState::Exchanging => "Exchanging code with the server",
        CallbackState::Persisting => "Saving session",
        CallbackState::Redirecting => "Redirecting",
        CallbackState::Failed(_) => "",
    }
}

// ============================================================================
// Status Bar and Overlays
// ============================================================================

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = app
        .status_message
        .clone()
        .unwrap_or_else(|| app.session_summary());

    let right_text = match (app.screen, app.is_authenticated()) {
        (Screen::Home, true) => "f:fetch c:convert d:download o:logout q:quit ",
        (Screen::Home, false) => "l:login p:paste q:quit ",
        _ => "Esc:home ",
    };

    let padding = area
        .width
        .saturating_sub(left_text.chars().count() as u16 + right_text.len() as u16 + 1);

    let status_line = Line::from(vec![
        Span::styled(format!(" {}", left_text), styles::status_bar_style()),
        Span::raw(" ".repeat(padding as usize)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(48, 19, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_line = |key: &'static str, desc: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", key), styles::help_key_style()),
            Span::styled(desc, styles::help_desc_style()),
        ])
    };

    let help_text = vec![
        Line::from(Span::styled(" Markdown to DOCX", styles::title_style())),
        Line::from(Span::styled(
            format!(" version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Session", styles::highlight_style())),
        help_line("l", "Login with Google"),
        help_line("p", "Paste a redirect URL"),
        help_line("o", "Logout"),
        Line::from(""),
        Line::from(Span::styled(" Documents", styles::highlight_style())),
        help_line("f", "Fetch markdown files"),
        help_line("↑/↓", "Navigate list"),
        help_line("c", "Convert all to DOCX"),
        help_line("d", "Download ZIP"),
        Line::from(""),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("     Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 6, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
