mod components;

use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{App, Focus, Popup};
use crate::estimate::results::{measurement_rows, metadata_rows, DISCLAIMER};
use crate::estimate::View;
use crate::theme::Theme;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the theme; only the first call has an effect
pub fn set_theme(theme: Theme) {
    let _ = THEME.set(theme);
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let has_error = app.estimation().error().is_some();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),                                  // Info line
            Constraint::Min(8),                                     // Upload boxes
            Constraint::Length(if has_error { 3 } else { 0 }),      // Error region
            Constraint::Length(3),                                  // Trigger
            Constraint::Length(12),                                 // Results
            Constraint::Length(1),                                  // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_slots(f, app, chunks[1]);
    if has_error {
        draw_error(f, app, chunks[2]);
    }
    draw_trigger(f, app, chunks[3]);
    draw_results(f, app, chunks[4]);
    draw_footer(f, chunks[5]);

    match app.popup {
        Popup::None => {}
        Popup::FileBrowser => draw_file_browser(f, app),
        Popup::PathInput => draw_path_input(f, app),
        Popup::Help => draw_help_popup(f),
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status, Style::default().fg(warning())))
    } else {
        Line::from(vec![
            Span::styled("AI-Based Full Body Measurement Estimation", Style::default().fg(header()).add_modifier(Modifier::BOLD)),
            Span::styled(" │ ", Style::default().fg(inactive())),
            Span::styled(app.config.endpoint.as_str(), Style::default().fg(text_dim())),
        ])
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_slots(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    for (view, chunk) in View::ALL.into_iter().zip(chunks.iter()) {
        draw_slot(f, app, view, *chunk);
    }
}

fn draw_slot(f: &mut Frame, app: &App, view: View, area: Rect) {
    let is_active = app.focus == Focus::Slot(view);
    let selection = app.estimation().slot(view);

    let border_color = match (is_active, selection.is_some()) {
        (true, _) => accent(),
        (false, true) => success(),
        (false, false) => inactive(),
    };
    let title_style = if is_active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(text())
    };

    let block = Block::default()
        .title(Span::styled(format!(" {} {} ", view.index() + 1, view.label()), title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(selection) = selection else {
        let hint = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("Enter to browse or drop a file", Style::default().fg(text()))),
            Line::from(Span::styled(view.description(), Style::default().fg(text_dim()))),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        f.render_widget(hint, inner);
        return;
    };

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);

    let mut caption = vec![Span::styled(selection.file.name.as_str(), Style::default().fg(text()))];
    match &selection.preview {
        Some(preview) => {
            let lines = components::preview_lines(&preview.thumb, parts[0].width, parts[0].height);
            f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), parts[0]);
            caption.push(Span::styled(
                format!("  {}x{}", preview.width, preview.height),
                Style::default().fg(text_dim()),
            ));
        }
        None => {
            let note = Paragraph::new(Span::styled("(no preview)", Style::default().fg(text_dim())))
                .alignment(Alignment::Center);
            f.render_widget(note, parts[0]);
        }
    }

    f.render_widget(Paragraph::new(Line::from(caption)).alignment(Alignment::Center), parts[1]);
}

fn draw_error(f: &mut Frame, app: &App, area: Rect) {
    let Some(error) = app.estimation().error() else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(danger()));
    let message = Paragraph::new(Line::from(vec![
        Span::styled("✗ ", Style::default().fg(danger())),
        Span::styled(error.user_message(), Style::default().fg(danger())),
    ]))
    .block(block)
    .wrap(Wrap { trim: true });

    f.render_widget(message, area);
}

fn draw_trigger(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.focus == Focus::Estimate;
    let estimation = app.estimation();

    let line = if estimation.is_submitting() {
        let elapsed = app.submitted_at.map(|t| t.elapsed().as_secs()).unwrap_or(0);
        Line::from(vec![
            Span::styled(components::spinner_frame(app.ticks), Style::default().fg(accent())),
            Span::styled(" Processing images, please wait…", Style::default().fg(text())),
            Span::styled(format!(" {}s", elapsed), Style::default().fg(text_dim())),
            Span::styled(" │ ", Style::default().fg(inactive())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" cancel", Style::default().fg(text_dim())),
        ])
    } else if estimation.can_estimate() {
        Line::from(Span::styled(
            "Estimate Body Measurements",
            Style::default().fg(accent()).add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from(vec![
            Span::styled("Estimate Body Measurements", Style::default().fg(inactive())),
            Span::styled(
                format!("  ({}/3 images)", estimation.filled_count()),
                Style::default().fg(text_dim()),
            ),
        ])
    };

    let border_color = if is_active { accent() } else { inactive() };
    let button = Paragraph::new(line)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(border_color)));

    f.render_widget(button, area);
}

fn draw_results(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(Span::styled(" Measurement Results ", Style::default().fg(success())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(inactive()));

    let Some(result) = app.estimation().result() else {
        let empty = Paragraph::new(Span::styled(
            "Upload three full-body images to estimate measurements",
            Style::default().fg(text_dim()),
        ))
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(empty, area);
        return;
    };

    let inner = block.inner(area);
    f.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Length(3), Constraint::Min(1)])
        .split(inner);

    let header = Row::new(vec![
        Span::styled("Measurement", Style::default().fg(header())),
        Span::styled("Value", Style::default().fg(header())),
    ]);
    let rows: Vec<Row> = measurement_rows(result)
        .into_iter()
        .map(|row| {
            Row::new(vec![
                Span::styled(row.label, Style::default().fg(text())),
                Span::styled(row.value, Style::default().fg(accent()).add_modifier(Modifier::BOLD)),
            ])
        })
        .collect();
    let table = Table::new(rows, [Constraint::Percentage(50), Constraint::Percentage(50)])
        .header(header);
    f.render_widget(table, parts[0]);

    let meta: Vec<Line> = metadata_rows(result)
        .into_iter()
        .map(|row| {
            Line::from(vec![
                Span::styled(format!("{}: ", row.label), Style::default().fg(text())),
                Span::styled(row.value, Style::default().fg(text_dim())),
            ])
        })
        .collect();
    f.render_widget(
        Paragraph::new(meta).block(Block::default().borders(Borders::TOP).border_style(Style::default().fg(inactive()))),
        parts[1],
    );

    let disclaimer = Paragraph::new(Span::styled(
        DISCLAIMER,
        Style::default().fg(text_dim()).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(disclaimer, parts[2]);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    let hints = Line::from(vec![
        Span::styled("Tab", Style::default().fg(accent())),
        Span::raw(" focus │ "),
        Span::styled("Enter", Style::default().fg(accent())),
        Span::raw(" browse │ "),
        Span::styled("p", Style::default().fg(accent())),
        Span::raw(" path │ "),
        Span::styled("d", Style::default().fg(accent())),
        Span::raw(" clear │ "),
        Span::styled("e", Style::default().fg(accent())),
        Span::raw(" estimate │ "),
        Span::styled("?", Style::default().fg(accent())),
        Span::raw(" help │ "),
        Span::styled("q", Style::default().fg(accent())),
        Span::raw(" quit"),
    ]);

    f.render_widget(
        Paragraph::new(hints).alignment(Alignment::Center).style(Style::default().fg(text_dim())),
        area,
    );
}

fn draw_file_browser(f: &mut Frame, app: &App) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 90 } else { 70 },
        if area.height < 30 { 85 } else { 70 },
        area
    );

    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(format!(" Select {} ", app.target.label()), Style::default().fg(accent())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    f.render_widget(block, popup_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(popup_area);

    let path_str = app.browser_path.to_string_lossy();
    let path_display = Paragraph::new(Line::from(vec![
        Span::styled("󰉋 ", Style::default().fg(accent())),
        Span::styled(path_str.as_ref(), Style::default().fg(text())),
    ]))
    .block(Block::default().borders(Borders::BOTTOM).border_style(Style::default().fg(inactive())));
    f.render_widget(path_display, inner[0]);

    let rows: Vec<Row> = if app.browser_entries.is_empty() {
        vec![Row::new(vec![
            Span::styled("  No images in this directory", Style::default().fg(text_dim())),
        ])]
    } else {
        app.browser_entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let icon = if entry.is_dir { "󰉋" } else { "󰋩" };
                let icon_color = if entry.is_dir { accent() } else { success() };

                let row_style = if i == app.browser_selected {
                    Style::default().bg(bg_selected()).fg(text())
                } else {
                    Style::default()
                };

                Row::new(vec![
                    Span::styled(format!("  {} ", icon), Style::default().fg(icon_color)),
                    Span::styled(&entry.name, Style::default().fg(text())),
                ])
                .style(row_style)
            })
            .collect()
    };

    let widths = [Constraint::Length(5), Constraint::Percentage(90)];
    f.render_widget(Table::new(rows, widths), inner[1]);

    let hint = Paragraph::new(Line::from(vec![
        Span::styled("j/k", Style::default().fg(accent())),
        Span::raw(" nav │ "),
        Span::styled("Enter", Style::default().fg(accent())),
        Span::raw(" select │ "),
        Span::styled("Backspace", Style::default().fg(accent())),
        Span::raw(" up │ "),
        Span::styled("h", Style::default().fg(accent())),
        Span::raw(" home │ "),
        Span::styled("Esc", Style::default().fg(accent())),
        Span::raw(" cancel"),
    ]))
    .alignment(Alignment::Center)
    .style(Style::default().fg(text_dim()));
    f.render_widget(hint, inner[2]);
}

fn draw_path_input(f: &mut Frame, app: &App) {
    let area = f.area();
    let popup_area = centered_rect(if area.width < 80 { 90 } else { 60 }, 20, area);

    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(Span::styled(format!(" Path for {} ", app.target.label()), Style::default().fg(accent())))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent()));

    let content = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("> ", Style::default().fg(accent())),
            Span::styled(app.input_buffer.as_str(), Style::default().fg(text())),
            Span::styled("█", Style::default().fg(accent())),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(accent())),
            Span::styled(" select │ ", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" cancel", Style::default().fg(text_dim())),
        ]),
    ])
    .block(block)
    .wrap(Wrap { trim: false });

    f.render_widget(content, popup_area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 60 },
        if area.height < 30 { 95 } else { 70 },
        area
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(header()).add_modifier(Modifier::BOLD)))
    };
    let binding = |keys: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<12}", keys), Style::default().fg(accent())),
            Span::raw(what),
        ])
    };

    let help_text = vec![
        section("═══ Navigation ═══"),
        binding("Tab/←/→", "Move between image slots and the estimate button"),
        binding("1 2 3", "Jump to front / side / standing slot"),
        Line::from(""),
        section("═══ Images ═══"),
        binding("Enter/o", "Browse for an image"),
        binding("p", "Type or paste a path"),
        binding("drop", "Drag a file onto the terminal to fill the focused slot"),
        binding("d/Del", "Clear the focused slot"),
        Line::from(""),
        section("═══ Estimation ═══"),
        binding("e", "Estimate body measurements (needs all three images)"),
        binding("Esc", "Cancel a running estimation"),
        Line::from(""),
        binding("?/h", "Toggle this help"),
        binding("q/Ctrl+c", "Quit"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .style(Style::default().fg(text()))
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::estimate::error::{EstimateError, GENERIC_FAILURE_MESSAGE};
    use crate::estimate::results::MeasurementResult;
    use crate::estimate::tests::selection;
    use crate::estimate::{Command, Estimation, Event};
    use ratatui::{backend::TestBackend, Terminal};

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 40)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_empty_screen_shows_three_slots() {
        let app = App::new(AppConfig::default()).unwrap();
        let out = screen(&app);
        for view in View::ALL {
            assert!(out.contains(view.label()), "missing {}", view.label());
        }
        assert!(out.contains("(0/3 images)"));
    }

    #[tokio::test]
    async fn test_missing_images_error_is_rendered() {
        let mut app = App::new(AppConfig::default()).unwrap();
        app.estimate();
        let out = screen(&app);
        assert!(out.contains("Please upload all three images"));
    }

    fn settled(outcome: Result<MeasurementResult, EstimateError>) -> Estimation {
        let mut estimation = Estimation::new();
        for view in View::ALL {
            let name = format!("{}.jpg", view.field_name());
            estimation = estimation.step(Event::Select(view, selection(&name, b"abc"))).0;
        }
        let (estimation, command) = estimation.step(Event::Estimate);
        let Some(Command::Submit { request, .. }) = command else {
            panic!("expected a submit command");
        };
        estimation.step(Event::Completed { request, outcome }).0
    }

    #[tokio::test]
    async fn test_success_renders_results_and_metadata() {
        let result = MeasurementResult::from_body(
            r#"{"measurements":{"estimated_height_cm":170.2,"shoulder_width_cm":45.0,"arm_length_cm":60.5,"leg_length_cm":95.3},"views_used":3,"accuracy_note":"high"}"#,
        )
        .unwrap();
        let mut app = App::new(AppConfig::default()).unwrap();
        app.set_estimation(settled(Ok(result)));

        let out = screen(&app);
        assert!(out.contains("170.2 cm"));
        assert!(out.contains("95.3 cm"));
        assert!(out.contains("Views Used: 3"));
        assert!(out.contains("Accuracy: high"));
        assert!(!out.contains(GENERIC_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_remote_status_shows_generic_message_only() {
        let mut app = App::new(AppConfig::default()).unwrap();
        app.set_estimation(settled(Err(EstimateError::RemoteStatus(500))));

        let out = screen(&app);
        assert!(out.contains(GENERIC_FAILURE_MESSAGE));
        assert!(!out.contains("500"));
        assert!(!out.contains("Views Used"));
    }
}
