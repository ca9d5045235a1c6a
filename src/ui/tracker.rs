use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::{
    app::App,
    level::Level,
    session::Phase,
    util::{duration_label, format_clock},
};

pub fn render_tracker(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let pending_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::ITALIC);

    let session = app.session();
    let mut lines: Vec<Line> = vec![Line::from("")];

    match session.phase() {
        Phase::Idle => {
            lines.push(Line::from(Span::styled(
                "[  START  ]",
                bold_style.fg(Color::Cyan),
            )));
            lines.push(Line::from(Span::styled(
                "Press enter to begin a study session",
                dim_style,
            )));
        }
        Phase::ChoosingLevel { pending } => {
            lines.push(Line::from("Which level are you studying?"));
            let mut choices = Vec::new();
            for level in Level::ALL {
                let chosen = pending.is_some_and(|p| p.level == level);
                let style = if chosen {
                    bold_style.fg(Color::Cyan)
                } else if pending.is_some() {
                    dim_style
                } else {
                    bold_style
                };
                choices.push(Span::styled(format!("[{}] {level}", level.hotkey()), style));
                choices.push(Span::raw("    "));
            }
            choices.pop();
            lines.push(Line::from(choices));
            match pending {
                Some(p) => lines.push(Line::from(Span::styled(
                    format!("Starting {} session…", p.level),
                    pending_style,
                ))),
                None => lines.push(Line::from(Span::styled("esc to cancel", dim_style))),
            }
        }
        Phase::Running {
            level,
            started_wall,
            stopping,
            ..
        } => {
            lines.push(Line::from(Span::styled(
                format!("● Session running · {level}"),
                bold_style.fg(Color::Green),
            )));
            let elapsed = session.elapsed(app.now()).unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(format_clock(elapsed), bold_style),
                Span::styled(
                    format!("  since {}", started_wall.format("%H:%M")),
                    dim_style,
                ),
            ]));
            if stopping.is_some() {
                lines.push(Line::from(Span::styled("Stopping…", pending_style)));
            } else {
                lines.push(Line::from(Span::styled(
                    "Press s when you're done studying",
                    dim_style,
                )));
            }
        }
        Phase::Confirming {
            duration_minutes,
            discarding,
            ..
        } => {
            lines.push(Line::from(Span::styled(
                format!("You studied {}.", duration_label(*duration_minutes)),
                bold_style,
            )));
            lines.push(Line::from(Span::styled(
                "Do you want to log this session?",
                dim_style,
            )));
            if discarding.is_some() {
                lines.push(Line::from(Span::styled("Discarding…", pending_style)));
            } else {
                lines.push(Line::from(vec![
                    Span::styled("[y] ✓ Log it", bold_style.fg(Color::Green)),
                    Span::raw("    "),
                    Span::styled("[d] Discard", bold_style),
                ]));
            }
        }
    }

    if let Some(error) = session.error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red),
        )));
    }

    let (title, border_style) = if session.is_busy() {
        (" Session · waiting for backend ", pending_style)
    } else {
        (" Session ", Style::default())
    };

    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}
