use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge, Paragraph, Widget},
};

use crate::{
    app::App,
    level::Level,
    stats::{DailySeries, Progress},
    ui::charting::{bar_points, chart_max, recent_window, BAR_GAP, BAR_WIDTH},
    util::{format_goal, format_hours},
};

const PROGRESS_HEIGHT: u16 = 3;

fn level_color(level: Level) -> Color {
    match level {
        Level::B1Plus => Color::Rgb(108, 138, 255),
        Level::B2 => Color::Rgb(167, 139, 250),
    }
}

const COMBINED_COLOR: Color = Color::Rgb(74, 222, 128);

fn section_title(text: &str) -> Paragraph<'static> {
    Paragraph::new(Span::styled(
        text.to_uppercase(),
        Style::default().add_modifier(Modifier::BOLD | Modifier::DIM),
    ))
}

pub fn render_dashboard(app: &App, area: Rect, buf: &mut Buffer) {
    let stats = app.stats();
    let title = if stats.is_fetching() {
        " Progress · refreshing… "
    } else {
        " Progress "
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    block.render(area, buf);

    let dashboard = stats.dashboard();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(1)
        .constraints([
            Constraint::Length(1),                   // heading
            Constraint::Length(1),                   // load error
            Constraint::Length(PROGRESS_HEIGHT * 3), // progress bars
            Constraint::Length(1),                   // heading
            Constraint::Min(0),                      // daily charts
        ])
        .split(inner);

    section_title("Cumulative Progress").render(chunks[0], buf);

    if let Some(error) = &dashboard.error {
        Paragraph::new(Span::styled(error.as_str(), Style::default().fg(Color::Red)))
            .render(chunks[1], buf);
    } else if stats.is_loading() {
        let dim = Style::default().add_modifier(Modifier::DIM);
        Paragraph::new(Span::styled("Loading stats…", dim))
            .render(chunks[1], buf);
    }

    let colors = [
        level_color(Level::B1Plus),
        level_color(Level::B2),
        COMBINED_COLOR,
    ];
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(PROGRESS_HEIGHT); 3])
        .split(chunks[2]);
    for ((progress, color), row) in dashboard.progress.iter().zip(colors).zip(rows.iter()) {
        render_progress(progress, color, dashboard.placeholder, *row, buf);
    }

    section_title("Daily Activity").render(chunks[3], buf);

    let charts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)])
        .split(chunks[4]);
    if dashboard.placeholder {
        for (level, area) in Level::ALL.into_iter().zip(charts.iter()) {
            render_daily(
                &DailySeries {
                    title: format!("Daily {level} Activity"),
                    level,
                    points: Vec::new(),
                },
                *area,
                buf,
            );
        }
    } else {
        for (series, area) in dashboard.daily.iter().zip(charts.iter()) {
            render_daily(series, *area, buf);
        }
    }
}

fn render_progress(
    progress: &Progress,
    color: Color,
    placeholder: bool,
    area: Rect,
    buf: &mut Buffer,
) {
    let lines = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    let text_style = if placeholder {
        Style::default().add_modifier(Modifier::DIM)
    } else {
        Style::default()
    };

    Paragraph::new(Span::styled(
        progress.label.as_str(),
        text_style.add_modifier(Modifier::BOLD),
    ))
    .render(lines[0], buf);
    Paragraph::new(Line::from(vec![
        Span::styled(
            format_hours(progress.hours),
            text_style.add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" / {}", format_goal(progress.goal_hours)),
            text_style,
        ),
    ]))
    .alignment(Alignment::Right)
    .render(lines[0], buf);

    Gauge::default()
        .gauge_style(Style::default().fg(color).bg(Color::DarkGray))
        .ratio(progress.ratio())
        .label("")
        .render(lines[1], buf);

    if placeholder {
        return;
    }

    Paragraph::new(Span::styled(
        format!("{:.1}% complete", progress.percent()),
        Style::default().add_modifier(Modifier::DIM),
    ))
    .render(lines[2], buf);
    let remaining = if progress.is_goal_reached() {
        Span::styled(
            "Goal reached! 🎉",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw(format!("{} remaining", format_hours(progress.remaining())))
    };
    Paragraph::new(remaining)
        .alignment(Alignment::Right)
        .render(lines[2], buf);
}

fn render_daily(series: &DailySeries, area: Rect, buf: &mut Buffer) {
    let block = Block::default()
        .borders(Borders::TOP)
        .title(format!(" {} ", series.title));

    if series.points.is_empty() {
        let inner = block.inner(area);
        block.render(area, buf);
        Paragraph::new(Span::styled(
            format!("No data for {} yet.", series.title),
            Style::default().add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(inner, buf);
        return;
    }

    let points = bar_points(&series.points);
    let window = recent_window(&points, area.width);
    let bars: Vec<Bar> = window
        .iter()
        .map(|p| {
            Bar::default()
                .value(p.value)
                .label(Line::from(p.label.clone()))
                .text_value(p.text.clone())
        })
        .collect();

    BarChart::default()
        .block(block)
        .bar_width(BAR_WIDTH)
        .bar_gap(BAR_GAP)
        .bar_style(Style::default().fg(level_color(series.level)))
        .value_style(
            Style::default()
                .fg(Color::Black)
                .bg(level_color(series.level)),
        )
        .max(chart_max(window))
        .data(BarGroup::default().bars(&bars))
        .render(area, buf);
}
