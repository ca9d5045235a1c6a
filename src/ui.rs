pub mod charting;
pub mod dashboard;
pub mod tracker;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::{
    app::{key_hint, App},
    ui::{dashboard::render_dashboard, tracker::render_tracker},
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const TRACKER_HEIGHT: u16 = 8;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(3),              // header
                Constraint::Length(TRACKER_HEIGHT), // session tracker
                Constraint::Min(0),                 // dashboard
                Constraint::Length(1),              // key legend
            ])
            .split(area);

        Paragraph::new(vec![
            Line::from(Span::styled("German Learning Tracker", bold_style)),
            Line::from(Span::styled(
                "Track every hour. See every step forward.",
                dim_style,
            )),
            Line::from(Span::styled(
                format!(
                    "backend {} · refresh every {}s",
                    self.api_base_url(),
                    self.stats().poll_interval().as_secs()
                ),
                dim_style,
            )),
        ])
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        render_tracker(self, chunks[1], buf);
        render_dashboard(self, chunks[2], buf);

        let mut legend: Vec<Span> = Vec::new();
        for control in self.session().controls() {
            let (key, action) = key_hint(control);
            legend.push(Span::styled(format!("({key})"), bold_style));
            legend.push(Span::styled(format!(" {action}  "), dim_style));
        }
        legend.push(Span::styled("(r)", bold_style));
        legend.push(Span::styled("efresh  ", dim_style));
        legend.push(Span::styled("(q)", bold_style));
        legend.push(Span::styled("uit", dim_style));

        Paragraph::new(Line::from(legend))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }
}
