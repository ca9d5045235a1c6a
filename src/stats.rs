//! Read-only projection of the backend's aggregate statistics.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::api::{ApiError, DailyHours, Stats, StudyApi};
use crate::level::Level;
use crate::session::{Applied, Ticket};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const LOAD_ERROR_MESSAGE: &str = "Could not load stats. Is the backend running?";

/// Fixed targets shown before the first snapshot arrives
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goals {
    pub b1_plus_hours: f64,
    pub b2_hours: f64,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            b1_plus_hours: 200.0,
            b2_hours: 320.0,
        }
    }
}

/// Progress toward a single goal
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub label: String,
    pub hours: f64,
    pub goal_hours: f64,
}

impl Progress {
    pub fn new(label: impl Into<String>, hours: f64, goal_hours: f64) -> Self {
        Self {
            label: label.into(),
            hours,
            goal_hours,
        }
    }

    /// Percent complete, never above 100
    pub fn percent(&self) -> f64 {
        if self.goal_hours <= 0.0 {
            return 100.0;
        }
        (self.hours / self.goal_hours * 100.0).clamp(0.0, 100.0)
    }

    pub fn ratio(&self) -> f64 {
        self.percent() / 100.0
    }

    pub fn remaining(&self) -> f64 {
        (self.goal_hours - self.hours).max(0.0)
    }

    pub fn is_goal_reached(&self) -> bool {
        self.remaining() <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub title: String,
    pub level: Level,
    pub points: Vec<DailyHours>,
}

/// Everything the dashboard needs to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    /// No snapshot yet: zero progress against the fixed goals
    pub placeholder: bool,
    pub progress: Vec<Progress>,
    pub daily: Vec<DailySeries>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl PollSchedule {
    /// Due immediately, then every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !matches!(self.next_due, Some(due) if now < due)
    }

    pub fn fetched(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn expedite(&mut self) {
        self.next_due = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsRequest {
    pub ticket: Ticket,
}

impl StatsRequest {
    pub fn execute(self, api: &dyn StudyApi) -> StatsReply {
        StatsReply {
            ticket: self.ticket,
            result: api.get_stats(),
        }
    }
}

#[derive(Debug)]
pub struct StatsReply {
    pub ticket: Ticket,
    pub result: Result<Stats, ApiError>,
}

#[derive(Debug)]
pub struct StatsView {
    goals: Goals,
    snapshot: Option<Stats>,
    error: Option<String>,
    schedule: PollSchedule,
    in_flight: Option<Ticket>,
    refetch_queued: bool,
    next_ticket: u64,
}

impl StatsView {
    pub fn new(goals: Goals, poll_interval: Duration) -> Self {
        Self {
            goals,
            snapshot: None,
            error: None,
            schedule: PollSchedule::new(poll_interval),
            in_flight: None,
            refetch_queued: false,
            next_ticket: 1,
        }
    }

    pub fn snapshot(&self) -> Option<&Stats> {
        self.snapshot.as_ref()
    }

    /// Detail of the last failed fetch, if the most recent one failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.is_none() && self.error.is_none()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn poll_interval(&self) -> Duration {
        self.schedule.interval()
    }

    /// Issue a fetch when one is due and none is in flight
    pub fn poll(&mut self, now: Instant) -> Option<StatsRequest> {
        if self.in_flight.is_some() || !self.schedule.is_due(now) {
            return None;
        }
        let ticket = Ticket::new(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        self.schedule.fetched(now);
        debug!(?ticket, "fetching stats");
        Some(StatsRequest { ticket })
    }

    /// Make the next poll fetch immediately. With a fetch already in flight,
    /// one more fetch follows it.
    pub fn invalidate(&mut self) {
        if self.in_flight.is_some() {
            self.refetch_queued = true;
        } else {
            self.schedule.expedite();
        }
    }

    pub fn apply(&mut self, reply: StatsReply) -> Applied {
        if self.in_flight != Some(reply.ticket) {
            debug!(ticket = ?reply.ticket, "ignoring stale stats reply");
            return Applied::Stale;
        }
        self.in_flight = None;
        if self.refetch_queued {
            self.refetch_queued = false;
            self.schedule.expedite();
        }

        match reply.result {
            Ok(stats) => {
                debug!(total_hours = stats.total_hours, "stats refreshed");
                self.snapshot = Some(stats);
                self.error = None;
                Applied::Advanced
            }
            Err(err) => {
                warn!(error = %err, "stats fetch failed");
                self.error = Some(err.to_string());
                Applied::Failed
            }
        }
    }

    pub fn dashboard(&self) -> Dashboard {
        let error = self.error.as_ref().map(|_| LOAD_ERROR_MESSAGE.to_string());

        let Some(stats) = &self.snapshot else {
            let combined = self.goals.b1_plus_hours + self.goals.b2_hours;
            return Dashboard {
                placeholder: true,
                progress: vec![
                    Progress::new("B1+ Progress", 0.0, self.goals.b1_plus_hours),
                    Progress::new("B2 Progress", 0.0, self.goals.b2_hours),
                    Progress::new("Combined Total", 0.0, combined),
                ],
                daily: Vec::new(),
                error,
            };
        };

        Dashboard {
            placeholder: false,
            progress: vec![
                Progress::new(
                    "B1+ Completion",
                    stats.hours(Level::B1Plus),
                    stats.goal_hours(Level::B1Plus),
                ),
                Progress::new(
                    "B2 Completion",
                    stats.hours(Level::B2),
                    stats.goal_hours(Level::B2),
                ),
                Progress::new(
                    "Combined Total",
                    stats.total_hours,
                    stats.combined_goal_hours(),
                ),
            ],
            daily: Level::ALL
                .into_iter()
                .map(|level| DailySeries {
                    title: format!("Daily {level} Activity"),
                    level,
                    points: stats.daily(level).to_vec(),
                })
                .collect(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stats() -> Stats {
        Stats {
            b1_plus_hours: 50.0,
            b2_hours: 250.0,
            total_hours: 300.0,
            b1_plus_goal_hours: 200.0,
            b2_goal_hours: 200.0,
            daily_b1_plus: vec![DailyHours {
                date: "2026-10-18".to_string(),
                hours: 1.5,
            }],
            daily_b2: Vec::new(),
        }
    }

    fn ok_reply(req: StatsRequest) -> StatsReply {
        StatsReply {
            ticket: req.ticket,
            result: Ok(sample_stats()),
        }
    }

    #[test]
    fn percent_and_remaining() {
        let p = Progress::new("B1+", 50.0, 200.0);
        assert_eq!(p.percent(), 25.0);
        assert_eq!(p.remaining(), 150.0);
        assert!(!p.is_goal_reached());

        let over = Progress::new("B2", 250.0, 200.0);
        assert_eq!(over.percent(), 100.0);
        assert_eq!(over.remaining(), 0.0);
        assert!(over.is_goal_reached());

        let exact = Progress::new("B2", 200.0, 200.0);
        assert!(exact.is_goal_reached());
        assert_eq!(exact.ratio(), 1.0);
    }

    #[test]
    fn placeholder_uses_fixed_goals_at_zero() {
        let view = StatsView::new(Goals::default(), DEFAULT_POLL_INTERVAL);
        assert!(view.is_loading());
        let dash = view.dashboard();
        assert!(dash.placeholder);
        let goals: Vec<f64> = dash.progress.iter().map(|p| p.goal_hours).collect();
        assert_eq!(goals, vec![200.0, 320.0, 520.0]);
        assert!(dash.progress.iter().all(|p| p.hours == 0.0));
        assert!(dash.daily.is_empty());
    }

    #[test]
    fn combined_goal_is_sum_of_goals() {
        let mut view = StatsView::new(Goals::default(), DEFAULT_POLL_INTERVAL);
        let req = view.poll(Instant::now()).unwrap();
        view.apply(ok_reply(req));
        let dash = view.dashboard();
        assert!(!dash.placeholder);
        let combined = &dash.progress[2];
        assert_eq!(combined.goal_hours, 400.0);
        assert_eq!(combined.hours, 300.0);
        assert_eq!(combined.percent(), 75.0);
        assert!(dash.progress[1].is_goal_reached());
    }

    #[test]
    fn daily_series_per_level() {
        let mut view = StatsView::new(Goals::default(), DEFAULT_POLL_INTERVAL);
        let req = view.poll(Instant::now()).unwrap();
        view.apply(ok_reply(req));
        let dash = view.dashboard();
        assert_eq!(dash.daily.len(), 2);
        assert_eq!(dash.daily[0].title, "Daily B1+ Activity");
        assert_eq!(dash.daily[0].points.len(), 1);
        assert_eq!(dash.daily[1].title, "Daily B2 Activity");
        assert!(dash.daily[1].points.is_empty());
    }

    #[test]
    fn polls_on_mount_then_on_interval() {
        let t0 = Instant::now();
        let mut view = StatsView::new(Goals::default(), Duration::from_secs(30));
        let req = view.poll(t0).unwrap();
        assert!(view.poll(t0).is_none(), "one fetch in flight at a time");
        view.apply(ok_reply(req));

        assert!(view.poll(t0 + Duration::from_secs(29)).is_none());
        assert!(view.poll(t0 + Duration::from_secs(30)).is_some());
    }

    #[test]
    fn invalidate_fetches_immediately() {
        let t0 = Instant::now();
        let mut view = StatsView::new(Goals::default(), Duration::from_secs(30));
        let req = view.poll(t0).unwrap();
        view.apply(ok_reply(req));
        assert!(view.poll(t0 + Duration::from_secs(1)).is_none());

        view.invalidate();
        assert!(view.poll(t0 + Duration::from_secs(1)).is_some());
    }

    #[test]
    fn invalidate_during_fetch_queues_exactly_one_more() {
        let t0 = Instant::now();
        let mut view = StatsView::new(Goals::default(), Duration::from_secs(30));
        let req = view.poll(t0).unwrap();
        view.invalidate();
        view.invalidate();
        assert!(view.poll(t0).is_none());

        view.apply(ok_reply(req));
        let follow_up = view.poll(t0).unwrap();
        view.apply(ok_reply(follow_up));
        assert!(view.poll(t0).is_none());
    }

    #[test]
    fn failure_keeps_last_snapshot_and_shows_error() {
        let t0 = Instant::now();
        let mut view = StatsView::new(Goals::default(), Duration::from_secs(30));
        let req = view.poll(t0).unwrap();
        view.apply(ok_reply(req));

        let req = view.poll(t0 + Duration::from_secs(30)).unwrap();
        let applied = view.apply(StatsReply {
            ticket: req.ticket,
            result: Err(ApiError::Status {
                path: "/api/stats".into(),
                status: 500,
                body: "boom".into(),
            }),
        });
        assert_eq!(applied, Applied::Failed);
        assert!(view.snapshot().is_some());
        assert!(view.error().unwrap().contains("boom"));
        assert_eq!(view.dashboard().error.as_deref(), Some(LOAD_ERROR_MESSAGE));

        // no extra retry: next fetch waits for the regular cadence
        assert!(view.poll(t0 + Duration::from_secs(31)).is_none());
        assert!(view.poll(t0 + Duration::from_secs(60)).is_some());
    }

    #[test]
    fn failure_before_first_load_is_not_loading() {
        let mut view = StatsView::new(Goals::default(), DEFAULT_POLL_INTERVAL);
        let req = view.poll(Instant::now()).unwrap();
        view.apply(StatsReply {
            ticket: req.ticket,
            result: Err(ApiError::Status {
                path: "/api/stats".into(),
                status: 502,
                body: String::new(),
            }),
        });
        assert!(!view.is_loading());
        let dash = view.dashboard();
        assert!(dash.placeholder);
        assert!(dash.error.is_some());
    }

    #[test]
    fn stale_reply_is_ignored() {
        let mut view = StatsView::new(Goals::default(), DEFAULT_POLL_INTERVAL);
        let _req = view.poll(Instant::now()).unwrap();
        let applied = view.apply(StatsReply {
            ticket: Ticket::new(42),
            result: Ok(sample_stats()),
        });
        assert_eq!(applied, Applied::Stale);
        assert!(view.snapshot().is_none());
        assert!(view.is_fetching());
    }
}
