use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{info, warn};

use crate::config::Config;
use crate::level::Level;
use crate::runtime::{AppEvent, Dispatcher};
use crate::session::{Applied, Control, PhaseKind, SessionLifecycle, SessionReply};
use crate::stats::{StatsReply, StatsView};

/// Application model: the session lifecycle, the stats projection and the
/// dispatcher that carries their requests to the backend
pub struct App {
    session: SessionLifecycle,
    stats: StatsView,
    dispatcher: Dispatcher,
    api_base_url: String,
    now: Instant,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config, dispatcher: Dispatcher, now: Instant) -> Self {
        Self {
            session: SessionLifecycle::new(),
            stats: StatsView::new(config.goals(), config.poll_interval()),
            dispatcher,
            api_base_url: config.api_base_url.clone(),
            now,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &SessionLifecycle {
        &self.session
    }

    pub fn stats(&self) -> &StatsView {
        &self.stats
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Clock reading of the last handled event
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn handle_event(&mut self, event: AppEvent, now: Instant) {
        self.now = now;
        match event {
            AppEvent::Key(key) => self.on_key(key),
            AppEvent::Resize | AppEvent::Tick => {}
            AppEvent::Session(reply) => self.on_session_reply(reply),
            AppEvent::Stats(reply) => self.on_stats_reply(reply),
        }
        // Ticks only arrive when the channel goes quiet, so poll on every event
        self.poll_stats();
    }

    fn poll_stats(&mut self) {
        if let Some(request) = self.stats.poll(self.now) {
            self.dispatcher.stats(request);
        }
    }

    /// Fetch stats now instead of waiting for the next poll
    pub fn refresh_stats(&mut self) {
        self.stats.invalidate();
        self.poll_stats();
    }

    fn on_session_reply(&mut self, reply: SessionReply) {
        let applied = self.session.apply(reply, self.now);
        if applied == Applied::Stale {
            info!(phase = %self.session.kind(), "dropped reply for an abandoned action");
        }
    }

    fn on_stats_reply(&mut self, reply: StatsReply) {
        self.stats.apply(reply);
    }

    /// Carry out a control if the current phase offers it
    pub fn perform(&mut self, control: Control) -> bool {
        match control {
            Control::Start => self.session.request_start(),
            Control::Cancel => self.session.cancel(),
            Control::ChooseLevel(level) => match self.session.choose_level(level) {
                Some(request) => {
                    self.dispatcher.session(request);
                    true
                }
                None => false,
            },
            Control::Stop => match self.session.request_stop() {
                Some(request) => {
                    self.dispatcher.session(request);
                    true
                }
                None => false,
            },
            Control::Confirm => match self.session.confirm() {
                Some(_refresh) => {
                    self.refresh_stats();
                    true
                }
                None => false,
            },
            Control::Discard => match self.session.discard() {
                Some(request) => {
                    self.dispatcher.session(request);
                    true
                }
                None => false,
            },
        }
    }

    fn quit(&mut self) {
        if let Some(session_id) = self.session.session_id() {
            warn!(
                session = %session_id,
                phase = %self.session.kind(),
                "quitting with a session still open on the backend"
            );
        }
        self.should_quit = true;
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        let phase = self.session.kind();
        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char('r') => self.refresh_stats(),
            KeyCode::Esc => {
                if phase == PhaseKind::ChoosingLevel {
                    self.perform(Control::Cancel);
                } else {
                    self.quit();
                }
            }
            code => {
                if let Some(control) = control_for_key(phase, code) {
                    self.perform(control);
                }
            }
        }
    }
}

fn control_for_key(phase: PhaseKind, code: KeyCode) -> Option<Control> {
    match (phase, code) {
        (PhaseKind::Idle, KeyCode::Enter | KeyCode::Char(' ')) => Some(Control::Start),
        (PhaseKind::ChoosingLevel, KeyCode::Char(c)) => {
            Level::from_hotkey(c).map(Control::ChooseLevel)
        }
        (PhaseKind::Running, KeyCode::Enter | KeyCode::Char('s')) => Some(Control::Stop),
        (PhaseKind::Confirming, KeyCode::Enter | KeyCode::Char('y')) => Some(Control::Confirm),
        (PhaseKind::Confirming, KeyCode::Char('d')) => Some(Control::Discard),
        _ => None,
    }
}

/// Key legend for a control
pub fn key_hint(control: Control) -> (&'static str, String) {
    match control {
        Control::Start => ("enter", "start session".to_string()),
        Control::ChooseLevel(level) => match level {
            Level::B1Plus => ("1", format!("study {level}")),
            Level::B2 => ("2", format!("study {level}")),
        },
        Control::Cancel => ("esc", "cancel".to_string()),
        Control::Stop => ("s", "stop".to_string()),
        Control::Confirm => ("y", "log it".to_string()),
        Control::Discard => ("d", "discard".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, ApiError, ScriptedApi, SessionId, Stats, StopOutcome};
    use crate::runtime::event_channel;
    use std::sync::mpsc::Receiver;
    use std::sync::Arc;
    use std::time::Duration;

    fn stats() -> Stats {
        Stats {
            b1_plus_hours: 10.0,
            b2_hours: 0.0,
            total_hours: 10.0,
            b1_plus_goal_hours: 200.0,
            b2_goal_hours: 320.0,
            daily_b1_plus: Vec::new(),
            daily_b2: Vec::new(),
        }
    }

    fn setup() -> (App, Arc<ScriptedApi>, Receiver<AppEvent>, Instant) {
        let api = Arc::new(ScriptedApi::new());
        let (tx, rx) = event_channel();
        let config = Config {
            poll_interval_secs: 3600,
            ..Config::default()
        };
        let now = Instant::now();
        let app = App::new(&config, Dispatcher::new(api.clone(), tx), now);
        (app, api, rx, now)
    }

    fn pump(app: &mut App, rx: &Receiver<AppEvent>, now: Instant) {
        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("backend reply");
        app.handle_event(event, now);
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn first_tick_loads_stats() {
        let (mut app, api, rx, now) = setup();
        api.push_stats(Ok(stats()));
        assert!(app.stats().is_loading());

        app.handle_event(AppEvent::Tick, now);
        pump(&mut app, &rx, now);

        assert_eq!(app.stats().snapshot(), Some(&stats()));
        assert_eq!(api.stats_calls(), 1);
    }

    #[test]
    fn confirm_flow_refetches_stats_once() {
        let (mut app, api, rx, now) = setup();
        api.push_stats(Ok(stats()));
        api.push_stats(Ok(stats()));
        api.push_start(Ok(SessionId::new("s1")));
        api.push_stop(Ok(StopOutcome::Stopped {
            duration_minutes: 42,
        }));

        app.handle_event(AppEvent::Tick, now);
        pump(&mut app, &rx, now);

        app.on_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(app.session().kind(), PhaseKind::ChoosingLevel);
        app.on_key(key('1'));
        pump(&mut app, &rx, now);
        assert_eq!(app.session().kind(), PhaseKind::Running);

        app.on_key(key('s'));
        pump(&mut app, &rx, now);
        assert_eq!(app.session().state().duration_minutes, Some(42));

        app.on_key(key('y'));
        assert_eq!(app.session().kind(), PhaseKind::Idle);
        assert_eq!(app.session().session_id(), None);
        pump(&mut app, &rx, now);

        assert_eq!(api.stats_calls(), 2);
        assert_eq!(
            api.calls(),
            vec![
                ApiCall::GetStats,
                ApiCall::Start(Level::B1Plus),
                ApiCall::Stop(SessionId::new("s1")),
                ApiCall::GetStats,
            ]
        );
    }

    #[test]
    fn discard_flow_does_not_refetch() {
        let (mut app, api, rx, now) = setup();
        api.push_stats(Ok(stats()));
        api.push_start(Ok(SessionId::new("s1")));
        api.push_stop(Ok(StopOutcome::Stopped {
            duration_minutes: 42,
        }));
        api.push_discard(Ok(()));

        app.handle_event(AppEvent::Tick, now);
        pump(&mut app, &rx, now);

        assert!(app.perform(Control::Start));
        assert!(app.perform(Control::ChooseLevel(Level::B2)));
        pump(&mut app, &rx, now);
        assert!(app.perform(Control::Stop));
        pump(&mut app, &rx, now);
        assert!(app.perform(Control::Discard));
        pump(&mut app, &rx, now);

        assert_eq!(app.session().kind(), PhaseKind::Idle);
        app.handle_event(AppEvent::Tick, now);
        assert_eq!(api.stats_calls(), 1);
        assert_eq!(
            api.calls().last(),
            Some(&ApiCall::Discard(SessionId::new("s1")))
        );
    }

    #[test]
    fn escape_cancels_level_choice_and_ignores_late_start() {
        let (mut app, api, rx, now) = setup();
        api.push_start(Ok(SessionId::new("late")));

        app.on_key(key(' '));
        app.on_key(key('2'));
        app.on_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert_eq!(app.session().kind(), PhaseKind::Idle);
        assert!(!app.should_quit());

        pump(&mut app, &rx, now);
        assert_eq!(app.session().kind(), PhaseKind::Idle);
        assert_eq!(app.session().session_id(), None);
    }

    #[test]
    fn failed_start_surfaces_error() {
        let (mut app, api, rx, now) = setup();
        api.push_start(Err(ApiError::Status {
            path: "/api/sessions/start".into(),
            status: 400,
            body: "level must be B1_PLUS or B2".into(),
        }));

        app.perform(Control::Start);
        app.perform(Control::ChooseLevel(Level::B1Plus));
        pump(&mut app, &rx, now);

        assert_eq!(app.session().kind(), PhaseKind::ChoosingLevel);
        assert!(app.session().error().unwrap().contains("400"));
    }

    #[test]
    fn keys_outside_phase_do_nothing() {
        let (mut app, api, _rx, _now) = setup();
        app.on_key(key('s'));
        app.on_key(key('y'));
        app.on_key(key('d'));
        app.on_key(key('1'));
        assert_eq!(app.session().kind(), PhaseKind::Idle);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn quit_keys() {
        let (mut app, _api, _rx, _now) = setup();
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());

        let (mut app, _api, _rx, _now) = setup();
        app.on_key(key('q'));
        assert!(app.should_quit());

        let (mut app, _api, _rx, _now) = setup();
        app.on_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(app.should_quit());
    }

    #[test]
    fn refresh_key_fetches_immediately() {
        let (mut app, api, rx, now) = setup();
        api.push_stats(Ok(stats()));
        app.handle_event(AppEvent::Tick, now);
        pump(&mut app, &rx, now);

        app.on_key(key('r'));
        pump(&mut app, &rx, now);
        assert_eq!(api.stats_calls(), 2);
        assert!(app.stats().error().is_some(), "second fetch was unscripted");
    }

    #[test]
    fn busy_event_stream_keeps_polling() {
        let api = Arc::new(ScriptedApi::new());
        let (tx, rx) = event_channel();
        let config = Config {
            poll_interval_secs: 1,
            ..Config::default()
        };
        let start = Instant::now();
        let mut app = App::new(&config, Dispatcher::new(api.clone(), tx), start);

        // resizes every 100ms for 3.5s, never a tick
        for step in 0..=35u64 {
            let now = start + Duration::from_millis(step * 100);
            app.handle_event(AppEvent::Resize, now);
            if app.stats().is_fetching() {
                pump(&mut app, &rx, now);
            }
        }

        assert_eq!(api.stats_calls(), 4);
    }

    #[test]
    fn control_key_mapping() {
        assert_eq!(
            control_for_key(PhaseKind::Idle, KeyCode::Enter),
            Some(Control::Start)
        );
        assert_eq!(
            control_for_key(PhaseKind::ChoosingLevel, KeyCode::Char('2')),
            Some(Control::ChooseLevel(Level::B2))
        );
        assert_eq!(
            control_for_key(PhaseKind::Confirming, KeyCode::Char('d')),
            Some(Control::Discard)
        );
        assert_eq!(
            control_for_key(PhaseKind::Running, KeyCode::Char('d')),
            None
        );
    }

    #[test]
    fn key_hints_name_levels() {
        assert_eq!(
            key_hint(Control::ChooseLevel(Level::B1Plus)),
            ("1", "study B1+".to_string())
        );
        assert_eq!(key_hint(Control::Confirm).1, "log it");
    }
}
