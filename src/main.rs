use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin, Stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use study_tracker::{
    api::{HttpApi, StudyApi},
    app::App,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    logging,
    report::text_report,
    runtime::{
        event_channel, AppEvent, CrosstermEventSource, Dispatcher, EventSource, FixedTicker,
        Runner, Ticker,
    },
    stats::StatsView,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const TICK_RATE_MS: u64 = 250;

/// terminal study-session timer with progress toward B1+ and B2 German goals
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Time study sessions against a tracker backend, decide whether each one gets logged, and watch cumulative progress toward the B1+ and B2 hour goals."
)]
pub struct Cli {
    /// base URL of the tracker backend
    #[clap(short = 'u', long)]
    api_url: Option<String>,

    /// seconds between stats refreshes
    #[clap(short = 'p', long)]
    poll_secs: Option<u64>,

    /// seconds before a backend request is abandoned
    #[clap(short = 't', long)]
    timeout_secs: Option<u64>,

    /// config file to use instead of the default location
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// write the effective settings back to the config file
    #[clap(long)]
    save_config: bool,

    /// print a progress report and exit without starting the TUI
    #[clap(long)]
    stats: bool,

    /// log at debug level
    #[clap(long)]
    debug: bool,
}

impl Cli {
    /// Overlay command line flags on the stored settings
    fn apply_to(&self, mut config: Config) -> Config {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(secs) = self.poll_secs {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout_secs = secs;
        }
        config
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let _log_guard = start_logging(AppDirs::log_path().as_deref(), cli.debug);

    let store = cli.config_store();
    let config = cli.apply_to(store.load());
    if cli.save_config {
        store.save(&config)?;
        info!(path = %store.path().display(), "saved config");
    }

    let http = HttpApi::new(&config.api_base_url, config.request_timeout())?;
    info!(api = %http.base_url(), "study tracker starting");
    let api: Arc<dyn StudyApi> = Arc::new(http);

    if cli.stats {
        return print_stats(api.as_ref(), &config);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut terminal = setup_terminal()?;

    let (tx, rx) = event_channel();
    let mut app = App::new(&config, Dispatcher::new(api, tx.clone()), Instant::now());
    let runner = Runner::new(
        CrosstermEventSource::new(tx, rx),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        warn!(error = %err, "tui exited with an error");
    }
    result
}

/// Open the log file, or explain on stderr why there will be none
fn start_logging(log_path: Option<&Path>, debug: bool) -> Option<WorkerGuard> {
    let Some(path) = log_path else {
        eprintln!("study-tracker: no state directory found, logging disabled");
        return None;
    };
    match logging::init_logging(path, debug) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!(
                "study-tracker: cannot write log file {}: {err}",
                path.display()
            );
            None
        }
    }
}

/// Run `setup`; if it fails, run `restore` before handing back the error
fn rollback_on_error<T>(
    setup: impl FnOnce() -> io::Result<T>,
    restore: impl FnOnce(),
) -> io::Result<T> {
    setup().inspect_err(|_| restore())
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    rollback_on_error(
        || {
            let mut stdout = io::stdout();
            execute!(stdout, EnterAlternateScreen)?;
            Terminal::new(CrosstermBackend::new(stdout))
        },
        || {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            let _ = disable_raw_mode();
        },
    )
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    // first tick fetches stats on mount
    app.handle_event(AppEvent::Tick, Instant::now());

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        let event = runner.step();
        app.handle_event(event, Instant::now());

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

fn print_stats(api: &dyn StudyApi, config: &Config) -> Result<(), Box<dyn Error>> {
    let mut view = StatsView::new(config.goals(), config.poll_interval());
    if let Some(request) = view.poll(Instant::now()) {
        view.apply(request.execute(api));
    }

    print!("{}", text_report(&view.dashboard()));

    match view.error() {
        Some(err) => Err(err.to_string().into()),
        None => Ok(()),
    }
}
