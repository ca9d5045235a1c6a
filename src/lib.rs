// Library surface for the binary and for headless/integration tests.
pub mod api;
pub mod app;
pub mod app_dirs;
pub mod config;
pub mod level;
pub mod logging;
pub mod report;
pub mod runtime;
pub mod session;
pub mod stats;
pub mod ui;
pub mod util;
