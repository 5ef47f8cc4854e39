mod api;
mod app;
mod application;
mod domain;
mod ui;
mod utils;

use tracing_subscriber::EnvFilter;

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,learnweb_downloader=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> iced::Result {
    init_logging();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("LearnWeb Downloader")
        .run()
}
