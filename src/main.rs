mod app;
mod application;
mod config;
mod domain;
mod host;
mod storage;
mod ui;
mod utils;

use iced::{window, Size};
use tracing_subscriber::EnvFilter;

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metool=info")),
        )
        .init();

    iced::application(app::MeTool::new, app::update, app::view)
        .title("MeTool")
        .window(window::Settings {
            size: Size::new(860.0, 640.0),
            min_size: Some(Size::new(640.0, 480.0)),
            ..Default::default()
        })
        .run()
}
