mod dependencies;
mod download;
mod history;
mod setup;

use std::path::Path;

use iced::{
    widget::{button, column, row, text, Space},
    Element, Length,
};

use crate::application::{
    DependencyRegistry, DownloadOrchestrator, GuidedSetup, HistoryStore, InstallSequencer,
    Language,
};
use crate::domain::DependencyName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Setup,
    Download,
    Dependencies,
    History,
}

/// Read-only view of the core handed to the screens.
pub struct ViewContext<'a> {
    pub orchestrator: &'a DownloadOrchestrator,
    pub registry: &'a DependencyRegistry,
    pub sequencer: &'a InstallSequencer,
    pub history: &'a HistoryStore,
    pub setup: Option<&'a GuidedSetup>,
    pub version: Option<&'a str>,
    pub install_dir: Option<&'a Path>,
}

impl ViewContext<'_> {
    /// True while any host operation holds the orchestrator or the tool gate.
    pub fn busy(&self) -> bool {
        self.orchestrator.is_busy() || self.sequencer.is_busy()
    }
}

/// Main view state
pub struct DownloadView {
    pub screen: Screen,
    pub confirming_clear: bool,
    pub install_status: String,
    pub notice: String,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            screen: Screen::Download,
            confirming_clear: false,
            install_status: String::new(),
            notice: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ViewMessage {
    UrlChanged(String),
    FetchPressed,
    FormatSelected(String),
    PickDestinationPressed,
    ResetDestinationPressed,
    DownloadPressed,
    Navigate(Screen),
    InstallPressed(DependencyName),
    InstallAllPressed,
    ClearHistoryPressed,
    ClearHistoryConfirmed(bool),
    LanguageSelected(Language),
    SetupNext,
    SetupSkip,
    SetupFinish,
}

impl DownloadView {
    /// Handles state that lives only in the view.
    pub fn update(&mut self, message: &ViewMessage) {
        match message {
            ViewMessage::Navigate(screen) => {
                self.screen = *screen;
                self.confirming_clear = false;
            }
            ViewMessage::ClearHistoryPressed => {
                self.confirming_clear = true;
            }
            ViewMessage::ClearHistoryConfirmed(_) => {
                self.confirming_clear = false;
            }
            ViewMessage::UrlChanged(_) | ViewMessage::FetchPressed | ViewMessage::DownloadPressed => {
                self.notice.clear();
            }
            _ => {
                // Will be handled by the app
            }
        }
    }

    pub fn view<'a>(&'a self, ctx: &ViewContext<'a>) -> Element<'a, ViewMessage> {
        let body = match self.screen {
            Screen::Setup => match ctx.setup {
                Some(setup) => setup::view(self, setup, ctx),
                None => download::view(self, ctx),
            },
            Screen::Download => download::view(self, ctx),
            Screen::Dependencies => dependencies::view(self, ctx),
            Screen::History => history::view(self, ctx),
        };

        column![
            self.header(ctx),
            Space::new().height(Length::Fixed(20.0)),
            body,
        ]
        .padding(20)
        .spacing(10)
        .into()
    }

    fn header<'a>(&self, ctx: &ViewContext<'a>) -> Element<'a, ViewMessage> {
        let title = column![
            text("MeTool").size(32),
            text(format!("Tools & desktop client {}", ctx.version.unwrap_or(""))).size(13),
        ];

        if self.screen == Screen::Setup && ctx.setup.is_some() {
            return title.into();
        }

        let tab = |label: &'a str, screen: Screen| {
            button(text(label))
                .on_press_maybe((self.screen != screen).then_some(ViewMessage::Navigate(screen)))
                .padding([6, 12])
        };

        row![
            title,
            Space::new().width(Length::Fill),
            tab("Download", Screen::Download),
            tab("Tools", Screen::Dependencies),
            tab("History", Screen::History),
        ]
        .spacing(8)
        .into()
    }
}
