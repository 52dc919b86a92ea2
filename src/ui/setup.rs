use iced::{
    widget::{button, column, pick_list, row, text},
    Element,
};

use super::{DownloadView, ViewContext, ViewMessage};
use crate::application::{GuidedSetup, Language, SetupStep};
use crate::domain::DependencyName;

pub fn view<'a>(
    state: &'a DownloadView,
    setup: &'a GuidedSetup,
    ctx: &ViewContext<'a>,
) -> Element<'a, ViewMessage> {
    let step = setup.step();
    let counter = text(format!("Step {} of {}", step.index() + 1, SetupStep::COUNT)).size(13);

    let body: Element<'a, ViewMessage> = match step {
        SetupStep::Welcome => column![
            text("Welcome").size(24),
            text("MeTool downloads videos with yt-dlp and ffmpeg. This walkthrough gets them ready."),
            button(text("Next")).on_press(ViewMessage::SetupNext).padding(10),
        ]
        .spacing(12)
        .into(),
        SetupStep::LanguageChoice => column![
            text("Language").size(24),
            pick_list(Language::ALL, Some(setup.language()), ViewMessage::LanguageSelected),
            button(text("Next")).on_press(ViewMessage::SetupNext).padding(10),
        ]
        .spacing(12)
        .into(),
        SetupStep::DependencyInstall => install_step(state, setup, ctx),
        SetupStep::Done => column![
            text("All set").size(24),
            text(if setup.all_installed() {
                "Tools are installed. Paste a link to get started."
            } else {
                "Some tools are missing. You can install them later from the Tools tab."
            }),
            button(text("Get started"))
                .on_press_maybe((!setup.is_completed()).then_some(ViewMessage::SetupFinish))
                .padding(10),
        ]
        .spacing(12)
        .into(),
    };

    column![counter, body].spacing(16).into()
}

fn install_step<'a>(
    state: &'a DownloadView,
    setup: &'a GuidedSetup,
    ctx: &ViewContext<'a>,
) -> Element<'a, ViewMessage> {
    let busy = ctx.busy();
    let installing = ctx.sequencer.currently_installing();

    let mut content = column![text("Tools").size(24)].spacing(12);
    for name in DependencyName::ALL {
        let mark = if installing == Some(name) {
            "installing..."
        } else if setup.is_installed(name) {
            "ready"
        } else {
            "missing"
        };
        content = content.push(row![text(name.as_str()), text(mark)].spacing(10));
    }

    if !state.install_status.is_empty() {
        content = content.push(text(state.install_status.as_str()).size(13));
    }

    content
        .push(
            row![
                button(text("Install all"))
                    .on_press_maybe((!busy && !setup.all_installed()).then_some(ViewMessage::InstallAllPressed)),
                button(text("Continue"))
                    .on_press_maybe((!busy && setup.can_continue()).then_some(ViewMessage::SetupNext)),
                button(text("Skip")).on_press_maybe((!busy).then_some(ViewMessage::SetupSkip)),
            ]
            .spacing(10),
        )
        .into()
}
