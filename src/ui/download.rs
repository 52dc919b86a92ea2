use iced::{
    widget::{button, column, pick_list, progress_bar, row, scrollable, text, text_input, Column},
    Element, Length,
};

use super::{DownloadView, ViewContext, ViewMessage};
use crate::domain::{FormatOption, OrchestratorState};

pub fn view<'a>(state: &'a DownloadView, ctx: &ViewContext<'a>) -> Element<'a, ViewMessage> {
    let orchestrator = ctx.orchestrator;
    let busy = ctx.busy();

    let mut url_input = text_input("Paste a video URL", orchestrator.url()).padding(10);
    if !orchestrator.is_busy() {
        url_input = url_input
            .on_input(ViewMessage::UrlChanged)
            .on_submit(ViewMessage::FetchPressed);
    }

    let fetch_button = button(text(match orchestrator.state() {
        OrchestratorState::ResolvingMetadata => "Fetching...",
        _ => "Fetch",
    }))
    .on_press_maybe((!busy && !orchestrator.url().trim().is_empty()).then_some(ViewMessage::FetchPressed))
    .padding(10);

    let mut content = column![row![url_input, fetch_button].spacing(10)].spacing(10);

    if let Some(session) = orchestrator.session() {
        let picker = pick_list(
            session.formats(),
            session.selected().cloned(),
            |format: FormatOption| ViewMessage::FormatSelected(format.format_id),
        )
        .placeholder("Choose a format");

        let destination = orchestrator
            .destination()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "Default download folder".to_string());

        let download_button = button(text("Download"))
            .on_press_maybe((!busy && session.selected().is_some()).then_some(ViewMessage::DownloadPressed))
            .padding(10);

        content = content.push(text(session.title()).size(18)).push(
            row![
                picker,
                button(text("Change folder"))
                    .on_press_maybe((!busy).then_some(ViewMessage::PickDestinationPressed)),
                button(text("Reset")).on_press_maybe(
                    (!busy && orchestrator.destination().is_some())
                        .then_some(ViewMessage::ResetDestinationPressed)
                ),
                download_button,
            ]
            .spacing(10),
        );
        content = content.push(text(format!("Save to: {}", destination)).size(13));
    }

    if let Some(progress) = orchestrator.progress() {
        content = content.push(progress_bar(0.0..=100.0, progress));
        content = content.push(text(format!("{:.1}%", progress)).size(13));
    }

    if !orchestrator.status().is_empty() {
        content = content.push(text(orchestrator.status()));
    }
    if !state.notice.is_empty() {
        content = content.push(text(state.notice.as_str()).size(13));
    }

    let lines = orchestrator
        .log()
        .snapshot()
        .into_iter()
        .map(|line| text(line.text).size(12).into());
    content = content.push(
        scrollable(Column::with_children(lines).spacing(2)).height(Length::Fixed(180.0)),
    );

    content.into()
}
