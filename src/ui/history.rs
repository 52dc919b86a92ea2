use iced::{
    widget::{button, column, row, scrollable, text, Column},
    Element, Length,
};

use super::{DownloadView, ViewContext, ViewMessage};
use crate::domain::HistoryEntry;
use crate::utils::format_bytes;

pub fn view<'a>(state: &'a DownloadView, ctx: &ViewContext<'a>) -> Element<'a, ViewMessage> {
    let history = ctx.history;

    if history.is_empty() {
        return column![text("History").size(22), text("No downloads yet.")]
            .spacing(12)
            .into();
    }

    let controls: Element<'a, ViewMessage> = if state.confirming_clear {
        row![
            text("Clear all history?"),
            button(text("Yes")).on_press(ViewMessage::ClearHistoryConfirmed(true)),
            button(text("No")).on_press(ViewMessage::ClearHistoryConfirmed(false)),
        ]
        .spacing(10)
        .into()
    } else {
        button(text("Clear history"))
            .on_press(ViewMessage::ClearHistoryPressed)
            .into()
    };

    let entries = history.entries().iter().map(entry);
    column![
        row![text(format!("History ({})", history.len())).size(22), controls].spacing(20),
        scrollable(Column::with_children(entries).spacing(12)).height(Length::Fill),
    ]
    .spacing(12)
    .into()
}

fn entry(entry: &HistoryEntry) -> Element<'_, ViewMessage> {
    let size = entry
        .size_bytes
        .map(format_bytes)
        .unwrap_or_else(|| "unknown size".to_string());

    column![
        text(entry.title.as_str()).size(16),
        text(format!("{} · {} · {}", entry.resolution, entry.extension, size)).size(13),
        text(entry.saved_path.display().to_string()).size(12),
    ]
    .spacing(2)
    .into()
}
