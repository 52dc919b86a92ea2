use iced::{
    widget::{button, column, row, text, Space},
    Element, Length,
};

use super::{DownloadView, ViewContext, ViewMessage};
use crate::domain::DependencyName;

pub fn view<'a>(state: &'a DownloadView, ctx: &ViewContext<'a>) -> Element<'a, ViewMessage> {
    let busy = ctx.busy();
    let installing = ctx.sequencer.currently_installing();

    let mut content = column![text("Tools").size(22)].spacing(12);

    for status in ctx.registry.statuses() {
        let label = if installing == Some(status.name) {
            "Installing..."
        } else if status.installed {
            "Installed"
        } else {
            "Missing"
        };
        let action = if status.installed { "Update" } else { "Install" };

        content = content.push(
            row![
                text(status.name.as_str()).width(Length::Fixed(120.0)),
                text(label),
                Space::new().width(Length::Fill),
                button(text(action))
                    .on_press_maybe((!busy).then_some(ViewMessage::InstallPressed(status.name))),
            ]
            .spacing(10),
        );
    }

    let missing = ctx.registry.missing();
    content = content.push(
        button(text("Install all missing"))
            .on_press_maybe((!busy && !missing.is_empty()).then_some(ViewMessage::InstallAllPressed))
            .padding(10),
    );

    if !state.install_status.is_empty() {
        content = content.push(text(state.install_status.as_str()));
    }
    if ctx.orchestrator.needs_dependencies() {
        content = content.push(text(required_notice(&missing)).size(13));
    }
    if let Some(dir) = ctx.install_dir {
        content = content.push(text(format!("Install folder: {}", dir.display())).size(12));
    }

    content.into()
}

fn required_notice(missing: &[DependencyName]) -> String {
    let names: Vec<&str> = missing.iter().map(|name| name.as_str()).collect();
    format!("Downloads need: {}", names.join(", "))
}
