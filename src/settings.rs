use iced::{
    widget::{button, column, container, horizontal_space, row, text},
    alignment, Element, Length,
};

use crate::hooks::QueryTimings;
use crate::models::{HealthInfo, ModelList, StatusInfo};
use crate::query::Query;

const TROUBLESHOOTING: [&str; 4] = [
    "• Ensure LM Studio is running on your machine",
    "• Check that the server is started in LM Studio",
    "• Verify the server is running on localhost:1234",
    "• Make sure DeepSeek R1 model is loaded",
];

#[derive(Debug, Clone)]
pub enum Message {
    RefreshStatus,
}

pub fn is_recommended(model: &str) -> bool {
    model.to_lowercase().contains("deepseek")
}

/// Read-only rendering of the status and model queries.
pub struct SettingsView<'a> {
    pub status: &'a Query<StatusInfo>,
    pub models: &'a Query<ModelList>,
    pub health: Option<&'a Result<HealthInfo, String>>,
    pub base_url: &'a str,
    pub timings: QueryTimings,
}

impl<'a> SettingsView<'a> {
    pub fn view(self) -> Element<'a, Message> {
        column![
            column![
                text("Settings & Status").size(22),
                text("System configuration and connection status").size(13).style(text::secondary),
            ]
            .spacing(4),
            section(self.status_section()),
            section(self.models_section()),
            section(self.system_section()),
        ]
        .spacing(16)
        .padding(10)
        .into()
    }

    fn status_section(&self) -> Element<'a, Message> {
        let refreshing = self.status.is_fetching();
        let header = row![
            text("LM Studio Connection").size(17),
            horizontal_space(),
            button(text("Refresh").size(13))
                .on_press_maybe((!refreshing).then_some(Message::RefreshStatus))
                .style(button::secondary),
        ]
        .align_y(alignment::Vertical::Center);

        let body: Element<'a, Message> = match (self.status.data(), self.status.error()) {
            (Some(status), _) if status.lm_studio_connected => column![
                text("Connected").size(15).style(text::success),
                text(&status.message).size(13),
            ]
            .spacing(4)
            .into(),
            (Some(status), _) => {
                let mut tips = column![text("Troubleshooting Steps:").size(13)].spacing(2);
                for tip in TROUBLESHOOTING {
                    tips = tips.push(text(tip).size(12));
                }
                column![
                    text("Disconnected").size(15).style(text::danger),
                    text(&status.message).size(13),
                    tips,
                ]
                .spacing(6)
                .into()
            }
            (None, Some(_)) => text("Failed to check status").style(text::danger).into(),
            (None, None) => text("Checking connection...").style(text::secondary).into(),
        };

        column![header, body].spacing(10).into()
    }

    fn models_section(&self) -> Element<'a, Message> {
        let body: Element<'a, Message> = match self.models.data() {
            None if self.models.error().is_none() => text("Loading models...").style(text::secondary).into(),
            Some(list) if !list.models.is_empty() => {
                let mut rows = column![].spacing(6);
                for model in &list.models {
                    let mut entry = row![text(model).size(14)].spacing(10);
                    if is_recommended(model) {
                        entry = entry.push(text("Recommended").size(11).style(text::success));
                    }
                    rows = rows.push(entry);
                }
                rows.into()
            }
            _ => column![
                text("No models available").size(14),
                text("Make sure LM Studio is connected and has models loaded")
                    .size(12)
                    .style(text::secondary),
            ]
            .spacing(4)
            .into(),
        };

        column![text("Available Models").size(17), body].spacing(10).into()
    }

    fn system_section(&self) -> Element<'a, Message> {
        let api_state = match self.health {
            Some(Ok(health)) => format!("{} ({})", health.status, health.message),
            Some(Err(e)) => format!("unreachable: {}", e),
            None => "checking...".to_string(),
        };

        column![
            text("System Information").size(17),
            info_row("API Endpoint", self.base_url.to_string()),
            info_row("API Health", api_state),
            info_row("LLM Provider", "LM Studio (Local)".to_string()),
            info_row(
                "Status Refresh",
                format!("every {} seconds", self.timings.status_poll.as_secs()),
            ),
            info_row(
                "Model List Cache",
                format!("{} minutes", self.timings.models_stale.as_secs() / 60),
            ),
        ]
        .spacing(6)
        .into()
    }
}

fn info_row<'a>(label: &'a str, value: String) -> Element<'a, Message> {
    row![
        text(label).size(13).width(Length::Fixed(160.0)),
        text(value).size(13).style(text::secondary),
    ]
    .into()
}

fn section<'a>(content: Element<'a, Message>) -> Element<'a, Message> {
    container(content)
        .padding(14)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}
