use std::path::{Path, PathBuf};
use std::time::Duration;

use iced::{
    widget::{button, column, container, horizontal_space, row, scrollable, text},
    alignment, Element, Length, Task,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info};

use crate::models::{humanize, GenerationResult};

pub const COPIED_ACK: Duration = Duration::from_secs(2);

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Lowercases the topic and collapses whitespace runs into single hyphens.
pub fn slugify(topic: &str) -> String {
    WHITESPACE.replace_all(topic, "-").to_lowercase()
}

pub fn download_filename(topic: &str) -> String {
    let slug = slugify(topic).replace(['/', '\\'], "-");
    format!("blog-{}.txt", slug)
}

pub fn counts_line(result: &GenerationResult) -> String {
    format!(
        "{} words • {} characters",
        result.word_count, result.character_count
    )
}

pub async fn write_download(dir: PathBuf, topic: String, content: String) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(download_filename(&topic));
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

pub async fn copy_to_clipboard(content: String) -> Result<(), String> {
    tokio::task::spawn_blocking(move || {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| format!("Failed to initialize clipboard: {}", e))?;
        clipboard
            .set_text(content)
            .map_err(|e| format!("Failed to set clipboard text: {}", e))
    })
    .await
    .map_err(|e| format!("Clipboard task failed: {}", e))?
}

/// Which of the three faces the display shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Face<'a> {
    Placeholder,
    Loading,
    Content(&'a GenerationResult),
}

pub fn face(result: Option<&GenerationResult>, loading: bool) -> Face<'_> {
    match (loading, result) {
        (true, _) => Face::Loading,
        (false, Some(result)) => Face::Content(result),
        (false, None) => Face::Placeholder,
    }
}

/// Buttons offered next to the generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Copy,
    Download,
}

pub fn actions(face: Face<'_>) -> &'static [OutputAction] {
    match face {
        Face::Content(_) => &[OutputAction::Copy, OutputAction::Download],
        Face::Placeholder | Face::Loading => &[],
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Copy,
    CopyFinished(u64, Result<(), String>),
    CopyExpired(u64),
    Download,
    DownloadFinished(Result<PathBuf, String>),
}

#[derive(Debug, Default)]
pub struct OutputDisplay {
    copied: bool,
    copy_seq: u64,
    notice: Option<String>,
}

impl OutputDisplay {
    pub fn is_copied(&self) -> bool {
        self.copied
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Clears per-result acknowledgements when a new result replaces the old one.
    pub fn reset(&mut self) {
        self.copied = false;
        self.copy_seq += 1;
        self.notice = None;
    }

    pub fn update(&mut self, message: Message, result: Option<&GenerationResult>, download_dir: &Path) -> Task<Message> {
        match message {
            Message::Copy => {
                let Some(result) = result else {
                    return Task::none();
                };
                self.copy_seq += 1;
                let seq = self.copy_seq;
                Task::perform(copy_to_clipboard(result.content.clone()), move |r| {
                    Message::CopyFinished(seq, r)
                })
            }
            Message::CopyFinished(seq, Ok(())) => {
                if seq != self.copy_seq {
                    return Task::none();
                }
                self.copied = true;
                Task::perform(tokio::time::sleep(COPIED_ACK), move |_| Message::CopyExpired(seq))
            }
            Message::CopyFinished(_, Err(e)) => {
                error!("Failed to copy text: {}", e);
                Task::none()
            }
            Message::CopyExpired(seq) => {
                if seq == self.copy_seq {
                    self.copied = false;
                }
                Task::none()
            }
            Message::Download => {
                let Some(result) = result else {
                    return Task::none();
                };
                Task::perform(
                    write_download(
                        download_dir.to_path_buf(),
                        result.topic.clone(),
                        result.content.clone(),
                    ),
                    |r| Message::DownloadFinished(r.map_err(|e| e.to_string())),
                )
            }
            Message::DownloadFinished(Ok(path)) => {
                info!(path = %path.display(), "content downloaded");
                self.notice = Some(format!("Saved to {}", path.display()));
                Task::none()
            }
            Message::DownloadFinished(Err(e)) => {
                error!(error = %e, "download failed");
                self.notice = Some(format!("Download failed: {}", e));
                Task::none()
            }
        }
    }

    pub fn view<'a>(&'a self, result: Option<&'a GenerationResult>, loading: bool) -> Element<'a, Message> {
        let body: Element<'a, Message> = match face(result, loading) {
            Face::Loading => column![
                text("Generating your blog content...").size(16),
                text("This may take a few moments").size(13).style(text::secondary),
            ]
            .spacing(8)
            .align_x(alignment::Horizontal::Center)
            .into(),
            Face::Placeholder => column![
                text("Ready to Generate").size(18),
                text("Enter a topic and click \"Generate Blog\" to create content")
                    .size(13)
                    .style(text::secondary),
            ]
            .spacing(8)
            .align_x(alignment::Horizontal::Center)
            .into(),
            Face::Content(result) => return self.content_view(result),
        };

        container(body)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }

    fn content_view<'a>(&'a self, result: &'a GenerationResult) -> Element<'a, Message> {
        let mut header = row![
            column![
                text("Generated Content").size(18),
                text(counts_line(result)).size(13).style(text::secondary),
            ]
            .spacing(4),
            horizontal_space(),
        ]
        .spacing(10)
        .align_y(alignment::Vertical::Center);

        for action in actions(Face::Content(result)) {
            let (label, message) = match action {
                OutputAction::Copy if self.copied => ("Copied!", Message::Copy),
                OutputAction::Copy => ("Copy", Message::Copy),
                OutputAction::Download => ("Download", Message::Download),
            };
            header = header.push(
                button(text(label).size(14))
                    .on_press(message)
                    .style(button::secondary),
            );
        }

        let metadata = row![
            text(format!("Topic: {}", result.topic)).size(12),
            text(format!("Type: {}", humanize(&result.blog_type))).size(12),
            text(format!("Style: {}", result.writing_style)).size(12),
            text(format!("Temperature: {}", result.temperature)).size(12),
        ]
        .spacing(16);

        let mut content = column![
            header,
            scrollable(container(text(&result.content).size(15)).padding(15).width(Length::Fill))
                .height(Length::Fill),
            metadata,
        ]
        .spacing(12);

        if let Some(notice) = self.notice() {
            content = content.push(text(notice).size(12).style(text::secondary));
        }

        container(content)
            .padding(10)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}
