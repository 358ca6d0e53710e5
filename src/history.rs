use std::time::Duration;

use iced::{
    widget::{button, column, container, horizontal_space, row, scrollable, text, text_input},
    alignment, Element, Length, Task,
};
use tokio::sync::watch;
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::models::{format_timestamp, humanize, GenerationResult, HistoryFilter, HistoryItem, HistoryPage};
use crate::query::QueryCache;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
const PREVIEW_COLUMNS: usize = 120;

/// Cuts `s` to at most `max_cols` terminal columns, appending an ellipsis when cut.
pub fn truncate_to_width(s: &str, max_cols: usize) -> String {
    let flat: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut used = 0;
    let mut out = String::new();
    for ch in flat.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > max_cols {
            out.push('…');
            return out;
        }
        used += w;
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone)]
pub enum Message {
    SearchChanged(String),
    SearchSettled(u64),
    Select(String),
    RequestDelete(String),
    ConfirmDelete,
    CancelDelete,
}

pub enum Action {
    None,
    Run(Task<Message>),
    Delete(String),
}

#[derive(Debug, PartialEq)]
pub enum ListState<'a> {
    Loading,
    Failed(&'a str),
    Empty { searching: bool },
    Items(&'a HistoryPage),
}

/// What the detail panel shows for the current selection.
#[derive(Debug, PartialEq)]
pub enum Detail<'a> {
    Placeholder,
    Preview(&'a HistoryItem),
    Full(&'a GenerationResult),
}

pub struct HistoryView {
    search_input: String,
    filter: HistoryFilter,
    search_seq: u64,
    selected: Option<String>,
    confirm_delete: Option<String>,
    delete_error: Option<String>,
    changes: watch::Receiver<u64>,
}

impl HistoryView {
    pub fn new(changes: watch::Receiver<u64>) -> Self {
        HistoryView {
            search_input: String::new(),
            filter: HistoryFilter::default(),
            search_seq: 0,
            selected: None,
            confirm_delete: None,
            delete_error: None,
            changes,
        }
    }

    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn update(&mut self, message: Message) -> Action {
        match message {
            Message::SearchChanged(term) => {
                self.search_input = term;
                self.search_seq += 1;
                let seq = self.search_seq;
                return Action::Run(Task::perform(tokio::time::sleep(SEARCH_DEBOUNCE), move |_| {
                    Message::SearchSettled(seq)
                }));
            }
            Message::SearchSettled(seq) => {
                if seq == self.search_seq {
                    self.filter = HistoryFilter::from_term(&self.search_input);
                    debug!(search = ?self.filter.search, "history search settled");
                }
            }
            Message::Select(id) => {
                self.selected = Some(id);
            }
            Message::RequestDelete(id) => {
                self.delete_error = None;
                self.confirm_delete = Some(id);
            }
            Message::CancelDelete => self.confirm_delete = None,
            Message::ConfirmDelete => {
                if let Some(id) = self.confirm_delete.take() {
                    return Action::Delete(id);
                }
            }
        }
        Action::None
    }

    pub fn on_deleted(&mut self, id: &str, result: Result<(), String>) {
        match result {
            Ok(()) => {
                if self.selected.as_deref() == Some(id) {
                    self.selected = None;
                }
            }
            Err(e) => self.delete_error = Some(e),
        }
    }

    /// Drops a selection whose id has vanished from the current list.
    /// Runs whenever the query cache reports a change.
    pub fn sync(&mut self, cache: &QueryCache) {
        if !self.changes.has_changed().unwrap_or(false) {
            return;
        }
        let _ = self.changes.borrow_and_update();

        let Some(selected) = &self.selected else {
            return;
        };
        let Some(page) = cache.history(&self.filter).and_then(|q| q.data()) else {
            return;
        };
        if !page.contains(selected) {
            debug!(id = %selected, "selected generation no longer listed");
            self.selected = None;
        }
    }

    pub fn list_state<'a>(&self, cache: &'a QueryCache) -> ListState<'a> {
        let Some(query) = cache.history(&self.filter) else {
            return ListState::Loading;
        };
        match (query.data(), query.error()) {
            (Some(page), _) if page.items.is_empty() => ListState::Empty {
                searching: self.filter.search.is_some(),
            },
            (Some(page), _) => ListState::Items(page),
            (None, Some(e)) => ListState::Failed(e),
            (None, None) => ListState::Loading,
        }
    }

    pub fn detail<'a>(&self, cache: &'a QueryCache) -> Detail<'a> {
        let Some(id) = &self.selected else {
            return Detail::Placeholder;
        };
        let ListState::Items(page) = self.list_state(cache) else {
            return Detail::Placeholder;
        };
        let Some(item) = page.items.iter().find(|item| &item.id == id) else {
            return Detail::Placeholder;
        };
        match cache.generation(id).and_then(|q| q.data()) {
            Some(full) => Detail::Full(full),
            None => Detail::Preview(item),
        }
    }

    pub fn view<'a>(&'a self, cache: &'a QueryCache, delete_pending: bool) -> Element<'a, Message> {
        let total = match cache.history(&self.filter).and_then(|q| q.data()) {
            Some(page) => page.total,
            None => 0,
        };

        let header = column![
            text("Generation History").size(22),
            text(format!("{} generations total", total)).size(13).style(text::secondary),
        ]
        .spacing(4);

        let search = text_input("Search by topic or content...", &self.search_input)
            .on_input(Message::SearchChanged)
            .padding(10);

        let list: Element<'a, Message> = match self.list_state(cache) {
            ListState::Loading => centered(text("Loading history...")),
            ListState::Failed(e) => text(format!("Failed to load history: {}", e))
                .style(text::danger)
                .into(),
            ListState::Empty { searching } => centered(
                column![
                    text("No generations found").size(16),
                    text(if searching {
                        "Try a different search term"
                    } else {
                        "Start generating some blog content!"
                    })
                    .size(13)
                    .style(text::secondary),
                ]
                .spacing(6)
                .align_x(alignment::Horizontal::Center),
            ),
            ListState::Items(page) => {
                let rows = page
                    .items
                    .iter()
                    .map(|item| self.row_view(item, delete_pending));
                scrollable(column(rows).spacing(8)).height(Length::Fill).into()
            }
        };

        let mut left = column![search, list].spacing(10);
        if let Some(e) = &self.delete_error {
            left = left.push(text(format!("Failed to delete: {}", e)).size(13).style(text::danger));
        }

        column![
            header,
            row![
                container(left).width(Length::FillPortion(1)).height(Length::Fill),
                container(self.detail_view(cache))
                    .padding(12)
                    .width(Length::FillPortion(1))
                    .height(Length::Fill)
                    .style(container::rounded_box),
            ]
            .spacing(20),
        ]
        .spacing(16)
        .padding(10)
        .into()
    }

    fn row_view<'a>(&'a self, item: &'a HistoryItem, delete_pending: bool) -> Element<'a, Message> {
        let summary = column![
            text(&item.topic).size(15),
            text(truncate_to_width(&item.content, PREVIEW_COLUMNS)).size(12).style(text::secondary),
            text(format!("{} • {} words", format_timestamp(&item.created_at), item.word_count)).size(11),
        ]
        .spacing(4);

        let style: fn(&iced::Theme, button::Status) -> button::Style = if self.selected.as_deref() == Some(item.id.as_str()) {
            button::primary
        } else {
            button::secondary
        };

        let controls: Element<'a, Message> = if self.confirm_delete.as_deref() == Some(item.id.as_str()) {
            row![
                text("Delete this generation?").size(12),
                button(text("Confirm").size(12))
                    .on_press_maybe((!delete_pending).then_some(Message::ConfirmDelete))
                    .style(button::danger),
                button(text("Cancel").size(12))
                    .on_press(Message::CancelDelete)
                    .style(button::secondary),
            ]
            .spacing(6)
            .align_y(alignment::Vertical::Center)
            .into()
        } else {
            button(text("Delete").size(12))
                .on_press_maybe((!delete_pending).then(|| Message::RequestDelete(item.id.clone())))
                .style(button::danger)
                .into()
        };

        row![
            button(summary)
                .on_press(Message::Select(item.id.clone()))
                .style(style)
                .width(Length::Fill),
            controls,
        ]
        .spacing(8)
        .align_y(alignment::Vertical::Center)
        .into()
    }

    fn detail_view<'a>(&'a self, cache: &'a QueryCache) -> Element<'a, Message> {
        let (topic, blog_type, style, words, content, created_at) = match self.detail(cache) {
            Detail::Placeholder => return centered(text("Select an item to view details").style(text::secondary)),
            Detail::Preview(item) => (
                &item.topic,
                &item.blog_type,
                &item.writing_style,
                item.word_count,
                &item.content,
                &item.created_at,
            ),
            Detail::Full(full) => (
                &full.topic,
                &full.blog_type,
                &full.writing_style,
                full.word_count,
                &full.content,
                &full.created_at,
            ),
        };

        column![
            text(topic).size(18),
            row![
                text(humanize(blog_type)).size(12),
                text(style).size(12),
                text(format!("{} words", words)).size(12),
                horizontal_space(),
            ]
            .spacing(10),
            scrollable(text(content).size(14)).height(Length::Fill),
            text(format!("Generated on {}", format_timestamp(created_at))).size(11).style(text::secondary),
        ]
        .spacing(10)
        .into()
    }
}

fn centered<'a>(content: impl Into<Element<'a, Message>>) -> Element<'a, Message> {
    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{ApiResponse, Hooks, QueryTimings};
    use crate::api::ApiOutcome;
    use crate::models::DeleteConfirmation;
    use std::time::Instant;

    fn item(id: &str, topic: &str) -> HistoryItem {
        HistoryItem {
            id: id.to_string(),
            topic: topic.to_string(),
            content: format!("About {}", topic),
            blog_type: "intro".into(),
            writing_style: "casual".into(),
            created_at: "2025-01-01T10:00:00".into(),
            word_count: 2,
        }
    }

    fn load(hooks: &mut Hooks, filter: &HistoryFilter, items: Vec<HistoryItem>, now: Instant) {
        let req = hooks.use_history(filter, now).expect("history fetch due");
        let total = items.len() as u64;
        hooks.apply(
            ApiResponse {
                token: req.token,
                outcome: ApiOutcome::History(filter.clone(), Ok(HistoryPage { items, total })),
            },
            now,
        );
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short text", 20), "short text");
        assert_eq!(truncate_to_width("abcdef", 3), "abc…");
        assert_eq!(truncate_to_width("line one\n\nline two", 40), "line one line two");
        // Wide characters count double.
        assert_eq!(truncate_to_width("日本語テキスト", 6), "日本語…");
    }

    #[test]
    fn test_list_states() {
        let mut hooks = Hooks::new(QueryTimings::default());
        let mut view = HistoryView::new(hooks.subscribe());
        let now = Instant::now();

        assert_eq!(view.list_state(hooks.cache()), ListState::Loading);

        load(&mut hooks, &HistoryFilter::default(), vec![item("1", "AI")], now);
        assert!(matches!(view.list_state(hooks.cache()), ListState::Items(p) if p.items.len() == 1));

        view.filter = HistoryFilter::from_term("zzz");
        load(&mut hooks, &view.filter.clone(), vec![], now);
        assert_eq!(view.list_state(hooks.cache()), ListState::Empty { searching: true });
    }

    #[tokio::test]
    async fn test_search_debounce_uses_latest_term() {
        let (_tx, rx) = watch::channel(0);
        let mut view = HistoryView::new(rx);

        view.update(Message::SearchChanged("A".into()));
        view.update(Message::SearchChanged("AI".into()));
        let stale = view.search_seq - 1;

        view.update(Message::SearchSettled(stale));
        assert_eq!(view.filter(), &HistoryFilter::default());

        view.update(Message::SearchSettled(view.search_seq));
        assert_eq!(view.filter().search.as_deref(), Some("AI"));
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let (_tx, rx) = watch::channel(0);
        let mut view = HistoryView::new(rx);

        assert!(matches!(view.update(Message::ConfirmDelete), Action::None));
        view.update(Message::RequestDelete("1".into()));
        view.update(Message::CancelDelete);
        assert!(matches!(view.update(Message::ConfirmDelete), Action::None));

        view.update(Message::RequestDelete("1".into()));
        assert!(matches!(view.update(Message::ConfirmDelete), Action::Delete(id) if id == "1"));
    }

    #[test]
    fn test_deleted_selection_reverts_to_placeholder() {
        let mut hooks = Hooks::new(QueryTimings::default());
        let mut view = HistoryView::new(hooks.subscribe());
        let now = Instant::now();
        let filter = HistoryFilter::default();

        load(&mut hooks, &filter, vec![item("1", "AI"), item("2", "Bread")], now);
        view.update(Message::Select("1".into()));
        view.sync(hooks.cache());
        assert!(matches!(view.detail(hooks.cache()), Detail::Preview(i) if i.id == "1"));

        let req = hooks.delete("1").unwrap();
        hooks.apply(
            ApiResponse {
                token: req.token,
                outcome: ApiOutcome::Deleted("1".into(), Ok(DeleteConfirmation { message: "ok".into() })),
            },
            now,
        );
        // Refetch triggered by invalidation lands without the deleted row.
        load(&mut hooks, &filter, vec![item("2", "Bread")], now);
        view.sync(hooks.cache());

        let ListState::Items(page) = view.list_state(hooks.cache()) else {
            panic!("expected items");
        };
        assert!(!page.contains("1"));
        assert_eq!(view.detail(hooks.cache()), Detail::Placeholder);
        assert_eq!(view.selected(), None);
    }

    #[test]
    fn test_selection_survives_refresh_that_keeps_it() {
        let mut hooks = Hooks::new(QueryTimings::default());
        let mut view = HistoryView::new(hooks.subscribe());
        let now = Instant::now();
        let filter = HistoryFilter::default();

        load(&mut hooks, &filter, vec![item("1", "AI")], now);
        view.update(Message::Select("1".into()));

        let later = now + Duration::from_secs(10);
        load(&mut hooks, &filter, vec![item("3", "New"), item("1", "AI")], later);
        view.sync(hooks.cache());
        assert_eq!(view.selected(), Some("1"));
    }

    #[test]
    fn test_delete_failure_is_shown_and_selection_kept() {
        let (_tx, rx) = watch::channel(0);
        let mut view = HistoryView::new(rx);
        view.update(Message::Select("1".into()));
        view.on_deleted("1", Err("Generation not found".into()));
        assert_eq!(view.delete_error.as_deref(), Some("Generation not found"));
        assert_eq!(view.selected(), Some("1"));
    }
}
