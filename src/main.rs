mod api;
mod config;
mod generator;
mod history;
mod hooks;
mod models;
mod output;
mod query;
mod settings;

use iced::{
    widget::{button, column, container, horizontal_space, row, text},
    alignment, time, window, Element, Length, Size, Subscription, Task, Theme,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::ApiClient;
use generator::Generator;
use history::HistoryView;
use hooks::{ApiRequest, ApiResponse, HookEvent, Hooks, QueryTimings};

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,wgpu=warn,wgpu_core=warn,naga=warn,iced=warn".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn main() -> iced::Result {
    init_tracing();

    let config = config::Config::load();
    tracing::info!(base_url = %config.api.base_url, "starting blog writer");

    let window_settings = window::Settings {
        size: Size::new(config.window.width as f32, config.window.height as f32),
        min_size: Some(Size::new(
            config.window.min_width as f32,
            config.window.min_height as f32,
        )),
        position: window::Position::Centered,
        ..Default::default()
    };

    iced::application("Blog Writer", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window_settings)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Generator,
    History,
    Settings,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Generator, Tab::History, Tab::Settings];

    fn label(&self) -> &'static str {
        match self {
            Tab::Generator => "Generator",
            Tab::History => "History",
            Tab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone)]
enum Message {
    TabSelected(Tab),
    Generator(generator::Message),
    History(history::Message),
    Settings(settings::Message),
    Api(ApiResponse),
    PollStatus,
}

struct App {
    tab: Tab,
    client: ApiClient,
    hooks: Hooks,
    generator: Generator,
    history: HistoryView,
    download_dir: PathBuf,
}

impl App {
    fn new(config: config::Config) -> (Self, Task<Message>) {
        let hooks = Hooks::new(QueryTimings::from(&config.api));
        let history = HistoryView::new(hooks.subscribe());

        let mut app = App {
            tab: Tab::Generator,
            client: ApiClient::with_base_url(config.api.base_url.clone()),
            hooks,
            generator: Generator::default(),
            history,
            download_dir: config.output.resolve_download_dir(),
        };

        let health = app.hooks.health_check();
        let startup = Task::batch([app.run(health), app.sync_queries()]);
        (app, startup)
    }

    fn run(&self, request: ApiRequest) -> Task<Message> {
        let ApiRequest { token, call } = request;
        Task::perform(self.client.clone().execute(call), move |outcome| {
            Message::Api(ApiResponse { token, outcome })
        })
    }

    fn run_maybe(&self, request: Option<ApiRequest>) -> Task<Message> {
        match request {
            Some(request) => self.run(request),
            None => Task::none(),
        }
    }

    /// Issues whatever fetches the mounted views need, the way a render
    /// calling its query hooks would.
    fn sync_queries(&mut self) -> Task<Message> {
        let now = Instant::now();
        self.history.sync(self.hooks.cache());
        let selected = self.history.selected().map(str::to_string);
        self.hooks
            .collect_garbage(self.history.filter(), selected.as_deref(), now);

        // The header's connectivity indicator is always mounted.
        let mut requests = vec![self.hooks.use_status(now)];
        match self.tab {
            Tab::Generator => {}
            Tab::History => {
                let filter = self.history.filter().clone();
                requests.push(self.hooks.use_history(&filter, now));
                if let Some(id) = &selected {
                    requests.push(self.hooks.use_generation(id, now));
                }
            }
            Tab::Settings => requests.push(self.hooks.use_models(now)),
        }

        Task::batch(requests.into_iter().flatten().map(|r| self.run(r)).collect::<Vec<_>>())
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::TabSelected(tab) => {
                self.tab = tab;
                Task::none()
            }
            Message::Generator(msg) => match self.generator.update(msg, &self.download_dir) {
                generator::Action::None => Task::none(),
                generator::Action::Run(task) => task.map(Message::Generator),
                generator::Action::Submit(request) => {
                    let request = self.hooks.generate(request);
                    if request.is_none() {
                        self.generator.submit_rejected();
                    }
                    self.run_maybe(request)
                }
            },
            Message::History(msg) => match self.history.update(msg) {
                history::Action::None => Task::none(),
                history::Action::Run(task) => task.map(Message::History),
                history::Action::Delete(id) => {
                    let request = self.hooks.delete(&id);
                    self.run_maybe(request)
                }
            },
            Message::Settings(settings::Message::RefreshStatus) => {
                let request = self.hooks.refetch_status();
                self.run_maybe(request)
            }
            Message::PollStatus => {
                let request = self.hooks.poll_status();
                self.run(request)
            }
            Message::Api(response) => {
                match self.hooks.apply(response, Instant::now()) {
                    HookEvent::Generated(result) => self.generator.on_generated(result),
                    HookEvent::Deleted(id, result) => self
                        .history
                        .on_deleted(&id, result.map_err(|e| e.user_message())),
                    HookEvent::QueryUpdated | HookEvent::Ignored => {}
                }
                Task::none()
            }
        };

        Task::batch([task, self.sync_queries()])
    }

    fn subscription(&self) -> Subscription<Message> {
        time::every(self.hooks.timings().status_poll).map(|_| Message::PollStatus)
    }

    fn view(&self) -> Element<Message> {
        let connected = self
            .hooks
            .cache()
            .status()
            .data()
            .map_or(false, |s| s.lm_studio_connected);
        let indicator = if connected {
            text("● LM Studio Connected").size(13).style(text::success)
        } else {
            text("● LM Studio Disconnected").size(13).style(text::danger)
        };

        let header = row![
            column![
                text("Blog Writer").size(24),
                text("Powered by DeepSeek R1").size(12).style(text::secondary),
            ]
            .spacing(2),
            horizontal_space(),
            indicator,
        ]
        .align_y(alignment::Vertical::Center)
        .padding(10);

        let tabs = row(Tab::ALL.iter().map(|tab| {
            let style: fn(&Theme, button::Status) -> button::Style = if *tab == self.tab {
                button::primary
            } else {
                button::text
            };
            button(text(tab.label()).size(15))
                .on_press(Message::TabSelected(*tab))
                .style(style)
                .padding([8, 16])
                .into()
        }))
        .spacing(4)
        .padding([0, 10]);

        let content: Element<Message> = match self.tab {
            Tab::Generator => self.generator.view().map(Message::Generator),
            Tab::History => self
                .history
                .view(self.hooks.cache(), self.hooks.delete_state().is_pending())
                .map(Message::History),
            Tab::Settings => settings::SettingsView {
                status: self.hooks.cache().status(),
                models: self.hooks.cache().models(),
                health: self.hooks.health(),
                base_url: self.client.base_url(),
                timings: self.hooks.timings(),
            }
            .view()
            .map(Message::Settings),
        };

        container(column![header, tabs, container(content).padding(10).height(Length::Fill)])
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
