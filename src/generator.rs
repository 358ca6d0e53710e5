use std::path::Path;

use iced::{
    widget::{button, column, container, pick_list, row, slider, text, text_input},
    Element, Length, Task,
};

use crate::api::ApiError;
use crate::models::{
    BlogType, GenerationRequest, GenerationResult, ValidationError, WritingStyle,
    TOPIC_GUIDE_CHARS,
};
use crate::output::{self, OutputDisplay};

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Submitting,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum Message {
    TopicChanged(String),
    BlogTypeSelected(BlogType),
    WritingStyleSelected(WritingStyle),
    TemperatureChanged(f64),
    MaxTokensChanged(u32),
    ToggleAdvanced,
    Submit,
    Output(output::Message),
}

pub enum Action {
    None,
    Submit(GenerationRequest),
    Run(Task<Message>),
}

pub struct Generator {
    form: GenerationRequest,
    show_advanced: bool,
    phase: Phase,
    validation_error: Option<ValidationError>,
    submitted_once: bool,
    result: Option<GenerationResult>,
    output: OutputDisplay,
}

impl Default for Generator {
    fn default() -> Self {
        Generator {
            form: GenerationRequest::default(),
            show_advanced: false,
            phase: Phase::Idle,
            validation_error: None,
            submitted_once: false,
            result: None,
            output: OutputDisplay::default(),
        }
    }
}

impl Generator {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn result(&self) -> Option<&GenerationResult> {
        self.result.as_ref()
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.validation_error.as_ref()
    }

    pub fn topic_counter(&self) -> String {
        format!("{}/{} characters", self.form.topic.chars().count(), TOPIC_GUIDE_CHARS)
    }

    /// Any edit drops a finished attempt back to `Idle`. An in-flight request is unaffected.
    fn edited(&mut self) {
        if self.phase != Phase::Submitting {
            self.phase = Phase::Idle;
        }
    }

    pub fn update(&mut self, message: Message, download_dir: &Path) -> Action {
        match message {
            Message::TopicChanged(topic) => {
                self.form.topic = topic;
                // After the first submit attempt the topic is re-checked as it changes.
                if self.submitted_once {
                    self.validation_error = self.form.validate().err();
                }
                self.edited();
            }
            Message::BlogTypeSelected(blog_type) => {
                self.form.blog_type = blog_type;
                self.edited();
            }
            Message::WritingStyleSelected(style) => {
                self.form.writing_style = style;
                self.edited();
            }
            Message::TemperatureChanged(value) => {
                self.form.temperature = ((value * 10.0).round() / 10.0).clamp(0.0, 1.0);
                self.edited();
            }
            Message::MaxTokensChanged(value) => {
                self.form.max_tokens = value;
                self.edited();
            }
            Message::ToggleAdvanced => self.show_advanced = !self.show_advanced,
            Message::Submit => return self.submit(),
            Message::Output(msg) => {
                let task = self
                    .output
                    .update(msg, self.result.as_ref(), download_dir)
                    .map(Message::Output);
                return Action::Run(task);
            }
        }
        Action::None
    }

    fn submit(&mut self) -> Action {
        if self.phase == Phase::Submitting {
            return Action::None;
        }
        self.submitted_once = true;
        if let Err(e) = self.form.validate() {
            self.validation_error = Some(e);
            self.phase = Phase::Idle;
            return Action::None;
        }
        self.validation_error = None;
        self.phase = Phase::Submitting;
        let mut request = self.form.clone();
        request.topic = request.topic.trim().to_string();
        Action::Submit(request)
    }

    /// The hook layer refused to send the request.
    pub fn submit_rejected(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::Idle;
        }
    }

    pub fn on_generated(&mut self, result: Result<GenerationResult, ApiError>) {
        match result {
            Ok(generated) => {
                self.result = Some(generated);
                self.output.reset();
                self.phase = Phase::Succeeded;
            }
            // The previous result stays on screen.
            Err(e) => self.phase = Phase::Failed(e.user_message()),
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let submitting = self.phase() == &Phase::Submitting;

        let mut form = column![
            text("Generate Blog Content").size(20),
            text("Blog Topic *").size(14),
            text_input(
                "Enter your blog topic (e.g., 'The benefits of artificial intelligence in healthcare')",
                &self.form.topic,
            )
            .on_input(Message::TopicChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(16),
        ]
        .spacing(8);

        if let Some(error) = self.validation_error() {
            form = form.push(text(error.to_string()).size(13).style(text::danger));
        }

        form = form
            .push(text(self.topic_counter()).size(12).style(text::secondary))
            .push(text("Blog Type").size(14))
            .push(pick_list(BlogType::ALL, Some(self.form.blog_type), Message::BlogTypeSelected).width(Length::Fill))
            .push(text("Writing Style").size(14))
            .push(
                pick_list(WritingStyle::ALL, Some(self.form.writing_style), Message::WritingStyleSelected)
                    .width(Length::Fill),
            )
            .push(
                button(text(if self.show_advanced {
                    "Hide Advanced Settings"
                } else {
                    "Show Advanced Settings"
                }))
                .on_press(Message::ToggleAdvanced)
                .style(button::text),
            );

        if self.show_advanced {
            let advanced = column![
                text(format!("Temperature: {}", self.form.temperature)).size(14),
                slider(0.0..=1.0, self.form.temperature, Message::TemperatureChanged).step(0.1),
                row![
                    text("More Focused").size(11),
                    iced::widget::horizontal_space(),
                    text("More Creative").size(11)
                ],
                text(format!("Max Tokens: {}", self.form.max_tokens)).size(14),
                slider(50..=2000, self.form.max_tokens, Message::MaxTokensChanged).step(50u32),
                row![
                    text("Shorter").size(11),
                    iced::widget::horizontal_space(),
                    text("Longer").size(11)
                ],
            ]
            .spacing(6);
            form = form.push(container(advanced).padding(12).style(container::rounded_box));
        }

        let label = if submitting { "Generating..." } else { "Generate Blog" };
        form = form.push(
            button(text(label).size(16))
                .on_press_maybe((!submitting).then_some(Message::Submit))
                .padding(12)
                .width(Length::Fill),
        );

        if let Phase::Failed(message) = &self.phase {
            form = form.push(text(message).size(13).style(text::danger));
        }

        let output = self
            .output
            .view(self.result(), submitting)
            .map(Message::Output);

        row![
            container(form).padding(10).width(Length::FillPortion(1)),
            container(output).width(Length::FillPortion(1)).height(Length::Fill),
        ]
        .spacing(20)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dir() -> PathBuf {
        PathBuf::from(".")
    }

    fn typed(topic: &str) -> Generator {
        let mut generator = Generator::default();
        generator.update(Message::TopicChanged(topic.to_string()), &dir());
        generator
    }

    fn result(content: &str) -> GenerationResult {
        GenerationResult {
            id: "g1".into(),
            topic: "The benefits of remote work".into(),
            blog_type: "intro".into(),
            writing_style: "professional".into(),
            temperature: 0.7,
            max_tokens: Some(512),
            content: content.into(),
            word_count: 3,
            character_count: 17,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_short_topic_blocks_submission() {
        for topic in ["", "  ", "ab", " a "] {
            let mut generator = typed(topic);
            let action = generator.update(Message::Submit, &dir());
            assert!(matches!(action, Action::None), "topic {:?} submitted", topic);
            assert_eq!(generator.phase(), &Phase::Idle);
            assert!(generator.validation_error().is_some());
        }
    }

    #[test]
    fn test_validation_rechecks_after_first_attempt() {
        let mut generator = typed("ab");
        generator.update(Message::Submit, &dir());
        assert_eq!(generator.validation_error(), Some(&ValidationError::TopicTooShort));

        generator.update(Message::TopicChanged("abc".into()), &dir());
        assert_eq!(generator.validation_error(), None);
    }

    #[test]
    fn test_valid_submit_enters_submitting_once() {
        let mut generator = typed("The benefits of remote work");
        match generator.update(Message::Submit, &dir()) {
            Action::Submit(request) => {
                assert_eq!(request.topic, "The benefits of remote work");
                assert_eq!(request.blog_type, BlogType::Intro);
                assert_eq!(request.writing_style, WritingStyle::Professional);
                assert_eq!(request.max_tokens, 512);
            }
            _ => panic!("expected submit"),
        }
        assert_eq!(generator.phase(), &Phase::Submitting);
        assert!(matches!(generator.update(Message::Submit, &dir()), Action::None));
    }

    #[test]
    fn test_failure_keeps_previous_result_and_advanced_toggle() {
        let mut generator = typed("The benefits of remote work");
        generator.update(Message::ToggleAdvanced, &dir());

        generator.update(Message::Submit, &dir());
        generator.on_generated(Ok(result("first")));
        assert_eq!(generator.phase(), &Phase::Succeeded);

        generator.update(Message::Submit, &dir());
        generator.on_generated(Err(ApiError::Status {
            status: 500,
            detail: Some("LM Studio timed out".into()),
        }));
        assert_eq!(generator.phase(), &Phase::Failed("LM Studio timed out".into()));
        assert_eq!(generator.result().map(|r| r.content.as_str()), Some("first"));
        assert!(generator.show_advanced);

        generator.update(Message::TemperatureChanged(0.30000000000000004), &dir());
        assert_eq!(generator.phase(), &Phase::Idle);
        assert!((generator.form.temperature - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_transport_failure_uses_generic_message() {
        let mut generator = typed("The benefits of remote work");
        generator.update(Message::Submit, &dir());
        generator.on_generated(Err(ApiError::Transport("connection refused".into())));
        assert_eq!(generator.phase(), &Phase::Failed("Network Error".into()));
    }

    #[test]
    fn test_counter_is_a_guideline() {
        let long = "x".repeat(600);
        let mut generator = typed(&long);
        assert_eq!(generator.topic_counter(), "600/500 characters");
        assert!(matches!(generator.update(Message::Submit, &dir()), Action::Submit(_)));
    }

    #[test]
    fn test_rejected_submit_returns_to_idle() {
        let mut generator = typed("The benefits of remote work");
        generator.update(Message::Submit, &dir());
        generator.submit_rejected();
        assert_eq!(generator.phase(), &Phase::Idle);
    }
}
