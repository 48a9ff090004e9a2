use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown on stderr while talking to the API.
#[derive(Clone)]
pub struct ApiProgress {
    bar: ProgressBar,
}

impl ApiProgress {
    fn spinner(template: &str, message: &str, tick: Duration) -> Self {
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(tick);

        Self { bar }
    }

    pub fn new_submit() -> Self {
        Self::spinner(
            "🚀 {msg} {spinner:.green}",
            "Submitting verification job...",
            Duration::from_millis(80),
        )
    }

    pub fn new_polling() -> Self {
        Self::spinner(
            "⏳ {msg} {spinner:.yellow}",
            "Checking verification status...",
            Duration::from_millis(120),
        )
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Prints a line to stdout without garbling the spinner.
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| println!("{line}"));
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}
