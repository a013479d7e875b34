use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

/// Progress output on stderr; silent when quiet or not attached to a terminal.
pub struct Ui {
    enabled: bool,
    spinner_style: ProgressStyle,
}

impl Ui {
    pub fn new(quiet: bool) -> Self {
        let spinner_style = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
        Self {
            enabled: !quiet && std::io::stderr().is_terminal(),
            spinner_style,
        }
    }

    pub fn task(&self, label: impl Into<String>) -> TaskGuard {
        let label = label.into();
        let pb = self.enabled.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(self.spinner_style.clone());
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        TaskGuard {
            label,
            start: Instant::now(),
            finished: false,
            pb,
        }
    }
}

pub struct TaskGuard {
    label: String,
    start: Instant,
    finished: bool,
    pb: Option<ProgressBar>,
}

impl TaskGuard {
    pub fn progress(&self, detail: impl std::fmt::Display) {
        if let Some(pb) = &self.pb {
            pb.set_message(format!("{} ({detail})", self.label));
        }
    }

    pub fn finish(mut self) -> Duration {
        self.finished = true;
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        self.start.elapsed()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(pb) = self.pb.take() {
            pb.abandon_with_message(format!(
                "{} interrupted after {}",
                self.label,
                format_duration(self.start.elapsed())
            ));
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{:.0}ms", duration.as_secs_f64() * 1_000.0)
    }
}
