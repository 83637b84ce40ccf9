use indicatif::{ProgressBar, ProgressStyle};

pub fn ingest_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:<10} {spinner:.cyan.bold} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}

pub fn ingest_spinner(video_id: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ingest_spinner_style());
    spinner.set_prefix("ingest");
    spinner.set_message(format!("sampling {video_id}"));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
