use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

pub fn progress_bar(len: usize, message: &'static str) -> Result<ProgressBar> {
    let progress_bar = ProgressBar::new(len as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{msg} {spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )?
        .progress_chars("#>-"),
    );
    progress_bar.set_message(message);

    Ok(progress_bar)
}
