use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use session_tunnel_runner::prelude::RunHandle;
use std::cmp::min;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Displays a progress bar while the run is spawning sessions, with the live session counts.
///
/// The bar is cleared once the run reaches a terminal status.
pub fn start_progress(planned_runtime: Duration, handle: Arc<RunHandle>) -> anyhow::Result<()> {
    let hours = planned_runtime.as_secs() / 3600;
    let minutes = (planned_runtime.as_secs() % 3600) / 60;
    let seconds = planned_runtime.as_secs() % 60;

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}] {msg}",
    )?
    .with_key(
        "planned_runtime",
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
        },
    )
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if handle.is_terminal() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let stats = handle.snapshot();
                pb.set_message(format!(
                    "{} | spawned {} running {} completed {} failed {}",
                    stats.status,
                    stats.spawned,
                    stats.clients_running(),
                    stats.completed,
                    stats.failed
                ));
                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                std::thread::sleep(Duration::from_millis(500));
            }
        })?;

    Ok(())
}
