//! Console progress rendering
//!
//! Prints pipeline stage messages received from a `BroadcastProgress` channel.
//! The renderer stops once every sender is dropped.

use std::time::{Duration, Instant};

use console::style;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::pipeline::BroadcastProgress;

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

pub struct ConsoleRenderer {
    receiver: broadcast::Receiver<String>,
    started: Instant,
    show_elapsed: bool,
}

impl ConsoleRenderer {
    pub fn new(progress: &BroadcastProgress) -> Self {
        Self {
            receiver: progress.subscribe(),
            started: Instant::now(),
            show_elapsed: true,
        }
    }

    pub fn with_elapsed(mut self, show: bool) -> Self {
        self.show_elapsed = show;
        self
    }

    /// Format one progress line
    fn render(&self, index: usize, message: &str, elapsed: Duration) -> String {
        let spinner = SPINNER[index % SPINNER.len()];
        let elapsed = if self.show_elapsed {
            format!(" {}", style(format!("[{}]", format_duration(elapsed))).dim())
        } else {
            String::new()
        };
        format!("{} {}{}", style(spinner).cyan(), message, elapsed)
    }

    /// Print messages until the channel closes. Resolves to the number of
    /// messages printed.
    pub fn spawn(mut self) -> tokio::task::JoinHandle<usize> {
        tokio::spawn(async move {
            let mut printed = 0;
            loop {
                match self.receiver.recv().await {
                    Ok(message) => {
                        println!("{}", self.render(printed, &message, self.started.elapsed()));
                        printed += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        println!("{}", style(format!("  … {} messages skipped", skipped)).dim());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            printed
        })
    }
}

/// Format duration as human-readable string
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs == 0 {
        format!("{}ms", elapsed.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ProgressSink;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3700)), "1h 1m");
    }

    #[test]
    fn test_render_without_elapsed() {
        let progress = BroadcastProgress::new();
        let renderer = ConsoleRenderer::new(&progress).with_elapsed(false);
        let line = renderer.render(0, "building graph", Duration::from_secs(5));
        assert!(line.contains("building graph"));
        assert!(!line.contains("5s"));
    }

    #[tokio::test]
    async fn test_renderer_stops_when_senders_drop() {
        let progress = BroadcastProgress::new();
        let handle = ConsoleRenderer::new(&progress).spawn();

        progress.report("stage one");
        progress.report("stage two");
        drop(progress);

        assert_eq!(handle.await.unwrap(), 2);
    }
}
