#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Logger setup and progress bars for the hitchmap binaries.
//!
//! [`init_logger`] wraps `pretty_env_logger` in `indicatif-log-bridge` so
//! log lines are suspended while bars redraw. [`IndicatifProgress`] is the
//! terminal implementation of [`progress::ProgressCallback`].

pub mod progress;

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a bar over the pipeline stages. The total is known up front.
    #[must_use]
    pub fn stages_bar(
        multi: &MultiProgress,
        message: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        let bar_style = bar.style();

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// `RUST_LOG` controls verbosity. Returns the [`MultiProgress`] that all
/// progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice (tests)
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    #[test]
    fn bar_tracks_position_after_total() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let bar = ProgressBar::new_spinner();
        let progress = IndicatifProgress {
            bar: multi.add(bar),
            bar_style: ProgressStyle::default_bar(),
        };

        progress.set_total(4);
        progress.inc(3);
        assert_eq!(progress.bar.length(), Some(4));
        assert_eq!(progress.bar.position(), 3);

        progress.finish("done".to_string());
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn stages_bar_counts_written_outputs() {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let progress = IndicatifProgress::stages_bar(&multi, "Generating", 9);

        progress.set_message("Writing data...".to_string());
        progress.set_total(2);
        progress.inc(2);
        progress.finish("Wrote 2 outputs".to_string());
    }

    #[test]
    fn null_progress_accepts_updates() {
        let progress = progress::null_progress();
        progress.set_total(10);
        progress.inc(10);
        progress.finish("ok".to_string());
    }
}
