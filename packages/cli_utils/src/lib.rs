#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the fire atlas toolchain.
//!
//! Provides `indicatif`-backed progress bars behind the
//! [`ProgressCallback`] trait, plus [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while progress bars redraw.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use fire_atlas_aggregate::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// An `indicatif` progress reporter shared by every aggregation pass.
///
/// Each pass announces itself through
/// [`ProgressCallback::set_total()`], which starts a fresh bar under the
/// [`MultiProgress`]. Finished bars stay on screen with their final
/// message.
pub struct IndicatifProgress {
    multi: MultiProgress,
    bar: Mutex<ProgressBar>,
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates a reporter that shows a spinner until the first pass
    /// starts.
    #[must_use]
    pub fn districts_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self {
            multi: multi.clone(),
            bar: Mutex::new(bar),
            bar_style,
        })
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let bar = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        f(&bar);
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        let mut bar = self.bar.lock().unwrap_or_else(PoisonError::into_inner);
        if bar.is_finished() {
            *bar = self.multi.add(ProgressBar::new(total));
        } else {
            bar.disable_steady_tick();
            bar.set_length(total);
            bar.set_position(0);
        }
        bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.with_bar(|bar| bar.inc(delta));
    }

    fn set_message(&self, msg: String) {
        self.with_bar(|bar| bar.set_message(msg));
    }

    fn finish(&self, msg: String) {
        self.with_bar(|bar| bar.finish_with_message(msg));
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set in tests

    log::set_max_level(level);

    multi
}
