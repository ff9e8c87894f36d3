//! Export configuration.
//!
//! [`ExportOptions`] is a builder that threads progress callbacks,
//! cancellation tokens, and CPU throttling settings through an export
//! without polluting every function signature.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use segmux::{CancellationToken, ExportOptions, OverlapPolicy, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}%", info.percent);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExportOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_cpu_limit(50)
//!     .with_overlap_policy(OverlapPolicy::Permit);
//! assert_eq!(options.cpu_limit(), Some(50));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback, ProgressMode};
use crate::segment::OverlapPolicy;
use crate::throttle::DEFAULT_CPU_LIMIT_PERCENT;

/// Configuration for an export job.
///
/// A default-constructed value exports with no progress reporting, no
/// cancellation, a 30 % CPU cap, and overlapping segments rejected.
#[derive(Clone)]
pub struct ExportOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Whether a real callback was attached.
    pub(crate) has_progress: bool,
    /// How percentages relate to segments.
    pub(crate) progress_mode: ProgressMode,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// CPU cap in percent of all cores; `None` disables throttling.
    pub(crate) cpu_limit: Option<u8>,
    /// What to do with overlapping segments.
    pub(crate) overlap_policy: OverlapPolicy,
}

impl Debug for ExportOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExportOptions")
            .field("has_progress", &self.has_progress)
            .field("progress_mode", &self.progress_mode)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("cpu_limit", &self.cpu_limit)
            .field("overlap_policy", &self.overlap_policy)
            .finish()
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            has_progress: false,
            progress_mode: ProgressMode::Global,
            cancellation: None,
            cpu_limit: Some(DEFAULT_CPU_LIMIT_PERCENT),
            overlap_policy: OverlapPolicy::Reject,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self.has_progress = true;
        self
    }

    /// Choose how percentages span a multi-segment job.
    #[must_use]
    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the export stops before its next packet
    /// and returns [`SegmuxError::Cancelled`](crate::SegmuxError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Cap the process CPU usage during the copy loop.
    ///
    /// Clamped to `1..=100`.
    #[must_use]
    pub fn with_cpu_limit(mut self, percent: u8) -> Self {
        self.cpu_limit = Some(percent.clamp(1, 100));
        self
    }

    /// Run the copy loop without CPU throttling.
    #[must_use]
    pub fn without_throttle(mut self) -> Self {
        self.cpu_limit = None;
        self
    }

    /// Choose whether overlapping segments are rejected or exported as-is.
    #[must_use]
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    /// The configured CPU cap, if throttling is enabled.
    pub fn cpu_limit(&self) -> Option<u8> {
        self.cpu_limit
    }

    /// The configured overlap policy.
    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap_policy
    }

    /// The configured progress mode.
    pub fn progress_mode(&self) -> ProgressMode {
        self.progress_mode
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}
