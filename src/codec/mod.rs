//! Codec port — the pluggable byte-level compression capability
//!
//! The engine never touches archive bytes itself; it hands a descriptor and
//! a [`CodecContext`] to a [`Codec`] implementation. Codecs run on blocking
//! worker threads, poll the context's interrupt flag between buffer-sized
//! chunks, and report progress through the context's notifier.

mod zip;

pub use zip::ZipCodec;

use crate::descriptor::ArchiveDescriptor;
use crate::error::{Error, Result};
use crate::progress::ProgressNotifier;
use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// External capability performing the actual byte-level (de)compression.
///
/// Implementations must be thread-safe: one codec instance is shared across
/// all operations of its archive kind. Both methods block and are executed
/// on dedicated blocking threads by the engine.
pub trait Codec: Send + Sync {
    /// The range of compression levels this codec accepts.
    ///
    /// Descriptor factories validate requested levels against this range at
    /// construction time so faulty levels never reach a worker.
    fn accepted_levels(&self) -> RangeInclusive<i64>;

    /// Create the archive described by `descriptor`.
    ///
    /// Must poll [`CodecContext::check_interrupted`] between buffer-sized
    /// chunks and abort promptly with [`Error::Interrupted`].
    fn compress(&self, descriptor: &ArchiveDescriptor, ctx: &CodecContext) -> Result<()>;

    /// Extract the archive described by `descriptor`.
    ///
    /// Same interruption contract as [`Codec::compress`].
    fn extract(&self, descriptor: &ArchiveDescriptor, ctx: &CodecContext) -> Result<()>;
}

/// Entry-name filter predicate applied during archiving.
///
/// Entries whose names do not match the pattern are skipped. Patterns are
/// regular expressions matched against the full entry name.
#[derive(Clone, Debug)]
pub struct EntryFilter {
    pattern: Regex,
}

impl EntryFilter {
    /// Compile a filter from a regex pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| Error::Config {
            message: format!("invalid entry filter pattern: {e}"),
            key: Some("entry_filter".to_string()),
        })?;
        Ok(Self { pattern })
    }

    /// Returns `true` if the entry name passes the filter.
    pub fn matches(&self, entry_name: &str) -> bool {
        self.pattern.is_match(entry_name)
    }
}

/// Per-execution state handed to a codec invocation.
///
/// Carries the operation's interrupt flag, its progress notifier, the
/// optional entry filter, and the copy-buffer size (which doubles as the
/// cancellation granularity).
pub struct CodecContext {
    interrupt: Arc<AtomicBool>,
    notifier: ProgressNotifier,
    entry_filter: Option<EntryFilter>,
    copy_buffer_size: usize,
}

impl CodecContext {
    /// Assemble a context for one codec invocation.
    pub fn new(
        interrupt: Arc<AtomicBool>,
        notifier: ProgressNotifier,
        entry_filter: Option<EntryFilter>,
        copy_buffer_size: usize,
    ) -> Self {
        Self {
            interrupt,
            notifier,
            entry_filter,
            copy_buffer_size,
        }
    }

    /// Returns `true` if interruption has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Acquire)
    }

    /// Fail with [`Error::Interrupted`] if interruption has been requested.
    ///
    /// Codecs call this between buffer-sized chunks.
    pub fn check_interrupted(&self) -> Result<()> {
        if self.is_interrupted() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    /// Report this operation's progress percentage in `[0, 100]`.
    ///
    /// Values reported by one codec invocation must be monotonically
    /// non-decreasing.
    pub fn report_percent(&self, percent: f64) {
        self.notifier.notify(percent.clamp(0.0, 100.0));
    }

    /// Returns `true` if the entry name passes the configured filter
    /// (or no filter is configured).
    pub fn accepts_entry(&self, entry_name: &str) -> bool {
        self.entry_filter
            .as_ref()
            .is_none_or(|filter| filter.matches(entry_name))
    }

    /// Copy buffer size in bytes; also the interrupt-polling granularity.
    pub fn copy_buffer_size(&self) -> usize {
        self.copy_buffer_size
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn context(filter: Option<EntryFilter>) -> (CodecContext, Arc<AtomicBool>) {
        let interrupt = Arc::new(AtomicBool::new(false));
        let ctx = CodecContext::new(interrupt.clone(), ProgressNotifier::new(), filter, 8192);
        (ctx, interrupt)
    }

    #[test]
    fn check_interrupted_reflects_flag() {
        let (ctx, interrupt) = context(None);
        assert!(ctx.check_interrupted().is_ok());

        interrupt.store(true, Ordering::Release);
        assert!(ctx.is_interrupted());
        assert!(matches!(ctx.check_interrupted(), Err(Error::Interrupted)));
    }

    #[test]
    fn entry_filter_matches_by_regex() {
        let filter = EntryFilter::new(r"\.txt$").unwrap();
        assert!(filter.matches("notes.txt"));
        assert!(filter.matches("dir/readme.txt"));
        assert!(!filter.matches("image.png"));
    }

    #[test]
    fn invalid_filter_pattern_fails_fast() {
        let err = EntryFilter::new("(unclosed").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn context_without_filter_accepts_everything() {
        let (ctx, _) = context(None);
        assert!(ctx.accepts_entry("anything.bin"));
    }

    #[test]
    fn context_with_filter_rejects_non_matching() {
        let filter = EntryFilter::new(r"\.txt$").unwrap();
        let (ctx, _) = context(Some(filter));
        assert!(ctx.accepts_entry("a.txt"));
        assert!(!ctx.accepts_entry("a.png"));
    }

    #[test]
    fn report_percent_clamps_out_of_range_values() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = notifier.attach(Box::new(move |p| {
            seen_clone.lock().unwrap().push(p);
        }));

        let ctx = CodecContext::new(
            Arc::new(AtomicBool::new(false)),
            notifier,
            None,
            4096,
        );
        ctx.report_percent(-5.0);
        ctx.report_percent(150.0);

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![0.0, 100.0]);
    }
}
