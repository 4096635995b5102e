//! Overflow policies for the per-sink worker queues
//!
//! The dispatch loop feeds each sink through a bounded queue. When a queue
//! is full, the policy decides what happens to the item. None of the
//! policies ever block the code that called `Logger::log`; at most they
//! hold up the dispatch loop for a bounded time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for handling a full sink queue
///
/// # Example
///
/// ```
/// use logrelay::OverflowPolicy;
/// use std::time::Duration;
///
/// // Default behavior: alert and drop
/// let policy = OverflowPolicy::default();
///
/// // Hold the dispatch loop for up to 50ms, then drop
/// let policy = OverflowPolicy::BlockWithTimeout(Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the incoming item silently, metrics are still tracked
    DropNewest,

    /// Evict the oldest queued item to make room for the incoming one
    DropOldest,

    /// Wait for space, then drop the incoming item if the timeout expires
    BlockWithTimeout(Duration),

    /// Drop the incoming item and alert via callback and stderr
    #[default]
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when records are dropped because a queue is full.
/// The parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Alert on the first drop and on every thousandth one after that
pub(crate) fn should_alert(dropped_before: u64) -> bool {
    should_alert_span(dropped_before, 1)
}

/// Same rate limit when `added` records are dropped in one go
pub(crate) fn should_alert_span(dropped_before: u64, added: u64) -> bool {
    dropped_before == 0 || (dropped_before + added) / 1000 > dropped_before / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_default() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::AlertAndDrop);
    }

    #[test]
    fn test_overflow_policy_display() {
        assert_eq!(OverflowPolicy::DropNewest.to_string(), "DropNewest");
        assert_eq!(OverflowPolicy::DropOldest.to_string(), "DropOldest");
        assert_eq!(
            OverflowPolicy::BlockWithTimeout(Duration::from_millis(100)).to_string(),
            "BlockWithTimeout(100ms)"
        );
        assert_eq!(OverflowPolicy::AlertAndDrop.to_string(), "AlertAndDrop");
    }

    #[test]
    fn test_alert_rate_limit() {
        assert!(should_alert(0));
        assert!(!should_alert(1));
        assert!(!should_alert(500));
        assert!(should_alert(999));
        assert!(should_alert(1999));
    }

    #[test]
    fn test_alert_rate_limit_for_batches() {
        assert!(should_alert_span(0, 50));
        assert!(!should_alert_span(10, 50));
        assert!(should_alert_span(980, 50));
        assert!(!should_alert_span(1000, 50));
    }
}
