use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// "At least `changes` changes within `window`" trips the guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeLimit {
    pub changes: usize,
    pub window: Duration,
}

impl ChangeLimit {
    pub fn new(changes: usize, window: Duration) -> Self {
        Self { changes, window }
    }
}

/// Detects a value that is being replaced too often, typically a query or callable argument
/// rebuilt on every render instead of being memoized.
///
/// Every observed value that differs from the previous one is timestamped. The guard counts as
/// exceeded while any [`ChangeLimit`] is met; the defaults are four changes within three
/// seconds or six changes within five seconds.
#[derive(Debug)]
pub struct ChangeRateGuard<T> {
    current: Option<T>,
    changes: VecDeque<DateTime<Utc>>,
    limits: Vec<ChangeLimit>,
}

impl<T: PartialEq> Default for ChangeRateGuard<T> {
    fn default() -> Self {
        Self::with_limits(vec![
            ChangeLimit::new(4, Duration::seconds(3)),
            ChangeLimit::new(6, Duration::seconds(5)),
        ])
    }
}

impl<T: PartialEq> ChangeRateGuard<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: Vec<ChangeLimit>) -> Self {
        Self {
            current: None,
            changes: VecDeque::new(),
            limits,
        }
    }

    /// Records `value` and reports whether the change rate is now over a limit.
    pub fn observe(&mut self, value: Option<T>) -> bool {
        self.observe_at(value, Utc::now())
    }

    pub fn observe_at(&mut self, value: Option<T>, now: DateTime<Utc>) -> bool {
        if value != self.current {
            self.current = value;
            self.changes.push_front(now);
            self.changes.truncate(self.capacity());
        }

        let exceeded = self.exceeded_at(now);
        if exceeded {
            log::error!("Ref change limit exceeded!!!");
        }
        exceeded
    }

    pub fn exceeded(&self) -> bool {
        self.exceeded_at(Utc::now())
    }

    pub fn exceeded_at(&self, now: DateTime<Utc>) -> bool {
        self.limits.iter().any(|limit| {
            limit.changes > 0
                && self
                    .changes
                    .get(limit.changes - 1)
                    .is_some_and(|at| *at > now - limit.window)
        })
    }

    /// The latest value, withheld while the guard is exceeded.
    pub fn safe_value(&self) -> Option<&T> {
        if self.exceeded() {
            None
        } else {
            self.current.as_ref()
        }
    }

    /// Change timestamps, most recent first.
    pub fn timestamps(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.changes.iter()
    }

    fn capacity(&self) -> usize {
        self.limits
            .iter()
            .map(|limit| limit.changes)
            .max()
            .unwrap_or(0)
    }
}
