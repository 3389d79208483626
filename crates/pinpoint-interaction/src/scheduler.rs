//! Deferred work: timers, idle-time callbacks, and the rate limiters built on
//! them.
//!
//! The engine never sleeps or spawns. It asks a [`Scheduler`] for a timer or
//! an idle callback and receives the firing later through [`TaskSink`]. The
//! [`VirtualScheduler`] drives that clock explicitly, which is how scenarios
//! are replayed and how timing behavior is tested.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::trace;

/// Handle to one scheduled timer or idle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Information passed to an idle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleDeadline {
    /// Idle time left in the current frame
    pub time_remaining: Duration,
    /// Whether the callback runs because its timeout ceiling expired
    pub did_timeout: bool,
}

/// Source of timers and idle callbacks.
pub trait Scheduler {
    /// Monotonic time since the scheduler started.
    fn now(&self) -> Duration;

    /// Request a callback when the host is idle, or after `timeout` at the
    /// latest.
    fn request_idle(&self, timeout: Duration) -> TaskId;

    /// Request a callback after `delay`.
    fn set_timer(&self, delay: Duration) -> TaskId;

    /// Cancel a pending timer or idle request. Unknown ids are ignored.
    fn cancel(&self, id: TaskId);
}

/// Receiver of fired tasks.
pub trait TaskSink {
    /// A timer fired.
    fn on_timer(&self, id: TaskId);

    /// An idle request fired.
    fn on_idle(&self, id: TaskId, deadline: IdleDeadline);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Timer,
    Idle,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: TaskId,
    kind: TaskKind,
    // For idle requests this is the timeout ceiling.
    due: Duration,
}

#[derive(Debug, Default)]
struct VirtualState {
    now: Duration,
    next_id: u64,
    pending: Vec<Pending>,
}

impl VirtualState {
    fn push(&mut self, kind: TaskKind, after: Duration) -> TaskId {
        self.next_id += 1;
        let id = TaskId(self.next_id);
        let due = self.now + after;
        self.pending.push(Pending { id, kind, due });
        id
    }

    fn pop_due(&mut self, limit: Duration) -> Option<Pending> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= limit)
            .min_by_key(|(_, p)| (p.due, p.id))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(index))
    }
}

/// Scheduler with an explicitly advanced clock.
///
/// Clones share the same clock and task queue.
#[derive(Debug, Clone, Default)]
pub struct VirtualScheduler {
    state: Rc<RefCell<VirtualState>>,
}

impl VirtualScheduler {
    /// Create a scheduler at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `by`, firing every timer and expired idle
    /// request that falls due, in due order.
    ///
    /// Tasks scheduled by a callback fire in the same call if they fall due
    /// before the end of the window. Returns how many tasks fired.
    pub fn advance(&self, by: Duration, sink: &dyn TaskSink) -> usize {
        let target = self.state.borrow().now + by;
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let next = state.pop_due(target);
                if let Some(task) = next {
                    state.now = task.due;
                }
                next
            };
            let Some(task) = next else { break };

            fired += 1;
            trace!(task = %task.id, kind = ?task.kind, at = ?task.due, "task fired");
            match task.kind {
                TaskKind::Timer => sink.on_timer(task.id),
                TaskKind::Idle => sink.on_idle(
                    task.id,
                    IdleDeadline {
                        time_remaining: Duration::ZERO,
                        did_timeout: true,
                    },
                ),
            }
        }

        self.state.borrow_mut().now = target;
        fired
    }

    /// Simulate an idle period with `slack` of spare time, delivering every
    /// idle request pending at the start of the call.
    ///
    /// Requests made by these callbacks wait for the next idle period.
    /// Returns how many callbacks ran.
    pub fn run_idle(&self, slack: Duration, sink: &dyn TaskSink) -> usize {
        let batch: Vec<TaskId> = self
            .state
            .borrow()
            .pending
            .iter()
            .filter(|p| p.kind == TaskKind::Idle)
            .map(|p| p.id)
            .collect();

        let mut fired = 0;
        for id in batch {
            let still_pending = {
                let mut state = self.state.borrow_mut();
                let before = state.pending.len();
                state.pending.retain(|p| p.id != id);
                before != state.pending.len()
            };
            if !still_pending {
                continue;
            }

            fired += 1;
            sink.on_idle(
                id,
                IdleDeadline {
                    time_remaining: slack,
                    did_timeout: false,
                },
            );
        }
        fired
    }

    /// Number of pending timers.
    pub fn pending_timers(&self) -> usize {
        self.count(TaskKind::Timer)
    }

    /// Number of pending idle requests.
    pub fn pending_idle(&self) -> usize {
        self.count(TaskKind::Idle)
    }

    /// Whether any task is still pending.
    pub fn has_pending(&self) -> bool {
        !self.state.borrow().pending.is_empty()
    }

    fn count(&self, kind: TaskKind) -> usize {
        self.state
            .borrow()
            .pending
            .iter()
            .filter(|p| p.kind == kind)
            .count()
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Duration {
        self.state.borrow().now
    }

    fn request_idle(&self, timeout: Duration) -> TaskId {
        self.state.borrow_mut().push(TaskKind::Idle, timeout)
    }

    fn set_timer(&self, delay: Duration) -> TaskId {
        self.state.borrow_mut().push(TaskKind::Timer, delay)
    }

    fn cancel(&self, id: TaskId) {
        self.state.borrow_mut().pending.retain(|p| p.id != id);
    }
}

/// Outcome of offering a sample to a [`Throttle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Process the sample immediately
    Now,
    /// Schedule a trailing timer after this delay and process the latest
    /// sample when it fires
    Later(Duration),
    /// A trailing timer is already pending; it will pick up the latest sample
    Queued,
}

/// Leading-and-trailing rate limiter.
///
/// At most one sample is processed per interval. Samples arriving inside the
/// interval collapse into one trailing run that sees the latest sample.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_run: Option<Duration>,
    trailing: Option<TaskId>,
}

impl Throttle {
    /// Create a throttle with the given minimum spacing.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_run: None,
            trailing: None,
        }
    }

    /// Offer a sample arriving at `now`.
    pub fn gate(&mut self, now: Duration) -> Gate {
        if self.trailing.is_some() {
            return Gate::Queued;
        }
        match self.last_run {
            Some(last) if now < last + self.interval => Gate::Later(last + self.interval - now),
            _ => {
                self.last_run = Some(now);
                Gate::Now
            }
        }
    }

    /// Record the timer scheduled after [`Gate::Later`].
    pub fn arm(&mut self, id: TaskId) {
        self.trailing = Some(id);
    }

    /// Handle a fired timer. Returns `true` if it was this throttle's
    /// trailing run, which is then recorded as the latest run.
    pub fn fire(&mut self, id: TaskId, now: Duration) -> bool {
        if self.trailing != Some(id) {
            return false;
        }
        self.trailing = None;
        self.last_run = Some(now);
        true
    }

    /// Forget the pending trailing run, returning its timer to cancel.
    pub fn cancel(&mut self) -> Option<TaskId> {
        self.trailing.take()
    }
}

/// Trailing-edge debounce: only the last of a burst of events runs, once the
/// burst has been quiet for the delay.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    timer: Option<TaskId>,
}

impl Debounce {
    /// Create a debounce with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self { delay, timer: None }
    }

    /// Quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a freshly scheduled timer, returning the superseded one to
    /// cancel.
    pub fn replace(&mut self, id: TaskId) -> Option<TaskId> {
        self.timer.replace(id)
    }

    /// Handle a fired timer. Returns `true` if it was this debounce's.
    pub fn fire(&mut self, id: TaskId) -> bool {
        if self.timer != Some(id) {
            return false;
        }
        self.timer = None;
        true
    }

    /// Whether a run is pending.
    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// Forget the pending run, returning its timer to cancel.
    pub fn cancel(&mut self) -> Option<TaskId> {
        self.timer.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Log {
        events: RefCell<Vec<(TaskId, Option<IdleDeadline>)>>,
    }

    impl TaskSink for Log {
        fn on_timer(&self, id: TaskId) {
            self.events.borrow_mut().push((id, None));
        }

        fn on_idle(&self, id: TaskId, deadline: IdleDeadline) {
            self.events.borrow_mut().push((id, Some(deadline)));
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let sched = VirtualScheduler::new();
        let log = Log::default();
        let late = sched.set_timer(ms(30));
        let early = sched.set_timer(ms(10));

        assert_eq!(sched.advance(ms(5), &log), 0);
        assert_eq!(sched.advance(ms(30), &log), 2);
        let fired: Vec<TaskId> = log.events.borrow().iter().map(|(id, _)| *id).collect();
        assert_eq!(fired, vec![early, late]);
        assert_eq!(sched.now(), ms(35));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let sched = VirtualScheduler::new();
        let log = Log::default();
        let id = sched.set_timer(ms(10));
        sched.cancel(id);

        assert_eq!(sched.advance(ms(100), &log), 0);
        assert!(!sched.has_pending());
    }

    #[test]
    fn test_idle_request_times_out() {
        let sched = VirtualScheduler::new();
        let log = Log::default();
        let id = sched.request_idle(ms(100));

        sched.advance(ms(99), &log);
        assert!(log.events.borrow().is_empty());
        sched.advance(ms(1), &log);

        let events = log.events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, id);
        assert!(events[0].1.unwrap().did_timeout);
    }

    #[test]
    fn test_run_idle_delivers_slack() {
        let sched = VirtualScheduler::new();
        let log = Log::default();
        sched.request_idle(ms(100));
        sched.set_timer(ms(5));

        assert_eq!(sched.run_idle(ms(12), &log), 1);
        let deadline = log.events.borrow()[0].1.unwrap();
        assert_eq!(deadline.time_remaining, ms(12));
        assert!(!deadline.did_timeout);
        assert_eq!(sched.pending_idle(), 0);
        assert_eq!(sched.pending_timers(), 1);
    }

    #[test]
    fn test_throttle_leading_and_trailing() {
        let mut throttle = Throttle::new(ms(16));
        assert_eq!(throttle.gate(ms(0)), Gate::Now);
        assert_eq!(throttle.gate(ms(4)), Gate::Later(ms(12)));
        throttle.arm(TaskId(7));
        assert_eq!(throttle.gate(ms(8)), Gate::Queued);

        assert!(!throttle.fire(TaskId(8), ms(16)));
        assert!(throttle.fire(TaskId(7), ms(16)));
        assert_eq!(throttle.gate(ms(20)), Gate::Later(ms(12)));
        assert_eq!(throttle.gate(ms(40)), Gate::Now);
    }

    #[test]
    fn test_debounce_replaces_timer() {
        let mut debounce = Debounce::new(ms(50));
        assert_eq!(debounce.replace(TaskId(1)), None);
        assert_eq!(debounce.replace(TaskId(2)), Some(TaskId(1)));
        assert!(!debounce.fire(TaskId(1)));
        assert!(debounce.fire(TaskId(2)));
        assert!(!debounce.is_pending());
    }
}
