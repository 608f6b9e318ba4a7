//! Debounced power state.
//!
//! # State Machine
//!
//! ```text
//!               raw == reported                 held >= grace
//!  Steady ◄─────────────────────── Pending ─────────────────────► Steady
//!    │                               ▲  (raw reverted:                (reported
//!    │      raw != reported          │   change discarded)             flipped)
//!    └───────────────────────────────┘
//! ```
//!
//! - **Steady:** the raw signal matches what is reported.
//! - **Pending:** the raw signal differs; waiting for it to hold for the
//!   grace interval, measured from its first observation.
//!
//! `Unknown` or missing status carries no information and leaves
//! everything as it was, including a pending change's timer.
//!
//! The state is a plain value passed into and returned from
//! [`normalize_power`], so it can be tested without a scheduler.
//! [`PowerDebouncer`] wraps it for the monitor and reports transitions
//! the way callers act on them.

use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::ParsedStatus;

/// Per-device power tracker.
///
/// Must not be shared between devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebouncedPowerState {
    /// What entities show.
    pub reported_on: bool,
    /// Most recent raw signal.
    pub last_raw_on: bool,
    /// When `last_raw_on` last changed.
    pub last_change: Instant,
}

impl DebouncedPowerState {
    /// State after the first observation. Nothing to debounce against yet.
    pub fn seeded(raw_on: bool, now: Instant) -> Self {
        Self {
            reported_on: raw_on,
            last_raw_on: raw_on,
            last_change: now,
        }
    }

    /// A change is waiting out the grace interval.
    pub fn is_pending(&self) -> bool {
        self.last_raw_on != self.reported_on
    }

    fn observe(self, raw_on: bool, now: Instant, grace: Duration) -> Self {
        let last_change = if raw_on != self.last_raw_on {
            now
        } else {
            self.last_change
        };

        let held_long_enough = now.saturating_duration_since(last_change) >= grace;
        let reported_on = if raw_on != self.reported_on && held_long_enough {
            raw_on
        } else {
            self.reported_on
        };

        Self {
            reported_on,
            last_raw_on: raw_on,
            last_change,
        }
    }
}

/// Fold one poll into the power state.
///
/// `InWork`/`InInit` are raw-on, `InIdle` is raw-off. Returns `previous`
/// untouched when the status is unknown or absent; returns `None` only if
/// there has never been a usable observation.
pub fn normalize_power(
    parsed: &ParsedStatus,
    previous: Option<DebouncedPowerState>,
    now: Instant,
    grace: Duration,
) -> Option<DebouncedPowerState> {
    let raw_on = parsed.system_status.and_then(|s| s.raw_power());

    match (previous, raw_on) {
        (previous, None) => previous,
        (None, Some(raw_on)) => Some(DebouncedPowerState::seeded(raw_on, now)),
        (Some(previous), Some(raw_on)) => Some(previous.observe(raw_on, now, grace)),
    }
}

/// Result of [`PowerDebouncer::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    /// No usable observation yet.
    NoSignal,

    /// Reported state unchanged and nothing pending.
    Steady,

    /// Raw signal differs from the reported state; waiting.
    Pending,

    /// Reported state just changed (or was first established) to the
    /// given value. Returned once per change.
    Committed(bool),
}

/// Owns the debounce state and grace interval for one device.
#[derive(Debug)]
pub struct PowerDebouncer {
    grace: Duration,
    state: Option<DebouncedPowerState>,
}

impl PowerDebouncer {
    pub fn new(grace: Duration) -> Self {
        Self { grace, state: None }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// When a pending change will have held for the full grace interval.
    /// `None` when nothing is pending.
    pub fn commit_deadline(&self) -> Option<Instant> {
        self.state
            .filter(DebouncedPowerState::is_pending)
            .map(|s| s.last_change + self.grace)
    }

    /// Power state to show, if known.
    pub fn reported_on(&self) -> Option<bool> {
        self.state.map(|s| s.reported_on)
    }

    /// Fold in one poll.
    pub fn update(&mut self, parsed: &ParsedStatus, now: Instant) -> PowerTransition {
        let before = self.state.map(|s| s.reported_on);
        self.state = normalize_power(parsed, self.state, now, self.grace);

        match (before, self.state) {
            (_, None) => PowerTransition::NoSignal,
            (Some(before), Some(after)) if before == after.reported_on => {
                if after.is_pending() {
                    PowerTransition::Pending
                } else {
                    PowerTransition::Steady
                }
            }
            (_, Some(after)) => PowerTransition::Committed(after.reported_on),
        }
    }

    /// Report `on` right away after the device accepted a power command.
    ///
    /// The device keeps reporting its old state for a while after a soft
    /// start or stop. Restarting the grace window here keeps those polls
    /// from flipping the switch back; if the command never takes effect,
    /// the old state comes back after one grace interval.
    pub fn assume(&mut self, on: bool, now: Instant) {
        self.state = Some(match self.state {
            Some(state) => DebouncedPowerState {
                reported_on: on,
                last_raw_on: state.last_raw_on,
                last_change: now,
            },
            None => DebouncedPowerState {
                reported_on: on,
                last_raw_on: !on,
                last_change: now,
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use tokio::time;

    use super::*;
    use crate::types::SystemStatus;

    // All tests use start_paused so Instant::now() is deterministic and
    // time::advance() controls the clock.

    const GRACE: Duration = Duration::from_secs(10);

    fn status(system_status: SystemStatus) -> ParsedStatus {
        ParsedStatus {
            system_status: Some(system_status),
            ..Default::default()
        }
    }

    fn seeded_debouncer(status_now: SystemStatus) -> PowerDebouncer {
        let mut debouncer = PowerDebouncer::new(GRACE);
        debouncer.update(&status(status_now), Instant::now());
        debouncer
    }

    #[tokio::test(start_paused = true)]
    async fn first_observation_commits_immediately() {
        let mut debouncer = PowerDebouncer::new(GRACE);
        assert_eq!(
            debouncer.update(&status(SystemStatus::InWork), Instant::now()),
            PowerTransition::Committed(true)
        );
        assert_eq!(debouncer.reported_on(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_before_any_observation_is_no_signal() {
        let mut debouncer = PowerDebouncer::new(GRACE);
        assert_eq!(
            debouncer.update(&status(SystemStatus::Unknown), Instant::now()),
            PowerTransition::NoSignal
        );
        assert_eq!(
            debouncer.update(&ParsedStatus::default(), Instant::now()),
            PowerTransition::NoSignal
        );
        assert_eq!(debouncer.reported_on(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn init_counts_as_on() {
        let mut debouncer = seeded_debouncer(SystemStatus::InInit);
        assert_eq!(debouncer.reported_on(), Some(true));
        assert_eq!(
            debouncer.update(&status(SystemStatus::InWork), Instant::now()),
            PowerTransition::Steady
        );
    }

    #[tokio::test(start_paused = true)]
    async fn change_commits_after_grace() {
        let mut debouncer = seeded_debouncer(SystemStatus::InWork);

        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Pending
        );

        time::advance(Duration::from_secs(9)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Pending
        );
        assert_eq!(debouncer.reported_on(), Some(true));

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Committed(false)
        );
        assert_eq!(debouncer.reported_on(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn commit_is_one_shot() {
        let mut debouncer = seeded_debouncer(SystemStatus::InWork);
        debouncer.update(&status(SystemStatus::InIdle), Instant::now());

        time::advance(GRACE).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Committed(false)
        );

        time::advance(Duration::from_secs(60)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Steady
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flicker_within_grace_never_changes_reported_state() {
        let mut debouncer = seeded_debouncer(SystemStatus::InWork);

        // InWork -> InIdle -> InWork within 2 seconds.
        time::advance(Duration::from_secs(1)).await;
        debouncer.update(&status(SystemStatus::InIdle), Instant::now());
        assert_eq!(debouncer.reported_on(), Some(true));

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InWork), Instant::now()),
            PowerTransition::Steady
        );

        // Long after the grace interval, still on.
        time::advance(Duration::from_secs(30)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InWork), Instant::now()),
            PowerTransition::Steady
        );
        assert_eq!(debouncer.reported_on(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn separate_short_episodes_do_not_accumulate() {
        let mut debouncer = seeded_debouncer(SystemStatus::InWork);

        debouncer.update(&status(SystemStatus::InIdle), Instant::now());
        time::advance(Duration::from_secs(6)).await;
        debouncer.update(&status(SystemStatus::InWork), Instant::now());

        debouncer.update(&status(SystemStatus::InIdle), Instant::now());
        time::advance(Duration::from_secs(6)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Pending
        );
        assert_eq!(debouncer.reported_on(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_keeps_pending_timer() {
        let mut debouncer = seeded_debouncer(SystemStatus::InIdle);

        debouncer.update(&status(SystemStatus::InWork), Instant::now());
        time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::Unknown), Instant::now()),
            PowerTransition::Pending
        );

        time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InWork), Instant::now()),
            PowerTransition::Committed(true)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn assume_holds_through_device_transition() {
        let mut debouncer = seeded_debouncer(SystemStatus::InIdle);

        debouncer.assume(true, Instant::now());
        assert_eq!(debouncer.reported_on(), Some(true));

        // Device still idle while it spins up.
        time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Pending
        );

        time::advance(Duration::from_secs(3)).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InInit), Instant::now()),
            PowerTransition::Steady
        );
        assert_eq!(debouncer.reported_on(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn assume_is_reverted_if_command_never_lands() {
        let mut debouncer = seeded_debouncer(SystemStatus::InIdle);
        debouncer.assume(true, Instant::now());

        time::advance(GRACE).await;
        assert_eq!(
            debouncer.update(&status(SystemStatus::InIdle), Instant::now()),
            PowerTransition::Committed(false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn commit_deadline_tracks_pending_change() {
        let mut debouncer = seeded_debouncer(SystemStatus::InWork);
        assert_eq!(debouncer.commit_deadline(), None);

        time::advance(Duration::from_secs(4)).await;
        let first_seen = Instant::now();
        debouncer.update(&status(SystemStatus::InIdle), first_seen);
        assert_eq!(debouncer.commit_deadline(), Some(first_seen + GRACE));

        // A repeat observation doesn't move the deadline.
        time::advance(Duration::from_secs(3)).await;
        debouncer.update(&status(SystemStatus::InIdle), Instant::now());
        assert_eq!(debouncer.commit_deadline(), Some(first_seen + GRACE));

        time::advance(GRACE).await;
        debouncer.update(&status(SystemStatus::InIdle), Instant::now());
        assert_eq!(debouncer.commit_deadline(), None);
        assert_eq!(debouncer.reported_on(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn normalize_power_is_a_pure_fold() {
        let start = Instant::now();
        let work = status(SystemStatus::InWork);
        let idle = status(SystemStatus::InIdle);

        let state = normalize_power(&work, None, start, GRACE).unwrap();
        assert_eq!(state, DebouncedPowerState::seeded(true, start));

        let state = normalize_power(&idle, Some(state), start + Duration::from_secs(1), GRACE);
        let state = state.unwrap();
        assert!(state.is_pending());
        assert!(state.reported_on);
        assert_eq!(state.last_change, start + Duration::from_secs(1));

        let state = normalize_power(
            &ParsedStatus::default(),
            Some(state),
            start + Duration::from_secs(5),
            GRACE,
        )
        .unwrap();
        assert_eq!(state.last_change, start + Duration::from_secs(1));

        let state = normalize_power(&idle, Some(state), start + Duration::from_secs(11), GRACE)
            .unwrap();
        assert!(!state.reported_on);
        assert!(!state.is_pending());
    }
}
