//! Timer configuration and derivation (spec §4.7, §6 Configuration): the
//! base intervals T1/T2/T4 and the constants every FSM derives from them.

use std::time::Duration;

/// Base retransmission intervals a stack is configured with. RFC 3261
/// compliance only requires `500 <= t1 <= 4000`; the spec notes the
/// reference splits T1 between the Invite and Non-Invite client machines,
/// so this is exposed as configuration rather than hard-coded (spec §9 open
/// question).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub t1: Duration,
    pub t2: Duration,
    pub t4: Duration,
}

impl TimerConfig {
    pub const fn new(t1_ms: u64, t2_ms: u64, t4_ms: u64) -> Self {
        TimerConfig { t1: Duration::from_millis(t1_ms), t2: Duration::from_millis(t2_ms), t4: Duration::from_millis(t4_ms) }
    }

    /// Timer B/F/H: the overall transaction deadline, `64 * T1`.
    pub fn deadline(&self) -> Duration {
        self.t1 * 64
    }

    /// Timer D: absorber for the Invite client's `completed` state, at
    /// least 32 seconds.
    pub fn d(&self) -> Duration {
        Duration::from_millis(32_000).max(self.deadline())
    }

    /// Timer K: Non-Invite client `completed` absorber, equal to T4.
    pub fn k(&self) -> Duration {
        self.t4
    }

    /// Timer I: Invite server `confirmed` absorber, equal to T4.
    pub fn i(&self) -> Duration {
        self.t4
    }

    /// Timer J: Non-Invite server `completed` absorber, `64 * T1`.
    pub fn j(&self) -> Duration {
        self.deadline()
    }

    /// Invite server `proceeding`'s auto-100 deadline.
    pub fn still_trying(&self) -> Duration {
        Duration::from_millis(200)
    }

    /// Invite server `proceeding -> idle` absorber once the auto-100 fires:
    /// `T2 - still_trying`.
    pub fn server_idle(&self) -> Duration {
        self.t2.saturating_sub(self.still_trying())
    }

    /// Non-Invite server `trying` idle deadline.
    pub fn trying_idle(&self) -> Duration {
        Duration::from_millis(4_000)
    }

    /// Next retransmit interval given the last one fired, doubling and
    /// capping at T2 (used by Non-Invite client/server retransmit timers
    /// and the Invite server's completed-state timer G).
    pub fn next_retransmit(&self, last: Duration) -> Duration {
        (last * 2).min(self.t2)
    }
}

impl Default for TimerConfig {
    /// T1=500ms, T2=4000ms, T4=5000ms (spec §6 Configuration).
    fn default() -> Self {
        TimerConfig::new(500, 4_000, 5_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_sixty_four_t1() {
        let cfg = TimerConfig::default();
        assert_eq!(cfg.deadline(), Duration::from_millis(32_000));
    }

    #[test]
    fn next_retransmit_doubles_until_capped_at_t2() {
        let cfg = TimerConfig::default();
        assert_eq!(cfg.next_retransmit(Duration::from_millis(500)), Duration::from_millis(1_000));
        assert_eq!(cfg.next_retransmit(Duration::from_millis(3_000)), Duration::from_millis(4_000));
    }

    #[test]
    fn server_idle_fills_the_remainder_of_t2() {
        let cfg = TimerConfig::default();
        assert_eq!(cfg.server_idle(), Duration::from_millis(3_800));
    }
}
