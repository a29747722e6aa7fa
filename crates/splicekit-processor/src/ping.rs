//! Ping state machine
//!
//! Shared by both passes. A ping becomes due once [`PING_SPACING`] mm of
//! filament have passed since the previous one, and only fires while the
//! caller reports that the nozzle is in an eligible region (a wipe tower,
//! a generated tower segment, or a side-transition purge).
//!
//! Connected hardware gets a single in-band marker. Accessory hardware
//! observes two dwells separated by [`ACCESSORY_PING_EXTRUSION`] mm of
//! extrusion; if the region ends between them the ping is pending and the
//! caller decides whether that is a cancellation or an error.

use splicekit_core::constants::{
    ACCESSORY_PING_BEGIN_DWELL_MS, ACCESSORY_PING_COMPLETE_DWELL_MS, ACCESSORY_PING_EXTRUSION,
    PING_SPACING,
};
use splicekit_core::PingMode;
use splicekit_msf::Msf;

/// Slack for float accumulation in filament positions (mm)
const EPSILON: f32 = 1e-3;

/// Something the ping machine wants written or recorded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PingEvent {
    /// Connected ping fired at a filament position
    Connected { position: f32 },
    /// First dwell of an accessory ping
    Begin { start: f32 },
    /// Second dwell of an accessory ping
    Complete { start: f32, extrusion: f32 },
}

impl PingEvent {
    /// G-code for the event
    pub fn gcode(&self) -> String {
        match self {
            Self::Connected { position } => splicekit_msf::ping_command(*position),
            Self::Begin { .. } => format!("G4 P{}", ACCESSORY_PING_BEGIN_DWELL_MS),
            Self::Complete { .. } => format!("G4 P{}", ACCESSORY_PING_COMPLETE_DWELL_MS),
        }
    }

    /// Add the ping to the ledger once it is complete
    pub fn record(&self, ledger: &mut Msf) {
        match *self {
            Self::Connected { position } => ledger.add_ping(position, None),
            Self::Complete { start, extrusion } => ledger.add_ping(start, Some(extrusion)),
            Self::Begin { .. } => {}
        }
    }
}

/// A ping left unfinished when its region ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingPing {
    pub start: f32,
    /// Extrusion still needed to complete it (mm)
    pub remaining: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Pending { start: f32, previous_ping: f32 },
}

/// Ping sub-state for one pass
#[derive(Debug, Clone, PartialEq)]
pub struct PingState {
    mode: PingMode,
    last_ping: f32,
    phase: Phase,
}

impl PingState {
    pub fn new(mode: PingMode) -> Self {
        Self {
            mode,
            last_ping: 0.0,
            phase: Phase::Idle,
        }
    }

    pub fn mode(&self) -> PingMode {
        self.mode
    }

    /// Filament position of the last ping start
    pub fn last_ping(&self) -> f32 {
        self.last_ping
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending { .. })
    }

    /// Whether a new ping would start at `position`
    pub fn is_due(&self, position: f32) -> bool {
        self.phase == Phase::Idle && position - self.last_ping >= PING_SPACING - EPSILON
    }

    /// Advance to `position` inside an eligible region.
    ///
    /// `may_start` gates starting a new ping; a pending ping always runs to
    /// completion.
    pub fn update(&mut self, position: f32, may_start: bool) -> Option<PingEvent> {
        match self.phase {
            Phase::Idle if may_start && self.is_due(position) => match self.mode {
                PingMode::Connected => {
                    self.last_ping = position;
                    Some(PingEvent::Connected { position })
                }
                PingMode::Accessory => {
                    self.phase = Phase::Pending {
                        start: position,
                        previous_ping: self.last_ping,
                    };
                    self.last_ping = position;
                    Some(PingEvent::Begin { start: position })
                }
            },
            Phase::Pending { start, .. } if position - start >= ACCESSORY_PING_EXTRUSION - EPSILON => {
                self.phase = Phase::Idle;
                Some(PingEvent::Complete {
                    start,
                    extrusion: position - start,
                })
            }
            _ => None,
        }
    }

    /// The eligible region ended at `position`.
    ///
    /// A pending accessory ping is dropped and the spacing restarts from the
    /// ping before it; the dropped ping is returned.
    pub fn region_ended(&mut self, position: f32) -> Option<PendingPing> {
        match self.phase {
            Phase::Pending {
                start,
                previous_ping,
            } => {
                self.phase = Phase::Idle;
                self.last_ping = previous_ping;
                Some(PendingPing {
                    start,
                    remaining: ACCESSORY_PING_EXTRUSION - (position - start),
                })
            }
            Phase::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_ping_fires_at_spacing() {
        let mut ping = PingState::new(PingMode::Connected);
        assert_eq!(ping.update(349.0, true), None);
        assert_eq!(
            ping.update(351.0, true),
            Some(PingEvent::Connected { position: 351.0 })
        );
        assert_eq!(ping.update(690.0, true), None);
        assert_eq!(
            ping.update(701.0, true),
            Some(PingEvent::Connected { position: 701.0 })
        );
        assert_eq!(
            PingEvent::Connected { position: 350.0 }.gcode(),
            "O31 D43af0000"
        );
    }

    #[test]
    fn test_accessory_ping_two_phases() {
        let mut ping = PingState::new(PingMode::Accessory);
        let begin = ping.update(360.0, true).unwrap();
        assert_eq!(begin, PingEvent::Begin { start: 360.0 });
        assert_eq!(begin.gcode(), "G4 P13000");
        assert!(ping.is_pending());

        assert_eq!(ping.update(375.0, true), None);
        let complete = ping.update(380.5, true).unwrap();
        assert_eq!(
            complete,
            PingEvent::Complete {
                start: 360.0,
                extrusion: 20.5
            }
        );
        assert_eq!(complete.gcode(), "G4 P7000");
        assert!(!ping.is_pending());
        assert_eq!(ping.region_ended(400.0), None);
    }

    #[test]
    fn test_region_end_cancels_pending_ping() {
        let mut ping = PingState::new(PingMode::Accessory);
        ping.update(400.0, true);
        let pending = ping.region_ended(412.0).unwrap();
        assert_eq!(pending.start, 400.0);
        assert_eq!(pending.remaining, 8.0);
        assert_eq!(ping.last_ping(), 0.0);

        // the spacing restarts from the previous ping, so the next region pings at once
        assert!(matches!(
            ping.update(500.0, true),
            Some(PingEvent::Begin { start }) if start == 500.0
        ));
    }

    #[test]
    fn test_start_gate() {
        let mut ping = PingState::new(PingMode::Accessory);
        assert_eq!(ping.update(400.0, false), None);
        assert!(ping.is_due(400.0));
        ping.update(400.0, true);
        // pending pings complete even when new starts are not allowed
        assert!(ping.update(420.0, false).is_some());
    }
}
