//! # Sample Aggregator
//!
//! Fuses the frames received within one time window into a single
//! [`ControlState`].
//!
//! Each field of the fused state is the integer mean (floor division) of that
//! field over every frame that decoded successfully. Frames that fail to decode
//! are counted and otherwise ignored. A window without frames leaves the
//! previous output untouched.
//!
//! ## Weighting
//!
//! Every frame counts once. Senders are not weighted equally: a sender that
//! sends twice as many frames within a window has twice the influence on the
//! result. Arrival order never affects the mean.

use std::collections::HashSet;
use std::net::SocketAddr;

use tracing::trace;

use crate::wire::decoder::decode_frame;
use crate::wire::protocol::ControlState;

/// Frames collected during one window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationWindow {
    sums: [u64; 3],
    count: u64,
    dropped: u64,
    senders: HashSet<SocketAddr>,
}

impl AggregationWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a decoded state to the window.
    pub fn push(&mut self, state: &ControlState) {
        self.sums[0] += u64::from(state.steer());
        self.sums[1] += u64::from(state.throttle());
        self.sums[2] += u64::from(state.brake());
        self.count += 1;
    }

    /// Decodes a datagram and adds it to the window, or counts it as dropped.
    pub fn push_datagram(&mut self, datagram: &[u8], sender: SocketAddr) {
        self.senders.insert(sender);
        match decode_frame(datagram) {
            Ok(state) => self.push(&state),
            Err(e) => {
                trace!("Dropping datagram from {}: {}", sender, e);
                self.dropped += 1;
            }
        }
    }

    /// Number of frames in the mean.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.count
    }

    /// Number of datagrams that failed to decode.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Number of distinct source addresses seen, including those of dropped
    /// datagrams.
    #[must_use]
    pub fn sender_count(&self) -> usize {
        self.senders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Per-field floor mean of the window, or `None` if it holds no frames.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_joystick::net::aggregator::AggregationWindow;
    /// use shared_joystick::wire::protocol::ControlState;
    ///
    /// let mut window = AggregationWindow::new();
    /// window.push(&ControlState::new(0, 0, 0));
    /// window.push(&ControlState::new(65535, 0, 0));
    ///
    /// assert_eq!(window.reduce().unwrap().steer(), 32767);
    /// ```
    #[must_use]
    pub fn reduce(&self) -> Option<ControlState> {
        if self.count == 0 {
            return None;
        }
        let [steer, throttle, brake] = self.sums.map(|sum| (sum / self.count) as i64);
        Some(ControlState::new(steer, throttle, brake))
    }
}

/// Holds the fused output across windows.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    current: ControlState,
}

impl Aggregator {
    #[must_use]
    pub fn new(initial: ControlState) -> Self {
        Self { current: initial }
    }

    /// Folds a closed window into the output and returns the new output.
    ///
    /// An empty window keeps the previous output.
    pub fn apply(&mut self, window: &AggregationWindow) -> &ControlState {
        if let Some(state) = window.reduce() {
            self.current = state;
        }
        &self.current
    }

    #[must_use]
    pub fn current(&self) -> &ControlState {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_mean_uses_floor_division() {
        let mut window = AggregationWindow::new();
        window.push(&ControlState::new(0, 0, 0));
        window.push(&ControlState::new(65535, 0, 0));

        let reduced = window.reduce().unwrap();
        assert_eq!(reduced.steer(), 32767);
        assert_eq!(reduced.throttle(), 0);
        assert_eq!(reduced.brake(), 0);
    }

    #[test]
    fn test_mean_of_many_frames() {
        let mut window = AggregationWindow::new();
        // Means are 200.67 and 201.67: rounding would give 201 and 202
        for value in [100, 200, 302] {
            window.push(&ControlState::new(value, 65535, value + 1));
        }

        let reduced = window.reduce().unwrap();
        assert_eq!(reduced.steer(), 200);
        assert_eq!(reduced.throttle(), 65535);
        assert_eq!(reduced.brake(), 201);
    }

    #[test]
    fn test_empty_window_keeps_previous_state() {
        let mut aggregator = Aggregator::new(ControlState::default());
        let mut window = AggregationWindow::new();
        window.push(&ControlState::new(0x1234, 0x5678, 0x9abc));
        let previous = *aggregator.apply(&window);

        let empty = AggregationWindow::new();
        assert!(empty.reduce().is_none());
        assert_eq!(*aggregator.apply(&empty), previous);
        assert_eq!(aggregator.current().to_string(), "S1234T5678B9abc");
    }

    #[test]
    fn test_fresh_aggregator_starts_at_default() {
        let mut aggregator = Aggregator::default();
        assert_eq!(*aggregator.apply(&AggregationWindow::new()), ControlState::default());
    }

    #[test]
    fn test_push_datagram_drops_malformed_frames() {
        let mut window = AggregationWindow::new();
        window.push_datagram(b"S0000T0000B0000", addr(1000));
        window.push_datagram(b"S00", addr(1001));
        window.push_datagram(b"Szzzz", addr(1001));
        window.push_datagram(b"Sffff", addr(1000));

        assert_eq!(window.frame_count(), 2);
        assert_eq!(window.dropped_count(), 2);
        assert_eq!(window.sender_count(), 2);
        // Missing fields keep their defaults in the decoded frame
        assert_eq!(window.reduce().unwrap().steer(), 32767);
    }

    #[test]
    fn test_flooding_sender_dominates() {
        let mut window = AggregationWindow::new();
        for _ in 0..3 {
            window.push_datagram(b"S0000T0000B0000", addr(1000));
        }
        window.push_datagram(b"Sfffc", addr(2000));

        assert_eq!(window.sender_count(), 2);
        assert_eq!(window.reduce().unwrap().steer(), 0xffff / 4);
    }

    #[test]
    fn test_order_does_not_matter() {
        let frames = [
            ControlState::new(1, 2, 3),
            ControlState::new(40000, 9, 65535),
            ControlState::new(7, 60000, 0),
        ];

        let mut forward = AggregationWindow::new();
        frames.iter().for_each(|f| forward.push(f));
        let mut backward = AggregationWindow::new();
        frames.iter().rev().for_each(|f| backward.push(f));

        assert_eq!(forward.reduce(), backward.reduce());
    }
}
