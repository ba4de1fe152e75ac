//! Interface to the interconnect above the controller.

use crate::common::Response;

/// Receiver of controller responses and flow-control signals.
///
/// Implemented by the interconnect (or a test harness). The hub never holds a
/// reference to its upstream; one is passed into each call that may respond.
pub trait Upstream {
    /// Delivers a response.
    ///
    /// # Returns
    ///
    /// `false` if the interconnect is busy; the hub retries on the next host cycle.
    fn emit_response(&mut self, response: &Response) -> bool;

    /// Reports that the request pool became full (`true`) or has room again (`false`).
    fn set_controller_full(&mut self, full: bool);
}
