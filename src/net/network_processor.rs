//! Task to process network hardware.
//!
//! # Design
//! The network processor owns the network stack and regularly services it so that incoming
//! datagrams are moved into their sockets and queued datagrams are transmitted. It lends the
//! stack to the other network users.
use super::UpdateState;
use crate::hardware::NetworkStack;

/// Processor for managing network hardware.
pub struct NetworkProcessor<N> {
    stack: N,
    faulted: bool,
}

impl<N: NetworkStack> NetworkProcessor<N> {
    /// Construct a new network processor.
    ///
    /// # Args
    /// * `stack` - The network stack.
    pub fn new(stack: N) -> Self {
        Self {
            stack,
            faulted: false,
        }
    }

    /// Borrow the network stack.
    pub fn stack(&mut self) -> &mut N {
        &mut self.stack
    }

    /// Process and update the state of the network.
    ///
    /// # Note
    /// This function should be called regularly before other network tasks to update the state of
    /// all relevant network sockets.
    ///
    /// # Returns
    /// An update state corresponding with any changes in the underlying network.
    pub fn update(&mut self) -> UpdateState {
        match self.stack.poll() {
            Ok(updated) => {
                self.faulted = false;
                if updated {
                    UpdateState::Updated
                } else {
                    UpdateState::NoChange
                }
            }
            Err(err) => {
                // Only report the first of a run of failures.
                if !self.faulted {
                    log::warn!("Network poll failed: {:?}", err);
                    self.faulted = true;
                }
                UpdateState::Updated
            }
        }
    }
}
