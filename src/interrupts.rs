use critical_section::CriticalSection;

use crate::{Diagnostic, Direction, Event, FrameFlag, Mode};

/// Primitives the state machine needs from the driver state.
pub trait InterruptBridge {
    fn get_mode(&self) -> Mode;

    fn set_mode(&self, mode: Mode);

    fn record(&self, event: Event);

    fn report(&self, diagnostic: Diagnostic);

    /// `false` until `begin` has configured a slave address.
    fn is_slave(&self) -> bool;

    fn enable_listen(&self);

    fn arm_receive(&self, flag: FrameFlag);

    fn arm_transmit(&self, flag: FrameFlag);

    fn frame_capacity(&self) -> usize;

    fn push_received(&self, cs: CriticalSection, byte: u8) -> Result<(), ()>;

    fn pending_len(&self, cs: CriticalSection) -> usize;

    fn clear_received(&self, cs: CriticalSection);

    fn reset_txbuf(&self, cs: CriticalSection);

    /// Moves the collected bytes into the accumulator, returning their count.
    fn publish_received(&self, cs: CriticalSection) -> Result<usize, Diagnostic>;

    /// Runs the receive callback. Called outside of any critical section.
    fn notify_received(&self, len: usize);

    /// Runs the request callback. Called outside of any critical section.
    fn request_frame(&self);
}

/// Advances the slave state machine by one hardware event.
///
/// Must be called from the peripheral's interrupt handlers, one event at a
/// time.
pub fn handle_event<B: InterruptBridge>(bridge: &B, event: Event) {
    bridge.record(event);

    match (bridge.get_mode(), event) {
        (Mode::Receiving, Event::AddressMatch(direction)) => {
            // A new address match means the bus was released in between.
            finish_receive(bridge);
            start_transfer(bridge, direction);
        }
        (Mode::Listening | Mode::Transmitting, Event::AddressMatch(direction)) => {
            start_transfer(bridge, direction);
        }
        (Mode::Receiving, Event::ByteReceived(byte)) => {
            let res = critical_section::with(|cs| bridge.push_received(cs, byte));

            if res.is_err() {
                bridge.report(Diagnostic::ReceiveOverflow {
                    capacity: bridge.frame_capacity(),
                });
            }

            bridge.arm_receive(FrameFlag::Next);
        }
        (mode @ (Mode::Listening | Mode::Transmitting), Event::ByteReceived(byte)) => {
            trace!("Ignoring byte {:#x} in mode {:?}", byte, mode);
        }
        (mode, Event::ListenComplete) => {
            if matches!(mode, Mode::Receiving) {
                finish_receive(bridge);
            }

            bridge.set_mode(Mode::Listening);
            critical_section::with(|cs| bridge.clear_received(cs));
            bridge.enable_listen();
        }
        (_, Event::TransmitComplete) => {
            critical_section::with(|cs| bridge.reset_txbuf(cs));
        }
        (_, Event::Error(code)) => {
            if !code.is_benign() {
                bridge.report(Diagnostic::Bus(code));
            }

            if bridge.is_slave() {
                bridge.enable_listen();
            }
        }
    }
}

fn start_transfer<B: InterruptBridge>(bridge: &B, direction: Direction) {
    match direction {
        Direction::MasterReads => {
            bridge.set_mode(Mode::Transmitting);
            critical_section::with(|cs| bridge.reset_txbuf(cs));

            bridge.request_frame();
            bridge.arm_transmit(FrameFlag::Last);
        }
        Direction::MasterWrites => {
            bridge.set_mode(Mode::Receiving);
            critical_section::with(|cs| bridge.clear_received(cs));

            bridge.arm_receive(FrameFlag::Next);
        }
    }
}

/// Publishes the pending receive, if any. The pending count is cleared in the
/// same critical section, so one transaction is delivered at most once.
fn finish_receive<B: InterruptBridge>(bridge: &B) {
    let published = critical_section::with(|cs| {
        if bridge.pending_len(cs) == 0 {
            return None;
        }

        let res = bridge.publish_received(cs);
        bridge.clear_received(cs);
        Some(res)
    });

    match published {
        None => {}
        Some(Ok(len)) => bridge.notify_received(len),
        Some(Err(diagnostic)) => bridge.report(diagnostic),
    }
}
