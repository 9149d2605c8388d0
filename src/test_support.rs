//! Test support utilities - only compiled in test builds.

use core::cell::RefCell;
use std::{boxed::Box, vec::Vec};

use critical_section::Mutex;

use crate::{
    handle_event, Bridge, Diagnostic, DiagnosticSink, Direction, Event, FrameFlag, I2CSlave,
    SlaveHardware,
};

pub const TEST_ADDRESS: u8 = 0x61;

/// Operations issued to the hardware, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwOp {
    Configure,
    Listen,
    Receive(FrameFlag),
    Transmit(Vec<u8>, FrameFlag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpFailed;

/// Hardware that records what it was asked to do.
pub struct MockHardware {
    pub address: u8,
    pub fail_configure: bool,
    pub ops: Vec<HwOp>,
}

impl MockHardware {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            fail_configure: false,
            ops: Vec::new(),
        }
    }
}

impl SlaveHardware for MockHardware {
    type Error = BringUpFailed;

    fn configure(&mut self) -> Result<u8, BringUpFailed> {
        self.ops.push(HwOp::Configure);
        if self.fail_configure {
            Err(BringUpFailed)
        } else {
            Ok(self.address)
        }
    }

    fn enable_listen(&mut self) {
        self.ops.push(HwOp::Listen);
    }

    fn arm_receive(&mut self, flag: FrameFlag) {
        self.ops.push(HwOp::Receive(flag));
    }

    fn arm_transmit(&mut self, frame: &[u8], flag: FrameFlag) {
        self.ops.push(HwOp::Transmit(frame.to_vec(), flag));
    }
}

/// Sink that keeps every diagnostic.
pub struct RecordingSink {
    log: Mutex<RefCell<Vec<Diagnostic>>>,
}

impl RecordingSink {
    pub const fn new() -> Self {
        Self {
            log: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        critical_section::with(|cs| self.log.borrow_ref_mut(cs).drain(..).collect())
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        critical_section::with(|cs| self.log.borrow_ref_mut(cs).push(diagnostic));
    }
}

pub type TestBridge<const N: usize> = Bridge<MockHardware, RecordingSink, N>;
pub type TestSlave<const N: usize> = I2CSlave<'static, TestBridge<N>>;

/// Leaks a bridge so callbacks can hold on to it, like a `static` would.
pub fn leak_bridge<const N: usize>(address: u8) -> &'static TestBridge<N> {
    Box::leak(Box::new(Bridge::new(
        MockHardware::new(address),
        RecordingSink::new(),
    )))
}

/// A bridge after a successful `begin`, with the bring-up ops cleared.
pub fn started<const N: usize>() -> (&'static TestBridge<N>, TestSlave<N>) {
    let bridge = leak_bridge::<N>(TEST_ADDRESS);
    let slave = I2CSlave::new(bridge);
    slave.begin().unwrap();
    take_ops(bridge);
    (bridge, slave)
}

pub fn take_ops<const N: usize>(bridge: &TestBridge<N>) -> Vec<HwOp> {
    bridge.with_hardware(|hw| core::mem::take(&mut hw.ops))
}

/// Address match for a write, one event per byte, then the bus release.
pub fn master_writes<const N: usize>(bridge: &TestBridge<N>, bytes: &[u8]) {
    handle_event(bridge, Event::AddressMatch(Direction::MasterWrites));
    for &b in bytes {
        handle_event(bridge, Event::ByteReceived(b));
    }
    handle_event(bridge, Event::ListenComplete);
}

/// A full read by the master. Returns the frame handed to the hardware.
pub fn master_reads<const N: usize>(bridge: &TestBridge<N>) -> Vec<u8> {
    handle_event(bridge, Event::AddressMatch(Direction::MasterReads));
    let frame = last_transmit(bridge).expect("no frame was armed");
    handle_event(bridge, Event::TransmitComplete);
    handle_event(bridge, Event::Error(crate::BusError::AcknowledgeFailure));
    handle_event(bridge, Event::ListenComplete);
    frame
}

pub fn last_transmit<const N: usize>(bridge: &TestBridge<N>) -> Option<Vec<u8>> {
    bridge.with_hardware(|hw| {
        hw.ops.iter().rev().find_map(|op| match op {
            HwOp::Transmit(frame, _) => Some(frame.clone()),
            _ => None,
        })
    })
}

/// Leaks `f` into a receive callback.
pub fn on_receive(f: impl Fn(usize) + Sync + 'static) -> crate::ReceiveCallback {
    Box::leak(Box::new(f))
}

/// Leaks `f` into a request callback.
pub fn on_request(f: impl Fn() + Sync + 'static) -> crate::RequestCallback {
    Box::leak(Box::new(f))
}
