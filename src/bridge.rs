use core::cell::{Cell, RefCell};

use critical_section::{CriticalSection, Mutex};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use heapless::Deque;

use super::{
    accumulator::RxAccumulator,
    diagnostics::{Diagnostic, DiagnosticSink},
    frame_buffer::FrameBuffer,
    hardware::SlaveHardware,
    interrupts::InterruptBridge,
    slave::I2cBridge,
    state_holder::{push_evicting, StateHolder},
    Error, Event, FrameFlag, Mode,
};

pub const STATES_HISTORY_SIZE: usize = 5;
pub const EVENTS_HISTORY_SIZE: usize = 5;

/// Own address that marks the peripheral as a bus master. `begin` does not
/// start listening when the hardware reports it.
pub const MASTER_ADDRESS: u8 = 0x01;

/// Called with the byte count of every published receive transaction.
pub type ReceiveCallback = &'static (dyn Fn(usize) + Sync);

/// Called when the master starts a read. Stage the reply with `write`.
pub type RequestCallback = &'static (dyn Fn() + Sync);

pub type ReceivedSignal = Signal<CriticalSectionRawMutex, usize>;

#[cfg(feature = "dump")]
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateDump {
    pub mode_history: [Mode; STATES_HISTORY_SIZE],
    pub current_mode: Mode,
    pub event_history: [Event; EVENTS_HISTORY_SIZE],
}

/// All driver state for one peripheral. Meant to live in a `static`.
///
/// `FRAMESIZE` bounds a single transaction in either direction.
pub struct Bridge<H: SlaveHardware, S: DiagnosticSink, const FRAMESIZE: usize> {
    hardware: Mutex<RefCell<H>>,
    sink: S,

    frame: Mutex<RefCell<FrameBuffer<FRAMESIZE>>>,
    accumulator: Mutex<RefCell<RxAccumulator>>,

    on_receive: Mutex<Cell<Option<ReceiveCallback>>>,
    on_request: Mutex<Cell<Option<RequestCallback>>>,
    received: ReceivedSignal,

    own_address: Mutex<Cell<Option<u8>>>,

    state_holder: StateHolder<STATES_HISTORY_SIZE>,
    events_history: Mutex<RefCell<Deque<Event, EVENTS_HISTORY_SIZE>>>,
}

#[cfg(feature = "dump")]
fn deque_into_array<T: Copy, const N: usize>(d: &Deque<T, N>, arr: &mut [T; N]) {
    let n = d.len();
    let (a, b) = d.as_slices();
    let s = N - n;

    arr[s..s + a.len()].copy_from_slice(a);
    arr[s + a.len()..].copy_from_slice(b);
}

impl<H: SlaveHardware, S: DiagnosticSink, const FRAMESIZE: usize> Bridge<H, S, FRAMESIZE> {
    pub const fn new(hardware: H, sink: S) -> Self {
        Self {
            hardware: Mutex::new(RefCell::new(hardware)),
            sink,
            frame: Mutex::new(RefCell::new(FrameBuffer::new())),
            accumulator: Mutex::new(RefCell::new(RxAccumulator::new())),
            on_receive: Mutex::new(Cell::new(None)),
            on_request: Mutex::new(Cell::new(None)),
            received: Signal::new(),
            own_address: Mutex::new(Cell::new(None)),
            state_holder: StateHolder::new(),
            events_history: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Runs `f` with exclusive access to the hardware handle.
    ///
    /// Interrupt handlers use this to reach backend state. Do not call
    /// [`handle_event`](crate::handle_event) from inside `f`.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        critical_section::with(|cs| f(&mut self.hardware.borrow_ref_mut(cs)))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[cfg(feature = "dump")]
    pub fn dump_state(&self) -> StateDump {
        let mut modes = [Mode::Listening; STATES_HISTORY_SIZE];
        let mut events = [Event::ListenComplete; EVENTS_HISTORY_SIZE];

        critical_section::with(|cs| {
            let modes_deque = self.state_holder.get_history(cs);
            deque_into_array(&modes_deque, &mut modes);

            let events_deque = self.events_history.borrow_ref(cs);
            deque_into_array(&events_deque, &mut events);
        });

        StateDump {
            mode_history: modes,
            current_mode: self.get_mode(),
            event_history: events,
        }
    }
}

impl<H: SlaveHardware, S: DiagnosticSink, const FRAMESIZE: usize> I2cBridge
    for Bridge<H, S, FRAMESIZE>
{
    type Error = H::Error;

    fn begin(&self) -> Result<(), H::Error> {
        // No event may run between the reset and the hardware listening again.
        critical_section::with(|cs| {
            self.accumulator.borrow_ref_mut(cs).release();

            let mut frame = self.frame.borrow_ref_mut(cs);
            frame.reset();
            frame.clear_received();
            drop(frame);

            self.own_address.borrow(cs).set(None);
            self.events_history.borrow_ref_mut(cs).clear();
            self.received.reset();
            self.state_holder.clear_history();
            self.state_holder.set_mode(Mode::Listening);

            let mut hw = self.hardware.borrow_ref_mut(cs);
            let address = hw.configure()?;
            debug!("[I2C]: own address {:#x}", address);

            self.own_address.borrow(cs).set(Some(address));

            if address != MASTER_ADDRESS {
                hw.enable_listen();
            }

            Ok(())
        })
    }

    fn available(&self, cs: CriticalSection) -> usize {
        self.accumulator.borrow_ref(cs).available()
    }

    fn read(&self, cs: CriticalSection) -> Option<u8> {
        self.accumulator.borrow_ref_mut(cs).read()
    }

    fn read_into(&self, cs: CriticalSection, buf: &mut [u8]) -> usize {
        self.accumulator.borrow_ref_mut(cs).read_into(buf)
    }

    fn write(&self, cs: CriticalSection, buf: &[u8]) -> Result<(), Error> {
        let res = self.frame.borrow_ref_mut(cs).append(buf);

        res.map_err(|_| {
            self.report(Diagnostic::CapacityExceeded {
                capacity: FRAMESIZE,
            });
            Error::CapacityExceeded
        })
    }

    fn set_on_receive(&self, cs: CriticalSection, callback: Option<ReceiveCallback>) {
        self.on_receive.borrow(cs).set(callback);
    }

    fn set_on_request(&self, cs: CriticalSection, callback: Option<RequestCallback>) {
        self.on_request.borrow(cs).set(callback);
    }

    fn own_address(&self, cs: CriticalSection) -> Option<u8> {
        self.own_address.borrow(cs).get()
    }

    fn received_signal(&self) -> &ReceivedSignal {
        &self.received
    }
}

impl<H: SlaveHardware, S: DiagnosticSink, const FRAMESIZE: usize> InterruptBridge
    for Bridge<H, S, FRAMESIZE>
{
    fn get_mode(&self) -> Mode {
        self.state_holder.get_mode()
    }

    fn set_mode(&self, mode: Mode) {
        self.state_holder.set_mode(mode)
    }

    fn record(&self, event: Event) {
        critical_section::with(|cs| {
            push_evicting(&mut self.events_history.borrow_ref_mut(cs), event)
        });
    }

    fn report(&self, diagnostic: Diagnostic) {
        self.sink.emit(diagnostic)
    }

    fn is_slave(&self) -> bool {
        critical_section::with(|cs| {
            matches!(self.own_address.borrow(cs).get(), Some(a) if a != MASTER_ADDRESS)
        })
    }

    fn enable_listen(&self) {
        self.with_hardware(|hw| hw.enable_listen())
    }

    fn arm_receive(&self, flag: FrameFlag) {
        self.with_hardware(|hw| hw.arm_receive(flag))
    }

    fn arm_transmit(&self, flag: FrameFlag) {
        critical_section::with(|cs| {
            let frame = self.frame.borrow_ref(cs);
            self.hardware
                .borrow_ref_mut(cs)
                .arm_transmit(frame.staged(), flag);
        })
    }

    fn frame_capacity(&self) -> usize {
        FRAMESIZE
    }

    fn push_received(&self, cs: CriticalSection, byte: u8) -> Result<(), ()> {
        self.frame.borrow_ref_mut(cs).push_received(byte)
    }

    fn pending_len(&self, cs: CriticalSection) -> usize {
        self.frame.borrow_ref(cs).received().len()
    }

    fn clear_received(&self, cs: CriticalSection) {
        self.frame.borrow_ref_mut(cs).clear_received()
    }

    fn reset_txbuf(&self, cs: CriticalSection) {
        self.frame.borrow_ref_mut(cs).reset()
    }

    fn publish_received(&self, cs: CriticalSection) -> Result<usize, Diagnostic> {
        let frame = self.frame.borrow_ref(cs);
        let data = frame.received();
        let mut acc = self.accumulator.borrow_ref_mut(cs);

        if !acc.is_drained() {
            return Err(Diagnostic::ReceiveDropped { len: data.len() });
        }

        acc.fill(data).map_err(|_| Diagnostic::OutOfMemory {
            requested: data.len(),
        })?;

        Ok(data.len())
    }

    fn notify_received(&self, len: usize) {
        self.received.signal(len);

        let callback = critical_section::with(|cs| self.on_receive.borrow(cs).get());
        if let Some(callback) = callback {
            callback(len);
        }
    }

    fn request_frame(&self) {
        let callback = critical_section::with(|cs| self.on_request.borrow(cs).get());
        if let Some(callback) = callback {
            callback();
        }
    }
}
