use core::cell::RefCell;

use atomic::{Atomic, Ordering};
use critical_section::Mutex;
use heapless::Deque;

use crate::Mode;

/// Current mode plus the last `HISTORY_SIZE` modes entered.
pub struct StateHolder<const HISTORY_SIZE: usize> {
    history: Mutex<RefCell<Deque<Mode, HISTORY_SIZE>>>,
    mode: Atomic<Mode>,
}

impl<const HISTORY_SIZE: usize> StateHolder<HISTORY_SIZE> {
    pub const fn new() -> Self {
        Self {
            history: Mutex::new(RefCell::new(Deque::new())),
            mode: Atomic::new(Mode::Listening),
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        self.add_mode_in_history(mode);
        self.mode.store(mode, Ordering::SeqCst);
    }

    pub fn get_mode(&self) -> Mode {
        self.mode.load(Ordering::SeqCst)
    }

    #[cfg(any(test, feature = "dump"))]
    pub fn get_history<'cs>(
        &'cs self,
        cs: critical_section::CriticalSection<'cs>,
    ) -> core::cell::Ref<'cs, Deque<Mode, HISTORY_SIZE>> {
        self.history.borrow_ref(cs)
    }

    pub fn clear_history(&self) {
        critical_section::with(|cs| self.history.borrow_ref_mut(cs).clear());
    }

    fn add_mode_in_history(&self, mode: Mode) {
        critical_section::with(|cs| {
            push_evicting(&mut self.history.borrow_ref_mut(cs), mode)
        });
    }
}

/// Appends `item`, dropping the oldest entry when `history` is full.
pub fn push_evicting<T, const N: usize>(history: &mut Deque<T, N>, item: T) {
    if history.is_full() {
        history.pop_front();
    }
    let _ = history.push_back(item);
}

#[cfg(test)]
mod tests {
    use heapless::Deque;

    use super::{push_evicting, StateHolder};
    use crate::Mode;

    #[test]
    fn starts_listening() {
        let holder = StateHolder::<3>::new();
        assert_eq!(holder.get_mode(), Mode::Listening);
    }

    #[test]
    fn history_keeps_most_recent_modes() {
        let holder = StateHolder::<2>::new();

        holder.set_mode(Mode::Receiving);
        holder.set_mode(Mode::Listening);
        holder.set_mode(Mode::Transmitting);

        assert_eq!(holder.get_mode(), Mode::Transmitting);
        critical_section::with(|cs| {
            let h = holder.get_history(cs);
            let modes: std::vec::Vec<Mode> = h.iter().copied().collect();
            assert_eq!(modes, [Mode::Listening, Mode::Transmitting]);
        });
    }

    #[test]
    fn clear_history_keeps_current_mode() {
        let holder = StateHolder::<4>::new();
        holder.set_mode(Mode::Receiving);

        holder.clear_history();

        assert_eq!(holder.get_mode(), Mode::Receiving);
        critical_section::with(|cs| assert!(holder.get_history(cs).is_empty()));
    }

    #[test]
    fn push_evicting_drops_oldest() {
        let mut d = Deque::<u8, 2>::new();

        push_evicting(&mut d, 1);
        push_evicting(&mut d, 2);
        push_evicting(&mut d, 3);

        assert_eq!(d.iter().copied().collect::<std::vec::Vec<_>>(), [2, 3]);
    }
}
