#![deny(unsafe_code)]
//! Event flag group
//!
//! A set of bits raised by the event task and awaited by application
//! tasks. Waiting for any bit of a mask consumes the bits that satisfied
//! it, so a stale event cannot satisfy a later wait.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use embassy_time::{with_timeout, Duration};

/// Concurrent waiters tracked before older wakers are flushed
const MAX_WAITERS: usize = 4;

struct State {
    bits: u32,
    waiters: MultiWakerRegistration<MAX_WAITERS>,
}

pub(crate) struct EventGroup<M: RawMutex> {
    state: Mutex<M, RefCell<State>>,
}

impl<M: RawMutex> EventGroup<M> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(State {
                bits: 0,
                waiters: MultiWakerRegistration::new(),
            })),
        }
    }

    /// Raise `bits` and wake every waiter
    pub(crate) fn set(&self, bits: u32) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.bits |= bits;
            state.waiters.wake();
        });
    }

    pub(crate) fn clear(&self, bits: u32) {
        self.state.lock(|state| state.borrow_mut().bits &= !bits);
    }

    #[cfg(test)]
    pub(crate) fn bits(&self) -> u32 {
        self.state.lock(|state| state.borrow().bits)
    }

    /// Wait until any bit of `mask` is raised
    ///
    /// Returns the raised bits of `mask` and clears them, or 0 when
    /// `timeout` expires first.
    pub(crate) async fn wait_any(&self, mask: u32, timeout: Duration) -> u32 {
        let wait = poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                let raised = state.bits & mask;
                if raised != 0 {
                    state.bits &= !mask;
                    Poll::Ready(raised)
                } else {
                    state.waiters.register(cx.waker());
                    Poll::Pending
                }
            })
        });
        with_timeout(timeout, wait).await.unwrap_or(0)
    }
}
