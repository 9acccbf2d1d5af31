use crossbeam_queue::ArrayQueue;
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Result of depositing a value.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::{FrameSlot, SendOutcome};
///
/// let slot = FrameSlot::new();
/// assert_eq!(slot.deposit(1u8), SendOutcome::Ok);
/// assert_eq!(slot.deposit(2u8), SendOutcome::Replaced);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Value was stored in an empty slot.
    Ok,
    /// Value was stored and an unconsumed older value was dropped.
    Replaced,
    /// Channel is closed; the value was dropped.
    Closed,
}

/// Result of attempting to receive.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::{newest, RecvOutcome};
///
/// let (_tx, rx) = newest::<u8>();
/// assert!(matches!(rx.recv(), RecvOutcome::Empty));
/// ```
#[derive(Debug)]
pub enum RecvOutcome<T> {
    /// Received value.
    Data(T),
    /// Channel has been closed.
    Closed,
    /// Nothing pending.
    Empty,
}

/// Single-slot handoff where the most recent value wins.
///
/// At most one value is held. A deposit replaces whatever is pending and the
/// replaced value is dropped. A take removes the value so the same frame is
/// never observed twice. Both operations are safe from any thread.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::FrameSlot;
///
/// let slot = FrameSlot::new();
/// slot.deposit("a");
/// slot.deposit("b");
/// assert_eq!(slot.take(), Some("b"));
/// assert_eq!(slot.take(), None);
/// assert_eq!(slot.replaced(), 1);
/// ```
#[derive(Debug)]
pub struct FrameSlot<T> {
    cell: ArrayQueue<T>,
    replaced: AtomicU64,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: ArrayQueue::new(1),
            replaced: AtomicU64::new(0),
        }
    }

    /// Store `value`, dropping any pending value.
    pub fn deposit(&self, value: T) -> SendOutcome {
        match self.cell.force_push(value) {
            None => SendOutcome::Ok,
            Some(old) => {
                drop(old);
                self.replaced.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Replaced
            }
        }
    }

    /// Remove and return the pending value, if any.
    pub fn take(&self) -> Option<T> {
        self.cell.pop()
    }

    /// Drop the pending value, if any.
    pub fn clear(&self) {
        let _ = self.cell.pop();
    }

    /// True when a value is waiting to be taken.
    pub fn is_occupied(&self) -> bool {
        !self.cell.is_empty()
    }

    /// Number of values dropped unconsumed because a newer one arrived.
    pub fn replaced(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct NewestInner<T> {
    slot: FrameSlot<T>,
    closed: AtomicBool,
}

/// Newest-value channel: the receiver only ever sees the latest value.
///
/// Senders never block. Intermediate values are dropped when the receiver
/// falls behind.
///
/// # Example
/// ```rust
/// use edgeview_core::prelude::{newest, RecvOutcome, SendOutcome};
///
/// let (tx, rx) = newest::<u8>();
/// assert_eq!(tx.send(1), SendOutcome::Ok);
/// assert_eq!(tx.send(2), SendOutcome::Replaced);
/// assert!(matches!(rx.recv(), RecvOutcome::Data(2)));
/// assert!(matches!(rx.recv(), RecvOutcome::Empty));
/// ```
pub fn newest<T>() -> (NewestTx<T>, NewestRx<T>) {
    let shared = Arc::new(NewestInner {
        slot: FrameSlot::new(),
        closed: AtomicBool::new(false),
    });
    (
        NewestTx {
            inner: shared.clone(),
        },
        NewestRx { inner: shared },
    )
}

/// Sender for the newest-value channel.
pub struct NewestTx<T> {
    inner: Arc<NewestInner<T>>,
}

impl<T> Clone for NewestTx<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> NewestTx<T> {
    /// Overwrite with the latest value.
    pub fn send(&self, value: T) -> SendOutcome {
        if self.is_closed() {
            return SendOutcome::Closed;
        }
        self.inner.slot.deposit(value)
    }

    /// Close the channel and drop any pending value.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.slot.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Receiver for the newest-value channel.
pub struct NewestRx<T> {
    inner: Arc<NewestInner<T>>,
}

impl<T> Clone for NewestRx<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> NewestRx<T> {
    /// Take the latest value if present.
    pub fn recv(&self) -> RecvOutcome<T> {
        if self.inner.closed.load(Ordering::Acquire) {
            return RecvOutcome::Closed;
        }
        match self.inner.slot.take() {
            Some(value) => RecvOutcome::Data(value),
            None => RecvOutcome::Empty,
        }
    }

    /// Close the channel; senders will see `Closed`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.slot.clear();
    }

    /// Values dropped unconsumed on this channel.
    pub fn replaced(&self) -> u64 {
        self.inner.slot.replaced()
    }
}
