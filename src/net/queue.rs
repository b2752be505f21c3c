/*!
 * Generic FIFO Queue
 * Singly-linked queue of owned entries with O(1) enqueue and dequeue
 *
 * Socket objects embed these for receive buffers and accept backlogs.
 * The queue assumes exclusive access for the duration of a call; the
 * embedding object supplies the lock.
 */

use crate::core::errors::{QueueError, QueueResult};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use tracing::trace;

/// One queued payload and its link to the next entry
struct QueueEntry<T> {
    data: T,
    size: usize,
    next: Option<NonNull<QueueEntry<T>>>,
}

/// FIFO of owned payloads
///
/// Invariants:
/// - `num == 0` iff `head` and `tail` are both `None`
/// - following `next` from `head` exactly `num - 1` times reaches `tail`
/// - `tail.next` is always `None`
///
/// The queue owns every payload it holds. `dequeue` moves the payload out,
/// so ownership passes to the caller; dropping the queue drops whatever
/// is still queued.
pub struct QueueHead<T> {
    head: Option<NonNull<QueueEntry<T>>>,
    tail: Option<NonNull<QueueEntry<T>>>,
    num: usize,
    bytes: usize,
    limit: Option<usize>,
    _owns: PhantomData<Box<QueueEntry<T>>>,
}

// SAFETY: entries are uniquely owned by the queue and only reachable
// through it, so the queue is exactly as thread-safe as its payloads.
unsafe impl<T: Send> Send for QueueHead<T> {}
unsafe impl<T: Sync> Sync for QueueHead<T> {}

impl<T> QueueHead<T> {
    /// Create an empty, unbounded queue
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            num: 0,
            bytes: 0,
            limit: None,
            _owns: PhantomData,
        }
    }

    /// Create an empty queue whose entry allocation fails past `limit` entries
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            head: None,
            tail: None,
            num: 0,
            bytes: 0,
            limit: Some(limit),
            _owns: PhantomData,
        }
    }

    /// Append `data` at the tail
    ///
    /// On `AllocationFailure` the queue is untouched and `data` is dropped.
    pub fn enqueue(&mut self, data: T, size: usize) -> QueueResult<()> {
        if let Some(limit) = self.limit {
            if self.num >= limit {
                trace!(limit, "queue entry allocation refused");
                return Err(QueueError::AllocationFailure { limit });
            }
        }

        let entry = Box::new(QueueEntry {
            data,
            size,
            next: None,
        });
        let entry = NonNull::from(Box::leak(entry));

        match self.tail {
            // SAFETY: tail points at a live entry owned by this queue and no
            // other reference to it exists while we hold &mut self.
            Some(mut tail) => unsafe { tail.as_mut().next = Some(entry) },
            None => self.head = Some(entry),
        }
        self.tail = Some(entry);
        self.num += 1;
        self.bytes += size;
        Ok(())
    }

    /// Remove the head entry, handing its payload and size to the caller
    pub fn dequeue(&mut self) -> QueueResult<(T, usize)> {
        let head = self.head.ok_or(QueueError::Empty)?;

        // SAFETY: head was produced by Box::leak in enqueue and is unlinked
        // below before anything else can observe it, so rebuilding the Box
        // takes back sole ownership exactly once.
        let entry = unsafe { Box::from_raw(head.as_ptr()) };

        self.head = entry.next;
        if self.head.is_none() {
            self.tail = None;
        }
        self.num -= 1;
        self.bytes -= entry.size;

        let QueueEntry { data, size, .. } = *entry;
        Ok((data, size))
    }

    /// Number of queued entries
    #[inline]
    pub fn len(&self) -> usize {
        self.num
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num == 0
    }

    /// Sum of the sizes recorded for queued entries
    #[inline]
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// True when the next `enqueue` would fail with `AllocationFailure`
    #[inline]
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.num >= limit)
    }

    /// Walk the chain and check the structural invariants
    #[cfg(test)]
    fn assert_invariants(&self) {
        assert_eq!(self.num == 0, self.head.is_none());
        assert_eq!(self.num == 0, self.tail.is_none());

        let mut hops = 0;
        let mut cursor = self.head;
        let mut last = None;
        while let Some(node) = cursor {
            last = Some(node);
            // SAFETY: test-only walk over entries owned by this queue
            cursor = unsafe { node.as_ref().next };
            hops += 1;
        }
        assert_eq!(hops, self.num);
        assert_eq!(last, self.tail);
    }
}

impl<T> Default for QueueHead<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for QueueHead<T> {
    fn drop(&mut self) {
        // Iterative so long queues cannot overflow the stack
        while self.dequeue().is_ok() {}
    }
}

impl<T> fmt::Debug for QueueHead<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHead")
            .field("len", &self.num)
            .field("bytes", &self.bytes)
            .field("limit", &self.limit)
            .finish()
    }
}
