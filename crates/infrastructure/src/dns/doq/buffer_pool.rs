use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::MAX_MESSAGE_SIZE;

const DEFAULT_MAX_IDLE: usize = 256;

/// Pool of fixed-size read buffers for DNS messages.
///
/// Acquisition never blocks: a miss allocates a new buffer. Buffers go back
/// to the pool when the [`PooledBuffer`] guard is dropped; at most
/// `max_idle` are kept, the rest are freed.
pub struct BytesPool {
    free: Mutex<Vec<Box<[u8]>>>,
    buffer_size: usize,
    max_idle: usize,
    allocated: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
    outstanding: AtomicUsize,
}

impl BytesPool {
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            buffer_size,
            max_idle,
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            released: AtomicU64::new(0),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Pool of [`MAX_MESSAGE_SIZE`] buffers.
    pub fn for_dns_messages() -> Self {
        Self::new(MAX_MESSAGE_SIZE, DEFAULT_MAX_IDLE)
    }

    pub fn acquire(&self) -> PooledBuffer<'_> {
        let pooled = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let buf = match pooled {
            Some(buf) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                vec![0u8; self.buffer_size].into_boxed_slice()
            }
        };
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        PooledBuffer {
            buf: Some(buf),
            pool: self,
        }
    }

    fn release(&self, buf: Box<[u8]>) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.released.fetch_add(1, Ordering::Relaxed);

        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(buf);
        } else {
            debug!(max_idle = self.max_idle, "Buffer pool full, dropping buffer");
        }
    }

    pub fn stats(&self) -> BytesPoolStats {
        BytesPoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            outstanding: self.outstanding.load(Ordering::Acquire),
            pooled: self.free.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}

impl Default for BytesPool {
    fn default() -> Self {
        Self::for_dns_messages()
    }
}

/// Buffer on loan from a [`BytesPool`]; returned on drop.
pub struct PooledBuffer<'a> {
    buf: Option<Box<[u8]>>,
    pool: &'a BytesPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesPoolStats {
    /// Buffers created because the pool was empty
    pub allocated: u64,
    /// Acquisitions served from the pool
    pub reused: u64,
    /// Buffers handed back
    pub released: u64,
    /// Buffers currently on loan
    pub outstanding: usize,
    /// Idle buffers waiting in the pool
    pub pooled: usize,
}

impl BytesPoolStats {
    pub fn acquired(&self) -> u64 {
        self.allocated + self.reused
    }
}
