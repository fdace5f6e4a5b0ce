//! A flat `f32` buffer shared across worker threads without locking.
//!
//! This is the Hogwild! building block: multiple threads hold `&Model`
//! and write disjoint (occasionally overlapping) slices concurrently.
//! Rust's aliasing rules forbid ordinary `&mut` access from more than
//! one thread, so mutation goes through raw pointers derived from an
//! `UnsafeCell`. The data race this permits is intentional and
//! specified behavior (see spec.md §4.6/§9 "Lock-free mutation") —
//! concurrent partial overwrites of the same column are treated as
//! stochastic noise, never as a correctness bug. Only the atomic step
//! counters next to each buffer are genuinely synchronized.
//!
//! Safety contract: the buffer's length never changes after
//! construction (spec invariant: "shapes ... never change after
//! init/load"), and every accessor here assumes indices are in range
//! for that fixed length.

use std::cell::UnsafeCell;

pub(crate) struct SharedBuffer {
    data: UnsafeCell<Vec<f32>>,
}

// SAFETY: concurrent unsynchronized access to `data` is the documented
// Hogwild! contract above; no two threads ever resize the buffer.
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    pub fn zeros(len: usize) -> Self {
        Self {
            data: UnsafeCell::new(vec![0.0; len]),
        }
    }

    pub fn from_vec(v: Vec<f32>) -> Self {
        Self {
            data: UnsafeCell::new(v),
        }
    }

    pub fn len(&self) -> usize {
        // SAFETY: length is fixed after construction.
        unsafe { (*self.data.get()).len() }
    }

    /// Borrow the whole buffer as a slice. Only valid to call when no
    /// other thread is concurrently writing (e.g. at init/save time,
    /// outside the worker pool).
    pub fn as_slice_exclusive(&self) -> &[f32] {
        unsafe { &*self.data.get() }
    }

    pub fn as_mut_slice_exclusive(&mut self) -> &mut [f32] {
        self.data.get_mut().as_mut_slice()
    }

    /// A read view into `[start, start+len)`. Valid to alias with
    /// concurrent writers per the Hogwild contract.
    #[inline]
    pub fn slice(&self, start: usize, len: usize) -> &[f32] {
        unsafe {
            let ptr = (*self.data.get()).as_ptr().add(start);
            std::slice::from_raw_parts(ptr, len)
        }
    }

    /// A write view into `[start, start+len)`. Callers from different
    /// threads may request overlapping ranges; see module docs.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub fn slice_mut(&self, start: usize, len: usize) -> &mut [f32] {
        unsafe {
            let ptr = (*self.data.get()).as_mut_ptr().add(start);
            std::slice::from_raw_parts_mut(ptr, len)
        }
    }
}
