//! Sources of heap memory.
//!
//! A provider hands out one contiguous, ever-growing address range. Each
//! successful [`HeapProvider::grow`] returns the start of a region that
//! begins exactly where the previous one ended; a failed call leaves the
//! range unchanged.

use core::ptr::NonNull;

use crate::ALIGNMENT;
use crate::error::{HeapError, Result};

pub trait HeapProvider {
  /// Extends the heap by `bytes` and returns the start of the new region.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>>;
}

impl<P: HeapProvider + ?Sized> HeapProvider for &mut P {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    (**self).grow(bytes)
  }
}

/// Grows the program break with `sbrk(2)`.
///
/// Anything else in the process that moves the break (some system `malloc`
/// implementations do) breaks contiguity; that is reported as
/// [`HeapError::Discontiguous`] instead of being papered over.
#[cfg(unix)]
pub struct Sbrk {
  brk: Option<NonNull<u8>>,
}

#[cfg(unix)]
impl Sbrk {
  pub const fn new() -> Self {
    Self { brk: None }
  }

  /// Current program break.
  pub fn program_break() -> *mut u8 {
    unsafe { libc::sbrk(0) }.cast()
  }

  fn sbrk(bytes: usize) -> Result<*mut u8> {
    let failed = Err(HeapError::OutOfMemory { requested: bytes });
    let Ok(increment) = libc::intptr_t::try_from(bytes) else {
      return failed;
    };

    let address = unsafe { libc::sbrk(increment) };
    if address == usize::MAX as *mut libc::c_void {
      return failed;
    }
    Ok(address.cast())
  }
}

#[cfg(unix)]
impl Default for Sbrk {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(unix)]
impl HeapProvider for Sbrk {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    let expected = match self.brk {
      Some(brk) => brk.as_ptr(),
      None => {
        // First growth: bring the break up to the alignment unit.
        let current = Self::program_break() as usize;
        let padding = crate::align!(current) - current;
        if padding > 0 {
          Self::sbrk(padding)?;
        }
        Self::program_break()
      }
    };

    if Self::program_break() != expected {
      return Err(HeapError::Discontiguous);
    }

    let address = Self::sbrk(bytes)?;
    let start = NonNull::new(address).ok_or(HeapError::OutOfMemory { requested: bytes })?;
    self.brk = NonNull::new(unsafe { address.add(bytes) });
    log::debug!("sbrk: grew heap by {} bytes at {:p}", bytes, address);
    Ok(start)
  }
}

#[derive(Debug, Clone, Copy, Default)]
#[repr(C, align(8))]
pub(crate) struct Unit([u8; ALIGNMENT]);

/// Fixed-capacity heap backed by one aligned buffer, handed out like `sbrk`.
///
/// Useful wherever the process break is off limits: tests, embedding the
/// allocator inside another heap, or bounding how much memory it may claim.
pub struct Arena {
  memory: Box<[Unit]>,
  brk: usize,
}

impl Arena {
  /// An arena of `capacity` bytes, rounded up to the alignment unit.
  pub fn new(capacity: usize) -> Self {
    let units = crate::align!(capacity) / ALIGNMENT;
    Self {
      memory: vec![Unit::default(); units].into_boxed_slice(),
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.memory.len() * ALIGNMENT
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }

  pub fn start(&self) -> *const u8 {
    self.memory.as_ptr().cast()
  }
}

impl HeapProvider for Arena {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    if bytes > self.capacity() - self.brk {
      return Err(HeapError::OutOfMemory { requested: bytes });
    }

    let start = unsafe { self.memory.as_mut_ptr().cast::<u8>().add(self.brk) };
    self.brk += bytes;
    NonNull::new(start).ok_or(HeapError::OutOfMemory { requested: bytes })
  }
}
