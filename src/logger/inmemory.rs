// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{
    logger::LogSink,
    platform::{CORE_COUNT, PerCoreState, exception_free},
};
use core::{
    cell::RefCell,
    cmp::min,
    fmt::{self, Arguments, Write},
};
use percore::{ExceptionLock, PerCore};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// An in-memory logger with a circular buffer.
#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MemoryLogger<const BUFFER_SIZE: usize> {
    /// The position in `buffer` at which to write the next byte.
    next_offset: usize,
    /// The total number of bytes logged since the logger was created or reset. Note that this may
    /// be greater than `BUFFER_SIZE`, so not all the bytes logged may still be available.
    logged_bytes_count: usize,
    buffer: [u8; BUFFER_SIZE],
}

impl<const BUFFER_SIZE: usize> MemoryLogger<BUFFER_SIZE> {
    /// Creates a new in-memory logger with a zeroed-out circular buffer.
    #[allow(unused)]
    pub const fn new() -> Self {
        Self {
            next_offset: 0,
            logged_bytes_count: 0,
            buffer: [0; BUFFER_SIZE],
        }
    }

    /// Resets the logger to an empty state.
    #[allow(unused)]
    pub fn reset(&mut self) {
        self.next_offset = 0;
        self.logged_bytes_count = 0;
    }

    /// Adds the given bytes to the circular buffer.
    ///
    /// If more bytes are passed than can fit in the buffer at once, then the initial bytes are ignored.
    fn add_bytes(&mut self, mut bytes: &[u8]) {
        self.logged_bytes_count += bytes.len();
        // If we are given more bytes than we can fit, keep the end.
        if bytes.len() > BUFFER_SIZE {
            bytes = &bytes[bytes.len() - BUFFER_SIZE..];
        }

        let buffer_end_len = min(bytes.len(), BUFFER_SIZE - self.next_offset);
        self.buffer[self.next_offset..self.next_offset + buffer_end_len]
            .copy_from_slice(&bytes[0..buffer_end_len]);
        self.buffer[0..bytes.len() - buffer_end_len].copy_from_slice(&bytes[buffer_end_len..]);
        self.next_offset = (self.next_offset + bytes.len()) % BUFFER_SIZE;
    }

    /// Shifts the wrapped contents of the ring buffer so that the oldest byte
    /// is at index 0.
    fn shift_to_start(&mut self) {
        if self.logged_bytes_count < BUFFER_SIZE {
            return;
        }

        // self.next_offset points to the oldest byte.
        self.buffer.rotate_left(self.next_offset);

        // The oldest byte is now at index 0.
        self.next_offset = 0;
    }

    /// Finds a valid UTF-8 suffix and returns a reference to it.
    #[allow(unused)]
    pub fn as_str(&mut self) -> &str {
        self.shift_to_start();

        let mut current = &self.buffer[..min(BUFFER_SIZE, self.logged_bytes_count)];

        // After `shift_to_start` the buffer may start with a partially overwritten UTF-8 character
        // (at most 3 bytes are corrupt).
        // A single call to `str::from_utf8` may identify only a portion of the corrupt sequence, so
        // to find the valid suffix we need to loop a few times.
        loop {
            match str::from_utf8(current) {
                Ok(valid_str) => return valid_str,
                Err(e) => {
                    // The error is at index 0.
                    match e.error_len() {
                        Some(len) => {
                            // This byte sequence is corrupt. Skip it and retry.
                            current = &current[len..];
                        }
                        None => {
                            // Only an incomplete character remains at the end.
                            return "";
                        }
                    }
                }
            }
        }
    }
}

impl<const BUFFER_SIZE: usize> Default for MemoryLogger<BUFFER_SIZE> {
    fn default() -> Self {
        Self {
            next_offset: 0,
            logged_bytes_count: 0,
            buffer: [0; BUFFER_SIZE],
        }
    }
}

impl<const BUFFER_SIZE: usize> Write for MemoryLogger<BUFFER_SIZE> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.add_bytes(s.as_bytes());
        Ok(())
    }
}

/// A per-core in-memory logger.
pub struct PerCoreMemoryLogger<'a, const BUFFER_SIZE: usize> {
    logs: PerCoreState<&'a mut MemoryLogger<BUFFER_SIZE>>,
}

impl<'a, const BUFFER_SIZE: usize> PerCoreMemoryLogger<'a, BUFFER_SIZE> {
    #[allow(unused)]
    pub fn new(loggers: [&'a mut MemoryLogger<BUFFER_SIZE>; CORE_COUNT]) -> Self {
        Self {
            logs: PerCore::new(loggers.map(|logger| ExceptionLock::new(RefCell::new(logger)))),
        }
    }
}

impl<const BUFFER_SIZE: usize> LogSink for PerCoreMemoryLogger<'_, BUFFER_SIZE> {
    fn write_fmt(&self, args: Arguments) {
        // The `MemoryLogger` should never return an error.
        let _ = exception_free(|token| self.logs.get().borrow_mut(token).write_fmt(args));
    }
}

impl<const BUFFER_SIZE: usize> LogSink for &PerCoreMemoryLogger<'_, BUFFER_SIZE> {
    fn write_fmt(&self, args: Arguments) {
        (*self).write_fmt(args)
    }
}
