//! Guarded state shared between interrupt and task context.
//!
//! # Architecture
//!
//! ```text
//! ISR / timer callback        Latch            Producer task
//! ────────────────────        ─────            ─────────────
//!
//! update(raw) ───────────▶ [raw | updates] ───────▶ snapshot()
//! one scalar write          own section           one scalar copy
//! ```
//!
//! Every latch owns its own critical section, so unrelated capture channels
//! never serialize against each other. On ESP-IDF the section is an
//! `IsrCriticalSection` (a dedicated `portMUX` spinlock that also masks
//! interrupts on the current core). On the host it is a plain spin section.
//!
//! # Rules
//!
//! - Nothing inside a section may block, allocate or log.
//! - Sections are held for a single copy of a small value.

use core::cell::UnsafeCell;

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::interrupt::IsrCriticalSection as Section;

#[cfg(not(target_os = "espidf"))]
use host::Section;

#[cfg(not(target_os = "espidf"))]
mod host {
    use core::sync::atomic::{AtomicBool, Ordering};

    /// Host stand-in for `IsrCriticalSection`. No interrupts to mask here.
    pub struct Section {
        locked: AtomicBool,
    }

    pub struct SectionGuard<'a> {
        section: &'a Section,
    }

    impl Section {
        pub const fn new() -> Self {
            Self {
                locked: AtomicBool::new(false),
            }
        }

        #[inline]
        pub fn enter(&self) -> SectionGuard<'_> {
            while self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                core::hint::spin_loop();
            }
            SectionGuard { section: self }
        }
    }

    impl Drop for SectionGuard<'_> {
        #[inline]
        fn drop(&mut self) {
            self.section.locked.store(false, Ordering::Release);
        }
    }
}

/// A value reachable only through its own critical section.
pub struct Guarded<T> {
    section: Section,
    value: UnsafeCell<T>,
}

// SAFETY: every access to `value` goes through `with`, which holds the
// section for the whole borrow.
unsafe impl<T: Send> Sync for Guarded<T> {}
unsafe impl<T: Send> Send for Guarded<T> {}

impl<T> Guarded<T> {
    /// Create a guarded value (usable in `static` items).
    pub const fn new(value: T) -> Self {
        Self {
            section: Section::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// Keep `f` short: on ESP-IDF interrupts on this core are masked
    /// for its whole duration.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let _guard = self.section.enter();
        // SAFETY: the section grants exclusive access until `_guard` drops.
        f(unsafe { &mut *self.value.get() })
    }
}

/// Latest latched value of a capture channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LatchValue {
    /// Raw value (pulse count or tick delta).
    pub raw: u32,
    /// Number of updates since boot (wraps).
    pub updates: u32,
}

/// Per-channel latch written from interrupt context, read from tasks.
///
/// Only [`update`](Latch::update) and [`snapshot`](Latch::snapshot) are
/// exposed; there is no way to hold the section across other work.
pub struct Latch {
    cell: Guarded<LatchValue>,
}

impl Latch {
    /// Create an empty latch.
    pub const fn new() -> Self {
        Self {
            cell: Guarded::new(LatchValue { raw: 0, updates: 0 }),
        }
    }

    /// Publish a new raw value. O(1), ISR-safe.
    #[inline]
    pub fn update(&self, raw: u32) {
        self.cell.with(|v| {
            v.raw = raw;
            v.updates = v.updates.wrapping_add(1);
        });
    }

    /// Copy out the latest value. O(1).
    #[inline]
    pub fn snapshot(&self) -> LatchValue {
        self.cell.with(|v| *v)
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}
