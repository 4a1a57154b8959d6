//! Idle hook — low-power wait while no task is pending
//!
//! The run loop calls [`Sleep::try_sleep`] only after it saw every queue
//! empty, and from inside the same critical section. On Cortex-M and
//! RISC-V a `wfi` with interrupts masked still wakes on a pending
//! interrupt, so a post racing the emptiness check cannot be slept through.
//! The handler then runs once the critical section is released.
//!
//! Author: Moroya Sakamoto

/// Power-management collaborator (`trySleep`)
pub trait Sleep {
    /// Wait for the next interrupt
    ///
    /// May return spuriously; the run loop re-checks its queues.
    fn try_sleep(&mut self);
}

/// `wfi` on bare-metal targets
///
/// Falls back to yielding the thread (`std` feature) or a spin hint on
/// hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitForInterrupt;

impl Sleep for WaitForInterrupt {
    #[inline]
    fn try_sleep(&mut self) {
        wait_for_interrupt();
    }
}

#[inline]
pub fn wait_for_interrupt() {
    #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(target_arch = "arm")]
    unsafe {
        core::arch::asm!("wfi", options(nomem, nostack));
    }

    #[cfg(all(
        not(any(target_arch = "riscv32", target_arch = "riscv64", target_arch = "arm")),
        any(test, feature = "std")
    ))]
    {
        std::thread::yield_now();
    }

    #[cfg(all(
        not(any(target_arch = "riscv32", target_arch = "riscv64", target_arch = "arm")),
        not(any(test, feature = "std"))
    ))]
    {
        core::hint::spin_loop();
    }
}
