//! Process-group registry and signal handling.
//!
//! Every spawned child leads its own process group and is registered here for
//! the duration of its life. The SIGINT/SIGTERM handler walks the registry and
//! kills every live group, so no benchmark child survives the harness.
//!
//! The registry is a fixed array of atomic slots rather than a locked map:
//! signal handlers may only touch async-signal-safe state.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

const MAX_GROUPS: usize = 256;

static GROUPS: [AtomicI32; MAX_GROUPS] = [const { AtomicI32::new(0) }; MAX_GROUPS];
static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Record a process-group leader pid. Returns `false` if the registry is full,
/// in which case the caller still owns cleanup of that child.
pub(crate) fn register(pid: u32) -> bool {
    let pid = pid as i32;
    for slot in &GROUPS {
        if slot
            .compare_exchange(0, pid, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return true;
        }
    }
    false
}

/// Remove a process-group leader pid after it has been reaped.
pub(crate) fn unregister(pid: u32) {
    let pid = pid as i32;
    for slot in &GROUPS {
        if slot
            .compare_exchange(pid, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return;
        }
    }
}

/// Whether a SIGINT/SIGTERM has been received.
pub fn cancellation_requested() -> bool {
    CANCELLED.load(Ordering::SeqCst)
}

extern "C" fn handle_signal(_sig: libc::c_int) {
    CANCELLED.store(true, Ordering::SeqCst);

    // killpg and atomics are async-signal-safe; nothing else is allowed here.
    for slot in &GROUPS {
        let pid = slot.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::killpg(pid, libc::SIGKILL);
            }
        }
    }
}

/// Install SIGINT/SIGTERM handlers that kill all registered process groups and
/// flag cancellation. The main loop observes [`cancellation_requested`] and
/// winds down instead of exiting from the handler.
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_unregister_round_trip() {
        assert!(register(4242));
        assert!(GROUPS.iter().any(|s| s.load(Ordering::SeqCst) == 4242));
        unregister(4242);
        assert!(GROUPS.iter().all(|s| s.load(Ordering::SeqCst) != 4242));
    }

    #[test]
    fn unregister_unknown_pid_is_harmless() {
        unregister(999_999);
    }
}
