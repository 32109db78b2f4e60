//! Pid liveness probes and signaling.

use std::io;

/// Check whether a process with this pid exists.
///
/// Signal 0 probes without delivering anything; `EPERM` still means the
/// process exists, it just belongs to someone else.
pub fn pid_alive(pid: i64) -> bool {
    if pid <= 0 {
        return false;
    }
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        true
    } else {
        io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

/// Send SIGTERM to a process.
pub fn terminate(pid: i64) -> io::Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_alive(std::process::id() as i64));
    }

    #[test]
    fn non_positive_pids_are_never_alive() {
        assert!(!pid_alive(0));
        assert!(!pid_alive(-1));
    }

    #[test]
    fn absent_pid_is_not_alive() {
        // Far above any default pid_max.
        assert!(!pid_alive(999_999_999));
    }
}
