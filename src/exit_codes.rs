//! Exit code constants for the mb CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, programmer error)
//! - 2: Lock contention (resource held by another client)
//! - 3: Remote failure (bootstrap, remote command, file copy)
//! - 4: Remote store failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or an invalid lock type.
pub const USER_ERROR: i32 = 1;

/// Lock contention: the resource is locked by someone else.
pub const LOCK_FAILURE: i32 = 2;

/// Remote failure: a bootstrap, remote command, or file copy failed.
pub const REMOTE_FAILURE: i32 = 3;

/// Remote store failure: the lock store could not be read or written.
pub const STORE_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, LOCK_FAILURE, REMOTE_FAILURE, STORE_FAILURE];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
