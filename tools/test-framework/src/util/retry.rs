/*!
   Utilities for retrying test operations.
*/

use core::time::Duration;
use std::thread::sleep;
use tracing::trace;

use crate::error::Error;

/**
   A simplified version of retry logic used for testing.
   We do not need complicated retry logic as we need this
   only to test eventual consistency which should reach
   within a few seconds.
*/
pub fn assert_eventually_succeed<R>(
    task_name: &str,
    attempts: u16,
    interval: Duration,
    task: impl Fn() -> Result<R, Error>,
) -> Result<R, Error> {
    for _ in 0..attempts {
        match task() {
            Ok(res) => return Ok(res),
            Err(e) => {
                trace!("retrying task that failed with error: {}", e);
                sleep(interval)
            }
        }
    }

    Err(Error::retry(task_name.to_string(), attempts))
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    #[test_log::test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);

        let res = assert_eventually_succeed("count to three", 5, Duration::from_millis(1), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::assertion("not yet".to_string()))
            } else {
                Ok(calls.get())
            }
        })
        .unwrap();

        assert_eq!(res, 3);
    }

    #[test_log::test]
    fn gives_up_after_attempts() {
        let calls = Cell::new(0);

        let res: Result<(), Error> =
            assert_eventually_succeed("never", 4, Duration::from_millis(1), || {
                calls.set(calls.get() + 1);
                Err(Error::assertion("nope".to_string()))
            });

        assert!(res.is_err());
        assert_eq!(calls.get(), 4);
    }
}
