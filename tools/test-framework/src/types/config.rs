/*!
   Definition for the test configuration.
*/

use core::fmt::Debug;
use core::time::Duration;
use std::path::PathBuf;
use tracing::error;

use crate::error::Error;
use crate::util::suspend::suspend;

/**
   The test config to be passed to each test case. Currently this is loaded
   from the [`init_test`](crate::bootstrap::init::init_test) function
   based on the test environment variables.
*/
#[derive(Clone, Debug)]
pub struct TestConfig {
    /**
       The command that the [`DockerClient`](crate::chain::docker::DockerClient)
       should use to drive containers, read from the `DOCKER_COMMAND`
       environment variable. Defaults to `docker`.
    */
    pub docker_command: String,

    /**
       The directory path for storing the relayer home directories and
       exported environment files of a test run. The path is created
       from a base directory read from the `CHAIN_STORE_DIR` environment
       variable, with a random `test-<id>` sub directory per run.
    */
    pub chain_store_dir: PathBuf,

    /**
       The directory where the JSON reporter log files are written,
       read from `LOG_DIR`. Defaults to `<CHAIN_STORE_DIR>/logs`.
    */
    pub log_dir: PathBuf,

    /**
       Whether to suspend a test case when it fails whenever possible.
       This is controlled by the `HANG_ON_FAIL` environment variable.
    */
    pub hang_on_fail: bool,

    /**
       Keep containers and networks around after the test finishes,
       controlled by `KEEP_CONTAINERS`.
    */
    pub keep_containers: bool,

    /// Pull chain images before starting the nodes, controlled by `PULL_IMAGES`.
    pub pull_images: bool,

    /**
       Number of attempts, one second apart, when waiting for blocks
       or transaction inclusion. Read from `BLOCK_WAIT_ATTEMPTS`.
    */
    pub block_wait_attempts: u16,
}

impl TestConfig {
    pub fn block_wait_interval(&self) -> Duration {
        Duration::from_secs(1)
    }

    pub fn hang_on_error(&self) -> impl FnOnce(Error) -> Error {
        hang_on_error(self.hang_on_fail)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            docker_command: "docker".to_string(),
            chain_store_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("data").join("logs"),
            hang_on_fail: false,
            keep_containers: false,
            pull_images: false,
            block_wait_attempts: 90,
        }
    }
}

/**
   Return a function that suspends the test on error when `hang_on_fail`
   is set, and passes the error through otherwise.
*/
pub fn hang_on_error(hang_on_fail: bool) -> impl FnOnce(Error) -> Error {
    move |e| {
        if hang_on_fail {
            error!("test failure occured with HANG_ON_FAIL=1, suspending the test to allow debugging: {:?}",
                e);

            suspend()
        } else {
            error!("test failure occured. set HANG_ON_FAIL=1 to suspend the test on failure for debugging: {:?}",
                e);

            e
        }
    }
}
