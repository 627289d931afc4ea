/*!
   Functions for initializing each test at the beginning of a Rust test
   session.
*/

use std::env;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Once;
use tracing::warn;
use tracing_subscriber::{
    self as ts,
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::Error;
use crate::types::config::TestConfig;
use crate::util::random::random_u32;

static INIT: Once = Once::new();

/**
   Initialize the test with a global logger and error handlers,
   read the environment variables and return a [`TestConfig`].
*/
pub fn init_test() -> Result<TestConfig, Error> {
    let no_color_log = env_flag("NO_COLOR_LOG");

    INIT.call_once(|| {
        let with_color = std::io::stderr().is_terminal() && !no_color_log;

        install_logger(with_color);

        if with_color {
            if let Err(e) = color_eyre::install() {
                warn!("failed to install color_eyre error hooks: {}", e);
            }
        }
    });

    let base_chain_store_dir = env::var("CHAIN_STORE_DIR").unwrap_or_else(|_| "data".to_string());

    let chain_store_dir = format!("{}/test-{}", base_chain_store_dir, random_u32());

    fs::create_dir_all(&chain_store_dir)?;

    let chain_store_dir = fs::canonicalize(chain_store_dir)?;

    let log_dir = env::var("LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(&base_chain_store_dir).join("logs"));

    let docker_command = env::var("DOCKER_COMMAND").unwrap_or_else(|_| "docker".to_string());

    let block_wait_attempts = match env::var("BLOCK_WAIT_ATTEMPTS") {
        Ok(value) => value.parse::<u16>().map_err(|e| {
            Error::generic(eyre::eyre!(
                "invalid BLOCK_WAIT_ATTEMPTS value `{}`: {}",
                value,
                e
            ))
        })?,
        Err(_) => TestConfig::default().block_wait_attempts,
    };

    Ok(TestConfig {
        docker_command,
        chain_store_dir,
        log_dir,
        hang_on_fail: env_flag("HANG_ON_FAIL"),
        keep_containers: env_flag("KEEP_CONTAINERS"),
        pull_images: env_flag("PULL_IMAGES"),
        block_wait_attempts,
    })
}

fn env_flag(name: &str) -> bool {
    env::var(name).map(|val| val == "1").unwrap_or(false)
}

/**
   Install the [`tracing_subscriber`] logger handlers so that logs will
   be displayed during test.
*/
pub fn install_logger(with_color: bool) {
    // Use log level INFO by default if RUST_LOG is not set.
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let layer = ts::fmt::layer().with_ansi(with_color);

    // Another subscriber may already be installed, e.g. by `test_log`.
    let _ = ts::registry().with(env_filter).with(layer).try_init();
}
