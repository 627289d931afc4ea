/*!
   A relayer whose commands run in containers on the test network.

   Each command runs in a one-off container sharing the relayer home
   directory, which lives on the host and is bind mounted into every
   container. Only [`RelayerHandle::start_relayer`] leaves a container
   running, until the relayer is stopped or dropped.
*/

use core::time::Duration;
use ibc_relayer_types::core::ics24_host::identifier::ChannelId;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::chain::docker::{sanitize_name, Container, ContainerOptions, DockerClient, DockerImage};
use crate::chain::exec::ExecOutput;
use crate::chain::spec::ChainConfig;
use crate::error::Error;
use crate::relayer::handle::{ChannelOutput, RelayerHandle};
use crate::reporter::{now_millis, RelayerExecReporter};
use crate::util::mutex::MutexUtil;
use crate::util::random::random_string;

/// The relayer home directory inside the containers.
pub const RELAYER_HOME: &str = "/home/relayer";

/// A file to write in the relayer home directory before running a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayerFile {
    pub path: String,
    pub content: String,
}

/// The files and command implementing one relayer operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayerCommand {
    pub files: Vec<RelayerFile>,
    pub commands: Vec<Vec<String>>,
}

/**
   The command line of a relayer implementation. Implementations only
   build commands and parse their output; running them is left to
   [`DockerRelayer`].
*/
pub trait RelayerCommander: Send + Sync {
    fn name(&self) -> &str;

    fn default_image(&self) -> DockerImage;

    /// Commands preparing an empty home directory.
    fn init(&self, home: &str) -> RelayerCommand;

    fn add_chain_configuration(
        &self,
        home: &str,
        chain: &ChainConfig,
        key_name: &str,
        rpc_address: &str,
        grpc_address: &str,
    ) -> Result<RelayerCommand, Error>;

    fn restore_key(
        &self,
        home: &str,
        chain: &ChainConfig,
        key_name: &str,
        mnemonic: &str,
    ) -> RelayerCommand;

    fn generate_path(
        &self,
        home: &str,
        src_chain_id: &str,
        dst_chain_id: &str,
        path_name: &str,
    ) -> RelayerCommand;

    fn link_path(&self, home: &str, path_name: &str) -> Result<RelayerCommand, Error>;

    fn get_channels(&self, home: &str, chain_id: &str) -> Vec<String>;

    fn parse_channels(&self, stdout: &str) -> Result<Vec<ChannelOutput>, Error>;

    fn flush(
        &self,
        home: &str,
        path_name: &str,
        channel_id: &ChannelId,
    ) -> Result<RelayerCommand, Error>;

    fn start(&self, home: &str, paths: &[String], startup_flags: &[String]) -> Vec<String>;
}

pub struct DockerRelayer<Commander> {
    commander: Commander,
    client: DockerClient,
    network_id: String,
    image: DockerImage,
    startup_flags: Vec<String>,
    host_home: PathBuf,
    name_prefix: String,
    running: Mutex<Option<Container>>,
}

impl RelayerCommand {
    pub fn single(command: Vec<String>) -> Self {
        Self {
            files: Vec::new(),
            commands: vec![command],
        }
    }

    pub fn with_file(mut self, path: &str, content: String) -> Self {
        self.files.push(RelayerFile {
            path: path.to_string(),
            content,
        });
        self
    }
}

pub fn command_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

impl<Commander: RelayerCommander> DockerRelayer<Commander> {
    pub fn new(
        commander: Commander,
        test_name: &str,
        client: DockerClient,
        network_id: &str,
        host_home: &Path,
        image: Option<DockerImage>,
        startup_flags: Vec<String>,
    ) -> Result<Self, Error> {
        let image = image.unwrap_or_else(|| commander.default_image());

        fs::create_dir_all(host_home)?;
        open_permissions(host_home)?;

        let name_prefix = format!(
            "{}-{}-{}",
            commander.name(),
            sanitize_name(test_name),
            random_string(6)
        );

        let relayer = Self {
            commander,
            client,
            network_id: network_id.to_string(),
            image,
            startup_flags,
            host_home: host_home.to_path_buf(),
            name_prefix,
            running: Mutex::new(None),
        };

        Ok(relayer)
    }

    pub fn commander(&self) -> &Commander {
        &self.commander
    }

    pub fn host_home(&self) -> &Path {
        &self.host_home
    }

    fn write_files(&self, command: &RelayerCommand) -> Result<(), Error> {
        for file in command.files.iter() {
            let path = self.host_home.join(&file.path);

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
                open_permissions(parent)?;
            }

            fs::write(&path, &file.content)?;
        }

        Ok(())
    }

    fn container_options(&self, command: &[String], detached_name: Option<&str>) -> ContainerOptions {
        let name = detached_name
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("{}-exec-{}", self.name_prefix, random_string(6)));

        ContainerOptions {
            name,
            image: self.image.reference(),
            network_id: Some(self.network_id.clone()),
            user: self.image.uid_gid.clone(),
            binds: vec![(
                self.host_home.display().to_string(),
                RELAYER_HOME.to_string(),
            )],
            env: vec![("HOME".to_string(), RELAYER_HOME.to_string())],
            entrypoint: command.first().cloned(),
            cmd: command.iter().skip(1).cloned().collect(),
        }
    }

    /// Run one command to completion, reporting it.
    pub fn exec(
        &self,
        reporter: &RelayerExecReporter,
        command: &[String],
    ) -> Result<ExecOutput, Error> {
        let options = self.container_options(command, None);

        debug!("running relayer command: {}", command.join(" "));

        let start_time = now_millis();
        let result = self.client.run_once(&options);

        reporter.track_relayer_exec(&options.name, command, &result, start_time);

        result
    }

    fn run(&self, reporter: &RelayerExecReporter, command: &RelayerCommand) -> Result<(), Error> {
        self.write_files(command)?;

        for args in command.commands.iter() {
            self.exec(reporter, args)?;
        }

        Ok(())
    }
}

impl<Commander: RelayerCommander> RelayerHandle for DockerRelayer<Commander> {
    fn name(&self) -> &str {
        self.commander.name()
    }

    fn add_chain_configuration(
        &self,
        reporter: &RelayerExecReporter,
        chain: &ChainConfig,
        key_name: &str,
        rpc_address: &str,
        grpc_address: &str,
    ) -> Result<(), Error> {
        if !self.host_home.join(".initialized").exists() {
            self.run(reporter, &self.commander.init(RELAYER_HOME))?;
            fs::write(self.host_home.join(".initialized"), "")?;
        }

        let command = self.commander.add_chain_configuration(
            RELAYER_HOME,
            chain,
            key_name,
            rpc_address,
            grpc_address,
        )?;

        self.run(reporter, &command)
    }

    fn restore_key(
        &self,
        reporter: &RelayerExecReporter,
        chain: &ChainConfig,
        key_name: &str,
        mnemonic: &str,
    ) -> Result<(), Error> {
        let command = self
            .commander
            .restore_key(RELAYER_HOME, chain, key_name, mnemonic);

        self.run(reporter, &command)
    }

    fn generate_path(
        &self,
        reporter: &RelayerExecReporter,
        src_chain_id: &str,
        dst_chain_id: &str,
        path_name: &str,
    ) -> Result<(), Error> {
        let command =
            self.commander
                .generate_path(RELAYER_HOME, src_chain_id, dst_chain_id, path_name);

        self.run(reporter, &command)
    }

    fn link_path(&self, reporter: &RelayerExecReporter, path_name: &str) -> Result<(), Error> {
        info!("linking path {} with {}", path_name, self.name());

        let command = self.commander.link_path(RELAYER_HOME, path_name)?;

        self.run(reporter, &command)
    }

    fn get_channels(
        &self,
        reporter: &RelayerExecReporter,
        chain_id: &str,
    ) -> Result<Vec<ChannelOutput>, Error> {
        let command = self.commander.get_channels(RELAYER_HOME, chain_id);
        let output = self.exec(reporter, &command)?;

        self.commander.parse_channels(&output.stdout)
    }

    fn flush(
        &self,
        reporter: &RelayerExecReporter,
        path_name: &str,
        channel_id: &ChannelId,
    ) -> Result<(), Error> {
        info!(
            "flushing packets of {} on path {} with {}",
            channel_id,
            path_name,
            self.name()
        );

        let command = self.commander.flush(RELAYER_HOME, path_name, channel_id)?;

        self.run(reporter, &command)
    }

    fn start_relayer(&self, reporter: &RelayerExecReporter, paths: &[String]) -> Result<(), Error> {
        let mut running = self.running.acquire_mutex();

        if running.is_some() {
            return Ok(());
        }

        let command = self
            .commander
            .start(RELAYER_HOME, paths, &self.startup_flags);

        let name = format!("{}-run", self.name_prefix);
        let options = self.container_options(&command, Some(&name));

        let start_time = now_millis();
        let result = self.client.run_container(&options);

        let report = match &result {
            Ok(container) => Ok(ExecOutput {
                stdout: container.id.clone(),
                stderr: String::new(),
            }),
            Err(e) => Err(Error::exec(command.join(" "), None, e.to_string())),
        };
        reporter.track_relayer_exec(&name, &command, &report, start_time);

        let container = result?;

        info!("started relayer {} in container {}", self.name(), container.name);

        // Wait for the relayer to load its configuration.
        std::thread::sleep(Duration::from_secs(1));

        *running = Some(container);

        Ok(())
    }

    fn stop_relayer(&self, _reporter: &RelayerExecReporter) -> Result<(), Error> {
        let container = self.running.acquire_mutex().take();

        if let Some(container) = container {
            info!("stopping relayer {}", self.name());
            drop(container);
        }

        Ok(())
    }
}

#[cfg(unix)]
fn open_permissions(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    // The relayer image runs as its own user, which must be able to
    // write to the home directory created by the test process.
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))?;

    Ok(())
}

#[cfg(not(unix))]
fn open_permissions(_path: &Path) -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn relayer_command_builder() {
        let command = RelayerCommand::single(command_args(&["rly", "q", "channels", "osmosis-1001"]))
            .with_file("chains/osmosis-1001.json", "{}".to_string());

        assert_eq!(command.commands, vec![vec!["rly", "q", "channels", "osmosis-1001"]]);
        assert_eq!(command.files[0].path, "chains/osmosis-1001.json");
    }
}
