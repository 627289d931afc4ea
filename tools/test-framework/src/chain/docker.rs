/*!
   A thin driver over the container runtime command line.

   Chains and relayers are run as containers attached to a per-test
   network. Containers and networks are removed when their handles are
   dropped, unless the test is configured to keep them for debugging.
*/

use core::fmt::{self, Display};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::chain::exec::{simple_exec, ExecOutput};
use crate::error::Error;
use crate::types::config::TestConfig;
use crate::util::random::random_string;

/**
   Label attached to every resource created by the test framework,
   so that leftovers can be cleaned up with
   `docker rm -f $(docker ps -aq --filter label=dymension-test-framework)`.
*/
pub const RESOURCE_LABEL: &str = "dymension-test-framework";

#[derive(Clone, Debug)]
pub struct DockerClient {
    /// Path to the container runtime CLI, `docker` by default.
    pub command_path: String,

    /// When set, containers and networks are left running on drop.
    pub keep_resources: bool,
}

/**
   A container image reference with the user the processes inside the
   container should run as.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerImage {
    pub repository: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub uid_gid: Option<String>,
}

/// An isolated network that all containers of a test are attached to.
#[derive(Debug)]
pub struct DockerNetwork {
    pub id: String,
    pub name: String,
    client: DockerClient,
}

/// A named volume holding the home directory of a node.
#[derive(Debug)]
pub struct DockerVolume {
    pub name: String,
    client: DockerClient,
}

/// Options for starting a container with `docker run`.
#[derive(Clone, Debug, Default)]
pub struct ContainerOptions {
    pub name: String,
    pub image: String,
    pub network_id: Option<String>,
    pub user: Option<String>,
    pub binds: Vec<(String, String)>,
    pub env: Vec<(String, String)>,
    pub entrypoint: Option<String>,
    pub cmd: Vec<String>,
}

/// A running container.
#[derive(Debug)]
pub struct Container {
    pub id: String,
    pub name: String,
    client: DockerClient,
}

impl DockerClient {
    pub fn new(command_path: &str) -> Self {
        Self {
            command_path: command_path.to_string(),
            keep_resources: false,
        }
    }

    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            command_path: config.docker_command.clone(),
            keep_resources: config.keep_containers,
        }
    }

    pub fn exec(&self, args: &[&str]) -> Result<ExecOutput, Error> {
        simple_exec("docker", &self.command_path, args)
    }

    pub fn create_network(&self, name: &str) -> Result<DockerNetwork, Error> {
        let output = self.exec(&[
            "network",
            "create",
            "--driver",
            "bridge",
            "--label",
            RESOURCE_LABEL,
            name,
        ])?;

        let id = output.stdout.trim().to_string();

        info!("created docker network {} ({})", name, id);

        Ok(DockerNetwork {
            id,
            name: name.to_string(),
            client: self.clone(),
        })
    }

    pub fn create_volume(&self, name: &str) -> Result<DockerVolume, Error> {
        self.exec(&["volume", "create", "--label", RESOURCE_LABEL, name])?;

        Ok(DockerVolume {
            name: name.to_string(),
            client: self.clone(),
        })
    }

    /**
       Give the user the image runs as ownership of a fresh volume, which
       is otherwise owned by root.
    */
    pub fn set_volume_owner(
        &self,
        volume: &DockerVolume,
        image: &DockerImage,
        mount_path: &str,
    ) -> Result<(), Error> {
        let Some(uid_gid) = &image.uid_gid else {
            return Ok(());
        };

        let options = ContainerOptions {
            name: format!("{}-chown-{}", volume.name, random_string(6)),
            image: image.reference(),
            user: Some("0:0".to_string()),
            binds: vec![(volume.name.clone(), mount_path.to_string())],
            entrypoint: Some("chown".to_string()),
            cmd: vec!["-R".to_string(), uid_gid.clone(), mount_path.to_string()],
            ..Default::default()
        };

        self.run_once(&options)?;

        Ok(())
    }

    pub fn pull_image(&self, image: &DockerImage) -> Result<(), Error> {
        self.exec(&["pull", &image.reference()])?;

        Ok(())
    }

    /// Start a detached, long running container.
    pub fn run_container(&self, options: &ContainerOptions) -> Result<Container, Error> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        args.extend(options.to_args());

        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec(&args_ref)?;

        let id = output.stdout.trim().to_string();

        debug!("started container {} ({})", options.name, id);

        Ok(Container {
            id,
            name: options.name.clone(),
            client: self.clone(),
        })
    }

    /**
       Run a command in a one-off container that is removed once the
       command exits, and return its output.
    */
    pub fn run_once(&self, options: &ContainerOptions) -> Result<ExecOutput, Error> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];
        args.extend(options.to_args());

        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        self.exec(&args_ref)
    }
}

impl DockerImage {
    pub fn new(repository: &str, version: &str) -> Self {
        Self {
            repository: repository.to_string(),
            version: version.to_string(),
            uid_gid: None,
        }
    }

    pub fn with_uid_gid(mut self, uid_gid: &str) -> Self {
        self.uid_gid = Some(uid_gid.to_string());
        self
    }

    pub fn reference(&self) -> String {
        if self.version.is_empty() {
            self.repository.clone()
        } else {
            format!("{}:{}", self.repository, self.version)
        }
    }
}

impl Display for DockerImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.reference())
    }
}

impl ContainerOptions {
    fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--name".to_string(),
            self.name.clone(),
            "--hostname".to_string(),
            self.name.clone(),
            "--label".to_string(),
            RESOURCE_LABEL.to_string(),
        ];

        if let Some(network_id) = &self.network_id {
            args.push("--network".to_string());
            args.push(network_id.clone());
        }

        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }

        for (host, container) in &self.binds {
            args.push("-v".to_string());
            args.push(format!("{host}:{container}"));
        }

        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        if let Some(entrypoint) = &self.entrypoint {
            args.push("--entrypoint".to_string());
            args.push(entrypoint.clone());
        }

        args.push(self.image.clone());
        args.extend(self.cmd.iter().cloned());

        args
    }
}

impl Container {
    /// Execute a command inside the container and wait for it to finish.
    pub fn exec(&self, args: &[&str]) -> Result<ExecOutput, Error> {
        let mut full_args = vec!["exec", self.id.as_str()];
        full_args.extend_from_slice(args);

        self.client.exec(&full_args)
    }

    /// Execute a command inside the container in the background.
    pub fn exec_detached(&self, args: &[&str]) -> Result<(), Error> {
        let mut full_args = vec!["exec", "-d", self.id.as_str()];
        full_args.extend_from_slice(args);

        self.client.exec(&full_args)?;

        Ok(())
    }

    /// Read a file from the container filesystem.
    pub fn read_file(&self, path: &str) -> Result<String, Error> {
        Ok(self.exec(&["cat", path])?.stdout)
    }

    /// Copy a file from the host into the container filesystem.
    pub fn copy_to(&self, host_path: &Path, container_path: &str) -> Result<(), Error> {
        let source = host_path.display().to_string();
        let target = format!("{}:{}", self.id, container_path);

        self.client.exec(&["cp", &source, &target])?;

        Ok(())
    }

    pub fn remove(&self) -> Result<(), Error> {
        self.client.exec(&["rm", "-f", &self.id])?;

        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if self.client.keep_resources {
            return;
        }

        if let Err(e) = self.remove() {
            warn!("failed to remove container {}: {}", self.name, e);
        }
    }
}

impl Drop for DockerVolume {
    fn drop(&mut self) {
        if self.client.keep_resources {
            return;
        }

        if let Err(e) = self.client.exec(&["volume", "rm", "-f", &self.name]) {
            warn!("failed to remove docker volume {}: {}", self.name, e);
        }
    }
}

impl Drop for DockerNetwork {
    fn drop(&mut self) {
        if self.client.keep_resources {
            return;
        }

        if let Err(e) = self.client.exec(&["network", "rm", &self.id]) {
            warn!("failed to remove docker network {}: {}", self.name, e);
        }
    }
}

/**
   Turn a test name into something usable inside container, network
   and key names.
*/
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/**
   Create the container client and the isolated network that all
   containers of a test run are attached to.
*/
pub fn docker_setup(
    config: &TestConfig,
    test_name: &str,
) -> Result<(DockerClient, DockerNetwork), Error> {
    let client = DockerClient::from_config(config);

    let network_name = format!("ict-{}-{}", sanitize_name(test_name), random_string(8));
    let network = client.create_network(&network_name)?;

    Ok((client, network))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn container_options_produce_run_args() {
        let options = ContainerOptions {
            name: "dymension_100-1-val-0".to_string(),
            image: DockerImage::new("dymension", "latest").reference(),
            network_id: Some("net-1".to_string()),
            user: Some("1025:1025".to_string()),
            binds: vec![("/tmp/home".to_string(), "/home/relayer".to_string())],
            env: vec![("HOME".to_string(), "/home/relayer".to_string())],
            entrypoint: Some("sh".to_string()),
            cmd: vec!["-c".to_string(), "sleep infinity".to_string()],
        };

        let args = options.to_args();

        assert_eq!(args[0], "--name");
        assert_eq!(args[1], "dymension_100-1-val-0");
        assert!(args.windows(2).any(|w| w == ["--network", "net-1"]));
        assert!(args.windows(2).any(|w| w == ["--user", "1025:1025"]));
        assert!(args.windows(2).any(|w| w == ["-v", "/tmp/home:/home/relayer"]));
        assert!(args.windows(2).any(|w| w == ["--entrypoint", "sh"]));

        let image_index = args.iter().position(|a| a == "dymension:latest").unwrap();
        assert_eq!(&args[image_index + 1..], ["-c", "sleep infinity"]);
    }

    #[test_log::test]
    fn sanitizes_test_names() {
        assert_eq!(
            sanitize_name("tests::transfer::Dymension Osmosis"),
            "tests--transfer--dymension-osmosis"
        );
    }
}
