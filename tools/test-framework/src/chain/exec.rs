/*!
   Execution of external commands, used for driving both the container
   runtime and the chain and relayer command line interfaces.
*/

use std::process::Command;
use std::str;
use tracing::{debug, trace};

use crate::error::{handle_exec_error, handle_generic_error, Error};

pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

pub fn simple_exec(desc: &str, command_path: &str, args: &[&str]) -> Result<ExecOutput, Error> {
    debug!(
        "Executing command for {}: {} {}",
        desc,
        command_path,
        itertools::join(args, " ")
    );

    let output = Command::new(command_path)
        .args(args)
        .output()
        .map_err(handle_exec_error(command_path))?;

    if output.status.success() {
        let stdout = str::from_utf8(&output.stdout)
            .map_err(handle_generic_error)?
            .to_string();

        let stderr = str::from_utf8(&output.stderr)
            .map_err(handle_generic_error)?
            .to_string();

        trace!(
            "command executed successfully with stdout: {}, stderr: {}",
            stdout,
            stderr
        );

        Ok(ExecOutput { stdout, stderr })
    } else {
        let message = String::from_utf8_lossy(&output.stderr).to_string();

        Err(Error::exec(
            format!("{} {}", command_path, itertools::join(args, " ")),
            output.status.code(),
            message,
        ))
    }
}

impl ExecOutput {
    /**
       Some Cosmos SDK commands, such as `status` in older releases, print
       their result to stderr. Return whichever stream has content,
       preferring stdout.
    */
    pub fn output(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDetail;

    #[test_log::test]
    fn missing_command_is_reported() {
        let res = simple_exec("test", "this-command-does-not-exist-5f1c", &["--help"]);

        match res {
            Err(e) => assert!(matches!(e.detail(), ErrorDetail::CommandNotFound(_))),
            Ok(_) => panic!("expected command to be missing"),
        }
    }

    #[cfg(unix)]
    #[test_log::test]
    fn failing_command_reports_status_and_stderr() {
        let res = simple_exec("test", "sh", &["-c", "echo boom >&2; exit 3"]);

        match res {
            Err(e) => match e.detail() {
                ErrorDetail::Exec(detail) => {
                    assert_eq!(detail.status, Some(3));
                    assert!(detail.stderr.contains("boom"));
                }
                _ => panic!("unexpected error: {e}"),
            },
            Ok(_) => panic!("expected command to fail"),
        }
    }

    #[cfg(unix)]
    #[test_log::test]
    fn output_falls_back_to_stderr() {
        let res = simple_exec("test", "sh", &["-c", "echo status >&2"]).unwrap();

        assert_eq!(res.output().trim(), "status");
    }
}
