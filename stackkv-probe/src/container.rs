//! Best-effort retrieval of the store container's log output.

use std::io;
use std::process::Command;

use tracing::debug;

const DOCKER: &str = "docker";

/// Captured `docker logs` output.
#[derive(Debug, Default)]
pub struct ContainerLogs {
    pub stdout: String,
    pub stderr: String,
}

impl ContainerLogs {
    pub fn is_empty(&self) -> bool {
        self.stdout.trim().is_empty() && self.stderr.trim().is_empty()
    }
}

/// Prints the container's logs, or a warning line if they cannot be fetched.
pub fn print_logs(container: &str) {
    match fetch_logs(DOCKER, container) {
        Ok(logs) if logs.is_empty() => debug!(container, "container produced no log output"),
        Ok(logs) => {
            println!("\nRedis container logs:");
            println!("{}", "-".repeat(40));
            if !logs.stdout.is_empty() {
                println!("STDOUT: {}", logs.stdout);
            }
            if !logs.stderr.is_empty() {
                println!("STDERR: {}", logs.stderr);
            }
            println!("{}", "-".repeat(40));
        }
        Err(err) => println!("⚠️  Could not fetch Redis logs: {err}"),
    }
}

/// Runs `<program> logs <container>` and captures both streams.
pub fn fetch_logs(program: &str, container: &str) -> io::Result<ContainerLogs> {
    let output = Command::new(program).args(["logs", container]).output()?;
    Ok(ContainerLogs {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
