//! Subprocess execution bound to a `Context`
//!
//! Output is captured and logged once the command finishes: at debug on
//! success and at error on failure, with the command line echoed first.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error};

use crate::context::Context;
use crate::error::UpdateError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured output of a finished command
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// A command to run in a working directory
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The command line as echoed in logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(dir);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    /// Run with output captured. A non-zero exit is a `ToolFailure`.
    pub fn run(&self, ctx: &Context, dir: &Path) -> Result<Output, UpdateError> {
        ctx.check()?;
        let mut child = self
            .command(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| UpdateError::ToolFailure(format!("{}: {}", self.program, e)))?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());
        let command = self.display();
        let status = match wait(ctx, &mut child) {
            // Descendants of the killed child may still hold the pipes open
            Err(UpdateError::Cancelled) => {
                error!(command = %command, "command cancelled");
                return Err(UpdateError::Cancelled);
            }
            status => status,
        };
        let output = Output {
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        };

        match status {
            Ok(status) if status.success() => {
                debug!(command = %command, "{}{}", output.stdout, output.stderr);
                Ok(output)
            }
            Ok(status) => {
                error!(command = %command, status = %status, "{}{}", output.stdout, output.stderr);
                Err(UpdateError::ToolFailure(format!("{} exited with {}", command, status)))
            }
            Err(e) => {
                error!(command = %command, error = %e, "{}{}", output.stdout, output.stderr);
                Err(e)
            }
        }
    }

    /// Run with stdout and stderr attached to this process
    pub fn run_inherit(&self, ctx: &Context, dir: &Path) -> Result<(), UpdateError> {
        ctx.check()?;
        let mut child = self
            .command(dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| UpdateError::ToolFailure(format!("{}: {}", self.program, e)))?;
        let status = wait(ctx, &mut child)?;
        if status.success() {
            Ok(())
        } else {
            Err(UpdateError::ToolFailure(format!(
                "{} exited with {}",
                self.display(),
                status
            )))
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

fn wait(ctx: &Context, child: &mut Child) -> Result<ExitStatus, UpdateError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if ctx.is_done() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(UpdateError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Run a shell snippet with `/bin/sh -c` in `dir`, output attached to this process
pub fn run_script(ctx: &Context, dir: &Path, label: &str, script: &str) -> Result<(), UpdateError> {
    if script.trim().is_empty() {
        return Ok(());
    }
    println!("--- start {} update script ---", label);
    Cmd::new("/bin/sh").arg("-c").arg(script).run_inherit(ctx, dir)?;
    println!("--- end {} update script ---", label);
    Ok(())
}
