use std::io;
use std::process::{self, Command};

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Everything the command printed, stdout first.
    pub fn diagnostic(&self) -> String {
        let mut text = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }
        text
    }

    /// tc create/delete primitives print nothing when they succeed.
    pub fn is_clean(&self) -> bool {
        self.success && self.stdout.trim().is_empty() && self.stderr.trim().is_empty()
    }
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            success: value.status.success(),
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

pub trait Shell {
    fn execute(&self, command: &str) -> io::Result<Output>;
}

impl<S: Shell + ?Sized> Shell for &S {
    fn execute(&self, command: &str) -> io::Result<Output> {
        (**self).execute(command)
    }
}

/// Runs commands directly, splitting arguments on whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn execute(&self, command: &str) -> io::Result<Output> {
        let mut words = command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        log::debug!("running: {command}");
        let output: Output = Command::new(program).args(words).output()?.into();
        if !output.success {
            log::debug!("`{command}` exited with failure: {}", output.diagnostic());
        }
        Ok(output)
    }
}

#[test]
fn diagnostic_joins_streams() {
    let out = Output {
        success: false,
        stdout: String::new(),
        stderr: "RTNETLINK answers: File exists\n".into(),
    };
    assert_eq!(out.diagnostic(), "RTNETLINK answers: File exists");
    assert!(!out.is_clean());

    let out = Output {
        success: true,
        stdout: "\n".into(),
        stderr: String::new(),
    };
    assert!(out.is_clean());
}

#[test]
fn empty_command_is_rejected() {
    let err = SystemShell.execute("   ").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}
