//! PowerShell certificate provider (`Cert:` drive).

use anyhow::{Context, Result};
use std::process::Stdio;

use super::{GatewayOutput, OutputMode, StoreGateway};
use crate::command::{InstallRequest, RemoveRequest, StoreOperation};
use crate::location::StoreAddress;

pub struct PowerShellGateway {
    program: String,
}

impl PowerShellGateway {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Windows PowerShell on Windows, PowerShell 7 elsewhere.
    pub fn default_program() -> &'static str {
        if cfg!(windows) {
            "powershell.exe"
        } else {
            "pwsh"
        }
    }

    fn run(&self, op: &StoreOperation, mode: OutputMode) -> Result<GatewayOutput> {
        let mut cmd = op.render(&self.program).to_command();
        cmd.stdin(Stdio::null());
        match mode {
            OutputMode::Stream => {
                let status = cmd
                    .status()
                    .with_context(|| format!("run {}", self.program))?;
                Ok(GatewayOutput {
                    success: status.success(),
                    output: String::new(),
                })
            }
            OutputMode::Capture => {
                let out = cmd
                    .output()
                    .with_context(|| format!("run {}", self.program))?;
                let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                Ok(GatewayOutput {
                    success: out.status.success(),
                    output,
                })
            }
        }
    }
}

impl StoreGateway for PowerShellGateway {
    fn install(&self, request: &InstallRequest, mode: OutputMode) -> Result<GatewayOutput> {
        self.run(&StoreOperation::Install(request.clone()), mode)
    }

    fn remove(&self, request: &RemoveRequest, mode: OutputMode) -> Result<GatewayOutput> {
        self.run(&StoreOperation::Remove(request.clone()), mode)
    }

    fn list(&self, store: &StoreAddress) -> Result<Vec<String>> {
        let out = self.run(&StoreOperation::List(*store), OutputMode::Capture)?;
        if !out.success {
            anyhow::bail!("listing {store} failed: {}", out.output.trim());
        }
        Ok(out
            .output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}
