//! Process/port correlation for "why is my connection failing" triage.

mod process_table;
mod socket_table;

pub use process_table::{ProcessInfo, ProcessTable, SysinfoProcessTable};
pub use socket_table::{parse_netstat, parse_proc_net, Listener, Protocol, SocketTable, SystemSocketTable};

use crate::reconcile::{basename, executable_stem};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub name: String,
    pub is_running: bool,
    /// Matching pids; empty when not running
    pub pids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub number: u16,
    pub is_in_use: bool,
}

/// Result of one check. A half is `None` when it was not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Interpretation of a check where both halves are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    /// Process running and port bound
    Healthy,
    /// Process running but the port is free: it failed to bind
    BindFailure,
    /// Port bound but the named process is absent: something else owns the port
    PortOwnedByOther,
    /// Neither: never started, or terminated (possibly by a security product) before binding
    NotStarted,
}

impl Diagnosis {
    pub fn from_check(check: &CorrelationCheck) -> Option<Self> {
        let (process, port) = (check.process.as_ref()?, check.port.as_ref()?);
        Some(match (process.is_running, port.is_in_use) {
            (true, true) => Diagnosis::Healthy,
            (true, false) => Diagnosis::BindFailure,
            (false, true) => Diagnosis::PortOwnedByOther,
            (false, false) => Diagnosis::NotStarted,
        })
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Diagnosis::Healthy => "Process is running and the port is bound.",
            Diagnosis::BindFailure => {
                "Process is running but the port is free: it failed to bind (check its configuration)."
            }
            Diagnosis::PortOwnedByOther => {
                "Port is in use but the process was not found: a different process owns the port."
            }
            Diagnosis::NotStarted => {
                "Neither running nor bound: the process never started or was terminated, possibly by a security product."
            }
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

pub struct Correlator {
    processes: Box<dyn ProcessTable>,
    sockets: Box<dyn SocketTable>,
}

impl Correlator {
    /// Live process and socket tables; `timeout` bounds `netstat`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_tables(
            Box::new(SysinfoProcessTable),
            Box::new(SystemSocketTable::new(timeout)),
        )
    }

    pub fn with_tables(processes: Box<dyn ProcessTable>, sockets: Box<dyn SocketTable>) -> Self {
        Self { processes, sockets }
    }

    /// Check each requested half independently. Never fails; enumeration
    /// problems are reported in `warnings`.
    pub fn check(&self, process: Option<&str>, port: Option<u16>) -> CorrelationCheck {
        let mut check = CorrelationCheck::default();

        if let Some(name) = process.map(str::trim).filter(|n| !n.is_empty()) {
            let pids = find_process(&self.processes.processes(), name);
            check.process = Some(ProcessStatus {
                name: name.to_string(),
                is_running: !pids.is_empty(),
                pids,
            });
        }

        if let Some(number) = port {
            let is_in_use = match self.sockets.listeners() {
                Ok(listeners) => listeners.iter().any(|l| l.port == number),
                Err(e) => {
                    tracing::warn!(port = number, error = %e, "Could not enumerate listening sockets");
                    check
                        .warnings
                        .push(format!("Could not enumerate listening sockets: {}", e));
                    false
                }
            };
            check.port = Some(PortStatus { number, is_in_use });
        }

        check
    }
}

/// Pids matching `name`: exact (case-insensitive, executable suffix ignored)
/// first, substring over name, executable and command line otherwise.
pub fn find_process(processes: &[ProcessInfo], name: &str) -> Vec<u32> {
    let wanted = executable_stem(name);
    let exact: Vec<u32> = processes
        .iter()
        .filter(|p| {
            executable_stem(&p.name) == wanted
                || p.exe
                    .as_deref()
                    .is_some_and(|exe| executable_stem(basename(exe)) == wanted)
        })
        .map(|p| p.pid)
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    let needle = name.to_lowercase();
    processes
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.exe
                    .as_deref()
                    .is_some_and(|exe| exe.to_lowercase().contains(&needle))
                || p.cmdline.to_lowercase().contains(&needle)
        })
        .map(|p| p.pid)
        .collect()
}
