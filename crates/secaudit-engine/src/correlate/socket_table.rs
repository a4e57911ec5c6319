//! Listening sockets
//!
//! Linux reads `/proc/net/{tcp,tcp6,udp,udp6}` directly; other platforms (and
//! Linux without procfs) parse `netstat -an`, whose layout differs between
//! Windows and the BSDs.

use crate::collectors::CollectError;
use crate::common::run_tool_checked;
use serde::Serialize;
use std::time::Duration;

/// TCP state code for LISTEN in `/proc/net/tcp*`
const PROC_TCP_LISTEN: &str = "0A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// A TCP socket in LISTEN state or a bound UDP socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub protocol: Protocol,
    pub address: String,
    pub port: u16,
}

pub trait SocketTable: Send + Sync {
    fn listeners(&self) -> Result<Vec<Listener>, CollectError>;
}

pub struct SystemSocketTable {
    timeout: Duration,
}

impl SystemSocketTable {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[cfg(target_os = "linux")]
    fn read_proc_net(&self) -> Result<Vec<Listener>, CollectError> {
        let sources = [
            ("/proc/net/tcp", Protocol::Tcp),
            ("/proc/net/tcp6", Protocol::Tcp),
            ("/proc/net/udp", Protocol::Udp),
            ("/proc/net/udp6", Protocol::Udp),
        ];
        let mut listeners = Vec::new();
        let mut last_error = None;
        let mut any_read = false;
        for (path, protocol) in sources {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    any_read = true;
                    listeners.extend(parse_proc_net(&content, protocol));
                }
                Err(e) => {
                    tracing::debug!(path, error = %e, "Socket table unavailable");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if !any_read => Err(CollectError::Io(e)),
            _ => Ok(listeners),
        }
    }
}

impl SocketTable for SystemSocketTable {
    fn listeners(&self) -> Result<Vec<Listener>, CollectError> {
        #[cfg(target_os = "linux")]
        match self.read_proc_net() {
            Ok(listeners) => return Ok(listeners),
            Err(e) => tracing::debug!(error = %e, "Falling back to netstat"),
        }
        let output = run_tool_checked("netstat", &["-an"], self.timeout)?;
        Ok(parse_netstat(&output.stdout))
    }
}

/// Parse a `/proc/net/{tcp,udp}[6]` table.
pub fn parse_proc_net(content: &str, protocol: Protocol) -> Vec<Listener> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (local, state) = (*fields.get(1)?, *fields.get(3)?);
            let listening = match protocol {
                Protocol::Tcp => state.eq_ignore_ascii_case(PROC_TCP_LISTEN),
                Protocol::Udp => true,
            };
            if !listening {
                return None;
            }
            let (addr_hex, port_hex) = local.split_once(':')?;
            let port = u16::from_str_radix(port_hex, 16).ok()?;
            if port == 0 {
                return None;
            }
            Some(Listener {
                protocol,
                address: decode_proc_address(addr_hex),
                port,
            })
        })
        .collect()
}

/// IPv4 entries are little-endian hex; IPv6 entries are kept as hex.
fn decode_proc_address(hex: &str) -> String {
    if hex.len() == 8 {
        if let Ok(raw) = u32::from_str_radix(hex, 16) {
            return std::net::Ipv4Addr::from(raw.swap_bytes()).to_string();
        }
    }
    hex.to_string()
}

/// Parse `netstat -an` output from Windows, macOS/BSD or Linux net-tools.
pub fn parse_netstat(output: &str) -> Vec<Listener> {
    output
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let proto = tokens.first()?.to_lowercase();
            let protocol = if proto.starts_with("tcp") {
                Protocol::Tcp
            } else if proto.starts_with("udp") {
                Protocol::Udp
            } else {
                return None;
            };
            if protocol == Protocol::Tcp
                && !tokens
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case("LISTEN") || t.eq_ignore_ascii_case("LISTENING"))
            {
                return None;
            }
            // Unix layouts carry Recv-Q and Send-Q before the local address
            let has_queues = tokens.len() >= 4
                && tokens[1].chars().all(|c| c.is_ascii_digit())
                && tokens[2].chars().all(|c| c.is_ascii_digit());
            let local = if has_queues { tokens[3] } else { *tokens.get(1)? };
            let (address, port) = local.rsplit_once([':', '.'])?;
            Some(Listener {
                protocol,
                address: address.to_string(),
                port: port.parse().ok()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_net_tcp_listen_only() {
        let content = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12345 1
   1: 0100007F:0CEA 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 12346 1
   2: 0100007F:1F40 0100007F:A2B4 01 00000000:00000000 00:00000000 00000000  1000        0 12347 1
";
        let listeners = parse_proc_net(content, Protocol::Tcp);
        assert_eq!(listeners.len(), 2);
        assert_eq!(listeners[0].port, 8000);
        assert_eq!(listeners[0].address, "0.0.0.0");
        assert_eq!(listeners[1].port, 3306);
        assert_eq!(listeners[1].address, "127.0.0.1");
    }

    #[test]
    fn test_parse_proc_net_udp_bound() {
        let content = "  sl  local_address rem_address   st
  10: 00000000:A2A1 00000000:0000 07 00000000:00000000
  11: 00000000:0000 00000000:0000 07 00000000:00000000
";
        let listeners = parse_proc_net(content, Protocol::Udp);
        assert_eq!(listeners.len(), 1);
        assert_eq!(listeners[0].port, 41633);
        assert_eq!(listeners[0].protocol, Protocol::Udp);
    }

    #[test]
    fn test_parse_netstat_windows() {
        let output = "
Active Connections

  Proto  Local Address          Foreign Address        State
  TCP    0.0.0.0:8000           0.0.0.0:0              LISTENING
  TCP    127.0.0.1:50123        127.0.0.1:8000         ESTABLISHED
  TCP    [::]:445               [::]:0                 LISTENING
  UDP    0.0.0.0:41641          *:*
";
        let listeners = parse_netstat(output);
        let ports: Vec<u16> = listeners.iter().map(|l| l.port).collect();
        assert_eq!(ports, vec![8000, 445, 41641]);
        assert_eq!(listeners[1].address, "[::]");
    }

    #[test]
    fn test_parse_netstat_macos_and_linux() {
        let output = "Active Internet connections (including servers)
Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
tcp4       0      0  *.8000                 *.*                    LISTEN
tcp4       0      0  192.168.1.5.52311      17.57.146.52.5223      ESTABLISHED
udp4       0      0  *.5353                 *.*
tcp        0      0 0.0.0.0:5432            0.0.0.0:*               LISTEN
";
        let listeners = parse_netstat(output);
        let ports: Vec<u16> = listeners.iter().map(|l| l.port).collect();
        assert_eq!(ports, vec![8000, 5353, 5432]);
        assert_eq!(listeners[0].address, "*");
    }
}
