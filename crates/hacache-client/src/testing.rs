//! In-process RESP server used by the unit tests.
//!
//! Speaks just enough of the protocol for the client: connection setup
//! (`AUTH`, `CLIENT`, `SELECT`), `PING`, `SET [EX]`, `GET`, `KEYS` and
//! `SENTINEL get-master-addr-by-name`. Anything else is answered with
//! `-ERR unknown command`.

use std::collections::HashMap;
use std::io;
use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hacache_domain::{CacheSettings, NodeAddress, SentinelSettings};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    master: Option<NodeAddress>,
    commands: Vec<String>,
    auth: Vec<Vec<String>>,
    failures: HashMap<String, String>,
    stalled: bool,
}

struct Entry {
    value: Vec<u8>,
    expiry_secs: Option<u64>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// A fake cache node that can also answer as a sentinel
pub struct FakeRedis {
    address: NodeAddress,
    state: Arc<Mutex<State>>,
    accept: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));

        let shared = state.clone();
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, shared.clone()));
            }
        });

        Self {
            address: NodeAddress::new("127.0.0.1", port),
            state,
            accept,
        }
    }

    pub fn address(&self) -> NodeAddress {
        self.address.clone()
    }

    /// Primary reported to `SENTINEL get-master-addr-by-name`
    pub fn set_master(&self, master: Option<&NodeAddress>) {
        self.state.lock().unwrap().master = master.cloned();
    }

    /// Reply to `command` with the given error line
    pub fn fail_command(&self, command: &str, error: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(command.to_ascii_uppercase(), error.to_string());
    }

    /// Stop answering anything
    pub fn stall(&self) {
        self.state.lock().unwrap().stalled = true;
    }

    pub fn value(&self, key: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| String::from_utf8_lossy(&e.value).into_owned())
    }

    /// `EX` seconds the key was written with
    pub fn expiry_secs(&self, key: &str) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .entries
            .get(key)
            .and_then(|e| e.expiry_secs)
    }

    /// Upper-cased command names received so far
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Arguments of every `AUTH` received so far
    pub fn auth_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().auth.clone()
    }
}

/// Log sink for a `tracing_subscriber::fmt` writer
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Subscriber writing every event at `DEBUG` and above into this sink
    pub fn subscriber(&self) -> tracing::Dispatch {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish()
            .into()
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

/// A loopback port nothing listens on
pub fn closed_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// HA settings whose sentinels (and query host) all point at `sentinel`
pub fn ha_settings(sentinel: &FakeRedis) -> CacheSettings {
    let address = sentinel.address();
    CacheSettings::high_availability(SentinelSettings::new(
        "mymaster",
        [
            address.host.clone(),
            address.host.clone(),
            address.host.clone(),
        ],
        address.port,
    ))
    .with_operation_timeout(Duration::from_secs(2))
}

/// Standalone settings pointing at `node`
pub fn standalone_settings(node: &FakeRedis) -> CacheSettings {
    let address = node.address();
    CacheSettings::standalone(address.host, address.port)
        .with_operation_timeout(Duration::from_secs(2))
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        while let Some((args, used)) = parse_command(&buf) {
            buf.drain(..used);
            let Some(reply) = respond(&state, &args) else {
                continue;
            };
            if stream.write_all(&reply).await.is_err() {
                return;
            }
        }
    }
}

fn parse_command(buf: &[u8]) -> Option<(Vec<Vec<u8>>, usize)> {
    let (count, mut pos) = read_length(buf, 0, b'*')?;
    let mut args = Vec::with_capacity(count);

    for _ in 0..count {
        let (len, next) = read_length(buf, pos, b'$')?;
        if buf.len() < next + len + 2 {
            return None;
        }
        args.push(buf[next..next + len].to_vec());
        pos = next + len + 2;
    }

    Some((args, pos))
}

fn read_length(buf: &[u8], pos: usize, prefix: u8) -> Option<(usize, usize)> {
    if *buf.get(pos)? != prefix {
        return None;
    }
    let end = pos + buf[pos..].windows(2).position(|w| w == b"\r\n")?;
    let len = std::str::from_utf8(&buf[pos + 1..end]).ok()?.parse().ok()?;
    Some((len, end + 2))
}

fn respond(state: &Mutex<State>, args: &[Vec<u8>]) -> Option<Vec<u8>> {
    let mut state = state.lock().unwrap();
    if state.stalled {
        return None;
    }

    let name = String::from_utf8_lossy(args.first()?).to_ascii_uppercase();
    state.commands.push(name.clone());

    if let Some(error) = state.failures.get(&name) {
        return Some(format!("-{error}\r\n").into_bytes());
    }

    let arg = |i: usize| args.get(i).map(|a| String::from_utf8_lossy(a).into_owned());

    let reply = match name.as_str() {
        "AUTH" => {
            let credentials = args[1..]
                .iter()
                .map(|a| String::from_utf8_lossy(a).into_owned())
                .collect();
            state.auth.push(credentials);
            b"+OK\r\n".to_vec()
        }
        "CLIENT" | "SELECT" => b"+OK\r\n".to_vec(),
        "PING" => args.get(1).map_or_else(|| b"+PONG\r\n".to_vec(), |a| bulk(a)),
        "SET" => {
            let expiry_secs = match arg(3).map(|a| a.to_ascii_uppercase()).as_deref() {
                Some("EX") => arg(4).and_then(|s| s.parse().ok()),
                _ => None,
            };
            let entry = Entry {
                value: args.get(2).cloned().unwrap_or_default(),
                expiry_secs,
                expires_at: expiry_secs.map(|s| Instant::now() + Duration::from_secs(s)),
            };
            state.entries.insert(arg(1).unwrap_or_default(), entry);
            b"+OK\r\n".to_vec()
        }
        "GET" => match state.entries.get(&arg(1).unwrap_or_default()) {
            Some(entry) if entry.is_live() => bulk(&entry.value),
            _ => b"$-1\r\n".to_vec(),
        },
        "KEYS" => {
            let pattern = arg(1).unwrap_or_default();
            let keys: Vec<&String> = state
                .entries
                .iter()
                .filter(|(key, entry)| entry.is_live() && glob_match(pattern.as_bytes(), key.as_bytes()))
                .map(|(key, _)| key)
                .collect();
            let mut reply = format!("*{}\r\n", keys.len()).into_bytes();
            for key in keys {
                reply.extend(bulk(key.as_bytes()));
            }
            reply
        }
        "SENTINEL" => match &state.master {
            Some(master) => {
                let mut reply = b"*2\r\n".to_vec();
                reply.extend(bulk(master.host.as_bytes()));
                reply.extend(bulk(master.port.to_string().as_bytes()));
                reply
            }
            None => b"*-1\r\n".to_vec(),
        },
        other => format!("-ERR unknown command '{other}'\r\n").into_bytes(),
    };

    Some(reply)
}

fn bulk(value: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", value.len()).into_bytes();
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
    out
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let state = Mutex::new(State::default());

        let reply = respond(&state, &command(&["SETEX", "k", "60", "v"])).unwrap();

        assert_eq!(reply, b"-ERR unknown command 'SETEX'\r\n");
        assert!(state.lock().unwrap().entries.is_empty());
    }

    #[test]
    fn test_set_with_ex_is_stored() {
        let state = Mutex::new(State::default());

        let reply = respond(&state, &command(&["SET", "k", "v", "EX", "60"])).unwrap();

        assert_eq!(reply, b"+OK\r\n");
        assert_eq!(state.lock().unwrap().entries["k"].expiry_secs, Some(60));
    }
}
