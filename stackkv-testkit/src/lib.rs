//! # Test Servers
//!
//! Purpose: In-process RESP2 servers for the workspace's integration tests.
//!
//! `FakeServer` answers every command through a shared handler; each accepted
//! connection runs on its own thread. `CLIENT ...` commands sent during
//! connection setup are acknowledged automatically and not recorded.
//! `StackEmulator` is a handler with just enough Redis Stack behaviour for
//! end-to-end runs.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value as Json;
use stackkv_common::{ConnectionSettings, SettingsOverrides};

/// Reply written back to the client.
#[derive(Debug, Clone)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Simple("OK".into())
    }

    pub fn bulk(text: impl AsRef<str>) -> Self {
        Reply::Bulk(Some(text.as_ref().as_bytes().to_vec()))
    }

    pub fn nil() -> Self {
        Reply::Bulk(None)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Simple(text) => {
                out.push(b'+');
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Error(text) => {
                out.push(b'-');
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Reply::Integer(value) => {
                out.extend_from_slice(format!(":{value}\r\n").as_bytes());
            }
            Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            Reply::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

pub type Handler = Arc<dyn Fn(&[String]) -> Reply + Send + Sync>;

/// Handle to a running fake server.
pub struct FakeServer {
    pub port: u16,
    connections: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeServer {
    pub fn spawn(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(Vec::new()));

        let accepted = connections.clone();
        let log = commands.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accepted.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                let log = log.clone();
                thread::spawn(move || serve(stream, handler, log));
            }
        });

        FakeServer {
            port,
            connections,
            commands,
        }
    }

    pub fn settings(&self, password: Option<&str>) -> ConnectionSettings {
        let overrides = SettingsOverrides {
            host: Some("127.0.0.1".into()),
            port: Some(self.port),
            password: password.map(str::to_string),
        };
        ConnectionSettings::resolve(overrides, |_: &str| None).expect("settings")
    }

    /// Number of TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Commands received so far, excluding connection setup.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().expect("command log").clone()
    }

    pub fn last_command(&self) -> Vec<String> {
        self.commands().pop().unwrap_or_default()
    }
}

fn serve(stream: TcpStream, handler: Handler, log: Arc<Mutex<Vec<Vec<String>>>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut writer = stream.try_clone().expect("clone");
    let mut reader = BufReader::new(stream);
    while let Ok(args) = read_command(&mut reader) {
        let reply = if args.first().is_some_and(|cmd| cmd.eq_ignore_ascii_case("CLIENT")) {
            Reply::ok()
        } else {
            log.lock().expect("command log").push(args.clone());
            handler(&args)
        };
        let mut out = Vec::new();
        reply.encode(&mut out);
        if writer.write_all(&out).and_then(|_| writer.flush()).is_err() {
            break;
        }
    }
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<String>> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?;
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?;
        if line.first() != Some(&b'$') {
            return Err(invalid("expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(invalid("missing crlf"));
        }
        args.push(String::from_utf8_lossy(&data).into_owned());
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| invalid("digit"))
}

fn invalid(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.to_string())
}

/// A port nothing is listening on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

/// Minimal Redis Stack stand-in: strings, hashes, RediSearch over TEXT
/// fields (case-insensitive substring match) and RedisJSON with dotted
/// `$` paths.
#[derive(Default)]
pub struct StackEmulator {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    strings: HashMap<String, String>,
    hashes: HashMap<String, Vec<(String, String)>>,
    json: HashMap<String, Json>,
    indexes: HashMap<String, Index>,
}

struct Index {
    prefix: String,
    text_fields: Vec<String>,
}

impl StackEmulator {
    pub fn spawn() -> FakeServer {
        let emulator = Arc::new(StackEmulator::default());
        FakeServer::spawn(Arc::new(move |args: &[String]| emulator.handle(args)))
    }

    /// Answers one command. Public so tests can wrap the emulator and
    /// override individual commands.
    pub fn handle(&self, args: &[String]) -> Reply {
        let mut state = self.state.lock().expect("emulator state");
        let name = args[0].to_ascii_uppercase();
        let rest = &args[1..];
        match name.as_str() {
            "PING" => Reply::Simple("PONG".into()),
            "INFO" => Reply::bulk(
                "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\n\r\n# Clients\r\nconnected_clients:1\r\n\r\n# Memory\r\nused_memory:1048576\r\n",
            ),
            "MODULE" => Reply::Array(vec![module("search", 20811), module("ReJSON", 20606)]),
            "SET" => {
                state.strings.insert(rest[0].clone(), rest[1].clone());
                Reply::ok()
            }
            "GET" => match state.strings.get(&rest[0]) {
                Some(value) => Reply::bulk(value),
                None => Reply::nil(),
            },
            "DEL" => {
                let removed = rest
                    .iter()
                    .filter(|key| {
                        let a = state.strings.remove(*key).is_some();
                        let b = state.hashes.remove(*key).is_some();
                        let c = state.json.remove(*key).is_some();
                        a || b || c
                    })
                    .count();
                Reply::Integer(removed as i64)
            }
            "HSET" => {
                let record = state.hashes.entry(rest[0].clone()).or_default();
                let mut added = 0;
                for pair in rest[1..].chunks_exact(2) {
                    match record.iter_mut().find(|(field, _)| *field == pair[0]) {
                        Some(slot) => slot.1 = pair[1].clone(),
                        None => {
                            record.push((pair[0].clone(), pair[1].clone()));
                            added += 1;
                        }
                    }
                }
                Reply::Integer(added)
            }
            "FT.CREATE" => {
                if state.indexes.contains_key(&rest[0]) {
                    return Reply::Error("Index already exists".into());
                }
                let prefix = rest[5].clone();
                let text_fields = rest
                    .windows(2)
                    .filter(|pair| pair[1].eq_ignore_ascii_case("TEXT"))
                    .map(|pair| pair[0].clone())
                    .collect();
                state.indexes.insert(rest[0].clone(), Index { prefix, text_fields });
                Reply::ok()
            }
            "FT.DROPINDEX" => match state.indexes.remove(&rest[0]) {
                Some(_) => Reply::ok(),
                None => Reply::Error("Unknown Index name".into()),
            },
            "FT.SEARCH" => search(&state, rest),
            "JSON.SET" => json_set(&mut state, rest),
            "JSON.GET" => json_get(&state, rest),
            _ => Reply::Error(format!("ERR unknown command '{}'", args[0])),
        }
    }
}

fn module(name: &str, version: i64) -> Reply {
    Reply::Array(vec![
        Reply::bulk("name"),
        Reply::bulk(name),
        Reply::bulk("ver"),
        Reply::Integer(version),
        Reply::bulk("args"),
        Reply::Array(vec![]),
    ])
}

fn search(state: &State, rest: &[String]) -> Reply {
    let Some(index) = state.indexes.get(&rest[0]) else {
        return Reply::Error(format!("{}: no such index", rest[0]));
    };
    let query = rest[1].to_lowercase();
    let with_scores = rest.iter().any(|arg| arg.eq_ignore_ascii_case("WITHSCORES"));

    let mut hits: Vec<(&String, &Vec<(String, String)>)> = state
        .hashes
        .iter()
        .filter(|(key, _)| key.starts_with(&index.prefix))
        .filter(|(_, fields)| {
            query == "*"
                || fields.iter().any(|(field, value)| {
                    index.text_fields.contains(field) && value.to_lowercase().contains(&query)
                })
        })
        .collect();
    hits.sort_by(|a, b| a.0.cmp(b.0));

    let mut items = vec![Reply::Integer(hits.len() as i64)];
    for (key, fields) in hits {
        items.push(Reply::bulk(key));
        if with_scores {
            items.push(Reply::bulk("1"));
        }
        items.push(Reply::Array(
            fields
                .iter()
                .flat_map(|(field, value)| [Reply::bulk(field), Reply::bulk(value)])
                .collect(),
        ));
    }
    Reply::Array(items)
}

/// Converts a dotted `$` path into a JSON pointer.
fn pointer(path: &str) -> Option<String> {
    let path = path.strip_prefix('$')?;
    Some(
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("/{segment}"))
            .collect(),
    )
}

fn json_set(state: &mut State, rest: &[String]) -> Reply {
    let (key, path, raw) = (&rest[0], &rest[1], &rest[2]);
    let Ok(value) = serde_json::from_str::<Json>(raw) else {
        return Reply::Error("ERR expected value".into());
    };
    let Some(target) = pointer(path) else {
        return Reply::Error("ERR unsupported path".into());
    };
    let Some((parent, last)) = target.rsplit_once('/') else {
        state.json.insert(key.clone(), value);
        return Reply::ok();
    };
    let Some(document) = state.json.get_mut(key.as_str()) else {
        return Reply::Error("ERR new objects must be created at the root".into());
    };
    match document.pointer_mut(parent).and_then(Json::as_object_mut) {
        Some(object) => {
            object.insert(last.to_string(), value);
            Reply::ok()
        }
        None => Reply::nil(),
    }
}

fn json_get(state: &State, rest: &[String]) -> Reply {
    let Some(document) = state.json.get(&rest[0]) else {
        return Reply::nil();
    };
    let Some(path) = rest.get(1) else {
        return Reply::bulk(document.to_string());
    };
    let Some(target) = pointer(path) else {
        return Reply::Error("ERR unsupported path".into());
    };
    let matches: Vec<Json> = document.pointer(&target).into_iter().cloned().collect();
    Reply::bulk(Json::Array(matches).to_string())
}
