//! Shared mock-server plumbing for the integration tests.
//!
//! The server accepts a fixed number of connections and hands every parsed
//! command to the test's handler, which writes the scripted reply.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Handler invoked per command: (connection index, command index, args).
pub type CommandHandler = fn(usize, usize, Vec<Vec<u8>>, &mut TcpStream);

pub struct MockServer {
    pub addr: String,
    accepted: Arc<AtomicUsize>,
}

impl MockServer {
    /// Number of connections the server has accepted so far. Doubles as an
    /// identity check: a reused connection does not bump it.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Polls until `n` connections have been accepted. Accepts run on a
    /// separate thread, so a freshly dialed connection may not be counted
    /// yet at the instant `connect` returns.
    pub fn wait_accepted(&self, n: usize) {
        for _ in 0..200 {
            if self.accepted() >= n {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("server accepted {} connections, expected {}", self.accepted(), n);
    }
}

/// Spawns a scripted server that serves up to `conns` connections, each on
/// its own thread so parked connections never block new accepts.
pub fn spawn_server(conns: usize, handler: CommandHandler) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    thread::spawn(move || {
        for conn_idx in 0..conns {
            let (stream, _) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            counter.fetch_add(1, Ordering::SeqCst);
            thread::spawn(move || serve_connection(conn_idx, stream, handler));
        }
    });

    MockServer { addr, accepted }
}

fn serve_connection(conn_idx: usize, mut stream: TcpStream, handler: CommandHandler) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut reader = match stream.try_clone() {
        Ok(clone) => BufReader::new(clone),
        Err(_) => return,
    };

    let mut cmd_idx = 0;
    while let Ok(Some(args)) = read_command(&mut reader) {
        handler(conn_idx, cmd_idx, args, &mut stream);
        cmd_idx += 1;
    }
}

/// Reads one command array. `Ok(None)` when the client closed the
/// connection cleanly.
fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Option<Vec<Vec<u8>>>> {
    let mut line = Vec::new();
    if read_line(reader, &mut line)?.is_none() {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(invalid("expected array"));
    }
    let count = parse_usize(&line[1..])?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?.ok_or_else(|| invalid("eof inside command"))?;
        match line.first() {
            Some(&b'$') => {
                let len = parse_usize(&line[1..])?;
                let mut data = vec![0u8; len];
                reader.read_exact(&mut data)?;
                let mut crlf = [0u8; 2];
                reader.read_exact(&mut crlf)?;
                if crlf != [b'\r', b'\n'] {
                    return Err(invalid("missing crlf"));
                }
                args.push(data);
            }
            // Integer arguments show up for expirations; keep their text.
            Some(&b':') => args.push(line[1..].to_vec()),
            _ => return Err(invalid("expected bulk or integer")),
        }
    }
    Ok(Some(args))
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(invalid("invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    if data.is_empty() {
        return Err(invalid("empty integer"));
    }
    let mut value = 0usize;
    for &b in data {
        if !b.is_ascii_digit() {
            return Err(invalid("bad digit"));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as usize);
    }
    Ok(value)
}

fn invalid(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

pub fn write_simple(stream: &mut TcpStream, msg: &str) {
    let _ = stream.write_all(b"+");
    let _ = stream.write_all(msg.as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn write_error(stream: &mut TcpStream, msg: &str) {
    let _ = stream.write_all(b"-");
    let _ = stream.write_all(msg.as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn write_integer(stream: &mut TcpStream, value: i64) {
    let _ = stream.write_all(b":");
    let _ = stream.write_all(value.to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn write_bulk(stream: &mut TcpStream, data: &[u8]) {
    let _ = stream.write_all(b"$");
    let _ = stream.write_all(data.len().to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn write_null_bulk(stream: &mut TcpStream) {
    let _ = stream.write_all(b"$-1\r\n");
    let _ = stream.flush();
}

pub fn write_raw(stream: &mut TcpStream, bytes: &[u8]) {
    let _ = stream.write_all(bytes);
    let _ = stream.flush();
}
