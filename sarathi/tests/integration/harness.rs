//! Loopback receiver standing in for the teleop server.
//!
//! Accepts any number of connections on 127.0.0.1 and records everything
//! each one sends until EOF.

use parking_lot::Mutex;
use sarathi::audio::{MicrophoneSession, MicrophoneSource};
use std::io::{self, Read};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Bytes received on one accepted connection.
#[derive(Clone, Debug, Default)]
pub struct Received {
    pub bytes: Vec<u8>,
    pub eof: bool,
}

impl Received {
    /// Complete lines parsed as JSON.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_slice(line).ok())
            .collect()
    }
}

struct Slot {
    received: Arc<Mutex<Received>>,
    /// Server side of the connection; `None` once hung up
    stream: Option<TcpStream>,
}

pub struct TestReceiver {
    addr: String,
    slots: Arc<Mutex<Vec<Slot>>>,
}

impl TestReceiver {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr").to_string();
        let slots: Arc<Mutex<Vec<Slot>>> = Arc::new(Mutex::new(Vec::new()));

        let accept_slots = Arc::clone(&slots);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let received = Arc::new(Mutex::new(Received::default()));
                let Ok(handle) = stream.try_clone() else { break };
                accept_slots.lock().push(Slot {
                    received: Arc::clone(&received),
                    stream: Some(handle),
                });

                thread::spawn(move || {
                    let mut chunk = [0u8; 1024];
                    loop {
                        match stream.read(&mut chunk) {
                            Ok(0) | Err(_) => break,
                            Ok(n) => received.lock().bytes.extend_from_slice(&chunk[..n]),
                        }
                    }
                    received.lock().eof = true;
                });
            }
        });

        Self { addr, slots }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn connections(&self) -> Vec<Received> {
        self.slots
            .lock()
            .iter()
            .map(|s| s.received.lock().clone())
            .collect()
    }

    /// Hang up on every open connection, as a restarting server would.
    ///
    /// The socket is fully closed, so further client writes are reset.
    pub fn drop_connections(&self) {
        for slot in self.slots.lock().iter_mut() {
            if let Some(stream) = slot.stream.take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }

    /// Poll until `cond` holds or `timeout` passes.
    pub fn wait_for(&self, timeout: Duration, cond: impl Fn(&[Received]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond(&self.connections()) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond(&self.connections())
    }
}

/// Microphone producing `frames` frames of `frame_len` counting bytes, then
/// end of stream.
pub struct FrameMicrophone {
    pub frames: usize,
    pub frame_len: usize,
}

struct FrameSession {
    left: usize,
    frame_len: usize,
    next: u8,
}

impl MicrophoneSource for FrameMicrophone {
    fn permission_granted(&self) -> bool {
        true
    }

    fn open(&self) -> sarathi::Result<Box<dyn MicrophoneSession>> {
        Ok(Box::new(FrameSession {
            left: self.frames,
            frame_len: self.frame_len,
            next: 0,
        }))
    }
}

impl MicrophoneSession for FrameSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.left == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.left -= 1;
        let n = self.frame_len.min(buf.len());
        for b in &mut buf[..n] {
            *b = self.next;
            self.next = self.next.wrapping_add(1);
        }
        Ok(n)
    }

    fn close(&mut self) {}
}
