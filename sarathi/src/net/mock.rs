//! Mock connector for unit testing

use super::{Connector, LinkStream};
use crate::error::{Result, SarathiError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the next connect attempt does.
#[derive(Clone, Copy, Debug)]
pub enum ConnectPlan {
    Refuse,
    /// Accept; the stream fails every write after `fail_after_writes` writes
    Accept { fail_after_writes: Option<usize> },
}

/// Everything a connection received.
#[derive(Clone, Debug)]
pub struct MockConnection {
    pub written: Vec<u8>,
    pub closed: bool,
    pub opened_at: Instant,
}

impl MockConnection {
    /// Written bytes split into parsed JSON lines.
    pub fn records(&self) -> Vec<serde_json::Value> {
        self.written
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).expect("mock received invalid JSON"))
            .collect()
    }
}

struct MockInner {
    plans: VecDeque<ConnectPlan>,
    attempts: Vec<Instant>,
    connections: Vec<Arc<Mutex<MockConnection>>>,
}

/// Scripted connector; unscripted attempts are accepted.
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Mutex<MockInner>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                plans: VecDeque::new(),
                attempts: Vec::new(),
                connections: Vec::new(),
            })),
        }
    }

    /// Queue the behavior of the next unscripted connect attempt
    pub fn push_plan(&self, plan: ConnectPlan) {
        self.inner.lock().plans.push_back(plan);
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.inner.lock().attempts.clone()
    }

    /// Snapshot of every accepted connection, oldest first
    pub fn connections(&self) -> Vec<MockConnection> {
        self.inner
            .lock()
            .connections
            .iter()
            .map(|c| c.lock().clone())
            .collect()
    }

    /// Poll until `cond` holds or `timeout` passes.
    pub fn wait_for(&self, timeout: Duration, cond: impl Fn(&[MockConnection]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond(&self.connections()) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond(&self.connections())
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    fn endpoint(&self) -> &str {
        "mock:0"
    }

    fn connect(&self, _timeout: Duration) -> Result<Box<dyn LinkStream>> {
        let mut inner = self.inner.lock();
        inner.attempts.push(Instant::now());

        let plan = inner.plans.pop_front().unwrap_or(ConnectPlan::Accept {
            fail_after_writes: None,
        });
        match plan {
            ConnectPlan::Refuse => Err(SarathiError::ConnectRefused("mock:0".into())),
            ConnectPlan::Accept { fail_after_writes } => {
                let conn = Arc::new(Mutex::new(MockConnection {
                    written: Vec::new(),
                    closed: false,
                    opened_at: Instant::now(),
                }));
                inner.connections.push(Arc::clone(&conn));
                Ok(Box::new(MockStream {
                    conn,
                    writes_left: fail_after_writes,
                }))
            }
        }
    }
}

struct MockStream {
    conn: Arc<Mutex<MockConnection>>,
    writes_left: Option<usize>,
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut conn = self.conn.lock();
        if conn.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        match self.writes_left.as_mut() {
            Some(0) => return Err(io::ErrorKind::BrokenPipe.into()),
            Some(n) => *n -= 1,
            None => {}
        }
        conn.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LinkStream for MockStream {
    fn close(&mut self) -> io::Result<()> {
        self.conn.lock().closed = true;
        Ok(())
    }
}
