//! Warehouse access through an external command-line client.
//!
//! Each query is one child process: the SQL text is passed as the last
//! argument and the JSON result set is read from stdout. Authentication is
//! the client's business.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::{SettingsError, SettingsResult};
use crate::warehouse::rows::{parse_rows, Row};
use crate::warehouse::Warehouse;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const REAP_TIMEOUT: Duration = Duration::from_secs(5);
const THREAD_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_OUTPUT_BYTES: u64 = 256 * 1024 * 1024;
const MAX_STDERR_BYTES: u64 = 64 * 1024;

#[derive(Clone, Debug)]
pub struct CliWarehouse {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliWarehouse {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Run the client with `sql` and return its stdout.
    pub fn run(&self, sql: &str) -> SettingsResult<String> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(sql)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SettingsError::Warehouse(format!("failed to start {}: {e}", self.program))
            })?;

        let stdout_reader = spawn_reader(child.stdout.take(), MAX_OUTPUT_BYTES);
        let stderr_reader = spawn_reader(child.stderr.take(), MAX_STDERR_BYTES);

        let deadline = started + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    return Err(SettingsError::Warehouse(format!(
                        "failed to poll {}: {e}",
                        self.program
                    )))
                }
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = reap(&mut child);
                drop(child);
                abandon(stdout_reader);
                abandon(stderr_reader);
                warn!(
                    "Warehouse query cancelled after {}s",
                    self.timeout.as_secs()
                );
                return Err(SettingsError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        debug!(
            "Warehouse query finished with {status} in {}ms",
            started.elapsed().as_millis()
        );

        if !status.success() {
            let detail = stderr.trim();
            return Err(SettingsError::Warehouse(format!(
                "{} exited with {status}{}",
                self.program,
                if detail.is_empty() {
                    String::new()
                } else {
                    format!(": {detail}")
                }
            )));
        }
        Ok(stdout)
    }
}

impl Warehouse for CliWarehouse {
    fn query(&self, sql: &str) -> SettingsResult<Vec<Row>> {
        let output = self.run(sql)?;
        parse_rows(&output)
    }
}

fn spawn_reader<R>(pipe: Option<R>, limit: u64) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.take(limit).read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default()
}

/// Wait briefly for a reader whose process was killed; a descendant holding
/// the pipe open must not hang the caller.
fn abandon(handle: Option<JoinHandle<Vec<u8>>>) {
    let Some(handle) = handle else {
        return;
    };
    let deadline = Instant::now() + THREAD_JOIN_TIMEOUT;
    while Instant::now() < deadline {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn reap(child: &mut Child) -> Option<ExitStatus> {
    let deadline = Instant::now() + REAP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(_) => return None,
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
