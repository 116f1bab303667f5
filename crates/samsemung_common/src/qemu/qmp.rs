//! Minimal QMP (QEMU Machine Protocol) client
//!
//! Line-delimited JSON over a Unix socket: greeting, capability
//! negotiation, then request/response pairs. Asynchronous events arriving
//! between a request and its reply are skipped.

use crate::error::{EmungError, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Upper bound for a single reply
const REPLY_TIMEOUT: Duration = Duration::from_secs(30);

const DUMP_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct QmpClient {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl QmpClient {
    /// Connect, read the greeting and enter command mode
    pub async fn connect(socket: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket).await.map_err(|e| {
            EmungError::Qmp(format!("cannot connect to {}: {}", socket.display(), e))
        })?;
        let (read, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read),
            writer,
        };

        let greeting = client.read_message().await?;
        if greeting.get("QMP").is_none() {
            return Err(EmungError::Qmp(format!("unexpected greeting: {}", greeting)));
        }
        debug!("QMP greeting: {}", greeting);

        client.execute("qmp_capabilities", None).await?;
        Ok(client)
    }

    /// Run a command and return its `return` payload
    pub async fn execute(&mut self, command: &str, arguments: Option<Value>) -> Result<Value> {
        let mut request = json!({ "execute": command });
        if let Some(arguments) = arguments {
            request["arguments"] = arguments;
        }

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;

        loop {
            let reply = self.read_message().await?;
            if reply.get("event").is_some() {
                debug!("QMP event: {}", reply);
                continue;
            }
            if let Some(ret) = reply.get("return") {
                return Ok(ret.clone());
            }
            if let Some(error) = reply.get("error") {
                let desc = error
                    .get("desc")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                return Err(EmungError::Qmp(format!("{}: {}", command, desc)));
            }
            return Err(EmungError::Qmp(format!("unexpected reply: {}", reply)));
        }
    }

    /// Write guest memory to `output` as an ELF core
    ///
    /// The dump runs detached inside QEMU and is polled with `query-dump`
    /// until it finishes, so large guests are not cut off by the reply
    /// timeout.
    pub async fn dump_guest_memory(&mut self, output: &Path) -> Result<()> {
        let arguments = json!({
            "paging": false,
            "detach": true,
            "protocol": format!("file:{}", output.display()),
        });
        self.execute("dump-guest-memory", Some(arguments)).await?;

        loop {
            let progress = self.execute("query-dump", None).await?;
            match progress.get("status").and_then(Value::as_str) {
                Some("completed") => return Ok(()),
                Some("failed") => {
                    return Err(EmungError::Qmp("dump-guest-memory failed".to_string()))
                }
                Some(status) => {
                    debug!(
                        "Dump {}: {}/{} bytes",
                        status,
                        progress.get("completed").unwrap_or(&serde_json::Value::Null),
                        progress.get("total").unwrap_or(&serde_json::Value::Null)
                    );
                }
                None => {
                    return Err(EmungError::Qmp(format!(
                        "unexpected query-dump reply: {}",
                        progress
                    )))
                }
            }
            sleep(DUMP_POLL_INTERVAL).await;
        }
    }

    async fn read_message(&mut self) -> Result<Value> {
        let mut line = String::new();
        let read = timeout(REPLY_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .map_err(|_| EmungError::Qmp("timed out waiting for reply".to_string()))??;
        if read == 0 {
            return Err(EmungError::Qmp("connection closed".to_string()));
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::net::UnixListener;

    /// Scripted QMP peer: greeting, then one canned reply per request
    async fn fake_qemu(listener: UnixListener, replies: Vec<&'static str>) -> Vec<Value> {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);
        write
            .write_all(b"{\"QMP\": {\"version\": {}, \"capabilities\": []}}\n")
            .await
            .unwrap();

        let mut requests = Vec::new();
        for reply in replies {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            requests.push(serde_json::from_str(line.trim()).unwrap());
            write.write_all(reply.as_bytes()).await.unwrap();
        }
        requests
    }

    #[tokio::test]
    async fn test_dump_guest_memory_round() {
        let tmp = TempDir::new().unwrap();
        let socket = tmp.path().join("vm.qmp");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(fake_qemu(
            listener,
            vec![
                "{\"return\": {}}\n",
                "{\"event\": \"STOP\", \"timestamp\": {}}\n{\"return\": {}}\n",
                "{\"return\": {\"status\": \"active\", \"completed\": 4096, \"total\": 8192}}\n",
                "{\"return\": {\"status\": \"active\", \"completed\": 8000, \"total\": 8192}}\n",
                "{\"event\": \"DUMP_COMPLETED\", \"timestamp\": {}}\n{\"return\": {\"status\": \"completed\", \"completed\": 8192, \"total\": 8192}}\n",
            ],
        ));

        let mut client = QmpClient::connect(&socket).await.unwrap();
        client
            .dump_guest_memory(Path::new("/tmp/out.dump"))
            .await
            .unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["execute"], "qmp_capabilities");
        assert_eq!(requests[1]["execute"], "dump-guest-memory");
        assert_eq!(requests[1]["arguments"]["protocol"], "file:/tmp/out.dump");
        assert_eq!(requests[1]["arguments"]["detach"], true);
        // Polled until QEMU reported the dump as finished
        assert_eq!(requests.len(), 5);
        assert!(requests[2..].iter().all(|r| r["execute"] == "query-dump"));
    }

    #[tokio::test]
    async fn test_failed_background_dump() {
        let tmp = TempDir::new().unwrap();
        let socket = tmp.path().join("vm.qmp");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(fake_qemu(
            listener,
            vec![
                "{\"return\": {}}\n",
                "{\"return\": {}}\n",
                "{\"return\": {\"status\": \"failed\", \"completed\": 0, \"total\": 8192}}\n",
            ],
        ));

        let mut client = QmpClient::connect(&socket).await.unwrap();
        let err = client
            .dump_guest_memory(Path::new("/tmp/out.dump"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dump-guest-memory failed"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_reply() {
        let tmp = TempDir::new().unwrap();
        let socket = tmp.path().join("vm.qmp");
        let listener = UnixListener::bind(&socket).unwrap();

        let server = tokio::spawn(fake_qemu(
            listener,
            vec![
                "{\"return\": {}}\n",
                "{\"error\": {\"class\": \"GenericError\", \"desc\": \"dump in progress\"}}\n",
            ],
        ));

        let mut client = QmpClient::connect(&socket).await.unwrap();
        let err = client
            .dump_guest_memory(Path::new("/tmp/out.dump"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dump in progress"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let tmp = TempDir::new().unwrap();
        let err = QmpClient::connect(&tmp.path().join("absent.qmp"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EmungError::Qmp(_)));
    }
}
