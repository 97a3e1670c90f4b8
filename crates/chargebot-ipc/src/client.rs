//! Client side of the socket protocol

use chargebot_api::{Command, Event, Request, Response, ResponsePayload, ResponseResult};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use crate::{IpcError, IpcResult};

type LineReader = BufReader<OwnedReadHalf>;

/// One connection to chargebotd
pub struct IpcClient {
    lines: LineReader,
    sink: OwnedWriteHalf,
    last_request_id: u64,
}

impl IpcClient {
    pub async fn connect(socket_path: impl AsRef<Path>) -> IpcResult<Self> {
        let (read_half, write_half) = UnixStream::connect(socket_path).await?.into_split();

        Ok(Self {
            lines: BufReader::new(read_half),
            sink: write_half,
            last_request_id: 0,
        })
    }

    /// Send `command` and wait for the response carrying its request id.
    ///
    /// Event lines that arrive first are skipped.
    pub async fn send(&mut self, command: Command) -> IpcResult<Response> {
        self.last_request_id += 1;
        let request_id = self.last_request_id;

        let mut line = serde_json::to_string(&Request::new(request_id, command))?;
        line.push('\n');
        self.sink.write_all(line.as_bytes()).await?;

        loop {
            let line = next_line(&mut self.lines).await?;
            match serde_json::from_str::<Response>(&line) {
                Ok(response) if response.request_id == request_id => return Ok(response),
                _ => debug!(request_id, "Skipping unrelated line while awaiting response"),
            }
        }
    }

    /// Like [`send`](Self::send), but a refusal becomes [`IpcError::Refused`]
    pub async fn call(&mut self, command: Command) -> IpcResult<ResponsePayload> {
        match self.send(command).await?.result {
            ResponseResult::Ok(payload) => Ok(payload),
            ResponseResult::Err(info) => Err(IpcError::Refused(info)),
        }
    }

    /// Subscribe, turning this connection into an event stream
    pub async fn subscribe(mut self) -> IpcResult<EventStream> {
        self.call(Command::SubscribeEvents).await?;
        Ok(EventStream {
            lines: self.lines,
            _sink: self.sink,
        })
    }
}

/// Events pushed by chargebotd after a subscribe
pub struct EventStream {
    lines: LineReader,
    // Dropping the write half would shut down our side of the socket
    _sink: OwnedWriteHalf,
}

impl EventStream {
    pub async fn next(&mut self) -> IpcResult<Event> {
        let line = next_line(&mut self.lines).await?;
        serde_json::from_str(&line).map_err(|e| IpcError::InvalidMessage(e.to_string()))
    }
}

async fn next_line(lines: &mut LineReader) -> IpcResult<String> {
    let mut line = String::new();
    if lines.read_line(&mut line).await? == 0 {
        return Err(IpcError::ConnectionClosed);
    }
    Ok(line.trim().to_string())
}
