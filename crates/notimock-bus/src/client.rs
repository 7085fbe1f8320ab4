//! Bus client used by the notification sender. One persistent connection;
//! replies are matched by serial, broadcast signals are queued as they
//! arrive and handed out through [`BusClient::next_signal`].

use std::collections::{BTreeMap, VecDeque};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

use notimock_core::Value;

use crate::error::{BusError, CallError};
use crate::proto::Frame;

/// A broadcast signal received from the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub interface: String,
    pub member: String,
    pub args: Vec<Value>,
}

pub struct BusClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_serial: u64,
    queued: VecDeque<Signal>,
}

impl BusClient {
    pub async fn connect(socket_path: &str) -> Result<Self, BusError> {
        let stream = UnixStream::connect(socket_path).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
            next_serial: 1,
            queued: VecDeque::new(),
        })
    }

    /// Invoke a method and await its reply. Signals that arrive while
    /// waiting are queued, not dropped.
    pub async fn call(
        &mut self,
        interface: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, BusError> {
        let serial = self.next_serial;
        self.next_serial += 1;

        let frame = Frame::Call {
            serial,
            interface: interface.to_string(),
            method: method.to_string(),
            args,
        };
        self.send(&frame).await?;

        loop {
            match self.read_frame().await? {
                Frame::Reply { serial: s, result } if s == serial => return Ok(result),
                Frame::Error {
                    serial: s,
                    name,
                    message,
                } if s == serial => return Err(CallError { name, message }.into()),
                Frame::Signal {
                    interface,
                    member,
                    args,
                } => self.queued.push_back(Signal {
                    interface,
                    member,
                    args,
                }),
                other => tracing::debug!("ignoring out-of-band frame: {other:?}"),
            }
        }
    }

    /// Fetch the service's declared properties.
    pub async fn get_all(&mut self, interface: &str) -> Result<BTreeMap<String, Value>, BusError> {
        let mut result = self.call(interface, "GetAll", vec![]).await?;
        match result.pop() {
            Some(Value::Dict(props)) if result.is_empty() => Ok(props),
            _ => Err(CallError::invalid_args("GetAll").into()),
        }
    }

    /// Await the next broadcast signal.
    pub async fn next_signal(&mut self) -> Result<Signal, BusError> {
        if let Some(signal) = self.queued.pop_front() {
            return Ok(signal);
        }
        loop {
            if let Frame::Signal {
                interface,
                member,
                args,
            } = self.read_frame().await?
            {
                return Ok(Signal {
                    interface,
                    member,
                    args,
                });
            }
            tracing::debug!("ignoring non-signal frame while waiting for signals");
        }
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), BusError> {
        let mut line = serde_json::to_string(frame)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame, BusError> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(BusError::Closed);
        }
        Ok(serde_json::from_str(line.trim())?)
    }
}
