//! Broker: owns the listening socket, dispatches method calls to the
//! registered services, and broadcasts injected signals to every connected
//! client.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

use notimock_core::Value;

use crate::error::{BusError, CallError};
use crate::proto::Frame;

/// A service reachable over the bus, keyed by interface name.
///
/// `handle_call` is synchronous: the mocks are plain state machines and the
/// broker dispatches from its connection task.
pub trait BusService: Send + Sync {
    fn interface(&self) -> &str;

    /// Declared properties, answered by the broker on `GetAll`.
    fn properties(&self) -> BTreeMap<String, Value> {
        BTreeMap::new()
    }

    fn handle_call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>, CallError>;
}

struct BrokerInner {
    services: Mutex<HashMap<String, Arc<dyn BusService>>>,
    /// Per-connection frame senders, for signal broadcast.
    clients: Mutex<HashMap<u64, mpsc::UnboundedSender<Frame>>>,
    next_client: AtomicU64,
}

impl BrokerInner {
    fn dispatch(&self, interface: &str, method: &str, args: &[Value]) -> Result<Vec<Value>, CallError> {
        let service = {
            let services = self.services.lock().expect("services lock");
            services.get(interface).cloned()
        };
        let Some(service) = service else {
            return Err(CallError::unknown_interface(interface));
        };
        if method == "GetAll" {
            return Ok(vec![Value::Dict(service.properties())]);
        }
        service.handle_call(method, args)
    }

    fn broadcast(&self, frame: Frame) {
        let mut clients = self.clients.lock().expect("clients lock");
        clients.retain(|_, tx| tx.send(frame.clone()).is_ok());
    }
}

/// Handle the mocks use to inject signals. Cheap to clone.
#[derive(Clone)]
pub struct SignalEmitter {
    inner: Arc<BrokerInner>,
}

impl SignalEmitter {
    pub fn emit(&self, interface: &str, member: &str, args: Vec<Value>) {
        tracing::debug!(interface, member, "emit signal");
        self.inner.broadcast(Frame::Signal {
            interface: interface.to_string(),
            member: member.to_string(),
            args,
        });
    }
}

/// The bus broker. Dropping it stops the accept loop and disconnects
/// clients; the backing socket file is removed.
pub struct Broker {
    inner: Arc<BrokerInner>,
    socket_path: String,
    accept_task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl Broker {
    /// Bind the socket and start accepting connections.
    pub async fn start(socket_path: &str) -> Result<Self, BusError> {
        // Check for stale socket
        if std::path::Path::new(socket_path).exists() {
            if UnixStream::connect(socket_path).await.is_err() {
                std::fs::remove_file(socket_path)?;
                tracing::info!("removed stale socket at {socket_path}");
            } else {
                return Err(BusError::AddressInUse(socket_path.to_string()));
            }
        }

        let listener = UnixListener::bind(socket_path)?;
        tracing::info!("broker listening on {socket_path}");

        let inner = Arc::new(BrokerInner {
            services: Mutex::new(HashMap::new()),
            clients: Mutex::new(HashMap::new()),
            next_client: AtomicU64::new(1),
        });

        let accept_inner = Arc::clone(&inner);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let inner = Arc::clone(&accept_inner);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, inner).await {
                                tracing::debug!("connection error: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!("accept failed: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            inner,
            socket_path: socket_path.to_string(),
            accept_task,
        })
    }

    /// Register a service. A second registration for the same interface
    /// replaces the first.
    pub fn register(&self, service: Arc<dyn BusService>) {
        let interface = service.interface().to_string();
        tracing::debug!(interface, "register service");
        self.inner
            .services
            .lock()
            .expect("services lock")
            .insert(interface, service);
    }

    pub fn emitter(&self) -> SignalEmitter {
        SignalEmitter {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        self.accept_task.abort();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn handle_connection(stream: UnixStream, inner: Arc<BrokerInner>) -> Result<(), BusError> {
    let client_id = inner.next_client.fetch_add(1, Ordering::Relaxed);
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // All outbound frames for this connection (replies and broadcast
    // signals) funnel through one channel so they serialize on the socket.
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    inner
        .clients
        .lock()
        .expect("clients lock")
        .insert(client_id, tx.clone());

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let mut line = match serde_json::to_string(&frame) {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("frame encode failed: {e}");
                    continue;
                }
            };
            line.push('\n');
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let result = read_loop(&mut reader, &inner, &tx).await;

    inner.clients.lock().expect("clients lock").remove(&client_id);
    drop(tx);
    let _ = writer_task.await;
    result
}

async fn read_loop(
    reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>,
    inner: &BrokerInner,
    tx: &mpsc::UnboundedSender<Frame>,
) -> Result<(), BusError> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        let frame: Frame = serde_json::from_str(line.trim())?;
        let Frame::Call {
            serial,
            interface,
            method,
            args,
        } = frame
        else {
            tracing::debug!("ignoring non-call frame from client");
            continue;
        };
        tracing::debug!(interface, method, serial, "dispatch call");
        let reply = match inner.dispatch(&interface, &method, &args) {
            Ok(result) => Frame::Reply { serial, result },
            Err(e) => Frame::Error {
                serial,
                name: e.name,
                message: e.message,
            },
        };
        if tx.send(reply).is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BusClient;

    struct EchoService;

    impl BusService for EchoService {
        fn interface(&self) -> &str {
            "test.Echo"
        }

        fn properties(&self) -> BTreeMap<String, Value> {
            BTreeMap::from([("version".to_string(), Value::U32(1))])
        }

        fn handle_call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>, CallError> {
            match method {
                "Echo" => Ok(args.to_vec()),
                "Boom" => Err(CallError::new("KeyNotFound", "nothing here")),
                _ => Err(CallError::unknown_method(self.interface(), method)),
            }
        }
    }

    fn scratch_socket(dir: &tempfile::TempDir) -> String {
        dir.path().join("bus.sock").to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn call_reply_and_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broker = Broker::start(&scratch_socket(&dir)).await.expect("start");
        broker.register(Arc::new(EchoService));

        let mut client = BusClient::connect(broker.socket_path()).await.expect("connect");
        let result = client
            .call("test.Echo", "Echo", vec![Value::str("hi")])
            .await
            .expect("echo");
        assert_eq!(result, vec![Value::str("hi")]);

        let err = client
            .call("test.Echo", "Boom", vec![])
            .await
            .expect_err("error frame");
        match err {
            BusError::Call(e) => assert_eq!(e.name, "KeyNotFound"),
            other => panic!("unexpected error: {other}"),
        }

        let err = client
            .call("test.Missing", "Echo", vec![])
            .await
            .expect_err("unknown interface");
        assert!(matches!(err, BusError::Call(e) if e.name == "UnknownInterface"));
    }

    #[tokio::test]
    async fn get_all_returns_properties() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broker = Broker::start(&scratch_socket(&dir)).await.expect("start");
        broker.register(Arc::new(EchoService));

        let mut client = BusClient::connect(broker.socket_path()).await.expect("connect");
        let props = client.get_all("test.Echo").await.expect("props");
        assert_eq!(props.get("version"), Some(&Value::U32(1)));
    }

    #[tokio::test]
    async fn signals_broadcast_to_connected_clients() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broker = Broker::start(&scratch_socket(&dir)).await.expect("start");
        broker.register(Arc::new(EchoService));
        let emitter = broker.emitter();

        let mut client = BusClient::connect(broker.socket_path()).await.expect("connect");
        // A call first, so the connection is definitely registered.
        client
            .call("test.Echo", "Echo", vec![])
            .await
            .expect("echo");

        emitter.emit("test.Echo", "Ping", vec![Value::U32(42)]);
        let signal = tokio::time::timeout(std::time::Duration::from_secs(5), client.next_signal())
            .await
            .expect("not timed out")
            .expect("signal");
        assert_eq!(signal.member, "Ping");
        assert_eq!(signal.args, vec![Value::U32(42)]);
    }

    #[tokio::test]
    async fn second_broker_on_live_socket_is_refused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = scratch_socket(&dir);
        let _broker = Broker::start(&path).await.expect("start");
        let err = Broker::start(&path).await.expect_err("in use");
        assert!(matches!(err, BusError::AddressInUse(_)));
    }
}
