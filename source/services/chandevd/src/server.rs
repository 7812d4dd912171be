// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! CONTEXT: chandevd host backend: endpoint registration, request dispatch, service loop
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/protocol.rs` + `tests/chandev_e2e`

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chandev::{ChannelConfig, ExclusiveChannel, SenderId};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::protocol::{
    decode_request, encode_close_response, encode_open_response, encode_read_response,
    encode_reject, encode_stats_response, encode_write_response, status_for_error, ReadRequest,
    Request, WriteRequest, OP_RESPONSE, STATUS_OK,
};
use crate::registry::{EndpointId, Registry, RegistryError};
use crate::transport::{loopback, LoopbackConnector, Transport, TransportError};

/// Result alias used by the service.
pub type Result<T> = core::result::Result<T, ServerError>;

/// Errors surfaced while starting or serving the channel.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Transport level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Endpoint registration failed.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    /// Channel construction was refused.
    #[error("channel error: {0}")]
    Channel(#[from] chandev::Error),
    /// The service thread could not be started or died.
    #[error("service thread: {0}")]
    Thread(String),
}

/// Notifies the launcher once the endpoint accepts connections.
pub struct ReadyNotifier(Box<dyn FnOnce(LoopbackConnector) + Send>);

impl ReadyNotifier {
    /// Creates a notifier from the provided closure.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce(LoopbackConnector) + Send + 'static,
    {
        Self(Box::new(func))
    }

    /// Hands the connector to the launcher.
    pub fn notify(self, connector: LoopbackConnector) {
        (self.0)(connector);
    }
}

/// A registered endpoint backed by one channel.
///
/// Dropping the service unregisters the endpoint.
pub struct ChannelService {
    channel: Arc<ExclusiveChannel>,
    registry: Arc<Registry>,
    endpoint: EndpointId,
}

impl ChannelService {
    /// Registers the endpoint and creates its channel.
    ///
    /// If the channel cannot be created the registration is rolled back, so a
    /// failed start leaves nothing behind.
    pub fn start(config: &ChannelConfig, registry: Arc<Registry>) -> Result<Self> {
        info!("chandevd: initialising endpoint {:?}", config.name);
        let endpoint = registry.register(&config.name).map_err(|err| {
            error!("chandevd: failed to register {:?}: {err}", config.name);
            err
        })?;
        info!("{}: registered correctly with endpoint id {endpoint}", config.name);

        let channel = match ExclusiveChannel::new(config) {
            Ok(channel) => Arc::new(channel),
            Err(err) => {
                error!("{}: failed to create the channel: {err}", config.name);
                if let Err(rollback) = registry.unregister(&config.name, endpoint) {
                    error!("{}: rollback of endpoint {endpoint} failed: {rollback}", config.name);
                }
                return Err(err.into());
            }
        };
        info!("{}: endpoint created correctly", config.name);
        Ok(Self { channel, registry, endpoint })
    }

    /// Channel served by this endpoint.
    pub fn channel(&self) -> &Arc<ExclusiveChannel> {
        &self.channel
    }

    /// Id assigned by the registry.
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    /// Serves requests until every peer has disconnected.
    pub fn serve<T: Transport>(&self, transport: &mut T) -> Result<()> {
        run_loop(transport, &self.channel)
    }
}

impl Drop for ChannelService {
    fn drop(&mut self) {
        let name = self.channel.name();
        match self.registry.unregister(name, self.endpoint) {
            Ok(()) => info!("{name}: endpoint {} unregistered", self.endpoint),
            Err(err) => warn!("{name}: unregister of endpoint {} failed: {err}", self.endpoint),
        }
    }
}

/// Decodes one request, applies it to `channel` and returns the response frame.
///
/// Every frame gets an answer; undecodable frames get a status-only reject.
pub fn handle_frame(channel: &ExclusiveChannel, sender: SenderId, frame: &[u8]) -> Vec<u8> {
    let request = match decode_request(frame) {
        Ok(request) => request,
        Err(err) => {
            warn!("{}: rejecting frame from {sender}: {err:?}", channel.name());
            let op = frame.get(3).copied().unwrap_or(0) & !OP_RESPONSE;
            return encode_reject(op, err.status());
        }
    };
    match request {
        Request::Open => match channel.on_open(sender) {
            Ok(count) => encode_open_response(STATUS_OK, count),
            Err(err) => encode_open_response(status_for_error(&err), 0),
        },
        Request::Write(WriteRequest { declared_len, payload }) => {
            match channel.on_write(sender, &payload, declared_len as usize) {
                Ok(accepted) => {
                    encode_write_response(STATUS_OK, u32::try_from(accepted).unwrap_or(u32::MAX))
                }
                Err(err) => encode_write_response(status_for_error(&err), 0),
            }
        }
        Request::Read(ReadRequest { capacity }) => {
            match channel.read_message(sender, capacity as usize) {
                Ok(bytes) => encode_read_response(STATUS_OK, &bytes),
                Err(err) => encode_read_response(status_for_error(&err), &[]),
            }
        }
        Request::Close => match channel.on_close(sender) {
            Ok(()) => encode_close_response(STATUS_OK),
            Err(err) => encode_close_response(status_for_error(&err)),
        },
        Request::Stats => encode_stats_response(STATUS_OK, channel.stats().into()),
    }
}

fn run_loop<T: Transport>(transport: &mut T, channel: &ExclusiveChannel) -> Result<()> {
    while let Some((sender, frame)) =
        transport.recv().map_err(|err| ServerError::Transport(err.into()))?
    {
        debug!("{}: {} byte frame from {sender}", channel.name(), frame.len());
        let response = handle_frame(channel, sender, &frame);
        if let Err(err) = transport.send(sender, &response) {
            let err: TransportError = err.into();
            error!("{}: reply to {sender} failed: {err}", channel.name());
        }
    }
    if let Some(holder) = channel.holder() {
        warn!("{}: all peers gone while {holder} still holds the device", channel.name());
    }
    info!("{}: all peers disconnected", channel.name());
    Ok(())
}

/// Runs the service on the default (loopback) transport with a private registry.
///
/// `notifier` receives the connector clients use to reach the endpoint. The
/// loop ends once the connector and every client made from it are dropped.
pub fn service_main_loop(config: &ChannelConfig, notifier: ReadyNotifier) -> Result<()> {
    serve_registered(config, Arc::new(Registry::new()), notifier)
}

/// Like [`service_main_loop`], but publishes the endpoint name in `registry`
/// so other parties can resolve it while the service runs.
pub fn serve_registered(
    config: &ChannelConfig,
    registry: Arc<Registry>,
    notifier: ReadyNotifier,
) -> Result<()> {
    let service = ChannelService::start(config, registry)?;
    let (connector, mut server) = loopback();
    notifier.notify(connector);
    info!("chandevd: ready ({} on endpoint {})", config.name, service.endpoint());
    service.serve(&mut server)
}

/// Checks that `config` can back an endpoint without serving it.
///
/// Registers and builds the channel once, then tears both down again.
pub fn preflight(config: &ChannelConfig) -> Result<EndpointId> {
    let service = ChannelService::start(config, Arc::new(Registry::new()))?;
    Ok(service.endpoint())
}

/// Runs the service with an injected transport.
pub fn run_with_transport<T: Transport>(transport: &mut T, service: &ChannelService) -> Result<()> {
    service.serve(transport)
}

/// Handle to a service running on its own thread.
pub struct RunningService {
    connector: LoopbackConnector,
    endpoint: EndpointId,
    worker: JoinHandle<Result<()>>,
}

impl RunningService {
    /// Id the registry assigned to the endpoint.
    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    /// Connector for new clients.
    pub fn connector(&self) -> &LoopbackConnector {
        &self.connector
    }

    /// Drops the connector and waits for the loop to finish.
    ///
    /// Returns once every client made from the connector has been dropped too.
    pub fn shutdown(self) -> Result<()> {
        let Self { connector, worker, .. } = self;
        drop(connector);
        join_worker(worker)
    }
}

/// Starts the service on a background thread with a private registry.
pub fn spawn(config: ChannelConfig) -> Result<RunningService> {
    spawn_in(config, Arc::new(Registry::new()))
}

/// Starts the service on a background thread, registered in `registry`, and
/// waits until it is ready.
pub fn spawn_in(config: ChannelConfig, registry: Arc<Registry>) -> Result<RunningService> {
    let name = config.name.clone();
    let (ready_tx, ready_rx) = mpsc::channel();
    let worker_registry = Arc::clone(&registry);
    let worker = thread::Builder::new()
        .name("chandevd".into())
        .spawn(move || {
            serve_registered(
                &config,
                worker_registry,
                ReadyNotifier::new(move |connector| {
                    let _ = ready_tx.send(connector);
                }),
            )
        })
        .map_err(|err| ServerError::Thread(err.to_string()))?;
    match ready_rx.recv() {
        Ok(connector) => match registry.resolve(&name) {
            Ok(endpoint) => Ok(RunningService { connector, endpoint, worker }),
            Err(err) => {
                drop(connector);
                join_worker(worker)?;
                Err(err.into())
            }
        },
        Err(_) => match join_worker(worker) {
            Err(err) => Err(err),
            Ok(()) => Err(ServerError::Thread("service exited before it was ready".into())),
        },
    }
}

fn join_worker(worker: JoinHandle<Result<()>>) -> Result<()> {
    worker.join().map_err(|_| ServerError::Thread("service thread panicked".into()))?
}
