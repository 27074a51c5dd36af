//! Gateway facade.
//!
//! The transport-agnostic boundary handed to whatever serves the
//! dashboard or the bus.  Reads are non-blocking copies of the published
//! views; commands go through the bounded queue to the protocol I/O
//! thread and wait, bounded by `command_timeout_ms`, for the outcome.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use futures_lite::future;
use log::{info, warn};

use crate::adapters::time::SystemClock;
use crate::alarms::Alert;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::machine::MachineState;
use crate::metrics::{MetricSample, MetricsSummary};
use crate::protocol::channels::{CommandQueue, CommandReply, DispatchRequest, ShutdownSignal};
use crate::protocol::io_task;
use crate::protocol::session::SessionState;

use super::commands::{Command, CommandAck};
use super::ports::{Clock, EventSink, TagEndpoint};
use super::service::Orchestrator;
use super::views::Views;

pub struct Gateway {
    views: Arc<Views>,
    queue: Arc<CommandQueue>,
    shutdown: Arc<ShutdownSignal>,
    io_thread: Option<JoinHandle<()>>,
    command_timeout: Duration,
}

impl Gateway {
    /// Validate `config`, then start the protocol I/O thread against
    /// `endpoint`.  Change events go to `sink`.
    pub fn spawn<E, S>(config: GatewayConfig, endpoint: E, sink: S) -> anyhow::Result<Self>
    where
        E: TagEndpoint + Send + 'static,
        S: EventSink + Send + 'static,
    {
        Self::spawn_with_clock(config, endpoint, sink, SystemClock)
    }

    pub fn spawn_with_clock<E, S, C>(
        config: GatewayConfig,
        endpoint: E,
        sink: S,
        clock: C,
    ) -> anyhow::Result<Self>
    where
        E: TagEndpoint + Send + 'static,
        S: EventSink + Send + 'static,
        C: Clock + Send + 'static,
    {
        config.validate().context("invalid gateway config")?;

        let views = Arc::new(Views::new());
        let queue = Arc::new(CommandQueue::new());
        let shutdown = Arc::new(ShutdownSignal::new());
        let core = Orchestrator::new(&config, views.clone(), Box::new(sink), Box::new(clock));

        let io_thread = io_task::spawn(endpoint, &config, core, queue.clone(), shutdown.clone())?;
        info!("Gateway started for {}", config.endpoint_url);

        Ok(Self {
            views,
            queue,
            shutdown,
            io_thread: Some(io_thread),
            command_timeout: config.command_timeout(),
        })
    }

    // ── Reads ─────────────────────────────────────────────────

    /// Latest published snapshot.  Unavailable while the session is down.
    pub fn get_state(&self) -> Result<MachineState> {
        self.views.read(|p| match (p.session, p.state) {
            (SessionState::Connected, Some(state)) => Ok(state),
            _ => Err(GatewayError::ServiceUnavailable),
        })
    }

    /// Metrics window, oldest first.
    pub fn get_metrics(&self) -> Vec<MetricSample> {
        self.views.read(|p| p.metrics.clone())
    }

    pub fn get_metrics_summary(&self) -> MetricsSummary {
        self.views.read(|p| p.summary)
    }

    /// One entry per rule ever raised.
    pub fn get_alerts(&self) -> Vec<Alert> {
        self.views.read(|p| p.alerts.clone())
    }

    pub fn get_active_alerts(&self) -> Vec<Alert> {
        self.views.read(|p| p.alerts.iter().filter(|a| a.active).cloned().collect())
    }

    /// Raise/clear transitions at or after `since_ms`.
    pub fn get_alert_history(&self, since_ms: u64) -> Vec<Alert> {
        self.views
            .read(|p| p.history.iter().filter(|a| a.timestamp >= since_ms).cloned().collect())
    }

    pub fn session_status(&self) -> SessionState {
        self.views.read(|p| p.session)
    }

    // ── Commands ──────────────────────────────────────────────

    /// Queue `command` and wait for it to be validated and written.
    ///
    /// Fails fast with `ServiceUnavailable` while the session is down or
    /// the queue is full.  Once queued a command is not cancelable: a
    /// `Timeout` means the outcome is unknown, not that it was dropped.
    pub async fn submit_command(&self, command: Command) -> Result<CommandAck> {
        if !self.session_status().is_connected() {
            return Err(GatewayError::ServiceUnavailable);
        }

        let reply = Arc::new(CommandReply::new());
        let request = DispatchRequest { command, reply: reply.clone() };
        if self.queue.try_send(request).is_err() {
            warn!("Gateway: command queue full, refusing {}", command.name().as_str());
            return Err(GatewayError::ServiceUnavailable);
        }

        let timeout = self.command_timeout;
        future::or(reply.wait(), async move {
            async_io_mini::Timer::after(timeout).await;
            warn!(
                "Gateway: {} timed out after {} ms",
                command.name().as_str(),
                timeout.as_millis()
            );
            Err(GatewayError::Timeout)
        })
        .await
    }

    /// Blocking form of [`submit_command`](Self::submit_command).
    pub fn submit_command_blocking(&self, command: Command) -> Result<CommandAck> {
        future::block_on(self.submit_command(command))
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Stop the I/O thread and close the session.  Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.io_thread.take() {
            self.shutdown.signal(());
            if handle.join().is_err() {
                warn!("Gateway: protocol-io thread panicked");
            }
            info!("Gateway stopped");
        }
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}
