//! Protocol I/O task: the single owner of the machine session.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! scheduling and `async-io-mini` for reactor-driven timers.  Two
//! concurrent futures share the adapter and the orchestrator:
//!
//! 1. **Session**: connect with backoff while down, poll changes every
//!    `poll_interval` while up
//! 2. **Dispatch**: truly async via `CommandQueue::receive().await`,
//!    applies commands one at a time in arrival order
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────┐
//!  │  protocol-io thread                                    │
//!  │  ┌──────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                    │  │
//!  │  │  ┌─────────────────────┐  ┌───────────────────┐  │  │
//!  │  │  │ Session             │  │ Dispatch          │  │  │
//!  │  │  │ poll ⏱ / backoff ⏱ │  │ wake-on-send      │  │  │
//!  │  │  └─────────────────────┘  └───────────────────┘  │  │
//!  │  └──────────────────────────────────────────────────┘  │
//!  └────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither future holds a `RefCell` borrow across an `.await`, so the
//! adapter's subscriber callback can always borrow the orchestrator.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Context;
use log::{debug, info, warn};

use super::channels::{CommandQueue, ShutdownSignal};
use super::session::{AdapterEvent, ProtocolAdapter};
use crate::app::ports::TagEndpoint;
use crate::app::service::Orchestrator;

type SharedAdapter<E> = Rc<RefCell<ProtocolAdapter<E>>>;
type SharedCore = Rc<RefCell<Orchestrator>>;

/// Session task: reconnect while down, poll while up.
async fn session_loop<E: TagEndpoint>(adapter: SharedAdapter<E>, poll_interval: Duration) {
    loop {
        let connected = adapter.borrow().state().is_connected();
        if connected {
            let polled = adapter.borrow_mut().poll();
            match polled {
                Ok(0) => {}
                Ok(n) => debug!("IO: dispatched {n} changes"),
                Err(e) if e.is_session_loss() => {}
                Err(e) => warn!("IO: poll failed: {e}"),
            }
            async_io_mini::Timer::after(poll_interval).await;
        } else {
            let connected = adapter.borrow_mut().connect();
            if connected.is_err() {
                let delay = adapter.borrow_mut().next_retry_delay();
                info!("IO: retrying session in {} ms", delay.as_millis());
                async_io_mini::Timer::after(delay).await;
            }
        }
    }
}

/// Dispatch task: wakes instantly when a caller queues a command.
async fn dispatch_loop<E: TagEndpoint>(
    adapter: SharedAdapter<E>,
    core: SharedCore,
    queue: Arc<CommandQueue>,
) {
    loop {
        let request = queue.receive().await;
        let result = {
            let mut adapter = adapter.borrow_mut();
            core.borrow_mut().handle_command(request.command, &mut *adapter)
        };
        request.reply.signal(result);
    }
}

/// Entry point for the I/O thread.  Runs until `shutdown` is signalled,
/// then closes the session.
fn run_io_loop<E: TagEndpoint>(
    adapter: ProtocolAdapter<E>,
    core: Orchestrator,
    queue: Arc<CommandQueue>,
    shutdown: Arc<ShutdownSignal>,
    poll_interval: Duration,
) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    let core: SharedCore = Rc::new(RefCell::new(core));
    let adapter: SharedAdapter<E> = Rc::new(RefCell::new(adapter));

    let subscriber = core.clone();
    adapter
        .borrow_mut()
        .subscribe(Box::new(move |event: &AdapterEvent| {
            subscriber.borrow_mut().on_adapter_event(event);
        }));

    executor.spawn(session_loop(adapter.clone(), poll_interval)).detach();
    executor.spawn(dispatch_loop(adapter.clone(), core.clone(), queue)).detach();

    info!("IO task started (poll every {} ms)", poll_interval.as_millis());

    futures_lite::future::block_on(executor.run(shutdown.wait()));

    adapter.borrow_mut().disconnect();
    info!("IO task stopped");
}

/// Spawn the I/O thread.  Takes ownership of the endpoint; the adapter
/// itself is built on the thread since its subscribers are not `Send`.
pub fn spawn<E>(
    endpoint: E,
    config: &crate::config::GatewayConfig,
    core: Orchestrator,
    queue: Arc<CommandQueue>,
    shutdown: Arc<ShutdownSignal>,
) -> anyhow::Result<std::thread::JoinHandle<()>>
where
    E: TagEndpoint + Send + 'static,
{
    let tags = config.tags.clone();
    let backoff = super::session::Backoff::new(
        Duration::from_millis(u64::from(config.reconnect_initial_ms)),
        Duration::from_millis(u64::from(config.reconnect_max_ms)),
    );
    let poll_interval = config.poll_interval();

    std::thread::Builder::new()
        .name("protocol-io".into())
        .spawn(move || {
            let adapter = ProtocolAdapter::new(endpoint, tags, backoff);
            run_io_loop(adapter, core, queue, shutdown, poll_interval);
        })
        .context("spawning protocol-io thread")
}
