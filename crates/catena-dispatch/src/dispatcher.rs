use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::{DispatchError, Result};
use crate::event::{ChainEvent, EventKind, EventSink};

/// A channel receiver for chain events.
pub type EventStream = mpsc::UnboundedReceiver<ChainEvent>;

type Callback = Box<dyn FnMut(&ChainEvent) + Send>;

/// Handle identifying one registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
enum Target {
    Callback(Arc<Mutex<Callback>>),
    Stream(mpsc::UnboundedSender<ChainEvent>),
}

struct Listener {
    id: ListenerId,
    kinds: Vec<EventKind>,
    target: Target,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl Registry {
    fn register(&mut self, kinds: Vec<EventKind>, target: Target) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener { id, kinds, target });
        id
    }
}

enum Command {
    Deliver(ChainEvent),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Configuration for the [`Dispatcher`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Name given to the delivery thread.
    pub thread_name: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            thread_name: "catena-dispatch".into(),
        }
    }
}

/// Ordered, single-threaded event delivery.
///
/// Events are queued by [`send`](Self::send) and delivered by one worker
/// thread in queue order. The listener list is copied before each delivery,
/// so listeners may register or remove listeners from inside a callback. A
/// panicking callback is logged and skipped.
pub struct Dispatcher {
    registry: Arc<RwLock<Registry>>,
    commands: mpsc::UnboundedSender<Command>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl Dispatcher {
    pub fn new() -> Result<Self> {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Result<Self> {
        let registry = Arc::new(RwLock::new(Registry::default()));
        let (commands, rx) = mpsc::unbounded_channel();
        let worker_registry = Arc::clone(&registry);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(worker_registry, rx))?;
        let worker_id = worker.thread().id();
        info!(thread = %config.thread_name, "dispatcher started");
        Ok(Self {
            registry,
            commands,
            worker: Some(worker),
            worker_id,
        })
    }

    /// Register a callback for one kind of event.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Result<ListenerId>
    where
        F: FnMut(&ChainEvent) + Send + 'static,
    {
        let target = Target::Callback(Arc::new(Mutex::new(Box::new(callback))));
        Ok(self.write()?.register(vec![kind], target))
    }

    /// Receive the given kinds of event on a channel.
    ///
    /// Dropping the receiver unregisters it at the next delivery.
    pub fn stream(&self, kinds: &[EventKind]) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.write()?.register(kinds.to_vec(), Target::Stream(tx));
        Ok(rx)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> Result<bool> {
        let mut registry = self.write()?;
        let before = registry.listeners.len();
        registry.listeners.retain(|l| l.id != id);
        Ok(registry.listeners.len() != before)
    }

    pub fn listener_count(&self) -> Result<usize> {
        self.registry
            .read()
            .map(|r| r.listeners.len())
            .map_err(|_| DispatchError::RegistryPoisoned)
    }

    /// Queue an event for delivery.
    pub fn send(&self, event: ChainEvent) -> Result<()> {
        debug!(kind = %event.kind(), "event queued");
        self.commands
            .send(Command::Deliver(event))
            .map_err(|_| DispatchError::Shutdown)
    }

    /// Block until every event queued before this call has been delivered.
    ///
    /// Must not be called from inside a listener or an async context.
    pub fn flush(&self) -> Result<()> {
        if thread::current().id() == self.worker_id {
            return Err(DispatchError::FlushFromListener);
        }
        let (done, wait) = oneshot::channel();
        self.commands
            .send(Command::Flush(done))
            .map_err(|_| DispatchError::Shutdown)?;
        wait.blocking_recv().map_err(|_| DispatchError::Shutdown)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|_| DispatchError::RegistryPoisoned)
    }
}

impl EventSink for &Dispatcher {
    fn emit(&mut self, event: ChainEvent) {
        if let Err(e) = self.send(event) {
            warn!(error = %e, "dropping chain event");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            // A listener dropping the last handle cannot join its own thread.
            if thread::current().id() != self.worker_id && worker.join().is_err() {
                warn!("dispatch thread panicked");
            }
        }
    }
}

fn run(registry: Arc<RwLock<Registry>>, mut commands: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Deliver(event) => deliver(&registry, &event),
            Command::Flush(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => break,
        }
    }
    debug!("dispatcher stopped");
}

fn deliver(registry: &RwLock<Registry>, event: &ChainEvent) {
    let kind = event.kind();
    let targets: Vec<(ListenerId, Target)> = match registry.read() {
        Ok(registry) => registry
            .listeners
            .iter()
            .filter(|l| l.kinds.contains(&kind))
            .map(|l| (l.id, l.target.clone()))
            .collect(),
        Err(_) => {
            warn!(kind = %kind, "listener registry poisoned, event dropped");
            return;
        }
    };

    let mut closed = Vec::new();
    for (id, target) in targets {
        match target {
            Target::Callback(callback) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
                    (*callback)(event);
                }));
                if outcome.is_err() {
                    warn!(listener = id.0, kind = %kind, "listener panicked");
                }
            }
            Target::Stream(tx) => {
                if tx.send(event.clone()).is_err() {
                    closed.push(id);
                }
            }
        }
    }

    if !closed.is_empty() {
        if let Ok(mut registry) = registry.write() {
            registry.listeners.retain(|l| !closed.contains(&l.id));
        }
    }
}
