//! Broker runtime: spawns the scheduler and allocation queue workers and wires their
//! channels to the routing collaborator.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use sugars::boxed;

use crate::core::allocation_queue::AllocationQueue;
use crate::core::config::{BrokerConfig, ConfigError};
use crate::core::events::{CoreEvent, QueueMessage, SchedulerMessage};
use crate::core::logger::StdoutLogger;
use crate::core::resources::ResourceCatalog;
use crate::core::scheduler::Scheduler;
use crate::core::scheduling_strategy::strategy_resolver;

/// A running broker: one scheduler worker and one allocation queue worker, each
/// owning its state exclusively and fed through its own channel.
///
/// Workers process messages to completion, one at a time, and run their maintenance
/// tick whenever the channel stays idle for the configured period; a tick can also be
/// injected explicitly as a message. Outward events from both workers are merged into
/// `events_rx`. Dropping the senders stops the workers once their queues drain.
pub struct Broker {
    pub scheduler_tx: Sender<SchedulerMessage>,
    pub queue_tx: Sender<QueueMessage>,
    pub events_rx: Receiver<CoreEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl Broker {
    /// Builds the workers from the configuration and starts them.
    pub fn start(config: BrokerConfig) -> Result<Self, ConfigError> {
        let strategy = strategy_resolver(&config.sched_strategy, config.seed, boxed!(StdoutLogger::new()))?;
        let mut scheduler = Scheduler::new(
            ResourceCatalog::new(),
            strategy,
            config.clone(),
            boxed!(StdoutLogger::new()),
        );
        let mut queue = AllocationQueue::new(config.split_ttl_ticks, boxed!(StdoutLogger::new()));

        let tick_period = Duration::from_secs(config.tick_period_secs);
        let (scheduler_tx, scheduler_rx) = mpsc::channel();
        let (queue_tx, queue_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();
        let queue_events_tx = events_tx.clone();

        let scheduler_worker = thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || loop {
                let events = match scheduler_rx.recv_timeout(tick_period) {
                    Ok(message) => scheduler.handle(message),
                    Err(RecvTimeoutError::Timeout) => scheduler.handle(SchedulerMessage::Tick),
                    Err(RecvTimeoutError::Disconnected) => return,
                };
                for event in events {
                    if events_tx.send(event).is_err() {
                        return;
                    }
                }
            })
            .expect("failed to spawn the scheduler worker");

        let queue_worker = thread::Builder::new()
            .name("allocation-queue".to_string())
            .spawn(move || loop {
                let events = match queue_rx.recv_timeout(tick_period) {
                    Ok(message) => queue.handle(message),
                    Err(RecvTimeoutError::Timeout) => queue.handle(QueueMessage::Tick { now: Utc::now() }),
                    Err(RecvTimeoutError::Disconnected) => return,
                };
                for event in events {
                    if queue_events_tx.send(event).is_err() {
                        return;
                    }
                }
            })
            .expect("failed to spawn the allocation queue worker");

        Ok(Self {
            scheduler_tx,
            queue_tx,
            events_rx,
            workers: vec![scheduler_worker, queue_worker],
        })
    }

    /// Closes the worker channels and waits for both workers to drain and stop.
    pub fn join(self) {
        drop(self.scheduler_tx);
        drop(self.queue_tx);
        for worker in self.workers {
            worker.join().expect("broker worker panicked");
        }
    }
}
