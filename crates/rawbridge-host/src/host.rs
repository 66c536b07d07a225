//! The primary execution context.
//!
//! A [`HostLoop`] belongs to the thread that created it. Completion sinks
//! and every host-visible value live on that thread; only engine calls run
//! elsewhere.

use std::rc::Rc;
use std::time::Duration;

use rawbridge_core::{registry, ConstantTable, LibRawEngine, RawEngine, VersionInfo};
use tokio::sync::mpsc::error::TryRecvError;

use crate::config::HostConfig;
use crate::dispatch::{Completion, Dispatcher};
use crate::error::BridgeError;
use crate::facade::Processor;
use crate::marshal::marshal;
use crate::processor::NativeProcessor;

pub struct HostLoop {
    dispatcher: Rc<Dispatcher>,
    config: HostConfig,
}

impl HostLoop {
    /// Start the worker pool described by `config`.
    pub fn new(config: HostConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to start worker pool: {}", e)))?;
        tracing::info!(
            worker_threads = config.worker_threads,
            max_blocking_threads = config.max_blocking_threads,
            "host loop started"
        );
        Ok(Self {
            dispatcher: Rc::new(Dispatcher::new(runtime)),
            config,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// A processor over a fresh LibRaw handle.
    pub fn processor(&self) -> Result<Processor, BridgeError> {
        let engine = LibRawEngine::new()
            .map_err(|e| BridgeError::decode("Failed to create processor", &e))?;
        Ok(self.processor_with(engine))
    }

    /// A processor over any engine.
    pub fn processor_with<E: RawEngine>(&self, engine: E) -> Processor {
        let queue = self.dispatcher.attach(NativeProcessor::new(engine));
        Processor::new(queue, self.config.params.clone())
    }

    /// Module-level queries.
    pub fn registry(&self) -> Registry {
        Registry
    }

    /// Sinks not yet called.
    pub fn pending(&self) -> usize {
        self.dispatcher.sinks.borrow().len()
    }

    /// Deliver every completion that has already arrived, without blocking.
    /// Returns the number of sinks called.
    pub fn poll(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.dispatcher.receiver.borrow_mut().try_recv();
            match next {
                Ok(completion) => delivered += usize::from(self.deliver(completion)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }

    /// Wait up to `timeout` for a completion, then deliver everything that
    /// has arrived. Returns the number of sinks called.
    pub fn turn(&self, timeout: Duration) -> usize {
        let first = {
            let mut receiver = self.dispatcher.receiver.borrow_mut();
            self.dispatcher
                .runtime()
                .block_on(async { tokio::time::timeout(timeout, receiver.recv()).await })
        };
        let mut delivered = 0;
        if let Ok(Some(completion)) = first {
            delivered += usize::from(self.deliver(completion));
        }
        delivered + self.poll()
    }

    /// Block until no sink is pending, including sinks registered by
    /// other sinks.
    pub fn run_until_idle(&self) {
        while self.pending() > 0 {
            self.turn(Duration::from_millis(50));
        }
    }

    /// Marshal and hand one completion to its sink. Detached tasks have no
    /// sink and are only logged.
    fn deliver(&self, completion: Completion) -> bool {
        let Completion {
            id,
            context,
            operation,
            result,
            report,
        } = completion;
        // Release the borrow before the sink runs; sinks may submit.
        let sink = self.dispatcher.sinks.borrow_mut().remove(&id);
        let result = result.and_then(marshal);
        match sink {
            Some(sink) => {
                tracing::debug!(
                    task = id,
                    context,
                    operation,
                    ok = result.is_ok(),
                    "task completed"
                );
                sink(result, report);
                true
            }
            None => {
                tracing::trace!(task = id, context, operation, "detached task completed");
                false
            }
        }
    }
}

/// Instance-free library queries and constant tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registry;

impl Registry {
    pub fn version(&self) -> VersionInfo {
        registry::version()
    }

    pub fn camera_list(&self) -> &'static [&'static str] {
        registry::camera_list()
    }

    pub fn camera_count(&self) -> usize {
        registry::camera_count()
    }

    pub fn is_supported_camera(&self, name: &str) -> bool {
        registry::is_supported_camera(name)
    }

    pub fn constants(&self) -> Vec<ConstantTable> {
        registry::constant_tables()
    }
}
