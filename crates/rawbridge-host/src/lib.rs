//! rawbridge host - asynchronous bindings for a RAW decoding engine
//!
//! This crate sits between a single-threaded host and a blocking RAW engine.
//! Engine calls run on a worker pool; results come back to the host thread
//! as plain owned values.
//!
//! # Module Structure
//!
//! - `host` - the host loop, worker pool ownership and result delivery
//! - `facade` - the [`Processor`] object exposed to host code
//! - `dispatch` - per-processor task queues and job execution
//! - `processor` - lifecycle state machine around one engine instance
//! - `marshal` - copying engine output into host-owned values
//! - `config` - TOML host configuration
//! - `error` - the error type every callback receives
//!
//! # Usage
//!
//! ```ignore
//! use rawbridge_host::{HostConfig, HostLoop};
//!
//! let host = HostLoop::new(HostConfig::default())?;
//! let mut processor = host.processor()?;
//! processor.open_file("IMG_0001.CR2", |r| println!("opened: {:?}", r))?;
//! processor.process(|r| println!("processed: {:?}", r))?;
//! processor.make_memory_image(|r| println!("{} bytes", r.map(|i| i.data_size).unwrap_or(0)))?;
//! host.run_until_idle();
//! ```

mod config;
mod dispatch;
mod error;
mod facade;
mod host;
mod marshal;
mod processor;

#[cfg(test)]
mod fixture;

pub use config::HostConfig;
pub use dispatch::{
    execute, CompletionSink, ContextId, ContextQueue, JobReport, NativeOutcome, Operation,
    PendingTask, TaskId,
};
pub use error::{BridgeError, ErrorKind};
pub use facade::Processor;
pub use host::{HostLoop, Registry};
pub use marshal::{marshal, MemImage, OpenResult, ProcessResult, TaskOutput, ThumbnailInfo};
pub use processor::{ImageInfo, LastError, LifecycleState, NativeProcessor, Source};

pub use rawbridge_core;
