//! Off-thread execution of processor operations.
//!
//! Each processor context owns a drain loop on the worker runtime. The loop
//! pulls jobs from an unbounded queue and runs each one on the blocking
//! pool, waiting for it before taking the next, so a context never has more
//! than one job in flight and its completions come back in submission
//! order. Completions travel to the primary context over a channel; sinks
//! never leave the primary thread.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use rawbridge_core::{ImageSizes, NativeImage, ProcessingParams, RawEngine, ThumbnailGeometry};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::BridgeError;
use crate::marshal::TaskOutput;
use crate::processor::{ImageInfo, LifecycleState, NativeProcessor, Source};

pub type TaskId = u64;
pub type ContextId = u64;

/// Receives a task's outcome on the primary context, together with the
/// processor state read right after the job ran.
pub type CompletionSink = Box<dyn FnOnce(Result<TaskOutput, BridgeError>, JobReport)>;

/// Processor state observed on the worker once a job has finished,
/// whether it succeeded, failed or panicked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobReport {
    /// `None` when the job never reached the processor.
    pub state: Option<LifecycleState>,
    pub info: Option<ImageInfo>,
}

impl JobReport {
    fn read<E: RawEngine>(processor: &NativeProcessor<E>) -> Self {
        Self {
            state: Some(processor.state()),
            info: processor.snapshot(),
        }
    }
}

/// What a task asks the processor to do, with its owned input.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    LoadFile(PathBuf),
    LoadBuffer(Vec<u8>),
    Unpack,
    Process(ProcessingParams),
    MakeImage,
    UnpackThumbnail,
    MakeThumbnail,
    ThumbnailImage,
    Recycle,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::LoadFile(_) => "load-file",
            Operation::LoadBuffer(_) => "load-buffer",
            Operation::Unpack => "unpack",
            Operation::Process(_) => "process",
            Operation::MakeImage => "make-image",
            Operation::UnpackThumbnail => "unpack-thumbnail",
            Operation::MakeThumbnail => "make-thumbnail",
            Operation::ThumbnailImage => "thumbnail-image",
            Operation::Recycle => "recycle",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Operation::LoadFile(_) | Operation::LoadBuffer(_))
    }
}

/// A submitted unit of work waiting for its completion.
pub struct PendingTask {
    pub id: TaskId,
    pub operation: Operation,
    pub sink: CompletionSink,
}

/// Raw result of a job, before marshaling.
#[derive(Debug)]
pub enum NativeOutcome {
    Opened(ImageSizes),
    Unpacked,
    Processed(ImageSizes),
    Image(Option<NativeImage>),
    ThumbnailUnpacked(ThumbnailGeometry),
    Thumbnail(Option<NativeImage>),
    Recycled,
}

pub(crate) struct Job {
    id: TaskId,
    operation: Operation,
}

/// A finished job on its way back to the primary context.
#[derive(Debug)]
pub(crate) struct Completion {
    pub id: TaskId,
    pub context: ContextId,
    pub operation: &'static str,
    pub result: Result<NativeOutcome, BridgeError>,
    pub report: JobReport,
}

/// Shared by the host loop and every processor context it created.
pub(crate) struct Dispatcher {
    runtime: Runtime,
    completions: UnboundedSender<Completion>,
    pub(crate) receiver: RefCell<UnboundedReceiver<Completion>>,
    pub(crate) sinks: RefCell<HashMap<TaskId, CompletionSink>>,
    next_task: Cell<TaskId>,
    next_context: Cell<ContextId>,
}

impl Dispatcher {
    pub(crate) fn new(runtime: Runtime) -> Self {
        let (completions, receiver) = mpsc::unbounded_channel();
        Self {
            runtime,
            completions,
            receiver: RefCell::new(receiver),
            sinks: RefCell::new(HashMap::new()),
            next_task: Cell::new(1),
            next_context: Cell::new(1),
        }
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    fn next_task_id(&self) -> TaskId {
        let id = self.next_task.get();
        self.next_task.set(id + 1);
        id
    }

    /// Move a processor onto the worker runtime and return its queue.
    pub(crate) fn attach<E: RawEngine>(
        self: &Rc<Self>,
        processor: NativeProcessor<E>,
    ) -> ContextQueue {
        let context = self.next_context.get();
        self.next_context.set(context + 1);

        let (jobs, queue) = mpsc::unbounded_channel();
        self.runtime.spawn(drain(
            context,
            Arc::new(Mutex::new(processor)),
            queue,
            self.completions.clone(),
        ));
        tracing::info!(context, "processor context attached");

        ContextQueue {
            context,
            jobs,
            dispatcher: Rc::clone(self),
        }
    }
}

/// Submission side of one processor context.
pub struct ContextQueue {
    context: ContextId,
    jobs: UnboundedSender<Job>,
    dispatcher: Rc<Dispatcher>,
}

impl ContextQueue {
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Allocate the id for a task about to be submitted.
    pub fn next_id(&self) -> TaskId {
        self.dispatcher.next_task_id()
    }

    /// Queue a task. Returns at once; the sink runs on a later
    /// `poll`/`turn` of the host loop.
    pub fn submit(&self, task: PendingTask) -> TaskId {
        let PendingTask {
            id,
            operation,
            sink,
        } = task;
        tracing::debug!(
            task = id,
            context = self.context,
            operation = operation.name(),
            "task submitted"
        );
        self.dispatcher.sinks.borrow_mut().insert(id, sink);
        self.send(id, operation);
        id
    }

    /// Queue a task whose outcome nobody waits for.
    pub fn submit_detached(&self, operation: Operation) -> TaskId {
        let id = self.next_id();
        tracing::debug!(
            task = id,
            context = self.context,
            operation = operation.name(),
            "detached task submitted"
        );
        self.send(id, operation);
        id
    }

    fn send(&self, id: TaskId, operation: Operation) {
        let name = operation.name();
        if self.jobs.send(Job { id, operation }).is_err() {
            // The drain loop is gone; the sink still gets exactly one call.
            tracing::warn!(task = id, context = self.context, "processor context closed");
            let _ = self.dispatcher.completions.send(Completion {
                id,
                context: self.context,
                operation: name,
                result: Err(BridgeError::Disconnected),
                report: JobReport::default(),
            });
        }
    }
}

/// Interpret one operation against the processor.
pub fn execute<E: RawEngine>(
    processor: &mut NativeProcessor<E>,
    operation: Operation,
) -> Result<NativeOutcome, BridgeError> {
    match operation {
        Operation::LoadFile(path) => processor.open(Source::File(path)).map(NativeOutcome::Opened),
        Operation::LoadBuffer(data) => processor
            .open(Source::Buffer(data))
            .map(NativeOutcome::Opened),
        Operation::Unpack => processor.unpack().map(|()| NativeOutcome::Unpacked),
        Operation::Process(params) => processor.process(&params).map(NativeOutcome::Processed),
        Operation::MakeImage => processor.make_memory_image().map(NativeOutcome::Image),
        Operation::UnpackThumbnail => processor
            .unpack_thumbnail()
            .map(NativeOutcome::ThumbnailUnpacked),
        Operation::MakeThumbnail => processor.make_memory_thumbnail().map(NativeOutcome::Thumbnail),
        Operation::ThumbnailImage => processor.thumbnail_image().map(NativeOutcome::Thumbnail),
        Operation::Recycle => {
            processor.recycle();
            Ok(NativeOutcome::Recycled)
        }
    }
}

async fn drain<E: RawEngine>(
    context: ContextId,
    processor: Arc<Mutex<NativeProcessor<E>>>,
    mut queue: UnboundedReceiver<Job>,
    completions: UnboundedSender<Completion>,
) {
    while let Some(Job { id, operation }) = queue.recv().await {
        let name = operation.name();
        let worker = Arc::clone(&processor);
        let joined = tokio::task::spawn_blocking(move || {
            // A panicked job leaves the lock poisoned; the processor itself
            // is still usable.
            let mut guard = worker.lock().unwrap_or_else(PoisonError::into_inner);
            let result = execute(&mut guard, operation);
            (result, JobReport::read(&guard))
        })
        .await;

        let (result, report) = match joined {
            Ok(done) => done,
            Err(e) => {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                };
                tracing::warn!(task = id, context, operation = name, %reason, "job panicked");
                // Whatever the job managed before unwinding is still in place.
                let guard = processor.lock().unwrap_or_else(PoisonError::into_inner);
                (Err(BridgeError::Worker(reason)), JobReport::read(&guard))
            }
        };

        let completion = Completion {
            id,
            context,
            operation: name,
            result,
            report,
        };
        if completions.send(completion).is_err() {
            tracing::debug!(context, "host loop gone, stopping drain loop");
            break;
        }
    }
    tracing::info!(context, "processor context drained");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureEngine, FIXTURE_MAGIC};
    use crate::processor::LifecycleState;

    #[test]
    fn test_execute_open_then_process() {
        let mut processor = NativeProcessor::new(FixtureEngine::new());
        let opened = execute(&mut processor, Operation::LoadBuffer(FIXTURE_MAGIC.to_vec())).unwrap();
        assert!(matches!(opened, NativeOutcome::Opened(s) if s.width == 100));

        let processed = execute(
            &mut processor,
            Operation::Process(ProcessingParams::default()),
        )
        .unwrap();
        assert!(matches!(processed, NativeOutcome::Processed(_)));
        assert_eq!(processor.state(), LifecycleState::Processed);

        let image = execute(&mut processor, Operation::MakeImage).unwrap();
        assert!(matches!(image, NativeOutcome::Image(Some(_))));
    }

    #[test]
    fn test_execute_recycle() {
        let mut processor = NativeProcessor::new(FixtureEngine::new());
        execute(&mut processor, Operation::LoadBuffer(FIXTURE_MAGIC.to_vec())).unwrap();
        let outcome = execute(&mut processor, Operation::Recycle).unwrap();
        assert!(matches!(outcome, NativeOutcome::Recycled));
        assert_eq!(processor.state(), LifecycleState::Empty);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::LoadFile(PathBuf::from("a")).name(), "load-file");
        assert_eq!(Operation::ThumbnailImage.name(), "thumbnail-image");
        assert!(Operation::LoadBuffer(vec![1]).is_open());
        assert!(!Operation::Unpack.is_open());
    }

    #[test]
    fn test_panic_message_extracts_strings() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7u8)), "job panicked");
    }
}
