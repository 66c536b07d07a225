//! Host-facing processor object.
//!
//! [`Processor`] validates arguments and lifecycle preconditions on the
//! calling thread, then queues the work. Because every task of one
//! processor runs in submission order, calls can be chained without waiting
//! for earlier callbacks: an `unpack` issued right after `open_buffer`
//! runs after the open has finished.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use rawbridge_core::{
    CameraMetadata, ColorInfo, ColorSpace, DemosaicQuality, Gamma, HighlightMode, ImageSizes,
    LensInfo, OutputBits, ProcessingParams,
};

use crate::dispatch::{CompletionSink, ContextQueue, Operation, PendingTask, TaskId};
use crate::error::BridgeError;
use crate::marshal::{MemImage, OpenResult, ProcessResult, TaskOutput, ThumbnailInfo};
use crate::processor::{ImageInfo, LifecycleState};

/// State as seen from the host thread, ahead of the workers.
#[derive(Debug, Default)]
struct Projection {
    state: LifecycleState,
    /// Bumped by every open and recycle; completions from an older
    /// generation leave the projection alone.
    generation: u64,
    /// Newest task submitted. Its completion carries the worker's state
    /// with nothing queued behind it.
    last_task: TaskId,
    info: Option<ImageInfo>,
}

/// One RAW processor bound to the host loop that created it.
pub struct Processor {
    queue: ContextQueue,
    projection: Rc<RefCell<Projection>>,
    params: ProcessingParams,
}

impl Processor {
    pub(crate) fn new(queue: ContextQueue, params: ProcessingParams) -> Self {
        Self {
            queue,
            projection: Rc::new(RefCell::new(Projection::default())),
            params,
        }
    }

    fn require_loaded(&self) -> Result<(), BridgeError> {
        if self.projection.borrow().state == LifecycleState::Empty {
            return Err(BridgeError::InvalidState("No file loaded".to_string()));
        }
        Ok(())
    }

    fn advance(&self, state: LifecycleState) {
        let mut projection = self.projection.borrow_mut();
        projection.state = projection.state.max(state);
    }

    /// Start a new generation in the given state.
    fn reset(&self, state: LifecycleState) {
        let mut projection = self.projection.borrow_mut();
        projection.generation += 1;
        projection.state = state;
        projection.info = None;
    }

    fn submit<T, F>(&self, operation: Operation, callback: F) -> TaskId
    where
        T: TryFrom<TaskOutput, Error = BridgeError> + 'static,
        F: FnOnce(Result<T, BridgeError>) + 'static,
    {
        let id = self.queue.next_id();
        let generation = {
            let mut projection = self.projection.borrow_mut();
            projection.last_task = id;
            projection.generation
        };
        let projection = Rc::clone(&self.projection);
        let is_open = operation.is_open();

        let sink: CompletionSink = Box::new(move |result, report| {
            {
                let mut p = projection.borrow_mut();
                if p.generation == generation {
                    match &result {
                        Ok(_) => {
                            if report.info.is_some() {
                                p.info = report.info;
                            }
                        }
                        Err(_) if is_open => {
                            p.state = LifecycleState::Empty;
                            p.info = None;
                        }
                        Err(_) => {}
                    }
                    // Undo the optimistic advance of a failed unpack or process.
                    if p.last_task == id {
                        if let Some(state) = report.state {
                            p.state = state;
                        }
                    }
                }
            }
            callback(result.and_then(T::try_from));
        });

        self.queue.submit(PendingTask {
            id,
            operation,
            sink,
        })
    }

    /// Open a RAW file. The processor counts as loaded from this call on;
    /// a failed open puts it back to empty when its callback runs.
    pub fn open_file<P, F>(&mut self, path: P, callback: F) -> Result<TaskId, BridgeError>
    where
        P: AsRef<Path>,
        F: FnOnce(Result<OpenResult, BridgeError>) + 'static,
    {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "Expected a non-empty path".to_string(),
            ));
        }
        self.reset(LifecycleState::Loaded);
        Ok(self.submit(Operation::LoadFile(path.to_path_buf()), callback))
    }

    /// Open an in-memory RAW file. The bytes are copied before this returns.
    pub fn open_buffer<F>(&mut self, data: &[u8], callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<OpenResult, BridgeError>) + 'static,
    {
        if data.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "Expected a non-empty buffer".to_string(),
            ));
        }
        self.reset(LifecycleState::Loaded);
        Ok(self.submit(Operation::LoadBuffer(data.to_vec()), callback))
    }

    pub fn unpack<F>(&mut self, callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<(), BridgeError>) + 'static,
    {
        self.require_loaded()?;
        self.advance(LifecycleState::Unpacked);
        Ok(self.submit(Operation::Unpack, callback))
    }

    /// Process with the parameters as they are now. Setter calls made
    /// afterwards only affect later `process` calls.
    pub fn process<F>(&mut self, callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<ProcessResult, BridgeError>) + 'static,
    {
        self.require_loaded()?;
        self.advance(LifecycleState::Processed);
        Ok(self.submit(Operation::Process(self.params.clone()), callback))
    }

    pub fn make_memory_image<F>(&mut self, callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<MemImage, BridgeError>) + 'static,
    {
        self.require_loaded()?;
        Ok(self.submit(Operation::MakeImage, callback))
    }

    pub fn unpack_thumbnail<F>(&mut self, callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<ThumbnailInfo, BridgeError>) + 'static,
    {
        self.require_loaded()?;
        Ok(self.submit(Operation::UnpackThumbnail, callback))
    }

    /// Fails through the callback when no thumbnail has been unpacked.
    pub fn make_memory_thumbnail<F>(&mut self, callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<MemImage, BridgeError>) + 'static,
    {
        Ok(self.submit(Operation::MakeThumbnail, callback))
    }

    /// Unpack the embedded thumbnail if needed and copy it out.
    pub fn thumbnail_image<F>(&mut self, callback: F) -> Result<TaskId, BridgeError>
    where
        F: FnOnce(Result<MemImage, BridgeError>) + 'static,
    {
        self.require_loaded()?;
        Ok(self.submit(Operation::ThumbnailImage, callback))
    }

    /// Release the current image. Work already queued still runs first.
    pub fn recycle(&mut self) {
        self.reset(LifecycleState::Empty);
        self.queue.submit_detached(Operation::Recycle);
    }

    pub fn close(&mut self) {
        self.recycle();
    }

    pub fn is_loaded(&self) -> bool {
        self.projection.borrow().state != LifecycleState::Empty
    }

    pub fn state(&self) -> LifecycleState {
        self.projection.borrow().state
    }

    fn with_info<T>(&self, read: impl FnOnce(&ImageInfo) -> T) -> Result<T, BridgeError> {
        let projection = self.projection.borrow();
        if projection.state == LifecycleState::Empty {
            return Err(BridgeError::InvalidState("No file loaded".to_string()));
        }
        projection
            .info
            .as_ref()
            .map(read)
            .ok_or_else(|| BridgeError::InvalidState("Image metadata not available yet".to_string()))
    }

    pub fn metadata(&self) -> Result<CameraMetadata, BridgeError> {
        self.with_info(|info| info.metadata.clone())
    }

    pub fn image_size(&self) -> Result<ImageSizes, BridgeError> {
        self.with_info(|info| info.sizes)
    }

    pub fn lens_info(&self) -> Result<LensInfo, BridgeError> {
        self.with_info(|info| info.lens.clone())
    }

    pub fn color_info(&self) -> Result<ColorInfo, BridgeError> {
        self.with_info(|info| info.color)
    }

    pub fn params(&self) -> &ProcessingParams {
        &self.params
    }

    pub fn set_params(&mut self, params: ProcessingParams) {
        self.params = params;
    }

    pub fn set_output_color_space(&mut self, code: i32) -> Result<(), BridgeError> {
        self.params.output_color = ColorSpace::try_from(code)?;
        Ok(())
    }

    pub fn set_output_bps(&mut self, bits: u8) -> Result<(), BridgeError> {
        self.params.output_bps = OutputBits::try_from(bits)
            .map_err(|_| BridgeError::InvalidArgument(format!("Bits must be 8 or 16, got {}", bits)))?;
        Ok(())
    }

    pub fn set_gamma(&mut self, power: f64, slope: f64) -> Result<(), BridgeError> {
        if !(power.is_finite() && power > 0.0 && slope.is_finite() && slope > 0.0) {
            return Err(BridgeError::InvalidArgument(format!(
                "Gamma must be finite and positive, got ({}, {})",
                power, slope
            )));
        }
        self.params.gamma = Gamma { power, slope };
        Ok(())
    }

    /// Manual white balance (R, G1, B, G2). Turns camera and auto white
    /// balance off.
    pub fn set_white_balance(&mut self, multipliers: [f32; 4]) -> Result<(), BridgeError> {
        if multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(BridgeError::InvalidArgument(format!(
                "White balance multipliers must be finite and non-negative, got {:?}",
                multipliers
            )));
        }
        self.params.set_user_multipliers(multipliers);
        Ok(())
    }

    pub fn set_half_size(&mut self, half_size: bool) {
        self.params.half_size = half_size;
    }

    pub fn set_no_auto_bright(&mut self, no_auto_bright: bool) {
        self.params.no_auto_bright = no_auto_bright;
    }

    pub fn set_use_camera_wb(&mut self, use_camera_wb: bool) {
        self.params.use_camera_wb = use_camera_wb;
    }

    pub fn set_use_auto_wb(&mut self, use_auto_wb: bool) {
        self.params.use_auto_wb = use_auto_wb;
    }

    pub fn set_quality(&mut self, code: i32) -> Result<(), BridgeError> {
        self.params.quality = DemosaicQuality::try_from(code)?;
        Ok(())
    }

    pub fn set_highlight_mode(&mut self, code: i32) -> Result<(), BridgeError> {
        self.params.highlight = HighlightMode::try_from(code)?;
        Ok(())
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        self.queue.submit_detached(Operation::Recycle);
    }
}
