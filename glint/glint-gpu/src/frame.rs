//! Per-window presentation state and the frame orchestration protocol:
//! acquire, fence wait, reclaim, record, submit, present, with deferred
//! resource reclamation and staleness handling.

use std::time::Duration;

use crate::{
    AcquiredImage, CommandBuffer, CommandPool, Device, Fence, PresentOutcome, Queue, RecordFn,
    Semaphore, Swapchain,
};

/// Sleep taken instead of rendering while the drawable size is degenerate
/// (minimized window). Keeps the loop from spinning without touching the GPU.
pub const DEGENERATE_FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Cleanup action whose GPU usage is finished once the owning slot's fence
/// signals.
pub type DeferredFree = Box<dyn FnOnce() + Send>;

/// Outcome of one `render_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was recorded and submitted; present it next.
    Rendered,
    /// Drawable size was degenerate; nothing touched the GPU.
    SkippedDegenerate,
    /// The swapchain is stale. Rebuild before the next frame.
    RebuildNeeded,
}

/// Per-image bundle of command recording and synchronization state.
/// The retained buffer is declared before the pool so it is freed first on
/// drop.
pub struct FrameSlot {
    /// Buffer submitted last time this slot was used. Retained until the
    /// slot's fence has been waited on again.
    pub command_buffer: Option<Box<dyn CommandBuffer>>,
    pub command_pool: Box<dyn CommandPool>,
    /// Signaled when this slot's submitted work has finished on the GPU.
    /// Created signaled so the first wait passes immediately.
    pub fence: Box<dyn Fence>,
    pub image_acquired: Box<dyn Semaphore>,
    pub render_complete: Box<dyn Semaphore>,
    free_queue: Vec<DeferredFree>,
}

impl FrameSlot {
    fn new(device: &dyn Device) -> Result<Self, String> {
        Ok(Self {
            command_buffer: None,
            command_pool: device.create_command_pool()?,
            fence: device.create_fence(true)?,
            image_acquired: device.create_semaphore()?,
            render_complete: device.create_semaphore()?,
            free_queue: Vec::new(),
        })
    }
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("command_pool", &self.command_pool)
            .field("has_command_buffer", &self.command_buffer.is_some())
            .field("pending_frees", &self.free_queue.len())
            .finish_non_exhaustive()
    }
}

/// Presentation state for one window: the swapchain plus one `FrameSlot` per
/// image. Fence and command pool are selected by the acquired image index;
/// the semaphore pair is selected by a separate ring index that only
/// advances after a successful present.
pub struct PresentationSurface {
    swapchain: Box<dyn Swapchain>,
    slots: Vec<FrameSlot>,
    /// Ring index selecting the semaphore pair for the next acquire/submit.
    semaphore_index: usize,
    /// Image index acquired by the last frame. New deferred frees attach
    /// here; they run once that image's fence is waited on again.
    last_acquired: usize,
    /// Image rendered this tick, not yet presented.
    pending_present: Option<u32>,
    needs_rebuild: bool,
    clear_color: [f32; 4],
    frames_rendered: u64,
}

impl PresentationSurface {
    /// Build frame slots for every image of `swapchain`. The swapchain must
    /// expose at least two images so the CPU can record frame N+1 while the
    /// GPU consumes frame N.
    pub fn new(device: &dyn Device, swapchain: Box<dyn Swapchain>) -> Result<Self, String> {
        let count = swapchain.image_count() as usize;
        if count < 2 {
            return Err(format!(
                "presentation surface needs at least 2 images, swapchain has {count}"
            ));
        }
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(FrameSlot::new(device)?);
        }
        Ok(Self {
            swapchain,
            slots,
            semaphore_index: 0,
            last_acquired: 0,
            pending_present: None,
            needs_rebuild: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames_rendered: 0,
        })
    }

    /// Record and submit one frame. `draw_size` is the window's current
    /// drawable size in pixels; `record` is invoked once inside the render
    /// pass. Returns without touching the GPU when the size is degenerate or
    /// a rebuild is pending, and flags a rebuild on staleness instead of
    /// treating it as an error.
    pub fn render_frame(
        &mut self,
        queue: &dyn Queue,
        draw_size: (u32, u32),
        record: &mut RecordFn<'_>,
    ) -> Result<FrameOutcome, String> {
        if draw_size.0 == 0 || draw_size.1 == 0 {
            std::thread::sleep(DEGENERATE_FRAME_SLEEP);
            return Ok(FrameOutcome::SkippedDegenerate);
        }
        if self.needs_rebuild {
            return Ok(FrameOutcome::RebuildNeeded);
        }

        let acquired = {
            let signal = self.slots[self.semaphore_index].image_acquired.as_ref();
            self.swapchain.acquire_next_image(signal)?
        };
        let image_index = match acquired {
            AcquiredImage::Ready {
                index,
                suboptimal: false,
            } => index,
            AcquiredImage::Ready {
                suboptimal: true, ..
            }
            | AcquiredImage::OutOfDate => {
                self.needs_rebuild = true;
                return Ok(FrameOutcome::RebuildNeeded);
            }
        };

        {
            let slot = &mut self.slots[image_index as usize];
            slot.fence.wait(u64::MAX)?;
            slot.fence.reset()?;
            // The GPU is done with this slot: run deferred frees in the
            // order they were queued, then release last frame's buffer
            // before resetting the pool it came from.
            for free in slot.free_queue.drain(..) {
                free();
            }
            slot.command_buffer = None;
            slot.command_pool.reset()?;
        }

        let cmd = self.slots[image_index as usize].command_pool.allocate()?;
        self.swapchain
            .record_frame(cmd.as_ref(), image_index, self.clear_color, record)?;

        {
            let slot = &self.slots[image_index as usize];
            let ring = &self.slots[self.semaphore_index];
            queue.submit(
                &[cmd.as_ref()],
                &[ring.image_acquired.as_ref()],
                &[ring.render_complete.as_ref()],
                Some(slot.fence.as_ref()),
            )?;
        }
        self.slots[image_index as usize].command_buffer = Some(cmd);

        self.last_acquired = image_index as usize;
        self.pending_present = Some(image_index);
        self.frames_rendered += 1;
        Ok(FrameOutcome::Rendered)
    }

    /// Present the frame rendered this tick, if any. Advances the semaphore
    /// ring on success; a stale present flags a rebuild instead of erroring.
    pub fn present_frame(&mut self, queue: &dyn Queue) -> Result<(), String> {
        if self.needs_rebuild {
            return Ok(());
        }
        let Some(image_index) = self.pending_present.take() else {
            return Ok(());
        };
        let outcome = {
            let ring = &self.slots[self.semaphore_index];
            self.swapchain
                .present(queue, image_index, ring.render_complete.as_ref())?
        };
        match outcome {
            PresentOutcome::Presented => {
                self.semaphore_index = (self.semaphore_index + 1) % self.slots.len();
            }
            PresentOutcome::Suboptimal | PresentOutcome::OutOfDate => {
                log::debug!("presentation surface is stale, scheduling a rebuild");
                self.needs_rebuild = true;
            }
        }
        Ok(())
    }

    /// Queue a cleanup to run once the GPU has finished with the frame most
    /// recently rendered on this surface.
    pub fn defer_free(&mut self, free: impl FnOnce() + Send + 'static) {
        self.slots[self.last_acquired].free_queue.push(Box::new(free));
    }

    /// Tear down and recreate the swapchain and every frame slot at
    /// `extent`. Waits the device idle first, which also makes all pending
    /// deferred frees safe to run.
    pub fn rebuild(&mut self, device: &dyn Device, extent: (u32, u32)) -> Result<(), String> {
        device.wait_idle()?;
        for slot in &mut self.slots {
            for free in slot.free_queue.drain(..) {
                free();
            }
        }
        let count = self.swapchain.rebuild(device, extent)? as usize;
        if count < 2 {
            return Err(format!(
                "swapchain rebuilt with {count} images, need at least 2"
            ));
        }
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(FrameSlot::new(device)?);
        }
        self.slots = slots;
        self.semaphore_index = 0;
        self.last_acquired = 0;
        self.pending_present = None;
        self.needs_rebuild = false;
        log::debug!(
            "presentation surface rebuilt at {}x{} with {} images",
            extent.0,
            extent.1,
            count
        );
        Ok(())
    }

    /// True when the swapchain went stale and `rebuild` must run before the
    /// next frame.
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Flag the surface stale from the outside (e.g. a resize event).
    pub fn request_rebuild(&mut self) {
        self.needs_rebuild = true;
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn extent(&self) -> (u32, u32) {
        self.swapchain.extent()
    }

    pub fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    /// Frames actually recorded and submitted (skipped and stale ticks do
    /// not count).
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

impl std::fmt::Debug for PresentationSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationSurface")
            .field("slots", &self.slots.len())
            .field("semaphore_index", &self.semaphore_index)
            .field("needs_rebuild", &self.needs_rebuild)
            .field("frames_rendered", &self.frames_rendered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Acquire { sem: usize },
        FenceWait(usize),
        FenceReset(usize),
        Freed(u32),
        PoolReset(usize),
        Record { image: u32 },
        Submit { fence: usize },
        Present { image: u32 },
        WaitIdle,
        Rebuild { extent: (u32, u32) },
    }

    type CallLog = Arc<Mutex<Vec<Call>>>;

    fn position(log: &[Call], call: &Call) -> usize {
        log.iter()
            .position(|c| c == call)
            .unwrap_or_else(|| panic!("{call:?} not found in {log:?}"))
    }

    #[derive(Debug)]
    struct FakeFence {
        slot: usize,
        log: CallLog,
    }

    impl Fence for FakeFence {
        fn wait(&self, _timeout_ns: u64) -> Result<(), String> {
            self.log.lock().unwrap().push(Call::FenceWait(self.slot));
            Ok(())
        }
        fn reset(&self) -> Result<(), String> {
            self.log.lock().unwrap().push(Call::FenceReset(self.slot));
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct FakeSemaphore {
        id: usize,
    }

    impl Semaphore for FakeSemaphore {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct FakeCommandPool {
        slot: usize,
        log: CallLog,
    }

    impl CommandPool for FakeCommandPool {
        fn reset(&self) -> Result<(), String> {
            self.log.lock().unwrap().push(Call::PoolReset(self.slot));
            Ok(())
        }
        fn allocate(&self) -> Result<Box<dyn CommandBuffer>, String> {
            Ok(Box::new(FakeCommandBuffer { pool: self.slot }))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct FakeCommandBuffer {
        pool: usize,
    }

    impl CommandBuffer for FakeCommandBuffer {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct FakeQueue {
        log: CallLog,
    }

    impl Queue for FakeQueue {
        fn submit(
            &self,
            _command_buffers: &[&dyn CommandBuffer],
            _wait_semaphores: &[&dyn Semaphore],
            _signal_semaphores: &[&dyn Semaphore],
            signal_fence: Option<&dyn Fence>,
        ) -> Result<(), String> {
            let fence = signal_fence
                .and_then(|f| f.as_any().downcast_ref::<FakeFence>())
                .map(|f| f.slot)
                .unwrap_or(usize::MAX);
            self.log.lock().unwrap().push(Call::Submit { fence });
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug, Default)]
    struct Counters {
        fences: usize,
        pools: usize,
        semaphores: usize,
    }

    #[derive(Debug)]
    struct FakeDevice {
        log: CallLog,
        counters: Mutex<Counters>,
        all_fences_signaled: Mutex<bool>,
    }

    impl FakeDevice {
        fn new(log: CallLog) -> Self {
            Self {
                log,
                counters: Mutex::new(Counters::default()),
                all_fences_signaled: Mutex::new(true),
            }
        }
    }

    impl Device for FakeDevice {
        fn create_fence(&self, signaled: bool) -> Result<Box<dyn Fence>, String> {
            let mut counters = self.counters.lock().unwrap();
            let slot = counters.fences;
            counters.fences += 1;
            if !signaled {
                *self.all_fences_signaled.lock().unwrap() = false;
            }
            Ok(Box::new(FakeFence {
                slot,
                log: self.log.clone(),
            }))
        }
        fn create_semaphore(&self) -> Result<Box<dyn Semaphore>, String> {
            let mut counters = self.counters.lock().unwrap();
            let id = counters.semaphores;
            counters.semaphores += 1;
            Ok(Box::new(FakeSemaphore { id }))
        }
        fn create_command_pool(&self) -> Result<Box<dyn CommandPool>, String> {
            let mut counters = self.counters.lock().unwrap();
            let slot = counters.pools;
            counters.pools += 1;
            Ok(Box::new(FakeCommandPool {
                slot,
                log: self.log.clone(),
            }))
        }
        fn queue(&self) -> Result<Box<dyn Queue>, String> {
            Ok(Box::new(FakeQueue {
                log: self.log.clone(),
            }))
        }
        fn wait_idle(&self) -> Result<(), String> {
            self.log.lock().unwrap().push(Call::WaitIdle);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct FakeSwapchain {
        log: CallLog,
        images: u32,
        acquire_script: Mutex<VecDeque<AcquiredImage>>,
        present_script: Mutex<VecDeque<PresentOutcome>>,
        extent: (u32, u32),
    }

    impl FakeSwapchain {
        fn new(log: CallLog, images: u32) -> Self {
            Self {
                log,
                images,
                acquire_script: Mutex::new(VecDeque::new()),
                present_script: Mutex::new(VecDeque::new()),
                extent: (640, 480),
            }
        }

        fn script_acquires(&self, results: impl IntoIterator<Item = AcquiredImage>) {
            self.acquire_script.lock().unwrap().extend(results);
        }

        fn script_presents(&self, results: impl IntoIterator<Item = PresentOutcome>) {
            self.present_script.lock().unwrap().extend(results);
        }
    }

    impl Swapchain for FakeSwapchain {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn acquire_next_image(&mut self, signal: &dyn Semaphore) -> Result<AcquiredImage, String> {
            let sem = signal
                .as_any()
                .downcast_ref::<FakeSemaphore>()
                .map(|s| s.id)
                .unwrap_or(usize::MAX);
            self.log.lock().unwrap().push(Call::Acquire { sem });
            Ok(self
                .acquire_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(AcquiredImage::Ready {
                    index: 0,
                    suboptimal: false,
                }))
        }
        fn record_frame(
            &self,
            cmd: &dyn CommandBuffer,
            image_index: u32,
            _clear: [f32; 4],
            record: &mut RecordFn<'_>,
        ) -> Result<(), String> {
            self.log
                .lock()
                .unwrap()
                .push(Call::Record { image: image_index });
            record(cmd)
        }
        fn present(
            &self,
            _queue: &dyn Queue,
            image_index: u32,
            _wait: &dyn Semaphore,
        ) -> Result<PresentOutcome, String> {
            self.log
                .lock()
                .unwrap()
                .push(Call::Present { image: image_index });
            Ok(self
                .present_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PresentOutcome::Presented))
        }
        fn rebuild(&mut self, _device: &dyn Device, extent: (u32, u32)) -> Result<u32, String> {
            self.log.lock().unwrap().push(Call::Rebuild { extent });
            self.extent = extent;
            Ok(self.images)
        }
        fn extent(&self) -> (u32, u32) {
            self.extent
        }
        fn image_count(&self) -> u32 {
            self.images
        }
    }

    struct Harness {
        surface: PresentationSurface,
        device: FakeDevice,
        queue: FakeQueue,
        log: CallLog,
    }

    fn harness(images: u32) -> Harness {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let device = FakeDevice::new(log.clone());
        let swapchain = Box::new(FakeSwapchain::new(log.clone(), images));
        let surface = PresentationSurface::new(&device, swapchain).unwrap();
        let queue = FakeQueue { log: log.clone() };
        Harness {
            surface,
            device,
            queue,
            log,
        }
    }

    fn script_acquires(surface: &PresentationSurface, results: Vec<AcquiredImage>) {
        surface
            .swapchain
            .as_any()
            .downcast_ref::<FakeSwapchain>()
            .unwrap()
            .script_acquires(results);
    }

    fn script_presents(surface: &PresentationSurface, results: Vec<PresentOutcome>) {
        surface
            .swapchain
            .as_any()
            .downcast_ref::<FakeSwapchain>()
            .unwrap()
            .script_presents(results);
    }

    fn no_draw() -> impl FnMut(&dyn CommandBuffer) -> Result<(), String> {
        |_cmd| Ok(())
    }

    #[test]
    fn fences_start_signaled() {
        let h = harness(3);
        assert!(*h.device.all_fences_signaled.lock().unwrap());
        assert_eq!(h.device.counters.lock().unwrap().fences, 3);
    }

    #[test]
    fn rejects_single_image_swapchain() {
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let device = FakeDevice::new(log.clone());
        let swapchain = Box::new(FakeSwapchain::new(log, 1));
        assert!(PresentationSurface::new(&device, swapchain).is_err());
    }

    #[test]
    fn fence_waited_and_reset_before_pool_reset() {
        let mut h = harness(2);
        let outcome = h
            .surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);

        let log = h.log.lock().unwrap();
        let wait = position(&log, &Call::FenceWait(0));
        let reset = position(&log, &Call::FenceReset(0));
        let pool = position(&log, &Call::PoolReset(0));
        let record = position(&log, &Call::Record { image: 0 });
        let submit = position(&log, &Call::Submit { fence: 0 });
        assert!(wait < reset, "fence must be waited before reset: {log:?}");
        assert!(reset < pool, "pool reset must follow the fence: {log:?}");
        assert!(pool < record && record < submit);
    }

    #[test]
    fn deferred_frees_run_once_in_order_after_fence() {
        let mut h = harness(2);
        for tag in 1..=3 {
            let log = h.log.clone();
            h.surface
                .defer_free(move || log.lock().unwrap().push(Call::Freed(tag)));
        }
        // Both frames acquire image 0 so the second wait reclaims the slot
        // the frees were queued on.
        script_acquires(
            &h.surface,
            vec![
                AcquiredImage::Ready {
                    index: 0,
                    suboptimal: false,
                },
                AcquiredImage::Ready {
                    index: 0,
                    suboptimal: false,
                },
            ],
        );
        h.surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        h.surface.present_frame(&h.queue).unwrap();

        {
            let log = h.log.lock().unwrap();
            let wait = position(&log, &Call::FenceWait(0));
            let pool = position(&log, &Call::PoolReset(0));
            for tag in 1..=3 {
                let freed = position(&log, &Call::Freed(tag));
                assert!(wait < freed && freed < pool, "free {tag} outside the fence window: {log:?}");
            }
            let order: Vec<_> = log
                .iter()
                .filter_map(|c| match c {
                    Call::Freed(tag) => Some(*tag),
                    _ => None,
                })
                .collect();
            assert_eq!(order, vec![1, 2, 3]);
        }

        h.surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        let log = h.log.lock().unwrap();
        let total = log.iter().filter(|c| matches!(c, Call::Freed(_))).count();
        assert_eq!(total, 3, "deferred frees must run exactly once");
    }

    #[test]
    fn degenerate_size_skips_gpu_and_sleeps() {
        let mut h = harness(2);
        let start = Instant::now();
        let outcome = h
            .surface
            .render_frame(&h.queue, (0, 480), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::SkippedDegenerate);
        assert!(start.elapsed() >= DEGENERATE_FRAME_SLEEP);
        let outcome = h
            .surface
            .render_frame(&h.queue, (640, 0), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::SkippedDegenerate);
        h.surface.present_frame(&h.queue).unwrap();
        assert!(h.log.lock().unwrap().is_empty(), "no backend call expected");
        assert_eq!(h.surface.frames_rendered(), 0);
    }

    #[test]
    fn out_of_date_acquire_flags_rebuild_without_fence_work() {
        let mut h = harness(2);
        script_acquires(&h.surface, vec![AcquiredImage::OutOfDate]);
        let outcome = h
            .surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::RebuildNeeded);
        assert!(h.surface.needs_rebuild());
        h.surface.present_frame(&h.queue).unwrap();

        {
            let log = h.log.lock().unwrap();
            assert_eq!(log.len(), 1, "only the acquire may reach the backend: {log:?}");
            assert!(matches!(log[0], Call::Acquire { .. }));
        }

        // The flag holds the next tick off the swapchain entirely.
        let outcome = h
            .surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::RebuildNeeded);
        assert_eq!(h.log.lock().unwrap().len(), 1);
        assert_eq!(h.surface.frames_rendered(), 0);
    }

    #[test]
    fn suboptimal_acquire_flags_rebuild() {
        let mut h = harness(2);
        script_acquires(
            &h.surface,
            vec![AcquiredImage::Ready {
                index: 0,
                suboptimal: true,
            }],
        );
        let outcome = h
            .surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::RebuildNeeded);
        assert!(h.surface.needs_rebuild());
        assert_eq!(h.surface.frames_rendered(), 0);
        let log = h.log.lock().unwrap();
        assert!(!log.iter().any(|c| matches!(c, Call::Submit { .. })));
        assert!(!log.iter().any(|c| matches!(c, Call::Present { .. })));
    }

    #[test]
    fn stale_present_flags_rebuild_and_keeps_ring() {
        let mut h = harness(2);
        script_presents(&h.surface, vec![PresentOutcome::Suboptimal]);
        h.surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        h.surface.present_frame(&h.queue).unwrap();
        assert!(h.surface.needs_rebuild());
        assert_eq!(h.surface.semaphore_index, 0, "ring must not advance on a stale present");
        let presents = h
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Present { .. }))
            .count();
        assert_eq!(presents, 1);
    }

    #[test]
    fn semaphore_ring_advances_after_successful_present() {
        let mut h = harness(2);
        script_acquires(
            &h.surface,
            vec![
                AcquiredImage::Ready {
                    index: 0,
                    suboptimal: false,
                },
                AcquiredImage::Ready {
                    index: 1,
                    suboptimal: false,
                },
                AcquiredImage::Ready {
                    index: 0,
                    suboptimal: false,
                },
            ],
        );
        for _ in 0..3 {
            h.surface
                .render_frame(&h.queue, (640, 480), &mut no_draw())
                .unwrap();
            h.surface.present_frame(&h.queue).unwrap();
        }
        let log = h.log.lock().unwrap();
        let sems: Vec<_> = log
            .iter()
            .filter_map(|c| match c {
                Call::Acquire { sem } => Some(*sem),
                _ => None,
            })
            .collect();
        assert_eq!(sems.len(), 3);
        assert_ne!(sems[0], sems[1], "second acquire must use the next ring slot");
        assert_eq!(sems[0], sems[2], "ring of two wraps on the third acquire");
        assert_eq!(h.surface.frames_rendered(), 3);
    }

    #[test]
    fn rebuild_waits_idle_runs_frees_and_clears_flag() {
        let mut h = harness(2);
        {
            let log = h.log.clone();
            h.surface
                .defer_free(move || log.lock().unwrap().push(Call::Freed(7)));
        }
        script_acquires(&h.surface, vec![AcquiredImage::OutOfDate]);
        h.surface
            .render_frame(&h.queue, (640, 480), &mut no_draw())
            .unwrap();
        assert!(h.surface.needs_rebuild());

        h.surface.rebuild(&h.device, (800, 600)).unwrap();
        assert!(!h.surface.needs_rebuild());
        assert_eq!(h.surface.extent(), (800, 600));

        {
            let log = h.log.lock().unwrap();
            let idle = position(&log, &Call::WaitIdle);
            let freed = position(&log, &Call::Freed(7));
            let rebuild = position(&log, &Call::Rebuild { extent: (800, 600) });
            assert!(idle < freed, "frees may only run once the device is idle");
            assert!(freed < rebuild);
        }

        // Fresh slots render normally after the rebuild.
        let outcome = h
            .surface
            .render_frame(&h.queue, (800, 600), &mut no_draw())
            .unwrap();
        assert_eq!(outcome, FrameOutcome::Rendered);
    }

    #[test]
    fn present_without_render_is_a_no_op() {
        let mut h = harness(2);
        h.surface.present_frame(&h.queue).unwrap();
        assert!(h.log.lock().unwrap().is_empty());
    }
}
