//! Dummy GPU device for testing and development.
//!
//! No GPU work is performed. Every call is logged at `trace` level and
//! counted, so tests can check exactly which resources the render graph
//! created, aliased or destroyed and which command lists reached the queue.
//! Failures can be injected to exercise the graph's error paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{CommandList, GpuDevice, GpuError, GpuHandle};
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Call counters of a [`DummyDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    pub textures_created: u64,
    pub buffers_created: u64,
    pub resources_destroyed: u64,
    pub command_lists_created: u64,
    pub command_lists_compiled: u64,
    pub submissions: u64,
    pub command_lists_submitted: u64,
    pub frames: u64,
    pub presents: u64,
}

#[derive(Debug)]
struct DummyResource {
    name: String,
    is_texture: bool,
}

/// Dummy GPU device.
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: AtomicU64,
    live: Mutex<HashMap<GpuHandle, DummyResource>>,
    stats: Mutex<DummyStats>,
    submitted: Mutex<Vec<Vec<String>>>,
    fail_next_texture: AtomicBool,
    fail_next_buffer: AtomicBool,
    fail_submit: AtomicBool,
    fail_compile: Mutex<HashSet<String>>,
}

impl DummyDevice {
    /// Create a new dummy device.
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Make the next texture creation fail.
    pub fn fail_next_texture_creation(&self) {
        self.fail_next_texture.store(true, Ordering::Release);
    }

    /// Make the next buffer creation fail.
    pub fn fail_next_buffer_creation(&self) {
        self.fail_next_buffer.store(true, Ordering::Release);
    }

    /// Make the next submission fail.
    pub fn fail_next_submit(&self) {
        self.fail_submit.store(true, Ordering::Release);
    }

    /// Fail compilation of every command list labelled `pass_name` until
    /// [`clear_failures`](Self::clear_failures) is called.
    pub fn fail_compile_for(&self, pass_name: impl Into<String>) {
        self.fail_compile.lock().insert(pass_name.into());
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.fail_next_texture.store(false, Ordering::Release);
        self.fail_next_buffer.store(false, Ordering::Release);
        self.fail_submit.store(false, Ordering::Release);
        self.fail_compile.lock().clear();
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> DummyStats {
        *self.stats.lock()
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_resource_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Number of live textures.
    pub fn live_texture_count(&self) -> usize {
        self.live.lock().values().filter(|r| r.is_texture).count()
    }

    /// Debug name a live resource was created with.
    pub fn resource_name(&self, handle: GpuHandle) -> Option<String> {
        self.live.lock().get(&handle).map(|r| r.name.clone())
    }

    /// Labels of the command lists of every submission, oldest first.
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submitted.lock().clone()
    }

    /// Labels of the most recent submission.
    pub fn last_submission(&self) -> Option<Vec<String>> {
        self.submitted.lock().last().cloned()
    }

    fn allocate(&self, name: &str, is_texture: bool) -> GpuHandle {
        let handle = GpuHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.live.lock().insert(
            handle,
            DummyResource {
                name: name.to_owned(),
                is_texture,
            },
        );
        handle
    }
}

impl GpuDevice for DummyDevice {
    fn name(&self) -> &str {
        "Dummy Device"
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
        initial_data: Option<&[u8]>,
        name: &str,
    ) -> Result<GpuHandle, GpuError> {
        log::trace!(
            "DummyDevice: creating texture '{}' ({}x{}x{}, {:?}, {:?}, initial data: {})",
            name,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth,
            descriptor.format,
            descriptor.bind_flags,
            initial_data.map_or(0, <[u8]>::len)
        );
        if self.fail_next_texture.swap(false, Ordering::AcqRel) {
            return Err(GpuError::ResourceCreationFailed(format!(
                "injected failure creating texture '{name}'"
            )));
        }
        self.stats.lock().textures_created += 1;
        Ok(self.allocate(name, true))
    }

    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
        name: &str,
    ) -> Result<GpuHandle, GpuError> {
        log::trace!(
            "DummyDevice: creating buffer '{}' (size: {}, stride: {}, {:?}, initial data: {})",
            name,
            descriptor.size,
            descriptor.stride,
            descriptor.bind_flags,
            initial_data.map_or(0, <[u8]>::len)
        );
        if self.fail_next_buffer.swap(false, Ordering::AcqRel) {
            return Err(GpuError::ResourceCreationFailed(format!(
                "injected failure creating buffer '{name}'"
            )));
        }
        self.stats.lock().buffers_created += 1;
        Ok(self.allocate(name, false))
    }

    fn destroy_resource(&self, handle: GpuHandle) {
        match self.live.lock().remove(&handle) {
            Some(resource) => {
                log::trace!("DummyDevice: destroying '{}' ({:?})", resource.name, handle);
                self.stats.lock().resources_destroyed += 1;
            }
            None => log::warn!("DummyDevice: destroying unknown resource {:?}", handle),
        }
    }

    fn create_command_list(&self) -> CommandList {
        self.stats.lock().command_lists_created += 1;
        CommandList::new()
    }

    fn compile_command_list(&self, list: &mut CommandList) -> Result<(), GpuError> {
        log::trace!(
            "DummyDevice: compiling '{}' ({} commands)",
            list.label(),
            list.command_count()
        );
        if self.fail_compile.lock().contains(list.label()) {
            return Err(GpuError::CompileFailed(format!(
                "injected failure compiling '{}'",
                list.label()
            )));
        }
        list.mark_compiled();
        self.stats.lock().command_lists_compiled += 1;
        Ok(())
    }

    fn submit_command_lists(&self, lists: &[CommandList]) -> Result<(), GpuError> {
        log::trace!("DummyDevice: submitting {} command lists", lists.len());
        if self.fail_submit.swap(false, Ordering::AcqRel) {
            return Err(GpuError::SubmitFailed("injected submission failure".into()));
        }
        if let Some(list) = lists.iter().find(|list| !list.is_compiled()) {
            return Err(GpuError::SubmitFailed(format!(
                "command list '{}' was not compiled",
                list.label()
            )));
        }
        {
            let mut stats = self.stats.lock();
            stats.submissions += 1;
            stats.command_lists_submitted += lists.len() as u64;
        }
        self.submitted
            .lock()
            .push(lists.iter().map(|list| list.label().to_owned()).collect());
        Ok(())
    }

    fn begin_frame(&self) {
        log::trace!("DummyDevice: begin frame");
    }

    fn end_frame(&self) {
        log::trace!("DummyDevice: end frame");
        self.stats.lock().frames += 1;
    }

    fn present(&self) -> Result<(), GpuError> {
        log::trace!("DummyDevice: present");
        self.stats.lock().presents += 1;
        Ok(())
    }
}
