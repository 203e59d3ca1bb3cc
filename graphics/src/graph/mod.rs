//! Render graph infrastructure.
//!
//! The render graph is rebuilt every frame. Passes are registered with a
//! setup closure that declares which resources they create, read and write;
//! each write produces a new *version* of the written resource. Executing the
//! graph for a required output then:
//!
//! 1. resolves the newest written version of the requested resource,
//! 2. walks backwards from it through the producers of every input, culling
//!    passes that do not contribute,
//! 3. binds physical resources, reusing pooled allocations from earlier
//!    frames whose descriptors match and destroying the ones left unclaimed,
//! 4. runs one job per surviving pass on the job system, each recording into
//!    a private command list and compiling it,
//! 5. waits for all pass jobs and submits the non-empty lists in pass
//!    registration order, or nothing at all if any pass failed,
//! 6. clears the frame's passes, resources and arena.
//!
//! # Architecture
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`RenderGraph`] | Owns the frame's passes, resources and aliasing pool |
//! | [`ResourceBuilder`] | Setup-phase declarations of one pass |
//! | [`PassContext`] | Execute-phase view of one pass |
//! | [`RenderPass`] | Execute phase of a pass |
//! | [`ResourceRef`] | Logical resource at a specific version |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fibra_core::jobs::{JobSystem, JobSystemConfig};
//! use fibra_graphics::{DummyDevice, GpuDevice, RenderGraph, RenderTargetAttachment};
//! use fibra_graphics::{PassContext, TextureDescriptor, TextureFormat};
//!
//! let system = JobSystem::new(JobSystemConfig::default())?;
//! let device: Arc<dyn GpuDevice> = Arc::new(DummyDevice::new());
//! let mut graph = RenderGraph::new();
//!
//! let mut color = Default::default();
//! graph.add_callback_render_pass("main", |builder| {
//!     let target = builder.create_texture(
//!         "color",
//!         TextureDescriptor::new_2d(1280, 720, TextureFormat::Rgba8Unorm),
//!     );
//!     color = builder.add_rtv(target, RenderTargetAttachment::clear(0.0, 0.0, 0.0, 1.0));
//!     |ctx: &mut PassContext<'_>| {
//!         ctx.begin_render_pass();
//!         ctx.command_list().draw(3, 1);
//!         ctx.end_render_pass();
//!     }
//! })?;
//!
//! let stats = graph.execute(&device, system.jobs(), color)?;
//! assert_eq!(stats.passes_executed, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod arena;
mod builder;
mod compile;
mod context;
mod pass;
mod registry;
mod resource;
mod target;

pub use arena::{FrameBytes, FrameData};
pub use builder::ResourceBuilder;
pub use context::PassContext;
pub use pass::{CallbackRenderPass, DataRenderPass, PassBindings, PassHandle, RenderPass};
pub use resource::{ResourceDesc, ResourceKind, ResourceRef};
pub use target::{DepthStencilAttachment, LoadOp, RenderTargetAttachment, StoreOp};

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use fibra_core::jobs::{JobInfo, Jobs, Priority};
use fibra_core::profiling::{profile_plot, profile_scope, profile_scope_dynamic};

use crate::backend::{CommandList, GpuDevice, GpuHandle};
use crate::error::{GraphError, GraphResult};
use crate::types::{BufferDescriptor, TextureDescriptor};

use arena::FrameArena;
use context::{FrameView, PassOutcome, ScheduledPass};
use pass::PassNode;
use registry::ResourceRegistry;

/// Initial reservations for per-frame storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderGraphConfig {
    /// Passes expected per frame.
    pub pass_capacity: usize,
    /// Logical resources expected per frame.
    pub resource_capacity: usize,
    /// Bytes reserved for the frame arena.
    pub arena_bytes: usize,
}

impl Default for RenderGraphConfig {
    fn default() -> Self {
        Self {
            pass_capacity: 64,
            resource_capacity: 128,
            arena_bytes: 1024 * 1024,
        }
    }
}

/// What one executed frame did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Names of the executed passes in submission order.
    pub executed: Vec<String>,
    pub passes_executed: usize,
    pub passes_culled: usize,
    pub command_lists_submitted: usize,
    pub resources_created: usize,
    pub resources_aliased: usize,
    pub resources_destroyed: usize,
    pub resources_imported: usize,
}

/// A frame's render passes and resources.
///
/// Passes and logical resources last for one frame; the pool of physical
/// resources persists across frames until
/// [`destroy_resources`](Self::destroy_resources) is called.
#[derive(Debug)]
pub struct RenderGraph {
    config: RenderGraphConfig,
    passes: Vec<PassNode>,
    registry: ResourceRegistry,
    arena: FrameArena,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    /// Create a new empty render graph.
    pub fn new() -> Self {
        Self::with_config(RenderGraphConfig::default())
    }

    pub fn with_config(config: RenderGraphConfig) -> Self {
        Self {
            config,
            passes: Vec::with_capacity(config.pass_capacity),
            registry: ResourceRegistry::with_capacity(config.resource_capacity),
            arena: FrameArena::with_capacity(config.arena_bytes),
        }
    }

    pub fn config(&self) -> &RenderGraphConfig {
        &self.config
    }

    /// Declare an externally owned texture, such as a back buffer.
    pub fn import_texture(
        &mut self,
        name: &str,
        handle: GpuHandle,
        desc: TextureDescriptor,
    ) -> ResourceRef {
        self.registry
            .import(name, handle, ResourceDesc::Texture(desc))
    }

    /// Declare an externally owned buffer.
    pub fn import_buffer(
        &mut self,
        name: &str,
        handle: GpuHandle,
        desc: BufferDescriptor,
    ) -> ResourceRef {
        self.registry.import(name, handle, ResourceDesc::Buffer(desc))
    }

    /// Register a pass constructed inside its setup scope.
    ///
    /// Fails without running `setup` if a pass called `name` already exists
    /// this frame.
    pub fn add_render_pass<P, S>(&mut self, name: impl Into<String>, setup: S) -> GraphResult<PassHandle>
    where
        P: RenderPass + 'static,
        S: FnOnce(&mut ResourceBuilder<'_>) -> P,
    {
        let name = name.into();
        if self.passes.iter().any(|pass| pass.name == name) {
            log::warn!("Render pass '{}' is already registered this frame", name);
            return Err(GraphError::DuplicatePass(name));
        }

        let mut bindings = PassBindings::default();
        let pass = {
            let mut builder =
                ResourceBuilder::new(&name, &mut self.registry, &mut self.arena, &mut bindings);
            setup(&mut builder)
        };

        let handle = PassHandle::new(self.passes.len() as u32);
        log::trace!(
            "Registered pass '{}' ({} inputs, {} outputs)",
            name,
            bindings.inputs.len(),
            bindings.outputs.len()
        );
        self.passes.push(PassNode {
            name,
            bindings,
            pass: Box::new(pass),
        });
        Ok(handle)
    }

    /// Register a pass whose state `T` is filled by `setup` and read by
    /// `execute`.
    pub fn add_data_render_pass<T>(
        &mut self,
        name: impl Into<String>,
        setup: fn(&mut ResourceBuilder<'_>, &mut T),
        execute: fn(&mut PassContext<'_>, &T),
    ) -> GraphResult<PassHandle>
    where
        T: Default + Send + 'static,
    {
        self.add_render_pass(name, |builder| {
            let mut data = T::default();
            setup(builder, &mut data);
            DataRenderPass::new(data, execute)
        })
    }

    /// Register a pass whose setup returns its execute closure.
    pub fn add_callback_render_pass<S, E>(
        &mut self,
        name: impl Into<String>,
        setup: S,
    ) -> GraphResult<PassHandle>
    where
        S: FnOnce(&mut ResourceBuilder<'_>) -> E,
        E: FnMut(&mut PassContext<'_>) + Send + 'static,
    {
        self.add_render_pass(name, |builder| CallbackRenderPass::new(setup(builder)))
    }

    /// Newest version of the resource declared under `name`.
    pub fn resource_by_name(&self, name: &str) -> Option<ResourceRef> {
        self.registry.by_name(name)
    }

    /// Passes registered this frame.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass_name(&self, handle: PassHandle) -> Option<&str> {
        self.passes.get(handle.index()).map(|pass| pass.name.as_str())
    }

    pub fn pass_bindings(&self, handle: PassHandle) -> Option<&PassBindings> {
        self.passes.get(handle.index()).map(|pass| &pass.bindings)
    }

    /// Logical resources declared this frame.
    pub fn resource_count(&self) -> usize {
        self.registry.len()
    }

    /// Physical resources held for reuse.
    pub fn pooled_resource_count(&self) -> usize {
        self.registry.pool_len()
    }

    /// Compile and run the passes `final_resource` depends on, then clear the
    /// graph.
    pub fn execute(
        &mut self,
        device: &Arc<dyn GpuDevice>,
        jobs: &Jobs,
        final_resource: ResourceRef,
    ) -> GraphResult<FrameStats> {
        self.execute_many(device, jobs, &[final_resource])
    }

    /// Like [`execute`](Self::execute) for several required outputs; the
    /// executed set is the union of what each one depends on.
    pub fn execute_many(
        &mut self,
        device: &Arc<dyn GpuDevice>,
        jobs: &Jobs,
        final_resources: &[ResourceRef],
    ) -> GraphResult<FrameStats> {
        profile_scope!("render_graph_execute");
        let result = self.compile_and_run(device, jobs, final_resources);
        match &result {
            Ok(stats) => {
                log::debug!(
                    "Frame executed {} passes ({} culled), submitted {} command lists; \
                     resources: {} created, {} aliased, {} destroyed",
                    stats.passes_executed,
                    stats.passes_culled,
                    stats.command_lists_submitted,
                    stats.resources_created,
                    stats.resources_aliased,
                    stats.resources_destroyed
                );
                profile_plot!("render_graph_passes", stats.passes_executed);
            }
            Err(err) => log::error!("Render graph frame failed, nothing submitted: {}", err),
        }
        self.clear();
        result
    }

    fn compile_and_run(
        &mut self,
        device: &Arc<dyn GpuDevice>,
        jobs: &Jobs,
        final_resources: &[ResourceRef],
    ) -> GraphResult<FrameStats> {
        let targets = final_resources
            .iter()
            .map(|&target| {
                compile::resolve_final(&self.passes, target)
                    .ok_or(GraphError::InvalidFinalResource(target))
            })
            .collect::<GraphResult<Vec<_>>>()?;

        let reach = compile::collect_passes(&self.passes, &targets, self.registry.len());
        let refresh = self.registry.refresh(&reach.needed, device.as_ref())?;

        let mut stats = FrameStats {
            passes_executed: reach.passes.len(),
            passes_culled: self.passes.len() - reach.passes.len(),
            resources_created: refresh.created,
            resources_aliased: refresh.aliased,
            resources_destroyed: refresh.destroyed,
            resources_imported: refresh.imported,
            ..FrameStats::default()
        };

        let (lists, executed) = self.run_passes(device, jobs, &reach.passes)?;
        if !lists.is_empty() {
            profile_scope!("render_graph_submit");
            device
                .submit_command_lists(&lists)
                .map_err(GraphError::Submit)?;
        }
        stats.command_lists_submitted = lists.len();
        stats.executed = executed;
        Ok(stats)
    }

    /// Run one job per selected pass and collect the compiled command lists
    /// in selection order.
    fn run_passes(
        &mut self,
        device: &Arc<dyn GpuDevice>,
        jobs: &Jobs,
        selected: &[usize],
    ) -> GraphResult<(Vec<CommandList>, Vec<String>)> {
        let mut nodes: Vec<Option<PassNode>> =
            std::mem::take(&mut self.passes).into_iter().map(Some).collect();
        let mut scheduled = Vec::with_capacity(selected.len());
        let mut objects = Vec::with_capacity(selected.len());
        for &index in selected {
            if let Some(node) = nodes.get_mut(index).and_then(Option::take) {
                scheduled.push(ScheduledPass {
                    name: node.name,
                    bindings: node.bindings,
                });
                objects.push(node.pass);
            }
        }
        drop(nodes);
        let executed: Vec<String> = scheduled.iter().map(|pass| pass.name.clone()).collect();

        let frame = Arc::new(FrameView::new(
            self.registry.resolved(),
            std::mem::take(&mut self.arena),
            scheduled,
        ));
        let failures = Arc::new(AtomicU32::new(0));

        let batch = objects
            .into_iter()
            .enumerate()
            .map(|(slot, pass)| {
                let frame = Arc::clone(&frame);
                let device = Arc::clone(device);
                let failures = Arc::clone(&failures);
                JobInfo::new(frame.passes[slot].name.clone(), move |job| {
                    record_pass(&frame, slot, pass, device.as_ref(), &failures, job.jobs());
                })
                .with_priority(Priority::High)
                .with_param(slot as u32)
            })
            .collect();
        let handle = jobs.run_jobs(batch);
        jobs.wait(handle);

        let mut failed = failures.load(Ordering::Acquire);
        let mut lists = Vec::with_capacity(frame.passes.len());
        for (pass, outcome) in frame.passes.iter().zip(&frame.outcomes) {
            match std::mem::take(&mut *outcome.lock()) {
                PassOutcome::Recorded(list) => lists.push(list),
                PassOutcome::Empty | PassOutcome::Failed => {}
                PassOutcome::Pending => {
                    log::error!("Render pass '{}' did not finish recording", pass.name);
                    failed += 1;
                }
            }
        }

        self.arena = match Arc::try_unwrap(frame) {
            Ok(frame) => frame.arena,
            Err(_) => {
                log::warn!("Frame arena still shared after the pass join; reallocating");
                FrameArena::with_capacity(self.config.arena_bytes)
            }
        };

        if failed > 0 {
            return Err(GraphError::CommandListCompile { failed });
        }
        Ok((lists, executed))
    }

    /// Drop the frame's passes and logical resources, return pooled
    /// resources to the unused state and rewind the frame arena.
    pub fn clear(&mut self) {
        log::trace!(
            "Clearing render graph: {} passes, {} resources, {} frame values, {} arena bytes",
            self.passes.len(),
            self.registry.len(),
            self.arena.value_count(),
            self.arena.bytes_used()
        );
        self.passes.clear();
        self.registry.release_frame();
        self.arena.reset();
    }

    /// Destroy every pooled physical resource.
    pub fn destroy_resources(&mut self, device: &dyn GpuDevice) {
        let destroyed = self.registry.destroy_all(device);
        log::debug!("Destroyed {} pooled render graph resources", destroyed);
    }
}

impl Drop for RenderGraph {
    fn drop(&mut self) {
        let pooled = self.registry.pool_len();
        if pooled > 0 {
            log::warn!(
                "RenderGraph dropped with {} pooled resources; call destroy_resources first",
                pooled
            );
        }
    }
}

/// Body of one pass job.
fn record_pass(
    frame: &FrameView,
    slot: usize,
    mut pass: Box<dyn RenderPass>,
    device: &dyn GpuDevice,
    failures: &AtomicU32,
    jobs: &Jobs,
) {
    let scheduled = &frame.passes[slot];
    profile_scope_dynamic!(scheduled.name.as_str());

    let mut commands = device.create_command_list();
    commands.set_label(scheduled.name.as_str());
    commands.begin_event(&scheduled.name);
    pass.execute(&mut PassContext::new(frame, scheduled, &mut commands, jobs));
    commands.end_event();

    let outcome = if !commands.has_commands() {
        PassOutcome::Empty
    } else {
        match device.compile_command_list(&mut commands) {
            Ok(()) => PassOutcome::Recorded(commands),
            Err(err) => {
                log::error!(
                    "Render pass '{}' failed to compile its command list: {}",
                    scheduled.name,
                    err
                );
                failures.fetch_add(1, Ordering::AcqRel);
                PassOutcome::Failed
            }
        }
    };
    *frame.outcomes[slot].lock() = outcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextureFormat;

    fn color() -> TextureDescriptor {
        TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm)
    }

    #[test]
    fn test_add_render_pass() {
        let mut graph = RenderGraph::new();
        let handle = graph
            .add_callback_render_pass("main", |builder| {
                let target = builder.create_texture("color", color());
                builder.add_rtv(target, RenderTargetAttachment::load());
                |_: &mut PassContext<'_>| {}
            })
            .unwrap();

        assert_eq!(graph.pass_count(), 1);
        assert_eq!(graph.resource_count(), 1);
        assert_eq!(graph.pass_name(handle), Some("main"));
        let bindings = graph.pass_bindings(handle).unwrap();
        assert_eq!(bindings.outputs.len(), 1);
        assert_eq!(bindings.rtvs.len(), 1);
    }

    #[test]
    fn test_duplicate_pass_is_rejected_before_setup() {
        let mut graph = RenderGraph::new();
        graph
            .add_callback_render_pass("main", |_| |_: &mut PassContext<'_>| {})
            .unwrap();

        let mut setup_ran = false;
        let result = graph.add_callback_render_pass("main", |_| {
            setup_ran = true;
            |_: &mut PassContext<'_>| {}
        });
        assert!(matches!(result, Err(GraphError::DuplicatePass(name)) if name == "main"));
        assert!(!setup_ran);
        assert_eq!(graph.pass_count(), 1);
    }

    #[derive(Default)]
    struct BlurData {
        source: ResourceRef,
        target: ResourceRef,
    }

    #[test]
    fn test_data_render_pass() {
        let mut graph = RenderGraph::new();
        graph
            .add_data_render_pass::<BlurData>(
                "blur",
                |builder, data| {
                    data.source = builder.create_texture("source", color());
                    let target = builder.create_texture("target", color());
                    builder.add_input(data.source, crate::types::BindFlags::SHADER_RESOURCE);
                    data.target = builder.add_rtv(target, RenderTargetAttachment::dont_care());
                },
                |ctx, data| {
                    let _ = (ctx.texture(data.source), data.target);
                },
            )
            .unwrap();

        assert_eq!(graph.resource_count(), 2);
        let target = graph.resource_by_name("target").unwrap();
        assert_eq!(target.version(), 1);
    }

    #[test]
    fn test_clear_resets_frame_state() {
        let mut graph = RenderGraph::with_config(RenderGraphConfig {
            pass_capacity: 4,
            resource_capacity: 4,
            arena_bytes: 256,
        });
        graph
            .add_callback_render_pass("main", |builder| {
                builder.create_texture("color", color());
                builder.push_data(5u32);
                builder.alloc(32);
                |_: &mut PassContext<'_>| {}
            })
            .unwrap();
        graph.import_texture("backbuffer", GpuHandle::new(7), color());

        graph.clear();
        assert_eq!(graph.pass_count(), 0);
        assert_eq!(graph.resource_count(), 0);
        assert_eq!(graph.arena.value_count(), 0);
        assert_eq!(graph.arena.bytes_used(), 0);
        assert!(graph.resource_by_name("backbuffer").is_none());
    }

    #[test]
    fn test_config_default() {
        let config = RenderGraphConfig::default();
        assert_eq!(config.arena_bytes, 1024 * 1024);
        assert_eq!(*RenderGraph::new().config(), config);
    }
}
