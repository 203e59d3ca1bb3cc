//! Execute-phase interface handed to passes.

use fibra_core::jobs::Jobs;
use parking_lot::Mutex;

use crate::backend::{ColorTarget, CommandList, DepthTarget, GpuHandle};
use crate::types::{BufferDescriptor, TextureDescriptor};

use super::arena::{FrameArena, FrameBytes, FrameData};
use super::pass::PassBindings;
use super::registry::ResolvedResource;
use super::resource::{ResourceDesc, ResourceRef};
use super::target::{DepthStencilAttachment, RenderTargetAttachment};

/// How a pass job ended.
#[derive(Debug, Default)]
pub(crate) enum PassOutcome {
    /// Never finished; the pass panicked.
    #[default]
    Pending,
    /// Recorded nothing worth submitting.
    Empty,
    Recorded(CommandList),
    Failed,
}

/// A pass selected for this frame.
#[derive(Debug)]
pub(crate) struct ScheduledPass {
    pub name: String,
    pub bindings: PassBindings,
}

/// Read-only frame state shared by all pass jobs.
///
/// Each pass job writes only its own outcome slot.
#[derive(Debug)]
pub(crate) struct FrameView {
    pub resources: Vec<ResolvedResource>,
    pub arena: FrameArena,
    pub passes: Vec<ScheduledPass>,
    pub outcomes: Vec<Mutex<PassOutcome>>,
}

impl FrameView {
    pub fn new(
        resources: Vec<ResolvedResource>,
        arena: FrameArena,
        passes: Vec<ScheduledPass>,
    ) -> Self {
        let outcomes = passes.iter().map(|_| Mutex::default()).collect();
        Self {
            resources,
            arena,
            passes,
            outcomes,
        }
    }

    fn resource(&self, resource: ResourceRef) -> Option<&ResolvedResource> {
        self.resources.get(resource.index() as usize)
    }
}

/// What a pass sees while recording.
pub struct PassContext<'a> {
    frame: &'a FrameView,
    pass: &'a ScheduledPass,
    commands: &'a mut CommandList,
    jobs: &'a Jobs,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        frame: &'a FrameView,
        pass: &'a ScheduledPass,
        commands: &'a mut CommandList,
        jobs: &'a Jobs,
    ) -> Self {
        Self {
            frame,
            pass,
            commands,
            jobs,
        }
    }

    pub fn pass_name(&self) -> &str {
        &self.pass.name
    }

    /// This pass's private command list.
    pub fn command_list(&mut self) -> &mut CommandList {
        self.commands
    }

    /// Job system for spawning and waiting on sub-jobs.
    pub fn jobs(&self) -> &Jobs {
        self.jobs
    }

    /// Physical texture bound to `resource`.
    pub fn texture(&self, resource: ResourceRef) -> Option<GpuHandle> {
        self.frame
            .resource(resource)
            .filter(|r| matches!(r.desc, ResourceDesc::Texture(_)))
            .and_then(|r| r.handle)
    }

    /// Physical buffer bound to `resource`.
    pub fn buffer(&self, resource: ResourceRef) -> Option<GpuHandle> {
        self.frame
            .resource(resource)
            .filter(|r| matches!(r.desc, ResourceDesc::Buffer(_)))
            .and_then(|r| r.handle)
    }

    pub fn texture_desc(&self, resource: ResourceRef) -> Option<&TextureDescriptor> {
        self.frame
            .resource(resource)
            .and_then(|r| r.desc.as_texture())
    }

    pub fn buffer_desc(&self, resource: ResourceRef) -> Option<&BufferDescriptor> {
        self.frame.resource(resource).and_then(|r| r.desc.as_buffer())
    }

    pub fn inputs(&self) -> &[ResourceRef] {
        &self.pass.bindings.inputs
    }

    pub fn outputs(&self) -> &[ResourceRef] {
        &self.pass.bindings.outputs
    }

    pub fn rtvs(&self) -> &[(ResourceRef, RenderTargetAttachment)] {
        &self.pass.bindings.rtvs
    }

    pub fn dsv(&self) -> Option<&(ResourceRef, DepthStencilAttachment)> {
        self.pass.bindings.dsv.as_ref()
    }

    /// Value pushed during setup with
    /// [`ResourceBuilder::push_data`](super::ResourceBuilder::push_data).
    pub fn data<T: 'static>(&self, data: &FrameData<T>) -> Option<&T> {
        self.frame.arena.get(data)
    }

    /// Bytes reserved during setup with
    /// [`ResourceBuilder::alloc`](super::ResourceBuilder::alloc).
    pub fn bytes(&self, bytes: FrameBytes) -> &[u8] {
        self.frame.arena.bytes(bytes)
    }

    /// Begin a render pass on this pass's declared attachments.
    pub fn begin_render_pass(&mut self) {
        let color = self
            .pass
            .bindings
            .rtvs
            .iter()
            .filter_map(|(resource, attachment)| {
                let texture = self.texture(*resource);
                if texture.is_none() {
                    log::warn!(
                        "Pass '{}': render target {:?} has no physical texture",
                        self.pass.name,
                        resource
                    );
                }
                texture.map(|texture| ColorTarget {
                    texture,
                    load_op: attachment.load_op,
                    store_op: attachment.store_op,
                })
            })
            .collect();
        let depth = self.pass.bindings.dsv.and_then(|(resource, attachment)| {
            self.texture(resource).map(|texture| DepthTarget {
                texture,
                depth_load_op: attachment.depth_load_op,
                depth_store_op: attachment.depth_store_op,
                read_only: attachment.read_only,
            })
        });
        self.commands.begin_render_pass(color, depth);
    }

    pub fn end_render_pass(&mut self) {
        self.commands.end_render_pass();
    }
}

impl std::fmt::Debug for PassContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassContext")
            .field("pass", &self.pass.name)
            .field("commands", &self.commands.commands().len())
            .finish_non_exhaustive()
    }
}
