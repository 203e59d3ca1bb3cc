//! Render pass shapes.
//!
//! A pass has two phases. *Setup* runs while the graph is built and only
//! declares resources through a [`ResourceBuilder`](super::ResourceBuilder).
//! *Execute* runs once per frame on a job-system fiber and only records into
//! the pass's private [`CommandList`](crate::backend::CommandList) through a
//! [`PassContext`]. Passes of one frame execute concurrently.

use std::fmt;

use super::context::PassContext;
use super::resource::ResourceRef;
use super::target::{DepthStencilAttachment, RenderTargetAttachment};

/// Handle to a pass registered in a [`RenderGraph`](super::RenderGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Registration index of the pass within its frame.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Execute phase of a render pass.
pub trait RenderPass: Send {
    /// Record this frame's commands.
    fn execute(&mut self, ctx: &mut PassContext<'_>);
}

/// Pass whose state is a typed value filled by a setup function.
///
/// Both phases are plain function pointers, so the pass carries no
/// captured environment besides `T`.
pub struct DataRenderPass<T> {
    data: T,
    execute: fn(&mut PassContext<'_>, &T),
}

impl<T> DataRenderPass<T> {
    pub fn new(data: T, execute: fn(&mut PassContext<'_>, &T)) -> Self {
        Self { data, execute }
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

impl<T: Send> RenderPass for DataRenderPass<T> {
    fn execute(&mut self, ctx: &mut PassContext<'_>) {
        (self.execute)(ctx, &self.data)
    }
}

/// Pass whose execute phase is a closure returned by its setup.
pub struct CallbackRenderPass<F> {
    callback: F,
}

impl<F> CallbackRenderPass<F>
where
    F: FnMut(&mut PassContext<'_>) + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> RenderPass for CallbackRenderPass<F>
where
    F: FnMut(&mut PassContext<'_>) + Send,
{
    fn execute(&mut self, ctx: &mut PassContext<'_>) {
        (self.callback)(ctx)
    }
}

/// Resources a pass declared during setup.
#[derive(Debug, Clone, Default)]
pub struct PassBindings {
    /// Versions read, including the old version of every write.
    pub inputs: Vec<ResourceRef>,
    /// Versions produced.
    pub outputs: Vec<ResourceRef>,
    /// Color targets, keyed by the version the pass writes.
    pub rtvs: Vec<(ResourceRef, RenderTargetAttachment)>,
    /// Depth-stencil target, keyed by the version the pass writes.
    pub dsv: Option<(ResourceRef, DepthStencilAttachment)>,
}

impl PassBindings {
    pub(crate) fn add_input(&mut self, resource: ResourceRef) {
        self.inputs.push(resource);
    }

    pub(crate) fn add_output(&mut self, resource: ResourceRef) {
        self.outputs.push(resource);
    }

    pub fn writes(&self, resource: ResourceRef) -> bool {
        self.outputs.contains(&resource)
    }
}

/// A registered pass: its declarations plus the pass object.
pub(crate) struct PassNode {
    pub name: String,
    pub bindings: PassBindings,
    pub pass: Box<dyn RenderPass>,
}

impl fmt::Debug for PassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassNode")
            .field("name", &self.name)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}
