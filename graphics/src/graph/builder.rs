//! Setup-phase interface handed to passes.

use crate::backend::GpuHandle;
use crate::types::{BindFlags, BufferDescriptor, TextureDescriptor};

use super::arena::{FrameArena, FrameBytes, FrameData};
use super::pass::PassBindings;
use super::registry::ResourceRegistry;
use super::resource::{ResourceDesc, ResourceKind, ResourceRef};
use super::target::{DepthStencilAttachment, RenderTargetAttachment};

/// Declares the resources one pass creates, reads and writes.
///
/// Every write returns the new version of the resource; later passes read
/// that version to depend on this pass.
pub struct ResourceBuilder<'a> {
    pass: &'a str,
    registry: &'a mut ResourceRegistry,
    arena: &'a mut FrameArena,
    bindings: &'a mut PassBindings,
}

impl<'a> ResourceBuilder<'a> {
    pub(crate) fn new(
        pass: &'a str,
        registry: &'a mut ResourceRegistry,
        arena: &'a mut FrameArena,
        bindings: &'a mut PassBindings,
    ) -> Self {
        Self {
            pass,
            registry,
            arena,
            bindings,
        }
    }

    /// Name of the pass being set up.
    pub fn pass_name(&self) -> &str {
        self.pass
    }

    /// Declare a transient texture at version 0.
    pub fn create_texture(&mut self, name: &str, desc: TextureDescriptor) -> ResourceRef {
        self.registry.create_texture(name, desc)
    }

    /// Declare a transient buffer at version 0.
    pub fn create_buffer(&mut self, name: &str, desc: BufferDescriptor) -> ResourceRef {
        self.registry.create_buffer(name, desc)
    }

    /// Declare an externally owned texture.
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

    /// Read `resource` at its given version.
    pub fn add_input(&mut self, resource: ResourceRef, flags: BindFlags) -> ResourceRef {
        if !self.check(resource, "read") {
            return resource;
        }
        self.registry.add_bind_flags(resource, flags);
        self.bindings.add_input(resource);
        resource
    }

    /// Write `resource`, returning the version this pass produces.
    pub fn add_output(&mut self, resource: ResourceRef, flags: BindFlags) -> ResourceRef {
        if !self.check(resource, "write") {
            return resource;
        }
        self.registry.add_bind_flags(resource, flags);
        self.write(resource)
    }

    /// Bind `resource` as a color target, returning the version written.
    pub fn add_rtv(
        &mut self,
        resource: ResourceRef,
        attachment: RenderTargetAttachment,
    ) -> ResourceRef {
        if !self.check(resource, "bind as render target") {
            return resource;
        }
        self.bind_texture_flag(resource, BindFlags::RENDER_TARGET, "render target");
        let written = self.write(resource);
        self.bindings.rtvs.push((written, attachment));
        written
    }

    /// Bind `resource` as the depth-stencil target, returning the version
    /// written.
    pub fn set_dsv(
        &mut self,
        resource: ResourceRef,
        attachment: DepthStencilAttachment,
    ) -> ResourceRef {
        if !self.check(resource, "bind as depth stencil") {
            return resource;
        }
        self.bind_texture_flag(resource, BindFlags::DEPTH_STENCIL, "depth stencil");
        let written = self.write(resource);
        if let Some((previous, _)) = self.bindings.dsv.replace((written, attachment)) {
            log::warn!(
                "Pass '{}' replaces its depth-stencil target {:?} with {:?}",
                self.pass,
                previous,
                written
            );
        }
        written
    }

    pub fn texture_desc(&self, resource: ResourceRef) -> Option<&TextureDescriptor> {
        self.registry.desc(resource).and_then(ResourceDesc::as_texture)
    }

    pub fn buffer_desc(&self, resource: ResourceRef) -> Option<&BufferDescriptor> {
        self.registry.desc(resource).and_then(ResourceDesc::as_buffer)
    }

    /// Newest version of the resource declared under `name`.
    pub fn resource_by_name(&self, name: &str) -> Option<ResourceRef> {
        self.registry.by_name(name)
    }

    /// Store a value for the execute phase.
    pub fn push_data<T: Send + Sync + 'static>(&mut self, value: T) -> FrameData<T> {
        self.arena.push(value)
    }

    /// Reserve zeroed per-frame bytes.
    pub fn alloc(&mut self, size: usize) -> FrameBytes {
        self.arena.alloc(size)
    }

    /// Fill bytes reserved with [`alloc`](Self::alloc).
    pub fn bytes_mut(&mut self, bytes: FrameBytes) -> &mut [u8] {
        self.arena.bytes_mut(bytes)
    }

    fn check(&self, resource: ResourceRef, action: &str) -> bool {
        if self.registry.contains(resource) {
            return true;
        }
        log::warn!(
            "Pass '{}' tried to {} unknown resource {:?}",
            self.pass,
            action,
            resource
        );
        debug_assert!(!resource.is_valid(), "unknown resource {resource:?}");
        false
    }

    fn write(&mut self, resource: ResourceRef) -> ResourceRef {
        self.bindings.add_input(resource);
        let written = self.registry.next_version(resource);
        self.bindings.add_output(written);
        written
    }

    fn bind_texture_flag(&mut self, resource: ResourceRef, flag: BindFlags, usage: &str) {
        match self.registry.kind(resource) {
            Some(ResourceKind::Texture) => self.registry.add_bind_flags(resource, flag),
            _ => log::warn!(
                "Pass '{}': only textures can be bound as {}, {:?} is a buffer",
                self.pass,
                usage,
                resource
            ),
        }
    }
}
