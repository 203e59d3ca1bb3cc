//! Logical-to-physical resource mapping with cross-frame aliasing.
//!
//! Logical resources live for one frame. Physical resources live in a pool
//! that survives [`ResourceRegistry::release_frame`]: each frame, every needed
//! logical resource claims an unused pool entry with an equal descriptor or
//! gets a freshly created one, and entries nobody claimed are destroyed.

use fibra_core::profiling::profile_function;

use crate::backend::{GpuDevice, GpuHandle};
use crate::error::{GraphError, GraphResult};
use crate::types::{BindFlags, BufferDescriptor, TextureDescriptor};

use super::resource::{LogicalResource, ResourceDesc, ResourceKind, ResourceRef};

/// A pooled physical allocation.
#[derive(Debug)]
struct PhysicalResource {
    handle: GpuHandle,
    desc: ResourceDesc,
    /// Logical index backed during the current frame.
    logical: Option<u32>,
}

impl PhysicalResource {
    fn is_used(&self) -> bool {
        self.logical.is_some()
    }
}

/// What one refresh did to the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RefreshStats {
    pub created: usize,
    pub aliased: usize,
    pub destroyed: usize,
    pub imported: usize,
}

/// Physical handle and descriptor of a logical resource, as seen by passes.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedResource {
    pub desc: ResourceDesc,
    pub handle: Option<GpuHandle>,
}

#[derive(Debug, Default)]
pub(crate) struct ResourceRegistry {
    resources: Vec<LogicalResource>,
    pool: Vec<PhysicalResource>,
}

impl ResourceRegistry {
    pub fn with_capacity(resources: usize) -> Self {
        Self {
            resources: Vec::with_capacity(resources),
            pool: Vec::with_capacity(resources),
        }
    }

    fn register(&mut self, resource: LogicalResource) -> ResourceRef {
        let index = self.resources.len() as u32;
        log::trace!(
            "Declared {:?} '{}' as resource {}",
            resource.desc.kind(),
            resource.name,
            index
        );
        self.resources.push(resource);
        ResourceRef::new(index, 0)
    }

    pub fn create_texture(&mut self, name: &str, desc: TextureDescriptor) -> ResourceRef {
        self.register(LogicalResource::new(
            name.to_owned(),
            ResourceDesc::Texture(desc),
            None,
        ))
    }

    pub fn create_buffer(&mut self, name: &str, desc: BufferDescriptor) -> ResourceRef {
        self.register(LogicalResource::new(
            name.to_owned(),
            ResourceDesc::Buffer(desc),
            None,
        ))
    }

    pub fn import(&mut self, name: &str, handle: GpuHandle, desc: ResourceDesc) -> ResourceRef {
        self.register(LogicalResource::new(name.to_owned(), desc, Some(handle)))
    }

    pub fn get(&self, resource: ResourceRef) -> Option<&LogicalResource> {
        self.resources.get(resource.index() as usize)
    }

    pub fn contains(&self, resource: ResourceRef) -> bool {
        resource.is_valid() && (resource.index() as usize) < self.resources.len()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn add_bind_flags(&mut self, resource: ResourceRef, flags: BindFlags) {
        if let Some(logical) = self.resources.get_mut(resource.index() as usize) {
            logical.desc.add_bind_flags(flags);
        }
    }

    /// Allocate the next version of a resource.
    ///
    /// Versions come from a per-resource counter, so two passes writing the
    /// same old version still produce distinct new versions.
    pub fn next_version(&mut self, resource: ResourceRef) -> ResourceRef {
        match self.resources.get_mut(resource.index() as usize) {
            Some(logical) => {
                logical.latest_version += 1;
                resource.with_version(logical.latest_version)
            }
            None => resource,
        }
    }

    /// Newest version of the most recently declared resource called `name`.
    pub fn by_name(&self, name: &str) -> Option<ResourceRef> {
        self.resources
            .iter()
            .enumerate()
            .rev()
            .find(|(_, r)| r.name == name)
            .map(|(index, r)| ResourceRef::new(index as u32, r.latest_version))
    }

    /// Bind a physical handle to every needed logical resource.
    ///
    /// Needed resources claim an unused pool entry with an equal descriptor
    /// or get a new allocation; pool entries left unclaimed are destroyed
    /// afterwards. A creation failure aborts the refresh immediately.
    pub fn refresh(
        &mut self,
        needed: &[bool],
        device: &dyn GpuDevice,
    ) -> GraphResult<RefreshStats> {
        profile_function!();
        let mut stats = RefreshStats::default();

        for (index, logical) in self.resources.iter_mut().enumerate() {
            if !needed.get(index).copied().unwrap_or(false) {
                continue;
            }
            if let Some(handle) = logical.imported {
                logical.physical = Some(handle);
                stats.imported += 1;
                continue;
            }

            let index = index as u32;
            if let Some(entry) = self
                .pool
                .iter_mut()
                .find(|entry| !entry.is_used() && entry.desc == logical.desc)
            {
                log::trace!("Aliasing '{}' onto {:?}", logical.name, entry.handle);
                entry.logical = Some(index);
                logical.physical = Some(entry.handle);
                stats.aliased += 1;
                continue;
            }

            let created = match &logical.desc {
                ResourceDesc::Texture(desc) => device.create_texture(desc, None, &logical.name),
                ResourceDesc::Buffer(desc) => device.create_buffer(desc, None, &logical.name),
            };
            let handle = created.map_err(|source| GraphError::ResourceCreation {
                name: logical.name.clone(),
                source,
            })?;
            self.pool.push(PhysicalResource {
                handle,
                desc: logical.desc.clone(),
                logical: Some(index),
            });
            logical.physical = Some(handle);
            stats.created += 1;
        }

        self.pool.retain(|entry| {
            if entry.is_used() {
                return true;
            }
            device.destroy_resource(entry.handle);
            stats.destroyed += 1;
            false
        });

        Ok(stats)
    }

    /// Descriptors and bound handles, indexed like the logical resources.
    pub fn resolved(&self) -> Vec<ResolvedResource> {
        self.resources
            .iter()
            .map(|logical| ResolvedResource {
                desc: logical.desc.clone(),
                handle: logical.physical,
            })
            .collect()
    }

    /// Forget the frame's logical resources and return every pooled
    /// allocation to the unused state.
    pub fn release_frame(&mut self) {
        self.resources.clear();
        for entry in &mut self.pool {
            entry.logical = None;
        }
    }

    /// Destroy every pooled allocation.
    pub fn destroy_all(&mut self, device: &dyn GpuDevice) -> usize {
        for logical in &mut self.resources {
            if !logical.is_imported() {
                logical.physical = None;
            }
        }
        let count = self.pool.len();
        for entry in self.pool.drain(..) {
            device.destroy_resource(entry.handle);
        }
        count
    }

    pub fn kind(&self, resource: ResourceRef) -> Option<ResourceKind> {
        self.get(resource).map(|logical| logical.desc.kind())
    }

    pub fn desc(&self, resource: ResourceRef) -> Option<&ResourceDesc> {
        self.get(resource).map(|logical| &logical.desc)
    }
}
