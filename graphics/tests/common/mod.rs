//! Shared fixtures for render graph integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use fibra_core::jobs::{JobSystem, JobSystemConfig, Jobs};
use fibra_graphics::{
    BindFlags, DepthStencilAttachment, DummyDevice, FrameStats, GpuDevice, GpuHandle,
    GraphResult, PassContext, RenderGraph, RenderTargetAttachment, ResourceRef,
    TextureDescriptor, TextureFormat,
};

/// Side length of every test render target.
pub const TARGET_SIZE: u32 = 256;

/// Handle the tests pretend the swap chain owns.
pub const BACK_BUFFER: GpuHandle = GpuHandle::new(0xB0B0);

/// Install a test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A job system plus a dummy device, seen both concretely (for
/// inspection) and as the trait object the graph drives.
pub struct TestContext {
    pub system: JobSystem,
    pub device: Arc<DummyDevice>,
    pub gpu: Arc<dyn GpuDevice>,
}

impl TestContext {
    pub fn new(workers: usize) -> Self {
        init_logging();
        let config = JobSystemConfig::default()
            .with_worker_count(workers)
            .with_fiber_count(workers * 16)
            .with_fiber_stack_size(128 * 1024);
        let system = JobSystem::new(config).expect("job system should start");
        let device = Arc::new(DummyDevice::new());
        let gpu: Arc<dyn GpuDevice> = device.clone();
        Self {
            system,
            device,
            gpu,
        }
    }

    pub fn jobs(&self) -> &Jobs {
        self.system.jobs()
    }

    pub fn execute(&self, graph: &mut RenderGraph, output: ResourceRef) -> GraphResult<FrameStats> {
        graph.execute(&self.gpu, self.jobs(), output)
    }
}

pub fn color_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(TARGET_SIZE, TARGET_SIZE, TextureFormat::Rgba8Unorm)
}

pub fn hdr_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(TARGET_SIZE, TARGET_SIZE, TextureFormat::Rgba16Float)
}

pub fn depth_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(TARGET_SIZE, TARGET_SIZE, TextureFormat::Depth32Float)
}

fn draw(ctx: &mut PassContext<'_>) {
    ctx.begin_render_pass();
    ctx.command_list().draw(3, 1);
    ctx.end_render_pass();
}

/// Pass that clears and fills a new depth texture.
pub fn add_depth_pass(graph: &mut RenderGraph, name: &str) -> ResourceRef {
    let mut written = ResourceRef::INVALID;
    graph
        .add_callback_render_pass(name, |builder| {
            let depth = builder.create_texture("Depth", depth_desc());
            written = builder.set_dsv(depth, DepthStencilAttachment::clear(1.0));
            |ctx: &mut PassContext<'_>| draw(ctx)
        })
        .expect("pass names are unique");
    written
}

/// Pass that samples `reads` and renders into a new texture.
pub fn add_producer(
    graph: &mut RenderGraph,
    name: &str,
    reads: &[ResourceRef],
    output: &str,
    desc: TextureDescriptor,
) -> ResourceRef {
    let mut written = ResourceRef::INVALID;
    graph
        .add_callback_render_pass(name, |builder| {
            for &read in reads {
                builder.add_input(read, BindFlags::SHADER_RESOURCE);
            }
            let target = builder.create_texture(output, desc);
            written = builder.add_rtv(target, RenderTargetAttachment::clear(0.0, 0.0, 0.0, 1.0));
            |ctx: &mut PassContext<'_>| draw(ctx)
        })
        .expect("pass names are unique");
    written
}

/// Pass that samples `reads` and renders into an existing `target`.
pub fn add_writer(
    graph: &mut RenderGraph,
    name: &str,
    reads: &[ResourceRef],
    target: ResourceRef,
) -> ResourceRef {
    let mut written = ResourceRef::INVALID;
    graph
        .add_callback_render_pass(name, |builder| {
            for &read in reads {
                builder.add_input(read, BindFlags::SHADER_RESOURCE);
            }
            written = builder.add_rtv(target, RenderTargetAttachment::load());
            |ctx: &mut PassContext<'_>| draw(ctx)
        })
        .expect("pass names are unique");
    written
}

/// `PreDepth -> Main -> Postprocess -> Composite`, ending in the imported
/// back buffer. Returns the back buffer at version 0.
pub fn build_frame_chain(graph: &mut RenderGraph) -> ResourceRef {
    let back_buffer = graph.import_texture("BackBuffer", BACK_BUFFER, color_desc());
    let depth = add_depth_pass(graph, "PreDepth");
    let hdr = add_producer(graph, "Main", &[depth], "HDR", hdr_desc());
    let ldr = add_producer(graph, "Postprocess", &[hdr], "LDR", color_desc());
    add_writer(graph, "Composite", &[ldr], back_buffer);
    back_buffer
}

/// The pass names of [`build_frame_chain`] in dependency order.
pub const CHAIN: [&str; 4] = ["PreDepth", "Main", "Postprocess", "Composite"];
