//! # Frame Demo
//!
//! Drives a few frames of a small deferred-style pipeline through the render
//! graph on the dummy device:
//!
//! ```text
//! PreDepth -> Main -> Postprocess -> Composite -> BackBuffer
//!             Debug (never read, culled every frame)
//! ```
//!
//! `Main` fans its visibility culling out over a grouped batch of jobs and
//! waits on it from inside the pass, so the demo also exercises fiber
//! suspension on a single worker (`--workers 1`).
//!
//! ```text
//! RUST_LOG=debug cargo run --bin frame_demo -- --frames 5 --fail-frame 2
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use clap::Parser;

use fibra_core::jobs::{JobSystem, JobSystemConfig, Jobs, Priority, default_worker_count};
use fibra_graphics::{
    BindFlags, DepthStencilAttachment, DummyDevice, GpuDevice, GpuHandle, PassContext,
    RenderGraph, RenderTargetAttachment, ResourceRef, TextureDescriptor, TextureFormat,
};

/// Frame demo arguments.
#[derive(Parser, Debug)]
#[command(
    name = "frame_demo",
    about = "Run render graph frames on the dummy device",
    version
)]
struct Args {
    /// Worker threads (defaults to the available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Fibers in total across all workers.
    #[arg(long)]
    fibers: Option<usize>,

    /// Stack size of each fiber in KiB.
    #[arg(long, default_value = "256")]
    stack_kib: usize,

    /// Number of frames to render.
    #[arg(long, default_value = "3")]
    frames: u32,

    /// Make the Postprocess command list fail to compile on this frame.
    #[arg(long)]
    fail_frame: Option<u32>,

    /// Objects culled by the Main pass every frame.
    #[arg(long, default_value = "4096")]
    objects: u32,

    /// Output width in pixels.
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value = "720")]
    height: u32,
}

const BACK_BUFFER: GpuHandle = GpuHandle::new(0xB0B0);
const CULL_GROUP_SIZE: u32 = 64;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    fibra_core::init();
    fibra_graphics::init();

    let workers = args.workers.unwrap_or_else(default_worker_count);
    let mut config = JobSystemConfig::default()
        .with_worker_count(workers)
        .with_fiber_stack_size(args.stack_kib * 1024);
    if let Some(fibers) = args.fibers {
        config = config.with_fiber_count(fibers);
    }
    let system = match JobSystem::new(config) {
        Ok(system) => system,
        Err(err) => {
            log::error!("Failed to start the job system: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let device = Arc::new(DummyDevice::new());
    let gpu: Arc<dyn GpuDevice> = device.clone();
    let mut graph = RenderGraph::new();
    let mut failed_frames = 0;

    for frame in 0..args.frames {
        let fail = args.fail_frame == Some(frame);
        if fail {
            log::info!("Frame {}: Postprocess will fail to compile", frame);
            device.fail_compile_for("Postprocess");
        }

        gpu.begin_frame();
        let output = build_frame(&mut graph, &args);
        match graph.execute(&gpu, system.jobs(), output) {
            Ok(stats) => {
                log::info!(
                    "Frame {}: executed [{}], culled {}, submitted {} lists; \
                     resources {} created, {} aliased, {} destroyed",
                    frame,
                    stats.executed.join(", "),
                    stats.passes_culled,
                    stats.command_lists_submitted,
                    stats.resources_created,
                    stats.resources_aliased,
                    stats.resources_destroyed
                );
            }
            Err(err) => {
                log::warn!("Frame {} dropped: {}", frame, err);
                failed_frames += 1;
            }
        }
        gpu.end_frame();
        if let Err(err) = gpu.present() {
            log::error!("Present failed: {}", err);
        }

        if fail {
            device.clear_failures();
        }
    }

    graph.destroy_resources(gpu.as_ref());
    let stats = device.stats();
    log::info!(
        "Done: {} frames, {} dropped, {} submissions, {} textures created, {} live resources",
        args.frames,
        failed_frames,
        stats.submissions,
        stats.textures_created,
        device.live_resource_count()
    );
    system.shutdown();

    if args.fail_frame.is_none() && failed_frames > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn build_frame(graph: &mut RenderGraph, args: &Args) -> ResourceRef {
    let color = TextureDescriptor::new_2d(args.width, args.height, TextureFormat::Bgra8Unorm);
    let hdr = TextureDescriptor::new_2d(args.width, args.height, TextureFormat::Rgba16Float);
    let depth = TextureDescriptor::new_2d(args.width, args.height, TextureFormat::Depth32Float);
    let back_buffer = graph.import_texture("BackBuffer", BACK_BUFFER, color.clone());

    let mut depth_ref = ResourceRef::INVALID;
    add_pass(graph, "PreDepth", |builder| {
        let target = builder.create_texture("Depth", depth);
        depth_ref = builder.set_dsv(target, DepthStencilAttachment::clear(1.0));
        |ctx: &mut PassContext<'_>| {
            ctx.begin_render_pass();
            ctx.command_list().draw_indexed(36, 64, 0);
            ctx.end_render_pass();
        }
    });

    let objects = args.objects;
    let mut hdr_ref = ResourceRef::INVALID;
    add_pass(graph, "Main", |builder| {
        builder.add_input(depth_ref, BindFlags::DEPTH_STENCIL);
        let target = builder.create_texture("HDR", hdr);
        hdr_ref = builder.add_rtv(target, RenderTargetAttachment::clear(0.0, 0.0, 0.0, 1.0));
        move |ctx: &mut PassContext<'_>| {
            let visible = cull_objects(ctx.jobs(), objects);
            log::debug!("Main: {} of {} objects visible", visible, objects);
            ctx.begin_render_pass();
            ctx.command_list().draw_indexed(36, visible, 0);
            ctx.end_render_pass();
        }
    });

    let mut ldr_ref = ResourceRef::INVALID;
    add_pass(graph, "Postprocess", |builder| {
        builder.add_input(hdr_ref, BindFlags::SHADER_RESOURCE);
        let target = builder.create_texture("LDR", color.clone());
        ldr_ref = builder.add_rtv(target, RenderTargetAttachment::dont_care());
        fullscreen
    });

    add_pass(graph, "Debug", |builder| {
        builder.add_input(depth_ref, BindFlags::SHADER_RESOURCE);
        let target = builder.create_texture("DebugOverlay", color);
        builder.add_rtv(target, RenderTargetAttachment::clear(0.0, 0.0, 0.0, 0.0));
        fullscreen
    });

    add_pass(graph, "Composite", |builder| {
        builder.add_input(ldr_ref, BindFlags::SHADER_RESOURCE);
        builder.add_rtv(back_buffer, RenderTargetAttachment::load());
        fullscreen
    });

    back_buffer
}

fn add_pass<S, E>(graph: &mut RenderGraph, name: &str, setup: S)
where
    S: FnOnce(&mut fibra_graphics::ResourceBuilder<'_>) -> E,
    E: FnMut(&mut PassContext<'_>) + Send + 'static,
{
    if let Err(err) = graph.add_callback_render_pass(name, setup) {
        log::error!("{}", err);
    }
}

fn fullscreen(ctx: &mut PassContext<'_>) {
    ctx.begin_render_pass();
    ctx.command_list().draw(3, 1);
    ctx.end_render_pass();
}

/// Test every object against a fake frustum in groups of
/// [`CULL_GROUP_SIZE`]; the last job of each group publishes its count.
fn cull_objects(jobs: &Jobs, objects: u32) -> u32 {
    let visible = Arc::new(AtomicU32::new(0));
    let total = Arc::clone(&visible);
    let handle = jobs.run_grouped::<u32, _>(
        "cull",
        Priority::High,
        objects,
        CULL_GROUP_SIZE,
        move |job, group_visible| {
            if job.param() % 3 != 0 {
                *group_visible += 1;
            }
            if job.group().is_some_and(|args| args.is_last_job_in_group) {
                total.fetch_add(*group_visible, Ordering::Relaxed);
            }
        },
    );
    jobs.wait(handle);
    visible.load(Ordering::Relaxed)
}
