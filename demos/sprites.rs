// Sprite demo
//
// Opens a window and draws a few thousand rotating sprites from procedurally
// generated textures, plus an optional image passed on the command line.
//
//   cargo run --example sprites --features demo -- [image.png] [config.toml]

use anyhow::{Context, Result};
use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use ren2d::camera::{build_view_projection, init_pixel_camera, resize, PixelCameraData};
use ren2d::{
    LogicalTextureId, Material, RawImage, Renderer2D, RendererConfig, Transform2D, WgpuBackend,
};
use std::sync::Arc;
use std::time::Instant;
use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

const SPRITE_COUNT: usize = 4_000;

fn checkerboard(size: u32, a: [u8; 4], b: [u8; 4]) -> Result<RawImage> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let cell = (x / 4 + y / 4) % 2 == 0;
            pixels.extend_from_slice(if cell { &a } else { &b });
        }
    }
    Ok(RawImage::new(size, size, 4, pixels)?)
}

fn load_textures(
    renderer: &mut Renderer2D<WgpuBackend>,
    image_path: Option<&str>,
) -> Result<Vec<LogicalTextureId>> {
    renderer.begin_prepare()?;
    let mut ids = Vec::new();
    ids.push(renderer.prepare_texture(checkerboard(32, [230, 80, 60, 255], [40, 40, 40, 255])?)?);
    ids.push(renderer.prepare_texture(checkerboard(24, [70, 200, 90, 255], [20, 60, 30, 255])?)?);
    ids.push(renderer.prepare_texture(checkerboard(16, [80, 120, 240, 255], [250, 250, 250, 0])?)?);
    if let Some(path) = image_path {
        let image = RawImage::load(path, false).with_context(|| format!("loading {}", path))?;
        ids.push(renderer.prepare_texture(image)?);
    }
    renderer.end_prepare()?;
    log::info!(
        "[sprites::load_textures] {} textures in {} atlases",
        ids.len(),
        renderer.atlas_count()
    );
    Ok(ids)
}

struct Sprite {
    position: Vec2,
    velocity: Vec2,
    size: f32,
    spin: f32,
    texture: Option<LogicalTextureId>,
    layer: i32,
}

fn spawn_sprites(ids: &[LogicalTextureId], bounds: Vec2) -> Vec<Sprite> {
    let mut rng = StdRng::seed_from_u64(0x2545_f491);
    (0..SPRITE_COUNT)
        .map(|i| Sprite {
            position: Vec2::new(rng.gen_range(0.0..bounds.x), rng.gen_range(0.0..bounds.y)),
            velocity: Vec2::new(rng.gen_range(-100.0..100.0), rng.gen_range(-100.0..100.0)),
            size: rng.gen_range(8.0..48.0),
            spin: rng.gen_range(-180.0..180.0),
            texture: if i % 5 == 0 { None } else { Some(ids[i % ids.len()]) },
            layer: (i % 3) as i32,
        })
        .collect()
}

fn draw_frame(
    renderer: &mut Renderer2D<WgpuBackend>,
    camera: &PixelCameraData,
    sprites: &[Sprite],
    time: f32,
) -> ren2d::RendererResult<()> {
    renderer.clear()?;
    renderer.begin_scene(build_view_projection(camera))?;
    for sprite in sprites {
        let bounds = camera.screen_size;
        let moved = sprite.position + sprite.velocity * time;
        let position = Vec2::new(moved.x.rem_euclid(bounds.x), moved.y.rem_euclid(bounds.y));
        let material = Material {
            color: [1.0, 1.0, 1.0, 1.0],
            texture: sprite.texture,
        };
        let transform = Transform2D {
            position,
            scale: Vec2::splat(sprite.size),
            rotation: sprite.spin * time,
        };
        renderer.submit_quad(transform, material, sprite.layer)?;
    }
    let stats = renderer.render()?;
    log::trace!(
        "[sprites::draw_frame] {} quads, {} draw calls",
        stats.quads,
        stats.draw_calls
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let image_path = args.next();
    let config = match args.next() {
        Some(path) => RendererConfig::load(&path)?,
        None => RendererConfig::default(),
    };

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("ren2d sprites")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)?,
    );

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let surface = instance.create_surface(window.clone())?;
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        force_fallback_adapter: false,
        compatible_surface: Some(&surface),
    }))
    .context("no suitable GPU adapter")?;
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("ren2d demo device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))?;
    let device = Arc::new(device);
    let queue = Arc::new(queue);

    let size = window.inner_size();
    let capabilities = surface.get_capabilities(&adapter);
    let format = capabilities
        .formats
        .iter()
        .copied()
        .find(|format| !format.is_srgb())
        .or_else(|| capabilities.formats.first().copied())
        .context("surface reports no formats")?;
    let mut surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &surface_config);

    let backend = WgpuBackend::new(device.clone(), queue);
    let mut renderer = Renderer2D::new(backend, config)?;
    let ids = load_textures(&mut renderer, image_path.as_deref())?;

    let mut camera = init_pixel_camera(surface_config.width, surface_config.height);
    let sprites = spawn_sprites(&ids, camera.screen_size);
    let start = Instant::now();

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(new_size) => {
                surface_config.width = new_size.width.max(1);
                surface_config.height = new_size.height.max(1);
                surface.configure(&device, &surface_config);
                camera = resize(&camera, surface_config.width, surface_config.height);
            }
            WindowEvent::RedrawRequested => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::warn!("[sprites::main] Skipping frame: {}", e);
                        surface.configure(&device, &surface_config);
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                renderer.backend_mut().begin_frame(view, surface_config.format);

                let time = start.elapsed().as_secs_f32();
                if let Err(e) = draw_frame(&mut renderer, &camera, &sprites, time) {
                    log::error!("[sprites::main] Frame failed: {}", e);
                    elwt.exit();
                }

                renderer.backend_mut().end_frame();
                frame.present();
            }
            _ => {}
        },
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
