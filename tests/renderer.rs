//! Headless frame tests for the deferred renderer.
//!
//! These drive full `draw()` calls against the recording backend and inspect
//! the command stream and shadow buffers it keeps.

mod common;

use std::collections::HashSet;

use approx::assert_relative_eq;
use glam::{Mat4, Vec3, Vec4};
use rstest::rstest;

use common::{CountingLoader, create_cube, cube_index_count, read_matrices, renderer, renderer_with};
use pbr_renderer::backend::dummy::{DummyBackend, RecordedCommand};
use pbr_renderer::backend::types::LoadOp;
use pbr_renderer::pipeline::{ColorPass, GBufferPass, LightingPass, SkyboxPass};
use pbr_renderer::pipeline::postprocess::{AutoExposurePass, TonemappingPass};
use pbr_renderer::scene::{LightsUniform, PointLightGpu};
use pbr_renderer::{
    Camera, ClearFlags, LightId, PointLight, RenderError, RenderableId, Renderer, RendererConfig,
    SpotLight,
};

// ---------------------------------------------------------------------------
// Id allocation
// ---------------------------------------------------------------------------

#[test]
fn renderable_and_light_ids_are_distinct() {
    let mut renderer = renderer();

    let renderables: Vec<_> = (0..8).map(|_| create_cube(&mut renderer)).collect();
    let unique: HashSet<_> = renderables.iter().copied().collect();
    assert_eq!(unique.len(), renderables.len());

    let lights = renderer.light_manager_mut();
    let points: Vec<_> = (0..8)
        .map(|i| {
            lights
                .add_point_light(PointLight::new(Vec3::splat(i as f32), Vec3::ONE, 1.0, 4.0))
                .unwrap()
        })
        .collect();
    let unique: HashSet<_> = points.iter().copied().collect();
    assert_eq!(unique.len(), points.len());
}

#[test]
fn point_light_pool_is_bounded() {
    let mut renderer = renderer();
    let lights = renderer.light_manager_mut();

    let ids: Vec<LightId> = (0..256)
        .map(|_| lights.add_point_light(PointLight::default()).unwrap())
        .collect();
    assert!(lights.add_point_light(PointLight::default()).is_none());

    lights.remove_point_light(ids[100]);
    assert_eq!(lights.add_point_light(PointLight::default()), Some(ids[100]));
    assert!(lights.add_point_light(PointLight::default()).is_none());
}

#[test]
fn oversized_light_capacity_is_clamped() {
    let config = RendererConfig {
        max_spot_lights: 1000,
        ..Default::default()
    };
    let renderer = renderer_with(CountingLoader::default(), config);
    assert_eq!(
        renderer.light_manager().free_spot_slots(),
        LightsUniform::MAX_SPOT_LIGHTS
    );
}

#[test]
fn removing_a_light_twice_frees_one_slot() {
    let mut renderer = renderer();
    let lights = renderer.light_manager_mut();
    let id = lights.add_point_light(PointLight::default()).unwrap();
    assert_eq!(lights.free_point_slots(), 255);

    lights.remove_point_light(id);
    lights.remove_point_light(id);
    assert_eq!(lights.free_point_slots(), 256);
    assert_eq!(lights.point_light_count(), 0);
}

// ---------------------------------------------------------------------------
// Renderables
// ---------------------------------------------------------------------------

#[test]
fn model_loads_are_memoized() {
    let loader = CountingLoader::default();
    let mut renderer = renderer_with(loader.clone(), RendererConfig::default());

    let first = renderer.create_renderable_from_model("cube.obj").unwrap();
    let buffers = renderer.backend().live_buffer_count();
    let second = renderer.create_renderable_from_model("cube.obj").unwrap();

    assert_eq!(first, second);
    assert_eq!(loader.model_loads.get(), 1);
    assert_eq!(renderer.backend().live_buffer_count(), buffers);

    let other = renderer.create_renderable_from_model("sphere.obj").unwrap();
    assert_ne!(other, first);
    assert_eq!(loader.model_loads.get(), 2);
}

#[test]
fn removed_renderable_releases_its_buffers() {
    let mut renderer = renderer();
    let buffers = renderer.backend().live_buffer_count();
    let id = create_cube(&mut renderer);
    assert_eq!(renderer.backend().live_buffer_count(), buffers + 2);

    renderer.remove_renderable(id);
    renderer.remove_renderable(id);
    assert_eq!(renderer.backend().live_buffer_count(), buffers);
    assert!(!renderer.renderable_manager().contains(id));
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[test]
fn passes_run_in_frame_order() {
    let mut renderer = renderer();
    let cube = create_cube(&mut renderer);
    renderer.queue_draw(cube, Mat4::IDENTITY);
    renderer.backend_mut().clear_commands();

    renderer.draw().unwrap();

    let backend = renderer.backend();
    assert_eq!(
        backend.render_pass_labels(),
        vec![
            GBufferPass::LABEL,
            LightingPass::LABEL,
            ColorPass::LABEL,
            SkyboxPass::LABEL,
            TonemappingPass::LABEL,
        ]
    );

    let commands = backend.commands();
    let tonemap = commands
        .iter()
        .position(|cmd| {
            matches!(cmd, RecordedCommand::BeginRenderPass { label, .. }
                if label.as_deref() == Some(TonemappingPass::LABEL))
        })
        .unwrap();
    let exposure = commands
        .iter()
        .position(|cmd| {
            matches!(cmd, RecordedCommand::BeginComputePass { label }
                if label.as_deref() == Some(AutoExposurePass::LABEL))
        })
        .unwrap();
    assert!(exposure > tonemap);
    assert_eq!(commands.first(), Some(&RecordedCommand::BeginFrame));
    assert_eq!(commands.last(), Some(&RecordedCommand::EndFrame));
}

#[test]
fn auto_exposure_can_be_disabled() {
    let config = RendererConfig {
        auto_exposure: false,
        ..Default::default()
    };
    let mut renderer = renderer_with(CountingLoader::default(), config);
    renderer.draw().unwrap();
    assert!(!renderer
        .backend()
        .commands()
        .iter()
        .any(|cmd| matches!(cmd, RecordedCommand::BeginComputePass { .. })));
}

#[test]
fn draws_of_one_renderable_share_an_instanced_call() {
    let mut renderer = renderer();
    let ids: Vec<_> = (0..6).map(|_| create_cube(&mut renderer)).collect();
    assert_eq!(ids[5], RenderableId(5));

    let m1 = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
    let m2 = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
    renderer.queue_draw(RenderableId(5), m1);
    renderer.queue_draw(RenderableId(5), m2);
    renderer.draw().unwrap();

    let backend = renderer.backend();
    assert_eq!(
        backend.indexed_draws(GBufferPass::LABEL),
        vec![(0..cube_index_count(), 0..2)]
    );

    let instances = backend
        .buffer_contents(renderer.gbuffer_pass().instance_buffer())
        .unwrap();
    assert_eq!(read_matrices(instances, 2), vec![m1, m2]);
}

#[test]
fn batches_bind_consecutive_instance_ranges() {
    let mut renderer = renderer();
    let a = create_cube(&mut renderer);
    let b = create_cube(&mut renderer);
    renderer.queue_draw(a, Mat4::IDENTITY);
    renderer.queue_draw(b, Mat4::IDENTITY);
    renderer.queue_draw(a, Mat4::IDENTITY);
    renderer.backend_mut().clear_commands();
    renderer.draw().unwrap();

    let offsets: Vec<u64> = renderer
        .backend()
        .pass_commands(GBufferPass::LABEL)
        .into_iter()
        .filter_map(|cmd| match cmd {
            RecordedCommand::SetVertexBuffer { slot: 1, offset, .. } => Some(offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![0, 2 * 64]);
}

#[test]
fn colored_draws_go_to_the_color_pass() {
    let mut renderer = renderer();
    let cube = create_cube(&mut renderer);
    renderer.queue_draw_with_color(cube, Mat4::IDENTITY, Vec4::new(1.0, 0.0, 0.0, 1.0));
    renderer.queue_draw_with_color(cube, Mat4::IDENTITY, Vec4::new(0.0, 1.0, 0.0, 1.0));
    renderer.draw().unwrap();

    let backend = renderer.backend();
    assert!(backend.indexed_draws(GBufferPass::LABEL).is_empty());
    assert_eq!(
        backend.indexed_draws(ColorPass::LABEL),
        vec![(0..cube_index_count(), 0..2)]
    );
}

#[test]
fn queue_is_empty_after_a_frame() {
    let mut renderer = renderer();
    let cube = create_cube(&mut renderer);
    renderer.queue_draw(cube, Mat4::IDENTITY);
    renderer.queue_draw_with_color(cube, Mat4::IDENTITY, Vec4::ONE);
    renderer.draw().unwrap();
    assert!(renderer.draw_queue().is_empty());

    renderer.backend_mut().clear_commands();
    renderer.draw().unwrap();
    let backend = renderer.backend();
    assert!(backend.indexed_draws(GBufferPass::LABEL).is_empty());
    assert!(backend.indexed_draws(ColorPass::LABEL).is_empty());
}

#[test]
fn unknown_renderable_fails_the_frame() {
    let mut renderer = renderer();
    renderer.queue_draw(RenderableId(42), Mat4::IDENTITY);
    renderer.backend_mut().clear_commands();

    let result = renderer.draw();
    assert!(matches!(
        result,
        Err(RenderError::RenderableNotFound(RenderableId(42)))
    ));
    assert!(renderer.backend().commands().is_empty());
    assert!(renderer.draw_queue().is_empty());
    renderer.draw().unwrap();
}

#[test]
fn failed_frame_is_discarded_not_presented() {
    let mut renderer = renderer();
    let cube = create_cube(&mut renderer);
    // More instances than the initial instance buffer holds, forcing a reallocation
    for i in 0..100 {
        renderer.queue_draw(cube, Mat4::from_translation(Vec3::X * i as f32));
    }
    renderer.backend_mut().set_fail_buffer_creation(true);
    renderer.backend_mut().clear_commands();

    let result = renderer.draw();
    assert!(matches!(result, Err(RenderError::Backend(_))));
    let commands = renderer.backend().commands();
    assert_eq!(commands.first(), Some(&RecordedCommand::BeginFrame));
    assert_eq!(commands.last(), Some(&RecordedCommand::DiscardFrame));
    assert!(!commands.contains(&RecordedCommand::EndFrame));
    assert!(renderer.draw_queue().is_empty());

    renderer.backend_mut().set_fail_buffer_creation(false);
    renderer.backend_mut().clear_commands();
    renderer.queue_draw(cube, Mat4::IDENTITY);
    renderer.draw().unwrap();
    assert_eq!(renderer.backend().commands().last(), Some(&RecordedCommand::EndFrame));
}

#[rstest]
#[case(ClearFlags::COLOR, true)]
#[case(ClearFlags::COLOR | ClearFlags::DEPTH, true)]
#[case(ClearFlags::DEPTH, false)]
#[case(ClearFlags::empty(), false)]
fn clear_flags_pick_the_swapchain_load_op(#[case] flags: ClearFlags, #[case] clears: bool) {
    let mut renderer = renderer();
    let color = [0.1, 0.2, 0.3, 1.0];
    renderer.clear_color(color);
    renderer.clear(flags);
    renderer.backend_mut().clear_commands();
    renderer.draw().unwrap();

    let load_ops = |renderer: &Renderer<DummyBackend>| {
        renderer
            .backend()
            .commands()
            .iter()
            .find_map(|cmd| match cmd {
                RecordedCommand::BeginRenderPass { label, color_load_ops, .. }
                    if label.as_deref() == Some(TonemappingPass::LABEL) =>
                {
                    Some(color_load_ops.clone())
                }
                _ => None,
            })
            .unwrap()
    };

    let expected = if clears { LoadOp::Clear(color) } else { LoadOp::Load };
    assert_eq!(load_ops(&renderer), vec![expected]);

    // Clears apply to one frame only
    renderer.backend_mut().clear_commands();
    renderer.draw().unwrap();
    assert_eq!(load_ops(&renderer), vec![LoadOp::Load]);
}

// ---------------------------------------------------------------------------
// Lights
// ---------------------------------------------------------------------------

#[test]
fn light_snapshot_is_dense_and_ordered() {
    let mut renderer = renderer();
    let lights: Vec<PointLight> = (0..3)
        .map(|i| PointLight::new(Vec3::new(i as f32, 0.0, 0.0), Vec3::ONE, 1.0 + i as f32, 5.0))
        .collect();
    let manager = renderer.light_manager_mut();
    let ids: Vec<_> = lights
        .iter()
        .map(|light| manager.add_point_light(*light).unwrap())
        .collect();
    assert_eq!(ids, vec![LightId(0), LightId(1), LightId(2)]);
    manager.remove_point_light(LightId(1));

    let snapshot = manager.get_light_data();
    assert_eq!(snapshot.point_light_count, 2);
    assert_eq!(snapshot.point_lights, vec![lights[0], lights[2]]);
}

#[test]
fn frame_uploads_header_and_live_light_prefixes() {
    let mut renderer = renderer();
    let manager = renderer.light_manager_mut();
    let a = PointLight::new(Vec3::new(1.0, 2.0, 3.0), Vec3::X, 2.0, 6.0);
    let b = PointLight::new(Vec3::new(-1.0, 0.0, 4.0), Vec3::Y, 3.0, 8.0);
    let removed = manager.add_point_light(PointLight::default()).unwrap();
    manager.add_point_light(a).unwrap();
    manager.add_point_light(b).unwrap();
    manager.remove_point_light(removed);
    manager.add_spot_light(SpotLight::default()).unwrap();

    renderer.draw().unwrap();

    let backend = renderer.backend();
    let buffer = renderer.lights_buffer();
    let bytes = backend.buffer_contents(buffer).unwrap();
    let counts: [u32; 4] = bytemuck::pod_read_unaligned(&bytes[32..48]);
    assert_eq!(counts, [2, 1, 0, 0]);

    let offset = LightsUniform::POINT_LIGHTS_OFFSET as usize;
    let stride = std::mem::size_of::<PointLightGpu>();
    let first: PointLightGpu = bytemuck::pod_read_unaligned(&bytes[offset..offset + stride]);
    let second: PointLightGpu =
        bytemuck::pod_read_unaligned(&bytes[offset + stride..offset + 2 * stride]);
    assert_eq!(first.position_radius, a.to_gpu_data().position_radius);
    assert_eq!(second.color_intensity, b.to_gpu_data().color_intensity);

    let writes: Vec<(u64, u64)> = backend
        .commands()
        .iter()
        .filter_map(|cmd| match cmd {
            RecordedCommand::WriteBuffer { buffer: target, offset, size } if *target == buffer => {
                Some((*offset, *size))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        writes,
        vec![
            (0, 48),
            (LightsUniform::POINT_LIGHTS_OFFSET, 2 * 32),
            (LightsUniform::SPOT_LIGHTS_OFFSET, 64),
        ]
    );
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[test]
fn pitch_stays_clamped_and_forward_stays_unit() {
    let mut camera = Camera::default();
    for _ in 0..10 {
        camera.rotate(0.0, 1000.0);
        assert!(camera.pitch_degrees() <= 89.0);
        assert_relative_eq!(camera.forward().length(), 1.0, epsilon = 1e-5);
    }
    for _ in 0..10 {
        camera.rotate(37.0, -1000.0);
        assert!(camera.pitch_degrees() >= -89.0);
        assert_relative_eq!(camera.forward().length(), 1.0, epsilon = 1e-5);
    }
}

#[test]
fn camera_position_comes_from_the_view_matrix() {
    let mut renderer = renderer();
    let camera = Camera::new(Vec3::new(3.0, 4.0, -2.0), 1.0);
    renderer.set_view_matrix(camera.view_matrix());
    let position = renderer.camera_position();
    assert_relative_eq!(position.x, 3.0, epsilon = 1e-4);
    assert_relative_eq!(position.y, 4.0, epsilon = 1e-4);
    assert_relative_eq!(position.z, -2.0, epsilon = 1e-4);
}

// ---------------------------------------------------------------------------
// Lifetime
// ---------------------------------------------------------------------------

#[test]
fn resize_rebuilds_targets_without_leaking() {
    let mut renderer = renderer();
    let textures = renderer.backend().live_texture_count();
    let buffers = renderer.backend().live_buffer_count();

    renderer.resize(200, 100).unwrap();
    assert_eq!(renderer.size(), (200, 100));

    let backend = renderer.backend();
    let position = renderer.gbuffer_pass().target(GBufferPass::POSITION_METALLIC).unwrap();
    let descriptor = backend.texture_descriptor(position.texture).unwrap();
    assert_eq!((descriptor.width, descriptor.height), (200, 100));
    let hdr = renderer.lighting_pass().hdr_color().unwrap();
    assert_eq!(backend.texture_descriptor(hdr.texture).unwrap().width, 200);
    assert_eq!(backend.live_texture_count(), textures);
    assert_eq!(backend.live_buffer_count(), buffers);

    // Minimized windows keep the old targets
    renderer.resize(0, 0).unwrap();
    assert_eq!(renderer.size(), (200, 100));
    renderer.draw().unwrap();
}

#[test]
fn shutdown_releases_every_resource() {
    let mut renderer = renderer();
    create_cube(&mut renderer);
    renderer.create_renderable_from_model("tri.obj").unwrap();
    renderer.resize(32, 32).unwrap();
    renderer.draw().unwrap();

    let backend = renderer.shutdown();
    assert_eq!(backend.live_buffer_count(), 0);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_sampler_count(), 0);
    assert_eq!(backend.live_bind_group_layout_count(), 0);
    assert_eq!(backend.live_bind_group_count(), 0);
    assert_eq!(backend.live_pipeline_count(), 0);
}
