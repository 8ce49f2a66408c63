//! PBR scene demo
//!
//! A grid of spheres on a ground plane, lit by a sun, a ring of orbiting
//! point lights and one spot light. Optionally loads an OBJ model.
//!
//! ```bash
//! cargo run --example pbr_scene -- --point-lights 32 --tonemap reinhard
//! cargo run --example pbr_scene -- --model assets/helmet.obj
//! ```
//!
//! Controls: WASD / Q E to move, hold the right mouse button to look, Escape to quit.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use glam::{Mat4, Quat, Vec3};
use pbr_renderer::resources::Mesh;
use pbr_renderer::{
    Application, Camera, ClearFlags, DirectionalLight, Engine, EngineConfig, LightId, PointLight, RenderResult,
    Renderer, RendererConfig, RenderableId, SpotLight, TexturePaths, TonemapOperator, WgpuBackend,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tonemap {
    Reinhard,
    Aces,
    None,
}

impl From<Tonemap> for TonemapOperator {
    fn from(value: Tonemap) -> Self {
        match value {
            Tonemap::Reinhard => TonemapOperator::Reinhard,
            Tonemap::Aces => TonemapOperator::Aces,
            Tonemap::None => TonemapOperator::None,
        }
    }
}

/// Deferred PBR renderer demo
#[derive(Parser, Debug)]
#[command(name = "pbr_scene", about = "Deferred PBR renderer demo")]
struct Args {
    /// Window width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Window height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Disable vsync
    #[arg(long)]
    no_vsync: bool,

    /// Number of orbiting point lights
    #[arg(long, default_value_t = 8)]
    point_lights: usize,

    /// Tonemapping operator
    #[arg(long, value_enum, default_value_t = Tonemap::Aces)]
    tonemap: Tonemap,

    /// Manual exposure multiplier
    #[arg(long, default_value_t = 1.0)]
    exposure: f32,

    /// Use manual exposure only
    #[arg(long)]
    no_auto_exposure: bool,

    /// OBJ model placed at the center of the grid
    #[arg(long)]
    model: Option<PathBuf>,

    /// Directory with px/nx/py/ny/pz/nz.png skybox faces
    #[arg(long)]
    skybox: Option<PathBuf>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let skybox_faces = self
            .skybox
            .as_ref()
            .map(|dir| ["px", "nx", "py", "ny", "pz", "nz"].map(|face| dir.join(format!("{face}.png"))));

        EngineConfig {
            title: "PBR Scene".to_string(),
            width: self.width,
            height: self.height,
            vsync: !self.no_vsync,
            renderer: RendererConfig {
                exposure: self.exposure,
                auto_exposure: !self.no_auto_exposure,
                tonemap_operator: self.tonemap.into(),
                skybox_faces,
                ..Default::default()
            },
        }
    }
}

const GRID: i32 = 5;
const SPACING: f32 = 2.5;
const ORBIT_RADIUS: f32 = 8.0;

struct PbrScene {
    point_light_count: usize,
    model_path: Option<PathBuf>,
    sphere: Option<RenderableId>,
    plane: Option<RenderableId>,
    marker: Option<RenderableId>,
    model: Option<RenderableId>,
    orbiting: Vec<(LightId, Vec3)>,
}

impl PbrScene {
    fn new(args: &Args) -> Self {
        Self {
            point_light_count: args.point_lights,
            model_path: args.model.clone(),
            sphere: None,
            plane: None,
            marker: None,
            model: None,
            orbiting: Vec::new(),
        }
    }

    fn orbit_position(index: usize, count: usize, time: f32) -> Vec3 {
        let angle = time * 0.5 + index as f32 / count.max(1) as f32 * std::f32::consts::TAU;
        Vec3::new(angle.cos() * ORBIT_RADIUS, 1.5, angle.sin() * ORBIT_RADIUS)
    }
}

impl Application for PbrScene {
    fn init(&mut self, renderer: &mut Renderer<WgpuBackend>, camera: &mut Camera) -> RenderResult<()> {
        let sphere = Mesh::sphere(32, 16);
        let plane = Mesh::plane(40.0);
        let cube = Mesh::cube();
        let no_textures = TexturePaths::new();

        self.sphere = Some(renderer.create_renderable(&sphere.vertices, &sphere.indices, &no_textures)?);
        self.plane = Some(renderer.create_renderable(&plane.vertices, &plane.indices, &no_textures)?);
        self.marker = Some(renderer.create_renderable(&cube.vertices, &cube.indices, &no_textures)?);

        if let Some(path) = &self.model_path {
            match renderer.create_renderable_from_model(path) {
                Ok(id) => self.model = Some(id),
                Err(e) => log::error!("Failed to load {:?}: {}", path, e),
            }
        }

        let lights = renderer.light_manager_mut();
        lights.update_directional_light(DirectionalLight::new(
            Vec3::new(-0.4, -1.0, 0.3),
            Vec3::new(1.0, 0.95, 0.85),
            3.0,
        ));

        let palette = [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 0.6, 0.1)];
        for i in 0..self.point_light_count {
            let color = palette[i % palette.len()];
            let position = Self::orbit_position(i, self.point_light_count, 0.0);
            match lights.add_point_light(PointLight::new(position, color, 20.0, 10.0)) {
                Some(id) => self.orbiting.push((id, color)),
                None => break,
            }
        }

        lights.add_spot_light(SpotLight::new(
            Vec3::new(0.0, 8.0, 0.0),
            Vec3::NEG_Y,
            Vec3::ONE,
            60.0,
            20.0,
            15f32.to_radians(),
            25f32.to_radians(),
        ));

        camera.position = Vec3::new(0.0, 4.0, -14.0);
        camera.rotate(0.0, -12.0);
        log::info!(
            "Scene ready: {} point lights, model {:?}",
            self.orbiting.len(),
            self.model
        );
        Ok(())
    }

    fn render(&mut self, renderer: &mut Renderer<WgpuBackend>, time: f32) {
        let count = self.orbiting.len();
        for (i, (id, color)) in self.orbiting.iter().enumerate() {
            let position = Self::orbit_position(i, count, time);
            renderer
                .light_manager_mut()
                .update_point_light(*id, PointLight::new(position, *color, 20.0, 10.0));
            if let Some(marker) = self.marker {
                renderer.queue_draw_with_color(
                    marker,
                    Mat4::from_scale_rotation_translation(Vec3::splat(0.2), Quat::IDENTITY, position),
                    color.extend(1.0),
                );
            }
        }

        if let Some(plane) = self.plane {
            renderer.queue_draw(plane, Mat4::IDENTITY);
        }

        if let Some(sphere) = self.sphere {
            let offset = (GRID - 1) as f32 * SPACING / 2.0;
            for x in 0..GRID {
                for z in 0..GRID {
                    if self.model.is_some() && x == GRID / 2 && z == GRID / 2 {
                        continue;
                    }
                    let position = Vec3::new(x as f32 * SPACING - offset, 1.0, z as f32 * SPACING - offset);
                    renderer.queue_draw(sphere, Mat4::from_translation(position));
                }
            }
        }

        if let Some(model) = self.model {
            let spin = Quat::from_rotation_y(time * 0.3);
            renderer.queue_draw(
                model,
                Mat4::from_scale_rotation_translation(Vec3::ONE, spin, Vec3::new(0.0, 1.0, 0.0)),
            );
        }

        renderer.clear(ClearFlags::COLOR);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting PBR scene demo");

    let app = PbrScene::new(&args);
    if let Err(e) = Engine::run(args.engine_config(), app) {
        log::error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}
