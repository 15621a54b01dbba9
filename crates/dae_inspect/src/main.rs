use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use dae_core::generate::GeneratedScene;
use dae_core::intern::Interner;
use dae_core::{Document, GeneratorContext, GeneratorOptions, LoadOptions, SceneId};
use serde::Deserialize;

const USAGE: &str = "Usage: dae_inspect <file.dae> [--cache DIR] [--options FILE] [--scene N] [--time T] [--json]";

/// Optional JSON file with both option groups, each partially filled.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OptionsFile {
    load: LoadOptions,
    generate: GeneratorOptions,
}

#[derive(Debug)]
struct Args {
    path: PathBuf,
    cache_dir: Option<PathBuf>,
    options: Option<PathBuf>,
    scene: Option<usize>,
    time: f32,
    json: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    let mut cache_dir = None;
    let mut options = None;
    let mut scene = None;
    let mut time = 0.0;
    let mut json = false;

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{} needs a value", flag));
        match arg.as_str() {
            "--cache" => cache_dir = Some(PathBuf::from(value("--cache")?)),
            "--options" => options = Some(PathBuf::from(value("--options")?)),
            "--scene" => scene = Some(value("--scene")?.parse().context("--scene expects an index")?),
            "--time" => time = value("--time")?.parse().context("--time expects seconds")?,
            "--json" => json = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("Unknown flag '{}'\n{}", other, USAGE),
            other => path = Some(PathBuf::from(other)),
        }
    }

    let path = path.with_context(|| USAGE.to_string())?;
    Ok(Args {
        path,
        cache_dir,
        options,
        scene,
        time,
        json,
    })
}

fn load_options(args: &Args) -> Result<OptionsFile> {
    let mut options = match &args.options {
        Some(file) => {
            let text = fs::read_to_string(file)
                .with_context(|| format!("Failed to read options file {}", file.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse options file {}", file.display()))?
        }
        None => OptionsFile::default(),
    };
    if let Some(dir) = &args.cache_dir {
        options.load = options.load.with_cache(dir);
    }
    Ok(options)
}

fn print_scene(scene: &GeneratedScene, time: f32) {
    println!("\nScene '{}' (up axis {:?})", scene.name, scene.up_axis);
    println!("  Nodes:     {}", scene.nodes.len());
    println!("  Meshes:    {} ({} triangles)", scene.meshes.len(), scene.triangle_count());
    println!("  Cameras:   {}", scene.cameras.len());
    println!("  Lights:    {}", scene.lights.len());
    println!("  Textures:  {}", scene.textures.len());
    println!("  Animated:  {} ({} curves, {:.3}s)", scene.is_animated(), scene.curves.len(), scene.duration);

    let bounds = scene.world_bounds(time);
    if !bounds.is_empty() {
        let (min, max) = (bounds.min(), bounds.max());
        println!(
            "  Bounds @ {:.2}s: ({:.3}, {:.3}, {:.3}) .. ({:.3}, {:.3}, {:.3})",
            time, min.x, min.y, min.z, max.x, max.y, max.z
        );
    }

    for instance in &scene.meshes {
        let mesh = &instance.mesh;
        println!(
            "  - {} [{}]: {} layers, {} triangles{}",
            instance.name,
            mesh.name,
            mesh.layers.len(),
            mesh.triangle_count(),
            if mesh.has_generated_normals() { ", generated normals" } else { "" }
        );
        for material in &mesh.materials {
            println!("      material '{}' ({:?})", material.name, material.shading);
        }
    }
    for camera in &scene.cameras {
        let optics = &camera.camera;
        let view = match (optics.fov_x(), optics.fov_y(), optics.ortho_extent()) {
            (_, _, Some((x, y))) => format!("extent {:.3} x {:.3}", x, y),
            (x, y, None) => format!(
                "fov {} x {}",
                x.map_or("?".to_string(), |x| format!("{:.1}", x)),
                y.map_or("?".to_string(), |y| format!("{:.1}", y))
            ),
        };
        let aspect = optics.aspect().map_or("?".to_string(), |a| format!("{:.3}", a));
        println!(
            "  - camera {} ({:?}, {}, aspect {})",
            camera.name, optics.projection, view, aspect
        );
    }
    for light in &scene.lights {
        println!("  - light {} ({:?})", light.name, light.light.kind);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args()?;
    let options = load_options(&args)?;
    inspect(&args, options)?;

    // The document and its generated scene are gone; release their names.
    let released = Interner::global().purge_unused();
    log::debug!("Released {} interned names", released);
    Ok(())
}

fn inspect(args: &Args, options: OptionsFile) -> Result<()> {
    let document = Document::load(&args.path, &options.load)
        .with_context(|| format!("Failed to load {}", args.path.display()))?;
    let summary = document.summary();

    let scene_id = match args.scene {
        Some(index) if index < document.scenes.len() => Some(SceneId(index)),
        Some(index) => bail!("Scene {} out of range ({} scenes)", index, document.scenes.len()),
        None => document.default_scene(),
    };
    let Some(scene_id) = scene_id else {
        log::warn!("Document has no visual scene");
        if args.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        return Ok(());
    };

    let ctx = GeneratorContext::for_document(&document, options.generate);
    let scene = document.generated_scene(scene_id, &ctx)?;

    if args.json {
        let meshes: Vec<_> = scene.meshes.iter().map(|m| m.mesh.as_ref()).collect();
        let report = serde_json::json!({
            "summary": summary,
            "scene": scene.name,
            "duration": scene.duration,
            "meshes": meshes,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", args.path.display());
    println!("  Authoring tool: {}", summary.authoring_tool.as_deref().unwrap_or("unknown"));
    println!("  Up axis:        {:?} ({} m/unit)", summary.up_axis, summary.unit_meter);
    println!("  Geometries:     {} ({} polylists, {} triangles)", summary.geometries, summary.polylists, summary.triangles);
    println!("  Materials:      {} ({} effects, {} images)", summary.materials, summary.effects, summary.images);
    println!("  Scenes:         {} ({} nodes)", summary.scenes, summary.nodes);
    println!(
        "  Animations:     {} ({} animated cells, {:.3}s)",
        summary.animations, summary.animated_cells, summary.max_animation_duration
    );
    print_scene(&scene, args.time);

    Ok(())
}
