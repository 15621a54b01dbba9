// Dump the triangulated meshes of one geometry.
// Run with: cargo run --release --bin dump_mesh -- <file.dae> [geometry-id]

use std::env;

use dae_core::{Document, GeneratorContext, GeneratorOptions, LoadOptions, Name};
use dae_math::Vec3;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <file.dae> [geometry-id]", args[0]);
        std::process::exit(1);
    }

    let document = Document::load(&args[1], &LoadOptions::default())?;
    let ctx = GeneratorContext::for_document(&document, GeneratorOptions::default().with_textures(false));

    let geometries: Vec<_> = match args.get(2) {
        Some(id) => {
            let Some(found) = document.find_geometry(&Name::new(id)) else {
                anyhow::bail!("No geometry with id '{}'", id);
            };
            vec![found]
        }
        None => document.geometries.entries().map(|(id, _)| id).collect(),
    };
    println!("Found {} geometr{}", geometries.len(), if geometries.len() == 1 { "y" } else { "ies" });

    for id in geometries {
        let mesh = match document.geometry_mesh(id, &ctx) {
            Ok(mesh) => mesh,
            Err(e) => {
                println!("\n=== {:?}: {} ===", id, e);
                continue;
            }
        };
        println!("\n=== {} ===", mesh.name);
        println!("Layers: {}", mesh.layers.len());
        println!("Streams: {}  Indices: {}", mesh.stream_count(), mesh.index_count());

        for (i, tri) in mesh.to_triangle_meshes().iter().enumerate() {
            let material = mesh.materials.get(tri.material).map_or("<none>", |m| m.name.as_str());
            println!("\n  Pass {} (material '{}')", i, material);
            println!("    Vertices:  {}", tri.vertex_count());
            println!("    Triangles: {}", tri.triangle_count());
            println!("    UVs:       {}", if tri.has_uvs() { "yes" } else { "no" });

            // First non-degenerate triangle, with its winding.
            let first = tri
                .triangle_vertices()
                .into_iter()
                .find(|[a, b, c]| (*b - *a).cross(*c - *a).length() > 1e-4);
            if let Some([a, b, c]) = first {
                let n = (b - a).cross(c - a).normalize();
                println!("    First triangle: {} {} {}", fmt(a), fmt(b), fmt(c));
                println!("    Face normal (CCW): {}", fmt(n));
            }
        }

        if !mesh.bounds.is_empty() {
            println!("\nBounds: {} .. {}", fmt(mesh.bounds.min()), fmt(mesh.bounds.max()));
        }
    }

    Ok(())
}

fn fmt(v: Vec3) -> String {
    format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z)
}
