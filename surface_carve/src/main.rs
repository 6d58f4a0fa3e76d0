mod config;
mod io;

use anyhow::{Context, Result};
use clap::Parser;
use config::Cli;
use log::info;
use surface_carve_lib::{mesh_from_grid, pipeline, Mesh};

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.carve_config();

    let mesh: Mesh = if cli.read_vox {
        let grid = io::voxel_io::read_vox(&cli.vox_path()).with_context(|| "loading voxel grid")?;
        info!("read {} boundary voxels", grid.boundary_voxels().count());
        mesh_from_grid(&grid, &config)
    } else {
        let poses = io::xyz_io::read_poses(&cli.poses_path(), cli.pose_count).with_context(|| "loading poses")?;
        let samples = io::xyz_io::read_samples(&cli.xyz_path(), &poses).with_context(|| "loading point cloud")?;
        info!("{} poses, {} samples", poses.len(), samples.len());

        let rays = samples.iter().map(|s| pipeline::Ray { pose: s.pose, sample: s.pos });
        let output = pipeline::run(rays, &samples, &config).with_context(|| "running surface-carve pipeline")?;
        info!("carved {} boundary voxels, {} triangles", output.grid.boundary_voxels().count(), output.mesh.triangles.len());

        if !cli.read_vox {
            let vox_path = cli.vox_path();
            io::voxel_io::write_vox(&vox_path, &output.grid).with_context(|| "writing .vox output")?;
            info!("wrote {}", vox_path.display());
        }
        output.mesh
    };

    let mesh_path = cli.mesh_output_path();
    if cli.obj {
        io::mesh_io::write_obj(&mesh_path, &mesh).with_context(|| "writing OBJ export")?;
    } else {
        io::mesh_io::write_ply(&mesh_path, &mesh, cli.ascii).with_context(|| "writing PLY export")?;
    }
    info!("wrote {}", mesh_path.display());

    Ok(())
}
