mod config;
mod io;

use anyhow::{Context, Result};
use clap::Parser;
use config::Cli;
use dq_floorplan_lib::pipeline;
use log::info;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let dq_path = cli.dq_path();
    let tree = io::dq_io::read_quadtree(&dq_path).with_context(|| "loading quadtree")?;
    let leaves = tree.leaf_positions();

    let poses = io::dq_io::read_poses(&cli.poses_path(), cli.pose_count).with_context(|| "loading poses")?;
    info!("{} cells, {} poses", leaves.len(), poses.len());

    let config = cli.floorplan_config();
    let output = pipeline::run(&tree, &leaves, &poses, &config).with_context(|| "running floor-plan pipeline")?;

    let resolution = tree.base_halfwidth() * 2.0;
    let fp_path = cli.fp_output_path();
    io::fp_io::write_fp(&fp_path, resolution, &output.rep).with_context(|| "writing .fp output")?;
    info!("wrote {}", fp_path.display());

    if cli.flat {
        let obj_path = cli.input.with_extension("obj");
        io::mesh_io::write_obj_2d(&obj_path, &output.rep).with_context(|| "writing flat OBJ export")?;
        info!("wrote {}", obj_path.display());
    } else {
        let idf_path = cli.idf_output_path();
        io::bim_io::write_idf(&idf_path, &output.rep).with_context(|| "writing IDF export")?;
        info!("wrote {}", idf_path.display());
    }

    Ok(())
}
