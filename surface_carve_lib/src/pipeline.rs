//! Orchestrates the full grid-to-mesh pipeline (C6 through C9): carve every
//! pose/sample ray into the grid, drop outlier specks, assign planar
//! regions, triangulate survivors, and drop any connected mesh component too
//! small to be a real surface fragment.

use log::info;
use recon_geom::{new_map, MapType, Point3, UnionFind};

use crate::constants::{DEFAULT_MIN_REGION_AREA, DEFAULT_RANGE_LIMIT, DEFAULT_RESOLUTION, MIN_MESH_UNION_SIZE};
use crate::dgrid::{DGrid, Sample};
use crate::error::PipelineError;
use crate::mesher::assign_regions;
use crate::region::{triangulate, Mesh};
use crate::voxel::voxel_containing;

#[derive(Clone, Copy, Debug)]
pub struct CarveConfig {
    pub resolution: f64,
    pub range_limit: f64,
    pub point_occlusion: bool,
    /// Keep only every `downsample`th ray, if set and greater than 1.
    pub downsample: Option<u32>,
    pub simplify: bool,
    pub min_region_area: f64,
    /// Extra voxels of padding added around every sample when seeding the
    /// solid region a carve is allowed to eat into.
    pub bounds_padding: i32,
}

impl Default for CarveConfig {
    fn default() -> Self {
        CarveConfig {
            resolution: DEFAULT_RESOLUTION,
            range_limit: DEFAULT_RANGE_LIMIT,
            point_occlusion: true,
            downsample: None,
            simplify: true,
            min_region_area: DEFAULT_MIN_REGION_AREA,
            bounds_padding: 1,
        }
    }
}

/// One ray to carve: a pose position to an observed sample position. The
/// sample is assumed to sit on or just inside the solid surface; carving
/// eats everything between the pose and that surface.
pub struct Ray {
    pub pose: Point3,
    pub sample: Point3,
}

pub struct CarveOutput {
    pub grid: DGrid,
    pub mesh: Mesh,
}

pub fn run<I>(rays: I, samples_for_occlusion: &[Sample], config: &CarveConfig) -> Result<CarveOutput, PipelineError>
where
    I: IntoIterator<Item = Ray>,
{
    let mut grid = DGrid::new(config.resolution)?;

    if config.point_occlusion {
        grid.populate_points_from_xyz(samples_for_occlusion.iter().copied(), config.range_limit * config.range_limit);
    }

    let rays: Vec<Ray> = rays.into_iter().collect();
    if rays.is_empty() {
        return Err(PipelineError::EmptyGrid);
    }

    let (min, max) = sample_bounds(&rays, config.resolution, config.bounds_padding);
    grid.seed_solid_box(min, max);

    for (i, ray) in rays.into_iter().enumerate() {
        if let Some(step) = config.downsample {
            if step > 1 && (i as u32) % step != 0 {
                continue;
            }
        }
        grid.carve_segment(ray.pose, ray.sample, !config.point_occlusion);
    }
    if grid.is_empty() {
        return Err(PipelineError::EmptyGrid);
    }

    let removed = grid.remove_outliers();
    if removed > 0 {
        info!("remove_outliers cleared {} speck voxels", removed);
    }

    let mesh = mesh_from_grid(&grid, config);
    Ok(CarveOutput { grid, mesh })
}

/// Runs C8/C9 (region assignment, triangulation, small-component pruning)
/// directly on an already-carved grid. Shared by [`run`] and by a caller
/// that loaded a `.vox` file straight from disk instead of carving one.
pub fn mesh_from_grid(grid: &DGrid, config: &CarveConfig) -> Mesh {
    let assignment = assign_regions(grid, config.resolution, config.simplify);
    let mut mesh = triangulate(&assignment, config.resolution, config.min_region_area);
    drop_small_components(&mut mesh);
    mesh
}

/// Computes the voxel box spanning every ray's sample point, padded by
/// `padding` voxels on each side. This is the region carving is allowed to
/// treat as solid; everything outside is already free space by definition.
fn sample_bounds(rays: &[Ray], vs: f64, padding: i32) -> ((i32, i32, i32), (i32, i32, i32)) {
    let mut min = voxel_containing(rays[0].sample, vs);
    let mut max = min;
    for ray in rays {
        let v = voxel_containing(ray.sample, vs);
        min = (min.0.min(v.0), min.1.min(v.1), min.2.min(v.2));
        max = (max.0.max(v.0), max.1.max(v.1), max.2.max(v.2));
    }
    (
        (min.0 - padding, min.1 - padding, min.2 - padding),
        (max.0 + padding, max.1 + padding, max.2 + padding),
    )
}

/// Drops every connected component of the final mesh with fewer than
/// `MIN_MESH_UNION_SIZE` vertices: numerical noise left by a stray carve
/// that never joined the main structure.
fn drop_small_components(mesh: &mut Mesh) {
    if mesh.vertices.is_empty() {
        return;
    }
    let mut uf = UnionFind::new(mesh.vertices.len());
    for t in &mesh.triangles {
        uf.union(t[0] as usize, t[1] as usize);
        uf.union(t[1] as usize, t[2] as usize);
    }

    let roots: Vec<usize> = (0..mesh.vertices.len()).map(|i| uf.find(i)).collect();
    let mut sizes: MapType<usize, usize> = new_map();
    for &r in &roots {
        *sizes.entry(r).or_insert(0) += 1;
    }

    let keep = |t: &[u32; 3]| sizes[&roots[t[0] as usize]] >= MIN_MESH_UNION_SIZE;
    if mesh.triangles.iter().all(keep) {
        return;
    }

    let mut kept_tris = Vec::new();
    let mut kept_regions = Vec::new();
    for (t, &r) in mesh.triangles.iter().zip(&mesh.triangle_region) {
        if keep(t) {
            kept_tris.push(*t);
            kept_regions.push(r);
        }
    }
    info!(
        "dropped {} triangles belonging to components smaller than {}",
        mesh.triangles.len() - kept_tris.len(),
        MIN_MESH_UNION_SIZE
    );
    mesh.triangles = kept_tris;
    mesh.triangle_region = kept_regions;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carving_nothing_errors() {
        let config = CarveConfig::default();
        let result = run(std::iter::empty(), &[], &config);
        assert!(matches!(result, Err(PipelineError::EmptyGrid)));
    }

    #[test]
    fn carving_opposite_faces_of_a_thin_wall_yields_two_regions() {
        let config = CarveConfig {
            resolution: 1.0,
            min_region_area: 0.0,
            simplify: false,
            point_occlusion: false,
            bounds_padding: 0,
            ..CarveConfig::default()
        };
        let rays = vec![
            Ray { pose: Point3::new(-5.5, 0.5, 0.5), sample: Point3::new(0.5, 0.5, 0.5) },
            Ray { pose: Point3::new(6.5, 0.5, 0.5), sample: Point3::new(0.5, 0.5, 0.5) },
        ];
        let output = run(rays, &[], &config).unwrap();
        assert!(output.grid.verify());
        assert!(output.grid.is_boundary((0, 0, 0)));
        assert_eq!(output.mesh.regions.len(), 2);
        assert_eq!(output.mesh.triangles.len(), 4);
    }
}
