pub mod bim_io;
pub mod dq_io;
pub mod fp_io;
pub mod mesh_io;
