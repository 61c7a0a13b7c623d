pub mod color_transfer;
pub mod colorimetry;
pub mod compositor;
pub mod light_map;
pub mod polygon_mask;
pub mod region_stats;
pub mod tile_pattern;
pub mod view_transform;
