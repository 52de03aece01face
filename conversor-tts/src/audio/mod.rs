//! Audio assembly and post-processing through ffmpeg.

pub mod assembler;
pub mod media;

pub use assembler::{assemble, is_ffmpeg_available};
pub use media::{
    MAX_PART_SECS, change_speed, enhanced_name, probe_duration, render_video, split_parts,
};
