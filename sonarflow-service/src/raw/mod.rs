// Raw File Module
// Temporal classification, weekly chunking and discovery of instrument files

pub mod chunk;
pub mod classify;
pub mod discovery;
pub mod record;

pub use chunk::{chunk_by_distinct_days, chunk_weekly, WeeklyBatch, WEEK_LENGTH_DAYS};
pub use classify::{parse_file_path, Classification, FilePattern};
pub use discovery::{club_raw_files, glob_all_files, parse_raw_paths, render_urlpath};
pub use record::RawFileRecord;
