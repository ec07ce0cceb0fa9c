// Configuration Module
// Already-validated dataset and recipe structures plus their YAML loader

pub mod error;
pub mod models;
pub mod parser;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use models::{
    Dataset, DatasetArgs, OutputConfig, Process, Recipe, Stage, StageOptions, TransectArgs,
};
pub use parser::ConfigLoader;
