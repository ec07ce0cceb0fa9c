pub mod chunks;
pub mod run;
pub mod validate;
