pub mod utils;

mod enrollment;
mod profile;
mod schedule;
