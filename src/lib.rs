pub mod cli;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod normalization;
pub mod store;

pub mod util {
    pub mod db;
    pub mod env;
}
