mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod loader;
    pub mod pool;
    pub mod schema;
}
mod constants;

pub use constants::*;
pub use database::*;
