pub mod algorithm;
pub mod config;
pub mod estimate;
pub mod export;
pub mod hashing;
pub mod ingest;
pub mod io;
pub mod model;
pub mod pot;
pub mod report;
pub mod stats;
pub mod status;
pub mod store;

pub mod prelude {
    pub use crate::algorithm::{Algorithm, HashFormat};
    pub use crate::model::HashRecord;
    pub use crate::store::{CrackTimePolicy, Store};
}
