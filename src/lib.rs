//! Reading and writing `mrgd00` archives, the MZX0 compression used inside
//! them, and the MZP tile images they carry.

pub mod error;
pub mod hep;
pub mod io_traits;
pub mod mrg;
pub mod mzp;
pub mod mzx;
pub mod raster;

pub use error::{Error, Result};
