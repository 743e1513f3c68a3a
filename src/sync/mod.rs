//! Background refresh tasks.
//!
//! Each task polls one collaborator on its own interval and publishes an
//! immutable snapshot over a watch channel; readers never block a refresh.

pub mod gas;
pub mod pools;
pub mod prices;

pub use gas::{gas, GasWatcher};
pub use pools::{pools, PoolWatcher};
pub use prices::{prices, PriceClient};
