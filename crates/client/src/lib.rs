pub mod client;
pub mod interpolate;
pub mod monitor;
pub mod predict;
pub mod reconcile;

pub use client::{ClientState, ClientStatistics, MultiplayerClient};
pub use interpolate::{EntityInterpolator, EntityState};
pub use monitor::{ConnectionMonitor, Quality};
pub use predict::Predictor;
pub use reconcile::ClientReconciliation;
