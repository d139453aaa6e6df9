//! # swergio-coordination
//!
//! Multi-component patterns built from client handlers:
//!
//! - **Relay**: [`CorrelationStore`] and [`RelayHandlers`] chain a split
//!   computation's forward and gradient passes across any number of hops
//! - **Barrier**: [`Barrier`] collects one contribution per participant and
//!   sub-key, and fires each complete round exactly once
//! - **Evolution**: [`Evolution`] advances a population with pluggable
//!   selection, crossover, and mutation; [`EvolutionHandler`] drives it from
//!   a barrier

#![deny(unsafe_code)]

pub mod barrier;
pub mod correlation;
pub mod errors;
pub mod evolution;
pub mod relay;

pub use barrier::{Barrier, Contributions, Snapshot};
pub use correlation::{CorrelationRecord, CorrelationStore};
pub use errors::{BarrierError, EvolutionError};
pub use evolution::{Evolution, EvolutionHandler, Genome, Individual, StepOutcome};
pub use relay::{RelayHandlers, RelayRoutes, SplitComputation};
