//! Barrier and evolution errors.

use swergio_client::HandlerError;
use swergio_core::ParticipantId;
use thiserror::Error;

/// Errors from a [`Barrier`](crate::Barrier).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarrierError {
    /// The sub-key is not tracked by this barrier.
    #[error("unknown barrier sub-key `{0}`")]
    UnknownSubKey(String),

    /// A barrier needs at least one sub-key.
    #[error("barrier tracks no sub-keys")]
    NoSubKeys,

    /// A barrier needs at least one participant.
    #[error("barrier expects zero participants")]
    ZeroParticipants,
}

/// Errors from an [`Evolution`](crate::Evolution) step.
#[derive(Debug, Error, PartialEq)]
pub enum EvolutionError {
    /// Nothing to evolve.
    #[error("population is empty")]
    EmptyPopulation,

    /// Fitness values do not line up with the population.
    #[error("expected {expected} fitness values, got {actual}")]
    SizeMismatch {
        /// Population size.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },

    /// A participant reported weights but has no fitness.
    #[error("no fitness for participant `{0}`")]
    MissingFitness(ParticipantId),

    /// A probability outside `0.0..=1.0`.
    #[error("{name} must be within 0..=1, got {value}")]
    Probability {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A distribution parameter that cannot be sampled.
    #[error("invalid {name}: {value}")]
    Parameter {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
}

impl From<BarrierError> for HandlerError {
    fn from(err: BarrierError) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<EvolutionError> for HandlerError {
    fn from(err: EvolutionError) -> Self {
        Self::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            BarrierError::UnknownSubKey("loss".into()).to_string(),
            "unknown barrier sub-key `loss`"
        );
        assert_eq!(
            EvolutionError::SizeMismatch { expected: 20, actual: 19 }.to_string(),
            "expected 20 fitness values, got 19"
        );
        assert_eq!(
            EvolutionError::Probability { name: "cxpb", value: 1.5 }.to_string(),
            "cxpb must be within 0..=1, got 1.5"
        );
    }

    #[test]
    fn converts_into_handler_error() {
        let err: HandlerError = EvolutionError::MissingFitness(ParticipantId::from("model3")).into();
        assert_eq!(err.to_string(), "no fitness for participant `model3`");
    }
}
