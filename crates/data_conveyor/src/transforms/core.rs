use anyhow::Result;
use rand::Rng;

/// Defines the core `Transform` trait for augmentation steps.
///
/// The `Transform<I, O>` trait represents a stateless operation that
/// converts an input of type `I` into an output of type `O`, drawing any
/// randomness it needs from the generator passed in by the caller. The
/// transform itself never owns a random source, so one instance can be
/// shared between workers that each hold their own generator.
///
/// Config-driven sequences of steps are run by [`crate::Pipeline`].
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply<R: Rng>(&self, input: I, rng: &mut R) -> Result<O>;
}
