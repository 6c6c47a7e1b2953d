use crate::transforms::augmentation::Augmentation;
use crate::transforms::config::AugmentationConfig;
use crate::transforms::{registry, Item, Transform};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Ordered augmentation steps plus the generator that drives them.
///
/// Steps run strictly in order, each on the previous step's output. The
/// pipeline owns its random source, so a data-loading worker should hold
/// its own `Pipeline` (see [`Pipeline::for_worker`]).
///
/// # Example
/// ```ignore
/// let config = AugmentationConfig::from_path("augmentations.json")?;
/// let mut pipeline = Pipeline::from_config_seeded(&config, 42)?;
/// let tensor = pipeline.apply(Item::Image(image))?.into_tensor()?;
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Augmentation>,
    rng: StdRng,
}

impl Pipeline {
    pub fn new(steps: Vec<Augmentation>, rng: StdRng) -> Self {
        Self { steps, rng }
    }

    /// Builds from config with an OS-seeded generator.
    pub fn from_config(config: &AugmentationConfig) -> Result<Self> {
        Ok(Self::new(registry::build_pipeline(config)?, StdRng::from_os_rng()))
    }

    /// Builds from config with a deterministic generator.
    pub fn from_config_seeded(config: &AugmentationConfig, seed: u64) -> Result<Self> {
        Ok(Self::new(
            registry::build_pipeline(config)?,
            StdRng::seed_from_u64(seed),
        ))
    }

    /// Builds the pipeline of one loader worker.
    /// Seed formula: base_seed + (epoch << 32) + worker_id
    /// so every worker gets unique but reproducible randomness.
    pub fn for_worker(
        config: &AugmentationConfig,
        worker_id: usize,
        epoch: usize,
        base_seed: u64,
    ) -> Result<Self> {
        let seed = base_seed
            .wrapping_add((epoch as u64) << 32)
            .wrapping_add(worker_id as u64);
        debug!(worker_id, epoch, seed, "seeding worker pipeline");
        Self::from_config_seeded(config, seed)
    }

    /// Runs every step on `item` in order.
    pub fn apply(&mut self, item: Item) -> Result<Item> {
        let Self { steps, rng } = self;
        steps.iter().enumerate().try_fold(item, |item, (i, step)| {
            step.apply(item, &mut *rng)
                .with_context(|| format!("Augmentation step {} (`{}`) failed", i, step.name()))
        })
    }

    /// Config that rebuilds this pipeline, keys in step order.
    pub fn config(&self) -> Result<AugmentationConfig> {
        let mut config = AugmentationConfig::new();
        for step in &self.steps {
            config.merge(step.config_fragment()?);
        }
        Ok(config)
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(Augmentation::name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Augmentation> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
