use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config = Self::from_yaml(&contents)?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents).context("Invalid config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let factor = self.preprocessing.resize_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            bail!("preprocessing.resize_factor must be in (0, 1], got {}", factor);
        }

        let movement = &self.movement;
        if movement.history_size == 0 || movement.stable_history_size == 0 {
            bail!("movement history sizes must be non-zero");
        }
        for (name, kernel) in [
            ("blur_kernel", movement.blur_kernel),
            ("threshold_block_size", movement.threshold_block_size),
            ("morph_kernel", movement.morph_kernel),
        ] {
            if kernel == 0 || kernel % 2 == 0 {
                bail!("movement.{} must be odd, got {}", name, kernel);
            }
        }

        if self.violations.max_violations == 0 {
            bail!("violations.max_violations must be at least 1");
        }
        if self.session.channel_capacity == 0 {
            bail!("session.channel_capacity must be at least 1");
        }
        Ok(())
    }
}
