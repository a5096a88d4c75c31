use crate::error::{Error, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub size: usize,
    pub iterations: usize,
    pub kernels: usize,
    pub workgroups: u32,
    pub workgroup_size: u32,
    pub streams: usize,
    pub radius: u32,
    pub threshold: f32,
    pub amount: f32,
    pub key: Option<u32>,
    pub verify: bool,
    pub timing: bool,
    pub quiet: bool,
    pub device: Option<usize>,
    pub seed: u64,
    pub dump_stats: Option<PathBuf>,
    pub image_input: Option<PathBuf>,
    pub image_output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: 1 << 20,
            iterations: 1,
            kernels: 4,
            workgroups: 64,
            workgroup_size: 256,
            streams: 2,
            radius: 5,
            threshold: 1.0,
            amount: 0.8,
            key: None,
            verify: false,
            timing: false,
            quiet: false,
            device: None,
            seed: 42,
            dump_stats: None,
            image_input: None,
            image_output: None,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::config("size must be > 0"));
        }
        if self.size > (1 << 28) {
            return Err(Error::config("size too large (max 2^28)"));
        }
        if self.iterations == 0 {
            return Err(Error::config("iterations must be > 0"));
        }
        if self.kernels == 0 || self.kernels > 64 {
            return Err(Error::config("kernels must be in 1..=64"));
        }
        if self.workgroups == 0 || self.workgroups > 65_535 {
            return Err(Error::config("workgroups must be in 1..=65535"));
        }
        if !self.workgroup_size.is_power_of_two() || self.workgroup_size > 256 {
            return Err(Error::config(
                "workgroup_size must be a power of two and <= 256",
            ));
        }
        if self.streams == 0 || self.streams > 16 {
            return Err(Error::config("streams must be in 1..=16"));
        }
        if self.radius == 0 || self.radius > 64 {
            return Err(Error::config("radius must be in 1..=64"));
        }
        if self.threshold < 0.0 || self.threshold > 255.0 {
            return Err(Error::config("threshold must be in [0, 255]"));
        }
        if self.amount < 0.0 || self.amount > 10.0 {
            return Err(Error::config("amount must be in [0, 10]"));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn size(mut self, size: usize) -> Self {
        self.config.size = size;
        self
    }

    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    pub fn kernels(mut self, kernels: usize) -> Self {
        self.config.kernels = kernels;
        self
    }

    pub fn workgroups(mut self, workgroups: u32) -> Self {
        self.config.workgroups = workgroups;
        self
    }

    pub fn workgroup_size(mut self, workgroup_size: u32) -> Self {
        self.config.workgroup_size = workgroup_size;
        self
    }

    pub fn streams(mut self, streams: usize) -> Self {
        self.config.streams = streams;
        self
    }

    pub fn radius(mut self, radius: u32) -> Self {
        self.config.radius = radius;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn amount(mut self, amount: f32) -> Self {
        self.config.amount = amount;
        self
    }

    pub fn key(mut self, key: u32) -> Self {
        self.config.key = Some(key);
        self
    }

    pub fn verify(mut self, verify: bool) -> Self {
        self.config.verify = verify;
        self
    }

    pub fn timing(mut self, timing: bool) -> Self {
        self.config.timing = timing;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    pub fn device(mut self, device: usize) -> Self {
        self.config.device = Some(device);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn dump_stats<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.dump_stats = Some(path.into());
        self
    }

    pub fn image_input<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.image_input = Some(path.into());
        self
    }

    pub fn image_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.image_output = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        let result = Config::builder().size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_workgroup_size_power_of_two() {
        assert!(Config::builder().workgroup_size(96).build().is_err());
        assert!(Config::builder().workgroup_size(512).build().is_err());
        assert!(Config::builder().workgroup_size(64).build().is_ok());
    }

    #[test]
    fn test_stream_range() {
        assert!(Config::builder().streams(0).build().is_err());
        assert!(Config::builder().streams(17).build().is_err());
        assert!(Config::builder().streams(16).build().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = Config::builder()
            .size(4096)
            .iterations(5)
            .kernels(8)
            .verify(true)
            .timing(true)
            .seed(7)
            .build()
            .unwrap();

        assert_eq!(config.size, 4096);
        assert_eq!(config.iterations, 5);
        assert_eq!(config.kernels, 8);
        assert!(config.verify);
        assert!(config.timing);
        assert_eq!(config.seed, 7);
    }
}
