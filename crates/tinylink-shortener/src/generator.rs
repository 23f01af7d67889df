use rand::distributions::Alphanumeric;
use rand::Rng;
use tinylink_core::ShortCode;

/// Produces candidate short codes.
///
/// Generators are pure: they never consult storage, so a candidate may
/// already be taken and the caller is expected to retry on conflict.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortCode;
}

/// Draws fixed-length codes uniformly from `[A-Za-z0-9]`.
#[derive(Debug, Clone, Copy)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortCode::new_unchecked(code)
    }
}
