use crate::*;
use log::warn;

/// Разреженность, к которой сводится слой при сильно разреженном результате
pub const SPARSITY_CLAMP: f64 = 0.9;

/// Разреженность слоя и кол. его параметров (связей)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityPolicy {
    pub sparsity: f64,
    pub n_params: usize,
}

impl DensityPolicy {
    /// Расчет из конфигурации.
    /// Явная sparsity берется как есть, иначе по формуле Эрдёша–Реньи:
    /// density = epsilon * (indim + outdim) / (indim * outdim).
    /// sparsity > 1 сводится к 0.9; отрицательная sparsity (density > 1) не правится.
    pub fn derive(config: &LayerConfig) -> Result<Self> {
        let (indim, outdim) = (config.indim as f64, config.outdim as f64);
        let sparsity = match config.sparsity {
            Some(s) => s,
            None => {
                let density = config.epsilon * (indim + outdim) / (indim * outdim);
                let sparsity = 1.0 - density;
                if sparsity > 1.0 {
                    warn!(
                        "sparsity {sparsity} > 1 for {}x{}, clamped to {SPARSITY_CLAMP}",
                        config.indim, config.outdim
                    );
                    SPARSITY_CLAMP
                } else {
                    sparsity
                }
            }
        };
        let n_params = Self::n_params(config.indim, config.outdim, sparsity)?;
        Ok(Self { sparsity, n_params })
    }

    /// floor(indim * outdim * (1 - sparsity)), не меньше 1
    pub fn n_params(indim: usize, outdim: usize, sparsity: f64) -> Result<usize> {
        let n = (indim as f64 * outdim as f64 * (1.0 - sparsity)).floor();
        // NaN тоже отсекается
        if !(n >= 1.0) {
            return Err(SetError::Config(format!(
                "layer {indim}x{outdim} with sparsity {sparsity} has no parameters"
            )));
        }
        // индекс-заглушка n_params должен поместиться в u32
        if n >= u32::MAX as f64 {
            return Err(SetError::Config(format!("too many parameters: {n}")));
        }
        Ok(n as usize)
    }

    pub fn density(&self) -> f64 {
        1.0 - self.sparsity
    }
}
