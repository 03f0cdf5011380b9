use crate::*;
use serde::{Deserialize, Serialize};

/// Параметры слоя SET. После создания слоя не меняются.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Кол. входов
    pub indim: usize,
    /// Кол. выходов (нейронов слоя)
    pub outdim: usize,
    /// epsilon из формулы Эрдёша–Реньи (пропорционален кол. параметров)
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// Явно заданная разреженность (вместо epsilon)
    #[serde(default)]
    pub sparsity: Option<f64>,
    /// Доля связей, заменяемых за один шаг эволюции
    #[serde(default = "default_zeta")]
    pub zeta: f64,
    /// Есть ли у слоя смещения
    #[serde(default = "default_bias")]
    pub bias: bool,
    /// Предел попыток добора уникальных связей
    #[serde(default = "default_max_generation_attempts")]
    pub max_generation_attempts: usize,
}

fn default_epsilon() -> f64 {
    11.0
}

fn default_zeta() -> f64 {
    0.3
}

fn default_bias() -> bool {
    true
}

fn default_max_generation_attempts() -> usize {
    64
}

impl LayerConfig {
    /// Конфигурация с параметрами по умолчанию: epsilon = 11, zeta = 0.3, со смещениями
    pub fn new(indim: usize, outdim: usize) -> Self {
        Self {
            indim,
            outdim,
            epsilon: default_epsilon(),
            sparsity: None,
            zeta: default_zeta(),
            bias: default_bias(),
            max_generation_attempts: default_max_generation_attempts(),
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_sparsity(mut self, sparsity: f64) -> Self {
        self.sparsity = Some(sparsity);
        self
    }

    pub fn with_zeta(mut self, zeta: f64) -> Self {
        self.zeta = zeta;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_max_generation_attempts(mut self, attempts: usize) -> Self {
        self.max_generation_attempts = attempts;
        self
    }

    /// Проверка параметров. Кол. параметров проверяется отдельно в DensityPolicy.
    pub fn validate(&self) -> Result<()> {
        if self.indim == 0 || self.outdim == 0 {
            return Err(SetError::Config(format!(
                "dimensions must be positive, got {}x{}",
                self.indim, self.outdim
            )));
        }
        if !self.zeta.is_finite() || !(0.0..=1.0).contains(&self.zeta) {
            return Err(SetError::Config(format!("zeta must be in [0, 1], got {}", self.zeta)));
        }
        if self.sparsity.is_none() && !self.epsilon.is_finite() {
            return Err(SetError::Config(format!("epsilon must be finite, got {}", self.epsilon)));
        }
        if self.max_generation_attempts == 0 {
            return Err(SetError::Config("max_generation_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
