//! Разреженный слой с эволюционирующей топологией (SET, Sparse Evolutionary Training).
//!
//! Слой начинает со случайного двудольного графа входы-выходы заданной плотности
//! и по внешней команде заменяет долю zeta ближайших к нулю весов новыми случайными
//! связями; кол. связей при этом не меняется.
//!
//! Расчет градиентов, шаг оптимизатора и расписание эволюции - снаружи:
//! после `evolve` состояние оптимизатора по замененным ячейкам нужно сбросить.

mod config;
mod connections;
mod density;
mod error;
mod fan_in;
mod forward;
mod pruning;
mod set_layer;

pub use config::LayerConfig;
pub use connections::{Connection, ConnectionGenerator, ConnectionTable, Slot};
pub use density::{DensityPolicy, SPARSITY_CLAMP};
pub use error::{Result, SetError};
pub use fan_in::FanInMap;
pub use forward::sparse_forward;
pub use pruning::{top_k_indices, PruneSelector};
pub use set_layer::SetLayer;

use std::collections::HashSet;

use candle_core::{Device, Tensor};
use itertools::Itertools;
use rand::{Rng, RngCore};
