use crate::*;
use candle_core::Module;
use log::debug;
use rand_distr::Normal;

/// Разреженный слой с эволюционирующей топологией (Sparse Evolutionary Training).
/// Кол. связей постоянно; шаг эволюции удаляет ближайшие к нулю веса и
/// выращивает столько же новых случайных связей.
///
/// Веса, связи и карта входящих связей меняются только через `&mut self`,
/// поэтому расчет никогда не видит их в несогласованном состоянии.
#[derive(Clone, Debug)]
pub struct SetLayer {
    config: LayerConfig,
    density: DensityPolicy,
    /// Ячейки: связь + вес
    table: ConnectionTable,
    bias: Option<Vec<f32>>,
    /// Карта входящих связей (перестраивается после каждой смены связей)
    fan_in: FanInMap,
    /// Номера входов по ячейкам, для index_select
    input_index: Vec<u32>,
    generator: ConnectionGenerator,
    selector: PruneSelector,
    /// Отобранные на удаление ячейки, ждущие эволюции
    marked: Option<Vec<usize>>,
    /// Кол. выполненных шагов эволюции
    cycles: u64,
}

impl SetLayer {
    /// Создание слоя со случайными связями и весами
    pub fn new(rng: &mut dyn RngCore, config: LayerConfig) -> Result<Self> {
        config.validate()?;
        let density = DensityPolicy::derive(&config)?;
        let generator = ConnectionGenerator::new(
            config.indim,
            config.outdim,
            config.max_generation_attempts,
        );
        let connections = generator.generate(rng, density.n_params, &HashSet::new())?;
        let table = ConnectionTable::from_connections(connections)?;
        let fan_in = FanInMap::build(table.connections(), config.outdim, density.n_params)?;
        let input_index = Self::input_index(&table);

        let mut layer = Self {
            bias: config.bias.then(|| vec![0.0; config.outdim]),
            selector: PruneSelector::new(config.zeta),
            config,
            density,
            table,
            fan_in,
            input_index,
            generator,
            marked: None,
            cycles: 0,
        };
        layer.reset_parameters(rng)?;
        debug!(
            "SET layer {}x{}: sparsity {:.4}, {} params, max fan-in {}",
            layer.config.indim,
            layer.config.outdim,
            layer.density.sparsity,
            layer.density.n_params,
            layer.fan_in.width()
        );
        Ok(layer)
    }

    /// Стандартное отклонение начальных весов: sqrt(2 / indim)
    pub fn init_std(&self) -> f32 {
        (2.0 / self.config.indim as f32).sqrt()
    }

    fn init_distribution(&self) -> Result<Normal<f32>> {
        Normal::new(0.0, self.init_std()).map_err(|e| SetError::Config(e.to_string()))
    }

    /// Новые веса и смещения из N(0, sqrt(2 / indim))
    pub fn reset_parameters(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        let normal = self.init_distribution()?;
        let weights: Vec<f32> = (0..self.table.len()).map(|_| rng.sample(normal)).collect();
        self.table.set_weights(&weights)?;
        if let Some(bias) = self.bias.as_mut() {
            bias.iter_mut().for_each(|b| *b = rng.sample(normal));
        }
        Ok(())
    }

    /// Номера входов по ячейкам
    fn input_index(table: &ConnectionTable) -> Vec<u32> {
        table.connections().map(|c| c.input as u32).collect()
    }

    /// Перестройка индексов расчета после смены связей
    fn reindex(&mut self) -> Result<()> {
        self.fan_in =
            FanInMap::build(self.table.connections(), self.config.outdim, self.table.len())?;
        self.input_index = Self::input_index(&self.table);
        Ok(())
    }
}

impl SetLayer {
    /// Расчет в прямом направлении: xs (batch, indim) -> (batch, outdim)
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let device = xs.device();
        let weights = self.weight_tensor(device)?;
        let bias = self.bias_tensor(device)?;
        self.forward_with(xs, &weights, bias.as_ref())
    }

    /// Расчет с внешними весами и смещениями (например, Var оптимизатора),
    /// связи и карта входящих связей берутся из слоя
    pub fn forward_with(
        &self,
        xs: &Tensor,
        weights: &Tensor,
        bias: Option<&Tensor>,
    ) -> Result<Tensor> {
        let (_, width) = xs.dims2()?;
        if width != self.config.indim {
            return Err(SetError::DimensionMismatch {
                expected: self.config.indim,
                actual: width,
            });
        }
        if let Some(bias) = bias {
            let len = bias.dims1()?;
            if len != self.config.outdim {
                return Err(SetError::DimensionMismatch {
                    expected: self.config.outdim,
                    actual: len,
                });
            }
        }
        let device = xs.device();
        let input_index =
            Tensor::from_slice(self.input_index.as_slice(), self.input_index.len(), device)?;
        let fan_in = self.fan_in.to_tensor(device)?;
        sparse_forward(xs, weights, &input_index, &fan_in, bias)
    }

    /// Веса тензором (n_params)
    pub fn weight_tensor(&self, device: &Device) -> Result<Tensor> {
        let weights: Vec<f32> = self.table.weights().collect();
        Ok(Tensor::from_vec(weights, self.table.len(), device)?)
    }

    /// Смещения тензором (outdim), если они есть
    pub fn bias_tensor(&self, device: &Device) -> Result<Option<Tensor>> {
        match &self.bias {
            Some(b) => Ok(Some(Tensor::from_slice(b.as_slice(), b.len(), device)?)),
            None => Ok(None),
        }
    }
}

impl SetLayer {
    /// Отбор ячеек на удаление по текущим весам
    pub fn mark_connections(&self) -> Result<Vec<usize>> {
        let weights: Vec<f32> = self.table.weights().collect();
        self.selector.select(&weights)
    }

    /// Обнуление отобранных весов без смены связей.
    /// Отбор запоминается и используется следующим шагом эволюции.
    pub fn zero_connections(&mut self) -> Result<&[usize]> {
        let marked = self.mark_connections()?;
        for &i in &marked {
            self.table.set_weight(i, 0.0)?;
        }
        debug!("zeroed {} connections", marked.len());
        Ok(self.marked.insert(marked).as_slice())
    }

    /// Шаг эволюции: удаление отобранных связей и выращивание новых на их месте.
    /// reinitialize = true: новые веса из начального распределения, иначе нули;
    /// связи меняются в обоих случаях.
    /// Возвращает номера замененных ячеек (состояние оптимизатора по ним устарело).
    /// При ошибке слой остается прежним.
    pub fn evolve(&mut self, rng: &mut dyn RngCore, reinitialize: bool) -> Result<Vec<usize>> {
        let indices = match &self.marked {
            Some(marked) => marked.clone(),
            None => self.mark_connections()?,
        };
        //новые связи не совпадают ни с одной действующей, включая удаляемые
        let connections = self.generator.generate(rng, indices.len(), self.table.active())?;
        let weights: Vec<f32> = if reinitialize {
            let normal = self.init_distribution()?;
            (0..indices.len()).map(|_| rng.sample(normal)).collect()
        } else {
            vec![0.0; indices.len()]
        };
        let replacements: Vec<Slot> = connections
            .into_iter()
            .zip(weights)
            .map(|(connection, weight)| Slot { connection, weight })
            .collect();
        self.table.rewire(&indices, &replacements)?;
        self.reindex()?;
        self.marked = None;
        self.cycles += 1;
        debug!(
            "evolution cycle {}: {} connections regrown (reinitialize = {reinitialize}), \
             max fan-in {}",
            self.cycles,
            indices.len(),
            self.fan_in.width()
        );
        Ok(indices)
    }

    /// Новые случайные связи для указанных ячеек (None - для всех), веса не меняются.
    /// Для части ячеек новые связи не совпадают с действующими;
    /// для всех ячеек граф строится заново.
    pub fn grow_connections(
        &mut self,
        rng: &mut dyn RngCore,
        indices: Option<&[usize]>,
    ) -> Result<()> {
        let regrow_all = indices.is_none();
        let all: Vec<usize>;
        let (indices, existing) = match indices {
            Some(indices) => (indices, self.table.active().clone()),
            None => {
                all = (0..self.table.len()).collect();
                (all.as_slice(), HashSet::new())
            }
        };
        if let Some(&i) = indices.iter().find(|&&i| i >= self.table.len()) {
            return Err(SetError::SelectionRange { k: i, len: self.table.len() });
        }
        let connections = self.generator.generate(rng, indices.len(), &existing)?;
        let replacements: Vec<Slot> = indices
            .iter()
            .zip(connections)
            .map(|(&i, connection)| Slot { connection, weight: self.table.slots()[i].weight })
            .collect();
        if regrow_all {
            //граф целиком: старые связи уходят все сразу
            self.table = ConnectionTable::new(replacements)?;
        } else {
            self.table.rewire(indices, &replacements)?;
        }
        self.marked = None;
        self.reindex()
    }
}

impl SetLayer {
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn indim(&self) -> usize {
        self.config.indim
    }

    pub fn outdim(&self) -> usize {
        self.config.outdim
    }

    pub fn sparsity(&self) -> f64 {
        self.density.sparsity
    }

    pub fn density(&self) -> f64 {
        self.density.density()
    }

    pub fn n_params(&self) -> usize {
        self.density.n_params
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.table.connections().collect()
    }

    pub fn weights(&self) -> Vec<f32> {
        self.table.weights().collect()
    }

    pub fn bias(&self) -> Option<&[f32]> {
        self.bias.as_deref()
    }

    pub fn fan_in_map(&self) -> &FanInMap {
        &self.fan_in
    }

    pub fn pending_marks(&self) -> Option<&[usize]> {
        self.marked.as_deref()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Запись весов (после шага внешнего оптимизатора)
    pub fn set_weights(&mut self, weights: &[f32]) -> Result<()> {
        self.table.set_weights(weights)
    }

    /// Запись смещений
    pub fn set_bias(&mut self, values: &[f32]) -> Result<()> {
        let bias = self
            .bias
            .as_mut()
            .ok_or_else(|| SetError::Config("layer has no bias".into()))?;
        if values.len() != bias.len() {
            return Err(SetError::DimensionMismatch {
                expected: bias.len(),
                actual: values.len(),
            });
        }
        bias.copy_from_slice(values);
        Ok(())
    }
}

impl Module for SetLayer {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        SetLayer::forward(self, xs).map_err(candle_core::Error::wrap)
    }
}
