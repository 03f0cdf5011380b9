use crate::*;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

/// Связь (номер входа, номер выхода)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    /// Номер входа, [0, indim)
    pub input: usize,
    /// Номер выхода (нейрона слоя), [0, outdim)
    pub output: usize,
}

impl Connection {
    pub fn new(input: usize, output: usize) -> Self {
        Self { input, output }
    }
}

/// Ячейка параметров: связь и ее вес.
/// Вес и связь хранятся вместе, поэтому рассинхронизироваться не могут.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot {
    pub connection: Connection,
    pub weight: f32,
}

/// Таблица связей слоя: по одной связи на ячейку вектора весов.
/// Кол. ячеек задается при создании и больше не меняется.
#[derive(Clone, Debug)]
pub struct ConnectionTable {
    slots: Vec<Slot>,
    /// Множество действующих связей (для проверки уникальности)
    active: HashSet<Connection>,
}

impl ConnectionTable {
    /// Таблица из готовых ячеек; связи не должны повторяться
    pub fn new(slots: Vec<Slot>) -> Result<Self> {
        let active: HashSet<Connection> = slots.iter().map(|s| s.connection).collect();
        if active.len() != slots.len() {
            return Err(SetError::Config(format!(
                "{} duplicate connections in table",
                slots.len() - active.len()
            )));
        }
        Ok(Self { slots, active })
    }

    /// Таблица из связей с нулевыми весами
    pub fn from_connections(connections: Vec<Connection>) -> Result<Self> {
        Self::new(
            connections
                .into_iter()
                .map(|connection| Slot { connection, weight: 0.0 })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn connections(&self) -> impl Iterator<Item = Connection> + '_ {
        self.slots.iter().map(|s| s.connection)
    }

    pub fn weights(&self) -> impl Iterator<Item = f32> + '_ {
        self.slots.iter().map(|s| s.weight)
    }

    pub fn active(&self) -> &HashSet<Connection> {
        &self.active
    }

    pub fn contains(&self, connection: &Connection) -> bool {
        self.active.contains(connection)
    }

    /// Запись всех весов разом (от внешнего оптимизатора)
    pub fn set_weights(&mut self, weights: &[f32]) -> Result<()> {
        if weights.len() != self.slots.len() {
            return Err(SetError::DimensionMismatch {
                expected: self.slots.len(),
                actual: weights.len(),
            });
        }
        self.slots.iter_mut().zip(weights).for_each(|(s, w)| s.weight = *w);
        Ok(())
    }

    pub fn set_weight(&mut self, index: usize, weight: f32) -> Result<()> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SetError::SelectionRange { k: index, len })?;
        slot.weight = weight;
        Ok(())
    }

    /// Замена содержимого ячеек: новая связь и новый вес записываются вместе.
    /// Новые связи не должны совпадать с действующими.
    pub fn rewire(&mut self, indices: &[usize], replacements: &[Slot]) -> Result<()> {
        if indices.len() != replacements.len() {
            return Err(SetError::DimensionMismatch {
                expected: indices.len(),
                actual: replacements.len(),
            });
        }
        if let Some(&i) = indices.iter().find(|&&i| i >= self.slots.len()) {
            return Err(SetError::SelectionRange { k: i, len: self.slots.len() });
        }
        for (&i, slot) in indices.iter().zip(replacements) {
            self.active.remove(&self.slots[i].connection);
            self.slots[i] = *slot;
            self.active.insert(slot.connection);
        }
        debug_assert_eq!(self.active.len(), self.slots.len());
        Ok(())
    }
}

/// Генератор случайных уникальных связей
#[derive(Clone, Copy, Debug)]
pub struct ConnectionGenerator {
    pub indim: usize,
    pub outdim: usize,
    /// Предел попыток добора
    pub max_attempts: usize,
}

impl ConnectionGenerator {
    /// Во сколько раз больше кандидатов тянем, чем не хватает (на случай повторов)
    pub const OVERSAMPLE: f64 = 1.5;

    pub fn new(indim: usize, outdim: usize, max_attempts: usize) -> Self {
        Self { indim, outdim, max_attempts }
    }

    /// count уникальных связей, которых нет в existing.
    /// Кандидаты тянутся с запасом, повторы отбрасываются, недостача добирается
    /// следующими попытками, но не более max_attempts раз.
    pub fn generate(
        &self,
        rng: &mut dyn RngCore,
        count: usize,
        existing: &HashSet<Connection>,
    ) -> Result<Vec<Connection>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        //свободных пар меньше, чем нужно: пробовать бессмысленно
        let free = self.indim.saturating_mul(self.outdim).saturating_sub(existing.len());
        if count > free {
            warn!(
                "requested {count} connections, only {free} free pairs in {}x{}",
                self.indim, self.outdim
            );
            return Err(SetError::GenerationExhausted {
                requested: count,
                found: 0,
                attempts: 0,
            });
        }

        let mut fresh: Vec<Connection> = Vec::with_capacity(count);
        let mut seen: HashSet<Connection> = HashSet::with_capacity(count);
        for attempt in 1..=self.max_attempts {
            let missing = count - fresh.len();
            let draws = (missing as f64 * Self::OVERSAMPLE).ceil() as usize;
            let (indim, outdim) = (self.indim, self.outdim);
            fresh.extend(
                (0..draws)
                    .map(|_| Connection::new(rng.gen_range(0..indim), rng.gen_range(0..outdim)))
                    .filter(|c| !existing.contains(c))
                    .filter(|c| seen.insert(*c))//повтор среди новых
                    .take(missing),
            );
            if fresh.len() == count {
                return Ok(fresh);
            }
            trace!("generation attempt {attempt}: {}/{count} unique connections", fresh.len());
        }
        Err(SetError::GenerationExhausted {
            requested: count,
            found: fresh.len(),
            attempts: self.max_attempts,
        })
    }
}
