use crate::*;

/// Карта входящих связей для расчета в прямом направлении.
/// Строка o: номера ячеек весов, чьи связи ведут в выход o, дополненные
/// до общей ширины (максимальное кол. входящих связей) индексом-заглушкой n_params.
/// Заглушка указывает на нулевую ячейку, добавляемую к весам при расчете.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanInMap {
    /// outdim x width, построчно
    table: Vec<u32>,
    outdim: usize,
    width: usize,
    sentinel: u32,
    /// Настоящее кол. входящих связей по выходам
    fan_in: Vec<usize>,
}

impl FanInMap {
    /// Построение по связям в порядке ячеек, O(n_params + outdim * width)
    pub fn build(
        connections: impl IntoIterator<Item = Connection>,
        outdim: usize,
        n_params: usize,
    ) -> Result<Self> {
        let sentinel = u32::try_from(n_params)
            .map_err(|_| SetError::Config(format!("too many parameters: {n_params}")))?;
        let mut rows: Vec<Vec<u32>> = vec![Vec::new(); outdim];
        for (slot, c) in connections.into_iter().enumerate() {
            let row = rows.get_mut(c.output).ok_or_else(|| {
                SetError::Config(format!("connection output {} out of range {outdim}", c.output))
            })?;
            row.push(slot as u32);//slot < n_params, влезает в u32
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let fan_in: Vec<usize> = rows.iter().map(Vec::len).collect();
        let mut table: Vec<u32> = Vec::with_capacity(outdim * width);
        for row in rows {
            let pad = width - row.len();
            table.extend(row);
            table.extend(std::iter::repeat(sentinel).take(pad));//добиваем заглушкой
        }
        Ok(Self { table, outdim, width, sentinel, fan_in })
    }

    pub fn outdim(&self) -> usize {
        self.outdim
    }

    /// Максимальное кол. входящих связей (ширина строки)
    pub fn width(&self) -> usize {
        self.width
    }

    /// Индекс нулевой ячейки (= n_params)
    pub fn sentinel(&self) -> u32 {
        self.sentinel
    }

    /// Строка выхода output вместе с заглушками.
    /// Паникует при output >= outdim.
    pub fn row(&self, output: usize) -> &[u32] {
        &self.table[output * self.width..(output + 1) * self.width]
    }

    /// Настоящее кол. входящих связей выхода; паникует при output >= outdim
    pub fn fan_in(&self, output: usize) -> usize {
        self.fan_in[output]
    }

    /// Сумма настоящих входящих связей по всем выходам (= n_params)
    pub fn total_fan_in(&self) -> usize {
        self.fan_in.iter().sum()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.table
    }

    /// Тензор (outdim, width) типа U32 для index_select
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(self.table.as_slice(), (self.outdim, self.width), device)?)
    }
}
