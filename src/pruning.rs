use crate::*;
use log::warn;

/// Индексы k наибольших (largest = true) или наименьших значений.
/// При равенстве значений раньше идет меньший индекс, так что результат
/// для одного и того же массива всегда одинаков.
pub fn top_k_indices(values: &[f32], k: usize, largest: bool) -> Result<Vec<usize>> {
    if k > values.len() {
        return Err(SetError::SelectionRange { k, len: values.len() });
    }
    Ok((0..values.len())
        .sorted_by(|&a, &b| {
            let ord = values[a].total_cmp(&values[b]);
            let ord = if largest { ord.reverse() } else { ord };
            ord.then(a.cmp(&b))
        })
        .take(k)
        .collect())
}

/// Отбор связей на удаление: доля zeta ближайших к нулю весов,
/// отдельно среди положительных и среди отрицательных.
/// Нулевые веса не отбираются, но занимают места в top-k.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PruneSelector {
    pub zeta: f64,
}

impl PruneSelector {
    pub fn new(zeta: f64) -> Self {
        Self { zeta }
    }

    /// Номера ячеек на удаление (по возрастанию).
    /// Среди top-(floor(N*zeta) + P) наибольших значений отрицательными окажутся как раз
    /// floor(N*zeta) ближайших к нулю отрицательных; для положительных симметрично.
    pub fn select(&self, weights: &[f32]) -> Result<Vec<usize>> {
        let n = weights.len();
        let numpos = weights.iter().filter(|w| **w > 0.0).count();
        let numneg = weights.iter().filter(|w| **w < 0.0).count();

        let neg_tokill = (numneg as f64 * self.zeta).floor() as usize;
        let pos_tokill = (numpos as f64 * self.zeta).floor() as usize;
        let neg_k = Self::clamp_k(neg_tokill + numpos, n);
        let pos_k = Self::clamp_k(pos_tokill + numneg, n);

        let mut marked = vec![false; n];
        for i in top_k_indices(weights, neg_k, true)? {
            if weights[i] < 0.0 {
                marked[i] = true;
            }
        }
        for i in top_k_indices(weights, pos_k, false)? {
            if weights[i] > 0.0 {
                marked[i] = true;
            }
        }
        Ok(marked.iter().positions(|&m| m).collect())
    }

    /// k > n бывает только при zeta > 1
    fn clamp_k(k: usize, n: usize) -> usize {
        if k > n {
            warn!("prune count {k} exceeds {n} parameters, clamped");
            n
        } else {
            k
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k() {
        let v = [0.3f32, -1.0, 2.0, 0.3, 5.0];
        assert_eq!(top_k_indices(&v, 2, true).unwrap(), vec![4, 2]);
        assert_eq!(top_k_indices(&v, 3, false).unwrap(), vec![1, 0, 3]);
        assert!(top_k_indices(&v, 0, true).unwrap().is_empty());
    }

    #[test]
    fn top_k_out_of_range() {
        let v = [1.0f32, 2.0];
        assert!(matches!(
            top_k_indices(&v, 3, true),
            Err(SetError::SelectionRange { k: 3, len: 2 })
        ));
    }

    #[test]
    fn symmetric() {
        let w = [-3.0f32, -2.0, -1.0, 1.0, 2.0, 3.0];
        let marked = PruneSelector::new(0.34).select(&w).unwrap();
        assert_eq!(marked, vec![2, 3]);
    }

    #[test]
    fn zeros_take_selection_room() {
        // нули попадают в top-k и вытесняют кандидатов
        let w = [-1.0f32, 0.0, 1.0];
        assert!(PruneSelector::new(1.0).select(&w).unwrap().is_empty());
    }

    #[test]
    fn per_sign_counts() {
        // 3 положительных -> 1, 2 отрицательных -> 1
        let w = [0.5f32, 0.1, 0.9, -0.2, -5.0];
        let marked = PruneSelector::new(0.5).select(&w).unwrap();
        assert_eq!(marked, vec![1, 3]);
    }

    #[test]
    fn skewed_signs() {
        // все положительные, отрицательных нет
        let w = [0.4f32, 0.3, 0.2, 0.1];
        let marked = PruneSelector::new(0.5).select(&w).unwrap();
        assert_eq!(marked, vec![2, 3]);
    }

    #[test]
    fn zeta_bounds() {
        let w = [-0.5f32, 0.5, 1.5];
        assert!(PruneSelector::new(0.0).select(&w).unwrap().is_empty());
        assert_eq!(PruneSelector::new(1.0).select(&w).unwrap(), vec![0, 1, 2]);
        // zeta > 1: кол. отбора ограничивается числом параметров
        assert_eq!(PruneSelector::new(3.0).select(&w).unwrap(), vec![0, 1, 2]);
    }
}
