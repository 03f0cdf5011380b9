//! Ошибки разреженного слоя

/// Ошибки построения, расчета и эволюции слоя
#[derive(thiserror::Error, Debug)]
pub enum SetError {
    /// Недопустимая конфигурация слоя (размерности, zeta, кол. параметров)
    #[error("Invalid layer config: {0}")]
    Config(String),

    /// Не удалось набрать нужное кол. уникальных связей за отведенное число попыток
    #[error("Connection generation exhausted: requested {requested}, found {found} after {attempts} attempts")]
    GenerationExhausted {
        requested: usize,
        found: usize,
        attempts: usize,
    },

    /// Ширина входа (или длина массива) не совпадает с ожидаемой
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Запрошено больше элементов, чем есть в массиве
    #[error("Selection range: k = {k} exceeds {len} values")]
    SelectionRange { k: usize, len: usize },

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, SetError>;
