use crate::*;

/// Расчет разреженного слоя в прямом направлении.
/// xs (batch, indim), weights (n_params), input_index (n_params, U32) - номера входов
/// по ячейкам, fan_in (outdim, width, U32) - карта входящих связей, bias (outdim).
/// Функция чистая: никакого состояния не меняет, результат (batch, outdim).
pub fn sparse_forward(
    xs: &Tensor,
    weights: &Tensor,
    input_index: &Tensor,
    fan_in: &Tensor,
    bias: Option<&Tensor>,
) -> Result<Tensor> {
    let (batch, _) = xs.dims2()?;
    let n_params = input_index.dims1()?;
    let n_weights = weights.dims1()?;
    if n_weights != n_params {
        return Err(SetError::DimensionMismatch { expected: n_params, actual: n_weights });
    }
    let (outdim, width) = fan_in.dims2()?;

    //значения входов по ячейкам, умноженные на веса: (batch, n_params)
    let k = xs
        .index_select(input_index, 1)?
        .broadcast_mul(&weights.to_dtype(xs.dtype())?)?;
    //нулевая ячейка-заглушка: (batch, n_params + 1)
    let null = Tensor::zeros((batch, 1), k.dtype(), k.device())?;
    let k = Tensor::cat(&[&k, &null], 1)?;
    //выборка по карте и сумма по входящим связям: (batch, outdim)
    let z = k
        .index_select(&fan_in.flatten_all()?, 1)?
        .reshape((batch, outdim, width))?
        .sum(2)?;
    match bias {
        Some(b) => Ok(z.broadcast_add(&b.to_dtype(z.dtype())?)?),
        None => Ok(z),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // вход 0 -> выход 0 (w=1), вход 2 -> выход 0 (w=2), вход 1 -> выход 1 (w=3)
    fn fixture(outdim: usize) -> (Tensor, Tensor, Tensor) {
        let conns = vec![Connection::new(0, 0), Connection::new(2, 0), Connection::new(1, 1)];
        let input_index = Tensor::new(&[0u32, 2, 1], &Device::Cpu).unwrap();
        let weights = Tensor::new(&[1.0f32, 2.0, 3.0], &Device::Cpu).unwrap();
        let fan_in = FanInMap::build(conns, outdim, 3)
            .unwrap()
            .to_tensor(&Device::Cpu)
            .unwrap();
        (weights, input_index, fan_in)
    }

    #[test]
    fn forward_with_bias() {
        let (weights, input_index, fan_in) = fixture(2);
        let xs = Tensor::new(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]], &Device::Cpu).unwrap();
        let bias = Tensor::new(&[0.5f32, -1.0], &Device::Cpu).unwrap();

        let out = sparse_forward(&xs, &weights, &input_index, &fan_in, Some(&bias)).unwrap();
        assert_eq!(out.dims(), &[2, 2]);
        let actual: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
        assert_relative_eq!(actual.as_slice(), [7.5f32, 5.0, 16.5, 14.0].as_slice());
    }

    #[test]
    fn unconnected_output_is_bias() {
        let (weights, input_index, fan_in) = fixture(3);
        let xs = Tensor::new(&[[1.0f32, 2.0, 3.0]], &Device::Cpu).unwrap();
        let bias = Tensor::new(&[0.0f32, 0.0, 0.25], &Device::Cpu).unwrap();

        let out = sparse_forward(&xs, &weights, &input_index, &fan_in, Some(&bias)).unwrap();
        let actual: Vec<Vec<f32>> = out.to_vec2().unwrap();
        assert_eq!(actual[0][2], 0.25);

        let out = sparse_forward(&xs, &weights, &input_index, &fan_in, None).unwrap();
        let actual: Vec<Vec<f32>> = out.to_vec2().unwrap();
        assert_eq!(actual[0], vec![7.0, 6.0, 0.0]);
    }

    #[test]
    fn weight_count_mismatch() {
        let (_, input_index, fan_in) = fixture(2);
        let weights = Tensor::new(&[1.0f32, 2.0], &Device::Cpu).unwrap();
        let xs = Tensor::new(&[[1.0f32, 2.0, 3.0]], &Device::Cpu).unwrap();
        assert!(matches!(
            sparse_forward(&xs, &weights, &input_index, &fan_in, None),
            Err(SetError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }
}
