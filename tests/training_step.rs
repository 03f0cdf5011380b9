use approx::assert_relative_eq;
use candle_core::{Device, Tensor, Var};
use candle_nn::{Optimizer, SGD};
use lib_set_layer::{LayerConfig, SetLayer};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn loss(layer: &SetLayer, xs: &Tensor, weights: &Var, bias: &Var) -> Tensor {
    layer
        .forward_with(xs, weights.as_tensor(), Some(bias.as_tensor()))
        .unwrap()
        .sqr()
        .unwrap()
        .sum_all()
        .unwrap()
}

// Внешний оптимизатор учит веса слоя, затем эволюция меняет связи
// и оптимизатор пересоздается по новым весам.
#[test]
fn sgd_step_then_evolve() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut layer = SetLayer::new(&mut rng, LayerConfig::new(16, 8).with_sparsity(0.5)).unwrap();
    let data: Vec<f32> = (0..4 * 16).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let xs = Tensor::from_vec(data, (4, 16), &Device::Cpu).unwrap();

    let weights = Var::from_tensor(&layer.weight_tensor(&Device::Cpu).unwrap()).unwrap();
    let bias = Var::from_tensor(&layer.bias_tensor(&Device::Cpu).unwrap().unwrap()).unwrap();
    let mut sgd = SGD::new(vec![weights.clone(), bias.clone()], 0.001).unwrap();

    let before = loss(&layer, &xs, &weights, &bias).to_scalar::<f32>().unwrap();
    sgd.backward_step(&loss(&layer, &xs, &weights, &bias)).unwrap();
    let after = loss(&layer, &xs, &weights, &bias).to_scalar::<f32>().unwrap();
    assert!(after < before);

    //веса оптимизатора обратно в слой
    layer.set_weights(&weights.to_vec1::<f32>().unwrap()).unwrap();
    layer.set_bias(&bias.to_vec1::<f32>().unwrap()).unwrap();
    let direct = layer.forward(&xs).unwrap().sqr().unwrap().sum_all().unwrap();
    assert_relative_eq!(direct.to_scalar::<f32>().unwrap(), after, epsilon = 1e-4);

    let replaced = layer.evolve(&mut rng, false).unwrap();
    assert!(!replaced.is_empty());
    let evolved = layer.weights();
    assert!(replaced.iter().all(|&i| evolved[i] == 0.0));

    let weights = Var::from_tensor(&layer.weight_tensor(&Device::Cpu).unwrap()).unwrap();
    let mut sgd = SGD::new(vec![weights.clone(), bias.clone()], 0.001).unwrap();
    sgd.backward_step(&loss(&layer, &xs, &weights, &bias)).unwrap();
    assert_eq!(weights.to_vec1::<f32>().unwrap().len(), layer.n_params());
}
