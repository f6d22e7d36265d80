//! Shallow multi-layer perceptron regressor.
//!
//! ReLU hidden layers, identity output, squared loss with an L2 penalty,
//! trained by mini-batch Adam. Weights use Glorot-uniform initialisation
//! and rows are reshuffled every epoch, both from the configured seed.

use crate::{
    FittedModel, RegressorError, Result,
    traits::{ConfigurableRegressor, Predict, Regressor, check_training_data, check_width},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Configuration for the MLP regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Width of each hidden layer
    pub hidden_layers: Vec<usize>,
    /// Maximum number of epochs
    pub max_iter: usize,
    /// Adam step size
    pub learning_rate: f64,
    /// L2 penalty on the weights
    pub alpha: f64,
    /// Mini-batch size (`None` = min(200, n))
    pub batch_size: Option<usize>,
    /// Minimum loss improvement that resets the patience counter
    pub tol: f64,
    /// Epochs without improvement before stopping
    pub n_iter_no_change: usize,
    /// Seed for initialisation and shuffling
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            max_iter: 200,
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: None,
            tol: 1e-4,
            n_iter_no_change: 10,
            seed: 42,
        }
    }
}

impl MlpConfig {
    /// Network with the given hidden widths, trained for at most `max_iter` epochs.
    pub fn new(hidden_layers: Vec<usize>, max_iter: usize, seed: u64) -> Self {
        Self {
            hidden_layers,
            max_iter,
            seed,
            ..Default::default()
        }
    }
}

/// Multi-layer perceptron regressor.
#[derive(Debug, Clone, Default)]
pub struct Mlp {
    config: MlpConfig,
}

impl ConfigurableRegressor for Mlp {
    type Config = MlpConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

struct AdamState {
    step: i32,
    moments: Vec<(Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>)>,
}

impl AdamState {
    fn new(layers: &[Layer]) -> Self {
        Self {
            step: 0,
            moments: layers
                .iter()
                .map(|l| {
                    (
                        Array2::zeros(l.weights.raw_dim()),
                        Array2::zeros(l.weights.raw_dim()),
                        Array1::zeros(l.bias.raw_dim()),
                        Array1::zeros(l.bias.raw_dim()),
                    )
                })
                .collect(),
        }
    }

    fn apply(&mut self, layers: &mut [Layer], grads: &[(Array2<f64>, Array1<f64>)], lr: f64) {
        self.step += 1;
        let step_size =
            lr * (1.0 - BETA_2.powi(self.step)).sqrt() / (1.0 - BETA_1.powi(self.step));
        for ((layer, (gw, gb)), (mw, vw, mb, vb)) in
            layers.iter_mut().zip(grads).zip(self.moments.iter_mut())
        {
            mw.zip_mut_with(gw, |m, g| *m = BETA_1 * *m + (1.0 - BETA_1) * g);
            vw.zip_mut_with(gw, |v, g| *v = BETA_2 * *v + (1.0 - BETA_2) * g * g);
            mb.zip_mut_with(gb, |m, g| *m = BETA_1 * *m + (1.0 - BETA_1) * g);
            vb.zip_mut_with(gb, |v, g| *v = BETA_2 * *v + (1.0 - BETA_2) * g * g);

            ndarray::Zip::from(&mut layer.weights)
                .and(&*mw)
                .and(&*vw)
                .for_each(|w, m, v| *w -= step_size * m / (v.sqrt() + ADAM_EPSILON));
            ndarray::Zip::from(&mut layer.bias)
                .and(&*mb)
                .and(&*vb)
                .for_each(|b, m, v| *b -= step_size * m / (v.sqrt() + ADAM_EPSILON));
        }
    }
}

fn forward(layers: &[Layer], x: ArrayView2<'_, f64>) -> Vec<Array2<f64>> {
    let mut activations = Vec::with_capacity(layers.len() + 1);
    activations.push(x.to_owned());
    for (i, layer) in layers.iter().enumerate() {
        let mut z = activations[i].dot(&layer.weights) + &layer.bias;
        if i + 1 < layers.len() {
            z.mapv_inplace(|v| v.max(0.0));
        }
        activations.push(z);
    }
    activations
}

impl Regressor for Mlp {
    fn kind(&self) -> &'static str {
        "neural_network"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<FittedModel> {
        check_training_data(x, y)?;
        let cfg = &self.config;
        let (n, p) = x.dim();
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let mut widths = Vec::with_capacity(cfg.hidden_layers.len() + 2);
        widths.push(p);
        widths.extend(cfg.hidden_layers.iter().map(|w| (*w).max(1)));
        widths.push(1);

        let mut layers: Vec<Layer> = widths
            .windows(2)
            .map(|pair| {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
                Layer {
                    weights: Array2::from_shape_fn((fan_in, fan_out), |_| {
                        rng.gen_range(-bound..bound)
                    }),
                    bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)),
                }
            })
            .collect();

        let batch = cfg.batch_size.unwrap_or(200).clamp(1, n);
        let mut adam = AdamState::new(&layers);
        let mut order: Vec<usize> = (0..n).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale = 0;

        for _ in 0..cfg.max_iter {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for chunk in order.chunks(batch) {
                let xb = x.select(Axis(0), chunk);
                let yb = y.select(Axis(0), chunk);
                let m = chunk.len() as f64;

                let activations = forward(&layers, xb.view());
                let output = activations[layers.len()].column(0).to_owned();
                let error = &output - &yb;
                epoch_loss += 0.5 * error.dot(&error);

                let mut delta = error.insert_axis(Axis(1));
                let mut grads = vec![(Array2::zeros((0, 0)), Array1::zeros(0)); layers.len()];
                for l in (0..layers.len()).rev() {
                    let gw = (activations[l].t().dot(&delta) + &layers[l].weights * cfg.alpha) / m;
                    let gb = delta.sum_axis(Axis(0)) / m;
                    if l > 0 {
                        let mut back = delta.dot(&layers[l].weights.t());
                        back.zip_mut_with(&activations[l], |d, a| {
                            if *a <= 0.0 {
                                *d = 0.0;
                            }
                        });
                        delta = back;
                    }
                    grads[l] = (gw, gb);
                }
                adam.apply(&mut layers, &grads, cfg.learning_rate);
            }

            let penalty: f64 = layers
                .iter()
                .map(|l| l.weights.mapv(|w| w * w).sum())
                .sum::<f64>();
            let loss = (epoch_loss + 0.5 * cfg.alpha * penalty) / n as f64;
            if !loss.is_finite() {
                return Err(RegressorError::NotConverged(
                    "training loss became non-finite".to_string(),
                ));
            }
            if loss > best_loss - cfg.tol {
                stale += 1;
            } else {
                stale = 0;
            }
            best_loss = best_loss.min(loss);
            if stale > cfg.n_iter_no_change {
                break;
            }
        }

        Ok(FittedModel::Mlp(FittedMlp {
            n_features: p,
            layers,
        }))
    }
}

/// A fitted perceptron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedMlp {
    n_features: usize,
    layers: Vec<Layer>,
}

impl Predict for FittedMlp {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        check_width(self.n_features, x.ncols())?;
        let activations = forward(&self.layers, x);
        Ok(activations[self.layers.len()].column(0).to_owned())
    }
}
