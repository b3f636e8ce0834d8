//! Conditional VAE parameters and forward passes
//!
//! A small dense architecture: the encoder maps a flattened grid plus its
//! condition through one ReLU layer into latent mean and log-variance
//! heads; the decoder maps a latent draw plus a condition back to a
//! sigmoid grid. Forward passes are pure functions over parameter
//! structs; training-specific batched passes live in the trainer.

pub mod snapshot;

use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::config::ModelDims;

/// Length of the condition vector
pub const CONDITION_DIM: usize = 2;

/// One dense layer, weight laid out `[out_dim, in_dim]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// Weight matrix
    pub weight: Array2<f32>,
    /// Bias vector, length `out_dim`
    pub bias: Array1<f32>,
}

impl LinearParams {
    /// Uniform fan-in initialization over `[-1/sqrt(in), 1/sqrt(in)]`
    fn init(out_dim: usize, in_dim: usize, rng: &mut Pcg32) -> Self {
        let bound = 1.0 / (in_dim as f32).sqrt();
        Self {
            weight: Array2::from_shape_simple_fn((out_dim, in_dim), || {
                rng.gen_range(-bound..bound)
            }),
            bias: Array1::from_shape_simple_fn(out_dim, || rng.gen_range(-bound..bound)),
        }
    }

    /// `W x + b`
    pub fn forward(&self, input: ArrayView1<f32>) -> Array1<f32> {
        self.weight.dot(&input) + &self.bias
    }

    /// Number of learned scalars
    pub fn parameter_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Encoder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderParams {
    /// Shared hidden layer over `[feature, condition]`
    pub hidden: LinearParams,
    /// Latent mean head
    pub mean_head: LinearParams,
    /// Latent log-variance head
    pub log_var_head: LinearParams,
}

/// Decoder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderParams {
    /// Hidden layer over `[latent, condition]`
    pub hidden: LinearParams,
    /// Output layer producing the flattened grid
    pub output: LinearParams,
}

/// The conditional VAE
#[derive(Debug, Clone, PartialEq)]
pub struct Cvae {
    /// Construction-time dimensions; never stored in snapshots
    pub dims: ModelDims,
    /// Encoder parameters
    pub encoder: EncoderParams,
    /// Decoder parameters
    pub decoder: DecoderParams,
}

impl Cvae {
    /// Fresh model with fan-in uniform initialization
    pub fn random_init(dims: ModelDims, rng: &mut Pcg32) -> Self {
        debug_assert_eq!(dims.condition, CONDITION_DIM);
        let encoder = EncoderParams {
            hidden: LinearParams::init(dims.hidden, dims.input + dims.condition, rng),
            mean_head: LinearParams::init(dims.latent, dims.hidden, rng),
            log_var_head: LinearParams::init(dims.latent, dims.hidden, rng),
        };
        let decoder = DecoderParams {
            hidden: LinearParams::init(dims.hidden, dims.latent + dims.condition, rng),
            output: LinearParams::init(dims.input, dims.hidden, rng),
        };
        Self {
            dims,
            encoder,
            decoder,
        }
    }

    /// Total number of learned scalars
    pub fn parameter_count(&self) -> usize {
        self.encoder.hidden.parameter_count()
            + self.encoder.mean_head.parameter_count()
            + self.encoder.log_var_head.parameter_count()
            + self.decoder.hidden.parameter_count()
            + self.decoder.output.parameter_count()
    }
}

/// Encode a feature vector under a condition into latent moments
pub fn encode(
    params: &EncoderParams,
    feature: ArrayView1<f32>,
    condition: [f32; 2],
) -> (Array1<f32>, Array1<f32>) {
    let input = with_condition(feature, condition);
    let hidden = params.hidden.forward(input.view()).mapv(relu);
    let mean = params.mean_head.forward(hidden.view());
    let log_var = params.log_var_head.forward(hidden.view());
    (mean, log_var)
}

/// Reparameterized draw: `mean + eps * exp(log_var / 2)`
pub fn sample_latent(mean: &Array1<f32>, log_var: &Array1<f32>, rng: &mut Pcg32) -> Array1<f32> {
    let noise = standard_normal(mean.len(), rng);
    let sigma = log_var.mapv(|v| (0.5 * v).exp());
    mean + &(noise * &sigma)
}

/// Decode a latent vector under a condition into a flattened grid in (0, 1)
pub fn decode(params: &DecoderParams, latent: ArrayView1<f32>, condition: [f32; 2]) -> Array1<f32> {
    let input = with_condition(latent, condition);
    let hidden = params.hidden.forward(input.view()).mapv(relu);
    params.output.forward(hidden.view()).mapv(sigmoid)
}

/// Standard normal draws via the Box-Muller transform
pub fn standard_normal(len: usize, rng: &mut Pcg32) -> Array1<f32> {
    let mut values = Vec::with_capacity(len + 1);
    while values.len() < len {
        let u1: f32 = rng.gen_range(1e-10f32..1.0);
        let u2: f32 = rng.gen_range(0.0f32..1.0);
        let mag = (-2.0 * u1.ln()).sqrt();
        let angle = 2.0 * std::f32::consts::PI * u2;
        values.push(mag * angle.cos());
        values.push(mag * angle.sin());
    }
    values.truncate(len);
    Array1::from_vec(values)
}

/// Append the condition to a vector
pub(crate) fn with_condition(input: ArrayView1<f32>, condition: [f32; 2]) -> Array1<f32> {
    let mut out = Vec::with_capacity(input.len() + condition.len());
    out.extend(input.iter().copied());
    out.extend_from_slice(&condition);
    Array1::from_vec(out)
}

#[inline]
pub(crate) fn relu(v: f32) -> f32 {
    v.max(0.0)
}

#[inline]
pub(crate) fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;
    use ndarray::array;

    fn small_dims() -> ModelDims {
        ModelDims {
            input: 8,
            condition: 2,
            hidden: 4,
            latent: 3,
        }
    }

    #[test]
    fn test_init_respects_fan_in_bound() {
        let mut rng = create_rng(1);
        let model = Cvae::random_init(small_dims(), &mut rng);
        let bound = 1.0 / (10.0f32).sqrt();
        assert!(model.encoder.hidden.weight.iter().all(|&w| w.abs() <= bound));
        assert!(model.encoder.hidden.bias.iter().all(|&b| b.abs() <= bound));
    }

    #[test]
    fn test_init_deterministic_per_seed() {
        let mut a = create_rng(9);
        let mut b = create_rng(9);
        assert_eq!(
            Cvae::random_init(small_dims(), &mut a),
            Cvae::random_init(small_dims(), &mut b)
        );
    }

    #[test]
    fn test_init_differs_across_seeds() {
        let mut a = create_rng(1);
        let mut b = create_rng(2);
        assert_ne!(
            Cvae::random_init(small_dims(), &mut a),
            Cvae::random_init(small_dims(), &mut b)
        );
    }

    #[test]
    fn test_parameter_count() {
        let mut rng = create_rng(1);
        let model = Cvae::random_init(small_dims(), &mut rng);
        // enc hidden 4x10+4, heads 2*(3x4+3), dec hidden 4x5+4, output 8x4+8
        assert_eq!(model.parameter_count(), 44 + 30 + 24 + 40);
    }

    #[test]
    fn test_encode_shapes() {
        let mut rng = create_rng(3);
        let model = Cvae::random_init(small_dims(), &mut rng);
        let feature = Array1::zeros(8);
        let (mean, log_var) = encode(&model.encoder, feature.view(), [0.5, 0.1]);
        assert_eq!(mean.len(), 3);
        assert_eq!(log_var.len(), 3);
    }

    #[test]
    fn test_decode_output_in_unit_interval() {
        let mut rng = create_rng(3);
        let model = Cvae::random_init(small_dims(), &mut rng);
        let latent = array![0.3f32, -0.7, 1.2];
        let out = decode(&model.decoder, latent.view(), [0.5, 0.1]);
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|&v| v > 0.0 && v < 1.0));
    }

    #[test]
    fn test_sample_latent_collapses_for_tiny_variance() {
        let mut rng = create_rng(5);
        let mean = array![1.0f32, -2.0, 0.5];
        let log_var = array![-100.0f32, -100.0, -100.0];
        let z = sample_latent(&mean, &log_var, &mut rng);
        for (a, b) in z.iter().zip(mean.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sample_latent_deterministic_per_stream() {
        let mean = array![0.0f32, 0.0, 0.0];
        let log_var = array![0.0f32, 0.0, 0.0];
        let mut a = create_rng(11);
        let mut b = create_rng(11);
        assert_eq!(
            sample_latent(&mean, &log_var, &mut a),
            sample_latent(&mean, &log_var, &mut b)
        );
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = create_rng(42);
        let draws = standard_normal(10_000, &mut rng);
        let mean = draws.sum() / draws.len() as f32;
        let var = draws.mapv(|v| (v - mean) * (v - mean)).sum() / draws.len() as f32;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var - 1.0).abs() < 0.08, "var {var}");
    }

    #[test]
    fn test_standard_normal_odd_length() {
        let mut rng = create_rng(42);
        assert_eq!(standard_normal(7, &mut rng).len(), 7);
    }

    #[test]
    fn test_with_condition_appends() {
        let v = array![1.0f32, 2.0];
        let out = with_condition(v.view(), [3.0, 4.0]);
        assert_eq!(out.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
