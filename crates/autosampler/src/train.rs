//! Training
//!
//! Minimizes the summed ELBO objective (squared reconstruction error plus
//! closed-form KL divergence against the unit Gaussian prior) with
//! hand-derived gradients and bias-corrected Adam. Epochs shuffle an
//! index vector only; dataset storage never moves.

use ndarray::{s, Array1, Array2, Axis, Zip};
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use crate::config::TrainConfig;
use crate::dataset::Dataset;
use crate::error::{SamplerError, SamplerResult};
use crate::model::{relu, sigmoid, standard_normal, Cvae, LinearParams};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Loss of one batch, split into its two terms
#[derive(Debug, Clone, Copy)]
pub struct LossTerms {
    /// Summed squared reconstruction error
    pub reconstruction: f64,
    /// Summed KL divergence of the latent posterior against the prior
    pub kl: f64,
}

impl LossTerms {
    /// Combined objective
    pub fn total(&self) -> f64 {
        self.reconstruction + self.kl
    }
}

/// Per-epoch progress report
#[derive(Debug, Clone, Copy)]
pub struct EpochStats {
    /// 1-based epoch number
    pub epoch: usize,
    /// Total loss averaged over dataset items
    pub mean_loss: f64,
}

/// Batched loss: `sum((recon - x)^2) - 0.5 sum(1 + lv - mu^2 - exp(lv))`
///
/// Both terms are summed, not averaged, so the gradient scale matches
/// the batch size the optimizer was tuned against.
pub fn loss_terms(
    recon: &Array2<f32>,
    target: &Array2<f32>,
    mean: &Array2<f32>,
    log_var: &Array2<f32>,
) -> LossTerms {
    let mut reconstruction = 0.0f64;
    for (r, t) in recon.iter().zip(target.iter()) {
        let d = (*r - *t) as f64;
        reconstruction += d * d;
    }
    let mut kl = 0.0f64;
    for (m, lv) in mean.iter().zip(log_var.iter()) {
        let m = *m as f64;
        let lv = *lv as f64;
        kl -= 0.5 * (1.0 + lv - m * m - lv.exp());
    }
    LossTerms { reconstruction, kl }
}

/// Train a model in place, reporting per-epoch statistics to `on_epoch`
pub fn train<F>(
    model: &mut Cvae,
    dataset: &Dataset,
    config: &TrainConfig,
    rng: &mut Pcg32,
    mut on_epoch: F,
) -> SamplerResult<()>
where
    F: FnMut(EpochStats),
{
    config.validate()?;
    if dataset.is_empty() {
        return Err(SamplerError::EmptyDataset);
    }

    let mut adam = Adam::new(model);
    let mut indices: Vec<usize> = (0..dataset.len()).collect();

    for epoch in 1..=config.epochs {
        indices.shuffle(rng);
        let mut total_loss = 0.0f64;
        for batch in indices.chunks(config.batch_size) {
            let (features, conditions) = gather_batch(dataset, batch);
            let fwd = forward(model, &features, &conditions, rng);
            total_loss += loss_terms(&fwd.recon, &features, &fwd.mean, &fwd.log_var).total();
            let grads = backward(model, &fwd, &features);
            adam.update(model, &grads, config.learning_rate);
        }
        on_epoch(EpochStats {
            epoch,
            mean_loss: total_loss / dataset.len() as f64,
        });
    }
    Ok(())
}

/// Stack selected items into `[B, input]` and `[B, condition]` matrices
fn gather_batch(dataset: &Dataset, batch: &[usize]) -> (Array2<f32>, Array2<f32>) {
    let items = dataset.items();
    let input_len = items[batch[0]].feature.len();
    let mut features = Array2::zeros((batch.len(), input_len));
    let mut conditions = Array2::zeros((batch.len(), 2));
    for (row, &idx) in batch.iter().enumerate() {
        let item = &items[idx];
        features.row_mut(row).assign(&item.feature);
        conditions[[row, 0]] = item.condition[0];
        conditions[[row, 1]] = item.condition[1];
    }
    (features, conditions)
}

/// Cached activations of one batched pass
struct Forward {
    /// `[feature, condition]`, shape `[B, input + cond]`
    input: Array2<f32>,
    /// Encoder hidden activations after ReLU
    enc_hidden: Array2<f32>,
    mean: Array2<f32>,
    log_var: Array2<f32>,
    /// `exp(log_var / 2)`
    sigma: Array2<f32>,
    /// Standard normal draws used for the reparameterized sample
    noise: Array2<f32>,
    /// `[latent, condition]`, shape `[B, latent + cond]`
    latent_input: Array2<f32>,
    /// Decoder hidden activations after ReLU
    dec_hidden: Array2<f32>,
    /// Sigmoid reconstruction, shape `[B, input]`
    recon: Array2<f32>,
}

fn forward(
    model: &Cvae,
    features: &Array2<f32>,
    conditions: &Array2<f32>,
    rng: &mut Pcg32,
) -> Forward {
    let rows = features.nrows();
    let noise = standard_normal(rows * model.dims.latent, rng)
        .into_shape((rows, model.dims.latent))
        .expect("noise length matches batch by construction");
    forward_with_noise(model, features, conditions, noise)
}

fn forward_with_noise(
    model: &Cvae,
    features: &Array2<f32>,
    conditions: &Array2<f32>,
    noise: Array2<f32>,
) -> Forward {
    let input = concat_columns(features, conditions);
    let enc_hidden = affine(&model.encoder.hidden, &input).mapv(relu);
    let mean = affine(&model.encoder.mean_head, &enc_hidden);
    let log_var = affine(&model.encoder.log_var_head, &enc_hidden);
    let sigma = log_var.mapv(|v| (0.5 * v).exp());
    let latent = &mean + &(&noise * &sigma);
    let latent_input = concat_columns(&latent, conditions);
    let dec_hidden = affine(&model.decoder.hidden, &latent_input).mapv(relu);
    let recon = affine(&model.decoder.output, &dec_hidden).mapv(sigmoid);
    Forward {
        input,
        enc_hidden,
        mean,
        log_var,
        sigma,
        noise,
        latent_input,
        dec_hidden,
        recon,
    }
}

/// `X W^T + b` over a batch
fn affine(layer: &LinearParams, input: &Array2<f32>) -> Array2<f32> {
    let mut out = input.dot(&layer.weight.t());
    out += &layer.bias;
    out
}

fn concat_columns(a: &Array2<f32>, b: &Array2<f32>) -> Array2<f32> {
    ndarray::concatenate(Axis(1), &[a.view(), b.view()]).expect("batch dimensions match")
}

/// Gradients of one layer, shaped like its parameters
struct LayerGrads {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

struct Gradients {
    enc_hidden: LayerGrads,
    mean_head: LayerGrads,
    log_var_head: LayerGrads,
    dec_hidden: LayerGrads,
    output: LayerGrads,
}

fn backward(model: &Cvae, fwd: &Forward, target: &Array2<f32>) -> Gradients {
    let latent = model.dims.latent;

    // d(sum sq err)/d(pre-sigmoid) = 2 (recon - x) recon (1 - recon)
    let d_recon = (&fwd.recon - target).mapv(|v| 2.0 * v);
    let d_out_pre = &d_recon * &fwd.recon.mapv(|y| y * (1.0 - y));
    let output = LayerGrads {
        weight: d_out_pre.t().dot(&fwd.dec_hidden),
        bias: d_out_pre.sum_axis(Axis(0)),
    };

    let d_dec_hidden = d_out_pre.dot(&model.decoder.output.weight);
    let d_dec_pre = &d_dec_hidden * &fwd.dec_hidden.mapv(step);
    let dec_hidden = LayerGrads {
        weight: d_dec_pre.t().dot(&fwd.latent_input),
        bias: d_dec_pre.sum_axis(Axis(0)),
    };

    // The condition columns carry no parameters upstream of the decoder
    let d_latent_input = d_dec_pre.dot(&model.decoder.hidden.weight);
    let d_latent = d_latent_input.slice(s![.., ..latent]).to_owned();

    // z = mu + eps sigma, so dz/dmu = 1 and dz/dlv = eps sigma / 2;
    // the KL term contributes mu and (exp(lv) - 1) / 2 directly
    let d_mean = &d_latent + &fwd.mean;
    let mut d_log_var = &d_latent * &fwd.noise;
    d_log_var *= &fwd.sigma;
    d_log_var *= 0.5;
    d_log_var += &fwd.log_var.mapv(|v| 0.5 * (v.exp() - 1.0));

    let mean_head = LayerGrads {
        weight: d_mean.t().dot(&fwd.enc_hidden),
        bias: d_mean.sum_axis(Axis(0)),
    };
    let log_var_head = LayerGrads {
        weight: d_log_var.t().dot(&fwd.enc_hidden),
        bias: d_log_var.sum_axis(Axis(0)),
    };

    let d_enc_hidden = d_mean.dot(&model.encoder.mean_head.weight)
        + d_log_var.dot(&model.encoder.log_var_head.weight);
    let d_enc_pre = &d_enc_hidden * &fwd.enc_hidden.mapv(step);
    let enc_hidden = LayerGrads {
        weight: d_enc_pre.t().dot(&fwd.input),
        bias: d_enc_pre.sum_axis(Axis(0)),
    };

    Gradients {
        enc_hidden,
        mean_head,
        log_var_head,
        dec_hidden,
        output,
    }
}

/// Subgradient of ReLU, evaluated on the activation output
#[inline]
fn step(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// First and second moment buffers for one layer
struct AdamLayer {
    m_weight: Array2<f32>,
    v_weight: Array2<f32>,
    m_bias: Array1<f32>,
    v_bias: Array1<f32>,
}

impl AdamLayer {
    fn new(layer: &LinearParams) -> Self {
        Self {
            m_weight: Array2::zeros(layer.weight.raw_dim()),
            v_weight: Array2::zeros(layer.weight.raw_dim()),
            m_bias: Array1::zeros(layer.bias.raw_dim()),
            v_bias: Array1::zeros(layer.bias.raw_dim()),
        }
    }

    fn apply(&mut self, layer: &mut LinearParams, grads: &LayerGrads, lr: f32, bc1: f32, bc2: f32) {
        adam_step(
            &mut layer.weight,
            &grads.weight,
            &mut self.m_weight,
            &mut self.v_weight,
            lr,
            bc1,
            bc2,
        );
        adam_step(
            &mut layer.bias,
            &grads.bias,
            &mut self.m_bias,
            &mut self.v_bias,
            lr,
            bc1,
            bc2,
        );
    }
}

fn adam_step<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f32, D>,
    grad: &ndarray::Array<f32, D>,
    m: &mut ndarray::Array<f32, D>,
    v: &mut ndarray::Array<f32, D>,
    lr: f32,
    bc1: f32,
    bc2: f32,
) {
    Zip::from(param).and(grad).and(m).and(v).for_each(|p, &g, m, v| {
        *m = BETA1 * *m + (1.0 - BETA1) * g;
        *v = BETA2 * *v + (1.0 - BETA2) * g * g;
        let m_hat = *m / bc1;
        let v_hat = *v / bc2;
        *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
    });
}

struct Adam {
    enc_hidden: AdamLayer,
    mean_head: AdamLayer,
    log_var_head: AdamLayer,
    dec_hidden: AdamLayer,
    output: AdamLayer,
    step: i32,
}

impl Adam {
    fn new(model: &Cvae) -> Self {
        Self {
            enc_hidden: AdamLayer::new(&model.encoder.hidden),
            mean_head: AdamLayer::new(&model.encoder.mean_head),
            log_var_head: AdamLayer::new(&model.encoder.log_var_head),
            dec_hidden: AdamLayer::new(&model.decoder.hidden),
            output: AdamLayer::new(&model.decoder.output),
            step: 0,
        }
    }

    fn update(&mut self, model: &mut Cvae, grads: &Gradients, lr: f32) {
        self.step += 1;
        let bc1 = 1.0 - BETA1.powi(self.step);
        let bc2 = 1.0 - BETA2.powi(self.step);
        self.enc_hidden
            .apply(&mut model.encoder.hidden, &grads.enc_hidden, lr, bc1, bc2);
        self.mean_head
            .apply(&mut model.encoder.mean_head, &grads.mean_head, lr, bc1, bc2);
        self.log_var_head
            .apply(&mut model.encoder.log_var_head, &grads.log_var_head, lr, bc1, bc2);
        self.dec_hidden
            .apply(&mut model.decoder.hidden, &grads.dec_hidden, lr, bc1, bc2);
        self.output
            .apply(&mut model.decoder.output, &grads.output, lr, bc1, bc2);
    }
}
