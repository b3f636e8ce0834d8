//! Model persistence
//!
//! Snapshots are bincode blobs holding encoder and decoder parameters.
//! Dimensions are not stored; a snapshot only loads into a model whose
//! configured dimensions match every stored tensor shape, and a mismatch
//! fails the load rather than the first forward pass.

use std::fs;
use std::path::Path;

use super::{Cvae, DecoderParams, EncoderParams, LinearParams};
use crate::config::ModelDims;
use crate::error::{SamplerError, SamplerResult};

/// File name of the trained model artifact inside a models directory
pub const SNAPSHOT_FILE_NAME: &str = "cvae_drum_model.bin";

/// Write a model snapshot, creating parent directories as needed
pub fn save_snapshot(model: &Cvae, path: &Path) -> SamplerResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = bincode::serialize(&(&model.encoder, &model.decoder))
        .map_err(|e| SamplerError::snapshot(format!("serialization failed: {e}")))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Load a model snapshot and validate every tensor shape against `dims`
pub fn load_snapshot(path: &Path, dims: ModelDims) -> SamplerResult<Cvae> {
    let bytes = fs::read(path)
        .map_err(|e| SamplerError::snapshot(format!("cannot read '{}': {e}", path.display())))?;
    let (encoder, decoder): (EncoderParams, DecoderParams) = bincode::deserialize(&bytes)
        .map_err(|e| SamplerError::snapshot(format!("cannot parse '{}': {e}", path.display())))?;

    check_layer(
        "encoder.hidden",
        &encoder.hidden,
        dims.hidden,
        dims.input + dims.condition,
    )?;
    check_layer("encoder.mean_head", &encoder.mean_head, dims.latent, dims.hidden)?;
    check_layer(
        "encoder.log_var_head",
        &encoder.log_var_head,
        dims.latent,
        dims.hidden,
    )?;
    check_layer(
        "decoder.hidden",
        &decoder.hidden,
        dims.hidden,
        dims.latent + dims.condition,
    )?;
    check_layer("decoder.output", &decoder.output, dims.input, dims.hidden)?;

    Ok(Cvae {
        dims,
        encoder,
        decoder,
    })
}

fn check_layer(
    name: &str,
    layer: &LinearParams,
    out_dim: usize,
    in_dim: usize,
) -> SamplerResult<()> {
    let found = layer.weight.shape();
    if found != [out_dim, in_dim] {
        return Err(SamplerError::shape_mismatch(
            format!("{name}.weight"),
            format!("{out_dim}x{in_dim}"),
            format!("{}x{}", found[0], found[1]),
        ));
    }
    if layer.bias.len() != out_dim {
        return Err(SamplerError::shape_mismatch(
            format!("{name}.bias"),
            out_dim.to_string(),
            layer.bias.len().to_string(),
        ));
    }
    Ok(())
}
