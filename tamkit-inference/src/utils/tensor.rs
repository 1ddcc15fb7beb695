use anyhow::{anyhow, Result};
use ndarray::parallel::prelude::*;
use ndarray::prelude::*;
use ndarray::Zip;
use ort::value::DynValue;
use std::collections::HashMap;

/// Bilinear resize of a `(height, width)` plane.
pub fn linear_interpolate(input: ArrayView2<f32>, new_shape: (usize, usize)) -> Array2<f32> {
    let (old_height, old_width) = input.dim();
    let (new_height, new_width) = new_shape;
    if (old_height, old_width) == new_shape {
        return input.to_owned();
    }
    let mut output = Array2::<f32>::zeros((new_height, new_width));
    if old_height == 0 || old_width == 0 {
        return output;
    }

    let scale_x = (old_width as f32 - 1.0) / (new_width.max(2) as f32 - 1.0);
    let scale_y = (old_height as f32 - 1.0) / (new_height.max(2) as f32 - 1.0);

    Zip::indexed(&mut output).par_for_each(|(i, j), value| {
        // Mapping new coordinates to old coordinates
        let x = j as f32 * scale_x;
        let y = i as f32 * scale_y;

        let x0 = x.floor() as usize;
        let x1 = (x0 + 1).min(old_width - 1);
        let y0 = y.floor() as usize;
        let y1 = (y0 + 1).min(old_height - 1);

        let p00 = input[[y0, x0]];
        let p01 = input[[y0, x1]];
        let p10 = input[[y1, x0]];
        let p11 = input[[y1, x1]];

        let dx = x - x0 as f32;
        let dy = y - y0 as f32;

        *value = p00 * (1.0 - dx) * (1.0 - dy)
            + p01 * dx * (1.0 - dy)
            + p10 * (1.0 - dx) * dy
            + p11 * dx * dy;
    });

    output
}

pub fn sigmoid(arr: Array2<f32>) -> Array2<f32> {
    arr.mapv(|x| 1.0 / (1.0 + (-x).exp()))
}

/// Sine/cosine embedding of scalar positions, `(len, dim)`.
pub fn get_1d_sine_pe(pos_inds: ArrayView1<f32>, dim: usize, temperature: f32) -> Result<Array2<f32>> {
    let pe_dim = dim / 2;
    let mut dim_t: Array1<f32> = Array1::range(0.0, pe_dim as f32, 1.0);
    dim_t.mapv_inplace(|x| temperature.powf(2.0 * (x / 2.0).floor() / pe_dim as f32));

    let pos_embed = &pos_inds.insert_axis(Axis(1)) / &dim_t;
    let sin_pos_embed = pos_embed.mapv(f32::sin);
    let cos_pos_embed = pos_embed.mapv(f32::cos);

    Ok(ndarray::concatenate(
        Axis(1),
        &[sin_pos_embed.view(), cos_pos_embed.view()],
    )?)
}

/// Index of the largest score; NaN never wins.
pub fn argmax(scores: ArrayViewD<f32>) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index)
}

pub(crate) fn output_array(outputs: &HashMap<String, DynValue>, name: &str) -> Result<ArrayD<f32>> {
    let value = outputs
        .get(name)
        .ok_or_else(|| anyhow!("Model output '{}' is missing", name))?;

    Ok(value.try_extract_array::<f32>()?.to_owned())
}
