use ndarray::Array1;


/// Evenly spaced values from `start` to `stop` inclusive, `step` apart.
///
/// The last point is snapped to `stop` when the span is a whole number of
/// steps up to rounding.
pub fn arange(start: f64, stop: f64, step: f64) -> Result<Array1<f64>, String> {
    if !(step > 0.0) || stop < start {
        return Err(format!(
            "invalid range: start {}, stop {}, step {}",
            start, stop, step
        ));
    }
    let steps = (stop - start) / step;
    let n = (steps + 1e-9).floor() as usize + 1;
    let mut values = Array1::from_shape_fn(n, |i| start + step * i as f64);
    if (steps - steps.round()).abs() < 1e-9 {
        values[n - 1] = stop;
    }
    Ok(values)
}
