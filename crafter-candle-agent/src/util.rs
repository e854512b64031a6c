//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, DType, Device, Tensor, Var, WithDType, D};
use candle_nn::VarMap;
use crafter_core::error::CrafterError;
use log::trace;
use ndarray::ArrayD;
use num_traits::AsPrimitive;
use rand::Rng;

/// Elementwise Huber function with threshold `kappa`.
///
/// `0.5 u^2` for `|u| <= kappa`, `kappa (|u| - 0.5 kappa)` otherwise.
pub fn huber(u: &Tensor, kappa: f64) -> Result<Tensor> {
    let a = u.abs()?;
    let m = a.minimum(kappa)?;
    Ok(((m.sqr()? * 0.5)? + ((a - &m)? * kappa)?)?)
}

/// Smooth L1 loss averaged over the batch.
///
/// With `weight`, each element is multiplied by its weight before averaging.
/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1_loss(pred: &Tensor, tgt: &Tensor, weight: Option<&Tensor>) -> Result<Tensor> {
    let h = huber(&(pred - tgt)?, 1.0)?;
    match weight {
        Some(w) => Ok((h * w)?.mean_all()?),
        None => Ok(h.mean_all()?),
    }
}

/// Quantile Huber loss of QR-DQN.
///
/// `z_pred` and `z_tgt` have shape `[batch, n]` and quantile `j` of the
/// prediction is regressed on quantile `j` of the target, whose fraction is
/// `tau_j = (j + 0.5) / n`. With `u = z_tgt - z_pred`, each element is
/// weighted by `|tau_j - 1[u < 0]|`, summed over quantiles and divided by
/// `n`. The target is not differentiated.
///
/// Returns the loss of each item, shape `[batch]`, and the mean absolute
/// error of each item, shape `[batch]`, used as priority.
pub fn quantile_huber_loss(z_pred: &Tensor, z_tgt: &Tensor, kappa: f64) -> Result<(Tensor, Tensor)> {
    let n = z_pred.dim(D::Minus1)?;
    let u = (z_tgt.detach() - z_pred)?;
    let h = huber(&u, kappa)?;

    let tau = Tensor::arange(0u32, n as u32, z_pred.device())?
        .to_dtype(DType::F32)?
        .affine(1.0 / n as f64, 0.5 / n as f64)?
        .unsqueeze(0)?;
    let indicator = u.detach().lt(0f32)?.to_dtype(DType::F32)?;
    let w = indicator.broadcast_sub(&tau)?.abs()?;

    let loss = (w * h)?.sum(D::Minus1)?.affine(1.0 / n as f64, 0.0)?;
    let td_abs = u.detach().abs()?.mean(D::Minus1)?;
    Ok((loss, td_abs))
}

/// Copies all variables of `src` into the variables of the same names in `dest`.
pub fn hard_update(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("lock of the destination VarMap is poisoned"))?;
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("lock of the source VarMap is poisoned"))?;

    for (name, v_dest) in dest.iter() {
        let v_src = src
            .get(name)
            .ok_or_else(|| anyhow!("variable {} is missing in the source", name))?;
        v_dest.set(v_src.as_tensor())?;
    }
    trace!("Copied {} variables", dest.len());

    Ok(())
}

/// Rescales gradients so that their global L2 norm is at most `max_norm`.
///
/// Returns the norm before clipping. Gradients are multiplied by
/// `max_norm / (norm + 1e-6)` when the norm exceeds `max_norm`.
///
/// # Errors
///
/// [`CrafterError::NonFiniteGradient`] if the norm is NaN or infinite.
pub fn clip_grad_norm(vars: &[Var], grads: &mut GradStore, max_norm: f64) -> Result<f64> {
    let mut sq_sum = 0f64;
    for var in vars.iter() {
        if let Some(g) = grads.get(var.as_tensor()) {
            sq_sum += g.sqr()?.sum_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        }
    }
    let norm = sq_sum.sqrt();
    if !norm.is_finite() {
        return Err(CrafterError::NonFiniteGradient(norm).into());
    }

    if norm > max_norm {
        let scale = max_norm / (norm + 1e-6);
        for var in vars.iter() {
            if let Some(g) = grads.remove(var.as_tensor()) {
                grads.insert(var.as_tensor(), g.affine(scale, 0.0)?);
            }
        }
    }

    Ok(norm)
}

/// Re-initializes all variables of `varmap` from `rng`.
///
/// Variables are visited in the order of their names. Tensors of rank two or
/// more are weights and get `U(-b, b)` with `b = sqrt(6 / fan_in)`, where
/// `fan_in` is the product of all but the first dimension. Rank-one tensors
/// are biases and get zero.
pub fn reinit_params(varmap: &VarMap, rng: &mut impl Rng) -> Result<()> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("lock of the VarMap is poisoned"))?;
    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    for name in names {
        let var = &data[name];
        let dims = var.dims().to_vec();
        let t = if dims.len() < 2 {
            var.zeros_like()?
        } else {
            let fan_in: usize = dims[1..].iter().product();
            let bound = (6.0 / fan_in as f64).sqrt() as f32;
            let vs: Vec<f32> = (0..var.elem_count())
                .map(|_| rng.gen_range(-bound..bound))
                .collect();
            Tensor::from_vec(vs, dims.as_slice(), var.device())?.to_dtype(var.dtype())?
        };
        var.set(&t)?;
    }

    Ok(())
}

/// Converts an array into a tensor, optionally adding a leading batch dimension.
pub fn arrayd_to_tensor<T1, T2>(a: &ArrayD<T1>, add_batch_dim: bool, device: &Device) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let v = a.iter().map(|e| e.as_()).collect::<Vec<T2>>();
    let t = Tensor::from_vec(v, a.shape(), device)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

/// Converts per-item values into a tensor of shape `[batch]`.
pub fn vec_to_tensor<T1, T2>(v: &[T1], device: &Device) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let v = v.iter().map(|e| e.as_()).collect::<Vec<T2>>();
    let n = v.len();
    Ok(Tensor::from_vec(v, (n,), device)?)
}

/// Mean and population standard deviation of all elements.
pub fn mean_std(t: &Tensor) -> Result<(f32, f32)> {
    let vs = t.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
    if vs.is_empty() {
        return Ok((0.0, 0.0));
    }
    let n = vs.len() as f32;
    let mean = vs.iter().sum::<f32>() / n;
    let var = vs.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    Ok((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::Init;
    use rand::{rngs::StdRng, SeedableRng};

    fn close(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_huber() -> Result<()> {
        let u = Tensor::new(&[-3f32, -0.5, 0.0, 0.5, 2.0], &Device::Cpu)?;
        let h = huber(&u, 1.0)?.to_vec1::<f32>()?;
        assert!(close(&h, &[2.5, 0.125, 0.0, 0.125, 1.5]));
        Ok(())
    }

    #[test]
    fn test_weighted_smooth_l1() -> Result<()> {
        let pred = Tensor::new(&[0f32, 0.0], &Device::Cpu)?;
        let tgt = Tensor::new(&[0.5f32, 3.0], &Device::Cpu)?;
        let w = Tensor::new(&[1f32, 0.0], &Device::Cpu)?;

        let loss = smooth_l1_loss(&pred, &tgt, None)?.to_scalar::<f32>()?;
        assert!((loss - 1.3125).abs() < 1e-6);
        let loss = smooth_l1_loss(&pred, &tgt, Some(&w))?.to_scalar::<f32>()?;
        assert!((loss - 0.0625).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_quantile_huber_loss() -> Result<()> {
        let pred = Tensor::new(&[[0f32, 0.0], [0.0, 0.0], [1.0, 2.0]], &Device::Cpu)?;
        let tgt = Tensor::new(&[[1f32, -1.0], [-1.0, 1.0], [1.0, 2.0]], &Device::Cpu)?;
        let (loss, td_abs) = quantile_huber_loss(&pred, &tgt, 1.0)?;

        // tau = [0.25, 0.75]; overestimating the upper quantile costs less
        // than underestimating it
        assert!(close(&loss.to_vec1::<f32>()?, &[0.125, 0.375, 0.0]));
        assert!(close(&td_abs.to_vec1::<f32>()?, &[1.0, 1.0, 0.0]));
        Ok(())
    }

    #[test]
    fn test_hard_update() -> Result<()> {
        let build = |v: f32| -> Result<VarMap> {
            let vm = VarMap::new();
            vm.get((2, 2), "w", Init::Const(v as f64), DType::F32, &Device::Cpu)?;
            Ok(vm)
        };
        let src = build(1.5)?;
        let dest = build(-2.0)?;
        hard_update(&dest, &src)?;

        let t = dest.data().lock().unwrap()["w"].as_tensor().flatten_all()?;
        assert_eq!(t.to_vec1::<f32>()?, vec![1.5; 4]);

        let other = VarMap::new();
        other.get((2,), "b", Init::Const(0.0), DType::F32, &Device::Cpu)?;
        assert!(hard_update(&other, &src).is_err());
        Ok(())
    }

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let x = Var::new(&[1f32, 2.0], &Device::Cpu)?;
        let c = Tensor::new(&[3f32, 4.0], &Device::Cpu)?;
        let loss = (x.as_tensor() * &c)?.sum_all()?;

        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&[x.clone()], &mut grads, 10.0)?;
        assert!((norm - 5.0).abs() < 1e-6);
        let g = grads.get(x.as_tensor()).unwrap().to_vec1::<f32>()?;
        assert!(close(&g, &[3.0, 4.0]));

        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&[x.clone()], &mut grads, 1.0)?;
        assert!((norm - 5.0).abs() < 1e-6);
        let g = grads.get(x.as_tensor()).unwrap().to_vec1::<f32>()?;
        assert!(close(&g, &[0.6, 0.8]));
        Ok(())
    }

    #[test]
    fn test_non_finite_gradient() -> Result<()> {
        let x = Var::new(&[1f32, 2.0], &Device::Cpu)?;
        let c = Tensor::new(&[f32::INFINITY, 0.0], &Device::Cpu)?;
        let loss = (x.as_tensor() * &c)?.sum_all()?;
        let mut grads = loss.backward()?;

        let err = clip_grad_norm(&[x], &mut grads, 10.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CrafterError>(),
            Some(CrafterError::NonFiniteGradient(_))
        ));
        Ok(())
    }

    #[test]
    fn test_reinit_params_is_seeded() -> Result<()> {
        let build = || -> Result<VarMap> {
            let vm = VarMap::new();
            vm.get((8, 6), "l1.weight", Init::Const(1.0), DType::F32, &Device::Cpu)?;
            vm.get((8,), "l1.bias", Init::Const(1.0), DType::F32, &Device::Cpu)?;
            Ok(vm)
        };
        let (vm1, vm2) = (build()?, build()?);
        reinit_params(&vm1, &mut StdRng::seed_from_u64(3))?;
        reinit_params(&vm2, &mut StdRng::seed_from_u64(3))?;

        let get = |vm: &VarMap, name: &str| -> Result<Vec<f32>> {
            Ok(vm.data().lock().unwrap()[name].as_tensor().flatten_all()?.to_vec1::<f32>()?)
        };
        let w1 = get(&vm1, "l1.weight")?;
        assert_eq!(w1, get(&vm2, "l1.weight")?);
        assert!(w1.iter().all(|w| w.abs() <= 1.0));
        assert!(w1.iter().any(|w| *w != w1[0]));
        assert_eq!(get(&vm1, "l1.bias")?, vec![0.0; 8]);
        Ok(())
    }

    #[test]
    fn test_mean_std() -> Result<()> {
        let t = Tensor::new(&[[1f32, 3.0], [1.0, 3.0]], &Device::Cpu)?;
        assert_eq!(mean_std(&t)?, (2.0, 1.0));
        Ok(())
    }
}
