use std::marker::PhantomData;

use burn::module::{AutodiffModule, ModuleVisitor, ParamId};
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: f64,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let squared = grad.clone().mul(grad).sum().into_scalar().elem::<f64>();
            self.total += squared;
        }
    }
}

struct Rescale<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    scale: f32,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id, grad.mul_scalar(self.scale));
        }
    }
}

/// L2 norm over every parameter gradient of `model`, taken as one vector.
pub fn global_grad_norm<B, M>(model: &M, grads: &GradientsParams) -> f32
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNorm::<B> {
        grads,
        total: 0.0,
        _backend: PhantomData,
    };
    model.visit(&mut visitor);
    visitor.total.sqrt() as f32
}

/// Scales all gradients by `max_norm / max(norm, max_norm)`.
///
/// Returns the gradients and the norm measured before clipping.
pub fn clip_global_norm<B, M>(
    model: &M,
    mut grads: GradientsParams,
    max_norm: f32,
) -> (GradientsParams, f32)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let norm = global_grad_norm::<B, M>(model, &grads);
    if norm > max_norm && norm.is_finite() {
        let mut visitor = Rescale::<B> {
            grads: &mut grads,
            scale: max_norm / norm,
            _backend: PhantomData,
        };
        model.visit(&mut visitor);
    }
    (grads, norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::module::{Module, Param};
    use burn::tensor::TensorData;
    use burn_autodiff::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[derive(Module, Debug)]
    struct Pair<B: burn::tensor::backend::Backend> {
        a: Param<Tensor<B, 1>>,
        b: Param<Tensor<B, 2>>,
    }

    fn pair(device: &<TestBackend as burn::tensor::backend::Backend>::Device) -> Pair<TestBackend> {
        Pair {
            a: Param::from_tensor(Tensor::from_data(TensorData::new(vec![1.0f32, 2.0], [2]), device)),
            b: Param::from_tensor(Tensor::from_data(
                TensorData::new(vec![1.0f32, 1.0, 1.0, 1.0], [2, 2]),
                device,
            )),
        }
    }

    fn grads_for(model: &Pair<TestBackend>, scale: f32) -> GradientsParams {
        // d/da = 3*scale per element, d/db = 4*scale per element
        let loss = model.a.val().sum().mul_scalar(3.0 * scale)
            + model.b.val().sum().mul_scalar(4.0 * scale);
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn norm_spans_all_parameters() {
        let device = Default::default();
        let model = pair(&device);
        let grads = grads_for(&model, 1.0);
        // sqrt(2 * 9 + 4 * 16) = sqrt(82)
        let norm = global_grad_norm::<TestBackend, _>(&model, &grads);
        assert!((norm - 82f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn clipping_rescales_to_threshold() {
        let device = Default::default();
        let model = pair(&device);
        let (clipped, before) = clip_global_norm::<TestBackend, _>(&model, grads_for(&model, 1.0), 1.0);
        assert!((before - 82f32.sqrt()).abs() < 1e-4);
        let after = global_grad_norm::<TestBackend, _>(&model, &clipped);
        assert!((after - 1.0).abs() < 1e-4);
    }

    #[test]
    fn small_gradients_are_untouched() {
        let device = Default::default();
        let model = pair(&device);
        let (clipped, before) =
            clip_global_norm::<TestBackend, _>(&model, grads_for(&model, 0.01), 1.0);
        let after = global_grad_norm::<TestBackend, _>(&model, &clipped);
        assert!((before - after).abs() < 1e-6);
    }
}
