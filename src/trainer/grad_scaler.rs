// Copyright 2020 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::common::error::FineTuneError;
use tch::Tensor;

/// # Dynamic loss scaler for mixed precision training
/// The loss is multiplied by the current scale before back-propagation so that small half
/// precision gradients do not flush to zero. Gradients are divided back by the scale before the
/// optimizer step. A step producing non-finite gradients must be skipped: the scale is then
/// multiplied by `backoff_factor`. After `growth_interval` consecutive finite steps it is
/// multiplied by `growth_factor`.
///
/// A disabled scaler leaves losses and gradients untouched and never reports an overflow.
#[derive(Debug, Clone)]
pub struct GradScaler {
    enabled: bool,
    scale: f64,
    pub growth_factor: f64,
    pub backoff_factor: f64,
    pub growth_interval: usize,
    clean_steps: usize,
}

impl GradScaler {
    pub const INITIAL_SCALE: f64 = 65536.0;

    pub fn new(enabled: bool) -> GradScaler {
        GradScaler {
            enabled,
            scale: Self::INITIAL_SCALE,
            growth_factor: 2.0,
            backoff_factor: 0.5,
            growth_interval: 2000,
            clean_steps: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current scale (1 when disabled)
    pub fn scale(&self) -> f64 {
        if self.enabled {
            self.scale
        } else {
            1.0
        }
    }

    /// Scaled loss to back-propagate
    pub fn scale_loss(&self, loss: &Tensor) -> Tensor {
        if self.enabled {
            loss * self.scale
        } else {
            loss.shallow_clone()
        }
    }

    /// Divides the gradients of `variables` by the scale in place. Returns `true` if any
    /// gradient holds an infinite or `NaN` value, in which case the optimizer step must be skipped.
    pub fn unscale(&self, variables: &[Tensor]) -> Result<bool, FineTuneError> {
        if !self.enabled {
            return Ok(false);
        }
        let inverse_scale = 1.0 / self.scale;
        tch::no_grad(|| {
            let mut found_non_finite = false;
            for variable in variables {
                let mut gradient = variable.grad();
                if !gradient.defined() {
                    continue;
                }
                if gradient.f_isfinite()?.f_all()?.f_int64_value(&[])? == 0 {
                    found_non_finite = true;
                }
                gradient.f_mul_scalar_(inverse_scale)?;
            }
            Ok(found_non_finite)
        })
    }

    /// Adjusts the scale after a step, `found_non_finite` being the outcome of `unscale`.
    pub fn update(&mut self, found_non_finite: bool) {
        if !self.enabled {
            return;
        }
        if found_non_finite {
            self.scale *= self.backoff_factor;
            self.clean_steps = 0;
        } else {
            self.clean_steps += 1;
            if self.clean_steps >= self.growth_interval {
                self.scale *= self.growth_factor;
                self.clean_steps = 0;
            }
        }
    }
}
