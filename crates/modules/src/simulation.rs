// This file is part of Hopper.
//
// Hopper is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Hopper is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Hopper.
// If not, see https://www.gnu.org/licenses/.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use hopper_provider::SimulateValidation;
use hopper_types::{MempoolError, MempoolResult};

use crate::{UserOpHandler, UserOpHandlerContext};

/// Runs entry point validation simulation for the candidate operation.
///
/// A structured revert is an admission rejection; a transport failure aborts
/// the admission without anything being persisted.
pub struct SimulateOp {
    simulator: Arc<dyn SimulateValidation>,
}

impl SimulateOp {
    /// Create the stage over a simulation backend.
    pub fn new(simulator: Arc<dyn SimulateValidation>) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl UserOpHandler for SimulateOp {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        let result = self
            .simulator
            .simulate_validation(ctx.entry_point, &ctx.op)
            .await
            .context("validation simulation call failed")?;

        match result {
            Ok(_) => Ok(()),
            Err(revert) => Err(MempoolError::SimulationRejected(revert)),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use ethers::types::Address;
    use hopper_provider::MockSimulateValidation;
    use hopper_types::{ValidationOutput, ValidationRevert};

    use super::*;

    fn ctx() -> UserOpHandlerContext {
        UserOpHandlerContext::for_testing(Default::default(), Address::random(), 1)
    }

    #[tokio::test]
    async fn passing_simulation_admits() {
        let mut simulator = MockSimulateValidation::new();
        simulator
            .expect_simulate_validation()
            .returning(|_, _| Ok(Ok(ValidationOutput::default())));

        SimulateOp::new(Arc::new(simulator))
            .handle(&mut ctx())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn structured_revert_is_a_rejection() {
        let mut simulator = MockSimulateValidation::new();
        simulator.expect_simulate_validation().returning(|_, _| {
            Ok(Err(ValidationRevert {
                paymaster: None,
                reason: "AA23 reverted".to_string(),
            }))
        });

        let err = SimulateOp::new(Arc::new(simulator))
            .handle(&mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, MempoolError::SimulationRejected(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_opaque() {
        let mut simulator = MockSimulateValidation::new();
        simulator
            .expect_simulate_validation()
            .returning(|_, _| Err(anyhow!("rpc timeout")));

        let err = SimulateOp::new(Arc::new(simulator))
            .handle(&mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, MempoolError::Other(_)));
    }
}
