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

//! Collaborator interfaces consumed by the Hopper core.
//!
//! Each contract is a narrow trait selected at construction time. The core is
//! agnostic to the concrete backing: a node-backed implementation, a noop
//! default, or a mock in tests.

mod traits;
pub use traits::{
    EntryPointTransactor, GetBaseFee, GetCode, GetGasTip, GetStake, SimulateValidation,
};
#[cfg(any(test, feature = "test-utils"))]
pub use traits::{
    MockEntryPointTransactor, MockGetBaseFee, MockGetCode, MockGetGasTip, MockGetStake,
    MockSimulateValidation,
};

mod noop;
pub use noop::{
    NoopEntryPointTransactor, NoopGetBaseFee, NoopGetCode, NoopGetGasTip, NoopGetStake,
    NoopSimulateValidation,
};

mod node;
pub use node::NodeProviders;
