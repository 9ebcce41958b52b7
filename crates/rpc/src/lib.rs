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

//! JSON-RPC surface for the Hopper bundler.
//!
//! The `eth` namespace carries the client admission flow; the `debug`
//! namespace carries operator-only methods and must not be exposed publicly.

mod error;
pub use error::EthRpcError;

mod eth;
pub use eth::{EthApi, EthApiServer};

mod debug;
pub use debug::{DebugApi, DebugApiServer};

mod task;
pub use task::serve;
