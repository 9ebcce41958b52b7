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

use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub fn configure_logging(json: bool) -> anyhow::Result<()> {
    let builder = FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env());
    if json {
        ::tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        ::tracing::subscriber::set_global_default(builder.pretty().finish())?;
    }
    Ok(())
}
