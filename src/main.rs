// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! VNCSlots server binary: load the image assets from the working
//! directory, bind port 5900, and serve the machine until killed.

use log::{error, info};

use vncslots::game::{Assets, Game};
use vncslots::server::Server;
use vncslots::{Result, DEFAULT_PORT};

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("VNCSlots starting up");
    let assets = Assets::load(".")?;
    let game = Game::new(assets, "stats.ini");
    let server = Server::bind(DEFAULT_PORT, game).await?;
    info!("ready to accept connections");
    server.run().await
}
