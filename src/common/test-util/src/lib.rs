// Copyright 2023 Greptime Team
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

pub mod temp_dir;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Returns a seeded rng for randomized tests, printing the seed so a failing
/// run can be replayed with `TEST_SEED=<seed>`.
#[allow(clippy::print_stdout)]
pub fn seeded_rng() -> StdRng {
    let seed = std::env::var("TEST_SEED")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or_else(|| rand::thread_rng().gen());
    println!("test seed: {seed}");
    StdRng::seed_from_u64(seed)
}
