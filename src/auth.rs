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

//! VNC authentication: challenge generation and response verification.
//!
//! Wraps [`crate::des`] with the random challenge generation
//! [`crate::session::ClientSession`] needs during the `Challenge` phase.

use crate::des;
use rand::RngCore;

/// Generates a fresh 16-byte authentication challenge.
#[must_use]
pub fn generate_challenge() -> [u8; 16] {
    let mut challenge = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut challenge);
    challenge
}

/// Verifies a client's 16-byte challenge response against `password`.
///
/// Returns `false` both on a genuine mismatch and on DES initialization
/// failure — either way the client fails authentication.
#[must_use]
pub fn verify_response(password: &[u8], challenge: &[u8; 16], response: &[u8; 16]) -> bool {
    match des::encrypt_challenge(password, challenge) {
        Some(expected) => expected == *response,
        None => false,
    }
}
