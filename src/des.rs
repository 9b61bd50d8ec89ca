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

//! RFB-flavored DES-ECB, used by [`crate::auth`] for VNC authentication.
//!
//! The RFB spec encrypts the 16-byte challenge with a DES key derived from
//! the password by reversing the bit order of each key byte. This quirk
//! traces back to the original algorithm's big-endian bit numbering and is
//! required for interoperability with real VNC clients.

use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use des::Des;

/// Builds the 8-byte DES key from a password: left-truncated/zero-padded to
/// 8 bytes, then each byte's bits reversed.
#[must_use]
pub fn make_des_key(password: &[u8]) -> [u8; 8] {
    let mut key = [0u8; 8];
    let n = password.len().min(8);
    key[..n].copy_from_slice(&password[..n]);
    for byte in &mut key {
        *byte = reverse_bits(*byte);
    }
    key
}

/// Reverses the bit order within a single byte.
#[must_use]
pub fn reverse_bits(mut b: u8) -> u8 {
    let mut out = 0u8;
    for _ in 0..8 {
        out = (out << 1) | (b & 1);
        b >>= 1;
    }
    out
}

/// Encrypts a single 8-byte DES-ECB block with `key`.
///
/// Returns `None` if the key cannot be loaded (never happens for an 8-byte
/// slice, but initialization is fallible per the `cipher` crate's API).
#[must_use]
pub fn encrypt_block(key: &[u8; 8], block: &[u8; 8]) -> Option<[u8; 8]> {
    let cipher = Des::new_from_slice(key).ok()?;
    let mut buf = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut buf);
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf);
    Some(out)
}

/// Encrypts a 16-byte RFB authentication challenge as two independent
/// 8-byte ECB blocks under the password-derived key.
///
/// Returns `None` if DES initialization fails.
#[must_use]
pub fn encrypt_challenge(password: &[u8], challenge: &[u8; 16]) -> Option<[u8; 16]> {
    let key = make_des_key(password);
    let mut block0 = [0u8; 8];
    let mut block1 = [0u8; 8];
    block0.copy_from_slice(&challenge[..8]);
    block1.copy_from_slice(&challenge[8..]);

    let out0 = encrypt_block(&key, &block0)?;
    let out1 = encrypt_block(&key, &block1)?;

    let mut out = [0u8; 16];
    out[..8].copy_from_slice(&out0);
    out[8..].copy_from_slice(&out1);
    Some(out)
}
