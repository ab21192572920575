// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Reversible obfuscation for values kept in the preference store.
//!
//! This only keeps credentials from sitting in the settings table as plain
//! text. The key travels with the payload, so it is not encryption.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObfuscationError {
    #[error("obfuscated value is not valid base64")]
    Encoding(#[from] base64::DecodeError),
    #[error("obfuscated value is malformed")]
    Malformed,
    #[error("deobfuscated value is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn obfuscate(input: &str) -> String {
    let mut key = vec![0u8; input.len().max(1)];
    rand::thread_rng().fill_bytes(&mut key);
    let masked: Vec<u8> = input
        .bytes()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect();
    let stitched = format!(
        "{}:{}",
        URL_SAFE_NO_PAD.encode(&key),
        URL_SAFE_NO_PAD.encode(&masked)
    );
    URL_SAFE_NO_PAD.encode(stitched)
}

pub fn deobfuscate(input: &str) -> Result<String, ObfuscationError> {
    let stitched = String::from_utf8(URL_SAFE_NO_PAD.decode(input)?)?;
    let (key, masked) = stitched
        .split_once(':')
        .ok_or(ObfuscationError::Malformed)?;
    let key = URL_SAFE_NO_PAD.decode(key)?;
    let masked = URL_SAFE_NO_PAD.decode(masked)?;
    if key.is_empty() {
        return Err(ObfuscationError::Malformed);
    }
    let plain: Vec<u8> = masked
        .iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect();
    Ok(String::from_utf8(plain)?)
}
