// homeworks/src/services/tokens.rs

//! Opaque bearer tokens. Clients hold the random hex string; the store only sees its SHA-256.

use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

pub fn generate_token() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  rand::thread_rng().fill_bytes(&mut bytes);
  hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}
