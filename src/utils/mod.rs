//! Shared helpers: URL splitting, name hashing, and key material probing.

pub mod certificates;
pub mod urls;

pub use certificates::{contains_embedded_key, ec_private_key_bytes};
pub use urls::{
    dynamic_url_secret_name, generate_dynamic_url_secret_name, split_url, UrlParts, UrlScheme,
};

/// Seed for content hashing (the 32-bit FNV offset basis).
pub(crate) const FNV32_OFFSET_BASIS: u32 = 0x811C_9DC5;

const FNV32_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a over a byte sequence, chained through `seed`.
///
/// Deterministic across runs and platforms; used for derived secret names
/// (seed 0) and content hashes (seeded with the offset basis).
pub fn fnv32(bytes: &[u8], seed: u32) -> u32 {
    bytes.iter().fold(seed, |hash, &b| (hash ^ u32::from(b)).wrapping_mul(FNV32_PRIME))
}
