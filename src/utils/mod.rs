//! Utility functions and helpers
//!
//! Hashing, signing, base58 and the serialization helpers shared by the
//! store, the wallet file and the wire protocol.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest,
};

pub use serialization::{base64_bytes, deserialize, from_json_bytes, serialize, to_json_bytes};
