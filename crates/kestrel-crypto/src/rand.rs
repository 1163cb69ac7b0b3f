use rand::{Rng, RngCore};

/// Fill a fixed-size buffer from the thread-local CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::rng().fill_bytes(&mut buf);
    buf
}

pub fn random_u64() -> u64 {
    rand::rng().random()
}

/// Generate a random 256-bit key for the opaque id cipher.
pub fn generate_server_key() -> [u8; 32] {
    random_bytes::<32>()
}
