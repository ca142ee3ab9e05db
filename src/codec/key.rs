//! Per-device cipher key derivation.
//!
//! Every Snappy unit encrypts with a key mixed from the device-family seed and
//! its own USB serial number, so the key is only known once discovery has read
//! the serial number off the bus.

/// Eight 32-bit words shared by the whole device family.
pub type Seed = [u32; 8];

/// Seed burned into the shipping firmware.
pub const DEFAULT_SEED: Seed = [
    0x9c2f6d44, 0xa68b3179, 0xf2c1be0a, 0x7d54c3f1, 0x3e118d6b, 0x4f0b92e7, 0x1dac785c, 0xe6132fa8,
];

/// Only this many serial-number characters take part in the mix.
pub const SERIAL_CHARS: usize = 16;

const GOLDEN: u32 = 0x9e3779b9;
const SPREAD: u32 = 0x85ebca6b;
const FINAL: u32 = 0xc2b2ae35;

fn mix_word(x: &mut u32, y: u32) {
    *x ^= y.wrapping_add(GOLDEN).wrapping_mul(*x | SPREAD);
    *x = x.rotate_left(13).wrapping_mul(FINAL);
}

/// Serial number bytes as the firmware sees them: each character truncated to
/// its low byte.
pub fn serial_bytes(serial_number: &str) -> Vec<u8> {
    serial_number
        .chars()
        .take(SERIAL_CHARS)
        .map(|c| c as u32 as u8)
        .collect()
}

/// Derive the 32-byte ChaCha20 key for a device.
pub fn derive_key(seed: &Seed, serial_number: &str) -> [u8; 32] {
    let mut words = *seed;
    for (i, byte) in serial_bytes(serial_number).into_iter().enumerate() {
        mix_word(&mut words[i % 8], u32::from(byte).wrapping_add(i as u32));
    }

    let mut key = [0u8; 32];
    for (i, chunk) in key.chunks_exact_mut(4).enumerate() {
        chunk.copy_from_slice(&words[(i * 5) % 8].to_le_bytes());
    }
    key
}
