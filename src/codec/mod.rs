//! Snappy serial frame codec.
//!
//! The device emits CRLF-terminated lines. Each line is ChaCha20 ciphertext
//! (block counter 0, nonce = first 12 key bytes) whose plaintext is
//!
//! ```text
//! "SNAPPY:" | hardware address (6 bytes) | value (u16, big-endian)
//! ```
//!
//! The codec is pure: it looks at a byte window and says how many bytes to
//! drop and whether they held a reading. Buffer ownership stays with the
//! caller.

pub mod key;

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, Key, Nonce};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub use key::{derive_key, Seed, DEFAULT_SEED};

/// Plaintext frame marker.
pub const MARKER: &[u8; 7] = b"SNAPPY:";
/// Line terminator on the wire (sent in the clear).
pub const TERMINATOR: &[u8; 2] = b"\r\n";
/// Marker + 6-byte address + 2-byte value.
pub const PAYLOAD_LEN: usize = MARKER.len() + 6 + 2;
/// Unterminated input beyond this is noise.
pub const MAX_PENDING: usize = 4096;

/// 48-bit hardware address of the sensor that produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress([u8; 6]);

impl HardwareAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for HardwareAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One decoded sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    device_id: HardwareAddress,
    value: u16,
    timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(device_id: HardwareAddress, value: u16, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id,
            value,
            timestamp,
        }
    }

    pub fn device_id(&self) -> HardwareAddress {
        self.device_id
    }

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Capture time on this host; the device has no clock.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Why a candidate frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {len} bytes")]
    Truncated { len: usize },

    #[error("decrypted line does not start with the frame marker")]
    BadMarker,

    #[error("{len} bytes without a line terminator")]
    Overflow { len: usize },
}

/// Outcome of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// The window holds no complete frame yet.
    NeedMore,
    /// A frame decoded; drop `consumed` bytes.
    Frame { reading: Reading, consumed: usize },
    /// A candidate frame was rejected; drop `consumed` bytes and try again.
    Discard { error: FrameError, consumed: usize },
}

/// Decoder for one device key.
#[derive(Clone)]
pub struct FrameCodec {
    key: [u8; 32],
}

impl FrameCodec {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Codec for a device, keyed from the family seed and its serial number.
    pub fn for_device(seed: &Seed, serial_number: &str) -> Self {
        Self::new(derive_key(seed, serial_number))
    }

    fn cipher(&self) -> ChaCha20 {
        ChaCha20::new(Key::from_slice(&self.key), Nonce::from_slice(&self.key[..12]))
    }

    /// Decode the first frame in `window`, stamping it with the current time.
    pub fn decode(&self, window: &[u8]) -> DecodeStep {
        self.decode_at(window, Utc::now())
    }

    /// Decode the first frame in `window`, stamping it with `now`.
    pub fn decode_at(&self, window: &[u8], now: DateTime<Utc>) -> DecodeStep {
        let Some(mut end) = find_terminator(window, 0) else {
            return self.pending(window);
        };

        // A terminator inside the first PAYLOAD_LEN bytes is either the end of
        // a short junk line or ciphertext that happens to contain CRLF. The
        // marker tells them apart.
        if end < PAYLOAD_LEN {
            if window.len() < MARKER.len() {
                return DecodeStep::NeedMore;
            }
            if self.marker_at_start(window) {
                match find_terminator(window, PAYLOAD_LEN) {
                    Some(e) => end = e,
                    None => return self.pending(window),
                }
            }
        }

        let consumed = end + TERMINATOR.len();
        let mut plain = window[..end].to_vec();
        self.cipher().apply_keystream(&mut plain);

        if !plain.starts_with(MARKER) {
            let error = if plain.len() < MARKER.len() {
                FrameError::Truncated { len: plain.len() }
            } else {
                FrameError::BadMarker
            };
            return DecodeStep::Discard { error, consumed };
        }
        if plain.len() < PAYLOAD_LEN {
            return DecodeStep::Discard {
                error: FrameError::Truncated { len: plain.len() },
                consumed,
            };
        }

        let mut octets = [0u8; 6];
        octets.copy_from_slice(&plain[MARKER.len()..MARKER.len() + 6]);
        let value = u16::from_be_bytes([plain[PAYLOAD_LEN - 2], plain[PAYLOAD_LEN - 1]]);

        DecodeStep::Frame {
            reading: Reading::new(HardwareAddress::new(octets), value, now),
            consumed,
        }
    }

    /// Device-side encoder: one complete wire frame including the terminator.
    pub fn encode(&self, address: HardwareAddress, value: u16) -> Vec<u8> {
        let mut frame = Vec::with_capacity(PAYLOAD_LEN + TERMINATOR.len());
        frame.extend_from_slice(MARKER);
        frame.extend_from_slice(&address.octets());
        frame.extend_from_slice(&value.to_be_bytes());
        self.cipher().apply_keystream(&mut frame);
        frame.extend_from_slice(TERMINATOR);
        frame
    }

    fn marker_at_start(&self, window: &[u8]) -> bool {
        let mut head = [0u8; MARKER.len()];
        head.copy_from_slice(&window[..MARKER.len()]);
        self.cipher().apply_keystream(&mut head);
        &head == MARKER
    }

    fn pending(&self, window: &[u8]) -> DecodeStep {
        if window.len() > MAX_PENDING {
            DecodeStep::Discard {
                error: FrameError::Overflow { len: window.len() },
                consumed: window.len(),
            }
        } else {
            DecodeStep::NeedMore
        }
    }
}

impl fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec").finish_non_exhaustive()
    }
}

fn find_terminator(window: &[u8], from: usize) -> Option<usize> {
    window
        .get(from..)
        .and_then(|tail| memchr::memmem::find(tail, TERMINATOR))
        .map(|pos| pos + from)
}
