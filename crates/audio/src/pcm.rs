//! Conversion entre échantillons PCM16 et octets little-endian
//!
//! Format des payloads audio échangés avec le serveur : PCM signé 16 bits,
//! little-endian, mono, sans en-tête.

use crate::error::{AudioError, AudioResult};
use crate::resample::dequantize;
use crate::types::PlaybackBuffer;

/// Encode des échantillons en octets little-endian
pub fn encode_pcm16le(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Décode des octets little-endian en échantillons
///
/// # Erreurs
/// `AudioError::DecodeError` si la longueur est impaire
pub fn decode_pcm16le(bytes: &[u8]) -> AudioResult<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::DecodeError(format!(
            "longueur PCM16 impaire: {} octets",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

impl PlaybackBuffer {
    /// Construit un buffer jouable depuis un payload PCM16 little-endian
    ///
    /// Chaque échantillon est divisé par 32768.
    ///
    /// # Example
    /// ```rust
    /// use audio::PlaybackBuffer;
    ///
    /// let buffer = PlaybackBuffer::from_pcm16le(&[0x00, 0x40, 0x00, 0xC0], 24000).unwrap();
    /// assert_eq!(buffer.samples, vec![0.5, -0.5]);
    /// ```
    pub fn from_pcm16le(bytes: &[u8], sample_rate: u32) -> AudioResult<Self> {
        let samples = decode_pcm16le(bytes)?;
        Ok(Self::new(
            samples.into_iter().map(dequantize).collect(),
            sample_rate,
        ))
    }
}
