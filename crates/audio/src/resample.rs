//! Rééchantillonnage par plus proche voisin et quantification PCM16
//!
//! Le rééchantillonneur ne filtre pas : l'échantillon de sortie `i` reprend
//! l'échantillon d'entrée `floor(i * from / to)`. C'est suffisant pour la voix
//! envoyée à un service de reconnaissance, et c'est le comportement attendu
//! côté serveur.

/// Nombre d'échantillons produits pour `len` échantillons à `from` Hz convertis à `to` Hz
///
/// `round(len * to / from)`, calculé en entiers.
pub fn resampled_len(len: usize, from: u32, to: u32) -> usize {
    if from == 0 {
        return 0;
    }
    let from = from as u64;
    ((len as u64 * to as u64 + from / 2) / from) as usize
}

/// Rééchantillonne un bloc mono par sélection du plus proche échantillon
///
/// `from == to` renvoie une copie exacte du bloc.
///
/// # Example
/// ```rust
/// use audio::resample::resample_nearest;
///
/// let input: Vec<f32> = (0..48).map(|i| i as f32).collect();
/// let output = resample_nearest(&input, 48000, 16000);
/// assert_eq!(output, vec![0.0, 3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0,
///                         24.0, 27.0, 30.0, 33.0, 36.0, 39.0, 42.0, 45.0]);
/// ```
pub fn resample_nearest<T: Copy>(input: &[T], from: u32, to: u32) -> Vec<T> {
    let mut output = Vec::with_capacity(resampled_len(input.len(), from, to));
    resample_nearest_into(input, from, to, &mut output);
    output
}

/// Variante sans allocation : les échantillons sont ajoutés à `output`
///
/// Utilisée sur le thread temps réel avec un buffer réutilisé.
pub fn resample_nearest_into<T: Copy>(input: &[T], from: u32, to: u32, output: &mut Vec<T>) {
    if input.is_empty() || from == 0 || to == 0 {
        return;
    }
    if from == to {
        output.extend_from_slice(input);
        return;
    }

    let last = input.len() - 1;
    let count = resampled_len(input.len(), from, to);
    output.extend((0..count).map(|i| {
        let index = (i as u64 * from as u64 / to as u64) as usize;
        input[index.min(last)]
    }));
}

/// Quantifie un échantillon flottant en PCM16
///
/// Multiplié par 32768 puis borné à [-32768, 32767].
#[inline]
pub fn quantize(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Quantifie un bloc entier dans `output`
pub fn quantize_into(input: &[f32], output: &mut Vec<i16>) {
    output.extend(input.iter().map(|&s| quantize(s)));
}

/// Convertit un échantillon PCM16 en flottant
#[inline]
pub fn dequantize(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_at_same_rate() {
        let patterns: [fn(usize) -> f32; 3] = [
            |i| (i as f32 * 0.37).sin(),
            |i| if i % 2 == 0 { 1.0 } else { -1.0 },
            |i| i as f32 / 4096.0,
        ];

        for len in [0, 1, 127, 4096] {
            for pattern in patterns {
                let input: Vec<f32> = (0..len).map(pattern).collect();
                assert_eq!(resample_nearest(&input, 16000, 16000), input, "longueur {len}");

                let mut output = vec![9.0];
                resample_nearest_into(&input, 16000, 16000, &mut output);
                assert_eq!(output.len(), len + 1);
                assert_eq!(&output[1..], &input[..]);
            }
        }
    }

    #[test]
    fn test_downsample_48k_quantum() {
        // Un quantum de 128 échantillons à 48 kHz donne 43 échantillons à 16 kHz
        let input: Vec<u32> = (0..128).collect();
        let output = resample_nearest(&input, 48000, 16000);
        assert_eq!(output.len(), 43);
        assert_eq!(output[0], 0);
        assert_eq!(output[1], 3);
        assert_eq!(output[42], 126);
    }

    #[test]
    fn test_downsample_44k1_rounds_length() {
        assert_eq!(resampled_len(128, 44100, 16000), 46);
        let input: Vec<u32> = (0..128).collect();
        let output = resample_nearest(&input, 44100, 16000);
        assert_eq!(output.len(), 46);
        // floor(45 * 44100 / 16000) = 124
        assert_eq!(output[45], 124);
    }

    #[test]
    fn test_upsample_24k_to_48k() {
        let input = vec![1i16, 2, 3];
        let output = resample_nearest(&input, 24000, 48000);
        assert_eq!(output, vec![1, 1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_index_clamped_to_last_sample() {
        // 3 échantillons à 8 kHz -> round(6) = 6, tous les indices restent dans le bloc
        let input = vec![10i16, 20, 30];
        let output = resample_nearest(&input, 8000, 16000);
        assert_eq!(output.len(), 6);
        assert_eq!(*output.last().unwrap(), 30);

        // 5 échantillons à 11025 Hz : round(7.26) = 7, floor(6 * 11025 / 16000) = 4
        let input = vec![1i16, 2, 3, 4, 5];
        let output = resample_nearest(&input, 11025, 16000);
        assert_eq!(output.len(), 7);
        assert_eq!(output[6], 5);
    }

    #[test]
    fn test_empty_input() {
        let output: Vec<f32> = resample_nearest(&[], 48000, 16000);
        assert!(output.is_empty());
    }

    #[test]
    fn test_quantize_clamps() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(2.5), 32767);
        assert_eq!(quantize(-3.0), -32768);
        assert_eq!(quantize(0.5), 16384);
    }

    #[test]
    fn test_dequantize() {
        assert_eq!(dequantize(16384), 0.5);
        assert_eq!(dequantize(-32768), -1.0);
    }
}
