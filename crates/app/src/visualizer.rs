// Visualiseur terminal de l'appel
//
// Une ligne de barres dont la hauteur suit le niveau du micro, avec un
// léger aléa pour l'animation, suivie de l'état de l'appel.

use call::CallState;

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Sensibilité par défaut du visualiseur
pub const DEFAULT_SENSITIVITY: f32 = 0.5;

/// Gain appliqué au niveau : de 1x (sensibilité 0) à 10x (sensibilité 1)
pub fn sensitivity_gain(sensitivity: f32) -> f32 {
    let sensitivity = if sensitivity.is_finite() { sensitivity.clamp(0.0, 1.0) } else { DEFAULT_SENSITIVITY };
    1.0 + sensitivity * 9.0
}

/// Rend une ligne de `bars` barres pour l'état et le niveau donnés
///
/// Hors appel les barres sont plates. Le niveau amplifié est borné à [0, 1].
pub fn render_meter(state: CallState, level: f32, sensitivity: f32, bars: usize) -> String {
    let meter: String = if state.is_active() {
        let level = if level.is_finite() {
            (level * sensitivity_gain(sensitivity)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (0..bars)
            .map(|_| {
                let jitter = 0.7 + fastrand::f32() * 0.6;
                let height = (level * jitter * (LEVELS.len() - 1) as f32).round() as usize;
                LEVELS[height.min(LEVELS.len() - 1)]
            })
            .collect()
    } else {
        std::iter::repeat(LEVELS[0]).take(bars).collect()
    };

    format!("{} {}", meter, state.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars_of(line: &str) -> Vec<char> {
        line.chars().take_while(|c| LEVELS.contains(c)).collect()
    }

    #[test]
    fn test_idle_is_flat() {
        let line = render_meter(CallState::Idle, 0.9, 1.0, 12);
        assert_eq!(bars_of(&line), vec!['▁'; 12]);
        assert!(line.ends_with("Inactif"));
    }

    #[test]
    fn test_silent_call_is_flat() {
        let line = render_meter(CallState::Listening, 0.0, 1.0, 8);
        assert_eq!(bars_of(&line), vec!['▁'; 8]);
        assert!(line.ends_with("À l'écoute"));
    }

    #[test]
    fn test_loud_call_raises_bars() {
        for _ in 0..20 {
            let line = render_meter(CallState::Speaking, 1.0, 0.0, 20);
            let bars = bars_of(&line);
            assert_eq!(bars.len(), 20);
            assert!(bars.iter().all(|c| *c >= '▆'));
            assert!(line.ends_with("Parle"));
        }
    }

    #[test]
    fn test_out_of_range_level() {
        let line = render_meter(CallState::Listening, f32::NAN, 1.0, 4);
        assert_eq!(bars_of(&line), vec!['▁'; 4]);

        let line = render_meter(CallState::Listening, 7.5, f32::NAN, 4);
        assert_eq!(bars_of(&line).len(), 4);
    }

    #[test]
    fn test_sensitivity_lifts_quiet_microphone() {
        assert_eq!(sensitivity_gain(0.0), 1.0);
        assert_eq!(sensitivity_gain(1.0), 10.0);
        assert_eq!(sensitivity_gain(4.0), 10.0);
        assert_eq!(sensitivity_gain(f32::NAN), sensitivity_gain(DEFAULT_SENSITIVITY));

        for _ in 0..20 {
            // 0.1 x 1.3 x 7 < 1 : au plus une marche sans gain
            let flat = render_meter(CallState::Listening, 0.1, 0.0, 16);
            assert!(bars_of(&flat).iter().all(|c| *c <= '▂'));

            let lifted = render_meter(CallState::Listening, 0.1, 1.0, 16);
            assert!(bars_of(&lifted).iter().all(|c| *c >= '▆'));
        }
    }
}
