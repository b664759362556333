//! Event-related waveform shapes for synthetic recordings

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Time course of a simulated event-related response, in volts, as a
/// function of time relative to stimulus onset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Waveform {
    /// Gaussian-shaped evoked component (P100, N170, P300, ...)
    Component {
        latency: f64,
        width: f64,
        amplitude: f64,
    },
    /// Oscillatory burst under a Gaussian envelope.
    ///
    /// With `phase_locked` the burst starts at the same phase on every trial
    /// (evoked activity); otherwise each trial draws a random phase
    /// (induced activity, visible in power but not in ITC).
    Burst {
        frequency: f64,
        latency: f64,
        n_cycles: f64,
        amplitude: f64,
        phase_locked: bool,
    },
}

impl Waveform {
    /// Value at time `t` (seconds after onset) for a trial with the given phase offset
    pub fn value_at(&self, t: f64, phase: f64) -> f64 {
        match *self {
            Waveform::Component { latency, width, amplitude } => {
                let z = (t - latency) / width;
                amplitude * (-0.5 * z * z).exp()
            }
            Waveform::Burst { frequency, latency, n_cycles, amplitude, phase_locked } => {
                let sigma = n_cycles / (2.0 * PI * frequency);
                let z = (t - latency) / sigma;
                let phase = if phase_locked { 0.0 } else { phase };
                amplitude * (-0.5 * z * z).exp() * (2.0 * PI * frequency * (t - latency) + phase).cos()
            }
        }
    }

    /// Time span (relative to onset) outside which the waveform is negligible
    pub fn support(&self) -> (f64, f64) {
        match *self {
            Waveform::Component { latency, width, .. } => (latency - 5.0 * width, latency + 5.0 * width),
            Waveform::Burst { frequency, latency, n_cycles, .. } => {
                let sigma = n_cycles / (2.0 * PI * frequency);
                (latency - 5.0 * sigma, latency + 5.0 * sigma)
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Waveform::Component { .. } => "Evoked component",
            Waveform::Burst { phase_locked: true, .. } => "Phase-locked burst",
            Waveform::Burst { phase_locked: false, .. } => "Induced burst",
        }
    }
}

/// Scalp distribution: Gaussian falloff around a centre in montage coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Topography {
    pub center: [f64; 2],
    pub spread: f64,
}

impl Topography {
    pub fn new(center: [f64; 2], spread: f64) -> Self {
        Self { center, spread }
    }

    /// Weight in [0, 1] for a sensor at `position`
    pub fn weight(&self, position: [f64; 2]) -> f64 {
        let dx = position[0] - self.center[0];
        let dy = position[1] - self.center[1];
        (-(dx * dx + dy * dy) / (2.0 * self.spread * self.spread)).exp()
    }

    /// Occipito-temporal distribution peaking over P7/P8
    pub fn occipito_temporal() -> Self {
        Self::new([0.0, -0.65], 0.45)
    }

    pub fn central() -> Self {
        Self::new([0.0, 0.0], 0.5)
    }

    pub fn frontal() -> Self {
        Self::new([0.0, 0.7], 0.35)
    }
}

/// A waveform projected onto the scalp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub waveform: Waveform,
    pub topography: Topography,
}

impl Source {
    pub fn new(waveform: Waveform, topography: Topography) -> Self {
        Self { waveform, topography }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_peak() {
        let w = Waveform::Component { latency: 0.17, width: 0.02, amplitude: -5e-6 };
        assert!((w.value_at(0.17, 0.0) + 5e-6).abs() < 1e-15);
        assert!(w.value_at(0.5, 0.0).abs() < 1e-12);

        let (lo, hi) = w.support();
        assert!(lo < 0.17 && hi > 0.17);
    }

    #[test]
    fn test_burst_phase() {
        let locked = Waveform::Burst {
            frequency: 6.0, latency: 0.2, n_cycles: 3.0, amplitude: 1.0, phase_locked: true,
        };
        // Phase offset is ignored for phase-locked bursts
        assert_eq!(locked.value_at(0.21, 0.0), locked.value_at(0.21, 1.3));

        let induced = Waveform::Burst {
            frequency: 10.0, latency: 0.3, n_cycles: 4.0, amplitude: 1.0, phase_locked: false,
        };
        assert!((induced.value_at(0.3, 0.0) - 1.0).abs() < 1e-12);
        assert!((induced.value_at(0.3, PI) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_topography_weight() {
        let topo = Topography::occipito_temporal();
        assert!((topo.weight(topo.center) - 1.0).abs() < 1e-12);
        assert!(topo.weight([0.0, 0.8]) < topo.weight([0.0, -0.5]));
    }
}
