//! Channel descriptions and electrode montages

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sensor type of a recording channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Scalp electroencephalography
    Eeg,
    /// MEG magnetometer
    Mag,
    /// MEG planar gradiometer
    Grad,
    /// Electrooculogram
    Eog,
    /// Electrocardiogram
    Ecg,
    /// Trigger / stimulus channel
    Stim,
    /// Anything else
    Misc,
}

impl ChannelType {
    /// Whether the channel carries physiological data (everything but triggers)
    pub fn is_data(&self) -> bool {
        !matches!(self, ChannelType::Stim)
    }

    /// Display unit used for amplitudes of this channel type
    pub fn unit(&self) -> &'static str {
        match self {
            ChannelType::Eeg | ChannelType::Eog | ChannelType::Ecg => "V",
            ChannelType::Mag => "T",
            ChannelType::Grad => "T/m",
            ChannelType::Stim | ChannelType::Misc => "AU",
        }
    }
}

/// Description of a single channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel name, unique within a recording
    pub name: String,
    /// Sensor type
    pub kind: ChannelType,
    /// Excluded from analysis due to poor signal quality
    #[serde(default)]
    pub bad: bool,
    /// 2-D projected sensor position (unit head circle), if known
    #[serde(default)]
    pub position: Option<[f64; 2]>,
}

impl ChannelInfo {
    pub fn new(name: &str, kind: ChannelType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            bad: false,
            position: None,
        }
    }

    pub fn eeg(name: &str) -> Self {
        Self::new(name, ChannelType::Eeg)
    }

    pub fn stim(name: &str) -> Self {
        Self::new(name, ChannelType::Stim)
    }

    /// Good data channel: not bad and not a trigger channel
    pub fn is_good_data(&self) -> bool {
        !self.bad && self.kind.is_data()
    }
}

/// Named 2-D sensor positions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Montage {
    positions: BTreeMap<String, [f64; 2]>,
}

impl Montage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, position: [f64; 2]) {
        self.positions.insert(name.to_string(), position);
    }

    /// Position of a sensor, matched case-insensitively
    pub fn position(&self, name: &str) -> Option<[f64; 2]> {
        self.positions.get(name).copied().or_else(|| {
            self.positions
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, pos)| *pos)
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(|k| k.as_str())
    }

    /// Subset of the international 10-20 system, azimuthal projection onto
    /// the unit circle (nose at +y, left ear at -x).
    pub fn standard_1020() -> Self {
        const R: f64 = 0.8;
        const SITES: &[(&str, f64, f64)] = &[
            // name, radius fraction, angle in degrees (0 = right, 90 = nose)
            ("Fp1", 1.0, 108.0), ("Fpz", 1.0, 90.0), ("Fp2", 1.0, 72.0),
            ("F7", 1.0, 144.0), ("F3", 0.55, 130.0), ("Fz", 0.5, 90.0),
            ("F4", 0.55, 50.0), ("F8", 1.0, 36.0),
            ("T7", 1.0, 180.0), ("C3", 0.5, 180.0), ("Cz", 0.0, 0.0),
            ("C4", 0.5, 0.0), ("T8", 1.0, 0.0),
            ("P7", 1.0, 216.0), ("P3", 0.55, 230.0), ("Pz", 0.5, 270.0),
            ("P4", 0.55, 310.0), ("P8", 1.0, 324.0),
            ("O1", 1.0, 252.0), ("Oz", 1.0, 270.0), ("O2", 1.0, 288.0),
        ];

        let mut montage = Montage::new();
        for &(name, radius, angle) in SITES {
            let theta = angle.to_radians();
            montage.insert(name, [R * radius * theta.cos(), R * radius * theta.sin()]);
        }
        montage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_type_data() {
        assert!(ChannelType::Eeg.is_data());
        assert!(ChannelType::Grad.is_data());
        assert!(!ChannelType::Stim.is_data());
    }

    #[test]
    fn test_channel_type_serde_names() {
        let json = serde_json::to_string(&ChannelType::Eeg).unwrap();
        assert_eq!(json, "\"eeg\"");
        let kind: ChannelType = serde_json::from_str("\"grad\"").unwrap();
        assert_eq!(kind, ChannelType::Grad);
    }

    #[test]
    fn test_good_data() {
        let mut ch = ChannelInfo::eeg("Cz");
        assert!(ch.is_good_data());
        ch.bad = true;
        assert!(!ch.is_good_data());
        assert!(!ChannelInfo::stim("STI 014").is_good_data());
    }

    #[test]
    fn test_standard_montage() {
        let montage = Montage::standard_1020();
        assert_eq!(montage.len(), 21);

        let cz = montage.position("Cz").unwrap();
        assert!(cz[0].abs() < 1e-12 && cz[1].abs() < 1e-12);

        // Case-insensitive lookup, frontal sites in front of occipital ones
        let fz = montage.position("FZ").unwrap();
        let oz = montage.position("oz").unwrap();
        assert!(fz[1] > 0.0);
        assert!(oz[1] < 0.0);

        for name in montage.names() {
            let [x, y] = montage.position(name).unwrap();
            assert!((x * x + y * y).sqrt() <= 1.0);
        }
    }
}
