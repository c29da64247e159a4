// Signal identity domain models - waveform/parameter kinds and shared enums
use serde::{Deserialize, Serialize};

/// Continuous physiological waveforms, identified by a stable numeric id.
///
/// The numeric mapping is part of the external contract (providers emit
/// data keyed by these ids) and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WaveformKind {
    EcgI = 0,
    EcgII = 1,
    EcgIII = 2,
    Resp = 3,
    Pleth = 4,
    Abp = 5,
    Cvp = 6,
    Capno = 7,
    Eeg = 8,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 9] = [
        WaveformKind::EcgI,
        WaveformKind::EcgII,
        WaveformKind::EcgIII,
        WaveformKind::Resp,
        WaveformKind::Pleth,
        WaveformKind::Abp,
        WaveformKind::Cvp,
        WaveformKind::Capno,
        WaveformKind::Eeg,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<WaveformKind> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Discrete physiological parameters, identified by a stable numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ParameterKind {
    Hr = 0,
    Rr = 1,
    Spo2 = 2,
    NibpSys = 3,
    NibpDia = 4,
    NibpMap = 5,
    Temp1 = 6,
    Temp2 = 7,
    Etco2 = 8,
    Ibp1Sys = 9,
    Ibp1Dia = 10,
    Ibp1Map = 11,
    Ibp2Sys = 12,
    Ibp2Dia = 13,
    Ibp2Map = 14,
}

impl ParameterKind {
    pub const ALL: [ParameterKind; 15] = [
        ParameterKind::Hr,
        ParameterKind::Rr,
        ParameterKind::Spo2,
        ParameterKind::NibpSys,
        ParameterKind::NibpDia,
        ParameterKind::NibpMap,
        ParameterKind::Temp1,
        ParameterKind::Temp2,
        ParameterKind::Etco2,
        ParameterKind::Ibp1Sys,
        ParameterKind::Ibp1Dia,
        ParameterKind::Ibp1Map,
        ParameterKind::Ibp2Sys,
        ParameterKind::Ibp2Dia,
        ParameterKind::Ibp2Map,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<ParameterKind> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

/// Connection state of a data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Alarm severity of a parameter, derived from its four thresholds.
///
/// `Technical` is never derived from thresholds; it is injected externally
/// to flag sensor or equipment faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmSeverity {
    Normal,
    HighWarning,
    HighCritical,
    LowWarning,
    LowCritical,
    Technical,
}

/// Display color, persisted in settings maps as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Rgb {
        Rgb { r, g, b }
    }

    pub fn to_json(self) -> serde_json::Value {
        serde_json::json!([self.r, self.g, self.b])
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Rgb> {
        let parts = value.as_array()?;
        if parts.len() != 3 {
            return None;
        }
        let channel = |v: &serde_json::Value| v.as_u64().filter(|c| *c <= 255).map(|c| c as u8);
        Some(Rgb {
            r: channel(&parts[0])?,
            g: channel(&parts[1])?,
            b: channel(&parts[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waveform_ids_are_stable() {
        // The numeric mapping is a wire contract; a reorder is a breaking change.
        let ids: Vec<i32> = WaveformKind::ALL.iter().map(|k| k.id()).collect();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        assert_eq!(WaveformKind::from_id(5), Some(WaveformKind::Abp));
        assert_eq!(WaveformKind::from_id(9), None);
    }

    #[test]
    fn parameter_ids_are_stable() {
        let ids: Vec<i32> = ParameterKind::ALL.iter().map(|k| k.id()).collect();
        assert_eq!(ids, (0..15).collect::<Vec<_>>());
        assert_eq!(ParameterKind::from_id(14), Some(ParameterKind::Ibp2Map));
        assert_eq!(ParameterKind::from_id(15), None);
    }

    #[test]
    fn rgb_round_trips_through_json() {
        let color = Rgb::new(0, 255, 128);
        assert_eq!(Rgb::from_json(&color.to_json()), Some(color));
        assert_eq!(Rgb::from_json(&serde_json::json!([0, 255])), None);
        assert_eq!(Rgb::from_json(&serde_json::json!("green")), None);
    }
}
