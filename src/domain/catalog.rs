// Static signal catalog - display metadata, default ranges and alarm limits
use super::signal::{ParameterKind, Rgb, WaveformKind};

/// Sampling rate used for buffer sizing and demo generation, in samples/sec.
pub const DEFAULT_SAMPLE_RATE: usize = 250;

/// Amount of waveform history kept in memory, in seconds.
pub const DEFAULT_BUFFER_SECONDS: usize = 10;

/// Default waveform buffer capacity in samples.
pub const DEFAULT_BUFFER_SAMPLES: usize = DEFAULT_SAMPLE_RATE * DEFAULT_BUFFER_SECONDS;

/// Default alarm thresholds for one parameter, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmLimits {
    pub low_critical: f32,
    pub low_warning: f32,
    pub high_warning: f32,
    pub high_critical: f32,
}

pub fn waveform_display_name(kind: WaveformKind) -> &'static str {
    match kind {
        WaveformKind::EcgI => "ECG I",
        WaveformKind::EcgII => "ECG II",
        WaveformKind::EcgIII => "ECG III",
        WaveformKind::Resp => "Resp",
        WaveformKind::Pleth => "SpO2",
        WaveformKind::Abp => "ABP",
        WaveformKind::Cvp => "CVP",
        WaveformKind::Capno => "ETCO2",
        WaveformKind::Eeg => "EEG",
    }
}

pub fn parameter_display_name(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Hr => "HR",
        ParameterKind::Rr => "RR",
        ParameterKind::Spo2 => "SpO2",
        ParameterKind::NibpSys => "NIBP-S",
        ParameterKind::NibpDia => "NIBP-D",
        ParameterKind::NibpMap => "NIBP-M",
        ParameterKind::Temp1 => "Temp",
        ParameterKind::Temp2 => "Temp 2",
        ParameterKind::Etco2 => "ETCO2",
        ParameterKind::Ibp1Sys => "ABP-S",
        ParameterKind::Ibp1Dia => "ABP-D",
        ParameterKind::Ibp1Map => "ABP-M",
        ParameterKind::Ibp2Sys => "CVP-S",
        ParameterKind::Ibp2Dia => "CVP-D",
        ParameterKind::Ibp2Map => "CVP-M",
    }
}

pub fn parameter_unit(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Hr => "bpm",
        ParameterKind::Rr => "br/min",
        ParameterKind::Spo2 => "%",
        ParameterKind::NibpSys
        | ParameterKind::NibpDia
        | ParameterKind::NibpMap
        | ParameterKind::Etco2
        | ParameterKind::Ibp1Sys
        | ParameterKind::Ibp1Dia
        | ParameterKind::Ibp1Map
        | ParameterKind::Ibp2Sys
        | ParameterKind::Ibp2Dia
        | ParameterKind::Ibp2Map => "mmHg",
        ParameterKind::Temp1 | ParameterKind::Temp2 => "°C",
    }
}

/// Default amplitude scaling range for a waveform, as (min, max).
pub fn default_waveform_range(kind: WaveformKind) -> (f32, f32) {
    match kind {
        // mV
        WaveformKind::EcgI | WaveformKind::EcgII | WaveformKind::EcgIII => (-1.5, 1.5),
        // Arbitrary units
        WaveformKind::Resp => (-1.0, 1.0),
        // Normalized 0-1
        WaveformKind::Pleth | WaveformKind::Capno => (0.0, 1.0),
        // Normalized 0-2 to leave headroom for pressure excursions
        WaveformKind::Abp | WaveformKind::Cvp => (0.0, 2.0),
        // μV
        WaveformKind::Eeg => (-50.0, 50.0),
    }
}

/// Default display range for a parameter, as (min, max).
pub fn default_parameter_range(kind: ParameterKind) -> (f32, f32) {
    match kind {
        ParameterKind::Hr => (30.0, 240.0),
        ParameterKind::Rr => (4.0, 40.0),
        ParameterKind::Spo2 => (70.0, 100.0),
        ParameterKind::NibpSys | ParameterKind::Ibp1Sys | ParameterKind::Ibp2Sys => (60.0, 240.0),
        ParameterKind::NibpDia | ParameterKind::Ibp1Dia | ParameterKind::Ibp2Dia => (30.0, 140.0),
        ParameterKind::NibpMap | ParameterKind::Ibp1Map | ParameterKind::Ibp2Map => (40.0, 160.0),
        ParameterKind::Temp1 | ParameterKind::Temp2 => (30.0, 42.0),
        ParameterKind::Etco2 => (0.0, 100.0),
    }
}

/// Default alarm limits per parameter, based on typical adult guidelines.
pub fn default_alarm_limits(kind: ParameterKind) -> AlarmLimits {
    let (low_critical, low_warning, high_warning, high_critical) = match kind {
        ParameterKind::Hr => (40.0, 50.0, 120.0, 150.0),
        ParameterKind::Rr => (6.0, 8.0, 25.0, 30.0),
        ParameterKind::Spo2 => (85.0, 90.0, 100.0, 100.0),
        ParameterKind::NibpSys | ParameterKind::Ibp1Sys => (80.0, 90.0, 160.0, 180.0),
        ParameterKind::NibpDia | ParameterKind::Ibp1Dia => (40.0, 50.0, 90.0, 110.0),
        ParameterKind::NibpMap | ParameterKind::Ibp1Map => (50.0, 60.0, 110.0, 130.0),
        // IBP channel 2 defaults assume central venous pressure
        ParameterKind::Ibp2Sys => (0.0, 2.0, 15.0, 20.0),
        ParameterKind::Ibp2Dia => (0.0, 0.0, 8.0, 12.0),
        ParameterKind::Ibp2Map => (0.0, 1.0, 10.0, 15.0),
        ParameterKind::Temp1 | ParameterKind::Temp2 => (35.0, 36.0, 38.0, 39.0),
        ParameterKind::Etco2 => (20.0, 25.0, 45.0, 50.0),
    };
    AlarmLimits {
        low_critical,
        low_warning,
        high_warning,
        high_critical,
    }
}

pub fn default_waveform_color(kind: WaveformKind) -> Rgb {
    match kind {
        WaveformKind::EcgI | WaveformKind::EcgII | WaveformKind::EcgIII => Rgb::new(0, 255, 0),
        WaveformKind::Resp => Rgb::new(255, 255, 0),
        WaveformKind::Pleth => Rgb::new(0, 255, 255),
        WaveformKind::Abp => Rgb::new(255, 0, 0),
        _ => Rgb::new(255, 255, 255),
    }
}

pub fn default_parameter_color(_kind: ParameterKind) -> Rgb {
    Rgb::new(255, 255, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_kind() {
        for kind in WaveformKind::ALL {
            assert!(!waveform_display_name(kind).is_empty());
            let (min, max) = default_waveform_range(kind);
            assert!(min < max);
        }
        for kind in ParameterKind::ALL {
            assert!(!parameter_display_name(kind).is_empty());
            let (min, max) = default_parameter_range(kind);
            assert!(min < max);
        }
    }

    #[test]
    fn heart_rate_defaults_match_clinical_limits() {
        let limits = default_alarm_limits(ParameterKind::Hr);
        assert_eq!(limits.low_critical, 40.0);
        assert_eq!(limits.low_warning, 50.0);
        assert_eq!(limits.high_warning, 120.0);
        assert_eq!(limits.high_critical, 150.0);
        assert_eq!(parameter_unit(ParameterKind::Hr), "bpm");
    }

    #[test]
    fn pressure_parameters_report_mmhg() {
        for kind in [
            ParameterKind::NibpSys,
            ParameterKind::Ibp1Map,
            ParameterKind::Ibp2Dia,
            ParameterKind::Etco2,
        ] {
            assert_eq!(parameter_unit(kind), "mmHg");
        }
    }
}
