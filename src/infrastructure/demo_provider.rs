// Demo provider - synthetic physiological waveform and parameter generation
use crate::application::data_provider::DataProvider;
use crate::application::events::ProviderEvent;
use crate::application::settings_repository::{SettingsMap, SettingsRepository};
use crate::domain::error::MonitorError;
use crate::domain::signal::{ConnectionStatus, ParameterKind, WaveformKind};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// ECG complex shape: amplitude, width, and phase offset of each deflection
// within one cardiac cycle.
const ECG_P_AMPLITUDE: f64 = 0.25;
const ECG_P_WIDTH: f64 = 0.08;
const ECG_P_OFFSET: f64 = 0.16;
const ECG_Q_AMPLITUDE: f64 = -0.1;
const ECG_Q_WIDTH: f64 = 0.03;
const ECG_Q_OFFSET: f64 = 0.31;
const ECG_R_AMPLITUDE: f64 = 1.0;
const ECG_R_WIDTH: f64 = 0.05;
const ECG_R_OFFSET: f64 = 0.34;
const ECG_S_AMPLITUDE: f64 = -0.25;
const ECG_S_WIDTH: f64 = 0.03;
const ECG_S_OFFSET: f64 = 0.37;
const ECG_T_AMPLITUDE: f64 = 0.35;
const ECG_T_WIDTH: f64 = 0.1;
const ECG_T_OFFSET: f64 = 0.5;

// Capnograph respiratory cycle phase boundaries.
const CAPNO_INSPIRATION_END: f64 = 0.3;
const CAPNO_PLATEAU_START: f64 = 0.5;
const CAPNO_PLATEAU_END: f64 = 0.8;
const CAPNO_EXPIRATION_END: f64 = 0.9;

const DEFAULT_WAVEFORM_INTERVAL_MS: u64 = 40;
const DEFAULT_PARAMETER_INTERVAL_MS: u64 = 1000;
const CONNECT_DELAY: Duration = Duration::from_millis(500);
const POINTS_PER_TICK: usize = 3;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Waveform kinds the generator has a closed-form model for. CVP and EEG
/// exist in the catalog but have no synthetic model.
const SUPPORTED_WAVEFORMS: [WaveformKind; 7] = [
    WaveformKind::EcgI,
    WaveformKind::EcgII,
    WaveformKind::EcgIII,
    WaveformKind::Resp,
    WaveformKind::Pleth,
    WaveformKind::Abp,
    WaveformKind::Capno,
];

struct DemoState {
    status: ConnectionStatus,
    active: bool,
    started_at: Option<Instant>,
    cycle: u64,
    rng: StdRng,

    // Simulated vital-sign baselines, nudged per tick.
    heart_rate: f64,
    respiration_rate: f64,
    spo2: f64,
    systolic_bp: f64,
    diastolic_bp: f64,
    mean_bp: f64,
    temperature: f64,
    temperature2: f64,
    etco2: f64,
    ibp1_systolic: f64,
    ibp1_diastolic: f64,
    ibp1_mean: f64,
    ibp2_systolic: f64,
    ibp2_diastolic: f64,
    ibp2_mean: f64,

    // Simulation knobs.
    waveform_interval_ms: u64,
    parameter_interval_ms: u64,
    amplitude: f64,
    frequency: f64,
    noise: f64,
    artifacts: bool,
}

impl DemoState {
    fn with_defaults() -> Self {
        DemoState {
            status: ConnectionStatus::Disconnected,
            active: false,
            started_at: None,
            cycle: 0,
            rng: StdRng::from_entropy(),
            heart_rate: 70.0,
            respiration_rate: 15.0,
            spo2: 98.0,
            systolic_bp: 120.0,
            diastolic_bp: 80.0,
            mean_bp: 93.0,
            temperature: 37.0,
            // Peripheral probe runs slightly below core temperature.
            temperature2: 36.5,
            etco2: 35.0,
            // Arterial line reads slightly above the cuff.
            ibp1_systolic: 125.0,
            ibp1_diastolic: 75.0,
            ibp1_mean: 92.0,
            // Channel 2 carries central venous pressure.
            ibp2_systolic: 15.0,
            ibp2_diastolic: 5.0,
            ibp2_mean: 8.0,
            waveform_interval_ms: DEFAULT_WAVEFORM_INTERVAL_MS,
            parameter_interval_ms: DEFAULT_PARAMETER_INTERVAL_MS,
            amplitude: 1.0,
            frequency: 1.0,
            noise: 0.02,
            artifacts: false,
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Seconds between consecutive generated samples.
    fn sample_step(&self) -> f64 {
        1.0 / (1000.0 / self.waveform_interval_ms as f64)
    }

    /// Bounded random variation of ±pct around a base value.
    fn add_variation(&mut self, base: f64, pct: f64) -> f64 {
        let pct = pct.clamp(0.0, 1.0);
        let factor = self.rng.r#gen::<f64>() * 2.0 - 1.0;
        base + factor * base * pct
    }

    /// Occasionally push a value 10-30% outside its normal range to
    /// exercise alarm handling downstream.
    fn extreme_value(&mut self, base: f64, min: f64, max: f64, cycle: u64) -> f64 {
        if cycle % 8 == 0 && self.rng.gen_bool(0.4) {
            if self.rng.gen_bool(0.6) {
                max * (1.10 + self.rng.gen_range(0..20) as f64 / 100.0)
            } else {
                min * (0.90 - self.rng.gen_range(0..20) as f64 / 100.0)
            }
        } else {
            base
        }
    }

    /// More frequent, larger excursions for parameters where critical
    /// alarms matter most (HR, SpO2, blood pressures).
    fn critical_extreme_value(&mut self, base: f64, min: f64, max: f64, cycle: u64) -> f64 {
        if cycle % 5 == 0 && self.rng.gen_bool(0.6) {
            if self.rng.gen_bool(0.7) {
                max * (1.15 + self.rng.gen_range(0..25) as f64 / 100.0)
            } else {
                min * (0.85 - self.rng.gen_range(0..25) as f64 / 100.0)
            }
        } else {
            base
        }
    }

    fn synth_waveform(&mut self, kind: WaveformKind, time: f64, points: usize) -> Vec<f32> {
        match kind {
            WaveformKind::EcgI | WaveformKind::EcgII | WaveformKind::EcgIII => {
                self.synth_ecg(time, points)
            }
            WaveformKind::Resp => self.synth_respiration(time, points),
            WaveformKind::Pleth => self.synth_plethysmograph(time, points),
            WaveformKind::Abp => self.synth_arterial_pressure(time, points),
            WaveformKind::Capno => self.synth_capnograph(time, points),
            WaveformKind::Cvp | WaveformKind::Eeg => Vec::new(),
        }
    }

    /// PQRST complex as a sum of Gaussian deflections at fixed phase
    /// offsets, plus baseline wander and an occasional U wave.
    fn synth_ecg(&mut self, time: f64, points: usize) -> Vec<f32> {
        let cycle_time = 60.0 / self.heart_rate;
        let step = self.sample_step();
        let gain = 2.2;

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            let t = time + i as f64 * step;
            let phase = (t % cycle_time) / cycle_time;

            let mut value = 0.0;
            value += deflection(phase, ECG_P_OFFSET, ECG_P_WIDTH, ECG_P_AMPLITUDE * 1.2);
            value += deflection(phase, ECG_Q_OFFSET, ECG_Q_WIDTH, ECG_Q_AMPLITUDE * 1.3);
            value += deflection(phase, ECG_R_OFFSET, ECG_R_WIDTH, ECG_R_AMPLITUDE * 1.4);
            value += deflection(phase, ECG_S_OFFSET, ECG_S_WIDTH, ECG_S_AMPLITUDE * 1.2);
            value += deflection(phase, ECG_T_OFFSET, ECG_T_WIDTH, ECG_T_AMPLITUDE * 1.3);

            if self.rng.gen_bool(0.2) {
                let u_offset = ECG_T_OFFSET + ECG_T_WIDTH + 0.05;
                value += deflection(phase, u_offset, 0.06, 0.15);
            }

            // Slow baseline wander.
            value += 0.05 * (2.0 * PI * (t / 10.0)).sin();

            if self.noise > 0.0 {
                value += self.rng.gen_range(-self.noise / 3.0..self.noise / 3.0);
            }
            out.push((value * gain * self.amplitude) as f32);
        }
        out
    }

    /// Asymmetric half-sine: inspiration in the first 40% of the cycle,
    /// slower expiration over the remaining 60%.
    fn synth_respiration(&mut self, time: f64, points: usize) -> Vec<f32> {
        let cycle_time = 60.0 / self.respiration_rate;
        let step = self.sample_step();

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            let t = time + i as f64 * step;
            let phase = (t % cycle_time) / cycle_time;

            let mut value = if phase < 0.4 {
                (phase * PI / 0.4).sin()
            } else {
                (((phase - 0.4) * PI / 0.6) + PI).sin()
            };

            if self.noise > 0.0 {
                value += self.rng.gen_range(-self.noise..self.noise);
            }
            out.push((value * self.amplitude * 0.5) as f32);
        }
        out
    }

    /// Skewed-Gaussian systolic upstroke with diastolic runoff, dicrotic
    /// notch and secondary wave. Pulse amplitude scales with SpO2 and is
    /// modulated by the respiratory cycle.
    fn synth_plethysmograph(&mut self, time: f64, points: usize) -> Vec<f32> {
        let cycle_time = 60.0 / self.heart_rate;
        let step = self.sample_step();
        let gain = 2.5;
        let base_amplitude = (self.spo2 / 100.0) * self.amplitude;

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            let t = time + i as f64 * step;
            let phase = (t % cycle_time) / cycle_time;
            let resp_effect = 0.15 * (2.0 * PI * (t / (60.0 / self.respiration_rate))).sin();

            let mut value = if phase <= 0.35 {
                base_amplitude * 0.95 * (-((phase - 0.15) / 0.08).powi(2)).exp()
            } else {
                let fall = 1.0 - ((phase - 0.35) / 0.65).powf(0.7);
                base_amplitude * 0.4 * fall * fall
            };

            if phase > 0.35 && phase < 0.5 {
                let notch_depth = 0.2 * base_amplitude;
                let notch_width = 0.06;
                let notch_center = 0.42;
                value -= notch_depth * (-((phase - notch_center) / (notch_width / 2.0)).powi(2)).exp();

                let wave_center = notch_center + notch_width;
                if phase > wave_center && phase < wave_center + 0.08 {
                    value += 0.1
                        * base_amplitude
                        * (-((phase - (wave_center + 0.03)) / 0.04).powi(2)).exp();
                }
            }

            value += resp_effect * base_amplitude;
            // Mild pulsus paradoxus: inspiration damps the pulse slightly.
            if resp_effect < 0.0 {
                value *= 1.0 + 0.05 * resp_effect;
            }

            if self.noise > 0.0 {
                value += self.rng.gen_range(-self.noise / 3.0..self.noise / 3.0) * base_amplitude;
            }
            out.push((value * gain) as f32);
        }
        out
    }

    /// Piecewise arterial cycle: rapid upstroke, brief systolic plateau,
    /// decline into the dicrotic notch and rebound, then diastolic decay.
    /// Beat-to-beat drift is applied at the start of each cycle and clamped
    /// to physiological bounds.
    fn synth_arterial_pressure(&mut self, time: f64, points: usize) -> Vec<f32> {
        let cycle_time = 60.0 / self.heart_rate;
        let step = self.sample_step();
        let gain = 1.5;

        let mut systolic = self.systolic_bp;
        let mut diastolic = self.diastolic_bp;
        let mut range = systolic - diastolic;

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            let t = time + i as f64 * step;
            let phase = (t % cycle_time) / cycle_time;

            let resp_period = 60.0 / self.respiration_rate;
            let resp_effect = 0.05 * (2.0 * PI * ((t % resp_period) / resp_period)).sin();

            let mut value = diastolic;
            if phase < 0.15 {
                let n = phase / 0.15;
                value += range * (n.powf(1.8) * (3.0 - 2.0 * n));
            } else if phase < 0.2 {
                let n = (phase - 0.15) / 0.05;
                value += range * (1.0 - 0.05 * n);
            } else if phase < 0.3 {
                let n = (phase - 0.2) / 0.1;
                value += range * (1.0 - n * 0.8);
            } else if phase < 0.4 {
                let n = (phase - 0.3) / 0.1;
                let mut pressure = diastolic + range * 0.2 * (1.0 - n);
                if n < 0.5 {
                    pressure -= range * 0.10 * ((n / 0.5) * PI).sin();
                } else {
                    pressure += range * 0.08 * (((n - 0.5) / 0.5) * PI).sin();
                }
                value = pressure;
            } else {
                let n = (phase - 0.4) / 0.6;
                value += range * ((1.0 - n) * (1.0 - n) * 0.28);
            }

            value += diastolic * resp_effect;
            value += range * resp_effect * 0.3;

            if phase < 0.05 {
                let beat = self.rng.gen_range(-0.03..0.03);
                systolic = (systolic + beat * systolic).clamp(70.0, 200.0);
                diastolic = (diastolic + beat * diastolic).clamp(40.0, 110.0);
                range = systolic - diastolic;
            }

            if self.noise > 0.0 {
                value += self.rng.gen_range(-self.noise / 4.0..self.noise / 4.0);
            }
            out.push((value * gain * self.amplitude / 100.0) as f32);
        }
        out
    }

    /// Capnograph cycle: flat inspiratory baseline, exponential rise,
    /// gently ascending plateau, exponential fall back to baseline.
    fn synth_capnograph(&mut self, time: f64, points: usize) -> Vec<f32> {
        let cycle_time = 60.0 / self.respiration_rate;
        let step = self.sample_step();
        let max_co2 = self.etco2 / 50.0;

        let mut out = Vec::with_capacity(points);
        for i in 0..points {
            let t = time + i as f64 * step;
            let phase = (t % cycle_time) / cycle_time;

            let mut value = if phase < CAPNO_INSPIRATION_END {
                0.0
            } else if phase < CAPNO_PLATEAU_START {
                let n = (phase - CAPNO_INSPIRATION_END)
                    / (CAPNO_PLATEAU_START - CAPNO_INSPIRATION_END);
                max_co2 * (1.0 - (-5.0 * n).exp())
            } else if phase < CAPNO_PLATEAU_END {
                let n = (phase - CAPNO_PLATEAU_START) / (CAPNO_PLATEAU_END - CAPNO_PLATEAU_START);
                max_co2 * (1.0 + 0.05 * n + 0.02 * (n * 3.0 * PI).sin())
            } else if phase < CAPNO_EXPIRATION_END {
                let n = (phase - CAPNO_PLATEAU_END) / (CAPNO_EXPIRATION_END - CAPNO_PLATEAU_END);
                max_co2 * (1.05 * (-3.0 * n).exp())
            } else {
                max_co2 * 0.02 * (phase * 10.0 * PI).sin()
            };

            if self.noise > 0.0 && max_co2 > 0.0 {
                let spread = self.noise * max_co2 * 0.05;
                value += self.rng.gen_range(-spread..spread);
            }
            out.push((value * 1.5) as f32);
        }
        out
    }

    /// One parameter tick: every catalog parameter as baseline + slow
    /// drift + cross-parameter correlation + bounded variation, with
    /// periodic extreme-value and scripted clinical excursions.
    fn synth_parameters(&mut self) -> Vec<(ParameterKind, f32)> {
        self.cycle += 1;
        let cycle = self.cycle;

        let hr_factor = (cycle as f64 * 0.005).sin() * 3.0;
        let hr_base = self.critical_extreme_value(self.heart_rate + hr_factor, 40.0, 150.0, cycle);
        let heart_rate = self.add_variation(hr_base, 0.02).round();

        // Faster heart rates pull the respiration rate up slightly.
        let rr_factor = if heart_rate > self.heart_rate { 0.2 } else { -0.2 };
        let rr_base = self.extreme_value(self.respiration_rate + rr_factor, 8.0, 30.0, cycle + 3);
        let respiration_rate = self.add_variation(rr_base, 0.03).round();

        // Tachycardia mildly depresses saturation.
        let spo2_factor = if heart_rate > self.heart_rate + 10.0 { -0.2 } else { 0.1 };
        let mut spo2_base =
            self.critical_extreme_value(self.spo2 + spo2_factor, 94.0, 100.0, cycle + 7);
        if cycle % 30 == 0 && self.rng.gen_bool(0.25) {
            // Severe hypoxemia episode.
            spo2_base = self.rng.gen_range(70.0..86.0);
        }
        let spo2 = self.add_variation(spo2_base, 0.01).round().min(100.0);

        let sys_factor = if heart_rate > self.heart_rate { 0.5 } else { -0.3 };
        let dia_factor = if heart_rate > self.heart_rate { -0.3 } else { 0.2 };
        let sys_base =
            self.critical_extreme_value(self.systolic_bp + sys_factor, 90.0, 140.0, cycle + 11);
        let dia_base =
            self.critical_extreme_value(self.diastolic_bp + dia_factor, 60.0, 90.0, cycle + 13);
        let mut systolic = self.add_variation(sys_base, 0.03).round();
        let diastolic = self.add_variation(dia_base, 0.03).round();
        if systolic <= diastolic {
            systolic = diastolic + 20.0;
        }
        let mean_bp = (diastolic + (systolic - diastolic) / 3.0).round();

        // Arterial line tracks the cuff with a small offset.
        let ibp1_sys_base = self.extreme_value(systolic + 5.0, 90.0, 140.0, cycle + 17);
        let ibp1_dia_base = self.extreme_value(diastolic - 2.0, 60.0, 90.0, cycle + 19);
        let mut ibp1_sys = self.add_variation(ibp1_sys_base, 0.02).round();
        let ibp1_dia = self.add_variation(ibp1_dia_base, 0.02).round();
        if ibp1_sys <= ibp1_dia {
            ibp1_sys = ibp1_dia + 20.0;
        }
        let ibp1_mean = (ibp1_dia + (ibp1_sys - ibp1_dia) / 3.0).round();

        // CVP swings gently with respiration.
        let cvp_factor = ((cycle + 50) as f64 * 0.025).sin();
        let ibp2_sys_base =
            self.extreme_value(self.ibp2_systolic + cvp_factor * 2.0, 2.0, 8.0, cycle + 23);
        let ibp2_dia_base =
            self.extreme_value(self.ibp2_diastolic + cvp_factor * 1.5, 2.0, 8.0, cycle + 29);
        let mut ibp2_sys = self.add_variation(ibp2_sys_base, 0.08).round();
        let ibp2_dia = self.add_variation(ibp2_dia_base, 0.08).round();
        if ibp2_sys <= ibp2_dia {
            ibp2_sys = ibp2_dia + 2.0;
        }
        let ibp2_mean = (ibp2_dia + (ibp2_sys - ibp2_dia) / 3.0).round();

        let mut temp_base = self.extreme_value(self.temperature, 36.0, 38.0, cycle + 31);
        if cycle % 25 == 0 && self.rng.gen_bool(0.30) {
            // Fever spike.
            temp_base = self.rng.gen_range(39.0..41.0);
        } else if cycle % 40 == 0 && self.rng.gen_bool(0.20) {
            // Hypothermia.
            temp_base = self.rng.gen_range(33.0..35.0);
        }
        let temperature = self.add_variation(temp_base, 0.005);

        // Peripheral temperature follows cardiac output.
        let temp2_factor = if heart_rate < 60.0 {
            -0.1
        } else if heart_rate > 100.0 {
            0.1
        } else {
            0.0
        };
        let temp2_base = self.extreme_value(self.temperature2 + temp2_factor, 35.5, 37.5, cycle + 37);
        let temperature2 = self.add_variation(temp2_base, 0.008);

        // Hyperventilation washes CO2 out; hypoventilation retains it.
        let etco2_factor = if respiration_rate > 20.0 {
            -0.2 * (respiration_rate - 20.0)
        } else if respiration_rate < 10.0 {
            0.3 * (10.0 - respiration_rate)
        } else {
            0.0
        };
        let mut etco2_base = self.extreme_value(self.etco2 + etco2_factor, 35.0, 45.0, cycle + 41);
        if cycle % 22 == 0 && self.rng.gen_bool(0.35) {
            etco2_base = if self.rng.gen_bool(0.5) {
                // Hypercapnia.
                self.rng.gen_range(50.0..81.0)
            } else {
                // Hypocapnia.
                self.rng.gen_range(15.0..31.0)
            };
        }
        let etco2 = self.add_variation(etco2_base, 0.04).round();

        vec![
            (ParameterKind::Hr, heart_rate as f32),
            (ParameterKind::Rr, respiration_rate as f32),
            (ParameterKind::Spo2, spo2 as f32),
            (ParameterKind::NibpSys, systolic as f32),
            (ParameterKind::NibpDia, diastolic as f32),
            (ParameterKind::NibpMap, mean_bp as f32),
            (ParameterKind::Temp1, temperature as f32),
            (ParameterKind::Temp2, temperature2 as f32),
            (ParameterKind::Etco2, etco2 as f32),
            (ParameterKind::Ibp1Sys, ibp1_sys as f32),
            (ParameterKind::Ibp1Dia, ibp1_dia as f32),
            (ParameterKind::Ibp1Map, ibp1_mean as f32),
            (ParameterKind::Ibp2Sys, ibp2_sys as f32),
            (ParameterKind::Ibp2Dia, ibp2_dia as f32),
            (ParameterKind::Ibp2Map, ibp2_mean as f32),
        ]
    }
}

/// Gaussian-shaped deflection centered at `offset`, zero outside ±width.
fn deflection(phase: f64, offset: f64, width: f64, amplitude: f64) -> f64 {
    if (phase - offset).abs() < width {
        amplitude * (-((phase - offset) / (width / 2.0)).powi(2)).exp()
    } else {
        0.0
    }
}

fn apply_config(state: &mut DemoState, params: &SettingsMap) {
    let number = |key: &str| params.get(key).and_then(|v| v.as_f64());

    if let Some(v) = number("heartRate") {
        state.heart_rate = v;
    }
    if let Some(v) = number("respirationRate") {
        state.respiration_rate = v;
    }
    if let Some(v) = number("spo2") {
        state.spo2 = v;
    }
    if let Some(v) = number("systolicBP") {
        state.systolic_bp = v;
    }
    if let Some(v) = number("diastolicBP") {
        state.diastolic_bp = v;
    }
    state.mean_bp = state.diastolic_bp + (state.systolic_bp - state.diastolic_bp) / 3.0;

    if let Some(v) = number("temperature") {
        state.temperature = v;
    }
    if let Some(v) = number("temperature2") {
        state.temperature2 = v;
    }
    if let Some(v) = number("etco2") {
        state.etco2 = v;
    }
    if let Some(v) = number("ibp1Systolic") {
        state.ibp1_systolic = v;
    }
    if let Some(v) = number("ibp1Diastolic") {
        state.ibp1_diastolic = v;
    }
    state.ibp1_mean = state.ibp1_diastolic + (state.ibp1_systolic - state.ibp1_diastolic) / 3.0;

    if let Some(v) = number("ibp2Systolic") {
        state.ibp2_systolic = v;
    }
    if let Some(v) = number("ibp2Diastolic") {
        state.ibp2_diastolic = v;
    }
    state.ibp2_mean = state.ibp2_diastolic + (state.ibp2_systolic - state.ibp2_diastolic) / 3.0;

    if let Some(v) = params.get("UpdateInterval").and_then(|v| v.as_u64()) {
        if v > 0 {
            state.waveform_interval_ms = v;
        }
    }
    if let Some(v) = number("amplitude") {
        state.amplitude = v;
    }
    if let Some(v) = number("frequency") {
        state.frequency = v;
    }
    if let Some(v) = number("noise") {
        state.noise = v;
    }
    if let Some(v) = params.get("artifacts").and_then(|v| v.as_bool()) {
        state.artifacts = v;
    }
}

fn snapshot_config(state: &DemoState) -> SettingsMap {
    let mut config = SettingsMap::new();
    config.insert("heartRate".into(), serde_json::json!(state.heart_rate));
    config.insert(
        "respirationRate".into(),
        serde_json::json!(state.respiration_rate),
    );
    config.insert("spo2".into(), serde_json::json!(state.spo2));
    config.insert("systolicBP".into(), serde_json::json!(state.systolic_bp));
    config.insert("diastolicBP".into(), serde_json::json!(state.diastolic_bp));
    config.insert("temperature".into(), serde_json::json!(state.temperature));
    config.insert("temperature2".into(), serde_json::json!(state.temperature2));
    config.insert("etco2".into(), serde_json::json!(state.etco2));
    config.insert("ibp1Systolic".into(), serde_json::json!(state.ibp1_systolic));
    config.insert(
        "ibp1Diastolic".into(),
        serde_json::json!(state.ibp1_diastolic),
    );
    config.insert("ibp2Systolic".into(), serde_json::json!(state.ibp2_systolic));
    config.insert(
        "ibp2Diastolic".into(),
        serde_json::json!(state.ibp2_diastolic),
    );
    config.insert(
        "UpdateInterval".into(),
        serde_json::json!(state.waveform_interval_ms),
    );
    config.insert("amplitude".into(), serde_json::json!(state.amplitude));
    config.insert("frequency".into(), serde_json::json!(state.frequency));
    config.insert("noise".into(), serde_json::json!(state.noise));
    config.insert("artifacts".into(), serde_json::json!(state.artifacts));
    config
}

/// Synthetic data source producing clinically plausible, correlated
/// waveforms and vital-sign parameters on two independent schedules.
pub struct DemoProvider {
    state: Arc<Mutex<DemoState>>,
    events: broadcast::Sender<ProviderEvent>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    settings: Arc<dyn SettingsRepository>,
}

impl DemoProvider {
    pub const NAME: &'static str = "Demo";

    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        let mut state = DemoState::with_defaults();
        let stored = settings.provider_config(Self::NAME);
        if !stored.is_empty() {
            apply_config(&mut state, &stored);
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        DemoProvider {
            state: Arc::new(Mutex::new(state)),
            events,
            tasks: Arc::new(Mutex::new(Vec::new())),
            settings,
        }
    }
}

#[async_trait]
impl DataProvider for DemoProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn connection_status(&self) -> ConnectionStatus {
        self.state.lock().unwrap().status
    }

    fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    async fn start(&self) -> Result<(), MonitorError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.status != ConnectionStatus::Disconnected {
                tracing::debug!("demo provider already started, ignoring start request");
                return Ok(());
            }
            state.status = ConnectionStatus::Connecting;
        }
        tracing::debug!("demo provider connecting");
        let _ = self
            .events
            .send(ProviderEvent::Status(ConnectionStatus::Connecting));

        // The handshake delay, timer startup, and initial emission all run
        // after the state lock is released so a subscriber callback can
        // query the provider without re-entering a held lock.
        let state = self.state.clone();
        let events = self.events.clone();
        let tasks = self.tasks.clone();
        let connect = tokio::spawn(async move {
            tokio::time::sleep(CONNECT_DELAY).await;
            {
                let mut st = state.lock().unwrap();
                st.active = true;
                st.status = ConnectionStatus::Connected;
                st.started_at = Some(Instant::now());
            }
            tracing::debug!("demo provider connected, starting data generation");
            let _ = events.send(ProviderEvent::Status(ConnectionStatus::Connected));

            // Initial batches so consumers never start from stale data.
            emit_parameter_batch(&state, &events);
            emit_waveform_batches(&state, &events);

            let wf_state = state.clone();
            let wf_events = events.clone();
            let waveform_task = tokio::spawn(async move {
                loop {
                    let interval = {
                        let st = wf_state.lock().unwrap();
                        if !st.active {
                            break;
                        }
                        st.waveform_interval_ms
                    };
                    tokio::time::sleep(Duration::from_millis(interval)).await;
                    emit_waveform_batches(&wf_state, &wf_events);
                }
            });

            let pm_state = state.clone();
            let pm_events = events.clone();
            let parameter_task = tokio::spawn(async move {
                loop {
                    let interval = {
                        let st = pm_state.lock().unwrap();
                        if !st.active {
                            break;
                        }
                        st.parameter_interval_ms
                    };
                    tokio::time::sleep(Duration::from_millis(interval)).await;
                    emit_parameter_batch(&pm_state, &pm_events);
                }
            });

            let mut tasks = tasks.lock().unwrap();
            tasks.push(waveform_task);
            tasks.push(parameter_task);
        });
        self.tasks.lock().unwrap().push(connect);

        Ok(())
    }

    async fn stop(&self) {
        let was_active;
        {
            let mut state = self.state.lock().unwrap();
            was_active = state.active;
            // Inactive flag first: in-flight ticks self-abort on it.
            state.active = false;
            state.status = ConnectionStatus::Disconnected;
            state.started_at = None;
        }
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        if was_active {
            tracing::debug!("demo provider stopped");
            let _ = self
                .events
                .send(ProviderEvent::Status(ConnectionStatus::Disconnected));
        }
    }

    async fn configure(&self, params: SettingsMap) -> Result<(), MonitorError> {
        let merged = {
            let mut state = self.state.lock().unwrap();
            apply_config(&mut state, &params);
            tracing::debug!(
                heart_rate = state.heart_rate,
                mean_bp = state.mean_bp,
                ibp1_mean = state.ibp1_mean,
                ibp2_mean = state.ibp2_mean,
                "demo provider reconfigured"
            );
            snapshot_config(&state)
        };
        self.settings.set_provider_config(Self::NAME, merged);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

impl Drop for DemoProvider {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

/// One waveform tick: a small batch per supported kind, all sharing a
/// single timestamp. A batch containing non-finite values aborts the whole
/// tick so consumers never see a partial emission.
fn emit_waveform_batches(state: &Arc<Mutex<DemoState>>, events: &broadcast::Sender<ProviderEvent>) {
    let batches = {
        let mut st = state.lock().unwrap();
        if !st.active {
            return;
        }
        let elapsed = st.elapsed_secs();
        SUPPORTED_WAVEFORMS
            .iter()
            .map(|kind| (kind.id(), st.synth_waveform(*kind, elapsed, POINTS_PER_TICK)))
            .collect::<Vec<_>>()
    };

    for (waveform_id, samples) in &batches {
        if samples.iter().any(|v| !v.is_finite()) {
            tracing::error!(waveform_id, "non-finite waveform sample, skipping tick");
            return;
        }
    }

    let timestamp_ms = Utc::now().timestamp_millis();
    for (waveform_id, samples) in batches {
        if samples.is_empty() {
            continue;
        }
        let _ = events.send(ProviderEvent::Waveform {
            waveform_id,
            timestamp_ms,
            samples,
        });
    }
}

/// One parameter tick: every catalog parameter with a shared timestamp.
fn emit_parameter_batch(state: &Arc<Mutex<DemoState>>, events: &broadcast::Sender<ProviderEvent>) {
    let values = {
        let mut st = state.lock().unwrap();
        if !st.active || st.status != ConnectionStatus::Connected {
            return;
        }
        st.synth_parameters()
    };

    if values.iter().any(|(_, v)| !v.is_finite()) {
        tracing::error!("non-finite parameter value, skipping tick");
        return;
    }

    let timestamp_ms = Utc::now().timestamp_millis();
    tracing::debug!(count = values.len(), timestamp_ms, "generated parameter batch");
    for (kind, value) in values {
        let _ = events.send(ProviderEvent::Parameter {
            parameter_id: kind.id(),
            timestamp_ms,
            value,
        });
    }
}
