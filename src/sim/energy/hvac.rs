//! HVAC collaborators.
//!
//! The zone solver calls [`HvacModel::query`] once per inner iteration and
//! [`HvacModel::commit`] exactly once per accepted step. Only `commit` may
//! change controller state (integrators, runtime counters), so speculative
//! trial temperatures never leak into it.
//!
//! Capacities are `Option<f64>`: `None` is unlimited, `Some(0.0)` delivers
//! nothing in that direction.

/// What the controller sees for one candidate zone state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvacInput {
    /// Trial zone air temperature of the current iteration [°C].
    pub trial_air_temp_c: f64,
    /// Committed zone air temperature at the start of the step [°C].
    pub previous_air_temp_c: f64,
    /// Setpoint for this step; `None` switches the system off.
    pub setpoint_c: Option<f64>,
    /// Net passive heat flow into the air at the trial temperature [W]
    /// (gains minus losses).
    pub passive_net_gain_w: f64,
    /// How fast the passive gain falls as the air warms [W/K]
    /// (`-d(passive)/dT_air`).
    pub passive_conductance_w_per_k: f64,
    /// Zone air heat capacity [J/K].
    pub air_capacity_j_per_k: f64,
    pub dt_s: f64,
}

impl HvacInput {
    /// The same input re-evaluated at another air temperature.
    ///
    /// The passive gain is linear in the air temperature, so it is shifted
    /// along `passive_conductance_w_per_k`.
    pub fn at_air_temperature(&self, air_temp_c: f64) -> Self {
        Self {
            trial_air_temp_c: air_temp_c,
            passive_net_gain_w: self.passive_net_gain_w
                - self.passive_conductance_w_per_k * (air_temp_c - self.trial_air_temp_c),
            ..*self
        }
    }
}

/// Accumulated delivered energy and runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HvacRuntime {
    pub heating_energy_j: f64,
    pub cooling_energy_j: f64,
    pub heating_time_s: f64,
    pub cooling_time_s: f64,
}

impl HvacRuntime {
    fn record(&mut self, power_w: f64, dt_s: f64) {
        if power_w > 0.0 {
            self.heating_energy_j += power_w * dt_s;
            self.heating_time_s += dt_s;
        } else if power_w < 0.0 {
            self.cooling_energy_j += -power_w * dt_s;
            self.cooling_time_s += dt_s;
        }
    }
}

/// Signed HVAC power source: positive heats the zone, negative cools it.
pub trait HvacModel: Send {
    /// Prospective output for `input`. Must not change any state.
    fn query(&self, input: &HvacInput) -> f64;

    /// Advance controller state for the accepted step.
    ///
    /// Returns the same power `query` returns for the same input.
    fn commit(&mut self, input: &HvacInput) -> f64;

    /// Drop in output per kelvin rise of the trial air temperature,
    /// `-dQ/dT_trial` [W/K], at `input`.
    ///
    /// The zone solver moves this part of the response to the implicit side
    /// of the air balance. Must be >= 0.
    fn conductance_w_per_k(&self, _input: &HvacInput) -> f64 {
        0.0
    }

    fn runtime(&self) -> HvacRuntime {
        HvacRuntime::default()
    }
}

fn clamp_to_capacity(power_w: f64, heating_capacity_w: Option<f64>, cooling_capacity_w: Option<f64>) -> f64 {
    let max_heat = heating_capacity_w.unwrap_or(f64::INFINITY);
    let max_cool = cooling_capacity_w.unwrap_or(f64::INFINITY);
    power_w.clamp(-max_cool, max_heat)
}

/// No HVAC: always zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHvac;

impl HvacModel for NoHvac {
    fn query(&self, _input: &HvacInput) -> f64 {
        0.0
    }

    fn commit(&mut self, _input: &HvacInput) -> f64 {
        0.0
    }
}

/// Predictive ideal-loads system.
///
/// Supplies the power that brings the zone from its committed temperature to
/// the setpoint within one step, net of the passive flow evaluated at the
/// setpoint:
///
/// ```text
/// Q = C_air * (T_set - T_prev) / dt - Q_passive(T_trial) + K_passive * (T_set - T_trial)
/// ```
///
/// clamped by the heating and cooling capacities. No action is taken while
/// the committed temperature lies within `deadband_c` of the setpoint.
///
/// `Q` does not depend on `T_trial` (the passive term cancels it), so the
/// default zero [`HvacModel::conductance_w_per_k`] is exact.
#[derive(Debug, Clone, PartialEq)]
pub struct IdealLoadsHvac {
    /// Maximum heating power [W]; `None` = unlimited.
    pub heating_capacity_w: Option<f64>,
    /// Maximum cooling power [W]; `None` = unlimited.
    pub cooling_capacity_w: Option<f64>,
    /// Half-width of the no-action band around the setpoint [K].
    pub deadband_c: f64,
    runtime: HvacRuntime,
}

impl IdealLoadsHvac {
    /// System limited to the given heating and cooling powers [W].
    pub fn new(heating_capacity_w: f64, cooling_capacity_w: f64) -> Self {
        Self::with_capacities(Some(heating_capacity_w), Some(cooling_capacity_w))
    }

    pub fn unlimited() -> Self {
        Self::with_capacities(None, None)
    }

    pub fn with_capacities(heating_capacity_w: Option<f64>, cooling_capacity_w: Option<f64>) -> Self {
        Self {
            heating_capacity_w,
            cooling_capacity_w,
            deadband_c: 0.0,
            runtime: HvacRuntime::default(),
        }
    }

    pub fn with_deadband(mut self, deadband_c: f64) -> Self {
        self.deadband_c = deadband_c;
        self
    }

    fn power(&self, input: &HvacInput) -> f64 {
        let Some(setpoint) = input.setpoint_c else {
            return 0.0;
        };
        if input.dt_s <= 0.0 || (setpoint - input.previous_air_temp_c).abs() < self.deadband_c {
            return 0.0;
        }
        let to_setpoint = input.air_capacity_j_per_k * (setpoint - input.previous_air_temp_c) / input.dt_s;
        // Passive flow moves with the air temperature; project it to the setpoint.
        let passive_at_setpoint = input.passive_net_gain_w
            - input.passive_conductance_w_per_k * (setpoint - input.trial_air_temp_c);
        let ideal = to_setpoint - passive_at_setpoint;
        clamp_to_capacity(ideal, self.heating_capacity_w, self.cooling_capacity_w)
    }
}

impl HvacModel for IdealLoadsHvac {
    fn query(&self, input: &HvacInput) -> f64 {
        self.power(input)
    }

    fn commit(&mut self, input: &HvacInput) -> f64 {
        let p = self.power(input);
        self.runtime.record(p, input.dt_s);
        p
    }

    fn runtime(&self) -> HvacRuntime {
        self.runtime
    }
}

/// Proportional-integral thermostat acting on the trial air temperature.
///
/// `u = Kp * e + Ki * (I + e * dt)` with `e = T_set - T_trial`. The integral
/// `I` is stored on commit only, and is frozen while the output saturates
/// in the direction of the error (anti-windup).
#[derive(Debug, Clone, PartialEq)]
pub struct PiThermostat {
    /// Proportional gain [W/K].
    pub kp_w_per_k: f64,
    /// Integral gain [W/(K*s)].
    pub ki_w_per_k_s: f64,
    pub heating_capacity_w: Option<f64>,
    pub cooling_capacity_w: Option<f64>,
    integral_k_s: f64,
    runtime: HvacRuntime,
}

impl PiThermostat {
    /// Thermostat with unlimited output.
    pub fn new(kp_w_per_k: f64, ki_w_per_k_s: f64) -> Self {
        Self {
            kp_w_per_k,
            ki_w_per_k_s,
            heating_capacity_w: None,
            cooling_capacity_w: None,
            integral_k_s: 0.0,
            runtime: HvacRuntime::default(),
        }
    }

    pub fn with_capacities(mut self, heating_capacity_w: Option<f64>, cooling_capacity_w: Option<f64>) -> Self {
        self.heating_capacity_w = heating_capacity_w;
        self.cooling_capacity_w = cooling_capacity_w;
        self
    }

    /// Accumulated error integral [K*s].
    pub fn integral(&self) -> f64 {
        self.integral_k_s
    }

    /// Output, candidate integral and saturation flag for `input`.
    fn evaluate(&self, input: &HvacInput) -> PiOutput {
        let Some(setpoint) = input.setpoint_c else {
            return PiOutput {
                power_w: 0.0,
                integral_k_s: self.integral_k_s,
                saturated: true,
            };
        };
        let error = setpoint - input.trial_air_temp_c;
        let integral = self.integral_k_s + error * input.dt_s;
        let raw = self.kp_w_per_k * error + self.ki_w_per_k_s * integral;
        let out = clamp_to_capacity(raw, self.heating_capacity_w, self.cooling_capacity_w);
        let winding_up = (raw > out && error > 0.0) || (raw < out && error < 0.0);
        PiOutput {
            power_w: out,
            integral_k_s: if winding_up { self.integral_k_s } else { integral },
            saturated: out != raw,
        }
    }
}

struct PiOutput {
    power_w: f64,
    integral_k_s: f64,
    saturated: bool,
}

impl HvacModel for PiThermostat {
    fn query(&self, input: &HvacInput) -> f64 {
        self.evaluate(input).power_w
    }

    fn commit(&mut self, input: &HvacInput) -> f64 {
        let out = self.evaluate(input);
        self.integral_k_s = out.integral_k_s;
        self.runtime.record(out.power_w, input.dt_s);
        out.power_w
    }

    /// `Kp + Ki*dt` while the output tracks the error, zero once clamped.
    fn conductance_w_per_k(&self, input: &HvacInput) -> f64 {
        if self.evaluate(input).saturated {
            0.0
        } else {
            self.kp_w_per_k + self.ki_w_per_k_s * input.dt_s
        }
    }

    fn runtime(&self) -> HvacRuntime {
        self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(trial: f64, prev: f64, setpoint: Option<f64>, passive: f64) -> HvacInput {
        HvacInput {
            trial_air_temp_c: trial,
            previous_air_temp_c: prev,
            setpoint_c: setpoint,
            passive_net_gain_w: passive,
            passive_conductance_w_per_k: 0.0,
            air_capacity_j_per_k: 1.0e5,
            dt_s: 100.0,
        }
    }

    #[test]
    fn test_ideal_loads_reaches_setpoint() {
        let hvac = IdealLoadsHvac::unlimited();
        // 1e5 J/K * 2 K / 100 s = 2000 W, plus 500 W of passive loss.
        let p = hvac.query(&input(18.0, 18.0, Some(20.0), -500.0));
        assert!((p - 2500.0).abs() < 1e-9);
        // Cooling when above setpoint with gains.
        let p = hvac.query(&input(22.0, 22.0, Some(20.0), 300.0));
        assert!((p + 2300.0).abs() < 1e-9);
    }

    #[test]
    fn test_ideal_loads_projects_passive_flow_to_setpoint() {
        let hvac = IdealLoadsHvac::unlimited();
        let x = HvacInput {
            passive_conductance_w_per_k: 50.0,
            ..input(19.0, 18.0, Some(20.0), -500.0)
        };
        // Loss grows by 50 W/K * 1 K between the trial and the setpoint.
        let p = hvac.query(&x);
        assert!((p - (2000.0 + 500.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_ideal_loads_capacity_and_deadband() {
        let hvac = IdealLoadsHvac::new(1000.0, 800.0);
        assert_eq!(hvac.query(&input(10.0, 10.0, Some(20.0), 0.0)), 1000.0);
        assert_eq!(hvac.query(&input(30.0, 30.0, Some(20.0), 0.0)), -800.0);

        let hvac = IdealLoadsHvac::unlimited().with_deadband(0.5);
        assert_eq!(hvac.query(&input(19.7, 19.7, Some(20.0), -500.0)), 0.0);
        assert_eq!(hvac.query(&input(19.7, 19.7, None, -500.0)), 0.0);
    }

    #[test]
    fn test_ideal_loads_commit_matches_query_and_records_runtime() {
        let mut hvac = IdealLoadsHvac::unlimited();
        let x = input(18.0, 18.0, Some(20.0), 0.0);
        let q = hvac.query(&x);
        assert_eq!(hvac.runtime(), HvacRuntime::default());
        let c = hvac.commit(&x);
        assert_eq!(q, c);
        let rt = hvac.runtime();
        assert!((rt.heating_energy_j - c * 100.0).abs() < 1e-6);
        assert_eq!(rt.heating_time_s, 100.0);
        assert_eq!(rt.cooling_time_s, 0.0);
    }

    #[test]
    fn test_pi_query_does_not_advance_integral() {
        let mut pi = PiThermostat::new(100.0, 0.5);
        let x = input(19.0, 19.0, Some(20.0), 0.0);
        for _ in 0..10 {
            pi.query(&x);
        }
        assert_eq!(pi.integral(), 0.0);
        // u = 100 * 1 + 0.5 * (1 * 100)
        let p = pi.commit(&x);
        assert!((p - 150.0).abs() < 1e-9);
        assert!((pi.integral() - 100.0).abs() < 1e-12);
        // Next step includes the stored integral.
        assert!((pi.query(&x) - (100.0 + 0.5 * 200.0)).abs() < 1e-9);
    }

    #[test]
    fn test_pi_anti_windup() {
        let mut pi = PiThermostat::new(100.0, 1.0).with_capacities(Some(200.0), None);
        let x = input(10.0, 10.0, Some(20.0), 0.0);
        for _ in 0..5 {
            assert_eq!(pi.commit(&x), 200.0);
        }
        // Saturated in the heating direction the whole time: integral frozen.
        assert_eq!(pi.integral(), 0.0);
        assert_eq!(pi.runtime().heating_time_s, 500.0);
    }

    #[test]
    fn test_zero_capacity_delivers_nothing() {
        let hvac = IdealLoadsHvac::new(0.0, 0.0);
        assert_eq!(hvac.query(&input(10.0, 10.0, Some(20.0), -500.0)), 0.0);
        assert_eq!(hvac.query(&input(30.0, 30.0, Some(20.0), 500.0)), 0.0);

        let heat_only = IdealLoadsHvac::with_capacities(None, Some(0.0));
        assert!((heat_only.query(&input(10.0, 10.0, Some(20.0), 0.0)) - 1.0e4).abs() < 1e-9);
        assert_eq!(heat_only.query(&input(30.0, 30.0, Some(20.0), 0.0)), 0.0);

        let pi = PiThermostat::new(100.0, 0.0).with_capacities(Some(0.0), Some(0.0));
        assert_eq!(pi.query(&input(10.0, 10.0, Some(20.0), 0.0)), 0.0);
    }

    #[test]
    fn test_pi_conductance_follows_slope() {
        let pi = PiThermostat::new(100.0, 0.5).with_capacities(Some(1000.0), None);
        let x = input(19.0, 19.0, Some(20.0), 0.0);
        let k = pi.conductance_w_per_k(&x);
        assert!((k - (100.0 + 0.5 * 100.0)).abs() < 1e-12);
        // Linear response: a 0.1 K rise lowers the output by k * 0.1.
        let dq = pi.query(&x) - pi.query(&x.at_air_temperature(19.1));
        assert!((dq - 0.1 * k).abs() < 1e-9);
        // Clamped at the heating limit.
        assert_eq!(pi.conductance_w_per_k(&input(5.0, 5.0, Some(20.0), 0.0)), 0.0);
        assert_eq!(pi.conductance_w_per_k(&input(19.0, 19.0, None, 0.0)), 0.0);
        assert_eq!(IdealLoadsHvac::unlimited().conductance_w_per_k(&x), 0.0);
    }

    #[test]
    fn test_ideal_loads_independent_of_trial_temperature() {
        let hvac = IdealLoadsHvac::unlimited();
        let x = HvacInput {
            passive_conductance_w_per_k: 80.0,
            ..input(18.5, 18.0, Some(20.0), -300.0)
        };
        let moved = x.at_air_temperature(19.5);
        assert!((moved.passive_net_gain_w - (-300.0 - 80.0)).abs() < 1e-12);
        assert!((hvac.query(&x) - hvac.query(&moved)).abs() < 1e-9);
    }
}
