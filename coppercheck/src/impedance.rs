//! Closed-form characteristic impedance approximations.
//!
//! Hammerstad-style formulas for microstrip and stripline traces. These are
//! screening formulas: O(1) per trace, a few percent off a field solver,
//! which is what a DRC pass wants when it has thousands of nets to grade.
//!
//! All length inputs are in meters; only ratios enter the formulas, so any
//! consistent unit works. Outputs are ohms.

use std::f64::consts::PI;

/// Trace topology relative to its reference planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTopology {
    /// Outer-layer trace over a single reference plane.
    Microstrip,
    /// Buried trace between reference planes.
    Stripline,
}

/// Cross-section parameters of a single trace.
#[derive(Debug, Clone, Copy)]
pub struct TraceCrossSection {
    /// Trace width.
    pub width: f64,
    /// Copper thickness.
    pub thickness: f64,
    /// Dielectric height to the reference plane.
    pub height: f64,
    /// Relative permittivity of the surrounding dielectric.
    pub permittivity: f64,
}

/// Odd-mode coupling coefficients (c1, c2) in `1 - c1 * exp(-c2 * s/w)`.
const MICROSTRIP_COUPLING: (f64, f64) = (0.48, 0.96);
const STRIPLINE_COUPLING: (f64, f64) = (0.347, 1.2);

/// Single-ended microstrip impedance:
/// `Z0 = 87/sqrt(er + 1.41) * ln(5.98*h / (0.8*w + t))`.
pub fn microstrip_z0(xs: &TraceCrossSection) -> f64 {
    87.0 / (xs.permittivity + 1.41).sqrt()
        * (5.98 * xs.height / (0.8 * xs.width + xs.thickness)).ln()
}

/// Single-ended stripline impedance:
/// `Z0 = 60/sqrt(er) * ln(4*h / (0.67*pi*(0.8*w + t)))`.
pub fn stripline_z0(xs: &TraceCrossSection) -> f64 {
    60.0 / xs.permittivity.sqrt()
        * (4.0 * xs.height / (0.67 * PI * (0.8 * xs.width + xs.thickness))).ln()
}

/// Single-ended impedance for the given topology.
pub fn single_ended_z0(topology: TraceTopology, xs: &TraceCrossSection) -> f64 {
    match topology {
        TraceTopology::Microstrip => microstrip_z0(xs),
        TraceTopology::Stripline => stripline_z0(xs),
    }
}

/// Odd-mode impedance of one leg of a coupled pair with edge gap `gap`.
pub fn odd_mode_z0(topology: TraceTopology, xs: &TraceCrossSection, gap: f64) -> f64 {
    let (c1, c2) = match topology {
        TraceTopology::Microstrip => MICROSTRIP_COUPLING,
        TraceTopology::Stripline => STRIPLINE_COUPLING,
    };
    let z0 = single_ended_z0(topology, xs);
    z0 * (1.0 - c1 * (-c2 * gap / xs.width).exp())
}

/// Differential impedance of a coupled pair: `Zdiff = 2 * Zodd`.
pub fn differential_impedance(topology: TraceTopology, xs: &TraceCrossSection, gap: f64) -> f64 {
    2.0 * odd_mode_z0(topology, xs, gap)
}

/// Relative deviation from a target, in percent.
pub fn deviation_percent(value: f64, target: f64) -> f64 {
    ((value - target) / target).abs() * 100.0
}
