//! Group listening apparatus simulation
//!
//! Computes how strongly a noise source is received when the compensator is
//! turned to a given angle, and produces a gnuplot command showing every
//! hydrophone signal.

use anyhow::{Context, Result};
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

use crate::config::SonarConfig;

/// Speed of sound in water, m/s
pub const SPEED_OF_SOUND: f64 = 1465.0;
/// Hydrophones per side, numbered bow to aft
pub const HYDROPHONES: usize = 12;
/// Distance between hydrophone membrane centres, m
pub const HYDROPHONE_SPACING: f64 = 0.2;
/// Electrical delay per strip line, s
pub const STRIP_DELAY: f64 = 0.000017;
/// Number of strip lines; line 0 is at the bottom and has no delay
pub const STRIP_LINES: usize = 100;
/// Field of view of one hydrophone, degrees
pub const HYDROPHONE_FOV: f64 = 180.0;
pub const FOV_CENTER_FIRST: f64 = 24.0;
pub const FOV_CENTER_DELTA: f64 = 12.0;

/// Compensator angle used when none is given
pub const DEFAULT_APPARATUS_ANGLE: f64 = 60.0;

/// Command file written for gnuplot
pub const GNUPLOT_FILE: &str = "gnuplotcmd.txt";

/// Signal delay between neighbouring hydrophones for a signal from 0°
pub fn hydrophone_delta_t() -> f64 {
    HYDROPHONE_SPACING / SPEED_OF_SOUND
}

/// Distance between two hydrophone contacts on the strip line array, in lines
pub fn contact_distance() -> f64 {
    hydrophone_delta_t() / STRIP_DELAY
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hydrophone {
    pub index: usize,
    pub fov_center: f64,
    pub rel_angle: f64,
    pub strength: f64,
    /// Contact position relative to the centre of the strip array
    pub y: f64,
    pub strip_line: i64,
    pub strip_delay: f64,
    /// Total delay of this hydrophone's output signal
    pub signal_delay: f64,
    /// Phase shift of the output signal in plot units
    pub phase: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SonarReport {
    pub hydrophones: Vec<Hydrophone>,
    /// Sum of all strength factors
    pub max_strength: f64,
    pub min: f64,
    pub max: f64,
    pub plot_command: String,
}

impl SonarReport {
    /// Minimum and maximum of the summed signal relative to `max_strength`
    pub fn percentages(&self) -> (f64, f64) {
        if self.max_strength == 0.0 {
            return (0.0, 0.0);
        }
        (self.min / self.max_strength, self.max / self.max_strength)
    }
}

/// Simulate the apparatus turned to `app_angle` degrees.
pub fn simulate(app_angle: f64, config: &SonarConfig) -> SonarReport {
    let delta_t = hydrophone_delta_t();
    let distance = contact_distance();
    let all_contacts = distance * (HYDROPHONES - 1) as f64;
    let time_scale = 2.0 * PI * config.noise_freq;
    let app_rad = app_angle.to_radians();
    let signal_delta_t = config.signal_angle.to_radians().cos() * delta_t;

    let mut signal = vec![0.0; config.samples];
    let mut max_strength = 0.0;
    let mut hydrophones = Vec::with_capacity(HYDROPHONES);

    for i in 0..HYDROPHONES {
        let fov_center = FOV_CENTER_FIRST + i as f64 * FOV_CENTER_DELTA;
        let rel_angle = config.signal_angle - fov_center;
        let strength = if rel_angle.abs() > HYDROPHONE_FOV / 2.0 {
            0.0
        } else {
            rel_angle.to_radians().cos()
        };
        max_strength += strength;

        let y = (all_contacts / 2.0 - distance * i as f64) * app_rad.cos();
        let strip_line = (y + (STRIP_LINES / 2) as f64) as i64;
        let strip_delay = STRIP_DELAY * strip_line as f64;
        let signal_delay = strip_delay + i as f64 * signal_delta_t;
        let phase = time_scale * signal_delay;

        let samples = signal.len() as f64;
        for (x, value) in signal.iter_mut().enumerate() {
            *value += strength * (x as f64 * 2.0 * PI / samples + phase).sin();
        }

        hydrophones.push(Hydrophone {
            index: i,
            fov_center,
            rel_angle,
            strength,
            y,
            strip_line,
            strip_delay,
            signal_delay,
            phase,
        });
    }

    let min = signal.iter().copied().fold(0.0, f64::min);
    let max = signal.iter().copied().fold(0.0, f64::max);
    let plot_command = plot_command(max_strength, &hydrophones);

    SonarReport {
        hydrophones,
        max_strength,
        min,
        max,
        plot_command,
    }
}

/// `plot [x=0:7] <max>*sin(x),<s0>*sin(x+<p0>),...`
fn plot_command(max_strength: f64, hydrophones: &[Hydrophone]) -> String {
    let mut cmd = format!("plot [x=0:7] {}*sin(x)", max_strength);
    for h in hydrophones {
        let _ = write!(cmd, ",{}*sin(x", h.strength);
        if h.phase < 0.0 {
            let _ = write!(cmd, "{})", h.phase);
        } else {
            let _ = write!(cmd, "+{})", h.phase);
        }
    }
    cmd
}

/// Run the simulation and log its diagnostics.
///
/// Without an explicit angle the plot command is also written to
/// [`GNUPLOT_FILE`] in `dir` and gnuplot is started on it.
pub fn run(angle: Option<f64>, config: &SonarConfig, dir: &Path) -> Result<SonarReport> {
    let app_angle = angle.unwrap_or(DEFAULT_APPARATUS_ANGLE);
    tracing::info!(
        "delta_t={} contact distance={} lines",
        hydrophone_delta_t(),
        contact_distance()
    );

    let report = simulate(app_angle, config);
    for h in &report.hydrophones {
        tracing::info!(
            "hydro_nr={} fovcenter={} rel_angle={} strfac={} y={} y_line={} signaldelay={}",
            h.index,
            h.fov_center,
            h.rel_angle,
            h.strength,
            h.y,
            h.strip_line,
            h.signal_delay
        );
    }

    let (min_pct, max_pct) = report.percentages();
    tracing::info!("minv={}, maxv={}", report.min, report.max);
    tracing::info!("percentage of full signal: min={}, max={}", min_pct, max_pct);
    println!("{}", report.plot_command);

    if angle.is_none() {
        let path = dir.join(GNUPLOT_FILE);
        std::fs::write(&path, &report.plot_command)
            .with_context(|| format!("Failed to write plot command: {:?}", path))?;

        match Command::new("gnuplot").arg(&path).arg("-").status() {
            Ok(status) if !status.success() => {
                tracing::warn!("gnuplot exited with {}", status);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not run gnuplot: {}", e),
        }
    }

    Ok(report)
}
