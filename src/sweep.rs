//! DC source sweeps.
//!
//! A `.DC <source> <start> <end> <step>` command arms a sweep over one
//! independent source. Each sample only perturbs the right-hand side of the
//! already assembled system; the matrix and its factorization are reused.
//! Running the sweep is [`Session::sweep`](crate::solver::Session::sweep).

use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::circuit::{Circuit, ElementKind, Group};
use crate::error::{Result, SpicyError};
use crate::netlist::parse_value;
use crate::solver::MnaSystem;

/// Slack added before flooring the sample count, so `end` itself is included.
const END_SLACK: f64 = 1e-9;

/// Upper bound on the samples of one sweep.
pub const MAX_SWEEP_SAMPLES: usize = 10_000_000;

/// The source a sweep drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTarget {
    /// Group-1 current source at `element`
    CurrentSource { element: usize },
    /// Group-2 voltage source at `element`, owning auxiliary row `row`
    VoltageSource { element: usize, row: usize },
}

/// A parsed, validated `.DC` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    /// Source name as written in the command
    pub source: String,
    pub target: SweepTarget,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SweepSpec {
    /// Parse `.DC <source> <start> <end> <step>` against `circuit`.
    ///
    /// Any problem with the command is a recoverable
    /// [`SpicyError::InvalidSweep`].
    pub fn parse(command: &str, circuit: &Circuit) -> Result<Self> {
        let invalid = |reason: String| SpicyError::invalid_sweep(command, reason);

        let tokens: Vec<&str> = command.split_whitespace().collect();
        match tokens.first() {
            Some(keyword) if keyword.eq_ignore_ascii_case(".DC") => {}
            _ => return Err(invalid("expected .DC".to_string())),
        }
        if tokens.len() < 5 {
            return Err(invalid(format!(
                "expected <source> <start> <end> <step>, got {} argument(s)",
                tokens.len() - 1
            )));
        }
        if tokens.len() > 5 {
            return Err(invalid(format!("unexpected argument '{}'", tokens[5])));
        }

        let source = tokens[1];
        let number = |text: &str, what: &str| {
            parse_value(text).ok_or_else(|| invalid(format!("invalid {} value '{}'", what, text)))
        };
        let start = number(tokens[2], "start")?;
        let end = number(tokens[3], "end")?;
        let step = number(tokens[4], "step")?;
        if step <= 0.0 {
            return Err(invalid(format!("step must be positive, got {}", step)));
        }
        let steps = (end - start) / step;
        if !steps.is_finite() || steps >= MAX_SWEEP_SAMPLES as f64 {
            return Err(invalid(format!(
                "sweep needs more than {} samples",
                MAX_SWEEP_SAMPLES
            )));
        }

        let target = Self::resolve(source, circuit)
            .ok_or_else(|| invalid(format!("no independent source named '{}'", source)))?;

        Ok(Self {
            source: source.to_string(),
            target,
            start,
            end,
            step,
        })
    }

    /// `I…` names a group-1 current source, `V…` a group-2 voltage source.
    fn resolve(source: &str, circuit: &Circuit) -> Option<SweepTarget> {
        match source.chars().next()?.to_ascii_uppercase() {
            'I' => circuit
                .find_in_group(Group::One, ElementKind::CurrentSource, source)
                .map(|element| SweepTarget::CurrentSource { element }),
            'V' => circuit
                .find_in_group(Group::Two, ElementKind::VoltageSource, source)
                .map(|element| SweepTarget::VoltageSource {
                    element,
                    row: circuit.aux_index(element),
                }),
            _ => None,
        }
    }

    /// Number of samples: `floor((end - start) / step) + 1`, zero when `end < start`.
    pub fn sample_count(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let steps = ((self.end - self.start) / self.step + END_SLACK).floor();
        (steps as usize).saturating_add(1)
    }

    /// Sample values `start + k·step`.
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.sample_count()).map(move |k| self.start + k as f64 * self.step)
    }

    /// Output file name for the sweep of `node`.
    pub fn output_file_name(&self, node: &str) -> String {
        format!("V({})_DC_{}.txt", node, self.source)
    }

    /// Move the swept source to `value` by editing the right-hand side.
    pub(crate) fn apply(&self, value: f64, system: &mut MnaSystem, circuit: &mut Circuit) {
        match self.target {
            SweepTarget::CurrentSource { element } => {
                let source = circuit.element_mut(Group::One, element);
                let p = source.pos.matrix_index();
                let m = source.neg.matrix_index();
                match &system.default_rhs {
                    Some(default) => {
                        system.rhs.copy_from(default);
                        shift_current(&mut system.rhs, p, m, source.op_point_value, value);
                    }
                    None => shift_current(&mut system.rhs, p, m, source.value, value),
                }
                source.set_value(value);
            }
            SweepTarget::VoltageSource { element, row } => {
                system.reset_rhs();
                system.rhs[row] = value;
                circuit.element_mut(Group::Two, element).set_value(value);
            }
        }
    }

    /// Put the swept source back to its operating-point value.
    pub(crate) fn restore(&self, circuit: &mut Circuit) {
        let (group, element) = match self.target {
            SweepTarget::CurrentSource { element } => (Group::One, element),
            SweepTarget::VoltageSource { element, .. } => (Group::Two, element),
        };
        circuit.element_mut(group, element).restore();
    }
}

/// Replace a current source contribution `from` with `to`.
fn shift_current(rhs: &mut DVector<f64>, p: Option<usize>, m: Option<usize>, from: f64, to: f64) {
    if let Some(p) = p {
        rhs[p] += from;
        rhs[p] -= to;
    }
    if let Some(m) = m {
        rhs[m] -= from;
        rhs[m] += to;
    }
}

/// One point of a sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSample {
    /// Source value
    pub value: f64,
    /// Voltage of the observed node
    pub voltage: f64,
}

/// Receiver of sweep samples, called once per solve.
pub trait SweepSink {
    fn record(&mut self, sample: SweepSample) -> Result<()>;
}

impl SweepSink for Vec<SweepSample> {
    fn record(&mut self, sample: SweepSample) -> Result<()> {
        self.push(sample);
        Ok(())
    }
}

/// Writes `value\t\tvoltage` records, one flushed line per sample.
pub struct SweepWriter<W: Write> {
    out: LineWriter<W>,
}

impl SweepWriter<File> {
    /// Create (or truncate) the record file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> SweepWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: LineWriter::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.out.into_inner().map_err(|e| e.into_error().into())
    }
}

impl<W: Write> SweepSink for SweepWriter<W> {
    fn record(&mut self, sample: SweepSample) -> Result<()> {
        writeln!(
            self.out,
            "{:.6}\t\t{}",
            sample.value,
            format_scientific(sample.voltage, 6)
        )?;
        Ok(())
    }
}

/// Scientific notation the way C's `%.<precision>e` prints it:
/// `1.500000e-03`, exponent signed and at least two digits.
pub fn format_scientific(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return value.to_string().to_lowercase();
    }
    let formatted = format!("{:.*e}", precision, value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}
