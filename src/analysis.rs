//! Command executor for `.DC` / `.PLOT` / `.PRINT` lines.
//!
//! Commands are read in netlist order. `.DC` arms a sweep; every following
//! `.PLOT V(node)` (or `.PRINT`) runs the armed sweep once and writes the
//! node's voltage curve to `V(<node>)_DC_<source>.txt`. A malformed command
//! is logged and skipped; anything else that fails ends the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::circuit::{Circuit, NodeId};
use crate::error::{Result, SpicyError};
use crate::solver::Session;
use crate::sweep::{format_scientific, SweepSpec, SweepWriter};

/// Name of the operating-point dump.
pub const OPERATING_POINT_FILE: &str = "nodes_op_point_all.txt";

/// Run `commands` against `session`, writing sweep records into `output_dir`.
///
/// Returns the files written, in order.
pub fn execute_commands(
    session: &mut Session,
    commands: &[String],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut armed: Option<SweepSpec> = None;
    let mut written = Vec::new();

    for command in commands {
        let keyword = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        let outcome = match keyword.as_str() {
            ".DC" => SweepSpec::parse(command, session.circuit()).map(|spec| {
                tracing::info!(source = %spec.source, samples = spec.sample_count(), "sweep armed");
                armed = Some(spec);
            }),
            ".PLOT" | ".PRINT" => match &armed {
                Some(spec) => run_plot(session, spec, command, output_dir)
                    .map(|mut files| written.append(&mut files)),
                None => Err(SpicyError::invalid_plot(
                    command.as_str(),
                    "no .DC sweep before this command",
                )),
            },
            _ => Err(SpicyError::invalid_plot(command.as_str(), "unsupported command")),
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => {
                tracing::error!(error = %e, "skipping command");
                if keyword == ".DC" {
                    armed = None;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Ok(written)
}

/// Run the armed sweep once per node named in a plot command.
fn run_plot(
    session: &mut Session,
    spec: &SweepSpec,
    command: &str,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let nodes = parse_plot(command, session.circuit())?;
    let mut files = Vec::with_capacity(nodes.len());
    for (name, node) in nodes {
        let path = output_dir.join(spec.output_file_name(&name));
        let mut writer = SweepWriter::create(&path)?;
        session.sweep(spec, node, &mut writer)?;
        tracing::info!(path = %path.display(), "sweep written");
        files.push(path);
    }
    Ok(files)
}

/// Parse `.PLOT V(<node>) [V(<node>) ...]` into resolved nodes.
pub fn parse_plot(command: &str, circuit: &Circuit) -> Result<Vec<(String, NodeId)>> {
    let mut tokens = command.split_whitespace();
    tokens.next();

    let mut nodes = Vec::new();
    for token in tokens {
        let name = token
            .strip_suffix(')')
            .and_then(|t| t.strip_prefix("V(").or_else(|| t.strip_prefix("v(")))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                SpicyError::invalid_plot(command, format!("expected V(<node>), got '{}'", token))
            })?;
        let node = circuit
            .find_node(name)
            .ok_or_else(|| SpicyError::invalid_plot(command, format!("unknown node '{}'", name)))?;
        nodes.push((name.to_string(), node));
    }

    if nodes.is_empty() {
        return Err(SpicyError::invalid_plot(command, "no node to plot"));
    }
    Ok(nodes)
}

/// Write `name\t\tvoltage` for every non-ground node.
pub fn write_operating_point<W: Write>(circuit: &Circuit, mut out: W) -> Result<()> {
    for node in circuit.nodes.iter().skip(1) {
        writeln!(out, "{}\t\t{}", node.name, format_scientific(node.voltage, 5))?;
    }
    out.flush()?;
    Ok(())
}

/// Solve the operating point and dump it to [`OPERATING_POINT_FILE`] in `output_dir`.
pub fn dump_operating_point(session: &mut Session, output_dir: &Path) -> Result<PathBuf> {
    session.operating_point()?;
    let path = output_dir.join(OPERATING_POINT_FILE);
    let file = File::create(&path)?;
    write_operating_point(session.circuit(), BufWriter::new(file))?;
    tracing::info!(path = %path.display(), "operating point written");
    Ok(path)
}
