//! Analysis session: one circuit, one assembled system, one solver.

use nalgebra::DVector;

use super::direct::DirectSolver;
use super::iterative::{IterativeOutcome, IterativeSolver};
use super::system::MnaSystem;
use super::{DirectMethod, KrylovMethod, SolverMethod, SolverOptions};
use crate::circuit::{Circuit, NodeId};
use crate::error::Result;
use crate::sweep::{SweepSample, SweepSink, SweepSpec};

/// The solver chosen for the run.
#[derive(Debug)]
enum Backend {
    Direct(DirectSolver),
    Iterative(IterativeSolver),
}

/// Result of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// Node voltages followed by group-2 branch currents
    pub solution: DVector<f64>,
    /// Convergence data, for the Krylov backends
    pub iterative: Option<IterativeOutcome>,
}

/// Owns all mutable state of an analysis run.
///
/// The system is assembled and, for the direct methods, factorized once in
/// [`Session::new`]. Every later solve only reads the current right-hand
/// side.
#[derive(Debug)]
pub struct Session {
    circuit: Circuit,
    system: MnaSystem,
    backend: Backend,
    options: SolverOptions,
    solves: usize,
}

impl Session {
    /// Assemble `circuit` and prepare the solver selected by `options`.
    pub fn new(circuit: Circuit, options: SolverOptions) -> Result<Self> {
        let _span = tracing::info_span!(
            "session",
            method = %options.method,
            storage = ?options.storage
        )
        .entered();

        let system = MnaSystem::build(&circuit, options.storage)?;
        let backend = match options.method {
            SolverMethod::Lu => {
                Backend::Direct(DirectSolver::factorize(&system, DirectMethod::Lu)?)
            }
            SolverMethod::Cholesky => {
                Backend::Direct(DirectSolver::factorize(&system, DirectMethod::Cholesky)?)
            }
            SolverMethod::Cg => Backend::Iterative(IterativeSolver::new(
                &system,
                KrylovMethod::Cg,
                options.iterative_config(),
            )),
            SolverMethod::BiCg => Backend::Iterative(IterativeSolver::new(
                &system,
                KrylovMethod::BiCg,
                options.iterative_config(),
            )),
        };

        tracing::info!(dim = system.dim(), "session ready");
        Ok(Self {
            circuit,
            system,
            backend,
            options,
            solves: 0,
        })
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub fn system(&self) -> &MnaSystem {
        &self.system
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Number of solves run so far.
    pub fn solve_count(&self) -> usize {
        self.solves
    }

    /// Solve for the current right-hand side and write the node voltages
    /// back into the circuit.
    pub fn solve(&mut self) -> Result<SolveReport> {
        let report = match &mut self.backend {
            Backend::Direct(solver) => SolveReport {
                solution: solver.solve(&self.system.rhs)?,
                iterative: None,
            },
            Backend::Iterative(solver) => {
                let outcome = solver.solve(&self.system.matrix, &self.system.rhs)?;
                SolveReport {
                    solution: solver.solution().clone(),
                    iterative: Some(outcome),
                }
            }
        };

        self.circuit.apply_solution(&report.solution);
        self.solves += 1;
        Ok(report)
    }

    /// DC operating point with every source at its netlist value.
    pub fn operating_point(&mut self) -> Result<SolveReport> {
        let _span = tracing::info_span!("operating_point").entered();
        let report = self.solve()?;
        if let Some(outcome) = &report.iterative {
            tracing::debug!(
                iterations = outcome.iterations,
                residual = outcome.relative_residual,
                "operating point"
            );
        }
        Ok(report)
    }

    /// Run `spec`, reporting the voltage of `node` for every sample.
    ///
    /// The right-hand side and the swept source are restored afterwards,
    /// also when a solve or the sink fails. Returns the number of samples.
    pub fn sweep<S: SweepSink + ?Sized>(
        &mut self,
        spec: &SweepSpec,
        node: NodeId,
        sink: &mut S,
    ) -> Result<usize> {
        let _span = tracing::info_span!("dc_sweep", source = %spec.source, %node).entered();

        let snapshot = self.system.rhs.clone();
        let result = self.run_sweep(spec, node, sink);
        self.system.rhs.copy_from(&snapshot);
        spec.restore(&mut self.circuit);

        match &result {
            Ok(samples) => tracing::info!(samples, "sweep finished"),
            Err(e) => tracing::error!(error = %e, "sweep aborted"),
        }
        result
    }

    fn run_sweep<S: SweepSink + ?Sized>(
        &mut self,
        spec: &SweepSpec,
        node: NodeId,
        sink: &mut S,
    ) -> Result<usize> {
        let mut samples = 0;
        for value in spec.points() {
            spec.apply(value, &mut self.system, &mut self.circuit);
            self.solve()?;
            sink.record(SweepSample {
                value,
                voltage: self.circuit.voltage(node),
            })?;
            samples += 1;
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Element, ElementKind, Group};
    use crate::error::SpicyError;
    use crate::solver::StorageMode;
    use approx::assert_relative_eq;

    const ALL_METHODS: [SolverMethod; 4] = [
        SolverMethod::Lu,
        SolverMethod::Cholesky,
        SolverMethod::Cg,
        SolverMethod::BiCg,
    ];

    fn one_ohm_one_amp() -> Circuit {
        let mut c = Circuit::new();
        let n1 = c.add_node("1");
        c.add_element(
            Element::new(ElementKind::CurrentSource, "I1", NodeId::GROUND, n1, 1.0),
            Group::One,
        )
        .unwrap();
        c.add_element(
            Element::new(ElementKind::Resistor, "R1", n1, NodeId::GROUND, 1.0),
            Group::One,
        )
        .unwrap();
        c
    }

    fn series() -> Circuit {
        let mut c = Circuit::new();
        let n1 = c.add_node("1");
        let n2 = c.add_node("2");
        c.add_element(
            Element::new(ElementKind::CurrentSource, "I1", NodeId::GROUND, n1, 1.0),
            Group::One,
        )
        .unwrap();
        c.add_element(Element::new(ElementKind::Resistor, "R1", n1, n2, 1.0), Group::One)
            .unwrap();
        c.add_element(
            Element::new(ElementKind::Resistor, "R2", n2, NodeId::GROUND, 2.0),
            Group::One,
        )
        .unwrap();
        c
    }

    /// Resistor mesh, SPD, large enough for the Krylov methods to iterate.
    fn mesh() -> Circuit {
        let mut c = Circuit::new();
        let nodes: Vec<NodeId> = (1..=6).map(|i| c.add_node(&i.to_string())).collect();
        let mut add = |name: &str, pos: NodeId, neg: NodeId, value: f64| {
            c.add_element(Element::new(ElementKind::Resistor, name, pos, neg, value), Group::One)
                .unwrap();
        };
        add("R1", nodes[0], nodes[1], 1.0);
        add("R2", nodes[1], nodes[2], 2.0);
        add("R3", nodes[2], nodes[3], 1.5);
        add("R4", nodes[3], nodes[4], 3.0);
        add("R5", nodes[4], nodes[5], 0.5);
        add("R6", nodes[0], nodes[3], 4.0);
        add("R7", nodes[2], NodeId::GROUND, 10.0);
        add("R8", nodes[5], NodeId::GROUND, 1.0);
        c.add_element(
            Element::new(ElementKind::CurrentSource, "I1", NodeId::GROUND, nodes[0], 2.0),
            Group::One,
        )
        .unwrap();
        c.add_element(
            Element::new(ElementKind::CurrentSource, "I2", nodes[4], NodeId::GROUND, 0.5),
            Group::One,
        )
        .unwrap();
        c
    }

    fn options(storage: StorageMode, method: SolverMethod) -> SolverOptions {
        SolverOptions::new()
            .with_storage(storage)
            .with_method(method)
            .with_tolerance(1e-10)
            .with_breakdown_epsilon(1e-30)
    }

    #[test]
    fn test_one_ohm_one_amp() {
        let mut session = Session::new(one_ohm_one_amp(), SolverOptions::default()).unwrap();
        assert_eq!(session.system().rhs, DVector::from_element(1, 1.0));
        session.operating_point().unwrap();
        assert_relative_eq!(session.circuit().node_voltage("1").unwrap(), 1.0);
        assert_eq!(session.solve_count(), 1);
    }

    #[test]
    fn test_series_every_backend() {
        for storage in [StorageMode::Dense, StorageMode::Sparse] {
            for method in ALL_METHODS {
                let mut session = Session::new(series(), options(storage, method)).unwrap();
                let report = session.operating_point().unwrap();
                let krylov = matches!(method, SolverMethod::Cg | SolverMethod::BiCg);
                assert_eq!(report.iterative.is_some(), krylov);
                let circuit = session.circuit();
                assert_relative_eq!(circuit.node_voltage("1").unwrap(), 3.0, max_relative = 1e-6);
                assert_relative_eq!(circuit.node_voltage("2").unwrap(), 2.0, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_backends_agree_on_mesh() {
        let reference_options = options(StorageMode::Dense, SolverMethod::Lu);
        let mut reference = Session::new(mesh(), reference_options).unwrap();
        let expected = reference.operating_point().unwrap().solution;

        for storage in [StorageMode::Dense, StorageMode::Sparse] {
            for method in ALL_METHODS {
                let mut session = Session::new(mesh(), options(storage, method)).unwrap();
                let report = session.operating_point().unwrap();
                if let Some(outcome) = report.iterative {
                    assert!(outcome.converged, "{} / {:?}", method, storage);
                }
                assert_relative_eq!(report.solution, expected, epsilon = 1e-9, max_relative = 1e-6);
            }
        }
    }

    #[test]
    fn test_cholesky_rejects_voltage_source() {
        let mut c = series();
        let n1 = c.find_node("1").unwrap();
        c.add_element(
            Element::new(ElementKind::VoltageSource, "V1", n1, NodeId::GROUND, 1.0),
            Group::Two,
        )
        .unwrap();
        let result = Session::new(c, options(StorageMode::Dense, SolverMethod::Cholesky));
        assert!(matches!(result, Err(SpicyError::NotPositiveDefinite)));
    }

    #[test]
    fn test_zero_resistor_is_fatal() {
        let mut c = Circuit::new();
        let n1 = c.add_node("1");
        c.add_element(
            Element::new(ElementKind::Resistor, "R1", n1, NodeId::GROUND, 0.0),
            Group::One,
        )
        .unwrap();
        assert!(matches!(
            Session::new(c, SolverOptions::default()),
            Err(SpicyError::ZeroResistance { .. })
        ));
    }
}
