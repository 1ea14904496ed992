use crate::core::energy::EnergyFunction;
use crate::core::models::assignment::Assignment;
use crate::core::models::pose::Pose;
use crate::core::rotamers::library::RotamerLibrary;
use crate::engine::annealer::{AnnealOutcome, Annealer};
use crate::engine::error::EngineError;
use crate::engine::graph::InteractionGraph;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::rotamer_set::RotamerSets;
use crate::engine::task::PackerTask;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, thread_rng};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct PackResult {
    /// The winning state per position, complete over the whole pose.
    pub assignment: Assignment,
    /// Energy of the part of the problem the optimizer could influence.
    pub optimization_score: f64,
    /// Optimization score plus the constant fixed-background offset.
    pub total_energy: f64,
    pub outcome: AnnealOutcome,
}

/// Run one complete packing job: validate the task, enumerate rotamer sets,
/// build the interaction graph, anneal, and write the winning rotamers back
/// to the pose. Fixed positions are never touched.
#[instrument(skip_all, name = "packing_workflow")]
pub fn run(
    pose: &mut dyn Pose,
    task: &PackerTask,
    library: &dyn RotamerLibrary,
    energy: &dyn EnergyFunction,
    reporter: &ProgressReporter,
) -> Result<PackResult, EngineError> {
    // === Phase 0: Validation ===
    reporter.report(Progress::PhaseStart { name: "Validation" });
    task.validate()?;
    if task.len() != pose.len() {
        return Err(EngineError::TaskMismatch {
            task_len: task.len(),
            pose_len: pose.len(),
        });
    }
    info!(
        positions = task.len(),
        packable = task.num_to_be_packed(),
        design = task.design_any(),
        "Starting packing workflow"
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Rotamer set construction ===
    reporter.report(Progress::PhaseStart {
        name: "Building Rotamer Sets",
    });
    let sets = RotamerSets::build(&*pose, task, library, energy)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Interaction graph construction ===
    reporter.report(Progress::PhaseStart {
        name: "Building Interaction Graph",
    });
    let mut graph = InteractionGraph::build(&sets, energy, task.graph())?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Fixed-background offset ===
    // Pairs of fixed positions carry no graph edge; their pairwise energy is
    // a constant computed once here.
    let energy_offset = fixed_background_offset(&sets, energy);

    // === Phase 4: Simulated annealing ===
    reporter.report(Progress::PhaseStart { name: "Annealing" });
    let seed = task.seed().unwrap_or_else(|| thread_rng().r#gen());
    info!(seed, "Seeding the annealer");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut annealer = Annealer::new(task.annealer(), task.record_history());
    let outcome = annealer.run(&mut graph, &mut rng, reporter);
    reporter.report(Progress::PhaseFinish);

    // === Phase 5: Apply the winning assignment ===
    for position in 0..sets.len() {
        let set = sets.position(position);
        if set.packable() {
            pose.apply_rotamer(position, set.rotamer(outcome.best_assignment[position]));
        }
    }

    let optimization_score = outcome.best_energy;
    let total_energy = optimization_score + energy_offset;
    let assignment = Assignment::from_states(outcome.best_assignment.clone());

    info!(
        optimization_score,
        total_energy,
        stalled = outcome.stalled,
        "Packing workflow complete"
    );
    Ok(PackResult {
        assignment,
        optimization_score,
        total_energy,
        outcome,
    })
}

fn fixed_background_offset(sets: &RotamerSets, energy: &dyn EnergyFunction) -> f64 {
    (0..sets.len())
        .filter(|&p| !sets.position(p).packable())
        .tuple_combinations()
        .filter(|&(a, b)| energy.positions_interact(a, b))
        .map(|(a, b)| energy.two_body(sets.position(a).rotamer(0), sets.position(b).rotamer(0)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{MapLibrary, TableEnergy, two_site};
    use crate::core::rotamers::rotamer::GeometryHandle;
    use crate::engine::task::PackerTask;

    #[test]
    fn packs_the_two_site_scenario_to_its_optimum() {
        let mut scenario = two_site();
        let task = PackerTask::builder(2).seed(21).build().unwrap();

        let result = run(
            &mut scenario.pose,
            &task,
            &scenario.library,
            &scenario.energy,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert!(result.assignment.is_complete());
        assert_eq!(result.assignment.as_complete(), Some(vec![0, 0]));
        assert!(result.optimization_score.abs() < 1e-9);
        // No fixed-fixed pairs, so the offset is zero.
        assert_eq!(result.total_energy, result.optimization_score);
        // The winning geometries were written back.
        assert_eq!(scenario.pose.applied[0], Some(GeometryHandle(1)));
        assert_eq!(scenario.pose.applied[1], Some(GeometryHandle(11)));
    }

    #[test]
    fn identical_seeds_give_identical_results() {
        let task = PackerTask::builder(2)
            .seed(99)
            .record_history(true)
            .start_from_current(true)
            .build()
            .unwrap();

        let mut first = two_site();
        let a = run(
            &mut first.pose,
            &task,
            &first.library,
            &first.energy,
            &ProgressReporter::new(),
        )
        .unwrap();

        let mut second = two_site();
        let b = run(
            &mut second.pose,
            &task,
            &second.library,
            &second.energy,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(a.assignment, b.assignment);
        assert_eq!(a.total_energy, b.total_energy);
        assert_eq!(a.outcome.history, b.outcome.history);
    }

    #[test]
    fn fixed_positions_are_never_rewritten() {
        let mut scenario = two_site();
        let mut task = PackerTask::new(2);
        task.prevent_repacking(0);

        let result = run(
            &mut scenario.pose,
            &task,
            &scenario.library,
            &scenario.energy,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(scenario.pose.applied[0], None);
        assert!(scenario.pose.applied[1].is_some());
        // A stays fixed at a2; B's best response is b1.
        assert!((result.total_energy - 6.0).abs() < 1e-9);
    }

    #[test]
    fn fully_fixed_pose_reports_the_background_energy() {
        let mut scenario = two_site();
        let mut task = PackerTask::new(2);
        task.prevent_repacking(0);
        task.prevent_repacking(1);

        let result = run(
            &mut scenario.pose,
            &task,
            &scenario.library,
            &scenario.energy,
            &ProgressReporter::new(),
        )
        .unwrap();

        // One-body 5 + 2 through the graph, pairwise E(a2, b2) = 1 through
        // the fixed-background offset.
        assert!((result.optimization_score - 7.0).abs() < 1e-9);
        assert!((result.total_energy - 8.0).abs() < 1e-9);
        assert_eq!(scenario.pose.applied, vec![None, None]);
    }

    #[test]
    fn task_length_mismatch_is_rejected_before_any_work() {
        let mut scenario = two_site();
        let task = PackerTask::new(5);
        let err = run(
            &mut scenario.pose,
            &task,
            &scenario.library,
            &scenario.energy,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::TaskMismatch { .. }));
    }

    #[test]
    fn empty_rotamer_set_errors_propagate() {
        let mut scenario = two_site();
        let empty_library = MapLibrary::new();
        let task = PackerTask::new(2);
        let err = run(
            &mut scenario.pose,
            &task,
            &empty_library,
            &scenario.energy,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::EmptyRotamerSet { position: 0 }));
    }

    #[test]
    fn progress_phases_are_balanced() {
        use std::sync::Mutex;
        let events = Mutex::new((0usize, 0usize));
        let reporter = ProgressReporter::with_callback(Box::new(|event| match event {
            Progress::PhaseStart { .. } => events.lock().unwrap().0 += 1,
            Progress::PhaseFinish => events.lock().unwrap().1 += 1,
            _ => {}
        }));

        let mut scenario = two_site();
        let task = PackerTask::builder(2).seed(1).build().unwrap();
        run(
            &mut scenario.pose,
            &task,
            &scenario.library,
            &scenario.energy,
            &reporter,
        )
        .unwrap();

        let (starts, finishes) = *events.lock().unwrap();
        assert_eq!(starts, 4);
        assert_eq!(starts, finishes);
    }

    #[test]
    fn designable_position_can_switch_identity() {
        use crate::core::fixtures::VecPose;
        use crate::core::models::pose::ResidueIdentity;

        let mut pose = VecPose::new(&["ALA", "SER"], &[1, 11]);
        let mut library = MapLibrary::new();
        library.add(0, "ALA", &[1]);
        library.add(0, "TRP", &[30]);
        library.add(1, "SER", &[11]);

        let mut energy = TableEnergy::new();
        energy.set_one_body(0, 1, 4.0);
        energy.set_one_body(0, 30, 0.0);

        let mut task = PackerTask::builder(2).seed(3).build().unwrap();
        task.allow_identity(0, ResidueIdentity::from("ALA"));
        task.allow_identity(0, ResidueIdentity::from("TRP"));

        let result = run(
            &mut pose,
            &task,
            &library,
            &energy,
            &ProgressReporter::new(),
        )
        .unwrap();

        // The TRP candidate wins on one-body energy.
        assert_eq!(pose.applied[0], Some(GeometryHandle(30)));
        assert!(result.total_energy.abs() < 1e-9);
    }
}
