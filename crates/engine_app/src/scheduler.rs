//! Conflict detection and stage computation.
//!
//! Systems of one pipeline are grouped into **stages**. Systems within a
//! stage have no conflicts and may run in parallel. Stages execute
//! sequentially, with a write-back barrier between them.

use engine_system::SystemDescriptor;

/// A group of systems that can run in parallel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Indices into the slice passed to [`compute_stages`].
    pub system_indices: Vec<usize>,
}

/// Two systems conflict if one writes what the other accesses, one adds or
/// removes what the other depends on, or one is declared to run after the
/// other.
#[must_use]
pub fn conflicts(a: &SystemDescriptor, b: &SystemDescriptor) -> bool {
    a.requirements().conflicts_with(b.requirements()) || a.is_ordered_with(b)
}

/// For each system, the indices of earlier systems it conflicts with.
#[must_use]
pub fn conflict_graph(systems: &[&SystemDescriptor]) -> Vec<Vec<usize>> {
    systems
        .iter()
        .enumerate()
        .map(|(j, later)| (0..j).filter(|&i| conflicts(systems[i], later)).collect())
        .collect()
}

/// Computes execution stages from systems given in registration order.
///
/// Each system goes into the stage right after the latest stage holding an
/// earlier system it conflicts with, or into the first stage if there is
/// none. Conflicting systems therefore never share a stage and always run in
/// registration order.
#[must_use]
pub fn compute_stages(systems: &[&SystemDescriptor]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();
    let mut stage_of: Vec<usize> = Vec::with_capacity(systems.len());

    for (sys_idx, earlier) in conflict_graph(systems).into_iter().enumerate() {
        let stage = earlier.iter().map(|&i| stage_of[i] + 1).max().unwrap_or(0);
        if stage == stages.len() {
            stages.push(Stage { system_indices: Vec::new() });
        }
        stages[stage].system_indices.push(sys_idx);
        stage_of.push(stage);
    }

    stages
}

#[cfg(test)]
mod tests {
    use engine_component::{ComponentTypeId, RequirementSpec};

    use super::*;

    fn make_system(name: &str, reads: &[u64], writes: &[u64]) -> SystemDescriptor {
        let mut spec = RequirementSpec::new();
        for &r in reads {
            spec = spec.read(ComponentTypeId(r));
        }
        for &w in writes {
            spec = spec.write(ComponentTypeId(w));
        }
        SystemDescriptor::new(name, spec)
    }

    fn stages_of(systems: &[SystemDescriptor]) -> Vec<Vec<usize>> {
        let refs: Vec<&SystemDescriptor> = systems.iter().collect();
        compute_stages(&refs).into_iter().map(|s| s.system_indices).collect()
    }

    #[test]
    fn test_no_systems_no_stages() {
        assert!(compute_stages(&[]).is_empty());
    }

    #[test]
    fn test_single_system_one_stage() {
        let systems = vec![make_system("physics", &[1], &[2])];
        assert_eq!(stages_of(&systems), vec![vec![0]]);
    }

    #[test]
    fn test_non_conflicting_systems_same_stage() {
        // Physics: reads Transform(1), writes Velocity(2)
        // AI: reads Transform(1), writes AiState(3)
        let systems = vec![make_system("physics", &[1], &[2]), make_system("ai", &[1], &[3])];
        assert_eq!(stages_of(&systems), vec![vec![0, 1]], "non-conflicting systems should share a stage");
    }

    #[test]
    fn test_conflicting_systems_different_stages() {
        // Physics: reads Transform(1), writes Velocity(2)
        // Movement: reads Velocity(2), writes Transform(1)
        let systems = vec![make_system("physics", &[1], &[2]), make_system("movement", &[2], &[1])];
        assert_eq!(stages_of(&systems).len(), 2, "conflicting systems must be in separate stages");
    }

    #[test]
    fn test_physics_ai_movement_stages() {
        //   Physics  - reads Transform(1), writes Velocity(2)
        //   AI       - reads Transform(1), writes AiState(3)
        //   Movement - reads Velocity(2), writes Transform(1)
        let systems = vec![
            make_system("physics", &[1], &[2]),
            make_system("ai", &[1], &[3]),
            make_system("movement", &[2], &[1]),
        ];
        assert_eq!(stages_of(&systems), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_later_reader_never_overtakes_writer() {
        // A greedy first-fit would put the second reader next to the first
        // one, ahead of the writer registered before it.
        let systems = vec![
            make_system("read_a", &[1], &[]),
            make_system("write", &[], &[1]),
            make_system("read_b", &[1], &[]),
        ];
        assert_eq!(stages_of(&systems), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_unrelated_system_stays_in_first_stage() {
        let systems = vec![
            make_system("a", &[], &[1]),
            make_system("b", &[1], &[]),
            make_system("c", &[5], &[6]),
        ];
        assert_eq!(stages_of(&systems), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_ordering_constraint_forces_new_stage() {
        let systems = vec![
            make_system("spawn", &[1], &[]),
            make_system("report", &[2], &[]).after("spawn"),
        ];
        assert_eq!(stages_of(&systems), vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_structural_changes_conflict_with_dependents() {
        let spawner = SystemDescriptor::new("spawner", RequirementSpec::new().adds(ComponentTypeId(7)));
        let reader = make_system("reader", &[7], &[]);
        let graph = conflict_graph(&[&spawner, &reader]);
        assert_eq!(graph, vec![vec![], vec![0]]);
    }
}
