//! Conic program integration tests: incremental edits followed by
//! standard-form export and residual checks.

use conic_core::{
    ConeSpec, ConeType, ConicProgram, ConicSolver, ConstraintSense, ProgramError, SolveStatus,
    StandardForm, StandardFormSolver,
};

/// min t  s.t.  (t, x, y) ∈ SOC(3),  x = 0.6,  y >= 0.8
fn build_norm_problem() -> (ConicProgram, [conic_core::VarId; 3]) {
    let mut program = ConicProgram::new();
    let cone = program.create_cone(ConeType::SecondOrderCone, 3).unwrap();
    let vars = program.cone_variables(cone).unwrap();
    let (t, x, y) = (vars[0], vars[1], vars[2]);
    program.set_objective_coefficient(t, 1.0).unwrap();

    let fix_x = program.create_constraint();
    program.set_variable(fix_x, x, 1.0).unwrap();
    program.set_rhs(fix_x, 0.6).unwrap();

    let bound_y = program.create_constraint_with(ConstraintSense::GreaterEqual);
    program.set_variable(bound_y, y, 1.0).unwrap();
    program.set_rhs(bound_y, 0.8).unwrap();

    (program, [t, x, y])
}

#[test]
fn test_norm_problem_export() {
    let (program, [t, x, y]) = build_norm_problem();
    let form = program.to_standard_form().unwrap();
    form.validate().unwrap();

    assert_eq!(form.num_vars(), 3);
    assert_eq!(
        form.cones,
        vec![
            ConeSpec::Zero { dim: 1 },
            ConeSpec::NonNeg { dim: 1 },
            ConeSpec::Soc { dim: 3 },
        ]
    );

    // Optimum t = ‖(0.6, 0.8)‖ = 1
    let mut point = vec![0.0; 3];
    for (j, &var) in form.columns.iter().enumerate() {
        point[j] = if var == t {
            1.0
        } else if var == x {
            0.6
        } else if var == y {
            0.8
        } else {
            unreachable!()
        };
    }
    assert!(form.max_residual(&point).unwrap() < 1e-12);
    assert!((form.objective(&point) - 1.0).abs() < 1e-12);

    // Shrinking t leaves the cone.
    let j = form.columns.iter().position(|&v| v == t).unwrap();
    point[j] = 0.9;
    assert!((form.max_residual(&point).unwrap() - 0.1).abs() < 1e-9);
}

#[test]
fn test_export_tracks_incremental_edits() {
    let (mut program, [t, x, y]) = build_norm_problem();
    let before = program.to_standard_form().unwrap();

    // The cone cannot go while its variables are still in constraints.
    let constraints: Vec<_> = program.constraints().collect();
    assert!(matches!(
        program.delete_cone(program.cone_of(t).unwrap()),
        Err(ProgramError::VariableInUse { .. })
    ));
    for con in constraints {
        program.delete_constraint(con).unwrap();
    }
    program.delete_cone(program.cone_of(x).unwrap()).unwrap();
    assert!(!program.has_variable(y));

    let extra = program.create_nonnegative_variable();
    program.set_objective_coefficient(extra, 2.0).unwrap();
    let after = program.to_standard_form().unwrap();
    after.validate().unwrap();

    assert_eq!(before.num_vars(), 3);
    assert_eq!(after.num_vars(), 1);
    assert_eq!(after.q, vec![2.0]);
    assert_eq!(after.cones, vec![ConeSpec::NonNeg { dim: 1 }]);
}

#[test]
fn test_solver_writes_values_back() {
    let (mut program, [t, x, y]) = build_norm_problem();

    let mut solver = StandardFormSolver::new("analytic", move |form: &StandardForm| {
        let x_sol = form
            .columns
            .iter()
            .map(|&var| {
                if var == t {
                    1.0
                } else if var == x {
                    0.6
                } else {
                    0.8
                }
            })
            .collect();
        Ok((SolveStatus::Optimal, x_sol))
    });

    let info = solver.solve(&mut program).unwrap();
    assert_eq!(info.status, SolveStatus::Optimal);
    assert!((info.obj_val - 1.0).abs() < 1e-12);
    assert!((program.objective_value() - 1.0).abs() < 1e-12);
    assert!((program.value(y).unwrap() - 0.8).abs() < 1e-12);
    assert!(program.is_feasible(1e-9));
}
