//! Whole-unit scenarios for the zero-order aeration basin.

use std::rc::Rc;

use approx::assert_abs_diff_eq;
use aquasheet::core::database::Database;
use aquasheet::core::solver::{NewtonSolver, SolverOptions};
use aquasheet::core::variable::VarPool;
use aquasheet::models::UnitModel;
use aquasheet::models::zero_order::aeration_basin::{AerationBasin, AerationBasinConfig};
use aquasheet::properties::water::WaterPropertyPackage;

fn build_unit(solutes: &[&str]) -> (VarPool, AerationBasin) {
    let pool = VarPool::new();
    let config = AerationBasinConfig {
        name: "fs.unit".into(),
        property_package: Some(Rc::new(WaterPropertyPackage::new(solutes.iter().copied()))),
        process_subtype: None,
    };
    let unit = AerationBasin::build(&pool, config).unwrap();
    (pool, unit)
}

#[test]
fn two_solute_scenario() {
    let (pool, mut unit) = build_unit(&["viruses_enteric", "bod"]);
    unit.fix_inlet_flow("H2O", 10.0).unwrap();
    unit.fix_inlet_flow("viruses_enteric", 1.0).unwrap();
    unit.fix_inlet_flow("bod", 1.0).unwrap();
    unit.load_parameters_from_database(&Database::new(), false)
        .unwrap();
    assert_eq!(unit.equations().degrees_of_freedom(), 0);

    unit.calculate_scaling_factors();
    let outcome = unit.initialize(&NewtonSolver::new(), &SolverOptions::default());
    assert!(outcome.status.is_optimal());

    let sido = unit.sido();
    assert_abs_diff_eq!(sido.inlet_flow_vol(), 0.012, epsilon = 1e-9);
    assert_abs_diff_eq!(sido.treated_state().flow_vol(&pool), 0.0103100, epsilon = 1e-6);
    assert_abs_diff_eq!(sido.byproduct_state().flow_vol(&pool), 0.0016900, epsilon = 1e-6);
    assert_abs_diff_eq!(pool.get(unit.electricity()), 17.80995, epsilon = 1e-5);
    assert_abs_diff_eq!(
        pool.get(unit.energy_electric_flow_vol_inlet()),
        0.4122673611111111,
        epsilon = 1e-12
    );

    // Component conservation.
    for comp in ["H2O", "viruses_enteric", "bod"] {
        let inlet = pool.get(sido.inlet_state().flow_mass(comp).unwrap());
        let treated = pool.get(sido.treated_state().flow_mass(comp).unwrap());
        let byproduct = pool.get(sido.byproduct_state().flow_mass(comp).unwrap());
        assert_abs_diff_eq!(inlet, treated + byproduct, epsilon = 1e-6);
    }
}

#[test]
fn three_solute_scenario_with_unlisted_solute() {
    let (pool, mut unit) = build_unit(&["viruses_enteric", "bod", "foo"]);
    unit.fix_inlet_flow("H2O", 10.0).unwrap();
    unit.fix_inlet_flow("viruses_enteric", 1.0).unwrap();
    unit.fix_inlet_flow("bod", 1.0).unwrap();
    unit.fix_inlet_flow("foo", 1.0).unwrap();

    // "foo" has no recorded removal fraction; without the opt-in the load
    // fails, with it the default removal of zero applies.
    assert!(
        unit.load_parameters_from_database(&Database::new(), false)
            .is_err()
    );
    unit.load_parameters_from_database(&Database::new(), true)
        .unwrap();
    assert_eq!(unit.equations().degrees_of_freedom(), 0);

    unit.calculate_scaling_factors();
    let outcome = unit.initialize(&NewtonSolver::new(), &SolverOptions::default());
    assert!(outcome.status.is_optimal());

    let sido = unit.sido();
    assert_abs_diff_eq!(sido.inlet_flow_vol(), 0.013, epsilon = 1e-9);
    assert_abs_diff_eq!(sido.treated_state().flow_vol(&pool), 0.011310, epsilon = 1e-6);
    assert_abs_diff_eq!(pool.get(unit.electricity()), 19.29411198, epsilon = 1e-5);

    // Zero removal passes "foo" straight through to the treated stream.
    let treated_foo = pool.get(sido.treated_state().flow_mass("foo").unwrap());
    assert_abs_diff_eq!(treated_foo, 1.0, epsilon = 1e-6);
    let byproduct_foo = pool.get(sido.byproduct_state().flow_mass("foo").unwrap());
    assert_abs_diff_eq!(byproduct_foo, 0.0, epsilon = 1e-6);
}

#[test]
fn report_matches_the_fixed_format() {
    let (pool, unit) = build_unit(&["viruses_enteric", "bod"]);
    unit.fix_inlet_flow("H2O", 10.0).unwrap();
    unit.fix_inlet_flow("viruses_enteric", 1.0).unwrap();
    unit.fix_inlet_flow("bod", 1.0).unwrap();
    unit.load_parameters_from_database(&Database::new(), false)
        .unwrap();

    // Put the unit at its solved state so the rendered values are exact. Full
    // water recovery leaves a trace of H2O in the byproduct, visible in the
    // stream table as a concentration in scientific notation.
    let sido = unit.sido();
    let trace_h2o = 4.7337e-7 * 0.0016900;
    pool.set(sido.treated_state().flow_mass("H2O").unwrap(), 10.0 - trace_h2o);
    pool.set(sido.treated_state().flow_mass("viruses_enteric").unwrap(), 0.01);
    pool.set(sido.treated_state().flow_mass("bod").unwrap(), 0.3);
    pool.set(sido.byproduct_state().flow_mass("H2O").unwrap(), trace_h2o);
    pool.set(sido.byproduct_state().flow_mass("viruses_enteric").unwrap(), 0.99);
    pool.set(sido.byproduct_state().flow_mass("bod").unwrap(), 0.7);
    pool.set(unit.electricity(), 17.80995);

    let expected = concat!(
        "\n",
        "====================================================================================\n",
        "Unit : fs.unit                                                             Time: 0.0\n",
        "------------------------------------------------------------------------------------\n",
        "\x20   Unit Performance\n",
        "\n",
        "\x20   Variables: \n",
        "\n",
        "\x20   Key                              : Value   : Fixed : Bounds\n",
        "\x20                 Electricity Demand :  17.810 : False : (None, None)\n",
        "\x20              Electricity Intensity : 0.41227 :  True : (None, None)\n",
        "\x20               Solute Removal [bod] : 0.70000 :  True : (0, None)\n",
        "\x20   Solute Removal [viruses_enteric] : 0.99000 :  True : (0, None)\n",
        "\x20                     Water Recovery :  1.0000 :  True : (1e-08, 1.0000001)\n",
        "\n",
        "------------------------------------------------------------------------------------\n",
        "\x20   Stream Table\n",
        "\x20                                        Inlet   Treated  Byproduct\n",
        "\x20   Volumetric Flowrate                0.012000 0.010310  0.0016900\n",
        "\x20   Mass Concentration H2O               833.33   969.93 4.7337e-07\n",
        "\x20   Mass Concentration viruses_enteric   83.333  0.96993     585.80\n",
        "\x20   Mass Concentration bod               83.333   29.098     414.20\n",
        "====================================================================================\n",
    );

    assert_eq!(unit.report(), expected);
}
