//! Flowsheet-level scenarios: a pump-fed membrane train with an energy
//! recovery device, costed end to end.

use std::rc::Rc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use aquasheet::core::solver::{NewtonSolver, SolverOptions};
use aquasheet::costing::CostingParams;
use aquasheet::flowsheet::Flowsheet;
use aquasheet::models::UnitModel;
use aquasheet::models::pressure_exchanger::PressureExchanger;
use aquasheet::models::pump::{Pump, PumpType};
use aquasheet::models::reverse_osmosis::{MembraneType, ReverseOsmosis0D};
use aquasheet::properties::seawater::SimpleSeawater;

const SOLVER_OPTIONS: SolverOptions = SolverOptions {
    max_iters: 50,
    residual_tol: 1e-10,
    fd_step: 1e-7,
};

/// Pump feeding a reverse-osmosis unit through a port connection, plus a
/// stand-alone pressure exchanger, all costed.
fn build_train(fs: &mut Flowsheet, params: &Rc<CostingParams>) -> (Pump, ReverseOsmosis0D) {
    let mut pump = Pump::build(
        fs.pool(),
        "fs.pump",
        PumpType::HighPressure,
        Rc::new(SimpleSeawater),
    );
    let mut ro = ReverseOsmosis0D::build(
        fs.pool(),
        "fs.RO",
        MembraneType::ReverseOsmosis,
        Rc::new(SimpleSeawater),
    );

    let pool = fs.pool();
    pool.fix_at(pump.inlet_state().flow_mass_h2o, 0.965);
    pool.fix_at(pump.inlet_state().flow_mass_tds, 0.035);
    pool.fix_at(pump.inlet_state().temperature, 298.15);
    pool.fix_at(pump.inlet_state().pressure, 101325.0);
    pool.fix_at(pump.deltap, 64e5);
    pool.fix_at(pump.efficiency, 0.8);

    pool.fix_at(ro.area, 50.0);
    pool.fix_at(ro.a_comp, 4.2e-12);
    pool.fix_at(ro.b_comp, 3.5e-8);
    pool.fix_at(ro.permeate_state().pressure, 101325.0);

    pump.add_costing(params);
    ro.add_costing(params);
    (pump, ro)
}

#[test]
fn connected_train_solves_after_sequential_initialization() {
    let mut fs = Flowsheet::new();
    let params = Rc::new(CostingParams::default());
    let (pump, ro) = build_train(&mut fs, &params);
    let pump = fs.add_unit(pump);
    let ro = fs.add_unit(ro);

    let outlet = fs.unit::<Pump>(pump).unwrap().outlet().clone();
    let inlet = fs.unit::<ReverseOsmosis0D>(ro).unwrap().inlet().clone();
    fs.connect(&outlet, &inlet).unwrap();
    assert_eq!(fs.combined_system().degrees_of_freedom(), 0);

    // Sequential initialization: solve the pump, hand its outlet to the
    // membrane unit, solve that, then close the loop flowsheet-wide.
    let solver = NewtonSolver::new();
    fs.calculate_scaling_factors();
    let outcome = fs
        .unit_mut::<Pump>(pump)
        .unwrap()
        .initialize(&solver, &SOLVER_OPTIONS);
    assert!(outcome.status.is_optimal());
    fs.propagate(&outlet, &inlet).unwrap();
    let outcome = fs
        .unit_mut::<ReverseOsmosis0D>(ro)
        .unwrap()
        .initialize(&solver, &SOLVER_OPTIONS);
    assert!(outcome.status.is_optimal());

    let report = fs.solve(&solver, &SOLVER_OPTIONS);
    assert!(report.status.is_optimal());

    let pool = fs.pool();
    let pump = fs.unit::<Pump>(pump).unwrap();
    let ro = fs.unit::<ReverseOsmosis0D>(ro).unwrap();

    // The connection carried the boosted pressure into the membrane feed.
    assert_abs_diff_eq!(
        pool.get(ro.feed_state().pressure),
        pool.get(pump.outlet_state().pressure),
        epsilon = 1e-4
    );
    assert_abs_diff_eq!(
        pool.get(ro.feed_state().flow_mass_h2o),
        0.965,
        epsilon = 1e-6
    );
    assert!(ro.recovery() > 0.05);
}

#[test]
fn system_costing_rolls_up_to_lcow() {
    let mut fs = Flowsheet::new();
    let params = Rc::new(CostingParams::default());
    let (pump, ro) = build_train(&mut fs, &params);
    let pump = fs.add_unit(pump);
    let ro = fs.add_unit(ro);

    let mut px = PressureExchanger::build(fs.pool(), "fs.px", Rc::new(SimpleSeawater));
    {
        let pool = fs.pool();
        pool.fix_at(px.high_in_state().flow_mass_h2o, 0.55);
        pool.fix_at(px.high_in_state().flow_mass_tds, 0.033);
        pool.fix_at(px.high_in_state().temperature, 298.15);
        pool.fix_at(px.high_in_state().pressure, 65e5);
        pool.fix_at(px.low_in_state().flow_mass_tds, 0.021);
        pool.fix_at(px.low_in_state().temperature, 298.15);
        pool.fix_at(px.low_in_state().pressure, 101325.0);
        pool.fix_at(px.efficiency, 0.95);
    }
    px.add_costing(&params);
    let px = fs.add_unit(px);

    let outlet = fs.unit::<Pump>(pump).unwrap().outlet().clone();
    let inlet = fs.unit::<ReverseOsmosis0D>(ro).unwrap().inlet().clone();
    fs.connect(&outlet, &inlet).unwrap();

    let annual_production = 1e6;
    fs.set_annual_water_production(annual_production);
    let costing = fs.system_costing(&params).unwrap();
    let again = fs.system_costing(&params).unwrap();
    assert_eq!(costing.lcow, again.lcow); // idempotent

    assert_eq!(fs.combined_system().degrees_of_freedom(), 0);

    // Sequential initialization before the combined solve.
    let solver = NewtonSolver::new();
    fs.calculate_scaling_factors();
    let outcome = fs
        .unit_mut::<Pump>(pump)
        .unwrap()
        .initialize(&solver, &SOLVER_OPTIONS);
    assert!(outcome.status.is_optimal());
    fs.propagate(&outlet, &inlet).unwrap();
    let outcome = fs
        .unit_mut::<ReverseOsmosis0D>(ro)
        .unwrap()
        .initialize(&solver, &SOLVER_OPTIONS);
    assert!(outcome.status.is_optimal());
    let outcome = fs
        .unit_mut::<PressureExchanger>(px)
        .unwrap()
        .initialize(&solver, &SOLVER_OPTIONS);
    assert!(outcome.status.is_optimal());

    let report = fs.solve(&solver, &SOLVER_OPTIONS);
    assert!(report.status.is_optimal());

    let pool = fs.pool();
    let unit_capital: f64 = fs
        .units()
        .filter_map(|u| u.costing())
        .map(|b| pool.get(b.capital_cost))
        .sum();
    let unit_operating: f64 = fs
        .units()
        .filter_map(|u| u.costing())
        .map(|b| pool.get(b.operating_cost))
        .sum();

    let capital = pool.get(costing.capital_cost_total);
    let investment = pool.get(costing.investment_cost_total);
    let mlc = pool.get(costing.operating_cost_mlc);
    let operating = pool.get(costing.operating_cost_total);
    let lcow = pool.get(costing.lcow);

    assert_relative_eq!(capital, unit_capital, max_relative = 1e-6);
    assert_relative_eq!(investment, 2.0 * capital, max_relative = 1e-8);
    assert_relative_eq!(mlc, 0.03 * investment, max_relative = 1e-8);
    assert_relative_eq!(operating, mlc + unit_operating, max_relative = 1e-6);
    assert_relative_eq!(
        lcow,
        (0.1 * investment + operating) / annual_production,
        max_relative = 1e-6
    );
    assert!(lcow > 0.0);
}
