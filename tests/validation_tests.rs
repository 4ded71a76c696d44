use approx::assert_abs_diff_eq;
use num_complex::Complex64;
use proptest::prelude::*;
use strata::dispersion::{Cauchy, ConstantIndex, ConstantTensor, Material, Tabulated};
use strata::ellipsometry;
use strata::fresnel;
use strata::mueller::Polarization;
use strata::orientation::{Euler, EulerConvention, Orientation};
use strata::propagator::Strategy;
use strata::result::{OpticalResult, Quantity, ResultList};
use strata::settings;
use strata::snell;
use strata::solver::{solve, Solver, SolverOptions};
use strata::structure::Structure;
use strata::sweep::Sweep;
use strata::StrataError;

const SI_TABLE: [(f64, f64, f64); 11] = [
    (300.0, 5.00, 4.20),
    (350.0, 5.48, 2.94),
    (400.0, 5.57, 0.39),
    (450.0, 4.67, 0.14),
    (500.0, 4.30, 0.07),
    (550.0, 4.08, 0.04),
    (600.0, 3.94, 0.02),
    (650.0, 3.85, 0.016),
    (700.0, 3.78, 0.012),
    (750.0, 3.73, 0.008),
    (800.0, 3.69, 0.006),
];

fn index(n: f64, k: f64) -> Material {
    Material::new(format!("{}+{}i", n, k), ConstantIndex::isotropic(Complex64::new(n, k)))
}

fn air() -> Material {
    index(1.0, 0.0)
}

fn silicon() -> Material {
    let table = Tabulated::new(
        SI_TABLE.iter().map(|(w, _, _)| *w).collect(),
        SI_TABLE.iter().map(|(_, n, k)| Complex64::new(*n, *k)).collect(),
    )
    .unwrap();
    Material::new("Si", table)
}

fn tio2() -> Material {
    Material::new("TiO2", Cauchy::new(2.2, 2.6e4, 0.0))
}

fn tio2_on_si() -> Structure {
    let mut structure = Structure::new(air(), silicon());
    structure.push(tio2(), 50.0).unwrap();
    structure
}

fn options(strategy: Strategy) -> SolverOptions {
    SolverOptions {
        strategy,
        ..Default::default()
    }
}

/// Smallest difference between two angles in degrees.
fn angle_difference(a: f64, b: f64) -> f64 {
    ((a - b + 180.0).rem_euclid(360.0) - 180.0).abs()
}

fn isotropic_index(material: &Material, wavelength: f64) -> Complex64 {
    material
        .tensor(wavelength, None)
        .unwrap()
        .isotropic_index()
        .unwrap()
}

#[test]
fn tio2_on_silicon_matches_airy_formula() {
    let structure = tio2_on_si();
    let (film, substrate) = (tio2(), silicon());
    for wavelength in (0..=50).map(|i| 300.0 + 10.0 * i as f64) {
        let result = solve(&structure, wavelength, 70.0, &options(Strategy::Eig)).unwrap();

        let n0 = Complex64::new(1.0, 0.0);
        let kx = snell::in_plane_wavevector(n0, 70.0).unwrap();
        let r = fresnel::airy(
            n0,
            isotropic_index(&film, wavelength),
            isotropic_index(&substrate, wavelength),
            50.0,
            kx,
            wavelength,
        );
        let (psi, delta) = ellipsometry::psi_delta(r[(1, 1)], r[(0, 0)]);
        assert_abs_diff_eq!(result.psi(), psi.to_degrees(), epsilon = 1e-4);
        assert!(
            angle_difference(result.delta(), delta.to_degrees()) < 1e-4,
            "delta {} vs {} at {} nm",
            result.delta(),
            delta.to_degrees(),
            wavelength
        );
    }
}

#[test]
fn tio2_on_silicon_strategies_agree() {
    let structure = tio2_on_si();
    let wavelengths: Vec<f64> = (0..=20).map(|i| 300.0 + 25.0 * i as f64).collect();
    let reference = Solver::new(structure.clone(), options(Strategy::Expm))
        .solve_wavelengths(&wavelengths, 70.0)
        .unwrap();
    for strategy in [Strategy::Eig, Strategy::Reduced2x2, Strategy::Batched] {
        let list = Solver::new(structure.clone(), options(strategy))
            .solve_wavelengths(&wavelengths, 70.0)
            .unwrap();
        for (a, b) in list.iter().zip(reference.iter()) {
            assert_abs_diff_eq!(a.psi(), b.psi(), epsilon = 1e-6);
            assert!(angle_difference(a.delta(), b.delta()) < 1e-6, "{}", strategy);
        }
    }
}

#[test]
fn linear_strategy_refuses_thick_layers() {
    let err = solve(&tio2_on_si(), 500.0, 70.0, &options(Strategy::Linear)).unwrap_err();
    assert!(matches!(err, StrataError::UnsupportedMedium { .. }));
    assert!(err.is_recoverable());

    let mut ultrathin = Structure::new(air(), index(1.5, 0.0));
    ultrathin.push(index(1.5, 0.0), 0.005).unwrap();
    let linear = solve(&ultrathin, 500.0, 40.0, &options(Strategy::Linear)).unwrap();
    let eig = solve(&ultrathin, 500.0, 40.0, &options(Strategy::Eig)).unwrap();
    assert_abs_diff_eq!(
        (linear.rpp().unwrap() - eig.rpp().unwrap()).norm(),
        0.0,
        epsilon = 1e-6
    );
}

#[test]
fn normal_incidence_interface_is_fresnel() {
    let structure = Structure::new(air(), index(1.5, 0.0));
    let result = solve(&structure, 633.0, 0.0, &SolverOptions::default()).unwrap();
    let expected = (1.0 - 1.5) / (1.0 + 1.5);
    assert_abs_diff_eq!(result.rss().unwrap().re, expected, epsilon = 1e-12);
    assert_abs_diff_eq!(result.rpp().unwrap().re, expected, epsilon = 1e-12);
    assert_abs_diff_eq!(result.reflectance(&Polarization::Unpolarized), 0.04, epsilon = 1e-12);
    assert_abs_diff_eq!(result.transmittance(&Polarization::S), 0.96, epsilon = 1e-12);
}

#[test]
fn zero_thickness_layer_changes_nothing() {
    let bare = tio2_on_si();
    let mut padded = tio2_on_si();
    padded.insert(1, index(3.0, 0.5), 0.0).unwrap();
    for strategy in [Strategy::Eig, Strategy::Expm, Strategy::Reduced2x2] {
        let a = solve(&bare, 550.0, 65.0, &options(strategy)).unwrap();
        let b = solve(&padded, 550.0, 65.0, &options(strategy)).unwrap();
        let (a, b) = (a.jones().unwrap(), b.jones().unwrap());
        assert_abs_diff_eq!((a.rss - b.rss).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((a.rpp - b.rpp).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((a.tpp - b.tpp).norm(), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn reversed_stack_is_reciprocal() {
    let mut lossless = Structure::new(air(), index(1.52, 0.0));
    lossless.push(index(2.1, 0.0), 80.0).unwrap();
    lossless.push(index(1.38, 0.0), 110.0).unwrap();
    let forward = solve(&lossless, 600.0, 0.0, &SolverOptions::default()).unwrap();
    let backward = solve(&lossless.reversed(), 600.0, 0.0, &SolverOptions::default()).unwrap();
    assert_abs_diff_eq!(
        forward.reflectance(&Polarization::S),
        backward.reflectance(&Polarization::S),
        epsilon = 1e-12
    );

    let mut absorbing = Structure::new(air(), index(1.52, 0.0));
    absorbing.push(index(2.0, 0.8), 30.0).unwrap();
    absorbing.push(index(1.38, 0.0), 110.0).unwrap();
    let forward = solve(&absorbing, 600.0, 0.0, &SolverOptions::default()).unwrap();
    let backward = solve(&absorbing.reversed(), 600.0, 0.0, &SolverOptions::default()).unwrap();
    assert_abs_diff_eq!(
        forward.transmittance(&Polarization::P),
        backward.transmittance(&Polarization::P),
        epsilon = 1e-12
    );
    assert!(
        (forward.reflectance(&Polarization::P) - backward.reflectance(&Polarization::P)).abs()
            > 1e-3
    );
}

#[test]
fn averaging_uses_mueller_matrices() {
    // thicknesses straddling the point where delta wraps through 180 degrees
    let results: Vec<OpticalResult> = (0..40)
        .map(|i| {
            let mut structure = Structure::new(air(), silicon());
            structure.push(index(1.46, 0.0), 100.0 + 2.0 * i as f64).unwrap();
            solve(&structure, 500.0, 70.0, &SolverOptions::default()).unwrap()
        })
        .collect();
    let deltas: Vec<f64> = results.iter().map(|r| r.delta()).collect();
    let list = ResultList::new(results);
    let average = list.average().unwrap();

    let m = list
        .iter()
        .fold(strata::mueller::MuellerMatrix::zeros(), |acc, r| acc + r.reflection_mueller())
        / list.len() as f64;
    let expected = m.normalized().psi_delta().1.to_degrees();
    assert!(angle_difference(average.delta(), expected) < 1e-9);
    assert!(average.depolarization_index() < 1.0);
    assert!(deltas.iter().all(|d| d.is_finite()));

    let single = ResultList::new(vec![list.results()[0].clone()]).average().unwrap();
    assert!(angle_difference(single.delta(), deltas[0]) < 1e-9);
    assert_abs_diff_eq!(single.psi(), list.results()[0].psi(), epsilon = 1e-9);
}

fn tilted_calcite() -> Material {
    Material::new(
        "calcite",
        ConstantIndex::new(vec![
            Complex64::new(1.658, 0.0),
            Complex64::new(1.658, 0.0),
            Complex64::new(1.486, 0.0),
        ]),
    )
    .with_orientation(Orientation::new(
        Euler::new(30.0, 50.0, 0.0),
        EulerConvention::ZXZ,
    ))
}

#[test]
fn anisotropic_layer_couples_polarizations() {
    let mut structure = Structure::new(air(), index(1.5, 0.0));
    structure.push(tilted_calcite(), 500.0).unwrap();
    let eig = solve(&structure, 589.0, 45.0, &options(Strategy::Eig)).unwrap();
    let expm = solve(&structure, 589.0, 45.0, &options(Strategy::Expm)).unwrap();
    let (a, b) = (eig.jones().unwrap(), expm.jones().unwrap());
    assert!(a.rsp.norm() > 1e-4);
    for (x, y) in [(a.rss, b.rss), (a.rsp, b.rsp), (a.rps, b.rps), (a.rpp, b.rpp), (a.tsp, b.tsp)] {
        assert_abs_diff_eq!((x - y).norm(), 0.0, epsilon = 1e-6);
    }
    for pol in [Polarization::S, Polarization::P, Polarization::Unpolarized] {
        assert_abs_diff_eq!(eig.absorbance(&pol), 0.0, epsilon = 1e-9);
    }
    assert!(eig.get(Quantity::PsiPs).unwrap() > 0.0);

    let err = solve(&structure, 589.0, 45.0, &options(Strategy::Reduced2x2)).unwrap_err();
    assert!(matches!(err, StrataError::UnsupportedMedium { .. }));
}

fn magneto_optic(g: f64) -> Material {
    Material::new(
        "magneto-optic",
        ConstantTensor::gyrotropic(Complex64::new(4.0, 0.1), Complex64::new(0.0, g)),
    )
}

#[test]
fn polar_kerr_film_rotates_polarization() {
    let mut structure = Structure::new(air(), index(1.5, 0.0));
    structure.push(magneto_optic(0.2), 50.0).unwrap();
    for aoi in [0.0, 30.0, 60.0] {
        let expm = solve(&structure, 633.0, aoi, &options(Strategy::Expm)).unwrap();
        let b = expm.jones().unwrap();
        assert!(b.rsp.norm() > 1e-3);
        for strategy in [Strategy::Eig, Strategy::Batched] {
            let result = solve(&structure, 633.0, aoi, &options(strategy)).unwrap();
            let a = result.jones().unwrap();
            for (x, y) in [
                (a.rss, b.rss),
                (a.rsp, b.rsp),
                (a.rps, b.rps),
                (a.rpp, b.rpp),
                (a.tss, b.tss),
                (a.tps, b.tps),
            ] {
                assert_abs_diff_eq!((x - y).norm(), 0.0, epsilon = 1e-6);
            }
        }
    }
    let err = solve(&structure, 633.0, 30.0, &options(Strategy::Reduced2x2)).unwrap_err();
    assert!(matches!(err, StrataError::UnsupportedMedium { .. }));
}

#[test]
fn thick_absorber_overflows_matrix_exponential() {
    let mut structure = Structure::new(air(), index(1.5, 0.0));
    structure.push(index(1.5, 2.0), 1e6).unwrap();
    let err = solve(&structure, 500.0, 20.0, &options(Strategy::Expm)).unwrap_err();
    assert!(matches!(err, StrataError::NumericalInstability(_)));
    let eig = solve(&structure, 500.0, 20.0, &options(Strategy::Eig)).unwrap();
    assert!(eig.rss().unwrap().norm() < 1.0);
    assert_abs_diff_eq!(eig.tss().unwrap().norm(), 0.0, epsilon = 1e-12);
}

#[test]
fn reduced_strategy_refuses_gain_media() {
    let structure = Structure::new(air(), index(1.5, -0.1));
    let err = solve(&structure, 589.0, 45.0, &options(Strategy::Reduced2x2)).unwrap_err();
    assert!(matches!(err, StrataError::UnsupportedMedium { .. }));
}

#[test]
fn graded_layer_converges_with_slices() {
    let solve_with = |slices: usize| {
        let mut structure = Structure::new(air(), index(1.52, 0.0));
        structure
            .push_graded(200.0, slices, |depth| index(1.6 + 0.5 * depth, 0.0))
            .unwrap();
        assert_eq!(structure.len(), slices + 2);
        solve(&structure, 500.0, 60.0, &SolverOptions::default())
            .unwrap()
            .rpp()
            .unwrap()
    };
    let fine = solve_with(200);
    let coarse_error = (solve_with(5) - fine).norm();
    let medium_error = (solve_with(50) - fine).norm();
    assert!(medium_error < coarse_error);
    assert!(medium_error < 1e-3);
}

#[test]
fn default_configuration_runs() {
    let settings = settings::load_default_config().unwrap();
    let mut sweep = Sweep::new(settings).unwrap();
    let result = sweep.solve().unwrap();
    let psi = result.grid(Quantity::Psi).unwrap();
    assert_eq!(psi.dim(), (1, 101));
    assert!(psi.iter().all(|p| p.is_finite() && *p >= 0.0 && *p <= 90.0));
}

fn lossless_stack(layers: &[(f64, f64)], substrate: f64) -> Structure {
    let mut structure = Structure::new(air(), index(substrate, 0.0));
    for (n, d) in layers {
        structure.push(index(*n, 0.0), *d).unwrap();
    }
    structure
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn lossless_stacks_conserve_energy(
        layers in prop::collection::vec((1.0f64..3.0, 0.0f64..300.0), 0..6),
        substrate in 1.0f64..4.0,
        wavelength in 300.0f64..900.0,
        aoi in 0.0f64..80.0,
    ) {
        let structure = lossless_stack(&layers, substrate);
        let result = solve(&structure, wavelength, aoi, &SolverOptions::default()).unwrap();
        for pol in [Polarization::S, Polarization::P] {
            let total = result.reflectance(&pol) + result.transmittance(&pol);
            prop_assert!((total - 1.0).abs() < 1e-9, "R + T = {}", total);
        }
    }

    #[test]
    fn strategies_agree_on_random_stacks(
        layers in prop::collection::vec((1.2f64..2.5, 1.0f64..200.0, 0.0f64..0.3), 1..5),
        wavelength in 350.0f64..800.0,
        aoi in 0.0f64..75.0,
    ) {
        let mut structure = Structure::new(air(), index(1.5, 0.0));
        for (n, d, k) in &layers {
            structure.push(index(*n, *k), *d).unwrap();
        }
        let reference = solve(&structure, wavelength, aoi, &options(Strategy::Expm)).unwrap();
        for strategy in [Strategy::Eig, Strategy::Reduced2x2] {
            let result = solve(&structure, wavelength, aoi, &options(strategy)).unwrap();
            prop_assert!((result.rss().unwrap() - reference.rss().unwrap()).norm() < 1e-6);
            prop_assert!((result.rpp().unwrap() - reference.rpp().unwrap()).norm() < 1e-6);
            prop_assert!((result.tss().unwrap() - reference.tss().unwrap()).norm() < 1e-6);
        }
    }

    #[test]
    fn strategies_agree_on_anisotropic_stacks(
        principal in (1.3f64..2.2, 1.3f64..2.2, 1.3f64..2.2, 0.0f64..0.2),
        angles in (0.0f64..360.0, 0.0f64..180.0, 0.0f64..360.0),
        gyration in 0.05f64..0.3,
        reversed_field in any::<bool>(),
        thicknesses in (1.0f64..300.0, 1.0f64..300.0),
        wavelength in 350.0f64..800.0,
        aoi in 0.0f64..75.0,
    ) {
        let (na, nb, nc, k) = principal;
        let biaxial = Material::new(
            "biaxial",
            ConstantIndex::new(vec![
                Complex64::new(na, k),
                Complex64::new(nb, 0.0),
                Complex64::new(nc, k),
            ]),
        )
        .with_orientation(Orientation::new(
            Euler::new(angles.0, angles.1, angles.2),
            EulerConvention::ZXZ,
        ));
        let gyrotropic = Material::new(
            "gyrotropic",
            ConstantTensor::gyrotropic(
                Complex64::new(3.0, 0.05),
                Complex64::new(0.0, if reversed_field { -gyration } else { gyration }),
            ),
        );
        let mut structure = Structure::new(air(), index(1.5, 0.0));
        structure.push(biaxial, thicknesses.0).unwrap();
        structure.push(gyrotropic, thicknesses.1).unwrap();

        let reference = solve(&structure, wavelength, aoi, &options(Strategy::Expm)).unwrap();
        let b = reference.jones().unwrap();
        let result = solve(&structure, wavelength, aoi, &options(Strategy::Eig)).unwrap();
        let a = result.jones().unwrap();
        for (x, y) in [
            (a.rss, b.rss),
            (a.rsp, b.rsp),
            (a.rps, b.rps),
            (a.rpp, b.rpp),
            (a.tss, b.tss),
            (a.tpp, b.tpp),
        ] {
            prop_assert!((x - y).norm() < 1e-6, "eig {} expm {}", x, y);
        }
    }
}
