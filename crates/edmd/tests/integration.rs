//! End-to-end tests driving full simulations from configuration documents.

use approx::assert_relative_eq;
use edmd::{
    load_str, EventData, EventKind, OutputPlugin, SimView, Simulation, StopReason, Vec3,
};
use edmd_core::{Event, ParticleId};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
struct Committed {
    time: f64,
    kind: EventKind,
    primary: ParticleId,
    secondary: Option<ParticleId>,
}

/// Test observer recording the committed event stream.
struct Recorder {
    log: Arc<Mutex<Vec<Committed>>>,
}

impl Recorder {
    fn new() -> (Self, Arc<Mutex<Vec<Committed>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl OutputPlugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn event_update(&mut self, event: &Event, _data: &EventData, view: &SimView) -> edmd::Result<()> {
        self.log.lock().unwrap().push(Committed {
            time: view.time,
            kind: event.kind,
            primary: event.primary,
            secondary: event.secondary,
        });
        Ok(())
    }

    fn report(&self, _view: &SimView) -> String {
        format!("{} events", self.log.lock().unwrap().len())
    }
}

/// Observer that fails on its first update.
struct Faulty;

impl OutputPlugin for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn event_update(&mut self, _: &Event, _: &EventData, _: &SimView) -> edmd::Result<()> {
        Err(edmd::SimError::plugin("faulty", "synthetic failure"))
    }

    fn report(&self, _view: &SimView) -> String {
        "always fails".into()
    }
}

fn two_sphere_config(p2_pos: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<SimConfig version="1">
  <Simulation>
    <Units Length="1" Time="1" Mass="1"/>
    <BC Type="None"/>
    <Dynamics Type="Newtonian"/>
    <Seed Value="1"/>
  </Simulation>
  <Genus>
    <Species Name="bulk" Mass="1" IntName="bulk">
      <Range Type="All"/>
    </Species>
  </Genus>
  <Interactions>
    <Interaction Type="HardSphere" Name="bulk" Diameter="1" Elasticity="1">
      <PairRange Type="All"/>
    </Interaction>
  </Interactions>
  <ParticleData N="2">
    <Pt ID="0">
      <P x="-1" y="0" z="0"/>
      <V x="1" y="0" z="0"/>
    </Pt>
    <Pt ID="1">
      {p2_pos}
      <V x="-1" y="0" z="0"/>
    </Pt>
  </ParticleData>
</SimConfig>
"#
    )
}

#[test]
fn two_sphere_head_on_exchanges_velocities() {
    let sim = load_str(&two_sphere_config(r#"<P x="1" y="0" z="0"/>"#)).unwrap();
    let mut sim = Simulation::new(sim).unwrap();
    let (rec, log) = Recorder::new();
    sim.add_plugin(Box::new(rec));

    let reason = sim.run(Some(1), None).unwrap();
    assert_eq!(reason, StopReason::EventBudget);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, EventKind::Core);
    assert_relative_eq!(log[0].time, 0.5, epsilon = 1e-12);
    assert_relative_eq!(sim.particles[0].vel, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    assert_relative_eq!(sim.particles[1].vel, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
}

#[test]
fn grazing_miss_produces_no_event() {
    let sim = load_str(&two_sphere_config(r#"<P x="1" y="1.01" z="0"/>"#)).unwrap();
    let mut sim = Simulation::new(sim).unwrap();
    let (rec, log) = Recorder::new();
    sim.add_plugin(Box::new(rec));

    let reason = sim.run(Some(10), None).unwrap();
    assert_eq!(reason, StopReason::ExhaustedQueue);
    assert!(log.lock().unwrap().is_empty());
    assert_relative_eq!(sim.particles[0].vel, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
}

#[test]
fn rotated_cubes_collide_at_frame_gap_over_parallel_speed() {
    let angle = 30f64.to_radians();
    let (s, c) = angle.sin_cos();
    // Cube centres separated by 1.2 along the rotated frame's x axis, the
    // second cube approaching at unit speed along the world x axis.
    let p2 = 1.2 * Vec3::new(c, -s, 0.0);
    let config = format!(
        r#"<?xml version="1.0"?>
<SimConfig version="1">
  <Simulation>
    <Units Length="1" Time="1" Mass="1"/>
    <BC Type="None"/>
    <Dynamics Type="Newtonian"/>
    <Seed Value="1"/>
  </Simulation>
  <Genus>
    <Species Name="cubes" Mass="1" IntName="cubes">
      <Range Type="All"/>
    </Species>
  </Genus>
  <Interactions>
    <Interaction Type="RotatedParallelCubes" Name="cubes" Diameter="1" Elasticity="1">
      <PairRange Type="All"/>
      <Rotation xx="{c}" xy="{ms}" xz="0" yx="{s}" yy="{c}" yz="0" zx="0" zy="0" zz="1"/>
    </Interaction>
  </Interactions>
  <ParticleData N="2">
    <Pt ID="0">
      <P x="0" y="0" z="0"/>
      <V x="0" y="0" z="0"/>
    </Pt>
    <Pt ID="1">
      <P x="{px}" y="{py}" z="0"/>
      <V x="-1" y="0" z="0"/>
    </Pt>
  </ParticleData>
</SimConfig>
"#,
        c = c,
        s = s,
        ms = -s,
        px = p2.x,
        py = p2.y,
    );
    let mut sim = Simulation::new(load_str(&config).unwrap()).unwrap();
    let (rec, log) = Recorder::new();
    sim.add_plugin(Box::new(rec));

    sim.run(Some(1), None).unwrap();
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, EventKind::Core);
    // The frame-x gap of 0.2 closes at the parallel velocity component.
    assert_relative_eq!(log[0].time, 0.2 / c, epsilon = 1e-10);
}

#[test]
fn stale_pair_event_is_discarded_after_wall_deflection() {
    // Pair (0, 1) would collide at t = 1.0, but a wall deflects particle 0
    // at t = 0.4; the stale pair event must not fire.
    let config = r#"<?xml version="1.0"?>
<SimConfig version="1">
  <Simulation>
    <Units Length="1" Time="1" Mass="1"/>
    <BC Type="None"/>
    <Dynamics Type="Newtonian"/>
    <Seed Value="1"/>
  </Simulation>
  <Genus>
    <Species Name="bulk" Mass="1" IntName="bulk">
      <Range Type="All"/>
    </Species>
  </Genus>
  <Interactions>
    <Interaction Type="HardSphere" Name="bulk" Diameter="1" Elasticity="1">
      <PairRange Type="All"/>
    </Interaction>
  </Interactions>
  <Locals>
    <Local Type="PlaneWall" Name="deflector" Elasticity="1">
      <Range Type="Single" ID="0"/>
      <Norm x="-1" y="0" z="0"/>
      <Origin x="-1.1" y="0" z="0"/>
    </Local>
  </Locals>
  <ParticleData N="2">
    <Pt ID="0">
      <P x="-1.5" y="0" z="0"/>
      <V x="1" y="0" z="0"/>
    </Pt>
    <Pt ID="1">
      <P x="1.5" y="0" z="0"/>
      <V x="-1" y="0" z="0"/>
    </Pt>
  </ParticleData>
</SimConfig>
"#;
    let mut sim = Simulation::new(load_str(config).unwrap()).unwrap();
    let (rec, log) = Recorder::new();
    sim.add_plugin(Box::new(rec));

    sim.run(None, Some(3.0)).unwrap();
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1, "only the wall event may fire: {log:?}");
    assert_eq!(log[0].kind, EventKind::Wall);
    assert_relative_eq!(log[0].time, 0.4, epsilon = 1e-12);
    assert!(sim.stale_discards() > 0);
}

fn gas_config(extra_sections: &str) -> String {
    // Eight spheres on a cubic sublattice of an L = 8 periodic box, with
    // velocity pairs cancelling for zero total momentum.
    let positions = [
        [-2.0, -2.0, -2.0],
        [2.0, -2.0, -2.0],
        [-2.0, 2.0, -2.0],
        [2.0, 2.0, -2.0],
        [-2.0, -2.0, 2.0],
        [2.0, -2.0, 2.0],
        [-2.0, 2.0, 2.0],
        [2.0, 2.0, 2.0],
    ];
    let half = [
        [0.83, 0.21, -0.44],
        [-0.31, 0.67, 0.12],
        [0.05, -0.73, 0.59],
        [0.49, 0.38, 0.91],
    ];
    let mut pts = String::new();
    for (i, pos) in positions.iter().enumerate() {
        let v = if i < 4 {
            half[i]
        } else {
            let m = half[i - 4];
            [-m[0], -m[1], -m[2]]
        };
        pts.push_str(&format!(
            r#"    <Pt ID="{i}">
      <P x="{}" y="{}" z="{}"/>
      <V x="{}" y="{}" z="{}"/>
    </Pt>
"#,
            pos[0], pos[1], pos[2], v[0], v[1], v[2]
        ));
    }
    format!(
        r#"<?xml version="1.0"?>
<SimConfig version="1">
  <Simulation>
    <Units Length="1" Time="1" Mass="1"/>
    <BC Type="Periodic">
      <Dimensions x="8" y="8" z="8"/>
    </BC>
    <Dynamics Type="Newtonian"/>
    <Seed Value="31"/>
  </Simulation>
  <Genus>
    <Species Name="bulk" Mass="1" IntName="bulk">
      <Range Type="All"/>
    </Species>
  </Genus>
  <Interactions>
    <Interaction Type="HardSphere" Name="bulk" Diameter="1" Elasticity="1">
      <PairRange Type="All"/>
    </Interaction>
  </Interactions>
{extra_sections}  <ParticleData N="8">
{pts}  </ParticleData>
</SimConfig>
"#
    )
}

#[test]
fn elastic_gas_conserves_energy_momentum_and_time_order() {
    let mut sim = Simulation::new(load_str(&gas_config("")).unwrap()).unwrap();
    let (rec, log) = Recorder::new();
    sim.add_plugin(Box::new(rec));
    sim.add_plugin(Box::new(edmd::MomentumWatch::new()));

    let ke0 = sim.kinetic_energy();
    let p0 = sim.momentum();
    let reason = sim.run(Some(400), None).unwrap();
    assert_eq!(reason, StopReason::EventBudget);

    // P1: the committed stream is non-decreasing in time.
    let log = log.lock().unwrap();
    assert!(log.len() >= 400);
    for pair in log.windows(2) {
        assert!(pair[1].time >= pair[0].time);
    }

    // P3/P4: elastic dynamics conserve energy and momentum.
    assert_relative_eq!(sim.kinetic_energy(), ke0, max_relative = 1e-9);
    assert!((sim.momentum() - p0).norm() < 1e-10);

    // P2: no hard-core pair overlaps at a synchronized instant.
    sim.synchronize();
    for i in 0..sim.particles.len() {
        for j in (i + 1)..sim.particles.len() {
            let mut rij = sim.particles[i].pos - sim.particles[j].pos;
            sim.model.bc.apply(&mut rij);
            assert!(
                rij.norm() >= 1.0 - 1e-9,
                "overlap between {i} and {j}: {}",
                rij.norm()
            );
        }
    }
}

#[test]
fn cell_scheduler_reproduces_the_all_pairs_event_stream() {
    let cells = r#"  <Globals>
    <Global Type="Cells" Name="cells" Width="1"/>
  </Globals>
"#;
    let core_events = |extra: &str| {
        let mut sim = Simulation::new(load_str(&gas_config(extra)).unwrap()).unwrap();
        let (rec, log) = Recorder::new();
        sim.add_plugin(Box::new(rec));
        sim.run(None, Some(20.0)).unwrap();
        let log = log.lock().unwrap();
        log.iter()
            .filter(|c| c.kind == EventKind::Core)
            .cloned()
            .collect::<Vec<_>>()
    };

    let without = core_events("");
    let with = core_events(cells);
    assert!(!without.is_empty());
    assert_eq!(without.len(), with.len());
    for (a, b) in without.iter().zip(&with) {
        assert_eq!((a.primary, a.secondary, a.kind), (b.primary, b.secondary, b.kind));
        assert_relative_eq!(a.time, b.time, max_relative = 1e-9);
    }
}

#[test]
fn identical_seeds_give_identical_event_streams() {
    let thermostat = r#"  <Systems>
    <System Type="Andersen" Name="bath" Period="2.5" Temperature="1" Fraction="0.5"/>
  </Systems>
"#;
    let run = || {
        let mut sim = Simulation::new(load_str(&gas_config(thermostat)).unwrap()).unwrap();
        let (rec, log) = Recorder::new();
        sim.add_plugin(Box::new(rec));
        sim.run(Some(200), None).unwrap();
        let log = log.lock().unwrap().clone();
        log
    };
    assert_eq!(run(), run());
}

#[test]
fn snapshot_round_trip_is_byte_stable() {
    let mut sim = Simulation::new(load_str(&gas_config("")).unwrap()).unwrap();
    sim.run(Some(50), None).unwrap();
    let snap1 = sim.snapshot().unwrap();

    let mut sim2 = Simulation::new(load_str(&snap1).unwrap()).unwrap();
    let snap2 = sim2.snapshot().unwrap();
    assert_eq!(snap1, snap2);
}

#[test]
fn reloaded_snapshot_continues_with_the_same_events() {
    let mut sim = Simulation::new(load_str(&gas_config("")).unwrap()).unwrap();
    sim.run(Some(40), None).unwrap();
    let t_base = sim.time();
    let snap = sim.snapshot().unwrap();

    let (rec_a, log_a) = Recorder::new();
    sim.add_plugin(Box::new(rec_a));
    sim.run(Some(20), None).unwrap();

    let mut resumed = Simulation::new(load_str(&snap).unwrap()).unwrap();
    let (rec_b, log_b) = Recorder::new();
    resumed.add_plugin(Box::new(rec_b));
    resumed.run(Some(20), None).unwrap();

    let log_a = log_a.lock().unwrap();
    let log_b = log_b.lock().unwrap();
    assert_eq!(log_a.len(), log_b.len());
    for (a, b) in log_a.iter().zip(log_b.iter()) {
        assert_eq!((a.kind, a.primary, a.secondary), (b.kind, b.primary, b.secondary));
        assert_relative_eq!(a.time - t_base, b.time, epsilon = 1e-6);
    }
}

#[test]
fn halt_system_terminates_the_run() {
    let halt = r#"  <Systems>
    <System Type="Halt" Name="halt" Time="5"/>
  </Systems>
"#;
    let mut sim = Simulation::new(load_str(&gas_config(halt)).unwrap()).unwrap();
    let reason = sim.run(None, None).unwrap();
    assert_eq!(reason, StopReason::Halted);
    assert_relative_eq!(sim.time(), 5.0, epsilon = 1e-12);
}

#[test]
fn sim_time_budget_stops_without_overrunning() {
    let mut sim = Simulation::new(load_str(&gas_config("")).unwrap()).unwrap();
    let reason = sim.run(None, Some(1.25)).unwrap();
    assert_eq!(reason, StopReason::SimTimeBudget);
    assert_relative_eq!(sim.time(), 1.25, epsilon = 1e-12);
}

#[test]
fn failing_observer_is_disabled_and_physics_continues() {
    let mut sim = Simulation::new(load_str(&gas_config("")).unwrap()).unwrap();
    sim.add_plugin(Box::new(Faulty));
    let (rec, log) = Recorder::new();
    sim.add_plugin(Box::new(rec));

    let reason = sim.run(Some(10), None).unwrap();
    assert_eq!(reason, StopReason::EventBudget);
    assert_eq!(sim.diagnostics().disabled_plugins, 1);
    assert_eq!(log.lock().unwrap().len(), 10);
}

#[test]
fn kinetic_energy_plugin_matches_direct_sum() {
    let mut sim = Simulation::new(load_str(&gas_config("")).unwrap()).unwrap();
    sim.add_plugin(Box::new(edmd::KineticEnergy::new()));
    sim.run(Some(100), None).unwrap();

    let direct = sim.kinetic_energy();
    let report = &sim.plugin_reports()[0].1;
    // The incremental tally in the report must agree with a fresh sum.
    let current: f64 = report
        .split("current ")
        .nth(1)
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.parse().ok())
        .unwrap();
    assert_relative_eq!(current, direct, max_relative = 1e-9);
}
