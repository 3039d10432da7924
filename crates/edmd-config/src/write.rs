//! Configuration document writer.
//!
//! Output is canonical: fixed element order, fixed attribute order, and
//! shortest-round-trip number formatting, so loading a written snapshot and
//! writing it again reproduces the bytes exactly.

use crate::load::ROTATION_KEYS;
use crate::{Result, Units};
use edmd_core::{
    Dimension, PairRange, Particle, PropertyKind, PropertyRef, PropertyStore, Range,
};
use edmd_dynamics::{Global, Interaction, Liouvillean, Local, Model, System};
use edmd_math::{BoundaryCondition, Mat3, Vec3};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

/// Serialize a complete simulation back into the snapshot schema.
pub fn write_config(
    model: &Model,
    globals: &[Global],
    systems: &[System],
    particles: &[Particle],
    units: &Units,
) -> Result<String> {
    let mut out = Out {
        w: Writer::new_with_indent(Vec::new(), b' ', 2),
    };
    out.w
        .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;

    out.start("SimConfig", &[("version", "1".into())])?;

    out.start("Simulation", &[])?;
    out.empty(
        "Units",
        &[
            ("Length", fmt(units.length)),
            ("Time", fmt(units.time)),
            ("Mass", fmt(units.mass)),
        ],
    )?;
    match &model.bc {
        BoundaryCondition::None => out.empty("BC", &[("Type", "None".into())])?,
        BoundaryCondition::Periodic { dims } => {
            out.start("BC", &[("Type", "Periodic".into())])?;
            out.vec3("Dimensions", &(dims / units.length))?;
            out.end("BC")?;
        }
    }
    match &model.liouvillean {
        Liouvillean::Newtonian => out.empty("Dynamics", &[("Type", "Newtonian".into())])?,
        Liouvillean::Gravity(g) => {
            out.start("Dynamics", &[("Type", "Gravity".into())])?;
            let accel = units.length / (units.time * units.time);
            out.vec3("G", &(g / accel))?;
            out.end("Dynamics")?;
        }
    }
    out.empty("Seed", &[("Value", format!("{}", model.seed))])?;
    out.end("Simulation")?;

    if !model.properties.is_empty() {
        out.start("Properties", &[])?;
        for property in model.properties.iter() {
            let scale = units.scale_of(property.dimension);
            let mut attrs = vec![
                ("Name", property.name.clone()),
                ("Units", dimension_name(property.dimension).into()),
            ];
            match &property.kind {
                PropertyKind::Fixed(v) => {
                    attrs.push(("Type", "Fixed".into()));
                    attrs.push(("Value", fmt(v / scale)));
                }
                PropertyKind::PerParticle(vs) => {
                    attrs.push(("Type", "PerParticle".into()));
                    let joined = vs
                        .iter()
                        .map(|v| fmt(v / scale))
                        .collect::<Vec<_>>()
                        .join(",");
                    attrs.push(("Values", joined));
                }
            }
            out.empty("Property", &attrs)?;
        }
        out.end("Properties")?;
    }

    out.start("Genus", &[])?;
    for species in &model.species {
        out.start(
            "Species",
            &[
                ("Name", species.name.clone()),
                ("Mass", property_ref(&species.mass, &model.properties, units.mass)),
                ("IntName", species.int_name.clone()),
            ],
        )?;
        out.range(&species.range)?;
        out.end("Species")?;
    }
    out.end("Genus")?;

    out.start("Interactions", &[])?;
    for interaction in &model.interactions {
        write_interaction(&mut out, interaction, &model.properties, units)?;
    }
    out.end("Interactions")?;

    if !model.locals.is_empty() {
        out.start("Locals", &[])?;
        for local in &model.locals {
            write_local(&mut out, local, units)?;
        }
        out.end("Locals")?;
    }

    if !globals.is_empty() {
        out.start("Globals", &[])?;
        for global in globals {
            match global {
                Global::Cells(cells) => out.empty(
                    "Global",
                    &[
                        ("Type", "Cells".into()),
                        ("Name", cells.name.clone()),
                        ("Width", fmt(cells.width / units.length)),
                    ],
                )?,
            }
        }
        out.end("Globals")?;
    }

    if !systems.is_empty() {
        out.start("Systems", &[])?;
        for system in systems {
            match system {
                System::Andersen(a) => out.empty(
                    "System",
                    &[
                        ("Type", "Andersen".into()),
                        ("Name", a.name.clone()),
                        ("Period", fmt(a.period / units.time)),
                        ("Temperature", fmt(a.temperature / units.energy())),
                        ("Fraction", fmt(a.fraction)),
                    ],
                )?,
                System::Halt(h) => out.empty(
                    "System",
                    &[
                        ("Type", "Halt".into()),
                        ("Name", h.name.clone()),
                        ("Time", fmt(h.time / units.time)),
                    ],
                )?,
            }
        }
        out.end("Systems")?;
    }

    out.start("ParticleData", &[("N", format!("{}", particles.len()))])?;
    for p in particles {
        out.start("Pt", &[("ID", format!("{}", p.id()))])?;
        out.vec3("P", &(p.pos / units.length))?;
        out.vec3("V", &(p.vel / units.velocity()))?;
        if let Some(o) = &p.orientation {
            let q = o.q.quaternion().coords;
            out.empty(
                "O",
                &[
                    ("w", fmt(q.w)),
                    ("x", fmt(q.x)),
                    ("y", fmt(q.y)),
                    ("z", fmt(q.z)),
                ],
            )?;
            out.vec3("W", &(o.angvel * units.time))?;
        }
        out.end("Pt")?;
    }
    out.end("ParticleData")?;

    out.end("SimConfig")?;

    let mut bytes = out.w.into_inner();
    bytes.push(b'\n');
    Ok(String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

fn write_interaction(
    out: &mut Out,
    interaction: &Interaction,
    store: &PropertyStore,
    units: &Units,
) -> Result<()> {
    match interaction {
        Interaction::HardSphere {
            name,
            range,
            diameter,
            elasticity,
        } => {
            out.start(
                "Interaction",
                &[
                    ("Type", "HardSphere".into()),
                    ("Name", name.clone()),
                    ("Diameter", property_ref(diameter, store, units.length)),
                    ("Elasticity", property_ref(elasticity, store, 1.0)),
                ],
            )?;
            out.pair_range(range)?;
            out.end("Interaction")
        }
        Interaction::SquareWell {
            name,
            range,
            diameter,
            elasticity,
            lambda,
            well_depth,
        } => {
            out.start(
                "Interaction",
                &[
                    ("Type", "SquareWell".into()),
                    ("Name", name.clone()),
                    ("Diameter", property_ref(diameter, store, units.length)),
                    ("Elasticity", property_ref(elasticity, store, 1.0)),
                    ("Lambda", fmt(*lambda)),
                    ("WellDepth", fmt(well_depth / units.energy())),
                ],
            )?;
            out.pair_range(range)?;
            out.end("Interaction")
        }
        Interaction::ParallelCubes {
            name,
            range,
            diameter,
            elasticity,
        } => {
            out.start(
                "Interaction",
                &[
                    ("Type", "ParallelCubes".into()),
                    ("Name", name.clone()),
                    ("Diameter", fmt(diameter / units.length)),
                    ("Elasticity", fmt(*elasticity)),
                ],
            )?;
            out.pair_range(range)?;
            out.end("Interaction")
        }
        Interaction::RotatedParallelCubes {
            name,
            range,
            diameter,
            elasticity,
            rotation,
        } => {
            out.start(
                "Interaction",
                &[
                    ("Type", "RotatedParallelCubes".into()),
                    ("Name", name.clone()),
                    ("Diameter", fmt(diameter / units.length)),
                    ("Elasticity", fmt(*elasticity)),
                ],
            )?;
            out.pair_range(range)?;
            out.rotation(rotation)?;
            out.end("Interaction")
        }
    }
}

fn write_local(out: &mut Out, local: &Local, units: &Units) -> Result<()> {
    match local {
        Local::PlaneWall {
            name,
            range,
            elasticity,
            origin,
            normal,
        } => {
            out.start(
                "Local",
                &[
                    ("Type", "PlaneWall".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt(*elasticity)),
                ],
            )?;
            out.range(range)?;
            out.vec3("Norm", normal)?;
            out.vec3("Origin", &(origin / units.length))?;
            out.end("Local")
        }
        Local::DoubleWall {
            name,
            range,
            elasticity,
            origin,
            normal,
            sigma,
        } => {
            out.start(
                "Local",
                &[
                    ("Type", "DoubleWall".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt(*elasticity)),
                    ("Sigma", fmt(sigma / units.length)),
                ],
            )?;
            out.range(range)?;
            out.vec3("Norm", normal)?;
            out.vec3("Origin", &(origin / units.length))?;
            out.end("Local")
        }
        Local::CylinderWall {
            name,
            range,
            elasticity,
            origin,
            axis,
            radius,
        } => {
            out.start(
                "Local",
                &[
                    ("Type", "CylinderWall".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt(*elasticity)),
                    ("Radius", fmt(radius / units.length)),
                ],
            )?;
            out.range(range)?;
            out.vec3("Norm", axis)?;
            out.vec3("Origin", &(origin / units.length))?;
            out.end("Local")
        }
        Local::OscillatingPlate {
            name,
            range,
            elasticity,
            plate,
        } => {
            out.start(
                "Local",
                &[
                    ("Type", "OscillatingPlate".into()),
                    ("Name", name.clone()),
                    ("Elasticity", fmt(*elasticity)),
                    ("Sigma", fmt(plate.sigma / units.length)),
                    ("Delta", fmt(plate.delta / units.length)),
                    ("Omega", fmt(plate.omega * units.time)),
                    ("Phase", fmt(plate.phase)),
                ],
            )?;
            out.range(range)?;
            out.vec3("Norm", &plate.normal)?;
            out.vec3("Origin", &(plate.origin / units.length))?;
            out.end("Local")
        }
    }
}

fn property_ref(r: &PropertyRef, store: &PropertyStore, scale: f64) -> String {
    match r {
        PropertyRef::Inline(v) => fmt(v / scale),
        PropertyRef::Named(_) => r.display(store),
    }
}

fn dimension_name(d: Dimension) -> &'static str {
    match d {
        Dimension::Dimensionless => "Dimensionless",
        Dimension::Length => "Length",
        Dimension::Time => "Time",
        Dimension::Mass => "Mass",
        Dimension::Energy => "Energy",
    }
}

fn fmt(v: f64) -> String {
    format!("{v}")
}

struct Out {
    w: Writer<Vec<u8>>,
}

impl Out {
    fn element(&self, tag: &str, attrs: &[(&str, String)]) -> BytesStart<'static> {
        let mut bs = BytesStart::new(tag.to_string());
        for (k, v) in attrs {
            bs.push_attribute((*k, v.as_str()));
        }
        bs
    }

    fn start(&mut self, tag: &str, attrs: &[(&str, String)]) -> Result<()> {
        let bs = self.element(tag, attrs);
        self.w.write_event(Event::Start(bs))?;
        Ok(())
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, String)]) -> Result<()> {
        let bs = self.element(tag, attrs);
        self.w.write_event(Event::Empty(bs))?;
        Ok(())
    }

    fn end(&mut self, tag: &str) -> Result<()> {
        self.w.write_event(Event::End(BytesEnd::new(tag.to_string())))?;
        Ok(())
    }

    fn vec3(&mut self, tag: &str, v: &Vec3) -> Result<()> {
        self.empty(tag, &[("x", fmt(v.x)), ("y", fmt(v.y)), ("z", fmt(v.z))])
    }

    fn rotation(&mut self, m: &Mat3) -> Result<()> {
        let attrs: Vec<(&str, String)> = ROTATION_KEYS
            .iter()
            .enumerate()
            .map(|(i, key)| (*key, fmt(m[(i / 3, i % 3)])))
            .collect();
        self.empty("Rotation", &attrs)
    }

    fn range(&mut self, range: &Range) -> Result<()> {
        match range {
            Range::All => self.empty("Range", &[("Type", "All".into())]),
            Range::Single(id) => self.empty(
                "Range",
                &[("Type", "Single".into()), ("ID", format!("{id}"))],
            ),
            Range::Interval { start, end } => self.empty(
                "Range",
                &[
                    ("Type", "Interval".into()),
                    ("Start", format!("{start}")),
                    ("End", format!("{end}")),
                ],
            ),
            Range::List(ids) => {
                let joined = ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                self.empty("Range", &[("Type", "List".into()), ("IDs", joined)])
            }
        }
    }

    fn pair_range(&mut self, range: &PairRange) -> Result<()> {
        match range {
            PairRange::All => self.empty("PairRange", &[("Type", "All".into())]),
            PairRange::Pair(a, b) => self.empty(
                "PairRange",
                &[
                    ("Type", "Pair".into()),
                    ("ID1", format!("{a}")),
                    ("ID2", format!("{b}")),
                ],
            ),
            PairRange::List(pairs) => {
                let joined = pairs
                    .iter()
                    .map(|(a, b)| format!("{a}-{b}"))
                    .collect::<Vec<_>>()
                    .join(",");
                self.empty("PairRange", &[("Type", "List".into()), ("Pairs", joined)])
            }
            PairRange::IntraChains {
                start,
                end,
                interval,
            } => self.empty(
                "PairRange",
                &[
                    ("Type", "IntraChains".into()),
                    ("Start", format!("{start}")),
                    ("End", format!("{end}")),
                    ("Interval", format!("{interval}")),
                ],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_str;

    const DOC: &str = r#"<?xml version="1.0"?>
<SimConfig version="1">
  <Simulation>
    <Units Length="1" Time="1" Mass="1"/>
    <BC Type="Periodic">
      <Dimensions x="10" y="10" z="10"/>
    </BC>
    <Dynamics Type="Newtonian"/>
    <Seed Value="7"/>
  </Simulation>
  <Properties>
    <Property Name="D" Units="Length" Type="PerParticle" Values="1,0.5"/>
  </Properties>
  <Genus>
    <Species Name="bulk" Mass="1" IntName="bulk">
      <Range Type="All"/>
    </Species>
  </Genus>
  <Interactions>
    <Interaction Type="SquareWell" Name="sticky" Diameter="D" Elasticity="1" Lambda="1.5" WellDepth="0.25">
      <PairRange Type="IntraChains" Start="0" End="1" Interval="2"/>
    </Interaction>
  </Interactions>
  <Locals>
    <Local Type="CylinderWall" Name="pipe" Elasticity="0.9" Radius="3">
      <Range Type="All"/>
      <Norm x="0" y="0" z="1"/>
      <Origin x="0" y="0" z="0"/>
    </Local>
  </Locals>
  <Globals>
    <Global Type="Cells" Name="cells" Width="1.5"/>
  </Globals>
  <Systems>
    <System Type="Halt" Name="halt" Time="100"/>
  </Systems>
  <ParticleData N="2">
    <Pt ID="0">
      <P x="-1" y="0" z="0"/>
      <V x="1" y="0" z="0"/>
    </Pt>
    <Pt ID="1">
      <P x="1" y="0" z="0"/>
      <V x="-1" y="0" z="0"/>
      <O w="1" x="0" y="0" z="0"/>
      <W x="0" y="0" z="2"/>
    </Pt>
  </ParticleData>
</SimConfig>
"#;

    #[test]
    fn written_snapshot_reloads_to_identical_bytes() {
        let sim = load_str(DOC).unwrap();
        let written = write_config(
            &sim.model,
            &sim.globals,
            &sim.systems,
            &sim.particles,
            &sim.units,
        )
        .unwrap();
        let sim2 = load_str(&written).unwrap();
        let rewritten = write_config(
            &sim2.model,
            &sim2.globals,
            &sim2.systems,
            &sim2.particles,
            &sim2.units,
        )
        .unwrap();
        assert_eq!(written, rewritten);
    }

    #[test]
    fn reload_preserves_semantics() {
        let sim = load_str(DOC).unwrap();
        let written = write_config(
            &sim.model,
            &sim.globals,
            &sim.systems,
            &sim.particles,
            &sim.units,
        )
        .unwrap();
        let sim2 = load_str(&written).unwrap();
        assert_eq!(sim.particles.len(), sim2.particles.len());
        assert_eq!(sim.model.seed, sim2.model.seed);
        assert_eq!(sim.model.interactions.len(), sim2.model.interactions.len());
        let ctx = sim.model.ctx();
        let ctx2 = sim2.model.ctx();
        assert_eq!(
            sim.model.interactions[0].max_int_dist(&ctx),
            sim2.model.interactions[0].max_int_dist(&ctx2)
        );
        assert_eq!(sim.particles[1].pos, sim2.particles[1].pos);
        let o1 = sim.particles[1].orientation.as_ref().unwrap();
        let o2 = sim2.particles[1].orientation.as_ref().unwrap();
        assert_eq!(o1.angvel, o2.angvel);
    }
}
