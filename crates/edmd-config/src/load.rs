//! Configuration document loader.

use crate::{ConfigError, LoadedSim, Result, Units};
use edmd_core::{
    Dimension, Orientation, PairRange, Particle, Property, PropertyStore, Range, Species,
};
use edmd_dynamics::{
    AndersenThermostat, CellGlobal, Global, Halt, Interaction, Liouvillean, Local, Model,
    PlateState, System,
};
use edmd_math::{BoundaryCondition, Mat3, Vec3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parse a full configuration document.
pub fn load_str(xml: &str) -> Result<LoadedSim> {
    Loader::default().parse(xml)
}

fn attr_opt(e: &BytesStart, name: &'static str) -> Result<Option<String>> {
    let found = e
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)?;
    match found {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn attr(e: &BytesStart, name: &'static str) -> Result<String> {
    attr_opt(e, name)?.ok_or_else(|| ConfigError::MissingAttribute {
        element: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attribute: name,
    })
}

fn attr_f64(e: &BytesStart, name: &'static str) -> Result<f64> {
    let value = attr(e, name)?;
    value.parse().map_err(|_| ConfigError::BadNumber {
        attribute: name,
        value,
    })
}

fn attr_u32(e: &BytesStart, name: &'static str) -> Result<u32> {
    let value = attr(e, name)?;
    value.parse().map_err(|_| ConfigError::BadNumber {
        attribute: name,
        value,
    })
}

fn attr_u64(e: &BytesStart, name: &'static str) -> Result<u64> {
    let value = attr(e, name)?;
    value.parse().map_err(|_| ConfigError::BadNumber {
        attribute: name,
        value,
    })
}

fn vec3_of(e: &BytesStart) -> Result<Vec3> {
    Ok(Vec3::new(
        attr_f64(e, "x")?,
        attr_f64(e, "y")?,
        attr_f64(e, "z")?,
    ))
}

fn csv_list<T: std::str::FromStr>(raw: &str, attribute: &'static str) -> Result<Vec<T>> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim().parse().map_err(|_| ConfigError::BadNumber {
                attribute,
                value: s.to_string(),
            })
        })
        .collect()
}

fn parse_range(e: &BytesStart) -> Result<Range> {
    match attr(e, "Type")?.as_str() {
        "All" => Ok(Range::All),
        "Single" => Ok(Range::Single(attr_u32(e, "ID")?)),
        "Interval" => Ok(Range::Interval {
            start: attr_u32(e, "Start")?,
            end: attr_u32(e, "End")?,
        }),
        "List" => Ok(Range::List(csv_list(&attr(e, "IDs")?, "IDs")?)),
        other => Err(ConfigError::UnknownType {
            element: "Range",
            value: other.to_string(),
        }),
    }
}

fn parse_pair_range(e: &BytesStart) -> Result<PairRange> {
    match attr(e, "Type")?.as_str() {
        "All" => Ok(PairRange::All),
        "Pair" => Ok(PairRange::Pair(attr_u32(e, "ID1")?, attr_u32(e, "ID2")?)),
        "List" => {
            let raw = attr(e, "Pairs")?;
            let mut pairs = Vec::new();
            for item in raw.split(',').filter(|s| !s.is_empty()) {
                let (a, b) = item
                    .split_once('-')
                    .ok_or_else(|| ConfigError::BadNumber {
                        attribute: "Pairs",
                        value: item.to_string(),
                    })?;
                let parse = |s: &str| {
                    s.trim().parse::<u32>().map_err(|_| ConfigError::BadNumber {
                        attribute: "Pairs",
                        value: item.to_string(),
                    })
                };
                pairs.push((parse(a)?, parse(b)?));
            }
            Ok(PairRange::List(pairs))
        }
        "IntraChains" => Ok(PairRange::intra_chains(
            attr_u32(e, "Start")?,
            attr_u32(e, "End")?,
            attr_u32(e, "Interval")?,
        )?),
        other => Err(ConfigError::UnknownType {
            element: "PairRange",
            value: other.to_string(),
        }),
    }
}

#[derive(Default)]
struct PendingInteraction {
    kind: String,
    name: String,
    attrs: Vec<(String, String)>,
    range: Option<PairRange>,
    rotation: Option<Mat3>,
}

#[derive(Default)]
struct PendingLocal {
    kind: String,
    name: String,
    elasticity: f64,
    attrs: Vec<(String, String)>,
    range: Option<Range>,
    norm: Option<Vec3>,
    origin: Option<Vec3>,
}

#[derive(Default)]
struct PendingSpecies {
    name: String,
    mass: String,
    int_name: String,
    range: Option<Range>,
}

#[derive(Default)]
struct PendingParticle {
    id: u32,
    pos: Option<Vec3>,
    vel: Option<Vec3>,
    quat: Option<[f64; 4]>,
    angvel: Option<Vec3>,
}

#[derive(Default)]
struct Loader {
    units: Units,
    bc: Option<BoundaryCondition>,
    bc_periodic: bool,
    liouvillean: Option<Liouvillean>,
    gravity_pending: bool,
    seed: u64,
    properties: PropertyStore,
    species: Vec<Species>,
    interactions: Vec<Interaction>,
    locals: Vec<Local>,
    globals: Vec<Global>,
    systems: Vec<System>,
    particles: Vec<Particle>,
    interaction: Option<PendingInteraction>,
    local: Option<PendingLocal>,
    species_pending: Option<PendingSpecies>,
    particle: Option<PendingParticle>,
}

impl Loader {
    fn parse(mut self, xml: &str) -> Result<LoadedSim> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.open(&tag, &e)?;
                }
                Ok(Event::End(e)) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.close(&tag)?;
                }
                Ok(Event::Eof) => break,
                Err(err) => return Err(err.into()),
                _ => {}
            }
            buf.clear();
        }
        self.finish()
    }

    fn open(&mut self, tag: &str, e: &BytesStart) -> Result<()> {
        match tag {
            "Units" => {
                self.units = Units {
                    length: attr_f64(e, "Length")?,
                    time: attr_f64(e, "Time")?,
                    mass: attr_f64(e, "Mass")?,
                };
            }
            "BC" => match attr(e, "Type")?.as_str() {
                "None" => self.bc = Some(BoundaryCondition::None),
                "Periodic" => self.bc_periodic = true,
                other => {
                    return Err(ConfigError::UnknownType {
                        element: "BC",
                        value: other.to_string(),
                    })
                }
            },
            "Dimensions" if self.bc_periodic => {
                self.bc = Some(BoundaryCondition::Periodic {
                    dims: vec3_of(e)? * self.units.length,
                });
            }
            "Dynamics" => match attr(e, "Type")?.as_str() {
                "Newtonian" => self.liouvillean = Some(Liouvillean::Newtonian),
                "Gravity" => self.gravity_pending = true,
                other => {
                    return Err(ConfigError::UnknownType {
                        element: "Dynamics",
                        value: other.to_string(),
                    })
                }
            },
            "G" if self.gravity_pending => {
                let accel = self.units.length / (self.units.time * self.units.time);
                self.liouvillean = Some(Liouvillean::Gravity(vec3_of(e)? * accel));
            }
            "Seed" => self.seed = attr_u64(e, "Value")?,
            "Property" => {
                let name = attr(e, "Name")?;
                let dimension = match attr_opt(e, "Units")?.as_deref() {
                    None | Some("Dimensionless") => Dimension::Dimensionless,
                    Some("Length") => Dimension::Length,
                    Some("Time") => Dimension::Time,
                    Some("Mass") => Dimension::Mass,
                    Some("Energy") => Dimension::Energy,
                    Some(other) => {
                        return Err(ConfigError::UnknownType {
                            element: "Property",
                            value: other.to_string(),
                        })
                    }
                };
                let property = match attr(e, "Type")?.as_str() {
                    "Fixed" => Property::fixed(name, attr_f64(e, "Value")?),
                    "PerParticle" => {
                        Property::per_particle(name, csv_list(&attr(e, "Values")?, "Values")?)
                    }
                    other => {
                        return Err(ConfigError::UnknownType {
                            element: "Property",
                            value: other.to_string(),
                        })
                    }
                };
                self.properties
                    .insert(property.with_dimension(dimension).scaled(self.units.scale_of(dimension)));
            }
            "Species" => {
                self.species_pending = Some(PendingSpecies {
                    name: attr(e, "Name")?,
                    mass: attr(e, "Mass")?,
                    int_name: attr(e, "IntName")?,
                    range: None,
                });
            }
            "Interaction" => {
                let mut pending = PendingInteraction {
                    kind: attr(e, "Type")?,
                    name: attr(e, "Name")?,
                    ..Default::default()
                };
                for key in ["Diameter", "Elasticity", "Lambda", "WellDepth"] {
                    if let Some(v) = attr_opt(e, key)? {
                        pending.attrs.push((key.to_string(), v));
                    }
                }
                self.interaction = Some(pending);
            }
            "Local" => {
                let mut pending = PendingLocal {
                    kind: attr(e, "Type")?,
                    name: attr(e, "Name")?,
                    elasticity: attr_f64(e, "Elasticity")?,
                    ..Default::default()
                };
                for key in ["Radius", "Sigma", "Delta", "Omega", "Phase"] {
                    if let Some(v) = attr_opt(e, key)? {
                        pending.attrs.push((key.to_string(), v));
                    }
                }
                self.local = Some(pending);
            }
            "Global" => match attr(e, "Type")?.as_str() {
                "Cells" => {
                    let width = attr_f64(e, "Width")? * self.units.length;
                    self.globals
                        .push(Global::Cells(CellGlobal::new(attr(e, "Name")?, width)));
                }
                other => {
                    return Err(ConfigError::UnknownType {
                        element: "Global",
                        value: other.to_string(),
                    })
                }
            },
            "System" => match attr(e, "Type")?.as_str() {
                "Andersen" => {
                    let idx = self.systems.len() as u64;
                    self.systems.push(System::Andersen(AndersenThermostat::new(
                        attr(e, "Name")?,
                        attr_f64(e, "Period")? * self.units.time,
                        attr_f64(e, "Temperature")? * self.units.energy(),
                        attr_f64(e, "Fraction")?,
                        self.seed.wrapping_add(idx),
                    )));
                }
                "Halt" => {
                    self.systems.push(System::Halt(Halt::new(
                        attr(e, "Name")?,
                        attr_f64(e, "Time")? * self.units.time,
                    )));
                }
                other => {
                    return Err(ConfigError::UnknownType {
                        element: "System",
                        value: other.to_string(),
                    })
                }
            },
            "Pt" => {
                self.particle = Some(PendingParticle {
                    id: attr_u32(e, "ID")?,
                    ..Default::default()
                });
            }
            "P" => {
                if let Some(p) = self.particle.as_mut() {
                    p.pos = Some(vec3_of(e)? * self.units.length);
                }
            }
            "V" => {
                if let Some(p) = self.particle.as_mut() {
                    p.vel = Some(vec3_of(e)? * self.units.velocity());
                }
            }
            "O" => {
                if let Some(p) = self.particle.as_mut() {
                    p.quat = Some([
                        attr_f64(e, "w")?,
                        attr_f64(e, "x")?,
                        attr_f64(e, "y")?,
                        attr_f64(e, "z")?,
                    ]);
                }
            }
            "W" => {
                if let Some(p) = self.particle.as_mut() {
                    p.angvel = Some(vec3_of(e)? / self.units.time);
                }
            }
            "Range" => {
                let range = parse_range(e)?;
                if let Some(local) = self.local.as_mut() {
                    local.range = Some(range);
                } else if let Some(species) = self.species_pending.as_mut() {
                    species.range = Some(range);
                }
            }
            "PairRange" => {
                if let Some(inter) = self.interaction.as_mut() {
                    inter.range = Some(parse_pair_range(e)?);
                }
            }
            "Rotation" => {
                if let Some(inter) = self.interaction.as_mut() {
                    let mut m = Mat3::zeros();
                    for (i, key) in ROTATION_KEYS.iter().enumerate() {
                        m[(i / 3, i % 3)] = attr_f64(e, key)?;
                    }
                    inter.rotation = Some(m);
                }
            }
            "Norm" => {
                if let Some(local) = self.local.as_mut() {
                    let n = vec3_of(e)?;
                    local.norm = Some(n / n.norm());
                }
            }
            "Origin" => {
                if let Some(local) = self.local.as_mut() {
                    local.origin = Some(vec3_of(e)? * self.units.length);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, tag: &str) -> Result<()> {
        match tag {
            "Interaction" => {
                let pending = self.interaction.take().ok_or_else(|| {
                    ConfigError::Structure("</Interaction> without opening element".into())
                })?;
                let interaction = self.finish_interaction(pending)?;
                self.interactions.push(interaction);
            }
            "Local" => {
                let pending = self.local.take().ok_or_else(|| {
                    ConfigError::Structure("</Local> without opening element".into())
                })?;
                let local = self.finish_local(pending)?;
                self.locals.push(local);
            }
            "Species" => {
                let pending = self.species_pending.take().ok_or_else(|| {
                    ConfigError::Structure("</Species> without opening element".into())
                })?;
                let range = pending
                    .range
                    .ok_or_else(|| ConfigError::Structure("Species without a Range".into()))?;
                let mass = match pending.mass.parse::<f64>() {
                    Ok(v) => edmd_core::PropertyRef::Inline(v * self.units.mass),
                    Err(_) => self.properties.parse_ref(&pending.mass)?,
                };
                self.species
                    .push(Species::new(pending.name, mass, range, pending.int_name));
            }
            "Pt" => {
                let pending = self.particle.take().ok_or_else(|| {
                    ConfigError::Structure("</Pt> without opening element".into())
                })?;
                self.finish_particle(pending)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn pending_attr(attrs: &[(String, String)], key: &'static str, element: &str) -> Result<String> {
        attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| ConfigError::MissingAttribute {
                element: element.to_string(),
                attribute: key,
            })
    }

    fn pending_f64(attrs: &[(String, String)], key: &'static str, element: &str) -> Result<f64> {
        let value = Self::pending_attr(attrs, key, element)?;
        value.parse().map_err(|_| ConfigError::BadNumber {
            attribute: key,
            value,
        })
    }

    fn finish_interaction(&mut self, pending: PendingInteraction) -> Result<Interaction> {
        let range = pending
            .range
            .ok_or_else(|| ConfigError::Structure("Interaction without a PairRange".into()))?;
        let scaled_ref = |raw: &str, scale: f64| -> Result<edmd_core::PropertyRef> {
            match raw.parse::<f64>() {
                Ok(v) => Ok(edmd_core::PropertyRef::Inline(v * scale)),
                Err(_) => Ok(self.properties.parse_ref(raw)?),
            }
        };
        match pending.kind.as_str() {
            "HardSphere" => Ok(Interaction::HardSphere {
                diameter: scaled_ref(
                    &Self::pending_attr(&pending.attrs, "Diameter", "Interaction")?,
                    self.units.length,
                )?,
                elasticity: scaled_ref(
                    &Self::pending_attr(&pending.attrs, "Elasticity", "Interaction")?,
                    1.0,
                )?,
                name: pending.name,
                range,
            }),
            "SquareWell" => Ok(Interaction::SquareWell {
                diameter: scaled_ref(
                    &Self::pending_attr(&pending.attrs, "Diameter", "Interaction")?,
                    self.units.length,
                )?,
                elasticity: scaled_ref(
                    &Self::pending_attr(&pending.attrs, "Elasticity", "Interaction")?,
                    1.0,
                )?,
                lambda: Self::pending_f64(&pending.attrs, "Lambda", "Interaction")?,
                well_depth: Self::pending_f64(&pending.attrs, "WellDepth", "Interaction")?
                    * self.units.energy(),
                name: pending.name,
                range,
            }),
            "ParallelCubes" => Ok(Interaction::ParallelCubes {
                diameter: Self::pending_f64(&pending.attrs, "Diameter", "Interaction")?
                    * self.units.length,
                elasticity: Self::pending_f64(&pending.attrs, "Elasticity", "Interaction")?,
                name: pending.name,
                range,
            }),
            "RotatedParallelCubes" => Ok(Interaction::RotatedParallelCubes {
                diameter: Self::pending_f64(&pending.attrs, "Diameter", "Interaction")?
                    * self.units.length,
                elasticity: Self::pending_f64(&pending.attrs, "Elasticity", "Interaction")?,
                rotation: pending.rotation.ok_or_else(|| {
                    ConfigError::Structure("RotatedParallelCubes without a Rotation".into())
                })?,
                name: pending.name,
                range,
            }),
            other => Err(ConfigError::UnknownType {
                element: "Interaction",
                value: other.to_string(),
            }),
        }
    }

    fn finish_local(&mut self, pending: PendingLocal) -> Result<Local> {
        let range = pending
            .range
            .ok_or_else(|| ConfigError::Structure("Local without a Range".into()))?;
        let norm = pending
            .norm
            .ok_or_else(|| ConfigError::Structure("Local without a Norm".into()))?;
        let origin = pending
            .origin
            .ok_or_else(|| ConfigError::Structure("Local without an Origin".into()))?;
        match pending.kind.as_str() {
            "PlaneWall" => Ok(Local::PlaneWall {
                name: pending.name,
                range,
                elasticity: pending.elasticity,
                origin,
                normal: norm,
            }),
            "DoubleWall" => Ok(Local::DoubleWall {
                name: pending.name,
                range,
                elasticity: pending.elasticity,
                origin,
                normal: norm,
                sigma: Self::pending_f64(&pending.attrs, "Sigma", "Local")? * self.units.length,
            }),
            "CylinderWall" => Ok(Local::CylinderWall {
                name: pending.name,
                range,
                elasticity: pending.elasticity,
                origin,
                axis: norm,
                radius: Self::pending_f64(&pending.attrs, "Radius", "Local")? * self.units.length,
            }),
            "OscillatingPlate" => Ok(Local::OscillatingPlate {
                name: pending.name,
                range,
                elasticity: pending.elasticity,
                plate: PlateState {
                    origin,
                    normal: norm,
                    delta: Self::pending_f64(&pending.attrs, "Delta", "Local")?
                        * self.units.length,
                    omega: Self::pending_f64(&pending.attrs, "Omega", "Local")? / self.units.time,
                    phase: Self::pending_f64(&pending.attrs, "Phase", "Local")?,
                    sigma: Self::pending_f64(&pending.attrs, "Sigma", "Local")?
                        * self.units.length,
                },
            }),
            other => Err(ConfigError::UnknownType {
                element: "Local",
                value: other.to_string(),
            }),
        }
    }

    fn finish_particle(&mut self, pending: PendingParticle) -> Result<()> {
        if pending.id as usize != self.particles.len() {
            return Err(ConfigError::Structure(format!(
                "particle IDs must be dense and ascending, expected {} got {}",
                self.particles.len(),
                pending.id
            )));
        }
        let pos = pending
            .pos
            .ok_or_else(|| ConfigError::Structure("Pt without a P element".into()))?;
        let vel = pending
            .vel
            .ok_or_else(|| ConfigError::Structure("Pt without a V element".into()))?;
        let mut particle = Particle::new(pending.id, pos, vel)?;
        if let (Some(q), Some(w)) = (pending.quat, pending.angvel) {
            particle = particle.with_orientation(Orientation {
                q: nalgebra::UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
                    q[0], q[1], q[2], q[3],
                )),
                angvel: w,
            });
        }
        self.particles.push(particle);
        Ok(())
    }

    fn finish(self) -> Result<LoadedSim> {
        let bc = self
            .bc
            .ok_or_else(|| ConfigError::Structure("missing <BC> element".into()))?;
        let liouvillean = self
            .liouvillean
            .ok_or_else(|| ConfigError::Structure("missing <Dynamics> element".into()))?;
        if self.species.is_empty() {
            return Err(ConfigError::Structure("no <Species> declared".into()));
        }
        let model = Model::new(
            bc,
            liouvillean,
            self.properties,
            self.species,
            self.interactions,
            self.locals,
            self.seed,
            self.particles.len(),
        )?;
        Ok(LoadedSim {
            model,
            globals: self.globals,
            systems: self.systems,
            particles: self.particles,
            units: self.units,
        })
    }
}

pub(crate) const ROTATION_KEYS: [&str; 9] =
    ["xx", "xy", "xz", "yx", "yy", "yz", "zx", "zy", "zz"];
