//! Typed platforms and the standard analysis scenario
//!
//! [`ScenarioBuilder`] turns a list of platforms into the scenario request
//! for a full contact, distance and coordinate analysis, and says which
//! report files the application will write when it runs it.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::compose::{EntryRequest, ScenarioRequest};
use crate::profile::Profile;
use crate::report::{FieldSpec, FieldType, LabelRule, Preamble, ReportError, ReportSchema};
use crate::template::Value;

/// Bodies the base template carries observer platforms for
const OBSERVED_BODIES: [&str; 2] = ["Moon", "Mars"];

/// Error reading a two-line element set
#[derive(Debug, Error, PartialEq)]
#[error("TLE line {line}: {reason}")]
pub struct TleError {
    pub line: u8,
    pub reason: String,
}

/// Satellite propagated by the application from a two-line element set.
///
/// Fields hold the TLE text as written; the application parses them itself.
#[derive(Debug, Clone, PartialEq)]
pub struct NoradPlatform {
    pub object_name: String,
    pub norad_cat_id: String,
    pub epoch_year: String,
    pub epoch_fraction: String,
    pub mean_motion_dot: String,
    pub mean_motion_ddot: String,
    pub bstar: String,
    pub ephemeris_type: String,
    pub element_set_no: String,
    pub inclination: String,
    pub ra_of_asc_node: String,
    pub eccentricity: String,
    pub arg_of_pericenter: String,
    pub mean_anomaly: String,
    pub mean_motion: String,
    pub rev_at_epoch: String,
}

impl NoradPlatform {
    /// Read the fixed columns of a two-line element set
    pub fn from_tle(name: impl Into<String>, line1: &str, line2: &str) -> Result<Self, TleError> {
        let field = |line: &str, no: u8, range: std::ops::Range<usize>, what: &str| {
            line.get(range)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| TleError {
                    line: no,
                    reason: format!("missing {}", what),
                })
        };
        for (no, line) in [(1u8, line1), (2u8, line2)] {
            if !line.starts_with(char::from(b'0' + no)) {
                return Err(TleError {
                    line: no,
                    reason: format!("expected line number {}", no),
                });
            }
        }

        Ok(Self {
            object_name: name.into(),
            norad_cat_id: field(line1, 1, 2..7, "catalog number")?,
            epoch_year: field(line1, 1, 18..20, "epoch year")?,
            epoch_fraction: field(line1, 1, 20..32, "epoch day")?,
            mean_motion_dot: field(line1, 1, 33..43, "mean motion derivative")?,
            mean_motion_ddot: field(line1, 1, 44..52, "mean motion second derivative")?,
            bstar: field(line1, 1, 53..61, "drag term")?,
            ephemeris_type: field(line1, 1, 62..63, "ephemeris type")?,
            element_set_no: field(line1, 1, 64..68, "element set number")?,
            inclination: field(line2, 2, 8..16, "inclination")?,
            ra_of_asc_node: field(line2, 2, 17..25, "right ascension")?,
            eccentricity: field(line2, 2, 26..33, "eccentricity")?,
            arg_of_pericenter: field(line2, 2, 34..42, "argument of perigee")?,
            mean_anomaly: field(line2, 2, 43..51, "mean anomaly")?,
            mean_motion: field(line2, 2, 52..63, "mean motion")?,
            rev_at_epoch: field(line2, 2, 63..68, "revolution number")?,
        })
    }

    fn entry(&self) -> EntryRequest {
        EntryRequest::new("platform_norad")
            .with("object_name", self.object_name.as_str())
            .with("norad_cat_id", self.norad_cat_id.as_str())
            .with("epoch_year", self.epoch_year.as_str())
            .with("epoch_fraction", self.epoch_fraction.as_str())
            .with("mean_motion_dot", self.mean_motion_dot.as_str())
            .with("mean_motion_ddot", self.mean_motion_ddot.as_str())
            .with("bstar", self.bstar.as_str())
            .with("ephemeris_type", self.ephemeris_type.as_str())
            .with("element_set_no", self.element_set_no.as_str())
            .with("inclination", self.inclination.as_str())
            .with("ra_of_asc_node", self.ra_of_asc_node.as_str())
            .with("eccentricity", self.eccentricity.as_str())
            .with("arg_of_pericenter", self.arg_of_pericenter.as_str())
            .with("mean_anomaly", self.mean_anomaly.as_str())
            .with("mean_motion", self.mean_motion.as_str())
            .with("rev_at_epoch", self.rev_at_epoch.as_str())
    }
}

/// Classical orbital elements (km, degrees)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassicalElements {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub ra_of_asc_node: f64,
    pub arg_of_pericenter: f64,
    pub mean_anomaly: f64,
}

/// Platform defined by orbital elements around any body
#[derive(Debug, Clone, PartialEq)]
pub struct KeplerPlatform {
    pub system: String,
    pub object_name: String,
    pub body: String,
    pub ic_type: String,
    pub orbit_type: String,
    pub elements: ClassicalElements,
    pub epoch: NaiveDateTime,
}

impl KeplerPlatform {
    pub fn new(
        object_name: impl Into<String>,
        body: impl Into<String>,
        elements: ClassicalElements,
        epoch: NaiveDateTime,
    ) -> Self {
        Self {
            system: "KEPLER".to_string(),
            object_name: object_name.into(),
            body: body.into(),
            ic_type: "CLASSICAL".to_string(),
            orbit_type: "CUSTOM".to_string(),
            elements,
            epoch,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_orbit_type(mut self, orbit_type: impl Into<String>) -> Self {
        self.orbit_type = orbit_type.into();
        self
    }

    fn entry(&self) -> EntryRequest {
        let e = &self.elements;
        EntryRequest::new("platform_custom")
            .with("system", Value::token(self.system.as_str()))
            .with("object_name", self.object_name.as_str())
            .with("body", self.body.as_str())
            .with("ic_type", Value::token(self.ic_type.as_str()))
            .with("orbit_type", Value::token(self.orbit_type.as_str()))
            .with("semi_major_axis", e.semi_major_axis)
            .with("eccentricity", e.eccentricity)
            .with("inclination", e.inclination)
            .with("ra_of_asc_node", e.ra_of_asc_node)
            .with("arg_of_pericenter", e.arg_of_pericenter)
            .with("mean_anomaly", e.mean_anomaly)
            .with("epoch", self.epoch)
    }
}

/// Fixed site on a body's surface (degrees, km)
#[derive(Debug, Clone, PartialEq)]
pub struct GroundStation {
    pub object_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub body: String,
}

impl GroundStation {
    pub fn new(
        object_name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        altitude: f64,
    ) -> Self {
        Self {
            object_name: object_name.into(),
            latitude,
            longitude,
            altitude,
            body: "Earth".to_string(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn entry(&self) -> EntryRequest {
        EntryRequest::new("platform_ground")
            .with("object_name", self.object_name.as_str())
            .with("latitude", self.latitude)
            .with("longitude", self.longitude)
            .with("altitude", self.altitude)
            .with("body", self.body.as_str())
    }
}

/// Any platform the scenario can contain
#[derive(Debug, Clone, PartialEq)]
pub enum Platform {
    Norad(NoradPlatform),
    Kepler(KeplerPlatform),
    Ground(GroundStation),
}

impl Platform {
    pub fn name(&self) -> &str {
        match self {
            Platform::Norad(p) => &p.object_name,
            Platform::Kepler(p) => &p.object_name,
            Platform::Ground(p) => &p.object_name,
        }
    }

    /// Central body
    pub fn body(&self) -> &str {
        match self {
            Platform::Norad(_) => "Earth",
            Platform::Kepler(p) => &p.body,
            Platform::Ground(p) => &p.body,
        }
    }

    /// Request entry that adds this platform
    pub fn entry(&self) -> EntryRequest {
        match self {
            Platform::Norad(p) => p.entry(),
            Platform::Kepler(p) => p.entry(),
            Platform::Ground(p) => p.entry(),
        }
    }
}

impl From<NoradPlatform> for Platform {
    fn from(p: NoradPlatform) -> Self {
        Platform::Norad(p)
    }
}

impl From<KeplerPlatform> for Platform {
    fn from(p: KeplerPlatform) -> Self {
        Platform::Kepler(p)
    }
}

impl From<GroundStation> for Platform {
    fn from(p: GroundStation) -> Self {
        Platform::Ground(p)
    }
}

/// A report file the application writes when it runs a scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedReport {
    pub file_name: String,
    pub schema: ReportSchema,
}

/// Request for a scenario plus the reports it produces
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioPlan {
    pub request: ScenarioRequest,
    pub reports: Vec<ExpectedReport>,
}

/// Builds the standard analysis scenario for a set of platforms
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    name: String,
    epoch: NaiveDateTime,
    step_size: i64,
    duration: i64,
    batch_mode: bool,
    warnings: bool,
    platforms: Vec<Platform>,
}

impl ScenarioBuilder {
    /// Scenario starting at `epoch`, one day long with hourly steps
    pub fn new(name: impl Into<String>, epoch: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            epoch,
            step_size: 3_600,
            duration: 86_400,
            batch_mode: true,
            warnings: false,
            platforms: Vec::new(),
        }
    }

    /// Step of the stepped reports, in seconds
    pub fn with_step_size(mut self, seconds: i64) -> Self {
        self.step_size = seconds;
        self
    }

    /// Length of every report, in seconds
    pub fn with_duration(mut self, seconds: i64) -> Self {
        self.duration = seconds;
        self
    }

    /// Run the scenario without a user interface and exit
    pub fn with_batch_mode(mut self, on: bool) -> Self {
        self.batch_mode = on;
        self
    }

    pub fn with_warnings(mut self, on: bool) -> Self {
        self.warnings = on;
        self
    }

    pub fn with_platform(mut self, platform: impl Into<Platform>) -> Self {
        self.platforms.push(platform.into());
        self
    }

    pub fn with_platforms<I, P>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Platform>,
    {
        self.platforms.extend(platforms.into_iter().map(Into::into));
        self
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Build the request and the expected reports.
    ///
    /// Fails if the profile has no pinned contact report schema.
    pub fn build(&self, profile: &Profile) -> Result<ScenarioPlan, ReportError> {
        let contact_schema = profile
            .report_schema("contact")
            .cloned()
            .ok_or_else(|| ReportError::UnknownKind {
                kind: "contact".to_string(),
            })?;

        let names: Vec<&str> = self.platforms.iter().map(|p| p.name()).collect();
        let pairs: Vec<(&str, &str)> = names
            .iter()
            .enumerate()
            .flat_map(|(i, &s)| names[i + 1..].iter().map(move |&t| (s, t)))
            .collect();

        let mut request = ScenarioRequest::new("base")
            .with_binding("batchmode", self.batch_mode)
            .with_binding("warnings", self.warnings)
            .with_binding("epoch", self.epoch);

        for platform in &self.platforms {
            request.push(platform.entry());
        }
        for name in &names {
            request.push(EntryRequest::new("transmitter").with("object_name", *name));
        }
        for (s, t) in &pairs {
            request.push(
                EntryRequest::new("link")
                    .with("link_name", format!("Link {} - {}", s, t))
                    .with("source", *s)
                    .with("target", *t),
            );
        }
        for (s, t) in &pairs {
            request.push(EntryRequest::new("receiver").with("a", *s).with("b", *t));
        }

        for body in OBSERVED_BODIES {
            let observed: Vec<&str> = self
                .platforms
                .iter()
                .filter(|p| p.body() == body)
                .map(|p| p.name())
                .collect();
            for frame in ["CI", "CR"] {
                let origin = format!(".{} {} Observer", body, frame);
                request.push(
                    EntryRequest::new("observer_view")
                        .with("view_id", format!("{} View", origin))
                        .with("origin", origin)
                        .with("coordinate_system", format!(".{} Nadir", body))
                        .with("platforms", Value::list(observed.iter().copied())),
                );
            }
        }

        // Contact analysis: received power on every pair, reported at rise and set
        let contact_vars: Vec<String> = pairs
            .iter()
            .map(|(s, t)| format!("Contact {} - {}", s, t))
            .collect();
        for ((s, t), var) in pairs.iter().zip(&contact_vars) {
            let pair = vec![format!("{} - {}", s, t)];
            request.push(variable(var, "RX_TPOWER", pair, -998.0, 30.0));
        }
        let contact_report = format!("{} Contact Analysis", self.name);
        request.push(self.report(&contact_report, "RISE_SET", 3_600, &[], &contact_vars));

        let distance_vars: Vec<String> = pairs
            .iter()
            .map(|(s, t)| format!("Distance {} - {}", s, t))
            .collect();
        for ((s, t), var) in pairs.iter().zip(&distance_vars) {
            request.push(variable(
                var,
                "RANGE_MAGNITUDE",
                vec![s.to_string(), t.to_string()],
                0.0,
                250_000_000.0,
            ));
        }
        let distance_report = format!("{} Distances", self.name);
        let step_size = self.step_size;
        request.push(self.report(&distance_report, "DELTA", step_size, &distance_vars, &[]));

        let mut coordinate_vars = Vec::new();
        for axis in ["X", "Y", "Z"] {
            for platform in names.iter().copied().chain(["Moon"]) {
                let var = format!("{} - {}-Coordinate", platform, axis);
                request.push(variable(
                    &var,
                    &format!("POSITION_{}", axis),
                    vec![".Earth Cartesian".to_string(), platform.to_string(), "Earth".to_string()],
                    0.0,
                    63_781.37,
                ));
                coordinate_vars.push(var);
            }
        }
        let coordinate_report = format!("{} Coordinates", self.name);
        request.push(self.report(&coordinate_report, "DELTA", step_size, &coordinate_vars, &[]));

        let reports = vec![
            ExpectedReport {
                file_name: format!("{}.csv", contact_report),
                schema: contact_schema,
            },
            ExpectedReport {
                file_name: format!("{}.csv", distance_report),
                schema: stepped_schema("distances", &distance_vars)
                    .with_label_rule(LabelRule::replace("Dist ", "Distance "))
                    .with_label_rule(LabelRule::replace(" to ", " - "))
                    .with_label_rule(LabelRule::replace(" sees ", " - ")),
            },
            ExpectedReport {
                file_name: format!("{}.csv", coordinate_report),
                schema: stepped_schema("coordinates", &coordinate_vars),
            },
        ];

        tracing::info!(
            "Scenario '{}': {} platforms, {} pairs, {} entries",
            self.name,
            self.platforms.len(),
            pairs.len(),
            request.entries.len()
        );
        Ok(ScenarioPlan { request, reports })
    }

    fn report(
        &self,
        name: &str,
        kind: &str,
        step_size: i64,
        step: &[String],
        rise_set: &[String],
    ) -> EntryRequest {
        EntryRequest::new("analysis_report")
            .with("name", name)
            .with("trpt", Value::token(kind))
            .with("duration", self.duration)
            .with("step_size", step_size)
            .with("variables_step", Value::list(step.iter().cloned()))
            .with("variables_riseset", Value::list(rise_set.iter().cloned()))
    }
}

fn variable(
    name: &str,
    vtype: &str,
    arguments: Vec<String>,
    lower: f64,
    upper: f64,
) -> EntryRequest {
    EntryRequest::new("analysis_variable")
        .with("name", name)
        .with("vtype", Value::token(vtype))
        .with("variables", Value::List(arguments))
        .with("lower", lower)
        .with("upper", upper)
}

/// Stepped reports start with free text, then a `TIME_UNITS` header and a
/// row of units
fn stepped_schema(kind: &str, variables: &[String]) -> ReportSchema {
    let fields = std::iter::once("TIME_UNITS")
        .chain(variables.iter().map(String::as_str))
        .map(|name| FieldSpec::new(name, FieldType::Float))
        .collect();
    ReportSchema::new(kind, fields)
        .with_preamble(Preamble::UntilHeader)
        .with_units_rows(1)
}
