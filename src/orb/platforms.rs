//! Reading platform definitions back out of a scenario file

use chrono::NaiveDate;

use super::ast::{Atom, Definition, Line, Spanned};
use crate::error::ParseError;
use crate::scenario::{ClassicalElements, GroundStation, KeplerPlatform, NoradPlatform, Platform};

/// Parse a scenario file and return the user platforms it defines.
///
/// Platforms without a name, the application's own `.`-prefixed platforms
/// and definitions whose first line is not a usable `STATE` are skipped.
pub fn read_platforms(source: &str) -> Result<Vec<Platform>, Vec<ParseError>> {
    let file = super::parse(source)?;

    let mut platforms = Vec::new();
    let mut errors = Vec::new();
    for definition in file.definitions_of("PLATFORM") {
        match read_platform(definition) {
            Ok(Some(platform)) => platforms.push(platform),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        tracing::debug!("Read {} platforms", platforms.len());
        Ok(platforms)
    } else {
        Err(errors)
    }
}

fn read_platform(definition: &Definition) -> Result<Option<Platform>, ParseError> {
    let Some(name) = definition.name().map(|n| n.node.text()) else {
        return Ok(None);
    };
    if name.starts_with('.') {
        return Ok(None);
    }
    let system = definition.header.get(1).map(|a| a.node.text()).unwrap_or_default();

    let Some(state) = definition.lines.first().filter(|l| l.keyword() == Some("STATE")) else {
        return Ok(None);
    };
    let values = &state.atoms[1..];
    if values.len() != 3 && values.len() < 13 {
        return Ok(None);
    }

    let custom = values.iter().any(|a| a.node.is_word("CUSTOM"))
        || matches!(values.first().map(|a| &a.node), Some(Atom::Quoted(_)));
    if custom {
        read_kepler(name, system, state, values).map(|p| Some(p.into()))
    } else if values.len() == 3 {
        let body = central_body(definition).unwrap_or("Earth");
        let station = GroundStation::new(
            name,
            number(&values[0], "latitude")?,
            number(&values[1], "longitude")?,
            number(&values[2], "altitude")?,
        )
        .with_body(body);
        Ok(Some(station.into()))
    } else {
        read_norad(name, state, values).map(|p| Some(p.into()))
    }
}

fn read_kepler(
    name: &str,
    system: &str,
    state: &Line,
    values: &[Spanned<Atom>],
) -> Result<KeplerPlatform, ParseError> {
    if values.len() != 15 {
        return Err(arity(state, 15, values.len()));
    }
    let elements = ClassicalElements {
        semi_major_axis: number(&values[3], "semi-major axis")?,
        eccentricity: number(&values[4], "eccentricity")?,
        inclination: number(&values[5], "inclination")?,
        ra_of_asc_node: number(&values[6], "right ascension")?,
        arg_of_pericenter: number(&values[7], "argument of pericenter")?,
        mean_anomaly: number(&values[8], "mean anomaly")?,
    };

    // Epoch is written as six numbers; older files use `2020.0 7.0 ...`
    let mut parts = [0u32; 6];
    for (i, atom) in values[9..15].iter().enumerate() {
        let n = number(atom, "epoch")?;
        // Fractional seconds are dropped
        if n < 0.0 || (i < 5 && n.fract() != 0.0) {
            return Err(invalid(atom, "epoch component must be a whole number"));
        }
        parts[i] = n.trunc() as u32;
    }
    let [year, month, day, hour, minute, second] = parts;
    let epoch = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| ParseError::Invalid {
            span: values[9].span.start..values[14].span.end,
            message: "epoch is not a valid date and time".to_string(),
        })?;

    let mut platform = KeplerPlatform::new(name, values[0].node.text(), elements, epoch)
        .with_orbit_type(values[2].node.text());
    if !system.is_empty() {
        platform = platform.with_system(system);
    }
    platform.ic_type = values[1].node.text().to_string();
    Ok(platform)
}

fn read_norad(
    name: &str,
    state: &Line,
    values: &[Spanned<Atom>],
) -> Result<NoradPlatform, ParseError> {
    if values.len() != 15 {
        return Err(arity(state, 15, values.len()));
    }
    let text = |i: usize| values[i].node.text().to_string();
    Ok(NoradPlatform {
        object_name: name.to_string(),
        norad_cat_id: text(0),
        epoch_year: text(1),
        epoch_fraction: text(2),
        mean_motion_dot: text(3),
        mean_motion_ddot: text(4),
        bstar: text(5),
        ephemeris_type: text(6),
        element_set_no: text(7),
        inclination: text(8),
        ra_of_asc_node: text(9),
        eccentricity: text(10),
        arg_of_pericenter: text(11),
        mean_anomaly: text(12),
        mean_motion: text(13),
        rev_at_epoch: text(14),
    })
}

fn central_body(definition: &Definition) -> Option<&str> {
    definition
        .property("CENTRAL_BODY")
        .and_then(|line| line.atoms.get(1))
        .map(|a| a.node.text())
}

fn number(atom: &Spanned<Atom>, what: &str) -> Result<f64, ParseError> {
    match &atom.node {
        Atom::Word(w) => w
            .parse()
            .map_err(|_| invalid(atom, &format!("{} is not a number", what))),
        Atom::Quoted(_) => Err(invalid(atom, &format!("{} must not be quoted", what))),
    }
}

fn invalid(atom: &Spanned<Atom>, message: &str) -> ParseError {
    ParseError::Invalid {
        span: atom.span.clone(),
        message: message.to_string(),
    }
}

fn arity(state: &Line, expected: usize, found: usize) -> ParseError {
    ParseError::Invalid {
        span: state.span.clone(),
        message: format!("STATE has {} values, expected {}", found, expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_each_platform_kind() {
        let source = r#"BATCH_MODE ON

DEFINE PLATFORM ECR_FIXED "DSN:Madrid"
	STATE 40.42940560000000261 -4.24884720000000016 0.00000000000000000
	CENTRAL_BODY "Earth"

DEFINE PLATFORM KEPLER "MarsSat-2"
	STATE "Mars" CLASSICAL CUSTOM 32429.894046182384 0.5000000000000023 45.0 9.99999999999999 0.0 0.0 2020.0 7.0 7.0 0.0 0.0 0.0
	CENTRAL_BODY "Mars"

DEFINE PLATFORM NORAD "STARLINK-2708"
	STATE 48661 22 135.76775178 3.8e-05 0.0 0.00027384 0 999 53.0531 244.6948 0.0001725 48.601 311.5127 15.06403449 5390
"#;
        let platforms = read_platforms(source).expect("Should read");
        assert_eq!(platforms.len(), 3);

        let Platform::Ground(madrid) = &platforms[0] else {
            panic!("expected a ground station");
        };
        assert_eq!(madrid.object_name, "DSN:Madrid");
        assert_eq!(madrid.longitude, -4.24884720000000016);
        assert_eq!(madrid.body, "Earth");

        let Platform::Kepler(mars) = &platforms[1] else {
            panic!("expected a Kepler platform");
        };
        assert_eq!(mars.body, "Mars");
        assert_eq!(mars.system, "KEPLER");
        assert_eq!(mars.elements.inclination, 45.0);
        assert_eq!(mars.epoch.to_string(), "2020-07-07 00:00:00");

        let Platform::Norad(starlink) = &platforms[2] else {
            panic!("expected a NORAD platform");
        };
        assert_eq!(starlink.inclination, "53.0531");
        assert_eq!(starlink.rev_at_epoch, "5390");
    }

    #[test]
    fn test_skips_defaults_and_unusable_definitions() {
        let source = r#"DEFINE PLATFORM ECI_FIXED ".Moon CI Observer"
	STATE 0.0 0.0 0.0
DEFINE PLATFORM NORAD
	STATE 1 2 3
DEFINE PLATFORM ECR_FIXED "NoState"
	CENTRAL_BODY "Earth"
DEFINE PLATFORM NORAD "Short"
	STATE 1 2 3 4 5
DEFINE LINK "Link A - B"
	SOURCE "A"
"#;
        assert_eq!(read_platforms(source).expect("Should read"), vec![]);
    }

    #[test]
    fn test_bad_value_reports_span() {
        let source = "DEFINE PLATFORM ECR_FIXED \"GS\"\n\tSTATE north 1.0 0.0\n";
        let errors = read_platforms(source).expect_err("Should fail");
        assert_eq!(errors.len(), 1);
        assert_eq!(&source[errors[0].span().clone()], "north");
    }

    #[test]
    fn test_wrong_arity_reported() {
        let source = "DEFINE PLATFORM KEPLER \"X\"\n\tSTATE \"Moon\" CLASSICAL CUSTOM 1 2 3 4 5 6 2020 1 1 0 0\n";
        let errors = read_platforms(source).expect_err("Should fail");
        assert!(matches!(&errors[0], ParseError::Invalid { message, .. } if message.contains("expected 15")));
    }
}
