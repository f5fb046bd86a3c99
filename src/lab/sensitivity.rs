use serde::{Deserialize, Serialize};

use crate::config::check_probability;
use crate::error::OutbreakError;

/// One step of a windowed curve. An open `to_day` runs to the end of the illness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityWindow {
    pub from_day: i32,
    #[serde(default)]
    pub to_day: Option<i32>,
    pub sensitivity: f64,
}

impl SensitivityWindow {
    fn contains(&self, day: i32) -> bool {
        self.from_day <= day && self.to_day.is_none_or(|to_day| day <= to_day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub day: i32,
    pub sensitivity: f64,
}

/// Test sensitivity as a function of days since onset.
///
/// Windows are step functions: the first window containing the day wins, and a day no window
/// covers has no curve value. Points are interpolated linearly and held flat beyond the first and
/// last point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityCurve {
    Windows(Vec<SensitivityWindow>),
    Points(Vec<SensitivityPoint>),
}

impl SensitivityCurve {
    pub fn at(&self, day: i32) -> Option<f64> {
        match self {
            SensitivityCurve::Windows(windows) => windows
                .iter()
                .find(|window| window.contains(day))
                .map(|window| window.sensitivity),
            SensitivityCurve::Points(points) => interpolate(points, day),
        }
    }

    /// # Errors
    ///
    /// Returns `OutbreakError::Configuration` for an empty curve, a value that is not a
    /// probability, an inverted window, or points whose days are not strictly increasing.
    pub fn validate(&self, test: &str) -> Result<(), OutbreakError> {
        match self {
            SensitivityCurve::Windows(windows) => {
                if windows.is_empty() {
                    return Err(empty_curve(test));
                }
                for window in windows {
                    check_probability(
                        &format!("lab test {test} sensitivity from day {}", window.from_day),
                        window.sensitivity,
                    )?;
                    if window.to_day.is_some_and(|to_day| to_day < window.from_day) {
                        return Err(OutbreakError::Configuration(format!(
                            "lab test {test} has a sensitivity window ending before day {}",
                            window.from_day
                        )));
                    }
                }
            }
            SensitivityCurve::Points(points) => {
                if points.is_empty() {
                    return Err(empty_curve(test));
                }
                for point in points {
                    check_probability(
                        &format!("lab test {test} sensitivity on day {}", point.day),
                        point.sensitivity,
                    )?;
                }
                if points.windows(2).any(|pair| pair[0].day >= pair[1].day) {
                    return Err(OutbreakError::Configuration(format!(
                        "lab test {test} sensitivity points must have increasing days"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn empty_curve(test: &str) -> OutbreakError {
    OutbreakError::Configuration(format!("lab test {test} has an empty sensitivity curve"))
}

fn interpolate(points: &[SensitivityPoint], day: i32) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    if day <= first.day {
        return Some(first.sensitivity);
    }
    if day >= last.day {
        return Some(last.sensitivity);
    }
    let upper = points.iter().position(|point| point.day >= day)?;
    let (left, right) = (points[upper - 1], points[upper]);
    let span = f64::from(right.day - left.day);
    let fraction = f64::from(day - left.day) / span;
    Some(left.sensitivity + fraction * (right.sensitivity - left.sensitivity))
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    fn mat() -> SensitivityCurve {
        SensitivityCurve::Windows(vec![
            SensitivityWindow {
                from_day: 0,
                to_day: Some(7),
                sensitivity: 0.2,
            },
            SensitivityWindow {
                from_day: 8,
                to_day: None,
                sensitivity: 0.9,
            },
        ])
    }

    #[test]
    fn windows_are_steps() {
        let curve = mat();
        assert_eq!(curve.at(-1), None);
        assert_eq!(curve.at(0), Some(0.2));
        assert_eq!(curve.at(7), Some(0.2));
        assert_eq!(curve.at(8), Some(0.9));
        assert_eq!(curve.at(40), Some(0.9));
    }

    #[test]
    fn points_interpolate_and_hold() {
        let curve = SensitivityCurve::Points(vec![
            SensitivityPoint {
                day: 0,
                sensitivity: 0.3,
            },
            SensitivityPoint {
                day: 10,
                sensitivity: 0.8,
            },
        ]);
        assert_approx_eq!(curve.at(5).unwrap(), 0.55);
        assert_approx_eq!(curve.at(-3).unwrap(), 0.3);
        assert_approx_eq!(curve.at(30).unwrap(), 0.8);
    }

    #[test]
    fn curves_parse_from_config() {
        let curve: SensitivityCurve = serde_json::from_str(
            r#"{ "windows": [ { "from_day": 0, "to_day": 7, "sensitivity": 0.2 },
                              { "from_day": 8, "sensitivity": 0.9 } ] }"#,
        )
        .unwrap();
        assert_eq!(curve, mat());
    }

    #[test]
    fn invalid_curves_are_rejected() {
        assert!(SensitivityCurve::Windows(Vec::new()).validate("MAT").is_err());
        assert!(SensitivityCurve::Points(vec![
            SensitivityPoint {
                day: 3,
                sensitivity: 0.5
            },
            SensitivityPoint {
                day: 3,
                sensitivity: 0.6
            },
        ])
        .validate("MAT")
        .is_err());
        assert!(SensitivityCurve::Windows(vec![SensitivityWindow {
            from_day: 0,
            to_day: None,
            sensitivity: 1.2,
        }])
        .validate("MAT")
        .is_err());
        mat().validate("MAT").unwrap();
    }
}
