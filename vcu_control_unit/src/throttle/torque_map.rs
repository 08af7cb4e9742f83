//! Piecewise-linear pedal to torque map.

use heapless::Vec as HVec;
use thiserror::Error;
use vcu_common::consts::MAX_TORQUE_MAP_POINTS;
use vcu_common::vehicle::config::TorqueMapConfig;

/// Torque map construction failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TorqueMapError {
    #[error("torque map needs at least 2 breakpoints, got {0}")]
    TooFewPoints(usize),

    #[error("torque map has too many breakpoints ({0})")]
    TooManyPoints(usize),

    #[error("{pedal} pedal breakpoints but {torque} torque values")]
    LengthMismatch { pedal: usize, torque: usize },

    #[error("pedal breakpoint {0} is not strictly above its predecessor")]
    NotAscending(usize),

    #[error("pedal breakpoints [{first}, {last}] do not cover [0, 1]")]
    DomainNotCovered { first: f32, last: f32 },

    #[error("breakpoint {0} is not finite")]
    NonFinite(usize),
}

/// One `(pedal, torque)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    /// Pedal fraction.
    pub pedal: f32,
    /// Torque [Nm].
    pub torque: f32,
}

/// Immutable breakpoint table.
#[derive(Debug, Clone, PartialEq)]
pub struct TorqueMap {
    points: HVec<Breakpoint, MAX_TORQUE_MAP_POINTS>,
}

impl TorqueMap {
    /// Build a map from ordered breakpoints.
    ///
    /// Pedal values must be finite, strictly ascending and span `[0, 1]`.
    pub fn new(points: &[Breakpoint]) -> Result<Self, TorqueMapError> {
        if points.len() < 2 {
            return Err(TorqueMapError::TooFewPoints(points.len()));
        }
        if points.len() > MAX_TORQUE_MAP_POINTS {
            return Err(TorqueMapError::TooManyPoints(points.len()));
        }
        for (i, p) in points.iter().enumerate() {
            if !p.pedal.is_finite() || !p.torque.is_finite() {
                return Err(TorqueMapError::NonFinite(i));
            }
            if i > 0 && p.pedal <= points[i - 1].pedal {
                return Err(TorqueMapError::NotAscending(i));
            }
        }
        let (first, last) = (points[0].pedal, points[points.len() - 1].pedal);
        if first > 0.0 || last < 1.0 {
            return Err(TorqueMapError::DomainNotCovered { first, last });
        }

        let mut table = HVec::new();
        for p in points {
            table
                .push(*p)
                .map_err(|_| TorqueMapError::TooManyPoints(points.len()))?;
        }
        Ok(Self { points: table })
    }

    pub fn from_config(config: &TorqueMapConfig) -> Result<Self, TorqueMapError> {
        if config.pedal.len() != config.torque.len() {
            return Err(TorqueMapError::LengthMismatch {
                pedal: config.pedal.len(),
                torque: config.torque.len(),
            });
        }
        let mut points: HVec<Breakpoint, MAX_TORQUE_MAP_POINTS> = HVec::new();
        for (&pedal, &torque) in config.pedal.iter().zip(config.torque.iter()) {
            points
                .push(Breakpoint { pedal, torque })
                .map_err(|_| TorqueMapError::TooManyPoints(config.pedal.len()))?;
        }
        Self::new(&points)
    }

    #[inline]
    pub fn points(&self) -> &[Breakpoint] {
        &self.points
    }

    /// Torque at pedal fraction `x`.
    ///
    /// Buckets are scanned in order and the last one whose closed interval
    /// contains `x` is used, so a shared boundary resolves to the later
    /// bucket. Inputs outside the table (including NaN) yield 0.
    pub fn interpolate(&self, x: f32) -> f32 {
        let mut result = 0.0;
        for w in self.points.windows(2) {
            let (lo, hi) = (w[0], w[1]);
            if x >= lo.pedal && x <= hi.pedal {
                let t = (x - lo.pedal) / (hi.pedal - lo.pedal);
                result = (1.0 - t) * lo.torque + t * hi.torque;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn forward() -> TorqueMap {
        TorqueMap::from_config(&TorqueMapConfig::default_forward()).unwrap()
    }

    #[test]
    fn test_forward_reference_points() {
        let map = forward();
        let cases = [
            (0.05, 0.0),
            (0.1, 0.0),
            (0.2, 25.0),
            (0.4, 75.0),
            (0.5, 100.0),
            (0.6, 150.0),
            (0.7, 200.0),
            (0.8, 300.0),
            (0.9, 400.0),
            (1.0, 500.0),
        ];
        for (pedal, torque) in cases {
            let got = map.interpolate(pedal);
            assert!(approx(got, torque), "pedal {pedal}: {got} != {torque}");
        }
    }

    #[test]
    fn test_outside_table_is_zero() {
        let map = forward();
        assert_eq!(map.interpolate(-0.1), 0.0);
        assert_eq!(map.interpolate(1.1), 0.0);
        assert_eq!(map.interpolate(f32::NAN), 0.0);
    }

    #[test]
    fn test_shared_boundary() {
        let map = TorqueMap::new(&[
            Breakpoint { pedal: 0.0, torque: 0.0 },
            Breakpoint { pedal: 0.5, torque: 10.0 },
            Breakpoint { pedal: 1.0, torque: 50.0 },
        ])
        .unwrap();
        assert!(approx(map.interpolate(0.5), 10.0));
        assert!(approx(map.interpolate(0.75), 30.0));
    }

    #[test]
    fn test_reverse_map_saturates() {
        let map = TorqueMap::from_config(&TorqueMapConfig::default_reverse()).unwrap();
        assert!(approx(map.interpolate(0.6), 47.5));
        assert!(approx(map.interpolate(0.85), 75.0));
    }

    #[test]
    fn test_construction_errors() {
        let p = |pedal, torque| Breakpoint { pedal, torque };
        assert_eq!(
            TorqueMap::new(&[p(0.0, 0.0)]),
            Err(TorqueMapError::TooFewPoints(1))
        );
        assert_eq!(
            TorqueMap::new(&[p(0.0, 0.0), p(0.6, 1.0), p(0.6, 2.0), p(1.0, 3.0)]),
            Err(TorqueMapError::NotAscending(2))
        );
        assert_eq!(
            TorqueMap::new(&[p(0.0, 0.0), p(0.9, 1.0)]),
            Err(TorqueMapError::DomainNotCovered { first: 0.0, last: 0.9 })
        );
        assert_eq!(
            TorqueMap::new(&[p(0.0, f32::INFINITY), p(1.0, 1.0)]),
            Err(TorqueMapError::NonFinite(0))
        );
    }
}
