use super::config::ScanType;
use crate::core::dof::DegreeOfFreedom;
use crate::core::point::{ScanPoint, round_to_precision};
use rand::Rng;
use thiserror::Error;

/// Default bias factor of [`calculate_start_point`].
pub const DEFAULT_RFACTOR: f64 = 1.25;
const MAX_START_ATTEMPTS: usize = 999;
const LINSPACE_DIGITS: i32 = 7;

#[derive(Debug, Error, PartialEq)]
pub enum SamplingError {
    #[error("Degree of freedom '{dof}' has no scan limits")]
    MissingLimits { dof: String },
    #[error("Unable to find a valid start point in [{low}, {high}] after {attempts} attempts")]
    NoValidStartPoint { low: f64, high: f64, attempts: usize },
}

/// Minimum number of random points needed to fit a full quadratic in `k` DoFs, with margin.
pub fn min_full_random_points(k: usize) -> usize {
    let terms = 1 + 2 * k + k * k.saturating_sub(1) / 2;
    (1.2 * terms as f64).ceil() as usize
}

/// `num` evenly spaced values from `start` to `stop`, both inclusive.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let scale = 10f64.powi(LINSPACE_DIGITS);
            let mut values: Vec<f64> = (0..num)
                .map(|idx| ((start + step * idx as f64) * scale).round() / scale)
                .collect();
            values[num - 1] = stop;
            values
        }
    }
}

/// Generates reweight points for `dofs` using the given strategy.
///
/// Every coordinate is rounded to six digits. The returned list never contains
/// the start point and contains the SM point exactly once, unless the start
/// point itself is the SM point.
pub fn generate<R: Rng + ?Sized>(
    scan: ScanType,
    dofs: &[DegreeOfFreedom],
    num_points: usize,
    rng: &mut R,
) -> Result<Vec<ScanPoint>, SamplingError> {
    if num_points == 0 || dofs.is_empty() {
        return Ok(Vec::new());
    }
    let points = match scan {
        ScanType::FullLinspace => full_linear(dofs, num_points)?,
        ScanType::FullRandom => full_random(dofs, num_points, rng)?,
        ScanType::AxisLinspace => axis_linear(dofs, num_points)?,
        ScanType::AxisRandom => axis_random(dofs, num_points, rng)?,
        ScanType::FromFile | ScanType::None => Vec::new(),
    };
    Ok(points)
}

fn bounds(dof: &DegreeOfFreedom) -> Result<(f64, f64), SamplingError> {
    match (dof.low(), dof.high()) {
        (Some(low), Some(high)) => Ok((low, high)),
        _ => Err(SamplingError::MissingLimits {
            dof: dof.name().to_string(),
        }),
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    low + (high - low) * rng.gen_range(0.0..1.0)
}

/// Applies the SM/start-point bookkeeping shared by every strategy.
struct PointCollector {
    sm: ScanPoint,
    start: ScanPoint,
    has_sm: bool,
    points: Vec<ScanPoint>,
}

impl PointCollector {
    fn new(dofs: &[DegreeOfFreedom]) -> Self {
        let sm = ScanPoint::sm(dofs.iter().map(|d| d.name()));
        let start: ScanPoint = dofs.iter().map(|d| (d.name(), d.start())).collect();
        let has_sm = sm == start;
        Self {
            sm,
            start,
            has_sm,
            points: Vec::new(),
        }
    }

    fn push(&mut self, point: ScanPoint) {
        if point == self.start {
            return;
        }
        if point == self.sm {
            if self.has_sm {
                return;
            }
            self.has_sm = true;
        }
        self.points.push(point);
    }

    fn finish(mut self) -> Vec<ScanPoint> {
        if !self.has_sm {
            self.points.push(self.sm);
        }
        self.points
    }
}

fn full_linear(dofs: &[DegreeOfFreedom], n: usize) -> Result<Vec<ScanPoint>, SamplingError> {
    let axes = dofs
        .iter()
        .map(|d| bounds(d).map(|(low, high)| linspace(low, high, n)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut collector = PointCollector::new(dofs);
    let mut index = vec![0usize; dofs.len()];
    loop {
        let point: ScanPoint = dofs
            .iter()
            .zip(&index)
            .zip(&axes)
            .map(|((dof, &i), axis)| (dof.name(), round_to_precision(axis[i])))
            .collect();
        collector.push(point);

        // Odometer-style increment; the last DoF varies fastest.
        let mut pos = dofs.len();
        loop {
            if pos == 0 {
                return Ok(collector.finish());
            }
            pos -= 1;
            index[pos] += 1;
            if index[pos] < n {
                break;
            }
            index[pos] = 0;
        }
    }
}

fn full_random<R: Rng + ?Sized>(
    dofs: &[DegreeOfFreedom],
    n: usize,
    rng: &mut R,
) -> Result<Vec<ScanPoint>, SamplingError> {
    let ranges = dofs.iter().map(bounds).collect::<Result<Vec<_>, _>>()?;
    let mut collector = PointCollector::new(dofs);
    for _ in 0..n {
        let point: ScanPoint = dofs
            .iter()
            .zip(&ranges)
            .map(|(dof, &(low, high))| (dof.name(), round_to_precision(uniform(rng, low, high))))
            .collect();
        collector.push(point);
    }
    Ok(collector.finish())
}

fn axis_point(dofs: &[DegreeOfFreedom], axis: usize, value: f64) -> ScanPoint {
    dofs.iter()
        .enumerate()
        .map(|(idx, dof)| {
            let v = if idx == axis { round_to_precision(value) } else { 0.0 };
            (dof.name(), v)
        })
        .collect()
}

fn axis_linear(dofs: &[DegreeOfFreedom], n: usize) -> Result<Vec<ScanPoint>, SamplingError> {
    let mut collector = PointCollector::new(dofs);
    for (axis, dof) in dofs.iter().enumerate() {
        let (low, high) = bounds(dof)?;
        for v in linspace(low, high, n) {
            collector.push(axis_point(dofs, axis, v));
        }
    }
    Ok(collector.finish())
}

fn axis_random<R: Rng + ?Sized>(
    dofs: &[DegreeOfFreedom],
    n: usize,
    rng: &mut R,
) -> Result<Vec<ScanPoint>, SamplingError> {
    let mut collector = PointCollector::new(dofs);
    for (axis, dof) in dofs.iter().enumerate() {
        let (low, high) = bounds(dof)?;
        for _ in 0..n {
            collector.push(axis_point(dofs, axis, uniform(rng, low, high)));
        }
    }
    Ok(collector.finish())
}

/// Draws a start value in `[low, high]` biased away from zero.
///
/// A sample `v` is accepted once `|v| * rfactor` exceeds the magnitude of the
/// bound on `v`'s side of zero; smaller `rfactor` pushes accepted values further
/// out. Gives up after a bounded number of attempts.
pub fn calculate_start_point<R: Rng + ?Sized>(
    low: f64,
    high: f64,
    rfactor: f64,
    rng: &mut R,
) -> Result<f64, SamplingError> {
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    for _ in 0..=MAX_START_ATTEMPTS {
        let v = round_to_precision(uniform(rng, low, high));
        let bound = if v < 0.0 { low } else { high };
        if v.abs() * rfactor > bound.abs() {
            return Ok(v);
        }
    }
    Err(SamplingError::NoValidStartPoint {
        low,
        high,
        attempts: MAX_START_ATTEMPTS + 1,
    })
}
