//! Synthetic vehicle positions along a closed loop of waypoints.
//!
//! Every vehicle runs the same loop, shifted in time by its phase offset so
//! the fleet stays evenly spread. Positions are a pure function of the clock
//! reading handed in; nothing is remembered between calls.

use serde::Serialize;
use thiserror::Error;

// Kawangware -> Westlands -> CBD and back again.
pub const DEMO_ROUTE: [Waypoint; 5] = [
    Waypoint::new(-1.2821, 36.7512),
    Waypoint::new(-1.2750, 36.7800),
    Waypoint::new(-1.2673, 36.8111),
    Waypoint::new(-1.2800, 36.8150),
    Waypoint::new(-1.2921, 36.8219),
];

pub const DEFAULT_LOOP_SECONDS: f64 = 240.0;
pub const DEFAULT_VEHICLE_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error("a loop needs at least 2 waypoints, got {0}")]
    TooFewWaypoints(usize),
    #[error("loop period must be a positive number of seconds, got {0}")]
    InvalidPeriod(f64),
    #[error("waypoint {index} has a non-finite coordinate")]
    NonFiniteWaypoint { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedVehicle {
    pub id: String,
    /// Seconds added to the clock before placing this vehicle on the loop.
    pub phase_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: f64,
    pub timestamp: f64,
}

/// Where on the loop a given clock reading lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPoint {
    /// Seconds into the current lap, in `[0, period)`.
    pub progress: f64,
    pub segment_index: usize,
    /// How far along the segment, in `[0, 1)`.
    pub fraction: f64,
}

#[derive(Debug, Clone)]
pub struct LoopSimulator {
    waypoints: Vec<Waypoint>,
    period: f64,
    vehicles: Vec<SimulatedVehicle>,
}

impl LoopSimulator {
    pub fn new(
        waypoints: Vec<Waypoint>,
        loop_period_seconds: f64,
        vehicle_count: usize,
    ) -> Result<Self, SimulatorError> {
        if waypoints.len() < 2 {
            return Err(SimulatorError::TooFewWaypoints(waypoints.len()));
        }
        if !(loop_period_seconds.is_finite() && loop_period_seconds > 0.0) {
            return Err(SimulatorError::InvalidPeriod(loop_period_seconds));
        }
        if let Some(index) = waypoints
            .iter()
            .position(|w| !(w.lat.is_finite() && w.lon.is_finite()))
        {
            return Err(SimulatorError::NonFiniteWaypoint { index });
        }

        let vehicles = (0..vehicle_count)
            .map(|i| SimulatedVehicle {
                id: format!("Vehicle_{}", i + 1),
                phase_offset: i as f64 * loop_period_seconds / vehicle_count as f64,
            })
            .collect();

        Ok(Self {
            waypoints,
            period: loop_period_seconds,
            vehicles,
        })
    }

    pub fn demo() -> Result<Self, SimulatorError> {
        Self::new(DEMO_ROUTE.to_vec(), DEFAULT_LOOP_SECONDS, DEFAULT_VEHICLE_COUNT)
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn vehicles(&self) -> &[SimulatedVehicle] {
        &self.vehicles
    }

    pub fn locate(&self, now: f64, phase_offset: f64) -> LoopPoint {
        let n = self.waypoints.len();
        let mut progress = (now + phase_offset).rem_euclid(self.period);
        // rem_euclid can round up to the divisor for tiny negative inputs
        if progress >= self.period {
            progress = 0.0;
        }

        let position = progress / self.period * n as f64;
        let whole = position.floor();

        LoopPoint {
            progress,
            segment_index: whole as usize % n,
            fraction: position - whole,
        }
    }

    pub fn position_at(&self, now: f64, vehicle: &SimulatedVehicle) -> PositionSnapshot {
        let point = self.locate(now, vehicle.phase_offset);
        let n = self.waypoints.len();
        let from = self.waypoints[point.segment_index];
        let to = self.waypoints[(point.segment_index + 1) % n];

        // Planar interpolation in degrees; fine for the short hops on the demo loop.
        PositionSnapshot {
            vehicle_id: vehicle.id.clone(),
            latitude: from.lat + (to.lat - from.lat) * point.fraction,
            longitude: from.lon + (to.lon - from.lon) * point.fraction,
            bearing: bearing(from, to),
            timestamp: now,
        }
    }

    /// One snapshot per vehicle, in fleet order.
    pub fn snapshot(&self, now: f64) -> Vec<PositionSnapshot> {
        self.vehicles
            .iter()
            .map(|vehicle| self.position_at(now, vehicle))
            .collect()
    }
}

/// Initial great-circle heading from `from` to `to`, degrees clockwise from north in `[0, 360)`.
pub fn bearing(from: Waypoint, to: Waypoint) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}
