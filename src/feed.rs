//! GTFS-realtime encoding of simulator snapshots.

use chrono::{DateTime, Local, Utc};
use gtfs_realtime::{
    FeedEntity, FeedHeader, FeedMessage, Position, TripDescriptor, VehicleDescriptor,
    VehiclePosition,
};
use prost::Message;

use crate::simulator::PositionSnapshot;

pub const GTFS_REALTIME_VERSION: &str = "2.0";
pub const CONTENT_TYPE: &str = "application/x-protobuf";

/// Trip descriptor stamped on every simulated vehicle. Not derived from the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct TripTemplate {
    pub trip_id: String,
    pub route_id: String,
    pub start_time: String,
}

impl Default for TripTemplate {
    fn default() -> Self {
        Self {
            trip_id: "trip_main".to_string(),
            route_id: "1".to_string(),
            start_time: "08:00:00".to_string(),
        }
    }
}

impl TripTemplate {
    fn descriptor(&self, now: DateTime<Utc>) -> TripDescriptor {
        TripDescriptor {
            trip_id: Some(self.trip_id.clone()),
            route_id: Some(self.route_id.clone()),
            start_time: Some(self.start_time.clone()),
            start_date: Some(service_date(now)),
            ..Default::default()
        }
    }
}

// GTFS service dates are local calendar days.
pub fn service_date(now: DateTime<Utc>) -> String {
    now.with_timezone(&Local).format("%Y%m%d").to_string()
}

pub fn build_feed(
    snapshots: &[PositionSnapshot],
    now: DateTime<Utc>,
    template: &TripTemplate,
) -> FeedMessage {
    let entity = snapshots
        .iter()
        .enumerate()
        .map(|(i, snap)| FeedEntity {
            id: format!("bus_{}", i + 1),
            vehicle: Some(VehiclePosition {
                vehicle: Some(VehicleDescriptor {
                    id: Some(snap.vehicle_id.clone()),
                    ..Default::default()
                }),
                position: Some(Position {
                    latitude: snap.latitude as f32,
                    longitude: snap.longitude as f32,
                    bearing: Some(snap.bearing as f32),
                    ..Default::default()
                }),
                timestamp: Some(snap.timestamp.floor() as u64),
                trip: Some(template.descriptor(now)),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: GTFS_REALTIME_VERSION.to_string(),
            timestamp: Some(now.timestamp().max(0) as u64),
            ..Default::default()
        },
        entity,
    }
}

pub fn encode_feed(feed: &FeedMessage) -> Vec<u8> {
    feed.encode_to_vec()
}
