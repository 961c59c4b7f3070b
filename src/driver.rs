//! Canned driver dashboard data. The driver id is accepted but not looked up.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DriverStats {
    pub earnings: &'static str,
    pub trips: u32,
    pub hours: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripRecord {
    pub route: &'static str,
    pub time: &'static str,
    pub price: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub name: &'static str,
    pub comment: &'static str,
    pub rating: u8,
    pub date: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub rating: f64,
    pub count: u32,
    pub reviews: Vec<Review>,
}

pub fn stats(_driver_id: &str) -> DriverStats {
    DriverStats {
        earnings: "KES 4,500",
        trips: 12,
        hours: 6.5,
    }
}

pub fn trips(_driver_id: &str) -> Vec<TripRecord> {
    vec![
        TripRecord {
            route: "Kawangware -> CBD",
            time: "10:30 AM",
            price: "KES 150",
        },
        TripRecord {
            route: "Westlands -> Kawangware",
            time: "09:15 AM",
            price: "KES 200",
        },
        TripRecord {
            route: "CBD -> Westlands",
            time: "08:00 AM",
            price: "KES 100",
        },
        TripRecord {
            route: "Kawangware -> Westlands",
            time: "07:15 AM",
            price: "KES 180",
        },
    ]
}

pub fn reviews(_driver_id: &str) -> ReviewSummary {
    ReviewSummary {
        rating: 4.8,
        count: 124,
        reviews: vec![
            Review {
                name: "John Doe",
                comment: "Great driver, very smooth ride!",
                rating: 5,
                date: "Today",
            },
            Review {
                name: "Jane Smith",
                comment: "Arrived on time, clean bus.",
                rating: 5,
                date: "Yesterday",
            },
            Review {
                name: "Michael Brown",
                comment: "A bit fast on the corners.",
                rating: 4,
                date: "2 days ago",
            },
            Review {
                name: "Sarah Wilson",
                comment: "Very polite and helpful.",
                rating: 5,
                date: "Last week",
            },
        ],
    }
}
