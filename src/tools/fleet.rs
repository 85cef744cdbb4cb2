//! Fleet catalog, availability, and demo-data tools.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Map, Value};

use crate::registry::{ProgressSink, ToolDescriptor, ToolHandler, ToolRegistry};

pub(crate) struct VehicleClass {
    pub name: &'static str,
    pub model: &'static str,
    pub seats: u8,
    pub units: u32,
    pub daily_rate_cents: i64,
}

pub(crate) const CATALOG: &[VehicleClass] = &[
    VehicleClass {
        name: "economy",
        model: "Toyota Yaris",
        seats: 4,
        units: 12,
        daily_rate_cents: 3900,
    },
    VehicleClass {
        name: "compact",
        model: "VW Golf",
        seats: 5,
        units: 10,
        daily_rate_cents: 4900,
    },
    VehicleClass {
        name: "suv",
        model: "Hyundai Tucson",
        seats: 5,
        units: 8,
        daily_rate_cents: 7400,
    },
    VehicleClass {
        name: "van",
        model: "Ford Transit",
        seats: 9,
        units: 4,
        daily_rate_cents: 9900,
    },
    VehicleClass {
        name: "luxury",
        model: "BMW 5 Series",
        seats: 5,
        units: 3,
        daily_rate_cents: 15900,
    },
];

pub(crate) fn find_class(name: &str) -> Option<&'static VehicleClass> {
    CATALOG.iter().find(|c| c.name == name)
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolDescriptor {
            name: "list_fleet".to_string(),
            description: "List the rental fleet, optionally filtered by vehicle class".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "class": {
                        "type": "string",
                        "description": "Optional vehicle class filter (e.g. 'economy', 'suv')"
                    }
                },
                "required": []
            }),
        },
        Arc::new(ListFleet),
    );

    registry.register(
        ToolDescriptor {
            name: "check_availability".to_string(),
            description: "Check how many vehicles of a class are available for a pickup date"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "class": {
                        "type": "string",
                        "description": "Vehicle class to check"
                    },
                    "pickup_date": {
                        "type": "string",
                        "description": "Pickup date in YYYY-MM-DD format"
                    },
                    "days": {
                        "type": "integer",
                        "description": "Rental duration in days (default 1)"
                    }
                },
                "required": ["class", "pickup_date"]
            }),
        },
        Arc::new(CheckAvailability),
    );

    registry.register(
        ToolDescriptor {
            name: "seed_demo_data".to_string(),
            description: "Generate demo bookings, reporting progress while seeding".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "count": {
                        "type": "integer",
                        "description": "Number of bookings to generate (default 20, max 500)"
                    }
                },
                "required": []
            }),
        },
        Arc::new(SeedDemoData),
    );
}

struct ListFleet;

#[async_trait]
impl ToolHandler for ListFleet {
    async fn invoke(
        &self,
        args: Map<String, Value>,
        _progress: &ProgressSink,
    ) -> anyhow::Result<Value> {
        let filter = args.get("class").and_then(Value::as_str);
        if let Some(class) = filter {
            if find_class(class).is_none() {
                anyhow::bail!("unknown vehicle class: {class}");
            }
        }

        let fleet: Vec<Value> = CATALOG
            .iter()
            .filter(|c| filter.map(|f| f == c.name).unwrap_or(true))
            .map(|c| {
                json!({
                    "class": c.name,
                    "model": c.model,
                    "seats": c.seats,
                    "units": c.units,
                    "dailyRateCents": c.daily_rate_cents,
                })
            })
            .collect();

        Ok(json!({ "fleet": fleet }))
    }
}

struct CheckAvailability;

#[async_trait]
impl ToolHandler for CheckAvailability {
    async fn invoke(
        &self,
        args: Map<String, Value>,
        _progress: &ProgressSink,
    ) -> anyhow::Result<Value> {
        let class_name = args
            .get("class")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("class is required"))?;
        let class = find_class(class_name)
            .ok_or_else(|| anyhow::anyhow!("unknown vehicle class: {class_name}"))?;

        let pickup_date = args
            .get("pickup_date")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("pickup_date is required"))?;
        let date = NaiveDate::parse_from_str(pickup_date, "%Y-%m-%d")
            .map_err(|e| anyhow::anyhow!("invalid pickup_date {pickup_date:?}: {e}"))?;

        let days = match args.get("days") {
            Some(v) => v
                .as_u64()
                .filter(|d| (1..=60).contains(d))
                .ok_or_else(|| anyhow::anyhow!("days must be an integer between 1 and 60"))?,
            None => 1,
        };

        // Demo inventory: a stable function of date and class, so repeated
        // queries agree with each other.
        let reserved = (date.ordinal() as u64 + class.units as u64 + days) % class.units as u64;
        let available = class.units as u64 - reserved;

        Ok(json!({
            "class": class.name,
            "pickupDate": pickup_date,
            "days": days,
            "availableUnits": available,
            "totalUnits": class.units,
        }))
    }
}

struct SeedDemoData;

const SEED_DEFAULT: u64 = 20;
const SEED_MAX: u64 = 500;
const SEED_CHUNK: u64 = 5;

#[async_trait]
impl ToolHandler for SeedDemoData {
    async fn invoke(
        &self,
        args: Map<String, Value>,
        progress: &ProgressSink,
    ) -> anyhow::Result<Value> {
        let count = match args.get("count") {
            Some(v) => v
                .as_u64()
                .filter(|c| (1..=SEED_MAX).contains(c))
                .ok_or_else(|| {
                    anyhow::anyhow!("count must be an integer between 1 and {SEED_MAX}")
                })?,
            None => SEED_DEFAULT,
        };

        let mut sample = Vec::new();
        let mut seeded = 0u64;
        while seeded < count {
            let batch = SEED_CHUNK.min(count - seeded);
            for _ in 0..batch {
                let booking_id: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(8)
                    .map(char::from)
                    .collect();
                if sample.len() < 5 {
                    sample.push(format!("bk-{booking_id}"));
                }
            }
            seeded += batch;
            progress
                .report(
                    format!("Seeded {seeded}/{count} bookings"),
                    seeded as f64 / count as f64,
                )
                .await;
        }

        Ok(json!({ "seeded": seeded, "sample": sample }))
    }
}
