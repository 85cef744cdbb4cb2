//! Rental pricing arithmetic.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::registry::{ProgressSink, ToolDescriptor, ToolHandler, ToolRegistry};
use crate::tools::fleet::find_class;

/// Per-day surcharges, cents.
const EXTRAS: &[(&str, i64)] = &[
    ("gps", 500),
    ("child_seat", 300),
    ("additional_driver", 700),
];

const WEEKLY_DISCOUNT_PCT: i64 = 10;
const MONTHLY_DISCOUNT_PCT: i64 = 20;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        ToolDescriptor {
            name: "quote_price".to_string(),
            description: "Quote the total price for a rental, including extras and duration discounts".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "class": {
                        "type": "string",
                        "description": "Vehicle class to quote"
                    },
                    "days": {
                        "type": "integer",
                        "description": "Rental duration in days"
                    },
                    "extras": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional extras: gps, child_seat, additional_driver"
                    }
                },
                "required": ["class", "days"]
            }),
        },
        Arc::new(QuotePrice),
    );
}

struct QuotePrice;

#[async_trait]
impl ToolHandler for QuotePrice {
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

        let days = args
            .get("days")
            .and_then(Value::as_u64)
            .filter(|d| (1..=365).contains(d))
            .ok_or_else(|| anyhow::anyhow!("days must be an integer between 1 and 365"))?
            as i64;

        let mut extras_cents = 0i64;
        let mut extras_applied = Vec::new();
        if let Some(extras) = args.get("extras") {
            let extras = extras
                .as_array()
                .ok_or_else(|| anyhow::anyhow!("extras must be an array of strings"))?;
            for extra in extras {
                let name = extra
                    .as_str()
                    .ok_or_else(|| anyhow::anyhow!("extras must be an array of strings"))?;
                let (_, per_day) = EXTRAS
                    .iter()
                    .find(|(n, _)| *n == name)
                    .ok_or_else(|| anyhow::anyhow!("unknown extra: {name}"))?;
                extras_cents += per_day * days;
                extras_applied.push(name);
            }
        }

        let rental_cents = class.daily_rate_cents * days;
        let discount_pct = if days >= 28 {
            MONTHLY_DISCOUNT_PCT
        } else if days >= 7 {
            WEEKLY_DISCOUNT_PCT
        } else {
            0
        };
        let discount_cents = rental_cents * discount_pct / 100;
        let total_cents = rental_cents + extras_cents - discount_cents;

        Ok(json!({
            "class": class.name,
            "days": days,
            "currency": "USD",
            "dailyRateCents": class.daily_rate_cents,
            "rentalCents": rental_cents,
            "extras": extras_applied,
            "extrasCents": extras_cents,
            "discountPct": discount_pct,
            "discountCents": discount_cents,
            "totalCents": total_cents,
        }))
    }
}
