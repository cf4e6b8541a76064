use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "store": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "minLength": 1 }
                }
            },
            "catalog": {
                "type": "object",
                "properties": {
                    "base_url": { "type": "string", "format": "uri" },
                    "token_env": { "type": "string", "minLength": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 }
                }
            },
            "ingestion": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "page_size": { "type": "integer", "minimum": 1, "maximum": 1000 },
                    "max_page_retries": { "type": "integer", "minimum": 0, "maximum": 10 },
                    "retry_base_delay_ms": { "type": "integer", "minimum": 0 },
                    "lineage_concurrency": { "type": "integer", "minimum": 1, "maximum": 64 },
                    "lineage_failure_ceiling": { "$ref": "#/$defs/fraction" }
                }
            },
            "scoring": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "methodology": {
                        "type": "string",
                        "enum": ["weighted_dimensions", "dimension_triplet", "binary_checklist", "maturity_levels"]
                    },
                    "impact_threshold": { "$ref": "#/$defs/fraction" },
                    "quality_threshold": { "$ref": "#/$defs/fraction" }
                }
            },
            "targets": {
                "type": "object",
                "propertyNames": {
                    "enum": ["ownership", "description", "glossary_terms", "readme", "lineage", "classification", "certification"]
                },
                "additionalProperties": { "$ref": "#/$defs/fraction" }
            },
            "plan": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "team_size": { "type": "integer", "minimum": 1 },
                    "hours_per_person_week": { "type": "number", "exclusiveMinimum": 0 }
                }
            },
            "orchestrator": {
                "type": "object",
                "properties": {
                    "allow_failed_runs": { "type": "boolean" }
                }
            }
        },
        "$defs": {
            "fraction": { "type": "number", "minimum": 0, "maximum": 1 }
        }
    })
});
