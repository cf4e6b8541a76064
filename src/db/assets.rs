use rusqlite::types::Value;
use rusqlite::Row;
use crate::errors::AuditError;
use crate::models::AssetRecord;
use super::entity::{opt_text, Entity};

impl Entity for AssetRecord {
    const TABLE: &'static str = "assets";
    const COLUMNS: &'static [&'static str] = &[
        "asset_guid",
        "name",
        "asset_type",
        "qualified_name",
        "domain",
        "source_system",
        "deep_link_url",
    ];
    const SUBJECT_COLUMN: &'static str = "asset_guid";
    const KIND_COLUMN: Option<&'static str> = Some("asset_type");
    const ORDER_BY: &'static str = "asset_guid";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn validate(&self) -> Result<(), AuditError> {
        for (name, value) in [
            ("asset_guid", &self.asset_guid),
            ("name", &self.name),
            ("asset_type", &self.asset_type),
            ("qualified_name", &self.qualified_name),
        ] {
            if value.trim().is_empty() {
                return Err(AuditError::Validation(format!("asset {} is required", name)));
            }
        }
        Ok(())
    }

    fn to_values(&self) -> Result<Vec<Value>, AuditError> {
        Ok(vec![
            Value::Text(self.asset_guid.clone()),
            Value::Text(self.name.clone()),
            Value::Text(self.asset_type.clone()),
            Value::Text(self.qualified_name.clone()),
            opt_text(&self.domain),
            opt_text(&self.source_system),
            opt_text(&self.deep_link_url),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(AssetRecord {
            id: row.get(0)?,
            run_id: row.get(1)?,
            asset_guid: row.get(2)?,
            name: row.get(3)?,
            asset_type: row.get(4)?,
            qualified_name: row.get(5)?,
            domain: row.get(6)?,
            source_system: row.get(7)?,
            deep_link_url: row.get(8)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{Filter, RunStore};
    use crate::db::runs::tests::new_run;

    pub(crate) fn asset(run_id: &str, guid: &str, asset_type: &str, domain: Option<&str>) -> AssetRecord {
        AssetRecord {
            id: String::new(),
            run_id: run_id.to_string(),
            asset_guid: guid.to_string(),
            name: format!("{}_name", guid),
            asset_type: asset_type.to_string(),
            qualified_name: format!("default/snowflake/ANALYTICS/PUBLIC/{}", guid),
            domain: domain.map(str::to_string),
            source_system: Some("snowflake".into()),
            deep_link_url: None,
        }
    }

    #[test]
    fn test_create_assigns_id() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let created = store.create(asset(&run.id, "g1", "Table", None)).unwrap();
        assert!(!created.id.is_empty());

        let found: Vec<AssetRecord> = store.find_many(&Filter::run(&run.id)).unwrap();
        assert_eq!(found, vec![created]);
    }

    #[test]
    fn test_create_rejects_missing_fields() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let mut bad = asset(&run.id, "g1", "Table", None);
        bad.qualified_name = "  ".into();
        assert!(matches!(store.create(bad), Err(AuditError::Validation(_))));
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 0);
    }

    #[test]
    fn test_create_requires_existing_run() {
        let store = RunStore::in_memory().unwrap();
        let result = store.create(asset("ghost-run", "g1", "Table", None));
        assert!(matches!(result, Err(AuditError::NotFound(_))));
    }

    #[test]
    fn test_guid_unique_per_run() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let other = store.create_run(new_run()).unwrap();
        store.create(asset(&run.id, "g1", "Table", None)).unwrap();
        assert!(store.create(asset(&run.id, "g1", "Table", None)).is_err());
        // Same guid in another run is fine
        store.create(asset(&other.id, "g1", "Table", None)).unwrap();
    }

    #[test]
    fn test_create_many_is_all_or_nothing() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let rows = vec![
            asset(&run.id, "g1", "Table", None),
            asset(&run.id, "g1", "Table", None),
        ];
        assert!(store.create_many(&run.id, rows).is_err());
        assert_eq!(store.count::<AssetRecord>(&Filter::run(&run.id)).unwrap(), 0);
    }

    #[test]
    fn test_find_by_subjects_and_kind() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        store.create_many(&run.id, vec![
            asset(&run.id, "g1", "Table", None),
            asset(&run.id, "g2", "View", None),
            asset(&run.id, "g3", "Table", None),
        ]).unwrap();

        let subset: Vec<AssetRecord> = store.find_many(&Filter::run(&run.id).subjects(["g3", "g1"])).unwrap();
        let guids: Vec<_> = subset.iter().map(|a| a.asset_guid.as_str()).collect();
        assert_eq!(guids, vec!["g1", "g3"]);

        let views: Vec<AssetRecord> = store.find_many(&Filter::run(&run.id).kind("View")).unwrap();
        assert_eq!(views.len(), 1);

        let none: Vec<AssetRecord> = store.find_many(&Filter::run(&run.id).subjects(Vec::<String>::new())).unwrap();
        assert!(none.is_empty());
    }
}
