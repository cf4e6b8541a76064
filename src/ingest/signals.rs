use std::collections::BTreeSet;
use crate::catalog::{CatalogAsset, LineageSummary};
use crate::models::{SignalType, SignalValue};

/// Derive the catalog-sourced evidence for one asset.
///
/// An attribute group the catalog did not report at all yields no value, so
/// the signal stays unknown. Lineage comes from a separate lookup.
pub fn catalog_signals(asset: &CatalogAsset, capabilities: &BTreeSet<SignalType>) -> Vec<SignalValue> {
    let mut values = Vec::new();
    for signal in capabilities {
        let value = match signal {
            SignalType::Ownership => ownership(asset),
            SignalType::Semantics => semantics(asset),
            SignalType::Sensitivity => sensitivity(asset),
            SignalType::Trust => trust(asset),
            SignalType::Usage => usage(asset),
            SignalType::Lineage => None,
        };
        values.extend(value);
    }
    values
}

pub fn lineage_signal(summary: LineageSummary) -> SignalValue {
    SignalValue::Lineage {
        present: summary.upstream_count > 0 || summary.downstream_count > 0,
        upstream_count: summary.upstream_count,
        downstream_count: summary.downstream_count,
    }
}

fn non_blank(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn ownership(asset: &CatalogAsset) -> Option<SignalValue> {
    if asset.owner_users.is_none() && asset.owner_groups.is_none() {
        return None;
    }
    let owner_users = asset.owner_users.clone().unwrap_or_default();
    let owner_groups = asset.owner_groups.clone().unwrap_or_default();
    Some(SignalValue::Ownership {
        present: !owner_users.is_empty() || !owner_groups.is_empty(),
        owner_users,
        owner_groups,
    })
}

fn semantics(asset: &CatalogAsset) -> Option<SignalValue> {
    if asset.description.is_none() && asset.user_description.is_none() && asset.terms.is_none() {
        return None;
    }
    let has_user_description = non_blank(&asset.user_description);
    Some(SignalValue::Semantics {
        present: non_blank(&asset.description) || has_user_description,
        has_user_description,
        term_count: asset.terms.as_ref().map_or(0, |t| t.len() as u32),
        has_readme: non_blank(&asset.readme),
    })
}

fn sensitivity(asset: &CatalogAsset) -> Option<SignalValue> {
    if asset.classification_names.is_none() && asset.certificate_status.is_none() {
        return None;
    }
    let classifications = asset.classification_names.clone().unwrap_or_default();
    let certified = asset
        .certificate_status
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty() && !s.eq_ignore_ascii_case("NONE"));
    Some(SignalValue::Sensitivity {
        present: !classifications.is_empty() || certified,
        classifications,
        certificate_status: asset.certificate_status.clone(),
    })
}

fn trust(asset: &CatalogAsset) -> Option<SignalValue> {
    let status = asset.certificate_status.as_ref()?;
    Some(SignalValue::Trust {
        present: status.eq_ignore_ascii_case("VERIFIED"),
        certificate_status: status.to_ascii_uppercase(),
    })
}

fn usage(asset: &CatalogAsset) -> Option<SignalValue> {
    // Non-finite or negative popularity is treated as not reported.
    let popularity = asset.popularity_score.filter(|p| p.is_finite() && *p >= 0.0);
    if popularity.is_none() && asset.query_count.is_none() && asset.query_user_count.is_none() {
        return None;
    }
    let popularity = popularity.unwrap_or(0.0);
    let query_count = asset.query_count.unwrap_or(0);
    let query_user_count = asset.query_user_count.unwrap_or(0);
    Some(SignalValue::Usage {
        present: popularity > 0.0 || query_count > 0 || query_user_count > 0,
        popularity,
        query_count,
        query_user_count,
    })
}
