use std::collections::BTreeMap;
use crate::models::{AssetRecord, Explanation, Run, Score, SubjectType};
use super::quadrant::{classify, round4};

/// Domain label for assets the catalog did not place in a domain.
pub const UNASSIGNED_DOMAIN: &str = "UNASSIGNED";

/// Roll asset scores up to DOMAIN and ASSET_TYPE subjects.
///
/// Impact is the mean member impact. Quality is the mean over members with
/// known quality, and unknown only when no member has a known quality.
pub fn aggregate_scores(run: &Run, assets: &[AssetRecord], asset_scores: &[Score]) -> Vec<Score> {
    let by_guid: BTreeMap<&str, &Score> = asset_scores
        .iter()
        .filter(|s| s.subject_type == SubjectType::Asset)
        .map(|s| (s.subject_id.as_str(), s))
        .collect();

    let mut domains: BTreeMap<&str, Vec<&Score>> = BTreeMap::new();
    let mut types: BTreeMap<&str, Vec<&Score>> = BTreeMap::new();
    for asset in assets {
        let Some(&score) = by_guid.get(asset.asset_guid.as_str()) else {
            continue;
        };
        let domain = asset.domain.as_deref().filter(|d| !d.trim().is_empty()).unwrap_or(UNASSIGNED_DOMAIN);
        domains.entry(domain).or_default().push(score);
        types.entry(asset.asset_type.as_str()).or_default().push(score);
    }

    let mut out = Vec::with_capacity(domains.len() + types.len());
    for (name, members) in domains {
        out.push(rollup(run, SubjectType::Domain, name, &members));
    }
    for (name, members) in types {
        out.push(rollup(run, SubjectType::AssetType, name, &members));
    }
    out
}

fn rollup(run: &Run, subject_type: SubjectType, subject_id: &str, members: &[&Score]) -> Score {
    let count = members.len() as f64;
    let impact = round4(members.iter().map(|s| s.impact_score).sum::<f64>() / count);

    let known: Vec<f64> = members.iter().filter_map(|s| s.quality_score).collect();
    let unknown = members.len() - known.len();
    let quality = if known.is_empty() {
        None
    } else {
        Some(round4(known.iter().sum::<f64>() / known.len() as f64))
    };

    let mut explanations = vec![Explanation::new(
        "MEMBERS",
        0.0,
        format!("{} asset(s), {} with unknown quality", members.len(), unknown),
    )];
    if quality.is_none() {
        explanations.push(Explanation::new("QUALITY", 0.0, "no member has a known quality"));
    }

    Score::new(
        &run.id,
        subject_type,
        subject_id,
        impact,
        quality,
        classify(impact, quality, &run.scoring),
        run.scoring.methodology,
        explanations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RunStore;
    use crate::db::runs::tests::new_run;
    use crate::models::{Methodology, Quadrant};

    fn asset(guid: &str, asset_type: &str, domain: Option<&str>) -> AssetRecord {
        AssetRecord {
            id: String::new(),
            run_id: "r".into(),
            asset_guid: guid.into(),
            name: guid.into(),
            asset_type: asset_type.into(),
            qualified_name: guid.into(),
            domain: domain.map(str::to_string),
            source_system: None,
            deep_link_url: None,
        }
    }

    fn score(run: &Run, guid: &str, impact: f64, quality: Option<f64>) -> Score {
        Score::new(&run.id, SubjectType::Asset, guid, impact, quality, classify(impact, quality, &run.scoring), Methodology::WeightedDimensions, vec![])
    }

    #[test]
    fn test_rollup_by_domain_and_type() {
        let store = RunStore::in_memory().unwrap();
        let run = store.create_run(new_run()).unwrap();
        let assets = vec![
            asset("a", "Table", Some("Sales")),
            asset("b", "Table", Some("Sales")),
            asset("c", "View", None),
        ];
        let scores = vec![
            score(&run, "a", 0.8, Some(0.9)),
            score(&run, "b", 0.6, None),
            score(&run, "c", 0.2, None),
        ];

        let rolled = aggregate_scores(&run, &assets, &scores);
        let ids: Vec<_> = rolled.iter().map(|s| (s.subject_type, s.subject_id.as_str())).collect();
        assert_eq!(ids, vec![
            (SubjectType::Domain, "Sales"),
            (SubjectType::Domain, UNASSIGNED_DOMAIN),
            (SubjectType::AssetType, "Table"),
            (SubjectType::AssetType, "View"),
        ]);

        let sales = &rolled[0];
        assert_eq!(sales.impact_score, 0.7);
        assert_eq!(sales.quality_score, Some(0.9));
        assert_eq!(sales.quadrant, Quadrant::HH);

        let view = &rolled[3];
        assert!(view.quality_unknown);
        assert_eq!(view.quadrant, Quadrant::LU);
        assert!(rolled.iter().all(|s| s.validate().is_ok()));
    }
}
