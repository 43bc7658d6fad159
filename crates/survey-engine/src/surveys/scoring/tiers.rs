use crate::surveys::schema::Tier;

/// Step-function lookup: points of the highest tier whose `min` the measurement reaches.
///
/// Tiers are ordered by descending `min` with a stable sort, so among tiers sharing a
/// threshold the one declared first wins. No reachable tier scores zero.
pub fn resolve_tier(measurement: f64, tiers: &[Tier]) -> f64 {
    let mut ordered: Vec<&Tier> = tiers.iter().collect();
    ordered.sort_by(|a, b| b.min.total_cmp(&a.min));

    ordered
        .into_iter()
        .find(|tier| tier.min <= measurement)
        .map(|tier| tier.points)
        .unwrap_or(0.0)
}
