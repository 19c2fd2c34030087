use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use super::SchedulingError;

/// A catalogue entry as seen at booking time.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CatalogueEntry {
    pub service_id: Uuid,
    pub name: String,
    pub price: i64,
}

/// One service on an appointment, with the price frozen when it was booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ServiceSelection {
    pub service_id: Uuid,
    #[serde(rename = "name")]
    pub service_name: String,
    pub price: i64,
}

/// Maps the requested service ids onto catalogue entries, keeping request
/// order and dropping repeats. Unknown or inactive ids are rejected.
pub fn resolve_selection(
    requested: &[Uuid],
    catalogue: &HashMap<Uuid, CatalogueEntry>,
) -> Result<Vec<ServiceSelection>, SchedulingError> {
    if requested.is_empty() {
        return Err(SchedulingError::Validation(
            "at least one service must be selected".into(),
        ));
    }

    let mut seen = HashSet::with_capacity(requested.len());
    let mut out = Vec::with_capacity(requested.len());
    for id in requested {
        if !seen.insert(*id) {
            continue;
        }
        let entry = catalogue.get(id).ok_or_else(|| {
            SchedulingError::Validation(format!("unknown or inactive service {id}"))
        })?;
        out.push(ServiceSelection {
            service_id: entry.service_id,
            service_name: entry.name.clone(),
            price: entry.price,
        });
    }
    Ok(out)
}

/// Exact integer sum of the booked prices.
pub fn total_amount(selection: &[ServiceSelection]) -> Result<i64, SchedulingError> {
    if selection.is_empty() {
        return Err(SchedulingError::Validation(
            "at least one service must be selected".into(),
        ));
    }

    selection.iter().try_fold(0i64, |acc, s| {
        if s.price < 0 {
            return Err(SchedulingError::Validation(format!(
                "service {} has a negative price",
                s.service_id
            )));
        }
        acc.checked_add(s.price)
            .ok_or_else(|| SchedulingError::Validation("total amount overflows".into()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, price: i64) -> CatalogueEntry {
        CatalogueEntry {
            service_id: Uuid::new_v4(),
            name: name.into(),
            price,
        }
    }

    fn catalogue(entries: &[CatalogueEntry]) -> HashMap<Uuid, CatalogueEntry> {
        entries.iter().map(|e| (e.service_id, e.clone())).collect()
    }

    #[test]
    fn total_is_exact_sum_of_booked_prices() {
        let bath = entry("Bath", 100_000);
        let nails = entry("Nail trim", 50_000);
        let cat = catalogue(&[bath.clone(), nails.clone()]);

        let selection = resolve_selection(&[bath.service_id, nails.service_id], &cat).unwrap();
        assert_eq!(total_amount(&selection).unwrap(), 150_000);
    }

    #[test]
    fn keeps_request_order_and_drops_repeats() {
        let a = entry("Grooming", 200_000);
        let b = entry("Bath", 100_000);
        let cat = catalogue(&[a.clone(), b.clone()]);

        let selection =
            resolve_selection(&[b.service_id, a.service_id, b.service_id], &cat).unwrap();
        let names: Vec<_> = selection.iter().map(|s| s.service_name.as_str()).collect();
        assert_eq!(names, ["Bath", "Grooming"]);
        assert_eq!(total_amount(&selection).unwrap(), 300_000);
    }

    #[test]
    fn empty_selection_is_invalid() {
        assert!(matches!(
            resolve_selection(&[], &HashMap::new()),
            Err(SchedulingError::Validation(_))
        ));
        assert!(total_amount(&[]).is_err());
    }

    #[test]
    fn unknown_service_is_rejected() {
        let cat = catalogue(&[entry("Bath", 1)]);
        let missing = Uuid::new_v4();
        let err = resolve_selection(&[missing], &cat).unwrap_err();
        assert!(err.to_string().contains(&missing.to_string()));
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let cat = catalogue(&[entry("A", i64::MAX), entry("B", 1)]);
        let ids: Vec<_> = cat.keys().copied().collect();
        let selection = resolve_selection(&ids, &cat).unwrap();
        assert!(total_amount(&selection).is_err());
    }
}
