//! Route laundering detection: intermediary ports used to obscure
//! Russian-origin cargo before delivery to sanctioned destinations.
//!
//! Port-call sequences per vessel inside the lookback window are classified
//! as Russian-origin / intermediary (configured) / sanctioned-destination /
//! other, then scanned for:
//!   Russian → intermediary → sanctioned   3-hop  +35
//!   Russian → intermediary                2-hop  +20
//!   intermediary visit only               1-hop  +15

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{Port, PortCall, SpoofingAnomaly, SpoofingType, Vessel};

use super::SpoofingRunReport;

/// Countries under comprehensive oil import sanctions.
static SANCTIONED_DESTINATIONS: &[&str] = &["KP", "SY", "IR", "CU", "VE"];

static RUSSIAN_ORIGIN_COUNTRIES: &[&str] = &["RU"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortCategory {
    Russian,
    Intermediary,
    Sanctioned,
    Other,
}

impl PortCategory {
    fn as_str(self) -> &'static str {
        match self {
            PortCategory::Russian => "russian",
            PortCategory::Intermediary => "intermediary",
            PortCategory::Sanctioned => "sanctioned",
            PortCategory::Other => "other",
        }
    }
}

pub fn detect_route_laundering(store: &FleetStore) -> SpoofingRunReport {
    detect_route_laundering_with(store, &config::get())
}

/// Detection against an explicit configuration snapshot.
pub fn detect_route_laundering_with(
    store: &FleetStore,
    config: &config::FleetConfig,
) -> SpoofingRunReport {
    if !config.settings.route_laundering_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let intermediary_countries: Vec<String> = config
        .intermediary_ports
        .iter()
        .map(|p| p.country.to_ascii_uppercase())
        .collect();
    let intermediary_names: Vec<String> = config
        .intermediary_ports
        .iter()
        .map(|p| p.name.to_ascii_lowercase())
        .collect();

    let mut report = SpoofingRunReport::ok();
    if intermediary_countries.is_empty() && intermediary_names.is_empty() {
        tracing::warn!("no intermediary ports configured - skipping route laundering detection");
        return report;
    }

    let cutoff = Utc::now() - Duration::days(config.settings.route_laundering_lookback_days);
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "route laundering could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        report.vessels_checked += 1;
        if let Err(e) = evaluate_vessel(
            store,
            &vessel,
            cutoff,
            &intermediary_countries,
            &intermediary_names,
            &mut report,
        ) {
            tracing::warn!(mmsi = %vessel.mmsi, error = %e, "route laundering scan failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "route laundering detection complete"
    );
    report
}

fn evaluate_vessel(
    store: &FleetStore,
    vessel: &Vessel,
    cutoff: DateTime<Utc>,
    intermediary_countries: &[String],
    intermediary_names: &[String],
    report: &mut SpoofingRunReport,
) -> StoreResult<()> {
    let calls = store.port_calls_for_vessel_since(vessel.vessel_id, cutoff)?;
    if calls.len() < 2 {
        return Ok(());
    }
    if store.has_anomaly_of_type(vessel.vessel_id, SpoofingType::RouteLaundering)? {
        return Ok(());
    }

    let mut classified = Vec::with_capacity(calls.len());
    for call in &calls {
        let port = match call.port_id {
            Some(id) => store.port(id).ok(),
            None => None,
        };
        let category = classify_port(
            port.as_ref(),
            call.raw_port_name.as_deref(),
            intermediary_countries,
            intermediary_names,
        );
        classified.push((call, category));
    }

    let Some((hop_count, evidence)) = find_best_pattern(&classified) else {
        return Ok(());
    };

    let score = match hop_count {
        n if n >= 3 => 35,
        2 => 20,
        _ => 15,
    };

    store.insert_anomaly(&SpoofingAnomaly {
        anomaly_id: store.next_id()?,
        vessel_id: vessel.vessel_id,
        anomaly_type: SpoofingType::RouteLaundering,
        start_time_utc: evidence.first_call,
        end_time_utc: Some(evidence.last_call),
        implied_speed_kn: None,
        plausibility_score: None,
        risk_score_component: score,
        evidence_json: json!({
            "hop_count": hop_count,
            "pattern": evidence.pattern,
            "port_sequence": evidence.sequence,
        }),
        gap_event_id: None,
    })?;
    report.anomalies_created += 1;
    Ok(())
}

fn classify_port(
    port: Option<&Port>,
    raw_name: Option<&str>,
    intermediary_countries: &[String],
    intermediary_names: &[String],
) -> PortCategory {
    let mut country = String::new();
    let mut port_name = String::new();

    if let Some(port) = port {
        if port.is_russian_oil_terminal {
            return PortCategory::Russian;
        }
        country = port.country.as_deref().unwrap_or("").to_ascii_uppercase();
        port_name = port.name.to_ascii_lowercase();
    }
    if country.is_empty() {
        if let Some(raw) = raw_name {
            port_name = raw.to_ascii_lowercase();
        }
    }

    if RUSSIAN_ORIGIN_COUNTRIES.contains(&country.as_str()) {
        PortCategory::Russian
    } else if SANCTIONED_DESTINATIONS.contains(&country.as_str()) {
        PortCategory::Sanctioned
    } else if intermediary_countries.iter().any(|c| c == &country)
        || (!port_name.is_empty() && intermediary_names.iter().any(|n| n == &port_name))
    {
        PortCategory::Intermediary
    } else {
        PortCategory::Other
    }
}

struct PatternEvidence {
    pattern: &'static str,
    first_call: DateTime<Utc>,
    last_call: DateTime<Utc>,
    sequence: Vec<serde_json::Value>,
}

fn call_json(call: &PortCall, category: PortCategory) -> serde_json::Value {
    json!({
        "port_id": call.port_id,
        "raw_name": call.raw_port_name,
        "category": category.as_str(),
    })
}

/// The strongest laundering pattern in a classified call sequence.
fn find_best_pattern(
    classified: &[(&PortCall, PortCategory)],
) -> Option<(u8, PatternEvidence)> {
    let mut best: Option<(u8, PatternEvidence)> = None;

    for (i, (call_i, cat_i)) in classified.iter().enumerate() {
        if *cat_i != PortCategory::Russian {
            continue;
        }
        for (j, (call_j, cat_j)) in classified.iter().enumerate().skip(i + 1) {
            if *cat_j != PortCategory::Intermediary {
                continue;
            }
            // Found Russian → intermediary; look for a sanctioned tail.
            let sanctioned_tail = classified[j + 1..]
                .iter()
                .find(|(_, cat)| *cat == PortCategory::Sanctioned);

            if let Some((call_k, _)) = sanctioned_tail {
                if best.as_ref().is_none_or(|(hops, _)| *hops < 3) {
                    best = Some((
                        3,
                        PatternEvidence {
                            pattern: "russian_intermediary_sanctioned",
                            first_call: call_i.arrival_utc,
                            last_call: call_k.arrival_utc,
                            sequence: vec![
                                call_json(call_i, PortCategory::Russian),
                                call_json(call_j, PortCategory::Intermediary),
                                call_json(call_k, PortCategory::Sanctioned),
                            ],
                        },
                    ));
                }
            } else if best.as_ref().is_none_or(|(hops, _)| *hops < 2) {
                best = Some((
                    2,
                    PatternEvidence {
                        pattern: "russian_intermediary",
                        first_call: call_i.arrival_utc,
                        last_call: call_j.arrival_utc,
                        sequence: vec![
                            call_json(call_i, PortCategory::Russian),
                            call_json(call_j, PortCategory::Intermediary),
                        ],
                    },
                ));
            }
        }
    }

    if best.is_none() {
        // Single intermediary visit is still a weak signal.
        if let Some((call, cat)) = classified
            .iter()
            .find(|(_, cat)| *cat == PortCategory::Intermediary)
        {
            return Some((
                1,
                PatternEvidence {
                    pattern: "intermediary_visit",
                    first_call: call.arrival_utc,
                    last_call: call.arrival_utc,
                    sequence: vec![call_json(call, *cat)],
                },
            ));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FleetConfig, IntermediaryPort};
    use chrono::TimeZone;

    fn config_with_intermediaries() -> FleetConfig {
        let mut config = FleetConfig::for_tests();
        config.intermediary_ports = vec![
            IntermediaryPort {
                name: "Fujairah".into(),
                country: "AE".into(),
            },
            IntermediaryPort {
                name: "Ceuta".into(),
                country: "ES".into(),
            },
        ];
        config
    }

    fn seed_ports(store: &FleetStore) {
        let ports = [
            (1, "Primorsk", Some("RU"), true),
            (2, "Fujairah", Some("AE"), false),
            (3, "Bandar Abbas", Some("IR"), false),
            (4, "Rotterdam", Some("NL"), false),
        ];
        for (id, name, country, russian) in ports {
            store
                .insert_port(&Port {
                    port_id: id,
                    name: name.into(),
                    country: country.map(String::from),
                    lat: 0.0,
                    lon: 0.0,
                    major_port: true,
                    is_russian_oil_terminal: russian,
                })
                .unwrap();
        }
    }

    fn call(store: &FleetStore, id: u64, port_id: u64, days_ago: i64) {
        store
            .insert_port_call(&PortCall {
                port_call_id: id,
                vessel_id: 1,
                port_id: Some(port_id),
                raw_port_name: None,
                arrival_utc: Utc::now() - Duration::days(days_ago),
                departure_utc: None,
            })
            .unwrap();
    }

    fn seed_vessel(store: &FleetStore) {
        store
            .insert_vessel(&Vessel::new(
                1,
                "636017000",
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ))
            .unwrap();
    }

    #[test]
    fn test_three_hop_pattern_scores_35() {
        let config = config_with_intermediaries();
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store);
        seed_ports(&store);
        call(&store, 1, 1, 60); // Primorsk (RU terminal)
        call(&store, 2, 2, 30); // Fujairah (intermediary)
        call(&store, 3, 3, 10); // Bandar Abbas (sanctioned)
        let report = detect_route_laundering_with(&store, &config);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 35);
        assert_eq!(a.evidence_json["pattern"], "russian_intermediary_sanctioned");
    }

    #[test]
    fn test_two_hop_pattern_scores_20() {
        let config = config_with_intermediaries();
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store);
        seed_ports(&store);
        call(&store, 1, 1, 60);
        call(&store, 2, 2, 30);
        let report = detect_route_laundering_with(&store, &config);
        assert_eq!(report.anomalies_created, 1);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            20
        );
    }

    #[test]
    fn test_clean_route_not_flagged() {
        let config = config_with_intermediaries();
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store);
        seed_ports(&store);
        call(&store, 1, 4, 60); // Rotterdam
        call(&store, 2, 4, 30);
        let report = detect_route_laundering_with(&store, &config);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_intermediary_only_scores_15() {
        let config = config_with_intermediaries();
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store);
        seed_ports(&store);
        call(&store, 1, 4, 60); // Rotterdam
        call(&store, 2, 2, 30); // Fujairah
        let report = detect_route_laundering_with(&store, &config);
        assert_eq!(report.anomalies_created, 1);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            15
        );
    }
}
