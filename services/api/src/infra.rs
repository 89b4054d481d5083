use hopelink::config::MatchingConfig;
use hopelink::error::AppError;
use hopelink::matching::parameters::FactorWeights;
use hopelink::matching::{
    InMemoryMatchingRepository, InMemoryMatchingService, InMemoryNotifier,
    InMemoryParameterRepository, MatchingService,
};
use hopelink::seed::{SeedImporter, SeedSummary};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process service plus the repositories it wraps, so the CLI can inspect results.
pub(crate) struct Wiring {
    pub(crate) service: Arc<InMemoryMatchingService>,
    pub(crate) repository: Arc<InMemoryMatchingRepository>,
    pub(crate) notifier: Arc<InMemoryNotifier>,
}

pub(crate) fn wire(repository: InMemoryMatchingRepository, recommendation_limit: usize) -> Wiring {
    let repository = Arc::new(repository);
    let notifier = Arc::new(InMemoryNotifier::default());
    let service = Arc::new(
        MatchingService::new(
            repository.clone(),
            Arc::new(InMemoryParameterRepository::default()),
            notifier.clone(),
        )
        .with_default_limit(recommendation_limit),
    );
    Wiring {
        service,
        repository,
        notifier,
    }
}

/// Repository hydrated from the seed directory, if one is configured.
pub(crate) fn seeded_repository(
    seed_dir: Option<&Path>,
) -> Result<(InMemoryMatchingRepository, Option<SeedSummary>), AppError> {
    let repository = InMemoryMatchingRepository::default();
    let Some(dir) = seed_dir else {
        return Ok((repository, None));
    };

    let summary = SeedImporter::from_dir(dir)?.apply_to(&repository)?;
    info!(seed_dir = %dir.display(), ?summary, "repository seeded");
    Ok((repository, Some(summary)))
}

pub(crate) fn wire_from_config(
    config: &MatchingConfig,
) -> Result<(Wiring, Option<SeedSummary>), AppError> {
    let (repository, summary) = seeded_repository(config.seed_dir.as_deref())?;
    Ok((wire(repository, config.recommendation_limit), summary))
}

/// Parse `geo,item,urgency,reliability,delivery` into factor weights.
pub(crate) fn parse_weights(raw: &str) -> Result<FactorWeights, String> {
    let values = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|err| format!("invalid weight '{}': {err}", part.trim()))
        })
        .collect::<Result<Vec<f64>, String>>()?;

    match values.as_slice() {
        [geographic_proximity, item_compatibility, urgency_alignment, user_reliability, delivery_compatibility] => {
            Ok(FactorWeights {
                geographic_proximity: *geographic_proximity,
                item_compatibility: *item_compatibility,
                urgency_alignment: *urgency_alignment,
                user_reliability: *user_reliability,
                delivery_compatibility: *delivery_compatibility,
            })
        }
        other => Err(format!("expected 5 comma-separated weights, found {}", other.len())),
    }
}
