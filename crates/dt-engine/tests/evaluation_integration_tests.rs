//! End-to-end tests for dynamic tag evaluation.
//!
//! These tests wire a registry, in-memory stores and the evaluator together
//! and cover:
//! - Evaluating a condition for a host/guest pair
//! - Selecting applicable tags among enabled and disabled rules
//! - Rules skipped for undefined references
//! - Store failures surfacing as errors
//! - Registering a new resource type without touching the engine

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dt_core::db::mocks::{MockDynamicTagRuleRepository, MockResourceProvider, MockTagRepository};
use dt_core::db::{DbError, TagRepository};
use dt_core::{AttributeSnapshot, DynamicResource, DynamicTagRule, ResourceRef, Scalar, Tag};
use dt_engine::{
    CreateRuleInput, DynamicTagEvaluator, EngineConfig, EvaluationError, RegistryConfig,
    ResourceRegistry, ResourceRole, RuleService,
};
use dt_observability::{candidate_span, init_logging_with_config, LoggingConfig};
use tracing::Instrument;

// =============================================================================
// Test Harness
// =============================================================================

/// Storage pools with a fixed free-capacity figure, standing in for a
/// resource type defined outside dt-core.
struct StoragePools {
    pools: BTreeMap<String, f64>,
}

#[async_trait]
impl DynamicResource for StoragePools {
    fn keyword(&self) -> &str {
        "storage"
    }

    async fn find_by_id_or_name(&self, id_or_name: &str) -> Result<Option<ResourceRef>, DbError> {
        Ok(self
            .pools
            .contains_key(id_or_name)
            .then(|| ResourceRef::new("storage", id_or_name, id_or_name)))
    }

    async fn attribute_snapshot(&self, resource: &ResourceRef) -> Result<AttributeSnapshot, DbError> {
        let free = self
            .pools
            .get(&resource.id)
            .ok_or_else(|| DbError::not_found("storage", &resource.id))?;
        let mut snapshot = AttributeSnapshot::new();
        snapshot.insert("free_gb".to_string(), Scalar::Number(*free));
        Ok(snapshot)
    }
}

struct Harness {
    evaluator: DynamicTagEvaluator,
    service: RuleService,
    hosts: Arc<MockResourceProvider>,
    tags: Arc<MockTagRepository>,
    rules: Arc<MockDynamicTagRuleRepository>,
}

fn harness() -> Harness {
    // Every test builds a harness; only the first installs the subscriber.
    let _ = init_logging_with_config(LoggingConfig::development());

    let hosts = Arc::new(
        MockResourceProvider::new("host")
            .with_instance(
                "h-1",
                "node01",
                [
                    ("sys_load", Scalar::Number(1.0)),
                    ("mem_used_percent", Scalar::Number(0.8)),
                    ("enabled", Scalar::Bool(true)),
                    ("zone", Scalar::from("zone-a")),
                ],
            )
            .with_instance(
                "h-2",
                "node02",
                [
                    ("sys_load", Scalar::Number(0.2)),
                    ("mem_used_percent", Scalar::Number(0.1)),
                    ("enabled", Scalar::Bool(true)),
                    ("zone", Scalar::from("zone-b")),
                ],
            ),
    );
    let guests = Arc::new(MockResourceProvider::new("guest").with_instance(
        "g-1",
        "web01",
        [("vcpu_count", Scalar::Number(4.0)), ("hypervisor", Scalar::from("kvm"))],
    ));
    let pools = Arc::new(StoragePools {
        pools: BTreeMap::from([("ssd-1".to_string(), 512.0)]),
    });

    let catalog: Vec<Arc<dyn DynamicResource>> = vec![hosts.clone(), guests, pools];
    let config = RegistryConfig {
        standalone: vec!["host".to_string(), "storage".to_string()],
        virtual_types: vec!["guest".to_string()],
    };
    let registry = Arc::new(ResourceRegistry::from_config(&config, &catalog).unwrap());

    let tags = Arc::new(MockTagRepository::new());
    let rules = Arc::new(MockDynamicTagRuleRepository::new(Arc::clone(&tags)));

    let evaluator = DynamicTagEvaluator::new(Arc::clone(&registry), rules.clone(), tags.clone());
    let service = RuleService::new(registry, rules.clone(), tags.clone());

    Harness {
        evaluator,
        service,
        hosts,
        tags,
        rules,
    }
}

async fn add_rule(h: &Harness, name: &str, tag: &str, condition: &str) -> DynamicTagRule {
    h.service
        .create(CreateRuleInput {
            name: name.to_string(),
            tag: Some(tag.to_string()),
            condition: Some(condition.to_string()),
            ..Default::default()
        })
        .await
        .unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_host_guest_evaluation() {
    let h = harness();

    let outcome = h
        .evaluator
        .evaluate(
            "host",
            "node01",
            "guest",
            "web01",
            "host.sys_load > 1.5 || host.mem_used_percent > 0.7",
        )
        .await
        .unwrap();
    assert!(outcome.matched);

    let json = serde_json::to_value(&outcome.environment).unwrap();
    assert_eq!(json["host"]["zone"], "zone-a");
    assert_eq!(json["guest"]["vcpu_count"], 4.0);

    let outcome = h
        .evaluator
        .evaluate(
            "host",
            "node01",
            "guest",
            "web01",
            "guest.hypervisor == 'kvm' && host.zone != \"zone-a\"",
        )
        .await
        .unwrap();
    assert!(!outcome.matched);
}

#[tokio::test]
async fn test_applicable_tags_ignore_disabled_rules() {
    let h = harness();
    let high_mem = Tag::new("high_mem", "host");
    let high_load = Tag::new("high_load", "host");
    let maintenance = Tag::new("maintenance", "host");
    for tag in [&high_mem, &high_load, &maintenance] {
        h.tags.create(tag).await.unwrap();
    }

    add_rule(&h, "mem", "high_mem", "host.mem_used_percent > 0.7").await;
    add_rule(&h, "load", "high_load", "host.sys_load > 1.5").await;
    add_rule(&h, "maint", "maintenance", "host.enabled").await;
    h.service.set_enabled("maint", false).await.unwrap();

    let env = h
        .evaluator
        .build_environment("host", "h-1", "guest", "g-1")
        .instrument(candidate_span!("host", "node01"))
        .await
        .unwrap();
    let tags = h.evaluator.list_applicable_tags("host", &env).await.unwrap();
    assert_eq!(tags, vec![high_mem]);

    let env = h
        .evaluator
        .build_environment("host", "node02", "guest", "g-1")
        .await
        .unwrap();
    assert!(h
        .evaluator
        .list_applicable_tags("host", &env)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_rule_with_undefined_reference_is_skipped() {
    let h = harness();
    h.tags.create(&Tag::new("busy", "host")).await.unwrap();
    let good = add_rule(&h, "busy_mem", "busy", "host.mem_used_percent > 0.7").await;
    let bad = add_rule(&h, "busy_cpu", "busy", "host.sys_load > 0.5 || guest.cpu_count > 2").await;

    let env = h
        .evaluator
        .build_environment("host", "h-1", "guest", "g-1")
        .await
        .unwrap();
    let report = h.evaluator.match_rules("host", &env).await.unwrap();

    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].rule.id, good.id);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].rule_id, bad.id);
    assert!(report.skipped[0].reason.contains("guest.cpu_count"));
}

#[tokio::test]
async fn test_rules_only_apply_to_their_resource_type() {
    let h = harness();
    h.tags.create(&Tag::new("busy", "host")).await.unwrap();
    h.tags.create(&Tag::new("roomy", "storage")).await.unwrap();
    add_rule(&h, "busy", "busy", "host.sys_load >= 1").await;
    add_rule(&h, "roomy", "roomy", "storage.free_gb > 100").await;

    let env = h
        .evaluator
        .build_environment("storage", "ssd-1", "disk", "d-1")
        .await;
    assert!(matches!(
        env,
        Err(EvaluationError::ResourceTypeNotSupported {
            role: ResourceRole::Virtual,
            ..
        })
    ));

    let outcome = h
        .evaluator
        .evaluate_rule("roomy", "storage", "ssd-1", "guest", "g-1")
        .await
        .unwrap();
    assert!(outcome.matched);

    let env = h
        .evaluator
        .build_environment("storage", "ssd-1", "guest", "g-1")
        .await
        .unwrap();
    let tags = h.evaluator.list_applicable_tags("storage", &env).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "roomy");
}

#[tokio::test]
async fn test_unregistered_type_fails_before_lookup() {
    let h = harness();
    let err = h
        .evaluator
        .evaluate("network", "n-1", "guest", "g-1", "1 < 2")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EvaluationError::ResourceTypeNotSupported {
            role: ResourceRole::Standalone,
            keyword: "network".to_string(),
        }
    );
    assert_eq!(h.hosts.lookup_count(), 0);
}

#[tokio::test]
async fn test_store_unavailable_is_an_error() {
    let h = harness();
    h.tags.create(&Tag::new("busy", "host")).await.unwrap();
    add_rule(&h, "busy", "busy", "host.sys_load >= 1").await;

    let env = h
        .evaluator
        .build_environment("host", "h-1", "guest", "g-1")
        .await
        .unwrap();

    h.rules.set_unavailable(true);
    let result = h.evaluator.list_applicable_tags("host", &env).await;
    assert!(matches!(result, Err(EvaluationError::Store(DbError::Connection(_)))));

    h.rules.set_unavailable(false);
    assert_eq!(h.evaluator.list_applicable_tags("host", &env).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_attribute_changes_are_seen_on_next_evaluation() {
    let h = harness();
    let condition = "host.sys_load > 1.5";

    let before = h
        .evaluator
        .evaluate("host", "h-1", "guest", "g-1", condition)
        .await
        .unwrap();
    assert!(!before.matched);

    let mut snapshot = before.environment.namespace("host").cloned().unwrap_or_default();
    snapshot.insert("sys_load".to_string(), Scalar::Number(3.0));
    assert!(h.hosts.set_attributes("h-1", snapshot).await);

    let after = h
        .evaluator
        .evaluate("host", "h-1", "guest", "g-1", condition)
        .await
        .unwrap();
    assert!(after.matched);
}

#[tokio::test]
async fn test_long_conditions_are_bounded_by_length() {
    let h = harness();
    let chain = format!("{}host.mem_used_percent > 0.7", "host.sys_load > 5 || ".repeat(20_000));

    let err = h
        .evaluator
        .evaluate("host", "h-1", "guest", "g-1", &chain)
        .await
        .unwrap_err();
    assert!(matches!(err, EvaluationError::Parse(_)));

    let config = EngineConfig {
        max_condition_length: chain.len(),
        ..Default::default()
    };
    let evaluator = h.evaluator.with_config(&config);
    let outcome = evaluator
        .evaluate("host", "h-1", "guest", "g-1", &chain)
        .await
        .unwrap();
    assert!(outcome.matched);
}
