//! Sub-client registry binding and disposal.

use std::sync::Arc;

use tether_client::{
    KeyRing, StandardSubClientFactory, SubClientError, SubClientRegistry, TransportClient,
    TransportFactory,
};
use tether_core::{ComponentAddresses, ServiceKind};
use tether_harness::{
    DOMAIN, RecordingSubClientFactory, SimServer, SimTransportFactory, onboarded_params,
};

fn transport() -> Arc<dyn TransportClient> {
    let factory = SimTransportFactory::new(Arc::new(SimServer::new(DOMAIN)));
    factory.create(&onboarded_params()).expect("sim transport").client
}

fn addresses(kinds: &[ServiceKind]) -> ComponentAddresses {
    let mut addresses = ComponentAddresses::new();
    for kind in kinds {
        addresses.set(*kind, format!("{kind}.{DOMAIN}"));
    }
    addresses
}

#[tokio::test]
async fn refresh_reports_each_change() {
    let transport = transport();
    let factory = RecordingSubClientFactory::new();
    let mut registry = SubClientRegistry::new();

    let first = addresses(&[ServiceKind::MultiUserChat, ServiceKind::Ledger]);
    let report = registry.refresh(&transport, &first, &factory, true).await.expect("refresh");
    assert_eq!(report.created, vec![ServiceKind::MultiUserChat, ServiceKind::Ledger]);
    assert_eq!(registry.len(), 2);

    let mut second = addresses(&[ServiceKind::MultiUserChat, ServiceKind::ThingRegistry]);
    second.set(ServiceKind::MultiUserChat, format!("conference.{DOMAIN}"));
    let report = registry.refresh(&transport, &second, &factory, true).await.expect("refresh");

    assert_eq!(report.created, vec![ServiceKind::ThingRegistry]);
    assert_eq!(report.replaced, vec![ServiceKind::MultiUserChat]);
    assert_eq!(report.removed, vec![ServiceKind::Ledger]);
    assert!(report.failed.is_empty());
    assert_eq!(factory.disposals(ServiceKind::MultiUserChat), 1);
    assert_eq!(factory.disposals(ServiceKind::Ledger), 1);
    assert_eq!(
        registry.get(ServiceKind::MultiUserChat).map(|c| c.component_address().to_string()),
        Some(format!("conference.{DOMAIN}"))
    );
}

#[tokio::test]
async fn matching_bindings_are_left_alone() {
    let transport = transport();
    let factory = RecordingSubClientFactory::new();
    let mut registry = SubClientRegistry::new();
    let wanted = addresses(&[ServiceKind::Provisioning]);

    registry.refresh(&transport, &wanted, &factory, true).await.expect("refresh");
    let report = registry.refresh(&transport, &wanted, &factory, true).await.expect("refresh");

    assert!(report.is_empty());
    assert_eq!(factory.created().len(), 1);
    assert_eq!(factory.total_disposals(), 0);
}

#[tokio::test]
async fn event_log_address_binds_no_client() {
    let transport = transport();
    let factory = RecordingSubClientFactory::new();
    let mut registry = SubClientRegistry::new();

    let report = registry
        .refresh(&transport, &addresses(&[ServiceKind::EventLog]), &factory, true)
        .await
        .expect("refresh");

    assert!(report.is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn ordinary_creation_failure_is_skipped() {
    let transport = transport();
    let factory = RecordingSubClientFactory::new();
    factory.fail_create(SubClientError::Creation {
        kind: ServiceKind::FileUpload,
        reason: "no upload slot".into(),
    });
    let mut registry = SubClientRegistry::new();

    let wanted = addresses(&[ServiceKind::FileUpload, ServiceKind::MultiUserChat]);
    let report = registry.refresh(&transport, &wanted, &factory, true).await.expect("refresh");

    assert_eq!(report.failed, vec![ServiceKind::FileUpload, ServiceKind::MultiUserChat]);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn key_refusal_still_binds_other_kinds() {
    let transport = transport();
    let factory = StandardSubClientFactory::new(Arc::new(KeyRing::new()));
    let mut registry = SubClientRegistry::new();
    let wanted = addresses(&[ServiceKind::LegalIdentities, ServiceKind::MultiUserChat]);

    let result = registry.refresh(&transport, &wanted, &factory, false).await;

    assert_eq!(
        result,
        Err(SubClientError::KeyGenerationNotPermitted { kind: ServiceKind::LegalIdentities })
    );
    assert!(registry.get(ServiceKind::LegalIdentities).is_none());
    assert!(registry.get(ServiceKind::MultiUserChat).is_some());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn dispose_all_continues_past_failures() {
    let transport = transport();
    let factory = RecordingSubClientFactory::new();
    factory.fail_dispose(ServiceKind::FileUpload);
    let mut registry = SubClientRegistry::new();
    let wanted = addresses(&[
        ServiceKind::LegalIdentities,
        ServiceKind::FileUpload,
        ServiceKind::MultiUserChat,
    ]);
    registry.refresh(&transport, &wanted, &factory, true).await.expect("refresh");

    let failures = registry.dispose_all().await;

    assert_eq!(failures.len(), 1);
    assert!(registry.is_empty());
    for kind in [ServiceKind::LegalIdentities, ServiceKind::FileUpload, ServiceKind::MultiUserChat]
    {
        assert_eq!(factory.disposals(kind), 1, "{kind}");
    }
    assert!(registry.dispose_all().await.is_empty());
    assert_eq!(factory.total_disposals(), 3);
}
