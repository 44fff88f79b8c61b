//! Service discovery against the simulated server.

use std::{sync::Arc, time::Duration};

use tether_core::ServiceKind;
use tether_harness::{DOMAIN, FixtureOptions, SessionFixture, SimServer};
use tether_session::CreationOutcome;

const WAIT: Duration = Duration::from_secs(5);

fn fixture_with(server: SimServer) -> SessionFixture {
    SessionFixture::build(FixtureOptions { server: Arc::new(server), ..FixtureOptions::default() })
}

async fn connect(fixture: &SessionFixture) {
    assert_eq!(fixture.manager.ensure_session(true).await, Ok(CreationOutcome::Created));
    assert!(fixture.manager.wait_for_connected(WAIT).await);
    fixture.manager.settle().await;
}

#[tokio::test(start_paused = true)]
async fn second_run_fills_gaps_without_erasing() {
    let server = SimServer::new(DOMAIN);
    for kind in [ServiceKind::LegalIdentities, ServiceKind::EventLog, ServiceKind::MultiUserChat] {
        server.add_kind(kind);
    }
    let fixture = fixture_with(server);
    connect(&fixture).await;

    assert!(!fixture.manager.discover_services(None).await);
    let first = fixture.profile.snapshot();
    assert!(first.needs_update);
    assert_eq!(first.components.missing(), vec![ServiceKind::FileUpload, ServiceKind::Ledger]);

    fixture.server.add_kind(ServiceKind::FileUpload);
    fixture.server.add_kind(ServiceKind::Ledger);
    assert!(fixture.manager.discover_services(None).await);

    let second = fixture.profile.snapshot();
    assert!(!second.needs_update);
    assert!(second.components.is_complete());
    for kind in [ServiceKind::LegalIdentities, ServiceKind::EventLog, ServiceKind::MultiUserChat] {
        assert_eq!(second.components.get(kind), first.components.get(kind), "{kind} changed");
    }
    assert_eq!(second.components.file_upload_max_size(), Some(10_485_760));
}

#[tokio::test(start_paused = true)]
async fn vanished_component_keeps_known_address() {
    let fixture = SessionFixture::new();
    connect(&fixture).await;
    let before = fixture.profile.components();

    fixture.server.remove_component(&format!("muc.{DOMAIN}"));
    assert!(fixture.manager.discover_services(None).await);

    assert_eq!(fixture.profile.components(), before);
}

#[tokio::test(start_paused = true)]
async fn failing_item_does_not_abort_run() {
    let server = SimServer::with_standard_components(DOMAIN);
    server.fail_info(format!("edaler.{DOMAIN}"));
    let fixture = fixture_with(server);
    connect(&fixture).await;

    assert!(!fixture.manager.discover_services(None).await);

    let components = fixture.profile.components();
    assert_eq!(components.missing(), vec![ServiceKind::Ledger]);
    assert!(components.get(ServiceKind::ThingRegistry).is_some());
    assert!(components.get(ServiceKind::Provisioning).is_some());
}

#[tokio::test(start_paused = true)]
async fn post_connect_discovery_binds_sub_clients() {
    let fixture = SessionFixture::new();
    connect(&fixture).await;

    let muc = fixture.manager.sub_client(ServiceKind::MultiUserChat).await.expect("muc client");
    assert_eq!(muc.component_address(), format!("muc.{DOMAIN}"));
    assert!(fixture.manager.sub_client(ServiceKind::EventLog).await.is_none());
    assert!(fixture.manager.task_failures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn new_component_is_bound_after_rediscovery() {
    let server = SimServer::with_standard_components(DOMAIN);
    server.remove_component(&format!("registry.{DOMAIN}"));
    let fixture = fixture_with(server);
    connect(&fixture).await;
    assert!(fixture.manager.sub_client(ServiceKind::ThingRegistry).await.is_none());

    fixture.server.add_kind(ServiceKind::ThingRegistry);
    fixture.manager.discover_services(None).await;

    assert!(fixture.manager.sub_client(ServiceKind::ThingRegistry).await.is_some());
    assert_eq!(fixture.transports.created(), 1, "rebinding must keep the transport");
}

#[tokio::test(start_paused = true)]
async fn discovery_without_transport_returns_false() {
    let fixture = SessionFixture::new();

    assert!(!fixture.manager.discover_services(None).await);
    assert_eq!(fixture.profile.components().missing().len(), ServiceKind::REQUIRED.len());
    assert_eq!(fixture.server.info_queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn complete_profile_skips_post_connect_discovery() {
    let fixture = SessionFixture::new();
    connect(&fixture).await;
    let queries = fixture.server.info_queries();
    assert_eq!(queries, ServiceKind::ALL.len());
    fixture.manager.unload(true).await;

    connect(&fixture).await;

    assert_eq!(fixture.server.info_queries(), queries);
    assert!(fixture.manager.sub_client(ServiceKind::Ledger).await.is_some());
}
