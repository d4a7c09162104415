//! Certificate service with its cache

mod support;

use actionmgt_test_utils::assertions::*;
use actionmgt_test_utils::fixtures::*;
use actionmgt_test_utils::{ActionMgtConfig, ClientError, StoreCall};
use support::CertificateHarness;

#[tokio::test]
async fn add_does_not_populate_cache() {
    let h = CertificateHarness::new(&ActionMgtConfig::default());
    let id = h
        .service
        .add_certificate(TENANT, certificate_model("root-ca"))
        .await
        .unwrap();

    h.service.get_certificate(TENANT, &id).await.unwrap();
    assert_eq!(h.store.calls(StoreCall::GetCertificate), 1);

    h.service.get_certificate(TENANT, &id).await.unwrap();
    assert_eq!(h.store.calls(StoreCall::GetCertificate), 1);
    assert_eq!(h.service.cache_stats().hits, 1);
}

#[tokio::test]
async fn update_invalidates_cached_certificate() {
    let h = CertificateHarness::new(&ActionMgtConfig::default());
    let id = h
        .service
        .add_certificate(TENANT, certificate_model("root-ca"))
        .await
        .unwrap();
    h.service.get_certificate(TENANT, &id).await.unwrap();
    h.store.reset_calls();

    h.service
        .update_certificate_content(TENANT, &id, OTHER_PEM.as_bytes())
        .await
        .unwrap();
    let read = h.service.get_certificate(TENANT, &id).await.unwrap();

    assert_eq!(read.content, OTHER_PEM.as_bytes());
    assert_eq!(h.store.calls(StoreCall::GetCertificate), 1);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let h = CertificateHarness::new(&ActionMgtConfig::default());
    let id = h
        .service
        .add_certificate(TENANT, certificate_model("root-ca"))
        .await
        .unwrap();
    h.service.get_certificate(TENANT, &id).await.unwrap();

    h.service.delete_certificate(TENANT, &id).await.unwrap();
    let result = h.service.get_certificate(TENANT, &id).await;
    assert!(matches!(
        assert_client_error(&result),
        ClientError::CertificateNotFound { .. }
    ));
}

#[tokio::test]
async fn failed_update_keeps_cached_content() {
    let h = CertificateHarness::new(&ActionMgtConfig::default());
    let id = h
        .service
        .add_certificate(TENANT, certificate_model("root-ca"))
        .await
        .unwrap();
    h.service.get_certificate(TENANT, &id).await.unwrap();

    h.store.fail_writes(true);
    let result = h
        .service
        .update_certificate_content(TENANT, &id, OTHER_PEM.as_bytes())
        .await;
    assert_server_error(&result);
    h.store.fail_writes(false);

    h.store.reset_calls();
    let read = h.service.get_certificate(TENANT, &id).await.unwrap();
    assert_eq!(read.content, SAMPLE_PEM.as_bytes());
    assert_eq!(h.store.calls(StoreCall::GetCertificate), 0);
    assert_eq!(h.audit.events().len(), 1);
}
