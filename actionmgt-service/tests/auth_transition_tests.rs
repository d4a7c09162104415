//! Endpoint authentication updates and PATCH semantics

mod support;

use actionmgt_test_utils::assertions::*;
use actionmgt_test_utils::fixtures::*;
use actionmgt_test_utils::{
    ActionPatch, ActionStatus, AuditOperation, AuthProperty, AuthType, Authentication, StoreCall,
};
use support::{ActionHarness, OTHER_PATH, PATH};

fn write_calls(h: &ActionHarness) -> usize {
    [
        StoreCall::AddAction,
        StoreCall::UpdateAction,
        StoreCall::DeleteAction,
        StoreCall::SetActionStatus,
        StoreCall::UpdateActionEndpoint,
        StoreCall::UpdateActionAuthProperties,
    ]
    .into_iter()
    .map(|call| h.store.calls(call))
    .sum()
}

#[tokio::test]
async fn basic_to_bearer_drops_basic_properties() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, basic_model("enricher"))
        .await
        .unwrap();

    let updated = h
        .service
        .update_action_endpoint_authentication(
            TENANT,
            PATH,
            &added.id,
            Authentication::bearer("fresh-token"),
        )
        .await
        .unwrap();

    assert_eq!(updated.endpoint.authentication, Authentication::bearer("fresh-token"));
    assert_eq!(updated.endpoint.uri, added.endpoint.uri);
    assert_eq!(h.store.calls(StoreCall::UpdateActionEndpoint), 1);
    assert_eq!(h.store.calls(StoreCall::UpdateActionAuthProperties), 0);

    let stored = h.stored(TENANT, &added.id).await.unwrap();
    assert_eq!(stored.endpoint.authentication.auth_type, AuthType::Bearer);
    assert_eq!(stored.endpoint.authentication.property(AuthProperty::Username), None);
    assert_eq!(stored.endpoint.authentication.property(AuthProperty::Password), None);
    assert_ne!(
        stored.endpoint.authentication.property(AuthProperty::AccessToken),
        Some("fresh-token")
    );

    // Only the bearer token is left in the vault.
    assert_eq!(h.secrets.len(), 1);
    assert_eq!(
        h.audit.operations(),
        vec![AuditOperation::Add, AuditOperation::Update]
    );
}

#[tokio::test]
async fn blank_access_token_fails_and_keeps_basic() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, basic_model("enricher"))
        .await
        .unwrap();
    h.store.reset_calls();

    let result = h
        .service
        .update_action_endpoint_authentication(
            TENANT,
            PATH,
            &added.id,
            Authentication::bearer("   "),
        )
        .await;
    assert_invalid_field(&result, AuthProperty::AccessToken.field_label());
    assert_eq!(write_calls(&h), 0);

    let read = h
        .service
        .get_action_by_id(TENANT, PATH, &added.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        read.endpoint.authentication,
        Authentication::basic("admin", "basic-secret")
    );
}

#[tokio::test]
async fn same_type_updates_properties_only() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, basic_model("enricher"))
        .await
        .unwrap();

    let updated = h
        .service
        .update_action_endpoint_authentication(
            TENANT,
            PATH,
            &added.id,
            Authentication::basic("operator", "rotated"),
        )
        .await
        .unwrap();

    assert_eq!(
        updated.endpoint.authentication,
        Authentication::basic("operator", "rotated")
    );
    assert_eq!(h.store.calls(StoreCall::UpdateActionAuthProperties), 1);
    assert_eq!(h.store.calls(StoreCall::UpdateActionEndpoint), 0);
    assert_eq!(h.secrets.len(), 1);
}

#[tokio::test]
async fn extra_properties_of_other_types_are_dropped() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, api_key_model("enricher"))
        .await
        .unwrap();

    let requested = Authentication::bearer("token").with_property(AuthProperty::Username, "stale");
    let updated = h
        .service
        .update_action_endpoint_authentication(TENANT, PATH, &added.id, requested)
        .await
        .unwrap();
    assert_eq!(updated.endpoint.authentication, Authentication::bearer("token"));
}

#[tokio::test]
async fn header_with_crlf_is_rejected_before_any_write() {
    let h = ActionHarness::new(config_with_quota(2));
    let added = h
        .service
        .add_action(TENANT, PATH, bearer_model("enricher"))
        .await
        .unwrap();
    h.store.reset_calls();

    let injected = Authentication::api_key("X-Api-Key\r\nX-Injected: 1", "value");
    let result = h
        .service
        .update_action_endpoint_authentication(TENANT, PATH, &added.id, injected.clone())
        .await;
    assert_invalid_field(&result, AuthProperty::Header.field_label());

    let mut model = api_key_model("second");
    model.endpoint.authentication = injected;
    let result = h.service.add_action(TENANT, PATH, model).await;
    assert_invalid_field(&result, AuthProperty::Header.field_label());

    assert_eq!(write_calls(&h), 0);
    assert_eq!(h.secrets.len(), 1);
}

#[tokio::test]
async fn patch_with_only_name_keeps_endpoint_and_status() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, api_key_model("enricher"))
        .await
        .unwrap();
    h.service
        .deactivate_action(TENANT, PATH, &added.id)
        .await
        .unwrap();

    let updated = h
        .service
        .update_action(
            TENANT,
            PATH,
            &added.id,
            ActionPatch::default().with_name("renamed"),
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.endpoint, added.endpoint);
    assert_eq!(updated.status, ActionStatus::Inactive);
    assert_eq!(updated.id, added.id);
    assert_eq!(updated.action_type, added.action_type);
}

#[tokio::test]
async fn blank_patch_fields_are_ignored() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, bearer_model("enricher").with_description("v1"))
        .await
        .unwrap();

    let updated = h
        .service
        .update_action(
            TENANT,
            PATH,
            &added.id,
            ActionPatch::default()
                .with_name("  ")
                .with_description("")
                .with_uri(" "),
        )
        .await
        .unwrap();
    assert_eq!(updated, added);
}

#[tokio::test]
async fn patch_validates_supplied_fields() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, bearer_model("enricher"))
        .await
        .unwrap();
    h.store.reset_calls();

    let result = h
        .service
        .update_action(
            TENANT,
            PATH,
            &added.id,
            ActionPatch::default().with_name("bad/name"),
        )
        .await;
    assert_invalid_field(&result, "Action name");

    let result = h
        .service
        .update_action(
            TENANT,
            PATH,
            &added.id,
            ActionPatch::default().with_uri("ftp://files.example.com"),
        )
        .await;
    assert_invalid_field(&result, "Endpoint URI");

    let result = h
        .service
        .update_action(
            TENANT,
            PATH,
            &added.id,
            ActionPatch::default().with_authentication(Authentication::new(AuthType::ApiKey)),
        )
        .await;
    assert_invalid_field(&result, AuthProperty::Header.field_label());
    assert_eq!(write_calls(&h), 0);
}

#[tokio::test]
async fn type_mismatch_is_action_not_found() {
    let h = ActionHarness::new(config_with_quota(1));
    let added = h
        .service
        .add_action(TENANT, PATH, bearer_model("enricher"))
        .await
        .unwrap();
    h.store.reset_calls();

    assert!(h
        .service
        .get_action_by_id(TENANT, OTHER_PATH, &added.id)
        .await
        .unwrap()
        .is_none());
    assert_action_not_found(
        &h.service
            .update_action(
                TENANT,
                OTHER_PATH,
                &added.id,
                ActionPatch::default().with_name("x"),
            )
            .await,
    );
    assert_action_not_found(&h.service.delete_action(TENANT, OTHER_PATH, &added.id).await);
    assert_action_not_found(
        &h.service
            .activate_action(TENANT, OTHER_PATH, &added.id)
            .await,
    );
    assert_action_not_found(
        &h.service
            .update_action_endpoint_authentication(
                TENANT,
                OTHER_PATH,
                &added.id,
                Authentication::none(),
            )
            .await,
    );
    assert_action_not_found(
        &h.service
            .deactivate_action(TENANT, PATH, "no-such-id")
            .await,
    );
    assert_eq!(write_calls(&h), 0);
    assert!(h.stored(TENANT, &added.id).await.is_some());
}

#[tokio::test]
async fn audit_payloads_never_carry_secrets() {
    let h = ActionHarness::new(config_with_quota(3));
    let basic = h
        .service
        .add_action(TENANT, PATH, basic_model("a"))
        .await
        .unwrap();
    let bearer = h
        .service
        .add_action(TENANT, PATH, bearer_model("b"))
        .await
        .unwrap();
    h.service
        .add_action(TENANT, PATH, api_key_model("c"))
        .await
        .unwrap();
    h.service
        .update_action_endpoint_authentication(
            TENANT,
            PATH,
            &basic.id,
            Authentication::api_key("X-Other", "switched-secret"),
        )
        .await
        .unwrap();
    h.service
        .update_action(
            TENANT,
            PATH,
            &bearer.id,
            ActionPatch::default().with_authentication(Authentication::bearer("patched-secret")),
        )
        .await
        .unwrap();
    h.service.delete_action(TENANT, PATH, &basic.id).await.unwrap();

    let events = h.audit.events();
    assert_eq!(events.len(), 6);
    for event in events {
        let text = serde_json::to_string(&event).unwrap();
        for secret in [
            "basic-secret",
            "bearer-secret",
            "api-secret",
            "switched-secret",
            "patched-secret",
        ] {
            assert!(!text.contains(secret), "audit event leaked {}", secret);
        }
    }
}
