//! End-to-end authorization scenarios
//!
//! Each test compiles a type through the registry and evaluates it the way
//! a request handler would.

#[cfg(test)]
mod integration_tests {
    use authz_rules::acm::AccessControlMatrix;
    use authz_rules::claims::{CallerIdentity, ClaimValue, IamPrincipal, IdentityClaims};
    use authz_rules::compiler::{Decision, DenyReason, PROVIDER_PRECEDENCE};
    use authz_rules::config::{AuthConfig, CompilerConfig, ConfiguredAuthProviders};
    use authz_rules::engine::{AuthRegistry, RuleDocument, TypeRules};
    use authz_rules::filter::FilterExpr;
    use authz_rules::roles::RoleDefinition;
    use authz_rules::rules::AuthRule;
    use authz_rules::types::{AuthProvider, AuthStrategy, AuthType, ModelOperation, TypeSchema};
    use serde_json::json;
    use std::cell::RefCell;

    fn all_providers() -> ConfiguredAuthProviders {
        ConfiguredAuthProviders::new(AuthType::UserPools)
            .with_additional(AuthType::ApiKey)
            .with_additional(AuthType::Iam)
            .with_additional(AuthType::Oidc)
            .with_additional(AuthType::Lambda)
    }

    fn registry() -> AuthRegistry {
        AuthRegistry::new(all_providers(), CompilerConfig::default())
    }

    /// Claims accessor recording every claim name it is asked for
    struct RecordingClaims {
        claims: serde_json::Value,
        reads: RefCell<Vec<String>>,
    }

    impl RecordingClaims {
        fn new(claims: serde_json::Value) -> Self {
            Self {
                claims,
                reads: RefCell::new(Vec::new()),
            }
        }

        fn was_read(&self, name: &str) -> bool {
            self.reads.borrow().iter().any(|n| n == name)
        }
    }

    impl IdentityClaims for RecordingClaims {
        fn claim(&self, name: &str) -> Option<ClaimValue> {
            self.reads.borrow_mut().push(name.to_string());
            self.claims.claim(name)
        }
    }

    #[test]
    fn test_owner_read_public_create() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id", "title", "owner"])).with_rules(vec![
                    AuthRule::owner().with_operations([ModelOperation::Read]),
                    AuthRule::public().with_operations([ModelOperation::Create]),
                ]),
            )
            .unwrap();

        let alice = json!({ "username": "alice" });
        let expr = registry
            .authorize("Doc", ModelOperation::Get, &CallerIdentity::user_pools(&alice))
            .unwrap();

        assert!(!expr.decided());
        assert_eq!(expr.filter, Some(FilterExpr::eq("owner", "alice")));

        let anonymous = registry
            .authorize("Doc", ModelOperation::Get, &CallerIdentity::unauthenticated())
            .unwrap();
        assert_eq!(anonymous.deny_reason(), Some(&DenyReason::Unauthenticated));

        // The public rule only covers create
        let api_key_read = registry
            .authorize("Doc", ModelOperation::Get, &CallerIdentity::api_key())
            .unwrap();
        assert!(api_key_read.is_denied());
        assert!(registry
            .authorize("Doc", ModelOperation::Create, &CallerIdentity::api_key())
            .unwrap()
            .is_allowed());
    }

    #[test]
    fn test_public_grant_is_per_operation() {
        let registry = registry();
        let compiled = registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Test", &["id", "name"])).with_rules(vec![
                    AuthRule::public().with_operations([ModelOperation::Get, ModelOperation::Create]),
                ]),
            )
            .unwrap();

        let public = RoleDefinition::new(AuthProvider::ApiKey, AuthStrategy::Public, true).id();
        let acm: &AccessControlMatrix = compiled.acm();

        assert!(!acm.is_allowed(&public, "id", ModelOperation::List));
        assert!(acm.is_allowed(&public, "id", ModelOperation::Get));
        assert!(acm.is_allowed(&public, "name", ModelOperation::Create));
    }

    #[test]
    fn test_public_update_of_owner_only_field_is_rejected() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Person", &["id", "name", "ssn", "owner"]))
                    .with_rules(vec![AuthRule::public(), AuthRule::owner()])
                    .with_field_rules(
                        "ssn",
                        vec![AuthRule::owner().with_operations([
                            ModelOperation::Read,
                            ModelOperation::Update,
                        ])],
                    ),
            )
            .unwrap();

        let expr = registry
            .authorize_mutation(
                "Person",
                ModelOperation::Update,
                &CallerIdentity::api_key(),
                &json!({ "id": "1", "ssn": "123-45-6789" }),
            )
            .unwrap();
        assert_eq!(
            expr.deny_reason(),
            Some(&DenyReason::UnauthorizedFields {
                fields: vec!["ssn".to_string()]
            })
        );

        let without_ssn = registry
            .authorize_mutation(
                "Person",
                ModelOperation::Update,
                &CallerIdentity::api_key(),
                &json!({ "id": "1", "name": "Bob" }),
            )
            .unwrap();
        assert!(without_ssn.is_allowed());

        // The owner may write ssn, but only on records they own
        let alice = json!({ "username": "alice" });
        let owner_update = registry
            .authorize_mutation(
                "Person",
                ModelOperation::Update,
                &CallerIdentity::user_pools(&alice),
                &json!({ "id": "1", "ssn": "123-45-6789" }),
            )
            .unwrap();
        assert_eq!(owner_update.decision, Decision::Deferred);
        assert!(owner_update.permits_record(&json!({ "owner": "alice" })));
        assert!(!owner_update.permits_record(&json!({ "owner": "bob" })));
    }

    #[test]
    fn test_delete_denied_without_delete_on_restricted_field() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Person", &["id", "name", "ssn", "owner"]))
                    .with_rules(vec![AuthRule::public(), AuthRule::owner()])
                    .with_field_rules(
                        "ssn",
                        vec![AuthRule::owner().with_operations([
                            ModelOperation::Read,
                            ModelOperation::Update,
                        ])],
                    ),
            )
            .unwrap();

        let compiled = registry.get("Person").unwrap();
        assert!(compiled.acm().roles_per_operation(ModelOperation::Delete, true).is_empty());

        let public_delete = registry
            .authorize("Person", ModelOperation::Delete, &CallerIdentity::api_key())
            .unwrap();
        assert_eq!(public_delete.deny_reason(), Some(&DenyReason::NoMatchingRoles));

        // Nulling ssn on update is refused for the same reason
        let public_null = registry
            .authorize_mutation(
                "Person",
                ModelOperation::Update,
                &CallerIdentity::api_key(),
                &json!({ "id": "1", "ssn": null }),
            )
            .unwrap();
        assert!(public_null.is_denied());

        let alice = json!({ "username": "alice" });
        let owner_delete = registry
            .authorize("Person", ModelOperation::Delete, &CallerIdentity::user_pools(&alice))
            .unwrap();
        assert_eq!(owner_delete.deny_reason(), Some(&DenyReason::NoMatchingRoles));
    }

    #[test]
    fn test_delete_allowed_with_delete_on_restricted_field() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Person", &["id", "ssn", "owner"]))
                    .with_rules(vec![AuthRule::public(), AuthRule::owner()])
                    .with_field_rules(
                        "ssn",
                        vec![AuthRule::owner().with_operations([
                            ModelOperation::Read,
                            ModelOperation::Delete,
                        ])],
                    ),
            )
            .unwrap();

        assert!(registry
            .authorize("Person", ModelOperation::Delete, &CallerIdentity::api_key())
            .unwrap()
            .is_denied());

        let alice = json!({ "username": "alice" });
        let owner_delete = registry
            .authorize("Person", ModelOperation::Delete, &CallerIdentity::user_pools(&alice))
            .unwrap();
        assert_eq!(owner_delete.decision, Decision::Deferred);
        assert_eq!(owner_delete.filter, Some(FilterExpr::eq("owner", "alice")));
    }

    #[test]
    fn test_public_reader_gets_restricted_field_nulled() {
        let registry = registry();
        let compiled = registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Person", &["id", "name", "ssn"]))
                    .with_rules(vec![AuthRule::public(), AuthRule::owner()])
                    .with_field_rules("ssn", vec![AuthRule::owner().with_operations([ModelOperation::Read])]),
            )
            .unwrap();

        let caller = CallerIdentity::api_key();
        let expr = compiled.authorize(ModelOperation::Get, &caller);
        assert!(expr.is_allowed());

        let mut record = json!({ "id": "1", "name": "Bob", "ssn": "123", "owner": "bob" });
        let redacted = compiled.redact_record(ModelOperation::Get, &caller, &expr, &mut record);

        assert_eq!(redacted, vec!["ssn".to_string()]);
        assert_eq!(record["ssn"], serde_json::Value::Null);
        assert_eq!(record["name"], json!("Bob"));
    }

    #[test]
    fn test_no_roles_means_deny() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Locked", &["id"]))
                    .with_rules(vec![AuthRule::owner().with_operations([ModelOperation::Get])]),
            )
            .unwrap();

        let alice = json!({ "username": "alice" });
        for operation in ModelOperation::ALL {
            if operation == ModelOperation::Get {
                continue;
            }
            let expr = registry
                .authorize("Locked", operation, &CallerIdentity::user_pools(&alice))
                .unwrap();
            assert!(expr.is_denied(), "{} should be denied", operation);
            assert!(expr.filter.is_none());
        }
    }

    #[test]
    fn test_static_group_short_circuits_dynamic_claims() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id", "owner"]))
                    .with_rules(vec![AuthRule::groups(["Admin"]), AuthRule::owner()]),
            )
            .unwrap();

        let claims = RecordingClaims::new(json!({
            "username": "alice",
            "cognito:groups": ["Admin"]
        }));
        let expr = registry
            .authorize("Doc", ModelOperation::List, &CallerIdentity::user_pools(&claims))
            .unwrap();

        assert!(expr.is_allowed());
        assert!(expr.filter.is_none());
        assert!(claims.was_read("cognito:groups"));
        assert!(!claims.was_read("username"));

        let member = RecordingClaims::new(json!({ "username": "alice", "cognito:groups": ["Dev"] }));
        let expr = registry
            .authorize("Doc", ModelOperation::List, &CallerIdentity::user_pools(&member))
            .unwrap();
        assert!(!expr.decided());
        assert!(member.was_read("username"));
    }

    #[test]
    fn test_provider_precedence_is_fixed() {
        assert_eq!(
            PROVIDER_PRECEDENCE,
            [
                AuthType::ApiKey,
                AuthType::Lambda,
                AuthType::Iam,
                AuthType::UserPools,
                AuthType::Oidc
            ]
        );

        let registry = registry();
        let compiled = registry
            .register(&TypeRules::new(TypeSchema::with_scalars("Doc", &["id"])).with_rules(vec![
                AuthRule::owner().with_provider(AuthProvider::Oidc).with_identity_claim("sub"),
                AuthRule::private(),
                AuthRule::public(),
                AuthRule::custom(),
            ]))
            .unwrap();

        let plan = compiled.compiler().plan(ModelOperation::Get);
        let order: Vec<AuthType> = plan.iter().map(|step| step.auth_type).collect();
        assert_eq!(order, PROVIDER_PRECEDENCE.to_vec());
        assert_eq!(plan[4].dynamic_roles.len(), 1);
        assert_eq!(plan[3].static_roles.len(), 1);
    }

    #[test]
    fn test_oidc_caller_ignores_user_pools_rules() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id"]))
                    .with_rules(vec![AuthRule::private()]),
            )
            .unwrap();

        let claims = json!({ "sub": "u-1" });
        let expr = registry
            .authorize("Doc", ModelOperation::Get, &CallerIdentity::oidc(&claims))
            .unwrap();
        assert_eq!(expr.deny_reason(), Some(&DenyReason::NoMatchingRoles));
    }

    #[test]
    fn test_lambda_custom_rule() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id"]))
                    .with_rules(vec![AuthRule::custom().with_operations([ModelOperation::Read])]),
            )
            .unwrap();

        let claims = json!({});
        let caller = CallerIdentity::lambda(&claims);
        assert!(registry.authorize("Doc", ModelOperation::Get, &caller).unwrap().is_allowed());
        assert!(registry.authorize("Doc", ModelOperation::Delete, &caller).unwrap().is_denied());
    }

    #[test]
    fn test_admin_role_bypasses_rules_and_redaction() {
        let config: AuthConfig = serde_json::from_value(json!({
            "defaultAuthentication": { "authenticationType": "AMAZON_COGNITO_USER_POOLS" },
            "additionalAuthenticationProviders": [{ "authenticationType": "AWS_IAM" }],
            "adminRoles": ["BackendAdmin"]
        }))
        .unwrap();

        let registry = AuthRegistry::new(config.into(), CompilerConfig::default());
        let compiled = registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id", "secret"]))
                    .with_rules(vec![AuthRule::owner()])
                    .with_field_rules("secret", vec![]),
            )
            .unwrap();

        let principal = IamPrincipal::default()
            .with_user_arn("arn:aws:sts::111122223333:assumed-role/BackendAdmin/lambda-fn");
        let caller = CallerIdentity::iam(&principal);

        let expr = compiled.authorize(ModelOperation::Update, &caller);
        assert!(expr.is_allowed());
        assert!(expr.admin);

        let mut record = json!({ "id": "1", "secret": "s" });
        assert!(compiled
            .redact_record(ModelOperation::Get, &caller, &expr, &mut record)
            .is_empty());
        assert_eq!(record["secret"], json!("s"));
    }

    #[test]
    fn test_owner_populated_on_create() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Todo", &["id", "content"]))
                    .with_rules(vec![AuthRule::owner().with_owner_field("author")]),
            )
            .unwrap();

        let alice = json!({ "username": "alice" });
        let mut input = json!({ "content": "buy milk" });
        let expr = registry
            .authorize_mutation(
                "Todo",
                ModelOperation::Create,
                &CallerIdentity::user_pools(&alice),
                &input,
            )
            .unwrap();

        assert!(expr.is_allowed());
        expr.apply_input_defaults(&mut input);
        assert_eq!(input, json!({ "content": "buy milk", "author": "alice" }));
    }

    #[test]
    fn test_multiple_owner_roles_are_not_populated() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Todo", &["id"])).with_rules(vec![
                    AuthRule::owner(),
                    AuthRule::owner().with_owner_field("editor"),
                ]),
            )
            .unwrap();

        let alice = json!({ "username": "alice" });
        let expr = registry
            .authorize_mutation(
                "Todo",
                ModelOperation::Create,
                &CallerIdentity::user_pools(&alice),
                &json!({ "id": "1" }),
            )
            .unwrap();
        assert_eq!(expr.deny_reason(), Some(&DenyReason::ConditionNotMet));
        assert!(expr.input_defaults.is_empty());
    }

    #[test]
    fn test_null_update_needs_delete_grant() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id", "title", "note"]))
                    .with_rules(vec![AuthRule::public().with_operations([ModelOperation::Update])])
                    .with_field_rules(
                        "note",
                        vec![AuthRule::public().with_operations([ModelOperation::Update])],
                    ),
            )
            .unwrap();

        let caller = CallerIdentity::api_key();
        let set = registry
            .authorize_mutation("Doc", ModelOperation::Update, &caller, &json!({ "note": "n" }))
            .unwrap();
        assert!(set.is_allowed());

        let clear = registry
            .authorize_mutation("Doc", ModelOperation::Update, &caller, &json!({ "note": null }))
            .unwrap();
        assert_eq!(
            clear.deny_reason(),
            Some(&DenyReason::UnauthorizedFields {
                fields: vec!["note".to_string()]
            })
        );
    }

    #[test]
    fn test_private_field_rule_compatibility_is_pinned() {
        // A userPools private field rule stays visible to every userPools
        // role that allowed the record, including owner roles it never names
        let registry = registry();
        let compiled = registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id", "internal"]))
                    .with_rules(vec![AuthRule::owner(), AuthRule::public()])
                    .with_field_rules("internal", vec![AuthRule::private().with_operations([ModelOperation::Read])]),
            )
            .unwrap();

        let alice = json!({ "username": "alice" });
        let owner = CallerIdentity::user_pools(&alice);
        let expr = compiled.authorize(ModelOperation::Get, &owner);

        let owner_role = expr.dynamic_grants[0].role.clone();
        assert_eq!(owner_role.strategy, AuthStrategy::Owner);
        assert!(compiled
            .redactor()
            .is_field_visible("internal", ModelOperation::Get, &[owner_role]));

        let mut own = json!({ "id": "1", "owner": "alice", "internal": "x" });
        assert!(compiled
            .redact_record(ModelOperation::Get, &owner, &expr, &mut own)
            .is_empty());

        // A different provider is never compatible
        let api_key = CallerIdentity::api_key();
        let public_expr = compiled.authorize(ModelOperation::Get, &api_key);
        let mut record = json!({ "id": "1", "internal": "x" });
        assert_eq!(
            compiled.redact_record(ModelOperation::Get, &api_key, &public_expr, &mut record),
            vec!["internal".to_string()]
        );
    }

    #[test]
    fn test_caller_filter_is_narrowed() {
        let registry = registry();
        registry
            .register(
                &TypeRules::new(TypeSchema::with_scalars("Doc", &["id", "status"]))
                    .with_rules(vec![AuthRule::owner()]),
            )
            .unwrap();

        let alice = json!({ "username": "alice" });
        let expr = registry
            .authorize("Doc", ModelOperation::List, &CallerIdentity::user_pools(&alice))
            .unwrap();

        let merged = expr
            .merge_with_caller_filter(Some(FilterExpr::eq("status", "open")))
            .unwrap();
        assert!(merged.matches(&json!({ "owner": "alice", "status": "open" })));
        assert!(!merged.matches(&json!({ "owner": "bob", "status": "open" })));
        assert!(!merged.matches(&json!({ "owner": "alice", "status": "done" })));
    }

    #[test]
    fn test_rule_document_with_groups() {
        let doc = RuleDocument::from_json(
            r#"{
                "types": [
                    {
                        "name": "Post",
                        "fields": [{ "name": "id" }, { "name": "editors", "isList": true }],
                        "rules": [
                            { "allow": "groups", "groupsField": "editors", "operations": ["read", "update"] },
                            { "allow": "groups", "groups": "Admin" }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();

        let registry = registry();
        assert_eq!(registry.load(&doc).unwrap(), 1);

        let claims = json!({ "cognito:groups": ["writers"] });
        let expr = registry
            .authorize("Post", ModelOperation::Update, &CallerIdentity::user_pools(&claims))
            .unwrap();

        assert_eq!(expr.filter, Some(FilterExpr::eq("editors", "writers")));
        assert!(expr.permits_record(&json!({ "editors": ["readers", "writers"] })));

        let admin = json!({ "cognito:groups": ["Admin"] });
        assert!(registry
            .authorize("Post", ModelOperation::Delete, &CallerIdentity::user_pools(&admin))
            .unwrap()
            .is_allowed());
    }
}
