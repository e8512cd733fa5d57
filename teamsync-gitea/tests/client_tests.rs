use std::time::Duration;

use serde_json::json;
use teamsync_core::{ExternalKey, GiteaSettings, Organization, Team};
use teamsync_gitea::{
    CredentialSelector, GiteaClient, MemoryTransport, Method, MutationOutcome, RawResponse,
    RemoteError, TransportError, UserQuery,
};

const BASE: &str = "http://gitea.test";

fn settings(tokens: &[&str]) -> GiteaSettings {
    GiteaSettings {
        base_url: BASE.to_owned(),
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        page_limit: 2,
        request_timeout: Duration::from_secs(2),
    }
}

fn eng() -> Team {
    Team {
        id: 7,
        name: "eng".into(),
        permission: Some("write".into()),
    }
}

/// Accepts only `good` as credential; everything else is 401.
fn only_token(good: &'static str, body: serde_json::Value) -> MemoryTransport {
    let body = body.to_string();
    MemoryTransport::new(BASE).route(Method::Get, "/api/v1/users/search", move |req| {
        if req.query_value("access_token") == Some(good) {
            Ok(RawResponse {
                status: 200,
                body: body.clone(),
            })
        } else {
            Ok(RawResponse {
                status: 401,
                body: json!({"message": "token is required"}).to_string(),
            })
        }
    })
}

#[test]
fn falls_back_to_last_credential_when_earlier_ones_are_rejected() {
    let transport = only_token(
        "t3",
        json!({"ok": true, "data": [{"id": 1, "login": "alice", "full_name": "Alice A"}]}),
    );
    let client = GiteaClient::new(&settings(&["t1", "t2", "t3"]), transport, false);
    let mut selector = CredentialSelector::new();

    let users = client
        .search_users(UserQuery::DisplayName("Alice A"), &mut selector)
        .expect("search");

    assert_eq!(users.len(), 1);
    assert_eq!(selector.index(), 2);
    let tokens: Vec<_> = client
        .transport()
        .requests()
        .iter()
        .map(|r| r.query_value("access_token").unwrap_or_default().to_owned())
        .collect();
    assert_eq!(tokens, vec!["t1", "t2", "t3"]);
}

#[test]
fn exhausted_pool_is_no_valid_credential() {
    let transport = only_token("never", json!({"ok": true, "data": []}));
    let client = GiteaClient::new(&settings(&["t1", "t2"]), transport, false);
    let mut selector = CredentialSelector::new();

    let err = client
        .search_users(UserQuery::Id(4), &mut selector)
        .unwrap_err();
    assert!(matches!(err, RemoteError::NoValidCredential { attempted: 2 }));
    assert!(err.is_run_fatal());
}

#[test]
fn selector_state_carries_over_between_calls() {
    let transport = only_token("t2", json!({"ok": true, "data": []}));
    let client = GiteaClient::new(&settings(&["t1", "t2"]), transport, false);
    let mut selector = CredentialSelector::new();

    client
        .search_users(UserQuery::Id(1), &mut selector)
        .unwrap();
    client
        .search_users(UserQuery::Id(2), &mut selector)
        .unwrap();

    // Second call starts on the credential that worked.
    assert_eq!(client.transport().requests().len(), 3);
    assert_eq!(selector.index(), 1);
}

#[test]
fn organizations_follow_pagination_until_empty_page() {
    let transport = MemoryTransport::new(BASE).json_pages(
        "/api/v1/admin/orgs",
        vec![
            json!([{"id": 1, "username": "acme"}, {"id": 2, "username": "globex"}]),
            json!([{"id": 3, "username": "initech"}]),
        ],
    );
    let client = GiteaClient::new(&settings(&["t1"]), transport, false);
    let mut selector = CredentialSelector::new();

    let orgs = client.list_organizations(&mut selector).expect("orgs");
    let names: Vec<_> = orgs.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["acme", "globex", "initech"]);

    let pages: Vec<_> = client
        .transport()
        .requests()
        .iter()
        .map(|r| r.query_value("page").unwrap_or_default().to_owned())
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
    assert!(client
        .transport()
        .requests()
        .iter()
        .all(|r| r.query_value("limit") == Some("2")));
}

#[test]
fn organization_pages_restart_from_first_credential() {
    let transport = MemoryTransport::new(BASE).route(Method::Get, "/api/v1/admin/orgs", |req| {
        let status = if req.query_value("access_token") == Some("t2") {
            200
        } else {
            403
        };
        let body = if req.query_value("page") == Some("1") {
            json!([{"id": 1, "username": "acme"}])
        } else {
            json!([])
        };
        Ok(RawResponse {
            status,
            body: body.to_string(),
        })
    });
    let client = GiteaClient::new(&settings(&["t1", "t2"]), transport, false);
    let mut selector = CredentialSelector::new();

    let orgs = client.list_organizations(&mut selector).expect("orgs");
    assert_eq!(orgs.len(), 1);
    // page 1: t1 rejected, t2 ok; page 2: reset, t1 rejected, t2 ok
    assert_eq!(client.transport().requests().len(), 4);
}

#[test]
fn teams_and_members_are_listed() {
    let transport = MemoryTransport::new(BASE)
        .json_pages(
            "/api/v1/orgs/acme/teams",
            vec![json!([
                {"id": 1, "name": "Owners", "permission": "owner"},
                {"id": 7, "name": "eng", "permission": "write"}
            ])],
        )
        .json_pages(
            "/api/v1/teams/7/members",
            vec![json!([{"id": 21, "login": "bob", "full_name": "Bob B"}])],
        );
    let client = GiteaClient::new(&settings(&["t1"]), transport, false);
    let mut selector = CredentialSelector::new();
    let org = Organization {
        id: 1,
        name: "acme".into(),
    };

    let teams = client.list_teams(&org, &mut selector).expect("teams");
    assert_eq!(teams.len(), 2);
    assert_eq!(teams[0].permission.as_deref(), Some("owner"));

    let members = client.list_members(&eng(), &mut selector).expect("members");
    let bob = &members[&ExternalKey::from("bob")];
    assert_eq!(bob.remote_id, Some(21));
    assert_eq!(bob.display_name, "Bob B");
}

#[test]
fn garbled_member_listing_is_a_decode_error() {
    let transport = MemoryTransport::new(BASE).route(Method::Get, "/api/v1/teams/7/members", |_| {
        Ok(RawResponse {
            status: 200,
            body: "<html>maintenance</html>".into(),
        })
    });
    let client = GiteaClient::new(&settings(&["t1"]), transport, false);

    let err = client
        .list_members(&eng(), &mut CredentialSelector::new())
        .unwrap_err();
    assert!(matches!(err, RemoteError::Decode { .. }));
    assert!(!err.is_run_fatal());
    assert!(!err.to_string().contains("t1"), "credential leaked: {err}");
}

#[test]
fn server_error_payload_is_still_parsed() {
    let transport = MemoryTransport::new(BASE)
        .json(
            Method::Get,
            "/api/v1/users/search",
            500,
            json!({"ok": false, "data": []}),
        )
        .json(
            Method::Get,
            "/api/v1/teams/7/members",
            500,
            json!({"message": "database is locked"}),
        );
    let client = GiteaClient::new(&settings(&["t1"]), transport, false);
    let mut selector = CredentialSelector::new();

    let users = client
        .search_users(UserQuery::DisplayName("x"), &mut selector)
        .expect("defensive parse");
    assert!(users.is_empty());

    let err = client.list_members(&eng(), &mut selector).unwrap_err();
    match err {
        RemoteError::Api {
            status, message, ..
        } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database is locked");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[test]
fn timeouts_are_classified_and_not_retried() {
    let transport = MemoryTransport::new(BASE).route(Method::Get, "/api/v1/users/search", |_| {
        Err(TransportError::Timeout("2s elapsed".into()))
    });
    let client = GiteaClient::new(&settings(&["t1", "t2"]), transport, false);

    let err = client
        .search_users(UserQuery::Id(1), &mut CredentialSelector::new())
        .unwrap_err();
    assert!(matches!(err, RemoteError::Timeout { .. }));
    assert!(err.is_transient());
    assert_eq!(client.transport().requests().len(), 1);
}

#[test]
fn mutations_hit_member_endpoints() {
    let transport = MemoryTransport::new(BASE)
        .json(Method::Put, "/api/v1/teams/7/members/alice", 204, json!(null))
        .json(Method::Delete, "/api/v1/teams/7/members/bob", 204, json!(null));
    let client = GiteaClient::new(&settings(&["t1"]), transport, false);
    let mut selector = CredentialSelector::new();

    assert_eq!(
        client.add_member(&eng(), "alice", &mut selector).unwrap(),
        MutationOutcome::Applied
    );
    assert_eq!(
        client.remove_member(&eng(), "bob", &mut selector).unwrap(),
        MutationOutcome::Applied
    );
    let methods: Vec<_> = client
        .transport()
        .mutations()
        .iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, vec![Method::Put, Method::Delete]);
}

/// Answers `method path` with 204 for `good`, 401 for any other credential.
fn mutation_accepting(method: Method, path: &str, good: &'static str) -> MemoryTransport {
    MemoryTransport::new(BASE).route(method, path, move |req| {
        let status = if req.query_value("access_token") == Some(good) {
            204
        } else {
            401
        };
        Ok(RawResponse {
            status,
            body: json!({"message": "token is required"}).to_string(),
        })
    })
}

#[test]
fn mutation_falls_back_to_next_credential() {
    let transport = mutation_accepting(Method::Put, "/api/v1/teams/7/members/alice", "t2");
    let client = GiteaClient::new(&settings(&["t1", "t2"]), transport, false);
    let mut selector = CredentialSelector::new();

    let outcome = client
        .add_member(&eng(), "alice", &mut selector)
        .expect("second credential accepted");

    assert_eq!(outcome, MutationOutcome::Applied);
    assert_eq!(selector.index(), 1);
    let tokens: Vec<_> = client
        .transport()
        .mutations()
        .iter()
        .map(|r| r.query_value("access_token").unwrap_or_default().to_owned())
        .collect();
    assert_eq!(tokens, vec!["t1", "t2"]);
}

#[test]
fn mutation_with_every_credential_rejected_is_no_valid_credential() {
    let transport = mutation_accepting(Method::Delete, "/api/v1/teams/7/members/bob", "never");
    let client = GiteaClient::new(&settings(&["t1", "t2"]), transport, false);

    let err = client
        .remove_member(&eng(), "bob", &mut CredentialSelector::new())
        .unwrap_err();

    assert!(matches!(err, RemoteError::NoValidCredential { attempted: 2 }));
    assert!(err.is_run_fatal());
    assert_eq!(client.transport().mutations().len(), 2);
}

#[test]
fn not_found_on_mutation_is_already_satisfied() {
    let client = GiteaClient::new(&settings(&["t1"]), MemoryTransport::new(BASE), false);
    let outcome = client
        .remove_member(&eng(), "ghost", &mut CredentialSelector::new())
        .expect("404 is not an error");
    assert_eq!(outcome, MutationOutcome::AlreadySatisfied);
}

#[test]
fn rejected_mutation_surfaces_api_error() {
    let transport = MemoryTransport::new(BASE).json(
        Method::Put,
        "/api/v1/teams/7/members/alice",
        422,
        json!({"message": "user is inactive"}),
    );
    let client = GiteaClient::new(&settings(&["t1"]), transport, false);

    let err = client
        .add_member(&eng(), "alice", &mut CredentialSelector::new())
        .unwrap_err();
    assert!(matches!(err, RemoteError::Api { status: 422, .. }));
    assert!(!err.is_run_fatal());
}

#[test]
fn dry_run_never_sends_mutations() {
    let client = GiteaClient::new(&settings(&["t1"]), MemoryTransport::new(BASE), true);
    let mut selector = CredentialSelector::new();

    assert_eq!(
        client.add_member(&eng(), "alice", &mut selector).unwrap(),
        MutationOutcome::WouldApply
    );
    assert_eq!(
        client.remove_member(&eng(), "bob", &mut selector).unwrap(),
        MutationOutcome::WouldApply
    );
    assert!(client.transport().requests().is_empty());
}

#[test]
fn dry_run_still_reads() {
    let transport = MemoryTransport::new(BASE).json_pages("/api/v1/admin/orgs", vec![]);
    let client = GiteaClient::new(&settings(&["t1"]), transport, true);

    let orgs = client
        .list_organizations(&mut CredentialSelector::new())
        .unwrap();
    assert!(orgs.is_empty());
    assert_eq!(client.transport().requests().len(), 1);
}
