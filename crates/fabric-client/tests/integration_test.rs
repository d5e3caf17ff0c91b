//! Integration tests for the fabric client
//!
//! These tests require a reachable cluster with the fabric CRDs installed.
//! Set KUBECONFIG (or run in-cluster) and FABRIC_NAMESPACE to run.

use fabric_client::{FabricClient, FabricClientTrait, FabricError, ListQuery};

async fn client() -> FabricClient {
    let kube_client = kube::Client::try_default()
        .await
        .expect("Failed to create Kubernetes client");
    FabricClient::new(kube_client)
}

fn namespace() -> String {
    std::env::var("FABRIC_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

#[tokio::test]
#[ignore] // Requires running cluster
async fn test_list_switches() {
    let client = client().await;
    let switches = client
        .list_switches(&namespace(), &ListQuery::all().with_limit(10))
        .await
        .expect("Failed to list switches");

    println!("Found {} switches", switches.len());
}

#[tokio::test]
#[ignore] // Requires running cluster
async fn test_get_missing_switch_is_not_found() {
    let client = client().await;
    let result = client
        .get_switch(&namespace(), "switch-that-does-not-exist")
        .await;

    assert!(matches!(result, Err(FabricError::NotFound(_))));
}

#[tokio::test]
#[ignore] // Requires running cluster
async fn test_delete_missing_subnet_is_not_found() {
    let client = client().await;
    let result = client
        .delete_subnet(&namespace(), "subnet-that-does-not-exist")
        .await;

    assert!(matches!(result, Err(FabricError::NotFound(_))));
}
