//! Deployment sessions against local bare repositories.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

use gearctl::{DeployError, Deployer, DeployerConfig};
use gearpush_repository::SKIP_BUILD_MARKER;
use gearpush_topology::{NodeAddress, TopologyError, TopologyRegistry, TopologySource};

/// Serves a fixed node list and counts fetches.
struct StaticSource {
    nodes: Vec<NodeAddress>,
    fetches: AtomicUsize,
}

impl StaticSource {
    fn new(nodes: Vec<NodeAddress>) -> Self {
        Self {
            nodes,
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TopologySource for StaticSource {
    async fn fetch_nodes(&self) -> Result<Vec<NodeAddress>, TopologyError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.nodes.clone())
    }
}

fn bare_remote(dir: &Path, files: &[(&str, &str)]) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.bare(true).initial_head("master");
    let repo = Repository::init_opts(dir, &opts).unwrap();

    {
        let mut builder = repo.treebuilder(None).unwrap();
        for (name, content) in files {
            let blob = repo.blob(content.as_bytes()).unwrap();
            builder.insert(name, blob, 0o100644).unwrap();
        }
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("refs/heads/master"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();
    }
    repo
}

fn remote_tip(remote: &Repository) -> Oid {
    remote
        .find_reference("refs/heads/master")
        .unwrap()
        .target()
        .unwrap()
}

fn remote_has(remote: &Repository, path: &str) -> bool {
    let commit = remote.find_commit(remote_tip(remote)).unwrap();
    let found = commit.tree().unwrap().get_path(Path::new(path)).is_ok();
    found
}

fn config(remote: &Path, extra: &[(&str, &str)]) -> DeployerConfig {
    let mut vars: HashMap<String, String> = [
        ("GEARPUSH_NAMESPACE", "ns"),
        ("GEARPUSH_APPLICATION", "app"),
        ("GEARPUSH_LOGIN", "me@example.com"),
        ("GEARPUSH_SSH_USER", "0123abcd"),
        ("GEARPUSH_DEPLOYMENT_TIMEOUT", "5"),
    ]
    .iter()
    .chain(extra.iter())
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert(
        "GEARPUSH_REMOTE_REPOSITORY".to_string(),
        remote.to_str().unwrap().to_string(),
    );

    DeployerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn deployer(config: DeployerConfig, source: Arc<StaticSource>) -> Deployer {
    Deployer::with_topology_source(config, Arc::new(TopologyRegistry::new()), source).unwrap()
}

fn war() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("WEB-INF/web.xml", FileOptions::<()>::default())
        .unwrap();
    zip.write_all(b"<web-app/>").unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_operations_require_start() {
    let dir = TempDir::new().unwrap();
    bare_remote(dir.path(), &[("README", "app")]);
    let deployer = deployer(config(dir.path(), &[]), Arc::new(StaticSource::new(vec![])));

    let err = deployer.undeploy("app.war").await.unwrap_err();
    assert!(matches!(err, DeployError::NotStarted));
}

#[tokio::test]
async fn test_deploy_and_undeploy_on_root_cartridge() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(dir.path(), &[("README", "app")]);
    let mut deployer = deployer(
        config(dir.path(), &[("GEARPUSH_CARTRIDGE", "php-5.3")]),
        Arc::new(StaticSource::new(vec![])),
    );

    deployer.start().await.unwrap();
    assert!(deployer.is_started());

    deployer
        .deploy_descriptor("index.php", b"<?php echo 'hi';".to_vec())
        .await
        .unwrap();
    assert!(remote_has(&remote, "index.php"));
    assert!(remote_has(&remote, "index.php.dodeploy"));

    deployer.undeploy("index.php").await.unwrap();
    assert!(!remote_has(&remote, "index.php"));
    assert!(!remote_has(&remote, "index.php.dodeploy"));

    deployer.stop().await.unwrap();
    assert!(!deployer.is_started());
}

#[tokio::test]
async fn test_front_end_context_without_proxying() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(dir.path(), &[("README", "app")]);
    let mut deployer = deployer(config(dir.path(), &[]), Arc::new(StaticSource::new(vec![])));

    deployer.start().await.unwrap();
    let context = deployer.deploy_archive("shop.war", war()).await.unwrap();
    deployer.stop().await.unwrap();

    assert!(remote_has(&remote, "deployments/shop.war"));
    assert!(remote_has(&remote, "deployments/shop.war.dodeploy"));

    assert_eq!(context.name, "app-ns.rhcloud.com:80");
    assert_eq!(context.host, "app-ns.rhcloud.com");
    assert_eq!(context.port, 80);
    assert_eq!(context.modules.len(), 1);
    assert_eq!(context.modules[0].path(), "/shop");
}

#[tokio::test]
async fn test_proxied_archives_claim_distinct_nodes() {
    let dir = TempDir::new().unwrap();
    bare_remote(dir.path(), &[("README", "app")]);
    let source = Arc::new(StaticSource::new(vec![
        NodeAddress::new("node1.example.com", 35531),
        NodeAddress::new("node2.example.com", 35546),
    ]));
    let mut deployer = deployer(
        config(dir.path(), &[("GEARPUSH_PROXY_REQUESTS", "true")]),
        Arc::clone(&source),
    );

    deployer.start().await.unwrap();
    let first = deployer.deploy_archive("one.war", war()).await.unwrap();
    let second = deployer.deploy_archive("two.war", war()).await.unwrap();
    let again = deployer.deploy_archive("one.war", war()).await.unwrap();
    deployer.stop().await.unwrap();

    assert_eq!(first.name, "node1.example.com:35531:app-ns.rhcloud.com");
    assert_eq!(first.port, 35531);
    assert_eq!(first.proxy_host, "app-ns.rhcloud.com");
    assert_eq!(first.proxy_port, 80);
    assert_eq!(second.host, "node1.example.com");
    assert_eq!(again.host, "node2.example.com");
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_source_build_marker_is_removed_on_stop() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(dir.path(), &[("README", "app"), ("pom.xml", "<project/>")]);
    let mut deployer = deployer(config(dir.path(), &[]), Arc::new(StaticSource::new(vec![])));

    deployer.start().await.unwrap();
    deployer.deploy_archive("app.war", war()).await.unwrap();
    assert!(remote_has(&remote, SKIP_BUILD_MARKER));

    deployer.stop().await.unwrap();
    assert!(!remote_has(&remote, SKIP_BUILD_MARKER));
    assert!(remote_has(&remote, "deployments/app.war"));
}

#[tokio::test]
async fn test_discard_history_restores_remote_on_stop() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(dir.path(), &[("README", "app"), ("pom.xml", "<project/>")]);
    let original = remote_tip(&remote);
    let mut deployer = deployer(
        config(dir.path(), &[("GEARPUSH_DISCARD_HISTORY", "true")]),
        Arc::new(StaticSource::new(vec![])),
    );

    deployer.start().await.unwrap();
    deployer.deploy_archive("app.war", war()).await.unwrap();
    assert_ne!(remote_tip(&remote), original);

    deployer.stop().await.unwrap();
    assert_eq!(remote_tip(&remote), original);
    assert!(!remote_has(&remote, "deployments/app.war"));
}

#[tokio::test]
async fn test_unreachable_remote_fails_start() {
    let dir = TempDir::new().unwrap();
    let mut deployer = deployer(
        config(&dir.path().join("missing.git"), &[]),
        Arc::new(StaticSource::new(vec![])),
    );

    let err = deployer.start().await.unwrap_err();
    assert!(matches!(err, DeployError::Repository(_)));
    assert!(!deployer.is_started());
}

fn ping_archive(dir: &Path) -> String {
    let path = dir.join("gear-ping.war");
    std::fs::write(&path, war()).unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_ping_archive_deployed_and_readiness_awaited() {
    let dir = TempDir::new().unwrap();
    let files = TempDir::new().unwrap();
    let remote = bare_remote(dir.path(), &[("README", "app")]);
    let ping = ping_archive(files.path());
    let mut deployer = deployer(
        config(
            dir.path(),
            &[
                ("GEARPUSH_PING_ARCHIVE", ping.as_str()),
                ("GEARPUSH_DOMAIN", "invalid"),
                ("GEARPUSH_DEPLOYMENT_TIMEOUT", "1"),
            ],
        ),
        Arc::new(StaticSource::new(vec![])),
    );

    deployer.start().await.unwrap();
    let started = Instant::now();
    let err = deployer.deploy_archive("shop.war", war()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));

    match &err {
        DeployError::NotReady {
            url,
            archive,
            timeout,
        } => {
            assert_eq!(url, "http://app-ns.invalid:80/gear-ping/deploy?name=shop.war");
            assert_eq!(archive, "shop.war");
            assert_eq!(*timeout, Duration::from_secs(1));
        }
        other => panic!("expected NotReady, got {other:?}"),
    }
    assert!(err.to_string().contains("/gear-ping/deploy?name=shop.war"));

    // Both archives went out in a single push before the wait.
    assert!(remote_has(&remote, "deployments/gear-ping.war"));
    assert!(remote_has(&remote, "deployments/gear-ping.war.dodeploy"));
    assert!(remote_has(&remote, "deployments/shop.war"));
    assert!(remote_has(&remote, "deployments/shop.war.dodeploy"));

    deployer.undeploy("shop.war").await.unwrap();
    assert!(!remote_has(&remote, "deployments/gear-ping.war"));
    assert!(!remote_has(&remote, "deployments/gear-ping.war.dodeploy"));
    assert!(!remote_has(&remote, "deployments/shop.war"));

    deployer.stop().await.unwrap();
}

#[tokio::test]
async fn test_ping_archive_ignored_without_application_server() {
    let dir = TempDir::new().unwrap();
    let files = TempDir::new().unwrap();
    let remote = bare_remote(dir.path(), &[("README", "app")]);
    let ping = ping_archive(files.path());
    let mut deployer = deployer(
        config(
            dir.path(),
            &[
                ("GEARPUSH_PING_ARCHIVE", ping.as_str()),
                ("GEARPUSH_CARTRIDGE", "php-5.3"),
            ],
        ),
        Arc::new(StaticSource::new(vec![])),
    );

    deployer.start().await.unwrap();
    deployer.deploy_archive("shop.war", war()).await.unwrap();
    deployer.stop().await.unwrap();

    assert!(remote_has(&remote, "shop.war"));
    assert!(!remote_has(&remote, "gear-ping.war"));
}

#[tokio::test]
async fn test_missing_ping_archive_fails_start() {
    let dir = TempDir::new().unwrap();
    let files = TempDir::new().unwrap();
    bare_remote(dir.path(), &[("README", "app")]);
    let missing = files.path().join("gear-ping.war");
    let mut deployer = deployer(
        config(
            dir.path(),
            &[("GEARPUSH_PING_ARCHIVE", missing.to_str().unwrap())],
        ),
        Arc::new(StaticSource::new(vec![])),
    );

    let err = deployer.start().await.unwrap_err();
    assert!(matches!(err, DeployError::Config(_)));
    assert!(!deployer.is_started());
}
