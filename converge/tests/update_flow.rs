//! Library-level update flow against the filesystem state store.
//!
//! Uses the real cluster and credential stores on a temp directory with a
//! scripted engine and a recording kubeconfig writer.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use converge::cancel::CancelToken;
use converge::core::kubeconfig::{KubeconfigIdentity, KubeconfigUser};
use converge::core::narrative::DryRunReport;
use converge::core::plan::ConvergenceRequest;
use converge::core::target::Backend;
use converge::io::cluster_store::{FsClusterStore, write_cluster};
use converge::io::credentials::{FsCredentialStore, SSH_PRIMARY_SLOT};
use converge::io::kubeconfig::MergePolicy;
use converge::test_support::{
    RecordingKubeconfig, ScriptedEngine, StaticContexts, cluster, convergence_result,
};
use converge::update::{Collaborators, UpdateOutcome, UpdateSettings, run_update};

const NAME: &str = "prod.k8s.example.com";

struct Fixture {
    _temp: tempfile::TempDir,
    clusters: FsClusterStore,
    credentials: FsCredentialStore,
    key_path: PathBuf,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let clusters = FsClusterStore::new(temp.path().join("state"));
    let mut c = cluster(NAME);
    c.region = Some("eu-west-1".to_string());
    write_cluster(&clusters, &c).expect("write cluster");
    let credentials = FsCredentialStore::new(&clusters.cluster_dir(NAME));
    let key_path = temp.path().join("id_ed25519.pub");
    fs::write(&key_path, "ssh-ed25519 AAAAC3Nza ops@laptop\n").expect("write key");
    Fixture {
        _temp: temp,
        clusters,
        credentials,
        key_path,
    }
}

fn run(
    fixture: &Fixture,
    engine: &ScriptedEngine,
    kubeconfig: &RecordingKubeconfig,
    request: &ConvergenceRequest,
    settings: &UpdateSettings,
) -> (UpdateOutcome, String) {
    let contexts = StaticContexts::new(["kind-dev"]);
    let collaborators = Collaborators {
        clusters: &fixture.clusters,
        engine,
        credentials: &fixture.credentials,
        kubeconfig,
        contexts: &contexts,
    };
    let mut out = Vec::new();
    let outcome = run_update(
        request,
        &collaborators,
        settings,
        &CancelToken::new(),
        &mut out,
    )
    .expect("update");
    (outcome, String::from_utf8(out).expect("utf8"))
}

#[test]
fn dry_run_imports_key_and_reports() {
    let fixture = fixture();
    let engine = ScriptedEngine::returning(convergence_result(Backend::DryRun, true));
    let kubeconfig = RecordingKubeconfig::default();
    let mut request = ConvergenceRequest::new(NAME);
    request.ssh_public_key = Some(fixture.key_path.clone());

    let (outcome, out) = run(
        &fixture,
        &engine,
        &kubeconfig,
        &request,
        &UpdateSettings::default(),
    );

    assert_eq!(outcome.report, Some(DryRunReport::PendingChanges));
    assert!(out.starts_with("--ssh-public-key on update is deprecated"));
    assert!(out.ends_with("Must specify --yes to apply changes\n"));
    let stored =
        fs::read_to_string(fixture.credentials.key_path(SSH_PRIMARY_SLOT)).expect("read key");
    assert_eq!(stored, "ssh-ed25519 AAAAC3Nza ops@laptop\n");
    assert!(kubeconfig.written().is_empty());

    let sent = &engine.requests()[0];
    assert_eq!(sent.cloud.region.as_deref(), Some("eu-west-1"));
}

#[test]
fn apply_writes_admin_kubeconfig_with_configured_merge_policy() {
    let fixture = fixture();
    let engine = ScriptedEngine::returning(convergence_result(Backend::Direct, false));
    let kubeconfig = RecordingKubeconfig::default();
    let mut request = ConvergenceRequest::new(NAME);
    request.yes = true;
    request.kubeconfig.create = false;
    request.kubeconfig.admin = Some(Duration::from_secs(2 * 3600));
    let settings = UpdateSettings {
        merge_policy: MergePolicy::File(PathBuf::from("/tmp/ops-kubeconfig")),
        cluster_tool: Some("clusterctl".to_string()),
        ..UpdateSettings::default()
    };

    let (outcome, out) = run(&fixture, &engine, &kubeconfig, &request, &settings);

    assert!(outcome.kubeconfig_exported);
    assert!(outcome.first_run);
    assert_eq!(
        kubeconfig.built()[0].0,
        KubeconfigIdentity::AdminCertificate { ttl_secs: 7200 }
    );
    let written = kubeconfig.written();
    assert_eq!(written.len(), 1);
    let (doc, merge) = &written[0];
    assert_eq!(merge, &MergePolicy::File(PathBuf::from("/tmp/ops-kubeconfig")));
    assert_eq!(doc.server, "https://api.prod.k8s.example.com");
    match &doc.user {
        Some(KubeconfigUser::AdminExec { name, args, .. }) => {
            assert_eq!(name, "prod.k8s.example.com-admin");
            assert!(args.contains(&"--ttl=7200s".to_string()));
        }
        other => panic!("unexpected user {other:?}"),
    }
    assert!(out.contains("Suggestions:"));
    assert!(out.contains("validate cluster: clusterctl validate cluster --wait 10m"));
    assert!(out.contains(" * read about installing addons at: "));
}

#[test]
fn cloudformation_first_run_names_the_stack() {
    let fixture = fixture();
    let engine = ScriptedEngine::returning(convergence_result(Backend::CloudFormation, true));
    let kubeconfig = RecordingKubeconfig::default();
    let mut request = ConvergenceRequest::new(NAME);
    request.target = "cloudformation".to_string();
    request.out_dir = Some(PathBuf::from("build/cf"));

    let (outcome, out) = run(
        &fixture,
        &engine,
        &kubeconfig,
        &request,
        &UpdateSettings::default(),
    );

    assert_eq!(outcome.plan.out_dir, PathBuf::from("build/cf"));
    assert!(out.contains("CloudFormation output has been placed into build/cf"));
    assert!(out.contains("--stack-name kubernetes-prod-k8s-example-com"));
    assert!(out.contains("--template-body file://build/cf/kubernetes.json"));
}
