use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use qcinv_exec::error::ExecError;
use qcinv_exec::result::CommandResult;
use qcinv_exec::traits::CommandRunner;
use qcinv_inventory::client::Instances;
use qcinv_inventory::config::{CacheConfig, Pagination};
use qcinv_inventory::types::{Instance, to_sorted_json};
use qcinv_inventory::*;

// Mock implementations
struct MockRunner {
    responses: Mutex<VecDeque<CommandResult>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockRunner {
    fn new(responses: Vec<CommandResult>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandResult, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExecError::SpawnError("no more mock responses".to_string()))
    }

    fn runner_type(&self) -> &'static str {
        "mock"
    }
}

fn ok(stdout: String) -> CommandResult {
    CommandResult {
        status: 0,
        stdout,
        stderr: String::new(),
        duration: Duration::from_millis(1),
    }
}

fn failed(status: i32, stderr: &str) -> CommandResult {
    CommandResult {
        status,
        stdout: String::new(),
        stderr: stderr.to_string(),
        duration: Duration::from_millis(1),
    }
}

fn instance(n: usize) -> Value {
    json!({
        "InstanceId": format!("ins-{n:04}"),
        "InstanceName": format!("web {n}"),
        "PublicIpAddress": {"IpAddress": [format!("1.1.{}.{}", n / 256, n % 256)]},
        "VpcAttributes": {"PrivateIpAddress": {"IpAddress": [format!("10.0.{}.{}", n / 256, n % 256)]}}
    })
}

fn page(total: usize, range: std::ops::Range<usize>) -> CommandResult {
    let items: Vec<Value> = range.map(instance).collect();
    ok(json!({"TotalCount": total, "InstanceSet": items, "RequestId": "req"}).to_string())
}

const CONFIG: &str = r#"
[cache]
path = "unused.json"

[cvm]
user = "root"
host = "{PublicIp}"
port = 22

[cvm."web_1"]
user = "admin"
host = "{Vip}"
"#;

fn config(extra: &str) -> Arc<Config> {
    Arc::new(Config::from_toml_str(&format!("{CONFIG}\n{extra}")).unwrap())
}

fn builder(runner: Arc<MockRunner>, config: Arc<Config>) -> InventoryBuilder {
    let client = QcloudClient::new(runner, config.fetch.clone());
    InventoryBuilder::new(client, config)
}

fn cache_in(dir: &tempfile::TempDir, disable: bool) -> CacheManager {
    cache_with_age(dir, 3600, disable)
}

fn cache_with_age(dir: &tempfile::TempDir, max_age: i64, disable: bool) -> CacheManager {
    CacheManager::new(&CacheConfig {
        path: dir.path().join("qcinv/inventory.json"),
        max_age,
        cache_disable: disable,
    })
    .unwrap()
}

async fn collect(mut instances: Instances<'_>) -> Result<Vec<Instance>, InventoryError> {
    let mut all = Vec::new();
    while let Some(instance) = instances.next().await {
        all.push(instance?);
    }
    Ok(all)
}

#[tokio::test]
async fn test_two_pages_yield_exactly_total() {
    let runner = MockRunner::new(vec![page(150, 0..100), page(150, 100..150)]);
    let client = QcloudClient::new(runner.clone(), config("").fetch.clone());

    let instances = collect(client.describe("cvm")).await.unwrap();

    assert_eq!(instances.len(), 150);
    assert_eq!(instances[0]["InstanceId"], "ins-0000");
    assert_eq!(instances[149]["InstanceId"], "ins-0149");

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "tccli");
    assert_eq!(
        calls[0].1,
        ["cvm", "DescribeInstances", "--Offset", "0", "--Limit", "100"]
    );
    assert_eq!(
        calls[1].1,
        ["cvm", "DescribeInstances", "--Offset", "100", "--Limit", "100"]
    );
}

#[tokio::test]
async fn test_single_page_stops_after_first_call() {
    let runner = MockRunner::new(vec![page(3, 0..3)]);
    let client = QcloudClient::new(runner.clone(), config("").fetch.clone());

    let instances = collect(client.describe("cvm")).await.unwrap();

    assert_eq!(instances.len(), 3);
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_listing() {
    let runner = MockRunner::new(vec![page(0, 0..0)]);
    let client = QcloudClient::new(runner.clone(), config("").fetch.clone());

    let instances = collect(client.describe("cvm")).await.unwrap();

    assert!(instances.is_empty());
    assert_eq!(runner.calls().len(), 1);
}

#[tokio::test]
async fn test_legacy_pagination_refetches_first_page() {
    // Without a cursor the provider answers with the first page every time.
    let runner = MockRunner::new(vec![page(150, 0..100), page(150, 0..100)]);
    let config = config("[fetch]\npagination = \"legacy\"\nregion = \"ap-shanghai\"\n");
    assert_eq!(config.fetch.pagination, Pagination::Legacy);
    let client = QcloudClient::new(runner.clone(), config.fetch.clone());

    let instances = collect(client.describe("cvm")).await.unwrap();

    assert_eq!(instances.len(), 200);
    assert_eq!(instances[100]["InstanceId"], "ins-0000");
    for (_, args) in runner.calls() {
        assert_eq!(args, ["cvm", "DescribeInstances", "--region", "ap-shanghai"]);
    }
}

#[tokio::test]
async fn test_lazy_sequence_fetches_on_demand() {
    let runner = MockRunner::new(vec![page(150, 0..100), page(150, 100..150)]);
    let client = QcloudClient::new(runner.clone(), config("").fetch.clone());

    let mut instances = client.describe("cvm");
    assert!(runner.calls().is_empty());

    for _ in 0..100 {
        instances.next().await.unwrap().unwrap();
    }
    assert_eq!(runner.calls().len(), 1);

    instances.next().await.unwrap().unwrap();
    assert_eq!(runner.calls().len(), 2);
    assert_eq!(instances.pages_fetched(), 2);
}

#[tokio::test]
async fn test_command_failure_is_fetch_error() {
    let runner = MockRunner::new(vec![page(150, 0..100), failed(255, "AuthFailure")]);
    let client = QcloudClient::new(runner, config("").fetch.clone());

    let err = collect(client.describe("cvm")).await.unwrap_err();

    match err {
        InventoryError::Fetch { resource, reason } => {
            assert_eq!(resource, "cvm");
            assert!(reason.contains("AuthFailure"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_response_is_fetch_error() {
    for stdout in ["not json", r#"{"InstanceSet": []}"#, r#"{"TotalCount": 1, "InstanceSet": [1]}"#] {
        let runner = MockRunner::new(vec![ok(stdout.to_string())]);
        let client = QcloudClient::new(runner, config("").fetch.clone());

        let err = collect(client.describe("cvm")).await.unwrap_err();
        assert!(matches!(err, InventoryError::Fetch { .. }), "{stdout}");
    }
}

#[tokio::test]
async fn test_build_index() {
    let runner = MockRunner::new(vec![page(2, 0..2)]);
    let index = builder(runner, config("")).build().await.unwrap();

    assert_eq!(index.hosts("cvm"), ["web_0", "web_1"]);
    assert_eq!(index.host_count(), 2);

    let web0 = index.host_vars("web_0").unwrap();
    assert_eq!(web0["ansible_ssh_user"], "root");
    assert_eq!(web0["ansible_ssh_host"], "1.1.0.0");
    assert_eq!(web0["ansible_ssh_port"], "22");
    assert_eq!(web0["qcloud"]["PublicIp"], "1.1.0.0");
    assert_eq!(web0["qcloud"]["Vip"], "10.0.0.0");
    assert_eq!(
        web0["qcloud"]["PublicIpAddress"],
        json!({"IpAddress": ["1.1.0.0"]})
    );

    let web1 = index.host_vars("web_1").unwrap();
    assert_eq!(web1["ansible_ssh_user"], "admin");
    assert_eq!(web1["ansible_ssh_host"], "10.0.0.1");
    assert_eq!(web1["ansible_ssh_port"], "22");
}

#[tokio::test]
async fn test_build_output_shape() {
    let runner = MockRunner::new(vec![page(1, 0..1)]);
    let index = builder(runner, config("")).build().await.unwrap();

    let value: Value = serde_json::from_str(&to_sorted_json(&index).unwrap()).unwrap();
    assert_eq!(value["cvm"], json!(["web_0"]));
    assert_eq!(value["_meta"]["hostvars"]["web_0"]["ansible_ssh_host"], "1.1.0.0");
    assert_eq!(
        value["_meta"]["hostvars"]["web_0"]["qcloud"]["InstanceId"],
        "ins-0000"
    );
}

#[tokio::test]
async fn test_hostname_field_override() {
    let runner = MockRunner::new(vec![page(1, 0..1)]);
    let toml = r#"
[cache]
path = "unused.json"

[cvm]
hostname_field = "InstanceId"
user = "root"
host = "{PublicIp}"
port = 22
"#;
    let config = Arc::new(Config::from_toml_str(toml).unwrap());
    let index = builder(runner, config).build().await.unwrap();

    assert_eq!(index.hosts("cvm"), ["ins-0000"]);
}

#[tokio::test]
async fn test_missing_template_field_fails_build() {
    let mut record = instance(0);
    record.as_object_mut().unwrap().remove("PublicIpAddress");
    let runner = MockRunner::new(vec![ok(
        json!({"TotalCount": 1, "InstanceSet": [record]}).to_string(),
    )]);

    let err = builder(runner, config("")).build().await.unwrap_err();
    assert!(matches!(err, InventoryError::MissingField { ref field, .. } if field == "PublicIp"));
}

#[tokio::test]
async fn test_malformed_template_fails_before_fetch() {
    let runner = MockRunner::new(vec![page(1, 0..1)]);
    let config = config("[cvm.\"web_9\"]\nhost = \"{Vip\"\n");

    let err = builder(runner.clone(), config).build().await.unwrap_err();

    assert!(matches!(err, InventoryError::Template { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_load_or_build_uses_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir, false);
    let runner = MockRunner::new(vec![page(2, 0..2), page(1, 0..1)]);
    let builder = builder(runner.clone(), config(""));

    let built = builder.load_or_build(&cache, false).await.unwrap();
    assert_eq!(runner.calls().len(), 1);
    assert!(cache.path().is_file());

    let loaded = builder.load_or_build(&cache, false).await.unwrap();
    assert_eq!(runner.calls().len(), 1);
    assert_eq!(loaded, built);

    let refreshed = builder.load_or_build(&cache, true).await.unwrap();
    assert_eq!(runner.calls().len(), 2);
    assert_eq!(refreshed.host_count(), 1);
    assert_eq!(cache.load().unwrap(), refreshed);
}

#[tokio::test]
async fn test_disabled_cache_always_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir, true);
    let runner = MockRunner::new(vec![page(1, 0..1), page(1, 0..1)]);
    let builder = builder(runner.clone(), config(""));

    builder.load_or_build(&cache, false).await.unwrap();
    builder.load_or_build(&cache, false).await.unwrap();

    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_failed_build_leaves_cache_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir, false);
    let runner = MockRunner::new(vec![page(150, 0..100), failed(1, "throttled")]);
    let builder = builder(runner, config(""));

    let err = builder.load_or_build(&cache, false).await.unwrap_err();

    assert!(matches!(err, InventoryError::Fetch { .. }));
    assert!(!cache.path().exists());
}

#[tokio::test]
async fn test_negative_max_age_always_rebuilds() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_with_age(&dir, -1, false);
    let runner = MockRunner::new(vec![page(1, 0..1), page(1, 0..1)]);
    let builder = builder(runner.clone(), config(""));

    builder.load_or_build(&cache, false).await.unwrap();
    assert!(cache.path().is_file());
    builder.load_or_build(&cache, false).await.unwrap();

    assert_eq!(runner.calls().len(), 2);
}

#[tokio::test]
async fn test_fresh_cache_is_served_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir, false);
    let artifact = json!({
        "_meta": {"hostvars": {"web_0": {"ansible_ssh_host": "1.2.3.4", "extra": 1}}},
        "all": {"children": ["cvm"]},
        "cvm": ["web_0"]
    });
    std::fs::write(cache.path(), artifact.to_string()).unwrap();
    let runner = MockRunner::new(Vec::new());

    let index = builder(runner.clone(), config(""))
        .load_or_build(&cache, false)
        .await
        .unwrap();

    assert!(runner.calls().is_empty());
    assert_eq!(serde_json::to_value(&index).unwrap(), artifact);
    assert_eq!(index.host_vars("web_0").unwrap()["extra"], 1);
}
