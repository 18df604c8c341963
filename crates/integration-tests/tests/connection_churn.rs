//! ConnectionCache under process churn
//!
//! Processes start and die between collection cycles; the cache must notice
//! the drift, serve the previous snapshot once, then converge.

use hostmon_core::application::{ConnectionCache, ConnectionCacheConfig};
use hostmon_core::domain::ProcessInfo;
use hostmon_core::port::management::mocks::{MockConnector, MockEndpointResolver};
use hostmon_core::port::process_source::mocks::MockProcessSource;
use hostmon_core::port::{ManagementConnection, SubstringMatcher};
use hostmon_infra_system::{CmdlineEndpointResolver, CommandLineSource, TcpManagementConnector};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

const SERVICE: &str = "org.logstash.Logstash";

fn mock_cache(source: &MockProcessSource, connector: Arc<MockConnector>) -> ConnectionCache {
    ConnectionCache::new(
        Arc::new(source.clone()),
        Arc::new(SubstringMatcher),
        Arc::new(MockEndpointResolver::new()),
        connector,
        ConnectionCacheConfig::default(),
    )
}

#[tokio::test]
async fn test_full_churn_lifecycle() {
    let source = MockProcessSource::with_instances(SERVICE, 100, 3);
    let connector = Arc::new(MockConnector::new());
    let cache = mock_cache(&source, connector.clone());

    // Cycle 1: cold cache connects to all three
    assert_eq!(cache.acquire_connections("logstash").await.len(), 3);
    assert_eq!(cache.expected_count("logstash"), 3);

    // Cycle 2: one dies; 2 < 3 so the pool is left alone
    source.kill(101);
    assert_eq!(cache.acquire_connections("logstash").await.len(), 3);
    assert_eq!(cache.expected_count("logstash"), 3);
    assert_eq!(connector.connect_count(), 3);

    // Cycle 3: two start; 4 >= 3 rebuilds, this call still sees the old set
    source.spawn_instances(SERVICE, 200, 2);
    let stale = cache.acquire_connections("logstash").await;
    assert_eq!(stale.len(), 3);
    assert_eq!(cache.expected_count("logstash"), 4);

    // Cycle 4: converged on the live set
    let fresh = cache.acquire_connections("logstash").await;
    let mut pids: Vec<u32> = fresh.iter().map(|e| e.pid).collect();
    pids.sort_unstable();
    assert_eq!(pids, vec![100, 102, 200, 201]);
    assert_eq!(connector.connect_count(), 7);
}

#[tokio::test]
async fn test_removed_entry_is_not_served_again() {
    let source = MockProcessSource::with_instances(SERVICE, 10, 2);
    let cache = mock_cache(&source, Arc::new(MockConnector::new()));
    cache.acquire_connections("logstash").await;

    source.kill(11);
    assert!(cache.remove_connection("logstash", 11).await);
    assert_eq!(cache.expected_count("logstash"), 1);

    let entries = cache.acquire_connections("logstash").await;
    assert!(entries.iter().all(|e| e.pid != 11));
    assert!(!cache.remove_connection("logstash", 11).await);
}

#[tokio::test]
async fn test_services_do_not_share_entries() {
    let source = MockProcessSource::default();
    source.spawn_instances(SERVICE, 1, 2);
    source.spawn_instances("kafka.Kafka", 50, 1);
    let cache = mock_cache(&source, Arc::new(MockConnector::new()));

    let (logstash, kafka) = tokio::join!(
        cache.acquire_connections("logstash"),
        cache.acquire_connections("kafka")
    );

    assert_eq!(logstash.len(), 2);
    assert_eq!(kafka.len(), 1);
    assert_eq!(cache.pending_close_count(), 3);
    assert_eq!(cache.close_all(), 3);
}

struct FixedCmdlines(HashMap<u32, Vec<String>>);

impl CommandLineSource for FixedCmdlines {
    fn command_line(&self, pid: u32) -> Option<Vec<String>> {
        self.0.get(&pid).cloned()
    }
}

/// Real TCP sessions to listeners standing in for management ports
#[tokio::test]
async fn test_tcp_sessions_to_discovered_ports() {
    let mut cmdlines = HashMap::new();
    let mut processes = Vec::new();
    let mut listeners = Vec::new();
    for pid in [700u32, 701] {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        cmdlines.insert(
            pid,
            vec![
                "java".to_string(),
                format!("-Dcom.sun.management.jmxremote.port={}", port),
                SERVICE.to_string(),
            ],
        );
        processes.push(ProcessInfo::new(pid, format!("{} -f pipeline.conf", SERVICE)));
        listeners.push(listener);
    }
    // No management port: unresolvable, skipped
    processes.push(ProcessInfo::new(702, format!("{} --no-jmx", SERVICE)));

    let cache = ConnectionCache::new(
        Arc::new(MockProcessSource::new(processes)),
        Arc::new(SubstringMatcher),
        Arc::new(CmdlineEndpointResolver::new(Arc::new(FixedCmdlines(cmdlines)), None)),
        Arc::new(TcpManagementConnector::new()),
        ConnectionCacheConfig::default(),
    );

    let entries = cache.acquire_connections("logstash").await;

    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.handle.is_open()));
    assert_eq!(cache.expected_count("logstash"), 2);

    assert_eq!(cache.close_all(), 2);
    assert!(entries.iter().all(|e| !e.handle.is_open()));
}
