use super::*;

#[test]
fn test_parse_host_and_port() {
    let node = parse_node("10.0.0.5:9000").unwrap();
    assert_eq!(node.host, "10.0.0.5");
    assert_eq!(node.port, 9000);
    assert_eq!(node.addr(), "10.0.0.5:9000");
}

#[test]
fn test_parse_host_without_port_uses_default() {
    let node = parse_node("riak1").unwrap();
    assert_eq!(node.host, "riak1");
    assert_eq!(node.port, DEFAULT_PORT);
}

#[test]
fn test_parse_trims_whitespace() {
    let node = parse_node("  riak2:8088 ").unwrap();
    assert_eq!(node.addr(), "riak2:8088");
}

#[test]
fn test_parse_rejects_bad_input() {
    assert!(parse_node("").is_err());
    assert!(parse_node(":8087").is_err());
    assert!(parse_node("riak:notaport").is_err());
    assert!(parse_node("riak:70000").is_err());
    assert!(parse_node("riak:0").is_err());
}

#[test]
fn test_cluster_config_defaults_to_local_node() {
    let config = cluster_config(&[], 3, 200).unwrap();
    assert_eq!(config.nodes.len(), 1);
    assert_eq!(config.nodes[0].addr(), "127.0.0.1:8087");
    assert_eq!(config.retry.attempts, 3);
    assert_eq!(config.retry.wait_ms, 200);
}

#[test]
fn test_cluster_config_rejects_duplicate_nodes() {
    let nodes = vec!["a:8087".to_string(), "a".to_string()];
    assert!(cluster_config(&nodes, 3, 200).is_err());
}

#[test]
fn test_cluster_config_keeps_node_order() {
    let nodes = vec!["a:1".to_string(), "b:2".to_string()];
    let config = cluster_config(&nodes, 1, 0).unwrap();
    let addrs: Vec<String> = config.nodes.iter().map(|n| n.addr()).collect();
    assert_eq!(addrs, ["a:1", "b:2"]);
}
