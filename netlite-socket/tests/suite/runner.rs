use std::future::Future;

pub const IP_PREFIX: &str = "127.0.0.";

pub struct Host {
    pub name: String,
    pub ip: String,
}

impl Host {
    pub fn new(name: String, ip: String) -> Self {
        Host { name, ip }
    }
}

pub struct HostPair {
    pub host0: Host,
    pub host1: Host,
}

impl HostPair {
    pub fn new(host0: Host, host1: Host) -> Self {
        HostPair { host0, host1 }
    }

    /// Two hosts on the loopback network; Linux routes all of 127.0.0.0/8 to `lo`.
    pub fn from_prefix(ip_prefix: &str) -> Self {
        let host0 = Host::new("host0".into(), format!("{}1", ip_prefix));
        let host1 = Host::new("host1".into(), format!("{}2", ip_prefix));
        HostPair::new(host0, host1)
    }
}

pub async fn run_test_with_pair<F, Fut>(test: F) -> anyhow::Result<()>
where
    F: FnOnce(HostPair) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let host_pair = HostPair::from_prefix(IP_PREFIX);
    log::debug!(
        "running with {} ({}) and {} ({})",
        host_pair.host0.name,
        host_pair.host0.ip,
        host_pair.host1.name,
        host_pair.host1.ip
    );
    test(host_pair).await
}
