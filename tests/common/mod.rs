use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use esanalyzer::supervisor::{LaunchSpec, Launcher};
use esanalyzer::{CacheLayout, HealthPolicy, InstanceKey, ResolverConfig, ServerConfig};
use wiremock::MockServer;

pub const VERSION: &str = "5.6.0.0";
/// Above any kernel pid_max, so signalling it always fails harmlessly.
pub const BOGUS_PID: u32 = 1_999_999_999;

/// Launcher that records what it was asked to start and never runs java.
#[derive(Default)]
pub struct RecordingLauncher {
    launches: AtomicUsize,
    specs: Mutex<Vec<LaunchSpec>>,
}

impl RecordingLauncher {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.specs.lock().unwrap().last().cloned()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, spec: &LaunchSpec) -> esanalyzer::Result<u32> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.specs.lock().unwrap().push(spec.clone());
        Ok(BOGUS_PID)
    }
}

/// Config pointing at `server`, with a cache that already holds the resolver
/// jar and the runner distribution so provisioning never shells out.
pub fn seeded_config(home: &Path, server: &MockServer) -> ServerConfig {
    let layout = CacheLayout::new(home, ResolverConfig::default());
    std::fs::create_dir_all(layout.lib_dir(VERSION)).unwrap();
    std::fs::write(layout.resolver_jar(), b"ivy").unwrap();
    std::fs::write(layout.runner_marker(VERSION), b"runner").unwrap();
    std::fs::write(layout.lib_dir(VERSION).join("elasticsearch-5.6.0.jar"), b"es").unwrap();

    let addr = server.address();
    ServerConfig {
        instance: InstanceKey {
            host: addr.ip().to_string(),
            http_port: addr.port(),
            transport_port: 9399,
            version: VERSION.into(),
            cluster_name: "esanpy".into(),
        },
        plugins: Vec::new(),
        home: home.to_path_buf(),
        health: HealthPolicy {
            attempts: 3,
            interval: Duration::from_millis(10),
        },
        ..Default::default()
    }
}

/// Zip with a single top-level plugin directory.
#[allow(dead_code)]
pub fn plugin_zip(top: &str) -> Vec<u8> {
    use std::io::Write;

    let mut buf = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        zip.add_directory(format!("{top}/"), options).unwrap();
        zip.start_file(format!("{top}/plugin-descriptor.properties"), options)
            .unwrap();
        zip.write_all(b"name=test\n").unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}
