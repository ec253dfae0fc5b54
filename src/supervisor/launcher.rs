use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use crate::error::{EsanalyzerError, Result};

const RUNNER_MAIN_CLASS: &str = "org.codelibs.elasticsearch.runner.ElasticsearchClusterRunner";

/// Everything needed to start one engine node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub java_bin: PathBuf,
    pub java_heap: String,
    pub classpath: String,
    /// Per-port data directory (`es_home_<port>`).
    pub base_path: PathBuf,
    pub cluster_name: String,
    pub http_port: u16,
    pub transport_port: u16,
    /// Working directory, the version home.
    pub work_dir: PathBuf,
    pub inherit_output: bool,
}

impl LaunchSpec {
    /// Runner arguments. The runner numbers nodes from 1 and adds the node
    /// number to its base ports, so the base is the nominal port minus one.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            format!("-Xmx{}", self.java_heap).into(),
            "-cp".into(),
            self.classpath.clone().into(),
            RUNNER_MAIN_CLASS.into(),
            "-basePath".into(),
            self.base_path.clone().into_os_string(),
            "-numOfNode".into(),
            "1".into(),
            "-clusterName".into(),
            self.cluster_name.clone().into(),
            "-baseHttpPort".into(),
            self.http_port.saturating_sub(1).to_string().into(),
            "-baseTransportPort".into(),
            self.transport_port.saturating_sub(1).to_string().into(),
        ]
    }
}

/// Starts an engine process and reports its pid. The supervisor does not keep
/// a handle to the child; everything afterwards goes through the PID file.
///
/// Called from within a tokio runtime.
pub trait Launcher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<u32>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JavaLauncher;

impl Launcher for JavaLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<u32> {
        let args = spec.args();
        tracing::debug!(
            "{} {}",
            spec.java_bin.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut cmd = tokio::process::Command::new(&spec.java_bin);
        cmd.args(&args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(false);
        if !spec.inherit_output {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let child = cmd.spawn().map_err(|e| {
            EsanalyzerError::Startup(format!(
                "Failed to spawn {}: {e}",
                spec.java_bin.display()
            ))
        })?;
        // Dropping the tokio handle hands the child to the runtime's orphan
        // queue, which reaps it once it exits.
        child.id().ok_or_else(|| {
            EsanalyzerError::Startup(format!("{} exited during spawn", spec.java_bin.display()))
        })
    }
}

/// Send SIGKILL to `pid`. Pids that would address a process group or every
/// process (0, or anything not representable as a positive pid_t) are refused.
#[cfg(unix)]
pub fn kill(pid: u32) -> std::io::Result<()> {
    let raw = match libc::pid_t::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("refusing to signal pid {pid}"),
            ))
        }
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
pub fn kill(pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("cannot signal pid {pid} on this platform"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            java_bin: PathBuf::from("java"),
            java_heap: "256m".into(),
            classpath: "/c/lib/a.jar:/c/lib/b.jar".into(),
            base_path: PathBuf::from("/c/5.6.0.0/es_home_9299"),
            cluster_name: "esanpy".into(),
            http_port: 9299,
            transport_port: 9399,
            work_dir: PathBuf::from("/c/5.6.0.0"),
            inherit_output: false,
        }
    }

    #[test]
    fn test_args_offset_ports_by_one() {
        let args: Vec<String> = spec()
            .args()
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(
            args,
            vec![
                "-Xmx256m",
                "-cp",
                "/c/lib/a.jar:/c/lib/b.jar",
                "org.codelibs.elasticsearch.runner.ElasticsearchClusterRunner",
                "-basePath",
                "/c/5.6.0.0/es_home_9299",
                "-numOfNode",
                "1",
                "-clusterName",
                "esanpy",
                "-baseHttpPort",
                "9298",
                "-baseTransportPort",
                "9398",
            ]
        );
    }

    #[tokio::test]
    async fn test_launch_missing_binary_is_startup_error() {
        let mut s = spec();
        s.java_bin = PathBuf::from("/nonexistent/bin/java");
        s.work_dir = std::env::temp_dir();
        let result = JavaLauncher.launch(&s);
        assert!(matches!(result, Err(EsanalyzerError::Startup(_))));
    }

    /// Process state letter from `/proc/<pid>/stat`, `None` once the pid is gone.
    #[cfg(target_os = "linux")]
    fn proc_state(pid: u32) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        stat.rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_exited_engine_is_reaped() {
        let mut s = spec();
        s.java_bin = PathBuf::from("false");
        s.work_dir = std::env::temp_dir();
        let pid = JavaLauncher.launch(&s).unwrap();

        let mut state = proc_state(pid);
        for _ in 0..50 {
            if state.is_none() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            state = proc_state(pid);
        }
        assert_ne!(state, Some('Z'), "pid {pid} left as a zombie");
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_refuses_dangerous_pids() {
        assert_eq!(kill(0).unwrap_err().kind(), std::io::ErrorKind::InvalidInput);
        assert_eq!(
            kill(u32::MAX).unwrap_err().kind(),
            std::io::ErrorKind::InvalidInput
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_terminates_process() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        kill(child.id()).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }
}
