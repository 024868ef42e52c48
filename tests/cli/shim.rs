use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::{TempDir, tempdir};

/// Canned reply for requests whose `xh` argument line contains `pattern`.
pub struct Route {
    pub pattern: &'static str,
    pub status: u16,
    pub body: String,
}

pub fn route(pattern: &'static str, status: u16, body: &Value) -> Route {
    Route {
        pattern,
        status,
        body: body.to_string(),
    }
}

/// Fake `xh` executable that answers from a route table and logs its argv.
pub struct XhShim {
    _dir: TempDir,
    pub bin: PathBuf,
    log: PathBuf,
    sessions: PathBuf,
}

impl XhShim {
    pub fn new(routes: &[Route]) -> Self {
        let dir = tempdir().expect("tempdir");
        let bin = dir.path().join("fake-xh");
        let log = dir.path().join("calls.log");
        let sessions = dir.path().join("sessions.log");

        let mut script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{log}'\n\
             for arg in \"$@\"; do\n  case \"$arg\" in\n    --session-read-only=*)\n      \
             cat \"${{arg#--session-read-only=}}\" >> '{sessions}'\n      printf '\\n' >> '{sessions}'\n      ;;\n  \
             esac\ndone\ncase \"$*\" in\n",
            log = log.display(),
            sessions = sessions.display(),
        );
        for route in routes {
            let reason = if route.status < 300 { "OK" } else { "Error" };
            script.push_str(&format!(
                "  *'{}'*)\n    cat <<'EOF'\nHTTP/1.1 {} {reason}\nContent-Type: application/json\n\n{}\nEOF\n    ;;\n",
                route.pattern, route.status, route.body
            ));
        }
        script.push_str(
            "  *)\n    printf 'HTTP/1.1 404 Not Found\\nContent-Type: text/plain\\n\\nno route\\n'\n    ;;\nesac\n",
        );
        write_exec_script(&bin, &script);

        Self {
            _dir: dir,
            bin,
            log,
            sessions,
        }
    }

    pub fn bin_arg(&self) -> String {
        self.bin.display().to_string()
    }

    /// One entry per invocation, arguments joined by spaces.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    /// Session files handed to each invocation, parsed as JSON.
    pub fn sessions(&self) -> Vec<Value> {
        fs::read_to_string(&self.sessions)
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("session json"))
            .collect()
    }
}

pub fn write_exec_script(path: &Path, body: &str) {
    fs::write(path, body).expect("write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }
}

pub fn parse_last_stderr_json(stderr: &[u8]) -> Value {
    let text = String::from_utf8(stderr.to_vec()).expect("stderr utf8");
    let line = text
        .lines()
        .rev()
        .find(|candidate| !candidate.trim().is_empty())
        .expect("non-empty stderr line");
    serde_json::from_str(line).expect("stderr json")
}

pub fn parse_stdout_json(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("stdout json")
}

pub fn devops_cmd() -> assert_cmd::Command {
    let mut command = assert_cmd::cargo::cargo_bin_cmd!("devops-helper");
    command
        .env_remove("DEVOPS_HELPER_URL")
        .env_remove("DEVOPS_HELPER_TOKEN")
        .env_remove("DEVOPS_HELPER_XH_BIN")
        .env_remove("RUST_LOG");
    command
}
