/*!
Test support helpers shared across integration tests.

- which(bin): cross-platform which/where lookup
- docker_available() / buildah_available(): tool is on PATH and answers
- write_fake_tool(dir, name, body): executable shell script standing in for an engine
- fake_docker(dir) / fake_buildah(dir): scripted engines with deterministic output

These helpers do not print skip messages themselves so tests can keep their own
"skipping: ..." outputs.
*/

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Cross-platform which() helper.
/// On Windows uses `where`, on other platforms uses `which`.
#[allow(dead_code)]
pub fn which(bin: &str) -> Option<PathBuf> {
    #[cfg(windows)]
    let cmd = "where";
    #[cfg(not(windows))]
    let cmd = "which";

    Command::new(cmd)
        .arg(bin)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                let s = String::from_utf8_lossy(&o.stdout);
                s.lines()
                    .map(|l| l.trim())
                    .find(|l| !l.is_empty())
                    .map(PathBuf::from)
            } else {
                None
            }
        })
}

fn tool_answers(bin: &str, check_args: &[&str]) -> bool {
    if which(bin).is_none() {
        return false;
    }
    Command::new(bin)
        .args(check_args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Docker CLI present and the daemon reachable.
#[allow(dead_code)]
pub fn docker_available() -> bool {
    tool_answers("docker", &["info"])
}

#[allow(dead_code)]
pub fn buildah_available() -> bool {
    tool_answers("buildah", &["version"])
}

/// Write an executable `/bin/sh` script `<dir>/<name>` with the given body.
#[cfg(unix)]
#[allow(dead_code)]
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write fake tool");
    let mut perms = std::fs::metadata(&path).expect("stat fake tool").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod fake tool");
    path
}

/// Docker stand-in: `image inspect` knows no images except `dev.local/*` and stacks under
/// `docker.io/appsody/*`; `cp` drops a Dockerfile into the destination; `push` echoes the repository.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_docker(dir: &Path) -> PathBuf {
    write_fake_tool(
        dir,
        "docker",
        r#"case "$1" in
  image)
    case "$3" in
      docker.io/appsody/*|dev.local/*)
        echo '[{"Id":"sha256:0f","Config":{"Env":["PATH=/usr/bin","APPSODY_PROJECT_DIR=/project"]}}]'
        ;;
      *)
        echo "Error: No such image: $3" >&2
        exit 1
        ;;
    esac
    ;;
  create) echo "0123456789ab" ;;
  cp)
    mkdir -p "$3"
    echo "FROM scratch" > "$3/Dockerfile"
    ;;
  rm) echo "$3" ;;
  build)
    echo "Step 1/1 : FROM scratch"
    echo "Successfully built 0123456789ab"
    ;;
  push)
    echo "The push refers to repository [$2]"
    echo "latest: digest: sha256:0f size: 528"
    ;;
  *) echo "unsupported: $*" >&2; exit 125 ;;
esac
"#,
    )
}

/// Buildah stand-in: `mount` exposes a directory next to the script holding `project/Dockerfile`;
/// `bud` prints the manifest marker a real build ends with.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_buildah(dir: &Path) -> PathBuf {
    write_fake_tool(
        dir,
        "buildah",
        r#"root="$(dirname "$0")"
case "$1" in
  inspect) echo '{"OCIv1":{"config":{"Env":["APPSODY_PROJECT_DIR=/project"]}}}' ;;
  pull) echo "Getting image source signatures" ;;
  from) echo "$3" ;;
  mount)
    mkdir -p "$root/mnt/project"
    echo "FROM scratch" > "$root/mnt/project/Dockerfile"
    echo "$root/mnt"
    ;;
  umount|rm) echo "$2" ;;
  bud)
    echo "STEP 1: FROM scratch"
    echo "Getting image source signatures"
    echo "Writing manifest to image destination" >&2
    echo "Storing signatures"
    ;;
  *) echo "unsupported: $*" >&2; exit 125 ;;
esac
"#,
    )
}
