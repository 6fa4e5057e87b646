use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use appsody::cmdtest::{run_appsody, setup_sandbox, Sandbox};

#[test]
fn test_sandbox_removed_after_failing_test_thread() {
    let (tx, rx) = mpsc::channel::<PathBuf>();
    let handle = thread::spawn(move || {
        let sandbox = Sandbox::with_template("starter").unwrap();
        tx.send(sandbox.path().to_path_buf()).unwrap();
        assert!(sandbox.project_dir.join("app.js").is_file());
        panic!("simulated assertion failure");
    });
    assert!(handle.join().is_err());
    let root = rx.recv().unwrap();
    assert!(!root.exists(), "sandbox {} survived a panic", root.display());
}

#[test]
fn test_sandbox_removed_after_passing_test() {
    let sandbox = setup_sandbox(Some("starter")).unwrap();
    let root = sandbox.path().to_path_buf();
    let out = run_appsody(&sandbox, &["--dryrun", "extract"]).unwrap();
    assert!(out.contains("Dryrun complete"), "{out}");
    sandbox.cleanup().unwrap();
    assert!(!root.exists());
}

#[test]
fn test_concurrent_sandboxes_are_independent() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let sandbox = Sandbox::with_template("starter").unwrap();
                std::fs::write(sandbox.project_dir.join("marker"), b"x").unwrap();
                (sandbox.path().to_path_buf(), sandbox.config_file.clone())
            })
        })
        .collect();
    let mut roots = Vec::new();
    for h in handles {
        let (root, config) = h.join().unwrap();
        assert!(config.starts_with(&root));
        assert!(!root.exists());
        roots.push(root);
    }
    roots.sort();
    roots.dedup();
    assert_eq!(roots.len(), 4);
}
