//! Tests for rsync-based uploads.

use camino::Utf8PathBuf;
use tempfile::TempDir;

use super::fixtures::{args_of, base_config, channel_with};
use crate::channel::{ChannelError, RemoteChannel};

const REMOTE_SHELL: &str = concat!(
    "ssh -p 2222 -o BatchMode=yes -o StrictHostKeyChecking=no ",
    "-o UserKnownHostsFile=/dev/null -o ConnectTimeout=30"
);

fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path")
}

#[tokio::test]
async fn upload_dir_syncs_directory_contents() {
    let base_config = base_config();
    let source = TempDir::new().expect("temp dir");
    let local = utf8_dir(&source);
    let (channel, runner) = channel_with(base_config);
    runner.push_success();

    channel
        .upload_dir("/tmp/x/cookbooks-0", &local)
        .await
        .expect("upload succeeds");

    let invocations = runner.invocations();
    assert_eq!(invocations[0].program, "rsync");
    assert_eq!(
        args_of(&runner, 0),
        vec![
            String::from("-az"),
            String::from("--rsh"),
            String::from(REMOTE_SHELL),
            format!("{local}/"),
            String::from("ubuntu@203.0.113.10:/tmp/x/cookbooks-0"),
        ]
    );
}

#[tokio::test]
async fn upload_dir_rejects_missing_source() {
    let base_config = base_config();
    let source = TempDir::new().expect("temp dir");
    let missing = utf8_dir(&source).join("absent");
    let (channel, runner) = channel_with(base_config);

    let err = channel
        .upload_dir("/tmp/x/cookbooks-0", &missing)
        .await
        .expect_err("missing directory");
    assert_eq!(err, ChannelError::MissingSource { path: missing });
    assert!(runner.invocations().is_empty());
}

#[tokio::test]
async fn upload_stages_contents_in_a_local_file() {
    let base_config = base_config();
    let (channel, runner) = channel_with(base_config);
    runner.push_success();

    channel
        .upload("/tmp/x/solo.rb", b"cookbook_path []\n")
        .await
        .expect("upload succeeds");

    let args = args_of(&runner, 0);
    assert_eq!(args.len(), 5);
    assert_eq!(args[2], REMOTE_SHELL);
    assert_eq!(args[4], "ubuntu@203.0.113.10:/tmp/x/solo.rb");
    assert!(
        !std::path::Path::new(&args[3]).exists(),
        "staged file should be removed after upload: {}",
        args[3]
    );
}

#[tokio::test]
async fn rsync_failure_reports_status() {
    let base_config = base_config();
    let (channel, runner) = channel_with(base_config);
    runner.push_failure(12);

    let err = channel
        .upload("/tmp/x/attributes.json", b"{}")
        .await
        .expect_err("rsync fails");
    assert_eq!(
        err,
        ChannelError::CommandFailure {
            program: String::from("rsync"),
            status: Some(12),
            status_text: String::from("12"),
            stderr: String::from("simulated failure"),
        }
    );
}
