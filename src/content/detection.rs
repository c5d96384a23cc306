//! Git-diff based detection of new and changed posts.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::{load_post, BlogPost};
use crate::config::ActionConfig;
use crate::error::ActionError;

const POST_EXTENSIONS: [&str; 3] = ["md", "markdown", "ipynb"];

/// Runs a git command in `repo_root` and returns its stdout.
async fn run_git(repo_root: &Path, args: &[&str]) -> Result<String, ActionError> {
    debug!("Running git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .await
        .map_err(|e| ActionError::Git(format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ActionError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Keeps the diff entries that are posts: a Markdown or notebook file under
/// the posts or notebooks directory.
///
/// # Parameters
///
/// - `diff_output`: Output of `git diff --name-only`, one path per line
/// - `config`: Supplies the posts and notebooks directories
pub fn filter_post_paths(diff_output: &str, config: &ActionConfig) -> Vec<PathBuf> {
    let roots = [
        Path::new(&config.posts_directory),
        Path::new(&config.notebooks_directory),
    ];

    let mut paths: Vec<PathBuf> = Vec::new();
    for line in diff_output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let path = PathBuf::from(line);
        if !is_post_file(&path) || !roots.iter().any(|root| path.starts_with(root)) {
            continue;
        }
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths
}

fn is_post_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| POST_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Chooses the diff range for the current checkout.
///
/// On the base branch itself (a push to `main`) the last commit is compared with
/// its parent; on any other branch the merge base with `origin/<base>` is used.
fn diff_range(config: &ActionConfig, current_branch: Option<&str>) -> Vec<String> {
    match current_branch {
        Some(branch) if branch != config.base_branch => {
            vec![format!("origin/{}...HEAD", config.base_branch)]
        }
        _ => vec!["HEAD~1".to_string(), "HEAD".to_string()],
    }
}

/// Lists posts added, copied, modified or renamed by the triggering change.
///
/// # Returns
///
/// Paths relative to `repo_root`, limited to files that still exist.
///
/// # Errors
///
/// Fails with `ActionError::Git` only when both the preferred range and the
/// `HEAD~1 HEAD` fallback cannot be diffed (for example on the very first commit).
pub async fn detect_changed_posts(
    repo_root: &Path,
    config: &ActionConfig,
) -> Result<Vec<PathBuf>, ActionError> {
    if config.process_all {
        info!("process_all is set - treating every post as changed");
        let posts = get_all_posts(repo_root, config).await;
        return Ok(posts.into_iter().map(|p| p.file_path).collect());
    }

    let current_branch = std::env::var("GITHUB_REF_NAME").ok();
    let range = diff_range(config, current_branch.as_deref());

    let mut args = vec!["diff", "--name-only", "--diff-filter=ACMR"];
    args.extend(range.iter().map(String::as_str));

    let output = match run_git(repo_root, &args).await {
        Ok(output) => output,
        Err(e) => {
            warn!("Diff of {} failed ({}), falling back to HEAD~1", range.join(" "), e);
            run_git(
                repo_root,
                &["diff", "--name-only", "--diff-filter=ACMR", "HEAD~1", "HEAD"],
            )
            .await?
        }
    };

    let changed: Vec<PathBuf> = filter_post_paths(&output, config)
        .into_iter()
        .filter(|p| repo_root.join(p).is_file())
        .collect();

    info!("Detected {} changed post(s)", changed.len());
    for path in &changed {
        debug!("Changed post: {}", path.display());
    }
    Ok(changed)
}

/// Loads every published post, used as the corpus for style analysis.
///
/// Files that fail to parse are logged and skipped.
pub async fn get_all_posts(repo_root: &Path, config: &ActionConfig) -> Vec<BlogPost> {
    let mut files = Vec::new();
    for dir in [&config.posts_directory, &config.notebooks_directory] {
        collect_post_files(repo_root, Path::new(dir), &mut files);
    }
    files.sort();

    let mut posts = Vec::new();
    for relative in files {
        match load_post(repo_root, &relative, config).await {
            Ok(post) if post.publish => posts.push(post),
            Ok(post) => debug!("Skipping unpublished post {}", post.file_path.display()),
            Err(e) => warn!("Skipping {}: {}", relative.display(), e),
        }
    }
    info!("Loaded {} published post(s) for analysis", posts.len());
    posts
}

fn collect_post_files(repo_root: &Path, relative_dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(repo_root.join(relative_dir)) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {}: {}", relative_dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let relative = relative_dir.join(entry.file_name());
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            // notebook checkpoints are copies of real notebooks
            if entry.file_name() != ".ipynb_checkpoints" {
                collect_post_files(repo_root, &relative, files);
            }
        } else if is_post_file(&relative) {
            files.push(relative);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_range_on_base_branch_uses_parent_commit() {
        let config = ActionConfig::default();
        assert_eq!(diff_range(&config, Some("main")), vec!["HEAD~1", "HEAD"]);
        assert_eq!(diff_range(&config, None), vec!["HEAD~1", "HEAD"]);
    }

    #[test]
    fn test_diff_range_on_feature_branch_uses_merge_base() {
        let config = ActionConfig::default();
        assert_eq!(
            diff_range(&config, Some("feature/new-post")),
            vec!["origin/main...HEAD"]
        );
    }
}
