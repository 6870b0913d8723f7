use crate::RESULTS_FILE_NAME;
use std::path::{Path, PathBuf};

/// Returns the nearest `results.json` at or above `log_path`.
///
/// The path itself is probed first, then each of its ancestors. A relative
/// `log_path` is probed relative to the process working directory, so callers
/// resolve it with [`resolve_log_path`] first.
pub fn find_results_file(log_path: &Path) -> Option<PathBuf> {
    log_path
        .ancestors()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(RESULTS_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Joins a relative `log_file` reference onto `log_root` when one is given.
/// Without a root a relative reference stays relative.
pub fn resolve_log_path(log_file: &str, log_root: Option<&Path>) -> PathBuf {
    let raw = PathBuf::from(log_file);
    match log_root {
        Some(root) if raw.is_relative() => root.join(raw),
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempTree;

    #[test]
    fn finds_nearest_results_file_first() {
        let tree = TempTree::new("locate_nearest");
        tree.write("run/results.json", "{}");
        tree.write("run/task_a/trial_1/results.json", "{}");
        tree.write("run/task_a/trial_1/sessions/agent.log", "log");

        let found = find_results_file(&tree.path("run/task_a/trial_1/sessions/agent.log"))
            .expect("results file");
        assert_eq!(found, tree.path("run/task_a/trial_1/results.json"));
    }

    #[test]
    fn walks_arbitrary_depth_to_ancestor() {
        let tree = TempTree::new("locate_deep");
        tree.write("run/results.json", "{}");
        tree.write("run/a/b/c/d/post-agent.txt", "log");

        let found =
            find_results_file(&tree.path("run/a/b/c/d/post-agent.txt")).expect("results file");
        assert_eq!(found, tree.path("run/results.json"));
    }

    #[test]
    fn probes_the_path_itself_when_it_is_a_directory() {
        let tree = TempTree::new("locate_self");
        tree.write("trial_9/results.json", "{}");

        let found = find_results_file(&tree.path("trial_9")).expect("results file");
        assert_eq!(found, tree.path("trial_9/results.json"));
    }

    #[test]
    fn ignores_directories_named_like_results() {
        let tree = TempTree::new("locate_dir_named");
        tree.mkdir("trial/logs/results.json");
        tree.write("trial/logs/agent.log", "log");

        assert_eq!(find_results_file(&tree.path("trial/logs/agent.log")), None);
    }

    #[test]
    fn relative_log_file_is_joined_onto_root() {
        let root = Path::new("/data/bench");
        assert_eq!(
            resolve_log_path("runs/t1/log.txt", Some(root)),
            PathBuf::from("/data/bench/runs/t1/log.txt")
        );
        assert_eq!(
            resolve_log_path("/abs/log.txt", Some(root)),
            PathBuf::from("/abs/log.txt")
        );
        assert_eq!(
            resolve_log_path("runs/t1/log.txt", None),
            PathBuf::from("runs/t1/log.txt")
        );
    }
}
