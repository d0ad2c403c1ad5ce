use anyhow::Result;

use crate::types::RunSummary;

/// Check run result: if strict and any task failed, return an error; otherwise log the failures.
/// Call after the driver returned (channel already released).
pub fn check_for_task_failures(strict: bool, verbose: bool, summary: &RunSummary) -> Result<()> {
    let failed = summary.failures.len();
    if failed == 0 {
        return Ok(());
    }
    if strict {
        let first = &summary.failures[0];
        return Err(anyhow::anyhow!(
            "{} tasks failed (strict mode); first: {}",
            failed,
            first
        ));
    }
    log::warn!(
        "Dropped {} tasks after lookup or dispatch errors",
        failed
    );
    if verbose {
        for f in &summary.failures {
            eprintln!("  failed: {}", f);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskFailure;

    fn summary_with(n: usize) -> RunSummary {
        RunSummary {
            failures: (0..n)
                .map(|i| TaskFailure {
                    stage: "enrichment",
                    task: format!("a.php:{i}"),
                    error: "lookup failed".to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_failures_ok_even_strict() {
        assert!(check_for_task_failures(true, false, &summary_with(0)).is_ok());
    }

    #[test]
    fn test_strict_fails_with_first_failure() {
        let err = check_for_task_failures(true, false, &summary_with(2)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("2 tasks failed"));
        assert!(msg.contains("a.php:0"));
    }

    #[test]
    fn test_lenient_only_warns() {
        assert!(check_for_task_failures(false, true, &summary_with(3)).is_ok());
    }
}
