use crate::runner::scheduler::RunOutcome;
use anyhow::Result;
use std::path::Path;

/// Write the outcome of an invocation as JSON, to `output` or stdout
pub fn write_outcome(outcome: &RunOutcome, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        log::info!("Outcome saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Read back an outcome written by [`write_outcome`]
pub fn read_outcome(path: &Path) -> Result<RunOutcome> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{RunState, RunSummary};

    #[test]
    fn test_outcome_file_carries_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs/outcome.json");
        let outcome = RunOutcome {
            report_id: "r-5".into(),
            next_suites: vec!["checkout".into()],
            state: RunState::Suspended,
            summary: RunSummary::from_suites(&[], 10),
            suites: vec![],
            steps: vec![],
        };

        write_outcome(&outcome, Some(&path)).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["reportId"], "r-5");
        assert_eq!(raw["nextSuites"][0], "checkout");
        assert_eq!(raw["state"], "suspended");

        let back = read_outcome(&path).unwrap();
        assert_eq!(back.next_suites, vec!["checkout"]);
    }
}
