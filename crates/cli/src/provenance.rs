//! Provenance sidecars for solver and craft artifacts.
//!
//! Every file the CLI writes gets a `<stem>.provenance.json` next to it with
//! the code revision, the call site and a record of how the artifact came to
//! be: solver settings plus the score each column reached, or the load report
//! of a re-saved craft.

use anyhow::{Context, Result};
use noxel::api::{
    output_vector, score_with, DriveMatrix, ForceGenerator, LoadReport, SolverCfg,
};
use serde_json::{json, Value};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Command;

/// What produced an artifact.
pub enum Record {
    Solve {
        cfg: SolverCfg,
        /// Achieved score per column, same order as the matrix.
        scores: Vec<f64>,
        params: Value,
    },
    Craft {
        craft_name: String,
        components: usize,
        report: LoadReport,
    },
}

impl Record {
    /// Solver record; scores are recomputed from the unsaturated output.
    pub fn solve(
        cfg: SolverCfg,
        generators: &[ForceGenerator],
        matrix: &DriveMatrix,
        params: Value,
    ) -> Self {
        let scores = matrix
            .columns
            .iter()
            .map(|c| {
                let out = output_vector(generators, c, false);
                score_with(cfg.score, &c.optimised_direction, &out)
            })
            .collect();
        Record::Solve {
            cfg,
            scores,
            params,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Record::Solve {
                cfg,
                scores,
                params,
            } => json!({
                "kind": "solve",
                "method": format!("{:?}", cfg.method),
                "score_mode": format!("{:?}", cfg.score),
                "max_iterations": cfg.max_iterations,
                "scores": scores,
                "worst_score": scores.iter().copied().fold(f64::INFINITY, f64::min),
                "params": params,
            }),
            Record::Craft {
                craft_name,
                components,
                report,
            } => json!({
                "kind": "craft",
                "craft_name": craft_name,
                "components": components,
                "panels": report.panels,
                "rejected": report.rejected,
                "missing_nodes": report.missing_nodes,
                "lossless": report.is_lossless(),
            }),
        }
    }
}

/// Write the sidecar for `artifact`; returns its path.
#[track_caller]
pub fn write_sidecar(artifact: &Path, record: &Record, tag: Option<&str>) -> Result<PathBuf> {
    let path = provenance_path(artifact);
    let callsite = Location::caller();
    let doc = json!({
        "code_rev": current_git_rev(),
        "version": noxel::VERSION,
        "tag": tag,
        "callsite": format!("{}:{}", callsite.file(), callsite.line()),
        "record": record.to_json(),
        "outputs": [artifact.to_string_lossy()],
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn provenance_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map_or_else(|| "artifact".into(), |s| s.to_string_lossy().into_owned());
    artifact.with_file_name(format!("{stem}.provenance.json"))
}

/// `GIT_COMMIT` (build time, then run time), else `git rev-parse HEAD`.
pub fn current_git_rev() -> String {
    let from_env = option_env!("GIT_COMMIT")
        .map(str::to_string)
        .or_else(|| std::env::var("GIT_COMMIT").ok())
        .filter(|s| !s.is_empty());
    if let Some(rev) = from_env {
        return rev;
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use noxel::api::{make_test_cube, solve, SixDofVector};
    use tempfile::tempdir;

    #[test]
    fn sidecar_sits_next_to_the_artifact() {
        assert_eq!(
            provenance_path(Path::new("/tmp/runs/cube.json")),
            Path::new("/tmp/runs/cube.provenance.json")
        );
    }

    #[test]
    fn solve_record_carries_achieved_scores() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("x.json");
        let gens = make_test_cube(noxel::Vec3::new(80.0, 100.0, 120.0));
        let column = solve(&gens, SixDofVector::axis(0, 1.0), 50).unwrap();
        let matrix = DriveMatrix::new(vec![column]);
        let cfg = SolverCfg::with_iterations(50);
        let record = Record::solve(cfg, &gens, &matrix, json!({"extents": [80, 100, 120]}));

        let path = write_sidecar(&artifact, &record, Some("nightly")).unwrap();
        let parsed: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed["tag"], "nightly");
        assert_eq!(parsed["version"], noxel::VERSION);
        assert_eq!(parsed["outputs"][0], artifact.to_string_lossy().as_ref());
        let rec = &parsed["record"];
        assert_eq!(rec["kind"], "solve");
        assert_eq!(rec["max_iterations"], 50);
        assert_eq!(rec["method"], "Binomial");
        let score = rec["scores"][0].as_f64().unwrap();
        assert!(score > 0.99 && score <= 1.0, "score {score}");
        assert_eq!(rec["worst_score"].as_f64().unwrap(), score);
    }

    #[test]
    fn craft_record_reports_lossy_loads() {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("craft.json");
        let record = Record::Craft {
            craft_name: "skiff".into(),
            components: 2,
            report: LoadReport {
                panels: 3,
                rejected: 1,
                missing_nodes: 0,
            },
        };
        let path = write_sidecar(&artifact, &record, None).unwrap();
        let parsed: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed["tag"], Value::Null);
        assert_eq!(parsed["record"]["panels"], 3);
        assert_eq!(parsed["record"]["lossless"], false);
    }
}
