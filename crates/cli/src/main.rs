use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use noxel::api::{
    make_test_cube, Craft, CraftSave, DriveMatrix, ForceGenerator, ScoreMode, SixDofVector,
    SolveMethod, SolverCfg, SolverPool,
};
use polars::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::fmt::SubscriberBuilder;

mod provenance;

use provenance::Record;

#[derive(Parser)]
#[command(name = "noxel")]
#[command(about = "Force allocation and craft save runner")]
struct Cmd {
    /// Optional run tag recorded in provenance sidecars
    #[arg(long)]
    tag: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Binomial,
    FixedEpsilon,
    Exhaustive,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Score {
    InverseDistance,
    Legacy,
}

#[derive(Subcommand)]
enum Action {
    /// Solve the 6 basis directions on the 12-edge test cube
    SolveCube {
        #[arg(long, num_args = 3, default_values_t = [80.0, 100.0, 120.0])]
        extents: Vec<f64>,
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,
        #[arg(long, value_enum, default_value_t = Method::Binomial)]
        method: Method,
        /// Grid cuts per axis for the exhaustive method
        #[arg(long, default_value_t = 3)]
        cuts: usize,
        #[arg(long, value_enum, default_value_t = Score::InverseDistance)]
        score: Score,
        /// Write the drive matrix here (plus a provenance sidecar) instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Solve one direction for generators read from CSV (fx..tz, min, max)
    Solve {
        #[arg(long)]
        generators: PathBuf,
        #[arg(long, num_args = 6, allow_negative_numbers = true)]
        direction: Vec<f64>,
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,
        #[arg(long, value_enum, default_value_t = Method::Binomial)]
        method: Method,
        #[arg(long, default_value_t = 3)]
        cuts: usize,
        #[arg(long, value_enum, default_value_t = Score::InverseDistance)]
        score: Score,
    },
    /// Scaffold and load a craft save, then print it re-saved
    Craft {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a small provenance JSON block
    Report,
}

fn main() -> Result<()> {
    SubscriberBuilder::default().with_target(false).init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::SolveCube {
            extents,
            iterations,
            method,
            cuts,
            score,
            out,
        } => {
            let cfg = solver_cfg(iterations, method, cuts, score);
            let gens = cube_generators(&extents)?;
            let matrix = solve_directions(&gens, &cube_directions(), cfg)?;
            let params = json!({ "command": "solve-cube", "extents": extents });
            let record = Record::solve(cfg, &gens, &matrix, params);
            emit(&matrix, out.as_deref(), &record, cmd.tag.as_deref())
        }
        Action::Solve {
            generators,
            direction,
            iterations,
            method,
            cuts,
            score,
        } => {
            let gens = read_generators(&generators)?;
            let dir = SixDofVector::from_array(six(&direction)?);
            let cfg = solver_cfg(iterations, method, cuts, score);
            let matrix = solve_directions(&gens, &[dir], cfg)?;
            println!("{}", serde_json::to_string_pretty(&matrix)?);
            Ok(())
        }
        Action::Craft { input, out } => craft(&input, out.as_deref(), cmd.tag.as_deref()),
        Action::Report => report(cmd.tag),
    }
}

fn solver_cfg(iterations: usize, method: Method, cuts: usize, score: Score) -> SolverCfg {
    SolverCfg {
        max_iterations: iterations,
        method: match method {
            Method::Binomial => SolveMethod::Binomial,
            Method::FixedEpsilon => SolveMethod::FixedEpsilon,
            Method::Exhaustive => SolveMethod::Exhaustive { cuts },
        },
        score: match score {
            Score::InverseDistance => ScoreMode::InverseDistance,
            Score::Legacy => ScoreMode::WantedOverUnwanted,
        },
    }
}

fn six(values: &[f64]) -> Result<[f64; 6]> {
    values
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected 6 direction components, got {}", values.len()))
}

fn cube_generators(extents: &[f64]) -> Result<Vec<ForceGenerator>> {
    let &[x, y, z] = extents else {
        bail!("expected 3 extents, got {}", extents.len());
    };
    Ok(make_test_cube(noxel::Vec3::new(x, y, z)))
}

/// The 6 basis directions; rotations are scaled by 100 to match the torque
/// magnitudes of the cube's moment arms.
fn cube_directions() -> Vec<SixDofVector> {
    (0..6)
        .map(|i| SixDofVector::axis(i, if i >= 3 { 100.0 } else { 1.0 }))
        .collect()
}

/// One worker per direction; waits for every budget to run out.
fn solve_directions(
    gens: &[ForceGenerator],
    dirs: &[SixDofVector],
    cfg: SolverCfg,
) -> Result<DriveMatrix> {
    let mut pool = SolverPool::new(cfg);
    let mut runners = Vec::with_capacity(dirs.len());
    for dir in dirs {
        runners.push(pool.start_solve(gens, *dir, cfg.max_iterations)?);
    }
    let mut columns = Vec::with_capacity(runners.len());
    for idx in runners {
        while !pool.is_done(idx)? {
            std::thread::sleep(Duration::from_millis(5));
        }
        tracing::info!(runner = idx, iteration = pool.iteration(idx)?, "runner_done");
        columns.push(pool.output(idx)?);
    }
    Ok(DriveMatrix::new(columns))
}

/// Generators from a CSV with columns `fx, fy, fz, tx, ty, tz, min, max`.
fn read_generators(path: &Path) -> Result<Vec<ForceGenerator>> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .finish()
        .with_context(|| format!("reading {}", path.display()))?
        .collect()?;
    let names = ["fx", "fy", "fz", "tx", "ty", "tz", "min", "max"];
    let cols = names
        .iter()
        .map(|name| column_f64(&df, name))
        .collect::<Result<Vec<_>>>()?;
    let gens: Vec<ForceGenerator> = (0..df.height())
        .map(|row| {
            let c = |k: usize| cols[k][row];
            ForceGenerator::new(
                SixDofVector::from_array([c(0), c(1), c(2), c(3), c(4), c(5)]),
                c(6),
                c(7),
            )
        })
        .collect();
    tracing::info!(rows = gens.len(), path = %path.display(), "generators_read");
    if gens.is_empty() {
        bail!("no generators in {}", path.display());
    }
    Ok(gens)
}

fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .with_context(|| format!("missing column {name}"))?
        .cast(&DataType::Float64)?;
    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.with_context(|| format!("empty {name} in row {row}")))
        .collect()
}

fn craft(input: &Path, out: Option<&Path>, tag: Option<&str>) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let save = CraftSave::from_json(&text)?;
    let (craft, report) = Craft::from_save(&save)?;
    for (id, topology) in craft.topologies() {
        tracing::info!(topology = %id, panels = topology.len(), "topology_loaded");
    }
    if !report.is_lossless() {
        tracing::warn!(
            rejected = report.rejected,
            missing_nodes = report.missing_nodes,
            "craft_load_lossy"
        );
    }
    let resaved = craft.save_craft()?.to_json()?;
    let Some(path) = out else {
        println!("{resaved}");
        return Ok(());
    };
    write_output(path, resaved.as_bytes())?;
    let record = Record::Craft {
        craft_name: craft.name().to_string(),
        components: craft.components().len(),
        report,
    };
    let sidecar = provenance::write_sidecar(path, &record, tag)?;
    tracing::info!(out = %path.display(), provenance = %sidecar.display(), "written");
    Ok(())
}

fn emit(
    matrix: &DriveMatrix,
    out: Option<&Path>,
    record: &Record,
    tag: Option<&str>,
) -> Result<()> {
    let text = serde_json::to_string_pretty(matrix)?;
    let Some(path) = out else {
        println!("{text}");
        return Ok(());
    };
    write_output(path, text.as_bytes())?;
    let sidecar = provenance::write_sidecar(path, record, tag)?;
    tracing::info!(out = %path.display(), provenance = %sidecar.display(), "written");
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

fn report(tag: Option<String>) -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "version": noxel::VERSION,
        "tag": tag,
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generators_come_from_csv_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gens.csv");
        std::fs::write(
            &path,
            "fx,fy,fz,tx,ty,tz,min,max\n1,0,0,0,0,1,-1,1\n0,1,0,-1,0,0,0,2.5\n",
        )
        .unwrap();
        let gens = read_generators(&path).unwrap();
        assert_eq!(gens.len(), 2);
        assert_eq!(gens[1].force_and_torque.to_array(), [0.0, 1.0, 0.0, -1.0, 0.0, 0.0]);
        assert_eq!(gens[1].range_max, 2.5);

        std::fs::write(&path, "fx,fy\n1,2\n").unwrap();
        assert!(read_generators(&path).is_err());
    }

    #[test]
    fn cube_matrix_has_a_column_per_direction() {
        let gens = cube_generators(&[80.0, 100.0, 120.0]).unwrap();
        let cfg = SolverCfg::with_iterations(20);
        let matrix = solve_directions(&gens, &cube_directions(), cfg).unwrap();
        assert_eq!(matrix.columns.len(), 6);
        assert!(matrix.columns.iter().all(|c| c.input_coefficients.len() == 12));
        assert!(cube_generators(&[1.0]).is_err());
    }

    #[test]
    fn emit_writes_matrix_and_sidecar() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("runs/cube.json");
        let gens = cube_generators(&[80.0, 100.0, 120.0]).unwrap();
        let cfg = SolverCfg::with_iterations(5);
        let matrix = solve_directions(&gens, &cube_directions(), cfg).unwrap();
        let record = Record::solve(cfg, &gens, &matrix, json!({"command": "test"}));
        emit(&matrix, Some(&out), &record, Some("ci")).unwrap();
        let parsed: DriveMatrix = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(parsed.columns.len(), 6);
        let sidecar = dir.path().join("runs/cube.provenance.json");
        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(sidecar).unwrap()).unwrap();
        assert_eq!(doc["tag"], "ci");
        assert_eq!(doc["record"]["scores"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn craft_command_resaves_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("craft.json");
        let out = dir.path().join("resaved.json");
        let save = CraftSave::new("empty", 10.0);
        std::fs::write(&input, save.to_json().unwrap()).unwrap();
        craft(&input, Some(&out), None).unwrap();
        let back = CraftSave::from_json(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back, save);
        let doc: serde_json::Value = serde_json::from_slice(
            &std::fs::read(dir.path().join("resaved.provenance.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(doc["record"]["craft_name"], "empty");
        assert_eq!(doc["record"]["lossless"], true);
    }
}
