//! ArrangeKit CLI
//!
//! Usage:
//!   arrangekit apply --scene <FILE> --plan <FILE> [--output <FILE>] [--config <FILE>]
//!   arrangekit diff <BEFORE> <AFTER> [--all] [--threshold <N>]
//!   arrangekit position --reference x,y,w,h --size w,h --relationship <REL> [--alignment <ALIGN>] [--spacing <N>]
//!   arrangekit replay --scene <FILE> --intent <FILE> --evaluations <FILE> [--output <FILE>] [--config <FILE>]
//!
//! Scenes are JSON files as written by `MemoryScene::to_json`. Set `RUST_LOG`
//! to see what the pipeline does.

use std::fs;
use std::path::{Path, PathBuf};

use arrangekit_core::{
    Alignment, ArrangeConfig, ArrangeError, ArrangeSession, ConfigError, Evaluation, Intent, MemoryScene,
    MovementDetector, OperationExecutor, Plan, PlanError, Relationship, ScriptedOracle, Snapshot, position,
};
use clap::{Parser, Subcommand};
use kurbo::{Rect, Size};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "arrangekit")]
#[command(about = "Arrange objects on a design canvas from plans and layout intents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a plan of add/modify operations to a scene
    Apply {
        /// Scene JSON file
        #[arg(short, long)]
        scene: PathBuf,
        /// Plan JSON file (`{"operations": [...]}` or a bare array)
        #[arg(short, long)]
        plan: PathBuf,
        /// Where to write the updated scene (stdout summary only if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Config JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Report objects that moved between two scenes
    Diff {
        before: PathBuf,
        after: PathBuf,
        /// Report every moved object instead of the first
        #[arg(short, long)]
        all: bool,
        /// Noise threshold in canvas units
        #[arg(short, long, default_value_t = 1)]
        threshold: i64,
    },
    /// Compute where a component goes relative to a reference
    Position {
        /// Reference rectangle as x,y,width,height
        #[arg(short, long, value_parser = parse_rect)]
        reference: Rect,
        /// Component size as width,height
        #[arg(short, long, value_parser = parse_size)]
        size: Size,
        #[arg(long)]
        relationship: Relationship,
        #[arg(long, default_value = "left")]
        alignment: Alignment,
        #[arg(long, default_value_t = 0.0)]
        spacing: f64,
    },
    /// Replay recorded oracle evaluations against a scene
    Replay {
        #[arg(short, long)]
        scene: PathBuf,
        /// Intent JSON file
        #[arg(short, long)]
        intent: PathBuf,
        /// JSON array of evaluations, returned in order
        #[arg(short, long)]
        evaluations: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Arrange(#[from] ArrangeError),
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

fn parse_numbers<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("'{part}': {e}")))
        .collect::<Result<_, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {N} comma-separated numbers, got {}", v.len()))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let [x, y, w, h] = parse_numbers::<4>(s)?;
    Ok(Rect::from_origin_size((x, y), (w, h)))
}

fn parse_size(s: &str) -> Result<Size, String> {
    let [w, h] = parse_numbers::<2>(s)?;
    Ok(Size::new(w, h))
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    serde_json::from_str(&read(path)?).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn load_scene(path: &Path) -> Result<MemoryScene, CliError> {
    MemoryScene::from_json(&read(path)?).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path: Option<&Path>) -> Result<ArrangeConfig, CliError> {
    Ok(match path {
        Some(path) => ArrangeConfig::from_file(path)?,
        None => ArrangeConfig::default(),
    })
}

fn save_scene(scene: &MemoryScene, path: &Path) -> Result<(), CliError> {
    fs::write(path, scene.to_json()?).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Wrote scene to {}", path.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Apply {
            scene,
            plan,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let mut memory = load_scene(&scene)?;
            let plan = Plan::from_json(&read(&plan)?).map_err(|source| CliError::Json {
                path: plan.clone(),
                source,
            })?;

            let result = OperationExecutor::new(config.font_fallback()).apply_plan(&mut memory, &plan)?;
            print_json(&result)?;
            if let Some(output) = output {
                save_scene(&memory, &output)?;
            }
        }
        Command::Diff {
            before,
            after,
            all,
            threshold,
        } => {
            let before = Snapshot::capture(&load_scene(&before)?).map_err(ArrangeError::from)?;
            let after = Snapshot::capture(&load_scene(&after)?).map_err(ArrangeError::from)?;
            let detector = MovementDetector::new(threshold);
            if all {
                print_json(&detector.detect_all(&before, &after))?;
            } else {
                print_json(&detector.detect(&before, &after))?;
            }
        }
        Command::Position {
            reference,
            size,
            relationship,
            alignment,
            spacing,
        } => {
            let at = position(size, reference, relationship, alignment, spacing);
            print_json(&at)?;
        }
        Command::Replay {
            scene,
            intent,
            evaluations,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let memory = load_scene(&scene)?;
            let intent: Intent = read_json(&intent)?;
            let evaluations: Vec<Evaluation> = read_json(&evaluations)?;

            let oracle = ScriptedOracle::from_evaluations(evaluations);
            let mut session = ArrangeSession::with_config(memory, oracle, config);
            let mut events = session.subscribe();
            let outcome = session.run_convergence(intent).await;
            while let Ok(event) = events.try_recv() {
                eprintln!("{}", event);
            }

            let outcome = outcome?;
            print_json(&outcome)?;
            if let Some(output) = output {
                save_scene(session.scene(), &output)?;
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrangekit_core::{NodeKind, SceneGraph};
    use kurbo::Point;

    #[test]
    fn test_parse_rect_and_size() {
        assert_eq!(
            parse_rect("100, 100,200,50").unwrap(),
            Rect::from_origin_size((100.0, 100.0), (200.0, 50.0))
        );
        assert_eq!(parse_size("80,30").unwrap(), Size::new(80.0, 30.0));
        assert!(parse_rect("1,2,3").unwrap_err().contains("expected 4"));
        assert!(parse_size("80,wide").is_err());
    }

    #[test]
    fn test_position_arguments() {
        let cli = Cli::try_parse_from([
            "arrangekit",
            "position",
            "--reference",
            "100,100,200,50",
            "--size",
            "80,30",
            "--relationship",
            "below",
            "--alignment",
            "center",
            "--spacing",
            "24",
        ])
        .unwrap();
        let Command::Position {
            reference,
            size,
            relationship,
            alignment,
            spacing,
        } = cli.command
        else {
            panic!("expected the position command");
        };
        assert_eq!(position(size, reference, relationship, alignment, spacing), Point::new(160.0, 174.0));
    }

    #[test]
    fn test_unknown_relationship_is_rejected() {
        let parsed = Cli::try_parse_from([
            "arrangekit",
            "position",
            "--reference",
            "0,0,10,10",
            "--size",
            "5,5",
            "--relationship",
            "diagonal",
        ]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_apply_writes_the_updated_scene() {
        let dir = tempfile::tempdir().unwrap();
        let scene_path = dir.path().join("scene.json");
        let plan_path = dir.path().join("plan.json");
        let output = dir.path().join("out.json");

        let mut scene = MemoryScene::new();
        let card = scene.insert(NodeKind::Frame, "Card", Rect::from_origin_size((0.0, 0.0), (100.0, 50.0)));
        fs::write(&scene_path, scene.to_json().unwrap()).unwrap();
        fs::write(
            &plan_path,
            r#"[{"action": "modify", "target": "Card", "geometry": {"x": 40, "y": 60}}]"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "arrangekit",
            "apply",
            "--scene",
            scene_path.to_str().unwrap(),
            "--plan",
            plan_path.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        run(cli).await.unwrap();

        let updated = MemoryScene::from_json(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(updated.node(&card).unwrap().position(), Point::new(40.0, 60.0));
    }

    #[tokio::test]
    async fn test_missing_scene_file_is_a_read_error() {
        let cli = Cli::try_parse_from([
            "arrangekit",
            "diff",
            "/nonexistent/before.json",
            "/nonexistent/after.json",
        ])
        .unwrap();
        assert!(matches!(run(cli).await, Err(CliError::Read { .. })));
    }
}
