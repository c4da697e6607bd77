use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use rustflow::compiler::{self, CompileError};
use rustflow::export::{export, ExportFormat};
use rustflow::layout::LayoutEngine;
use rustflow::reader;
use rustflow::validator;

const EXIT_OK: i32 = 0;
const EXIT_LOGIC: i32 = 1;
const EXIT_STRUCTURAL: i32 = 2;
const EXIT_INTERNAL: i32 = 3;

fn main() {
    let _log_guard = init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(EXIT_LOGIC);
    }

    let code = match args[1].as_str() {
        "validate" => run_validate(&args[0], &args[2..]),
        "compile" => run_compile(&args[0], &args[2..]),
        "preview" => run_preview(&args[0], &args[2..]),
        "export" => run_export(&args[0], &args[2..]),
        "-h" | "--help" | "help" => {
            print_usage(&args[0]);
            EXIT_OK
        }
        _ => {
            eprintln!("Unknown subcommand: {}", args[1]);
            eprintln!();
            print_usage(&args[0]);
            EXIT_LOGIC
        }
    };
    process::exit(code);
}

/// File sink in logs/, append-only; RUST_LOG controls the filter.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = Path::new("logs");
    if fs::create_dir_all(log_dir).is_err() {
        return None;
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "rustflow.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <subcommand> [options]", program);
    eprintln!();
    eprintln!("Subcommands:");
    eprintln!("  validate <file.sff>   Check structure and flow rules");
    eprintln!("  compile <file.sff>    Compile to <file>.cpff");
    eprintln!("  preview <file.sff>    Compile, lay out and print a summary");
    eprintln!("  export <file.sff>     Render to svg, mermaid, dot or json");
    eprintln!();
    eprintln!("Run '{} <subcommand> --help' for more information.", program);
}

fn run_validate(program: &str, args: &[String]) -> i32 {
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        eprintln!("Usage: {} validate <file.sff | ->", program);
        return if args.is_empty() { EXIT_LOGIC } else { EXIT_OK };
    }

    let value = match reader::read_sff_value(&args[0]) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_INTERNAL;
        }
    };

    let structural = validator::validate_structure(&value);
    if !structural.is_empty() {
        println!("Structural validation failed:");
        for err in &structural {
            println!("- {}", err);
        }
        return EXIT_STRUCTURAL;
    }

    let doc = match reader::document_from_value(&args[0], &value) {
        Ok(d) => d,
        Err(e) => {
            println!("Structural validation failed:");
            println!("- {}", e);
            return EXIT_STRUCTURAL;
        }
    };

    let logical = validator::validate_logic(&doc);
    if !logical.is_empty() {
        println!("Logical validation failed:");
        for err in &logical {
            println!("- {}", err);
        }
        return EXIT_LOGIC;
    }

    println!("Validation OK");
    EXIT_OK
}

fn run_compile(program: &str, args: &[String]) -> i32 {
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        eprintln!("Usage: {} compile <file.sff>", program);
        eprintln!();
        eprintln!("Writes the enriched IR next to the input as <base>.cpff");
        return if args.is_empty() { EXIT_LOGIC } else { EXIT_OK };
    }

    let input_path = &args[0];
    let value = match reader::read_sff_value(input_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_INTERNAL;
        }
    };

    let flow = match compiler::compile_value(&value) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{}", e);
            return compile_exit_code(&e);
        }
    };

    let out_path = PathBuf::from(input_path).with_extension("cpff");
    if let Err(e) = fs::write(&out_path, flow.to_pretty_json()) {
        eprintln!("Failed to write {}: {}", out_path.display(), e);
        return EXIT_INTERNAL;
    }
    println!("Compiled to {}", out_path.display());
    EXIT_OK
}

fn run_preview(program: &str, args: &[String]) -> i32 {
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        eprintln!("Usage: {} preview <file.sff>", program);
        return if args.is_empty() { EXIT_LOGIC } else { EXIT_OK };
    }

    let value = match reader::read_sff_value(&args[0]) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_INTERNAL;
        }
    };
    let flow = match compiler::compile_value(&value) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{}", e);
            return compile_exit_code(&e);
        }
    };
    let layout = match LayoutEngine::default().generate(&flow) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_INTERNAL;
        }
    };

    let s = &flow.cpff.stats;
    println!("direction: {}", flow.direction().as_str());
    println!(
        "nodes: {}  edges: {}  lanes: {}",
        s.nodes_total, s.edges_total, s.lanes_total
    );
    println!(
        "decisions: {}  branches: {}  joins: {}",
        s.decision_nodes, s.branch_edges, s.joins
    );
    println!(
        "cycles: {}  max_cycle_depth: {}  max_depth: {}",
        s.cycles_total, s.max_cycle_depth, s.max_depth
    );
    let c = &layout.complexity;
    println!(
        "tracks: {}  estimated size: {:.0} x {:.0}",
        c.max_tracks_per_lane, c.estimated_width, c.estimated_height
    );
    EXIT_OK
}

fn run_export(program: &str, args: &[String]) -> i32 {
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        eprintln!(
            "Usage: {} export <file.sff> [--format svg|mermaid|dot|json] [options]",
            program
        );
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -f, --format <fmt>    Output format (default: svg)");
        eprintln!("  -o, --out <path>      Output file (default: stdout)");
        eprintln!("      --lanes-only      Lanes/nodes preview without routed edges (svg)");
        eprintln!("      --debug-dir <dir> Write layout/occupancy/bridge/failure dumps");
        return if args.is_empty() { EXIT_LOGIC } else { EXIT_OK };
    }

    let input_path = &args[0];
    let mut format = ExportFormat::Svg;
    let mut out_path: Option<String> = None;
    let mut lanes_only = false;
    let mut debug_dir: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-f" | "--format" => {
                i += 1;
                if i < args.len() {
                    format = match ExportFormat::from_str(&args[i]) {
                        Some(f) => f,
                        None => {
                            eprintln!("Invalid format: {}", args[i]);
                            eprintln!("Valid options: svg, mermaid, dot, json");
                            return EXIT_LOGIC;
                        }
                    };
                }
            }
            "-o" | "--out" => {
                i += 1;
                if i < args.len() {
                    out_path = Some(args[i].clone());
                }
            }
            "--lanes-only" => {
                lanes_only = true;
            }
            "--debug-dir" => {
                i += 1;
                if i < args.len() {
                    debug_dir = Some(PathBuf::from(&args[i]));
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                return EXIT_LOGIC;
            }
        }
        i += 1;
    }

    let value = match reader::read_sff_value(input_path) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_INTERNAL;
        }
    };
    let flow = match compiler::compile_value(&value) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{}", e);
            return compile_exit_code(&e);
        }
    };

    let engine = LayoutEngine {
        dump_dir: debug_dir,
        ..LayoutEngine::default()
    };
    let layout = match engine.generate(&flow) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("{}", e);
            return EXIT_INTERNAL;
        }
    };

    let output = export(&flow, &layout, format, lanes_only);
    match out_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &output) {
                eprintln!("Failed to write {}: {}", path, e);
                return EXIT_INTERNAL;
            }
        }
        None => {
            if let Err(e) = io::stdout().write_all(output.as_bytes()) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    eprintln!("Failed to write to stdout: {}", e);
                    return EXIT_INTERNAL;
                }
            }
        }
    }
    EXIT_OK
}

fn compile_exit_code(err: &CompileError) -> i32 {
    match err {
        CompileError::Structural(_) => EXIT_STRUCTURAL,
        CompileError::Logic(_) | CompileError::SelfLoop(_) | CompileError::CycleWithoutExit => {
            EXIT_LOGIC
        }
    }
}
