use narwhal::algo::coarsen::Hierarchy;
use narwhal::{CancelToken, Graph, LayoutParams, LayoutStats, PositionMap, compute_layout};
use serde::Serialize;
use std::io::{Read, Write};
use std::time::Duration;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Layout(narwhal::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Layout(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<narwhal::Error> for CliError {
    fn from(value: narwhal::Error) -> Self {
        Self::Layout(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Layout,
    Hierarchy,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    verbose: bool,
    config: Option<String>,
    seed: Option<u64>,
    k: Option<f64>,
    theta: Option<f64>,
    iterations: Option<usize>,
    threshold: Option<usize>,
    timeout_ms: Option<u64>,
    out: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Completed,
    Cancelled,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOut<'a> {
    status: &'static str,
    positions: &'a PositionMap,
    stats: &'a LayoutStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LevelOut {
    level: usize,
    nodes: usize,
    edges: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HierarchyOut {
    threshold: usize,
    depth: usize,
    levels: Vec<LevelOut>,
}

fn usage() -> &'static str {
    "narwhal-cli\n\
\n\
USAGE:\n\
  narwhal-cli [layout] [--pretty] [--config <params.json>] [--seed <n>] [--k <f>] [--theta <f>] [--iterations <n>] [--threshold <n>] [--timeout-ms <n>] [--out <path>] [--verbose] [<path>|-]\n\
  narwhal-cli hierarchy [--threshold <n>] [--pretty] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', the graph is read from stdin.\n\
  - Graph JSON: {\"nodes\": [\"a\", \"b\"], \"edges\": [[\"a\", \"b\"]]}.\n\
  - --config reads layout parameters (camelCase JSON); flags override it.\n\
  - --timeout-ms cancels the layout after the given time; the partial layout is still written\n\
    and the exit code is 3.\n\
  - RUST_LOG overrides the log filter (default: warn, --verbose: debug). Logs go to stderr.\n\
"
}

fn flag_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a str, CliError> {
    it.next()
        .map(String::as_str)
        .ok_or(CliError::Usage(usage()))
}

fn parse_flag<T: std::str::FromStr>(raw: &str) -> Result<T, CliError> {
    raw.parse::<T>().map_err(|_| CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "layout" => args.command = Command::Layout,
            "hierarchy" => args.command = Command::Hierarchy,
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--config" => args.config = Some(flag_value(&mut it)?.to_string()),
            "--seed" => args.seed = Some(parse_flag(flag_value(&mut it)?)?),
            "--k" => args.k = Some(parse_flag(flag_value(&mut it)?)?),
            "--theta" => args.theta = Some(parse_flag(flag_value(&mut it)?)?),
            "--iterations" => args.iterations = Some(parse_flag(flag_value(&mut it)?)?),
            "--threshold" => args.threshold = Some(parse_flag(flag_value(&mut it)?)?),
            "--timeout-ms" => args.timeout_ms = Some(parse_flag(flag_value(&mut it)?)?),
            "--out" => args.out = Some(flag_value(&mut it)?.to_string()),
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool, out: Option<&str>) -> Result<(), CliError> {
    let mut bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    bytes.push(b'\n');
    match out {
        None => std::io::stdout().lock().write_all(&bytes)?,
        Some(path) => std::fs::write(path, bytes)?,
    }
    Ok(())
}

fn load_params(args: &Args) -> Result<LayoutParams, CliError> {
    let mut params = match args.config.as_deref() {
        Some(path) => serde_json::from_str::<LayoutParams>(&std::fs::read_to_string(path)?)?,
        None => LayoutParams::default(),
    };
    if let Some(seed) = args.seed {
        params.random_seed = seed;
    }
    if let Some(k) = args.k {
        params.k = k;
    }
    if let Some(theta) = args.theta {
        params.theta = theta;
    }
    if let Some(iterations) = args.iterations {
        params.max_iterations = iterations;
    }
    if let Some(threshold) = args.threshold {
        params.coarsening_threshold = threshold;
    }
    Ok(params)
}

fn spawn_timeout(token: &CancelToken, timeout: Duration) {
    let token = token.clone();
    std::thread::spawn(move || {
        std::thread::sleep(timeout);
        tracing::debug!(timeout_ms = timeout.as_millis() as u64, "layout timed out");
        token.cancel();
    });
}

fn run_layout(args: &Args, graph: &Graph) -> Result<Status, CliError> {
    let params = load_params(args)?;
    let token = CancelToken::new();
    if let Some(ms) = args.timeout_ms {
        spawn_timeout(&token, Duration::from_millis(ms));
    }

    let outcome = compute_layout(graph, &params, Some(&token))?;
    let status = if outcome.is_cancelled() {
        Status::Cancelled
    } else {
        Status::Completed
    };
    let result = outcome.into_result();
    let out = LayoutOut {
        status: match status {
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
        },
        positions: &result.positions,
        stats: &result.stats,
    };
    write_json(&out, args.pretty, args.out.as_deref())?;
    Ok(status)
}

fn run_hierarchy(args: &Args, graph: &Graph) -> Result<Status, CliError> {
    let threshold = args
        .threshold
        .unwrap_or(LayoutParams::default().coarsening_threshold);
    if threshold == 0 {
        return Err(CliError::Usage(usage()));
    }
    let hierarchy = Hierarchy::build(graph.index()?, threshold);

    let mut levels: Vec<LevelOut> = hierarchy
        .levels()
        .iter()
        .enumerate()
        .map(|(level, l)| LevelOut {
            level,
            nodes: l.fine.len(),
            edges: l.fine.edges().len(),
        })
        .collect();
    levels.push(LevelOut {
        level: hierarchy.depth(),
        nodes: hierarchy.coarsest().len(),
        edges: hierarchy.coarsest().edges().len(),
    });

    let out = HierarchyOut {
        threshold,
        depth: hierarchy.depth(),
        levels,
    };
    write_json(&out, args.pretty, args.out.as_deref())?;
    Ok(Status::Completed)
}

fn run(args: Args) -> Result<Status, CliError> {
    let text = read_input(args.input.as_deref())?;
    let graph: Graph = serde_json::from_str(&text)?;
    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "read graph"
    );
    match args.command {
        Command::Layout => run_layout(&args, &graph),
        Command::Hierarchy => run_hierarchy(&args, &graph),
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_logging(args.verbose);

    match run(args) {
        Ok(Status::Completed) => {}
        Ok(Status::Cancelled) => {
            eprintln!("layout cancelled after timeout; wrote partial result");
            std::process::exit(3);
        }
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
